//! Store records and the ports through which the platform is reached.

pub mod ports;
pub mod product;
pub mod transaction;
