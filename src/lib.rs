//! Client-side abstraction over a platform in-app purchase queue.
//!
//! [`InAppPurchase`] looks products up, submits payments and awaits each
//! purchase's own outcome even though the platform multiplexes every
//! transaction through one observer. Collaborators are injected through the
//! traits in [`domain::ports`].

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::main_context::{MainContext, MainLoop};
pub use application::provider::PaymentProvider;
pub use application::purchase::{InAppPurchase, PaymentResponse, PaymentState};
pub use config::ProviderConfig;
pub use error::{PlatformError, PurchaseError, StoreErrorCode};
