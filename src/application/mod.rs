//! Application layer: the payment provider and the purchase facade on top of it.
//!
//! The `PaymentProvider` is an actor: a single `tokio` task owns every pending
//! handler and processes registrations and queue updates strictly in order.
//! Application callbacks are then delivered on a `MainContext`.

pub mod main_context;
pub mod provider;
pub mod purchase;
