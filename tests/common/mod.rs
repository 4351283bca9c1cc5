#![allow(dead_code)]

use in_app_purchase::application::provider::PaymentProvider;
use in_app_purchase::domain::product::Product;
use in_app_purchase::domain::transaction::{Payment, PaymentTransaction, TransactionState};
use in_app_purchase::infrastructure::in_memory::InMemoryPaymentQueue;
use in_app_purchase::{MainContext, ProviderConfig};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn product(id: &str) -> Product {
    Product {
        product_identifier: id.to_string(),
        localized_title: format!("{id} title"),
        localized_description: format!("{id} description"),
        price: dec!(1.99),
        price_locale: "en_US".to_string(),
    }
}

pub fn tx(id: &str, state: TransactionState, product_id: &str) -> PaymentTransaction {
    PaymentTransaction::new(id, state, Payment::new(product_id))
}

/// A provider wired to an in-memory queue with the observer registered.
pub struct Harness {
    pub queue: InMemoryPaymentQueue,
    pub provider: PaymentProvider,
}

pub fn harness(config: ProviderConfig) -> Harness {
    let queue = InMemoryPaymentQueue::new();
    let provider = PaymentProvider::new(Arc::new(queue.clone()), config, MainContext::spawn());
    provider.add_transaction_observer();
    Harness { queue, provider }
}

pub fn channel<T>() -> (mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<T>) {
    mpsc::unbounded_channel()
}

/// Receives the next value, failing the test if none arrives within a second.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}
