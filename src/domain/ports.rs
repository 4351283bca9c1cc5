use super::product::Product;
use super::transaction::{Payment, PaymentTransaction};
use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// The platform's shared payment queue.
///
/// Every method returns promptly; outcomes come back through the registered
/// [`TransactionObserver`]s, possibly on another thread and possibly before
/// `submit` returns.
pub trait PaymentQueue: Send + Sync {
    fn can_make_payments(&self) -> bool;
    fn add_observer(&self, observer: Arc<dyn TransactionObserver>);
    fn remove_observer(&self, observer: &Arc<dyn TransactionObserver>);
    fn submit(&self, payment: Payment);
    fn restore_completed_transactions(&self);
    fn finish_transaction(&self, transaction: &PaymentTransaction);
    /// Transactions the platform still holds as unfinished.
    fn transactions(&self) -> Vec<PaymentTransaction>;
}

/// Callbacks the platform queue delivers to its observers.
pub trait TransactionObserver: Send + Sync {
    fn updated_transactions(&self, transactions: Vec<PaymentTransaction>);
    fn restore_finished(&self);
    fn restore_failed(&self, error: PlatformError);
    /// Asked when the user starts a purchase outside the application.
    fn should_add_store_payment(&self, payment: &Payment, product: &Product) -> bool;
}

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn fetch(&self, product_identifiers: HashSet<String>) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait ReceiptRefresh: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

pub type PaymentQueueRef = Arc<dyn PaymentQueue>;
pub type ProductLookupRef = Arc<dyn ProductLookup>;
pub type ReceiptRefreshRef = Arc<dyn ReceiptRefresh>;
