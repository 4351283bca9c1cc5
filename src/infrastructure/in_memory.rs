use crate::domain::ports::{PaymentQueue, ProductLookup, ReceiptRefresh, TransactionObserver};
use crate::domain::product::Product;
use crate::domain::transaction::{Payment, PaymentTransaction};
use crate::error::{PlatformError, PurchaseError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type SubmitResponder = Arc<dyn Fn(&Payment) -> Vec<PaymentTransaction> + Send + Sync>;

#[derive(Default)]
struct QueueState {
    can_make_payments: bool,
    observers: Vec<Arc<dyn TransactionObserver>>,
    transactions: Vec<PaymentTransaction>,
    submitted: Vec<Payment>,
    finished: Vec<String>,
    restore_requests: usize,
    responder: Option<SubmitResponder>,
}

fn same_observer(a: &Arc<dyn TransactionObserver>, b: &Arc<dyn TransactionObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Scripted payment queue that records every call made to it.
///
/// Platform events are pushed with the `deliver_*` methods. Observers are
/// called without any internal lock held, so they may call back into the
/// queue the way a real platform allows.
#[derive(Clone)]
pub struct InMemoryPaymentQueue {
    state: Arc<Mutex<QueueState>>,
}

impl Default for InMemoryPaymentQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPaymentQueue {
    /// Creates an empty queue that allows payments.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                can_make_payments: true,
                ..QueueState::default()
            })),
        }
    }

    /// Sets the answer to [`PaymentQueue::can_make_payments`].
    pub fn set_can_make_payments(&self, enabled: bool) {
        self.state.lock().can_make_payments = enabled;
    }

    /// Replaces the transactions reported by [`PaymentQueue::transactions`].
    pub fn set_transactions(&self, transactions: Vec<PaymentTransaction>) {
        self.state.lock().transactions = transactions;
    }

    /// Answers every submitted payment synchronously, from inside `submit`.
    pub fn respond_to_submit<F>(&self, responder: F)
    where
        F: Fn(&Payment) -> Vec<PaymentTransaction> + Send + Sync + 'static,
    {
        self.state.lock().responder = Some(Arc::new(responder));
    }

    /// Returns every submitted payment, in submission order.
    pub fn submitted(&self) -> Vec<Payment> {
        self.state.lock().submitted.clone()
    }

    /// Identifiers of finished transactions, in finishing order.
    pub fn finished(&self) -> Vec<String> {
        self.state.lock().finished.clone()
    }

    /// Returns how many restores were requested.
    pub fn restore_requests(&self) -> usize {
        self.state.lock().restore_requests
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Sends a batch of transaction updates to every observer.
    pub fn deliver_updates(&self, transactions: Vec<PaymentTransaction>) {
        for observer in self.observers() {
            observer.updated_transactions(transactions.clone());
        }
    }

    /// Reports a completed restore to every observer.
    pub fn deliver_restore_finished(&self) {
        for observer in self.observers() {
            observer.restore_finished();
        }
    }

    /// Reports a failed restore to every observer.
    pub fn deliver_restore_failed(&self, error: PlatformError) {
        for observer in self.observers() {
            observer.restore_failed(error.clone());
        }
    }

    /// Asks the observers whether to allow a store-initiated payment.
    pub fn ask_should_add_store_payment(&self, payment: &Payment, product: &Product) -> bool {
        self.observers()
            .iter()
            .any(|observer| observer.should_add_store_payment(payment, product))
    }

    fn observers(&self) -> Vec<Arc<dyn TransactionObserver>> {
        self.state.lock().observers.clone()
    }
}

impl PaymentQueue for InMemoryPaymentQueue {
    fn can_make_payments(&self) -> bool {
        self.state.lock().can_make_payments
    }

    fn add_observer(&self, observer: Arc<dyn TransactionObserver>) {
        self.state.lock().observers.push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn TransactionObserver>) {
        self.state
            .lock()
            .observers
            .retain(|registered| !same_observer(registered, observer));
    }

    fn submit(&self, payment: Payment) {
        let responder = {
            let mut state = self.state.lock();
            state.submitted.push(payment.clone());
            state.responder.clone()
        };
        if let Some(responder) = responder {
            let updates = responder(&payment);
            if !updates.is_empty() {
                self.deliver_updates(updates);
            }
        }
    }

    fn restore_completed_transactions(&self) {
        self.state.lock().restore_requests += 1;
    }

    fn finish_transaction(&self, transaction: &PaymentTransaction) {
        let mut state = self.state.lock();
        state
            .finished
            .push(transaction.transaction_identifier.clone());
        state
            .transactions
            .retain(|pending| pending.transaction_identifier != transaction.transaction_identifier);
    }

    fn transactions(&self) -> Vec<PaymentTransaction> {
        self.state.lock().transactions.clone()
    }
}

/// Product catalog held in memory, or a scripted lookup failure.
#[derive(Clone, Default)]
pub struct InMemoryProductLookup {
    catalog: Arc<Mutex<HashMap<String, Product>>>,
    failure: Arc<Mutex<Option<PurchaseError>>>,
    requests: Arc<Mutex<Vec<HashSet<String>>>>,
}

impl InMemoryProductLookup {
    /// Creates a lookup with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lookup whose catalog holds `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let lookup = Self::new();
        for product in products {
            lookup.insert(product);
        }
        lookup
    }

    /// Adds `product` to the catalog, replacing any with the same identifier.
    pub fn insert(&self, product: Product) {
        self.catalog
            .lock()
            .insert(product.product_identifier.clone(), product);
    }

    /// Makes every subsequent fetch fail with `error`.
    pub fn fail_with(&self, error: PurchaseError) {
        *self.failure.lock() = Some(error);
    }

    /// Returns the identifier sets of every fetch, in call order.
    pub fn requests(&self) -> Vec<HashSet<String>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProductLookup for InMemoryProductLookup {
    async fn fetch(&self, product_identifiers: HashSet<String>) -> Result<Vec<Product>> {
        self.requests.lock().push(product_identifiers.clone());
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let catalog = self.catalog.lock();
        Ok(product_identifiers
            .iter()
            .filter_map(|id| catalog.get(id).cloned())
            .collect())
    }
}

/// Receipt refresh with a scripted outcome.
#[derive(Clone, Default)]
pub struct InMemoryReceiptRefresh {
    failure: Arc<Mutex<Option<PurchaseError>>>,
    calls: Arc<Mutex<usize>>,
}

impl InMemoryReceiptRefresh {
    /// Creates a receipt refresh that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent refresh fail with `error`.
    pub fn fail_with(&self, error: PurchaseError) {
        *self.failure.lock() = Some(error);
    }

    /// Returns how many refreshes were requested.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ReceiptRefresh for InMemoryReceiptRefresh {
    async fn refresh(&self) -> Result<()> {
        *self.calls.lock() += 1;
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
