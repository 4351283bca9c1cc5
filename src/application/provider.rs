use super::main_context::MainContext;
use crate::config::ProviderConfig;
use crate::domain::ports::{PaymentQueueRef, TransactionObserver};
use crate::domain::product::Product;
use crate::domain::transaction::{Payment, PaymentTransaction, TransactionState};
use crate::error::{PlatformError, PurchaseError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// One-shot callback for a single purchase attempt.
pub type PaymentHandler = Box<dyn FnOnce(Result<PaymentTransaction>) + Send>;
/// Callback for updates that no pending purchase is waiting on.
pub type FallbackHandler = Arc<dyn Fn(Result<PaymentTransaction>) + Send + Sync>;
/// One-shot callback for a restore; receives every transaction the queue holds.
pub type RestoreHandler = Box<dyn FnOnce(Result<Vec<PaymentTransaction>>) + Send>;
/// Decides whether a store-initiated payment may proceed.
pub type StorePaymentPredicate = Arc<dyn Fn(&Payment, &Product) -> bool + Send + Sync>;

enum Command {
    Register {
        product_id: String,
        handler: PaymentHandler,
        submit: Option<Payment>,
    },
    Route(PaymentTransaction),
    Restore(RestoreHandler),
    RestoreFinished,
    RestoreFailed(PurchaseError),
    SetFallback(Option<FallbackHandler>),
    Settle(oneshot::Sender<()>),
}

/// Where an update for a product identifier should go.
enum Route {
    Handlers(Vec<PaymentHandler>),
    Fallback(FallbackHandler),
    Dropped,
}

/// Handler bookkeeping. Only ever touched by the actor task.
#[derive(Default)]
struct Registrations {
    payments: HashMap<String, Vec<PaymentHandler>>,
    restores: Vec<RestoreHandler>,
    fallback: Option<FallbackHandler>,
}

impl Registrations {
    fn register(&mut self, product_id: String, handler: PaymentHandler) {
        self.payments.entry(product_id).or_default().push(handler);
    }

    /// Removes every handler waiting on `product_id`, falling back when none are.
    fn route(&mut self, product_id: &str) -> Route {
        match self.payments.remove(product_id) {
            Some(handlers) if !handlers.is_empty() => Route::Handlers(handlers),
            _ => match &self.fallback {
                Some(fallback) => Route::Fallback(fallback.clone()),
                None => Route::Dropped,
            },
        }
    }

    fn drain_restores(&mut self) -> Vec<RestoreHandler> {
        std::mem::take(&mut self.restores)
    }
}

/// Sequential owner of [`Registrations`].
///
/// Commands are applied strictly in arrival order. Callbacks and queue calls
/// are posted to the main context and never run inside `apply`.
struct Actor {
    registrations: Registrations,
    queue: PaymentQueueRef,
    main: MainContext,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Actor {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::debug!("payment provider actor stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register {
                product_id,
                handler,
                submit,
            } => {
                self.registrations.register(product_id, handler);
                if let Some(payment) = submit {
                    let queue = self.queue.clone();
                    self.main.post(move || queue.submit(payment));
                }
            }
            Command::Route(transaction) => self.route(transaction),
            Command::Restore(handler) => {
                self.registrations.restores.push(handler);
                let queue = self.queue.clone();
                self.main.post(move || queue.restore_completed_transactions());
            }
            Command::RestoreFinished => {
                let handlers = self.registrations.drain_restores();
                if handlers.is_empty() {
                    return;
                }
                let queue = self.queue.clone();
                self.main.post(move || {
                    let transactions = queue.transactions();
                    for handler in handlers {
                        handler(Ok(transactions.clone()));
                    }
                });
            }
            Command::RestoreFailed(error) => {
                let handlers = self.registrations.drain_restores();
                tracing::debug!(%error, waiting = handlers.len(), "restore failed");
                if handlers.is_empty() {
                    return;
                }
                self.main.post(move || {
                    for handler in handlers {
                        handler(Err(error.clone()));
                    }
                });
            }
            Command::SetFallback(fallback) => self.registrations.fallback = fallback,
            Command::Settle(done) => self.main.post(move || {
                let _ = done.send(());
            }),
        }
    }

    fn route(&mut self, transaction: PaymentTransaction) {
        let product_id = transaction.product_identifier().to_string();
        match self.registrations.route(&product_id) {
            Route::Handlers(handlers) => {
                tracing::debug!(
                    product_id = %product_id,
                    transaction_id = %transaction.transaction_identifier,
                    state = ?transaction.state,
                    handlers = handlers.len(),
                    "routing update to pending purchases"
                );
                self.main.post(move || {
                    for handler in handlers {
                        handler(transaction.clone().into_result());
                    }
                });
            }
            Route::Fallback(fallback) => {
                tracing::debug!(
                    product_id = %product_id,
                    transaction_id = %transaction.transaction_identifier,
                    "routing update to fallback handler"
                );
                self.main.post(move || fallback(transaction.into_result()));
            }
            Route::Dropped => {
                tracing::debug!(
                    product_id = %product_id,
                    transaction_id = %transaction.transaction_identifier,
                    "no handler for update; dropping"
                );
            }
        }
    }
}

struct StorePaymentHandler {
    predicate: StorePaymentPredicate,
    handler: Option<FallbackHandler>,
}

struct Inner {
    queue: PaymentQueueRef,
    config: ProviderConfig,
    commands: mpsc::UnboundedSender<Command>,
    store_payment: RwLock<Option<Arc<StorePaymentHandler>>>,
    observing: Mutex<bool>,
}

impl Inner {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("payment provider actor is gone; dropping command");
        }
    }
}

impl TransactionObserver for Inner {
    fn updated_transactions(&self, transactions: Vec<PaymentTransaction>) {
        for transaction in transactions {
            if !self.config.allows(transaction.product_identifier()) {
                tracing::debug!(
                    product_id = transaction.product_identifier(),
                    "ignoring update for product outside the allowed set"
                );
                continue;
            }
            match transaction.state {
                TransactionState::Purchasing => continue,
                TransactionState::Deferred => {}
                TransactionState::Purchased | TransactionState::Restored => {
                    if self.config.complete_immediately {
                        self.queue.finish_transaction(&transaction);
                    }
                }
                TransactionState::Failed => self.queue.finish_transaction(&transaction),
                TransactionState::Unrecognized => {
                    tracing::debug!(
                        transaction_id = %transaction.transaction_identifier,
                        "skipping transaction in unrecognized state"
                    );
                    continue;
                }
            }
            self.send(Command::Route(transaction));
        }
    }

    fn restore_finished(&self) {
        self.send(Command::RestoreFinished);
    }

    fn restore_failed(&self, error: PlatformError) {
        self.send(Command::RestoreFailed(error.into()));
    }

    fn should_add_store_payment(&self, payment: &Payment, product: &Product) -> bool {
        if !self.config.allows(&payment.product_identifier) {
            return false;
        }
        let Some(store_payment) = self.store_payment.read().clone() else {
            return false;
        };
        let approved = (store_payment.predicate)(payment, product);
        if approved && let Some(handler) = store_payment.handler.clone() {
            self.send(Command::Register {
                product_id: payment.product_identifier.clone(),
                handler: Box::new(move |result: Result<PaymentTransaction>| handler(result)),
                submit: None,
            });
        }
        approved
    }
}

/// Routes the platform queue's shared update stream back to individual
/// purchase and restore requests.
///
/// Cloning yields another handle to the same provider. Construction spawns the
/// provider's actor task, so it must happen inside a tokio runtime. While
/// registered as an observer the queue keeps the provider alive; call
/// [`PaymentProvider::remove_transaction_observer`] to release it.
#[derive(Clone)]
pub struct PaymentProvider {
    inner: Arc<Inner>,
}

impl PaymentProvider {
    /// Creates a provider over `queue` that delivers callbacks on `main`.
    pub fn new(queue: PaymentQueueRef, config: ProviderConfig, main: MainContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            registrations: Registrations::default(),
            queue: queue.clone(),
            main,
            commands: rx,
        };
        tokio::spawn(actor.run());

        Self {
            inner: Arc::new(Inner {
                queue,
                config,
                commands: tx,
                store_payment: RwLock::new(None),
                observing: Mutex::new(false),
            }),
        }
    }

    /// Whether the platform currently allows payments on this device.
    pub fn can_make_payments(&self) -> bool {
        self.inner.queue.can_make_payments()
    }

    /// Starts receiving queue updates. Calling it twice is a no-op.
    ///
    /// The observing flag and the queue registration change together, under
    /// one lock.
    pub fn add_transaction_observer(&self) {
        let mut observing = self.inner.observing.lock();
        if *observing {
            tracing::warn!("transaction observer already registered");
            return;
        }
        self.inner.queue.add_observer(self.observer());
        *observing = true;
    }

    /// Stops receiving queue updates and releases the queue's handle.
    pub fn remove_transaction_observer(&self) {
        let mut observing = self.inner.observing.lock();
        if !*observing {
            return;
        }
        self.inner.queue.remove_observer(&self.observer());
        *observing = false;
    }

    /// Submits `payment` and calls `handler` once the platform resolves it.
    ///
    /// A product outside the allowed set fails at once with
    /// [`PurchaseError::InvalidProduct`] and never reaches the queue. The
    /// handler is registered before the payment is submitted.
    pub fn add_payment<F>(&self, payment: Payment, handler: F)
    where
        F: FnOnce(Result<PaymentTransaction>) + Send + 'static,
    {
        if !self.inner.config.allows(&payment.product_identifier) {
            handler(Err(PurchaseError::invalid_product(
                payment.product_identifier,
            )));
            return;
        }
        self.inner.send(Command::Register {
            product_id: payment.product_identifier.clone(),
            handler: Box::new(handler),
            submit: Some(payment),
        });
    }

    /// Waits for the next update for `product_id` without submitting anything.
    pub fn add_payment_handler<F>(&self, product_id: impl Into<String>, handler: F)
    where
        F: FnOnce(Result<PaymentTransaction>) + Send + 'static,
    {
        self.inner.send(Command::Register {
            product_id: product_id.into(),
            handler: Box::new(handler),
            submit: None,
        });
    }

    /// Asks the platform to restore completed purchases and calls `handler`
    /// with the queue's transactions once it reports the outcome.
    pub fn restore_completed_transactions<F>(&self, handler: F)
    where
        F: FnOnce(Result<Vec<PaymentTransaction>>) + Send + 'static,
    {
        self.inner.send(Command::Restore(Box::new(handler)));
    }

    /// Sets the handler for updates no pending purchase is waiting on.
    pub fn set_fallback_handler(&self, fallback: Option<FallbackHandler>) {
        self.inner.send(Command::SetFallback(fallback));
    }

    /// Installs the store-initiated payment policy.
    ///
    /// `None` declines every store-initiated payment. On approval, `handler`
    /// (if any) is registered for the product so its update is routed to it.
    pub fn set_store_payment_handler(
        &self,
        predicate: Option<StorePaymentPredicate>,
        handler: Option<FallbackHandler>,
    ) {
        *self.inner.store_payment.write() =
            predicate.map(|predicate| Arc::new(StorePaymentHandler { predicate, handler }));
    }

    /// Acknowledges `transaction` to the platform queue.
    pub fn finish(&self, transaction: &PaymentTransaction) {
        self.inner.queue.finish_transaction(transaction);
    }

    /// Returns the transactions the platform queue still holds.
    pub fn transactions(&self) -> Vec<PaymentTransaction> {
        self.inner.queue.transactions()
    }

    /// Resolves once every command issued before this call has been applied
    /// and the callbacks it produced have run on the main context.
    pub async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        self.inner.send(Command::Settle(tx));
        let _ = rx.await;
    }

    fn observer(&self) -> Arc<dyn TransactionObserver> {
        self.inner.clone()
    }
}
