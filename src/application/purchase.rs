use super::main_context::MainContext;
use super::provider::{FallbackHandler, PaymentProvider, StorePaymentPredicate};
use crate::config::ProviderConfig;
use crate::domain::ports::{PaymentQueueRef, ProductLookupRef, ReceiptRefreshRef};
use crate::domain::product::Product;
use crate::domain::transaction::{Payment, PaymentTransaction, TransactionState};
use crate::error::{PurchaseError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Application callback for purchases nobody is awaiting (fallback and
/// store-initiated purchases). Runs on the main context.
pub type PurchaseHandler = Arc<dyn Fn(Result<PaymentResponse>) + Send + Sync>;
/// Application policy for store-initiated purchases.
pub type ProductPredicate = Arc<dyn Fn(&Product) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentState {
    Purchased,
    Restored,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResponse {
    pub state: PaymentState,
    pub transaction: PaymentTransaction,
}

/// Maps a routed transaction to the caller-facing outcome.
///
/// Returns `None` for states that do not resolve a purchase (`purchasing` and
/// states this version does not recognize).
pub fn handle(transaction: PaymentTransaction) -> Option<Result<PaymentResponse>> {
    let state = match transaction.state {
        TransactionState::Purchased => PaymentState::Purchased,
        TransactionState::Restored => PaymentState::Restored,
        TransactionState::Deferred => PaymentState::Deferred,
        TransactionState::Failed => {
            return Some(Err(PurchaseError::from_platform(transaction.error.as_ref())));
        }
        TransactionState::Purchasing | TransactionState::Unrecognized => return None,
    };
    Some(Ok(PaymentResponse { state, transaction }))
}

/// Product identifiers of the `restored` transactions, deduplicated.
pub fn restored_product_ids(transactions: &[PaymentTransaction]) -> HashSet<String> {
    transactions
        .iter()
        .filter(|tx| tx.state == TransactionState::Restored)
        .map(|tx| tx.product_identifier().to_string())
        .collect()
}

fn to_fallback(handler: PurchaseHandler) -> FallbackHandler {
    Arc::new(move |result: Result<PaymentTransaction>| match result {
        Ok(transaction) => {
            if let Some(response) = handle(transaction) {
                handler(response);
            }
        }
        Err(error) => handler(Err(error)),
    })
}

/// Entry point for applications: product lookup, purchases, restores and
/// receipt refresh over one payment provider.
pub struct InAppPurchase {
    products: ProductLookupRef,
    payments: PaymentProvider,
    receipts: ReceiptRefreshRef,
}

impl InAppPurchase {
    /// Builds a facade whose callbacks run on a freshly spawned main context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        products: ProductLookupRef,
        queue: PaymentQueueRef,
        receipts: ReceiptRefreshRef,
        config: ProviderConfig,
    ) -> Self {
        let payments = PaymentProvider::new(queue, config, MainContext::spawn());
        Self::with_provider(products, payments, receipts)
    }

    pub fn with_provider(
        products: ProductLookupRef,
        payments: PaymentProvider,
        receipts: ReceiptRefreshRef,
    ) -> Self {
        Self {
            products,
            payments,
            receipts,
        }
    }

    pub fn provider(&self) -> &PaymentProvider {
        &self.payments
    }

    pub fn can_make_payments(&self) -> bool {
        self.payments.can_make_payments()
    }

    /// Decides which store-initiated purchases to honor.
    ///
    /// Without a predicate every such purchase is declined. Approved purchases
    /// report their outcome to `handler`.
    pub fn set_store_payment_handler(
        &self,
        predicate: Option<ProductPredicate>,
        handler: Option<PurchaseHandler>,
    ) {
        let predicate = predicate.map(|predicate| -> StorePaymentPredicate {
            Arc::new(move |_: &Payment, product: &Product| predicate(product))
        });
        self.payments
            .set_store_payment_handler(predicate, handler.map(to_fallback));
    }

    /// Starts observing the queue. Updates nobody waits on go to `fallback`.
    pub fn add_transaction_observer(&self, fallback: Option<PurchaseHandler>) {
        self.payments.set_fallback_handler(fallback.map(to_fallback));
        self.payments.add_transaction_observer();
    }

    pub fn remove_transaction_observer(&self) {
        self.payments.remove_transaction_observer();
    }

    pub async fn fetch_products(&self, product_ids: HashSet<String>) -> Result<Vec<Product>> {
        self.products.fetch(product_ids).await
    }

    /// Looks up `product_id` and buys it.
    ///
    /// Resolves once the platform reports the purchase as purchased, restored,
    /// deferred or failed. There is no timeout; wrap the call if one is needed.
    pub async fn purchase(&self, product_id: &str) -> Result<PaymentResponse> {
        let products = self
            .products
            .fetch(HashSet::from([product_id.to_string()]))
            .await?;
        let product = products
            .into_iter()
            .next()
            .ok_or(PurchaseError::EmptyProducts)?;

        let (tx, rx) = oneshot::channel();
        self.payments
            .add_payment(Payment::from(&product), move |result| {
                let response = result
                    .and_then(|transaction| handle(transaction).unwrap_or(Err(PurchaseError::Unknown)));
                let _ = tx.send(response);
            });
        rx.await.unwrap_or(Err(PurchaseError::Unknown))
    }

    /// Restores completed purchases, returning the restored product identifiers.
    pub async fn restore(&self) -> Result<HashSet<String>> {
        let (tx, rx) = oneshot::channel();
        self.payments.restore_completed_transactions(move |result| {
            let _ = tx.send(result.map(|transactions| restored_product_ids(&transactions)));
        });
        rx.await.unwrap_or(Err(PurchaseError::Unknown))
    }

    pub async fn refresh_receipt(&self) -> Result<()> {
        self.receipts.refresh().await
    }

    /// Acknowledges a transaction when `complete_immediately` is off.
    pub fn finish(&self, transaction: &PaymentTransaction) {
        self.payments.finish(transaction);
    }

    pub fn transactions(&self) -> Vec<PaymentTransaction> {
        self.payments.transactions()
    }
}
