use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchasable product metadata returned by a product lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_identifier: String,
    pub localized_title: String,
    pub localized_description: String,
    pub price: Decimal,
    pub price_locale: String,
}
