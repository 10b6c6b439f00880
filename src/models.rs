use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the source CSV, exactly as exported. `TotalPrice` is untrusted
/// (the export concatenates stray digits onto some values) and stays text
/// until the normalizer repairs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "OrderID")]
    pub order_id: String,
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "OrderDate")]
    pub order_date: String,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
    #[serde(rename = "Base Price", default)]
    pub base_price: Option<f64>,
    #[serde(rename = "TotalPrice")]
    pub total_price: String,
}

/// A normalized transaction row. Immutable once the table is built.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub customer_id: String,
    pub order_id: String,
    pub item_name: String,
    pub category: String,
    pub order_date: NaiveDate,
    pub month: u32,
    pub year: i32,
    pub quantity: u32,
    pub base_price: Option<f64>,
    /// Repaired price. `None` only when both the total-price repair and the
    /// base-price fallback failed; such rows contribute 0 to sums and are
    /// excluded from means.
    pub clean_price: Option<f64>,
}

/// Aggregate statistics for one (item, category) pair in a customer's history.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPattern {
    pub item_name: String,
    pub category: String,
    pub purchase_count: usize,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
    pub avg_price: f64,
    pub total_quantity: u64,
    pub days_span: i64,
    /// Mean days between consecutive purchases; exactly 0.0 for
    /// single-purchase products. Unrounded until presentation.
    pub avg_interval: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub item: String,
    pub category: String,
    pub purchase_count: usize,
    pub avg_interval_days: f64,
    pub avg_price: f64,
    pub recommendation_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub total_spent: f64,
    pub num_orders: usize,
    pub num_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTrend {
    pub month: u32,
    pub category: String,
    pub total_spent: f64,
}
