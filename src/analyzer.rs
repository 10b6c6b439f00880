use crate::error::DataFormatError;
use crate::models::{
    CategorySummary, MonthlyTrend, ProductPattern, RawTransaction, Recommendation, Transaction,
};
use crate::normalize::normalize;
use crate::util::{round1, round2};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_MIN_PURCHASES: u32 = 2;
pub const DEFAULT_TARGET_INTERVAL_DAYS: f64 = 30.0;
pub const MAX_RECOMMENDATIONS: usize = 15;

const REQUIRED_COLUMNS: &[&str] = &[
    "CustomerID",
    "OrderID",
    "Item Name",
    "Category",
    "OrderDate",
    "Quantity",
    "Base Price",
    "TotalPrice",
];

/// Owns the cleaned transaction table. Built once from the full input; every
/// query reads the table and returns a fresh result, so a shared analyzer is
/// safe for any number of concurrent readers.
#[derive(Debug)]
pub struct PurchaseAnalyzer {
    records: Vec<Transaction>,
}

impl PurchaseAnalyzer {
    pub fn from_path(path: &Path) -> Result<Self, DataFormatError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|err| DataFormatError::UnreadableInput(err.to_string()))?;
        let headers = reader
            .headers()
            .map_err(|err| DataFormatError::UnreadableInput(err.to_string()))?
            .clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|header| header == *column) {
                return Err(DataFormatError::MissingColumn(column.to_string()));
            }
        }

        let mut raw = Vec::new();
        for (idx, result) in reader.deserialize().enumerate() {
            let record: RawTransaction = result.map_err(|err| DataFormatError::BadRow {
                row: idx + 1,
                message: err.to_string(),
            })?;
            raw.push(record);
        }
        Self::from_records(raw)
    }

    pub fn from_records(raw: Vec<RawTransaction>) -> Result<Self, DataFormatError> {
        let records = normalize(raw)?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[Transaction] {
        &self.records
    }

    /// All customer ids present in the table, ascending.
    pub fn customers(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .records
            .iter()
            .map(|tx| tx.customer_id.as_str())
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }

    /// All category names present in the table, ascending.
    pub fn categories(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .records
            .iter()
            .map(|tx| tx.category.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// A customer's cleaned rows, optionally filtered by month (1-12) and
    /// category. An out-of-range month matches nothing. An unknown customer
    /// is indistinguishable from one with zero purchases: empty, not an error.
    pub fn purchases(
        &self,
        customer_id: &str,
        month: Option<u32>,
        category: Option<&str>,
    ) -> Vec<Transaction> {
        if month.is_some_and(|m| !(1..=12).contains(&m)) {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|tx| tx.customer_id == customer_id)
            .filter(|tx| month.is_none_or(|m| tx.month == m))
            .filter(|tx| category.is_none_or(|c| tx.category == c))
            .cloned()
            .collect()
    }

    /// Per-product purchase statistics for a customer, one row per distinct
    /// (item, category) pair, in first-observed order.
    pub fn purchase_patterns(&self, customer_id: &str) -> Vec<ProductPattern> {
        let mut order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), PatternAccumulator> = HashMap::new();

        for tx in self.records.iter().filter(|tx| tx.customer_id == customer_id) {
            let key = (tx.item_name.clone(), tx.category.clone());
            let acc = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                PatternAccumulator::new(tx.order_date)
            });
            acc.observe(tx);
        }

        order
            .into_iter()
            .map(|key| {
                let acc = &groups[&key];
                acc.finish(key.0, key.1)
            })
            .collect()
    }

    /// Ranked bucket-list candidates: products the customer repurchases on a
    /// cadence within ±50% of the target interval. `min_purchases` below 1 is
    /// clamped to 1 rather than rejected; a non-positive target interval has
    /// no valid band and yields an empty list.
    pub fn recommendations(
        &self,
        customer_id: &str,
        min_purchases: u32,
        target_interval_days: f64,
    ) -> Vec<Recommendation> {
        if target_interval_days <= 0.0 {
            return Vec::new();
        }
        let min_purchases = min_purchases.max(1) as usize;
        let lower = target_interval_days * 0.5;
        let upper = target_interval_days * 1.5;

        let mut candidates: Vec<ProductPattern> = self
            .purchase_patterns(customer_id)
            .into_iter()
            .filter(|pattern| {
                pattern.purchase_count >= min_purchases
                    && pattern.avg_interval > 0.0
                    && pattern.avg_interval >= lower
                    && pattern.avg_interval <= upper
            })
            .collect();

        // Stable sort keeps aggregation order as the final tiebreak.
        candidates.sort_by(|a, b| {
            b.purchase_count
                .cmp(&a.purchase_count)
                .then_with(|| a.avg_interval.total_cmp(&b.avg_interval))
        });
        candidates.truncate(MAX_RECOMMENDATIONS);

        candidates
            .into_iter()
            .map(|pattern| {
                let interval = round1(pattern.avg_interval);
                Recommendation {
                    recommendation_reason: format!(
                        "Purchased {} times, avg every {:.1} days",
                        pattern.purchase_count, interval
                    ),
                    item: pattern.item_name,
                    category: pattern.category,
                    purchase_count: pattern.purchase_count,
                    avg_interval_days: interval,
                    avg_price: pattern.avg_price,
                }
            })
            .collect()
    }

    /// Per-category spend for a customer, optionally restricted to one month,
    /// sorted by category name.
    pub fn spending_summary(&self, customer_id: &str, month: Option<u32>) -> Vec<CategorySummary> {
        if month.is_some_and(|m| !(1..=12).contains(&m)) {
            return Vec::new();
        }
        let mut groups: BTreeMap<&str, SummaryAccumulator> = BTreeMap::new();
        for tx in self
            .records
            .iter()
            .filter(|tx| tx.customer_id == customer_id)
            .filter(|tx| month.is_none_or(|m| tx.month == m))
        {
            let acc = groups.entry(tx.category.as_str()).or_default();
            acc.total_spent += tx.clean_price.unwrap_or(0.0);
            acc.orders.insert(tx.order_id.as_str());
            acc.items += 1;
        }

        groups
            .into_iter()
            .map(|(category, acc)| CategorySummary {
                category: category.to_string(),
                total_spent: round2(acc.total_spent),
                num_orders: acc.orders.len(),
                num_items: acc.items,
            })
            .collect()
    }

    /// Spend per (month, category) over the customer's full history, sorted
    /// by that pair. Pairs with no purchases are absent, not zero-filled.
    pub fn monthly_trends(&self, customer_id: &str) -> Vec<MonthlyTrend> {
        let mut groups: BTreeMap<(u32, &str), f64> = BTreeMap::new();
        for tx in self.records.iter().filter(|tx| tx.customer_id == customer_id) {
            *groups.entry((tx.month, tx.category.as_str())).or_insert(0.0) +=
                tx.clean_price.unwrap_or(0.0);
        }

        groups
            .into_iter()
            .map(|((month, category), total)| MonthlyTrend {
                month,
                category: category.to_string(),
                total_spent: round2(total),
            })
            .collect()
    }
}

struct PatternAccumulator {
    count: usize,
    first: NaiveDate,
    last: NaiveDate,
    price_sum: f64,
    priced_rows: usize,
    total_quantity: u64,
}

impl PatternAccumulator {
    fn new(date: NaiveDate) -> Self {
        Self {
            count: 0,
            first: date,
            last: date,
            price_sum: 0.0,
            priced_rows: 0,
            total_quantity: 0,
        }
    }

    fn observe(&mut self, tx: &Transaction) {
        self.count += 1;
        self.first = self.first.min(tx.order_date);
        self.last = self.last.max(tx.order_date);
        if let Some(price) = tx.clean_price {
            self.price_sum += price;
            self.priced_rows += 1;
        }
        self.total_quantity += u64::from(tx.quantity);
    }

    fn finish(&self, item_name: String, category: String) -> ProductPattern {
        let days_span = (self.last - self.first).num_days();
        let avg_interval = if self.count > 1 {
            days_span as f64 / (self.count - 1) as f64
        } else {
            0.0
        };
        let avg_price = if self.priced_rows > 0 {
            round2(self.price_sum / self.priced_rows as f64)
        } else {
            0.0
        };
        ProductPattern {
            item_name,
            category,
            purchase_count: self.count,
            first_purchase: self.first,
            last_purchase: self.last,
            avg_price,
            total_quantity: self.total_quantity,
            days_span,
            avg_interval,
        }
    }
}

#[derive(Default)]
struct SummaryAccumulator<'a> {
    total_spent: f64,
    orders: HashSet<&'a str>,
    items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        customer: &str,
        order: &str,
        item: &str,
        category: &str,
        date: &str,
        quantity: u32,
        base_price: Option<f64>,
        total_price: &str,
    ) -> RawTransaction {
        RawTransaction {
            customer_id: customer.to_string(),
            order_id: order.to_string(),
            item_name: item.to_string(),
            category: category.to_string(),
            order_date: date.to_string(),
            quantity,
            base_price,
            total_price: total_price.to_string(),
        }
    }

    fn fixture() -> PurchaseAnalyzer {
        PurchaseAnalyzer::from_records(vec![
            // Milk every 30 days, one total carrying a corrupted suffix.
            raw("C1", "O1", "Whole Milk", "Dairy", "2024-01-05", 1, Some(3.49), "3.49"),
            raw("C1", "O2", "Whole Milk", "Dairy", "2024-02-04", 1, Some(3.49), "3.49881"),
            raw("C1", "O3", "Whole Milk", "Dairy", "2024-03-05", 2, Some(3.49), "6.98"),
            // Eggs twice, 45 days apart (the 1.5x band edge at target 30).
            raw("C1", "O1", "Large Eggs", "Dairy", "2024-01-05", 1, Some(4.99), "4.99"),
            raw("C1", "O4", "Large Eggs", "Dairy", "2024-02-19", 1, Some(4.99), "4.99"),
            // One-off purchase, never recommendable.
            raw("C1", "O2", "Stand Mixer", "Kitchen", "2024-02-04", 1, Some(249.0), "249.00"),
            // Unpriceable row: garbage total, no base price.
            raw("C1", "O5", "Gift Card", "Gifts", "2024-03-10", 1, None, "n/a"),
            // Second customer keeps per-customer filtering honest.
            raw("C2", "O6", "Whole Milk", "Dairy", "2024-01-10", 1, Some(3.49), "3.49"),
        ])
        .unwrap()
    }

    #[test]
    fn customers_and_categories_are_sorted() {
        let analyzer = fixture();
        assert_eq!(analyzer.customers(), vec!["C1", "C2"]);
        assert_eq!(
            analyzer.categories(),
            vec!["Dairy", "Gifts", "Kitchen"]
        );
    }

    #[test]
    fn purchases_filters_by_month_and_category() {
        let analyzer = fixture();
        assert_eq!(analyzer.purchases("C1", None, None).len(), 7);
        assert_eq!(analyzer.purchases("C1", Some(1), None).len(), 2);
        assert_eq!(analyzer.purchases("C1", Some(1), Some("Dairy")).len(), 2);
        assert_eq!(analyzer.purchases("C1", Some(2), Some("Kitchen")).len(), 1);
        // Out-of-range month is a well-defined empty result.
        assert!(analyzer.purchases("C1", Some(13), None).is_empty());
        assert!(analyzer.purchases("C1", Some(0), None).is_empty());
    }

    #[test]
    fn unknown_customer_is_empty_everywhere() {
        let analyzer = fixture();
        assert!(analyzer.purchases("nobody", None, None).is_empty());
        assert!(analyzer.purchase_patterns("nobody").is_empty());
        assert!(analyzer.recommendations("nobody", 2, 30.0).is_empty());
        assert!(analyzer.spending_summary("nobody", None).is_empty());
        assert!(analyzer.monthly_trends("nobody").is_empty());
    }

    #[test]
    fn patterns_compute_interval_statistics() {
        let analyzer = fixture();
        let patterns = analyzer.purchase_patterns("C1");
        assert_eq!(patterns.len(), 4);

        let milk = &patterns[0];
        assert_eq!(milk.item_name, "Whole Milk");
        assert_eq!(milk.purchase_count, 3);
        assert_eq!(milk.days_span, 60);
        assert_eq!(milk.avg_interval, 30.0);
        assert_eq!(milk.total_quantity, 4);
        // Mean of 3.49, 3.49 (repaired from "3.49881"), 6.98.
        assert_eq!(milk.avg_price, 4.65);

        let mixer = &patterns[2];
        assert_eq!(mixer.purchase_count, 1);
        assert_eq!(mixer.days_span, 0);
        assert_eq!(mixer.avg_interval, 0.0);
    }

    #[test]
    fn unpriceable_rows_have_zero_average_price() {
        let analyzer = fixture();
        let patterns = analyzer.purchase_patterns("C1");
        let gift_card = &patterns[3];
        assert_eq!(gift_card.item_name, "Gift Card");
        assert_eq!(gift_card.avg_price, 0.0);
    }

    #[test]
    fn recommendations_rank_by_count_then_interval() {
        let analyzer = fixture();
        let recs = analyzer.recommendations("C1", 2, 30.0);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item, "Whole Milk");
        assert_eq!(recs[0].purchase_count, 3);
        assert_eq!(recs[0].avg_interval_days, 30.0);
        assert_eq!(
            recs[0].recommendation_reason,
            "Purchased 3 times, avg every 30.0 days"
        );
        // 45 days sits exactly on the 1.5x boundary and is included.
        assert_eq!(recs[1].item, "Large Eggs");
        assert_eq!(recs[1].avg_interval_days, 45.0);
    }

    #[test]
    fn single_purchases_are_never_recommended() {
        let analyzer = fixture();
        // Even with the minimum clamped to 1, a one-off has interval 0.
        let recs = analyzer.recommendations("C1", 0, 30.0);
        assert!(recs.iter().all(|rec| rec.item != "Stand Mixer"));
    }

    #[test]
    fn interval_band_boundaries_are_inclusive() {
        let analyzer = PurchaseAnalyzer::from_records(vec![
            // Span 30 over 3 purchases: avg 15.0, the 0.5x edge.
            raw("C1", "O1", "At Lower", "Test", "2024-01-01", 1, Some(1.0), "1.00"),
            raw("C1", "O2", "At Lower", "Test", "2024-01-16", 1, Some(1.0), "1.00"),
            raw("C1", "O3", "At Lower", "Test", "2024-01-31", 1, Some(1.0), "1.00"),
            // Span 29 over 3 purchases: avg 14.5, just below the band.
            raw("C1", "O4", "Below", "Test", "2024-01-01", 1, Some(1.0), "1.00"),
            raw("C1", "O5", "Below", "Test", "2024-01-15", 1, Some(1.0), "1.00"),
            raw("C1", "O6", "Below", "Test", "2024-01-30", 1, Some(1.0), "1.00"),
            // Span 45 over 2 purchases: avg 45.0, the 1.5x edge.
            raw("C1", "O7", "At Upper", "Test", "2024-01-01", 1, Some(1.0), "1.00"),
            raw("C1", "O8", "At Upper", "Test", "2024-02-15", 1, Some(1.0), "1.00"),
            // Span 46 over 2 purchases: avg 46.0, just above the band.
            raw("C1", "O9", "Above", "Test", "2024-01-01", 1, Some(1.0), "1.00"),
            raw("C1", "O10", "Above", "Test", "2024-02-16", 1, Some(1.0), "1.00"),
        ])
        .unwrap();

        let items: Vec<String> = analyzer
            .recommendations("C1", 2, 30.0)
            .into_iter()
            .map(|rec| rec.item)
            .collect();
        assert_eq!(items, vec!["At Lower", "At Upper"]);
    }

    #[test]
    fn non_positive_target_interval_yields_empty() {
        let analyzer = fixture();
        assert!(analyzer.recommendations("C1", 2, 0.0).is_empty());
        assert!(analyzer.recommendations("C1", 2, -7.0).is_empty());
    }

    #[test]
    fn recommendations_cap_at_fifteen_in_first_seen_order() {
        let mut rows = Vec::new();
        for i in 0..20 {
            let item = format!("Item{:02}", i);
            rows.push(raw(
                "C1",
                &format!("A{i}"),
                &item,
                "Pantry",
                "2024-01-01",
                1,
                Some(2.0),
                "2.00",
            ));
            rows.push(raw(
                "C1",
                &format!("B{i}"),
                &item,
                "Pantry",
                "2024-01-31",
                1,
                Some(2.0),
                "2.00",
            ));
        }
        let analyzer = PurchaseAnalyzer::from_records(rows).unwrap();
        let recs = analyzer.recommendations("C1", 2, 30.0);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        // Identical sort keys, so aggregation order decides.
        for (i, rec) in recs.iter().enumerate() {
            assert_eq!(rec.item, format!("Item{:02}", i));
        }
    }

    #[test]
    fn summary_groups_by_category_with_distinct_orders() {
        let analyzer = fixture();
        let summary = analyzer.spending_summary("C1", None);
        assert_eq!(summary.len(), 3);

        let dairy = &summary[0];
        assert_eq!(dairy.category, "Dairy");
        assert_eq!(dairy.num_items, 5);
        assert_eq!(dairy.num_orders, 4); // O1 holds both milk and eggs
        assert_eq!(dairy.total_spent, 23.94);

        // Missing clean price contributes zero, the row still counts.
        let gifts = &summary[1];
        assert_eq!(gifts.category, "Gifts");
        assert_eq!(gifts.total_spent, 0.0);
        assert_eq!(gifts.num_items, 1);

        assert!(analyzer.spending_summary("C1", Some(13)).is_empty());
    }

    #[test]
    fn summary_totals_match_purchase_sums() {
        let analyzer = fixture();
        for month in [None, Some(1), Some(2), Some(3)] {
            let summed: f64 = analyzer
                .spending_summary("C1", month)
                .iter()
                .map(|row| row.total_spent)
                .sum();
            let expected: f64 = analyzer
                .purchases("C1", month, None)
                .iter()
                .filter_map(|tx| tx.clean_price)
                .sum();
            assert!((summed - round2(expected)).abs() < 1e-9);
        }
    }

    #[test]
    fn trends_cover_observed_month_category_pairs_only() {
        let analyzer = fixture();
        let trends = analyzer.monthly_trends("C1");
        let pairs: Vec<(u32, &str)> = trends
            .iter()
            .map(|row| (row.month, row.category.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(1, "Dairy"), (2, "Dairy"), (2, "Kitchen"), (3, "Dairy"), (3, "Gifts")]
        );
        let january = &trends[0];
        assert_eq!(january.total_spent, 8.48);
    }

    #[test]
    fn queries_are_idempotent() {
        let analyzer = fixture();
        let first = serde_json::to_string(&analyzer.recommendations("C1", 2, 30.0)).unwrap();
        let second = serde_json::to_string(&analyzer.recommendations("C1", 2, 30.0)).unwrap();
        assert_eq!(first, second);
        let first = serde_json::to_string(&analyzer.monthly_trends("C1")).unwrap();
        let second = serde_json::to_string(&analyzer.monthly_trends("C1")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn loads_csv_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purchases.csv");
        std::fs::write(
            &path,
            "CustomerID,OrderID,Item Name,Category,OrderDate,Quantity,Base Price,TotalPrice\n\
             C1,O1,Ground Coffee,Beverages,2024-01-03,1,11.99,11.99\n\
             C1,O2,Ground Coffee,Beverages,2024-01-24,1,11.99,11.99482\n\
             C1,O3,Ground Coffee,Beverages,2024-02-14,1,11.99,11.99\n",
        )
        .unwrap();
        let analyzer = PurchaseAnalyzer::from_path(&path).unwrap();
        let recs = analyzer.recommendations("C1", 2, 21.0);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].avg_price, 11.99);
        assert_eq!(
            recs[0].recommendation_reason,
            "Purchased 3 times, avg every 21.0 days"
        );
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_total.csv");
        std::fs::write(
            &path,
            "CustomerID,OrderID,Item Name,Category,OrderDate,Quantity,Base Price\n\
             C1,O1,Milk,Dairy,2024-01-05,1,3.49\n",
        )
        .unwrap();
        let err = PurchaseAnalyzer::from_path(&path).unwrap_err();
        assert_eq!(err, DataFormatError::MissingColumn("TotalPrice".to_string()));
    }
}
