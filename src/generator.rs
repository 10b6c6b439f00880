use crate::models::RawTransaction;
use crate::util::{format_amount, random_digits, round2};
use chrono::{Duration, Months, NaiveDate};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use uuid::Uuid;

pub struct GeneratorConfig {
    pub customers: usize,
    pub months: u32,
    pub start: NaiveDate,
    /// Share of rows whose TotalPrice gets stray digits appended, matching
    /// the corruption seen in the real export.
    pub corrupt_ratio: f64,
    /// Share of rows with no base price and an unparseable total.
    pub missing_base_ratio: f64,
}

struct Product {
    name: &'static str,
    category: &'static str,
    base_price: f64,
    cadence_days: f64,
}

const CATALOG: &[Product] = &[
    Product { name: "Whole Milk", category: "Dairy", base_price: 3.49, cadence_days: 7.0 },
    Product { name: "Large Eggs", category: "Dairy", base_price: 4.99, cadence_days: 10.0 },
    Product { name: "Greek Yogurt", category: "Dairy", base_price: 5.29, cadence_days: 9.0 },
    Product { name: "Salted Butter", category: "Dairy", base_price: 4.79, cadence_days: 21.0 },
    Product { name: "Bananas", category: "Produce", base_price: 1.29, cadence_days: 7.0 },
    Product { name: "Baby Spinach", category: "Produce", base_price: 3.99, cadence_days: 8.0 },
    Product { name: "Avocados", category: "Produce", base_price: 4.49, cadence_days: 10.0 },
    Product { name: "Sourdough Loaf", category: "Bakery", base_price: 4.29, cadence_days: 9.0 },
    Product { name: "Plain Bagels", category: "Bakery", base_price: 3.59, cadence_days: 12.0 },
    Product { name: "Ground Coffee", category: "Beverages", base_price: 11.99, cadence_days: 21.0 },
    Product { name: "Orange Juice", category: "Beverages", base_price: 4.19, cadence_days: 10.0 },
    Product { name: "Sparkling Water", category: "Beverages", base_price: 5.99, cadence_days: 14.0 },
    Product { name: "Spaghetti", category: "Pantry", base_price: 1.89, cadence_days: 25.0 },
    Product { name: "Marinara Sauce", category: "Pantry", base_price: 3.29, cadence_days: 25.0 },
    Product { name: "Olive Oil", category: "Pantry", base_price: 9.99, cadence_days: 60.0 },
    Product { name: "Peanut Butter", category: "Pantry", base_price: 4.59, cadence_days: 30.0 },
    Product { name: "Jasmine Rice", category: "Pantry", base_price: 8.49, cadence_days: 45.0 },
    Product { name: "Paper Towels", category: "Household", base_price: 12.49, cadence_days: 30.0 },
    Product { name: "Laundry Detergent", category: "Household", base_price: 13.99, cadence_days: 45.0 },
    Product { name: "Dish Soap", category: "Household", base_price: 3.49, cadence_days: 40.0 },
    Product { name: "Trash Bags", category: "Household", base_price: 9.29, cadence_days: 35.0 },
    Product { name: "Shampoo", category: "Personal Care", base_price: 6.99, cadence_days: 40.0 },
    Product { name: "Toothpaste", category: "Personal Care", base_price: 3.79, cadence_days: 30.0 },
    Product { name: "Body Wash", category: "Personal Care", base_price: 5.89, cadence_days: 35.0 },
    Product { name: "Tortilla Chips", category: "Snacks", base_price: 3.99, cadence_days: 14.0 },
    Product { name: "Granola Bars", category: "Snacks", base_price: 6.49, cadence_days: 18.0 },
    Product { name: "Dry Dog Food", category: "Pet Supplies", base_price: 24.99, cadence_days: 30.0 },
    Product { name: "Cat Litter", category: "Pet Supplies", base_price: 17.99, cadence_days: 28.0 },
];

/// Generates a synthetic transaction log. Each customer buys a personal
/// subset of the catalog on a jittered cadence around each product's nominal
/// repurchase interval, so the analyzer has real periodicity to find.
pub fn generate_records(
    config: &GeneratorConfig,
    seed: u64,
) -> Result<Vec<RawTransaction>, String> {
    if config.customers == 0 {
        return Err("customers must be at least 1".to_string());
    }
    if config.months == 0 {
        return Err("months must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&config.corrupt_ratio) {
        return Err("corrupt_ratio must be 0..1".to_string());
    }
    if !(0.0..=1.0).contains(&config.missing_base_ratio) {
        return Err("missing_base_ratio must be 0..1".to_string());
    }

    let end = config
        .start
        .checked_add_months(Months::new(config.months))
        .ok_or_else(|| "generation window overflows the calendar".to_string())?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut records = Vec::new();
    // One order id per (customer, day), so a shopping trip spans rows.
    let mut order_ids: HashMap<(usize, NaiveDate), String> = HashMap::new();

    for customer_idx in 0..config.customers {
        let customer_id = format!("C{:03}", customer_idx + 1);
        let basket_size = rng.gen_range(6..=12usize).min(CATALOG.len());
        let basket: Vec<&Product> = CATALOG
            .choose_multiple(&mut rng, basket_size)
            .collect();

        for product in basket {
            let personal_cadence = product.cadence_days * rng.gen_range(0.75..1.25);
            let mut date = config.start
                + Duration::days(rng.gen_range(0.0..personal_cadence).round() as i64);

            while date < end {
                let quantity = rng.gen_range(1..=3u32);
                let unit_price = round2(product.base_price * rng.gen_range(0.9..1.1));
                let total = unit_price * f64::from(quantity);

                let (base_price, total_price) = if rng.gen_bool(config.missing_base_ratio) {
                    (None, "N/A".to_string())
                } else if rng.gen_bool(config.corrupt_ratio) {
                    let suffix_len = rng.gen_range(1..=3);
                    let mut corrupted = format_amount(total);
                    corrupted.push_str(&random_digits(&mut rng, suffix_len));
                    (Some(unit_price), corrupted)
                } else {
                    (Some(unit_price), format_amount(total))
                };

                let order_id = order_ids
                    .entry((customer_idx, date))
                    .or_insert_with(|| Uuid::new_v4().to_string())
                    .clone();

                records.push(RawTransaction {
                    customer_id: customer_id.clone(),
                    order_id,
                    item_name: product.name.to_string(),
                    category: product.category.to_string(),
                    order_date: date.format("%Y-%m-%d").to_string(),
                    quantity,
                    base_price,
                    total_price,
                });

                let step = (personal_cadence + rng.gen_range(-3.0..=3.0)).max(1.0);
                date = date + Duration::days(step.round() as i64);
            }
        }
    }

    records.sort_by(|a, b| {
        a.order_date
            .cmp(&b.order_date)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    Ok(records)
}
