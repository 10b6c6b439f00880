use crate::error::DataFormatError;
use crate::models::{RawTransaction, Transaction};
use chrono::{Datelike, NaiveDate};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Builds the cleaned table. Row count is preserved: rows are repaired,
/// never dropped. Any unparseable order date rejects the whole dataset.
pub fn normalize(raw: Vec<RawTransaction>) -> Result<Vec<Transaction>, DataFormatError> {
    let mut cleaned = Vec::with_capacity(raw.len());
    for (idx, row) in raw.into_iter().enumerate() {
        let row_number = idx + 1;
        let order_date =
            parse_order_date(&row.order_date).ok_or_else(|| DataFormatError::BadOrderDate {
                row: row_number,
                value: row.order_date.clone(),
            })?;

        let clean_price = clean_price(&row.total_price, row.base_price);
        if clean_price.is_none() {
            log::warn!(
                "row {}: total price '{}' unrecoverable and no base price; clean price missing",
                row_number,
                row.total_price
            );
        }

        cleaned.push(Transaction {
            customer_id: row.customer_id,
            order_id: row.order_id,
            item_name: row.item_name,
            category: row.category,
            order_date,
            month: order_date.month(),
            year: order_date.year(),
            quantity: row.quantity,
            base_price: row.base_price,
            clean_price,
        });
    }
    Ok(cleaned)
}

pub fn parse_order_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Repaired price for a row: the recovered total price when the text yields
/// one, otherwise the base price, otherwise missing.
pub fn clean_price(total_price: &str, base_price: Option<f64>) -> Option<f64> {
    repair_total_price(total_price).or(base_price)
}

/// Recovers a price from a corrupted total-price field. The export is known
/// to concatenate stray digits after the cents, so everything past the first
/// two fractional digits is noise. Non-digit/non-dot characters are stripped
/// first; anything after a second dot is discarded.
pub fn repair_total_price(raw: &str) -> Option<f64> {
    let filtered: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    if filtered.is_empty() {
        return None;
    }

    let candidate = match filtered.split_once('.') {
        Some((whole, rest)) => {
            let cents: String = rest
                .chars()
                .take_while(|ch| ch.is_ascii_digit())
                .take(2)
                .collect();
            if whole.is_empty() && cents.is_empty() {
                return None;
            }
            format!("{whole}.{cents}")
        }
        None => filtered,
    };

    candidate.parse::<f64>().ok()
}
