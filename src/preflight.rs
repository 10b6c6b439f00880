use crate::models::RawTransaction;
use crate::normalize::{clean_price, parse_order_date, repair_total_price};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct PreflightIssue {
    pub level: IssueLevel,
    pub message: String,
}

/// Audit of an input CSV before it is loaded. Errors predict a fatal load;
/// warnings describe rows the normalizer will repair or carry with a missing
/// clean price.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub total_rows: usize,
    pub customers: usize,
    pub categories: usize,
    pub prices_repaired: usize,
    pub prices_from_base: usize,
    pub prices_missing: usize,
    pub issues: Vec<PreflightIssue>,
}

impl PreflightReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.level == IssueLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.level == IssueLevel::Warning)
            .count()
    }
}

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

pub fn preflight_csv(path: &Path) -> Result<PreflightReport, String> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| err.to_string())?;
    let headers = reader.headers().map_err(|err| err.to_string())?.clone();

    let mut report = PreflightReport {
        total_rows: 0,
        customers: 0,
        categories: 0,
        prices_repaired: 0,
        prices_from_base: 0,
        prices_missing: 0,
        issues: Vec::new(),
    };

    let mut columns_ok = true;
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == *column) {
            columns_ok = false;
            report.issues.push(issue(
                IssueLevel::Error,
                format!("missing required column: {column}"),
            ));
        }
    }
    if !columns_ok {
        return Ok(report);
    }

    let mut customers: HashSet<String> = HashSet::new();
    let mut categories: HashSet<String> = HashSet::new();

    for result in reader.deserialize() {
        let record: RawTransaction = match result {
            Ok(record) => record,
            Err(err) => {
                report.issues.push(issue(
                    IssueLevel::Error,
                    format!("unreadable record ({err})"),
                ));
                continue;
            }
        };
        report.total_rows += 1;

        validate_row(&record, &mut report);
        classify_price(&record, &mut report);

        customers.insert(record.customer_id);
        categories.insert(record.category);
    }

    report.customers = customers.len();
    report.categories = categories.len();
    Ok(report)
}

fn validate_row(record: &RawTransaction, report: &mut PreflightReport) {
    if record.customer_id.trim().is_empty() {
        report.issues.push(issue(
            IssueLevel::Error,
            "CustomerID is required".to_string(),
        ));
    }
    if record.order_id.trim().is_empty() {
        report.issues.push(issue(
            IssueLevel::Error,
            "OrderID is required".to_string(),
        ));
    }
    if record.item_name.trim().is_empty() {
        report.issues.push(issue(
            IssueLevel::Error,
            "Item Name is required".to_string(),
        ));
    }
    if record.category.trim().is_empty() {
        report.issues.push(issue(
            IssueLevel::Error,
            "Category is required".to_string(),
        ));
    }
    if parse_order_date(&record.order_date).is_none() {
        report.issues.push(issue(
            IssueLevel::Error,
            "unparseable order date".to_string(),
        ));
    }
    if record.quantity == 0 {
        report.issues.push(issue(
            IssueLevel::Warning,
            "quantity is zero".to_string(),
        ));
    }
}

fn classify_price(record: &RawTransaction, report: &mut PreflightReport) {
    let plain = record.total_price.trim().parse::<f64>().ok();
    if let Some(repaired) = repair_total_price(&record.total_price) {
        // Corrupted totals are still numeric text, so "repaired" means the
        // recovery rule changed the value, not just that parsing failed.
        if plain != Some(repaired) {
            report.prices_repaired += 1;
        }
        return;
    }

    if clean_price(&record.total_price, record.base_price).is_some() {
        report.prices_from_base += 1;
        report.issues.push(issue(
            IssueLevel::Warning,
            "total price unrecoverable, base price will be used".to_string(),
        ));
    } else {
        report.prices_missing += 1;
        report.issues.push(issue(
            IssueLevel::Warning,
            "no recoverable price, row will carry no clean price".to_string(),
        ));
    }
}

fn issue(level: IssueLevel, message: String) -> PreflightIssue {
    PreflightIssue { level, message }
}
