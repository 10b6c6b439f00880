mod analyzer;
mod error;
mod generator;
mod logging;
mod models;
mod normalize;
mod preflight;
mod util;

use analyzer::{
    PurchaseAnalyzer, DEFAULT_MIN_PURCHASES, DEFAULT_TARGET_INTERVAL_DAYS,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use generator::{generate_records, GeneratorConfig};
use models::RawTransaction;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "bucketlist-demo")]
#[command(about = "Repeat-purchase bucket list analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a synthetic transaction log
    Generate(GenerateArgs),
    /// Audit an input CSV before loading it
    Preflight(PreflightArgs),
    /// List customer ids
    Customers(TableArgs),
    /// List product categories
    Categories(TableArgs),
    /// Show a customer's purchases
    Purchases(PurchasesArgs),
    /// Show per-product purchase statistics for a customer
    Patterns(CustomerArgs),
    /// Rank bucket-list recommendations for a customer
    Recommend(RecommendArgs),
    /// Per-category spending summary for a customer
    Summary(SummaryArgs),
    /// Monthly spending trends for a customer
    Trends(CustomerArgs),
}

#[derive(Parser)]
struct GenerateArgs {
    #[arg(long, default_value_t = 25)]
    customers: usize,
    #[arg(long, default_value_t = 12)]
    months: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 0.05)]
    corrupt_ratio: f64,
    #[arg(long, default_value_t = 0.01)]
    missing_base_ratio: f64,
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    output: PathBuf,
}

#[derive(Parser)]
struct PreflightArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
}

#[derive(Parser)]
struct TableArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser)]
struct CustomerArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
    #[arg(long)]
    customer: String,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser)]
struct PurchasesArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
    #[arg(long)]
    customer: String,
    #[arg(long)]
    month: Option<u32>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser)]
struct RecommendArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
    #[arg(long)]
    customer: String,
    #[arg(long, default_value_t = DEFAULT_MIN_PURCHASES)]
    min_purchases: u32,
    #[arg(long, default_value_t = DEFAULT_TARGET_INTERVAL_DAYS)]
    target_interval_days: f64,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser)]
struct SummaryArgs {
    #[arg(long, default_value = "data/synthetic/purchases.csv")]
    input: PathBuf,
    #[arg(long)]
    customer: String,
    #[arg(long)]
    month: Option<u32>,
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    logging::init_logging("bucketlist-demo")?;
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Preflight(args) => run_preflight(args),
        Command::Customers(args) => run_customers(args),
        Command::Categories(args) => run_categories(args),
        Command::Purchases(args) => run_purchases(args),
        Command::Patterns(args) => run_patterns(args),
        Command::Recommend(args) => run_recommend(args),
        Command::Summary(args) => run_summary(args),
        Command::Trends(args) => run_trends(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), String> {
    let seed = args.seed.unwrap_or_else(random_seed);
    let config = GeneratorConfig {
        customers: args.customers,
        months: args.months,
        start: resolve_start(args.months)?,
        corrupt_ratio: args.corrupt_ratio,
        missing_base_ratio: args.missing_base_ratio,
    };

    log::info!(
        "Generating {} months of purchases for {} customers (seed {}, corrupt_ratio {}, missing_base_ratio {})",
        config.months,
        config.customers,
        seed,
        config.corrupt_ratio,
        config.missing_base_ratio
    );

    let gen_start = Instant::now();
    let records = generate_records(&config, seed)?;
    let gen_elapsed = gen_start.elapsed();
    write_csv(&args.output, &records)?;

    log::info!(
        "generated {} records starting {}, seed {}, output {}",
        records.len(),
        config.start,
        seed,
        args.output.display()
    );
    emit_info_line(&format!("Generation time: {} ms", gen_elapsed.as_millis()));

    let report = preflight::preflight_csv(&args.output)?;
    log_preflight_report(&report);
    Ok(())
}

fn run_preflight(args: PreflightArgs) -> Result<(), String> {
    let report = preflight::preflight_csv(&args.input)?;
    log_preflight_report(&report);

    emit_issue_summary("error", &report.issues, preflight::IssueLevel::Error);
    emit_issue_summary("warning", &report.issues, preflight::IssueLevel::Warning);

    if report.error_count() > 0 {
        return Err(format!(
            "preflight failed with {} error(s)",
            report.error_count()
        ));
    }
    Ok(())
}

fn run_customers(args: TableArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let customers = analyzer.customers();
    if args.json {
        return print_json(&customers);
    }
    for customer in &customers {
        println!("{customer}");
    }
    emit_info_line(&format!("{} customer(s)", customers.len()));
    Ok(())
}

fn run_categories(args: TableArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let categories = analyzer.categories();
    if args.json {
        return print_json(&categories);
    }
    for category in &categories {
        println!("{category}");
    }
    emit_info_line(&format!("{} categories", categories.len()));
    Ok(())
}

fn run_purchases(args: PurchasesArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let purchases = analyzer.purchases(&args.customer, args.month, args.category.as_deref());
    if args.json {
        return print_json(&purchases);
    }
    for tx in &purchases {
        let price = match tx.clean_price {
            Some(price) => format!("{price:.2}"),
            None => "-".to_string(),
        };
        println!(
            "{}  {}  {} ({})  qty {}  {}",
            tx.order_date, tx.order_id, tx.item_name, tx.category, tx.quantity, price
        );
    }
    emit_info_line(&format!(
        "{} purchase(s) for {}",
        purchases.len(),
        args.customer
    ));
    Ok(())
}

fn run_patterns(args: CustomerArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let patterns = analyzer.purchase_patterns(&args.customer);
    if args.json {
        return print_json(&patterns);
    }
    for pattern in &patterns {
        println!(
            "{} ({}): {} purchase(s), avg every {:.1} days, avg price {:.2}, qty {}, span {}d",
            pattern.item_name,
            pattern.category,
            pattern.purchase_count,
            pattern.avg_interval,
            pattern.avg_price,
            pattern.total_quantity,
            pattern.days_span
        );
    }
    emit_info_line(&format!(
        "{} product(s) for {}",
        patterns.len(),
        args.customer
    ));
    Ok(())
}

fn run_recommend(args: RecommendArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let recommendations = analyzer.recommendations(
        &args.customer,
        args.min_purchases,
        args.target_interval_days,
    );
    if args.json {
        return print_json(&recommendations);
    }
    for (idx, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} ({}) - {} (avg price {:.2})",
            idx + 1,
            rec.item,
            rec.category,
            rec.recommendation_reason,
            rec.avg_price
        );
    }
    emit_info_line(&format!(
        "{} recommendation(s) for {} (min_purchases {}, target {} days)",
        recommendations.len(),
        args.customer,
        args.min_purchases.max(1),
        args.target_interval_days
    ));
    Ok(())
}

fn run_summary(args: SummaryArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let summary = analyzer.spending_summary(&args.customer, args.month);
    if args.json {
        return print_json(&summary);
    }
    for row in &summary {
        println!(
            "{}: {:.2} across {} order(s), {} item(s)",
            row.category, row.total_spent, row.num_orders, row.num_items
        );
    }
    emit_info_line(&format!(
        "{} categories for {}",
        summary.len(),
        args.customer
    ));
    Ok(())
}

fn run_trends(args: CustomerArgs) -> Result<(), String> {
    let analyzer = load_analyzer(&args.input)?;
    let trends = analyzer.monthly_trends(&args.customer);
    if args.json {
        return print_json(&trends);
    }
    for row in &trends {
        println!("month {:>2}  {}: {:.2}", row.month, row.category, row.total_spent);
    }
    emit_info_line(&format!(
        "{} month-category pair(s) for {}",
        trends.len(),
        args.customer
    ));
    Ok(())
}

fn load_analyzer(input: &Path) -> Result<PurchaseAnalyzer, String> {
    let load_start = Instant::now();
    let analyzer = PurchaseAnalyzer::from_path(input).map_err(|err| err.to_string())?;
    log::info!(
        "loaded {} transaction(s) from {} in {} ms",
        analyzer.records().len(),
        input.display(),
        load_start.elapsed().as_millis()
    );
    Ok(analyzer)
}

fn log_preflight_report(report: &preflight::PreflightReport) {
    emit_info_line(&format!(
        "Preflight: rows={} customers={} categories={}",
        report.total_rows, report.customers, report.categories
    ));
    emit_info_line(&format!(
        "Prices: repaired={} from_base={} missing={}",
        report.prices_repaired, report.prices_from_base, report.prices_missing
    ));
    emit_info_line(&format!(
        "Preflight issues: errors={} warnings={}",
        report.error_count(),
        report.warning_count()
    ));
}

fn emit_issue_summary(
    label: &str,
    issues: &[preflight::PreflightIssue],
    level: preflight::IssueLevel,
) {
    let mut counts = std::collections::HashMap::new();
    for issue in issues.iter().filter(|issue| issue.level == level) {
        *counts.entry(issue.message.as_str()).or_insert(0usize) += 1;
    }
    if counts.is_empty() {
        return;
    }

    let mut items: Vec<(&str, usize)> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let max_items = 5usize;
    for (message, count) in items.iter().take(max_items) {
        emit_info_line(&format!("Preflight {}s: {} = {}", label, message, count));
    }
    if items.len() > max_items {
        emit_info_line(&format!(
            "Preflight {}s: {} additional issue types not shown",
            label,
            items.len() - max_items
        ));
    }
}

fn resolve_start(months: u32) -> Result<NaiveDate, String> {
    let today = Utc::now().date_naive();
    let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .ok_or_else(|| "could not resolve the current month".to_string())?;
    month_start
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| "generation window reaches before the calendar".to_string())
}

fn random_seed() -> u64 {
    let mut rng = rand::rngs::OsRng;
    rng.gen()
}

fn write_csv(output: &Path, records: &[RawTransaction]) -> Result<(), String> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    let mut writer = csv::Writer::from_path(output).map_err(|err| err.to_string())?;
    for record in records {
        writer.serialize(record).map_err(|err| err.to_string())?;
    }
    writer.flush().map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn emit_info_line(message: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{}", message);
    } else {
        println!("{message}");
    }
}
