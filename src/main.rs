//! Storefront RFM: superstore dashboard report from the command line
//!
//! This is the main entrypoint that orchestrates data loading, filtering,
//! RFM scoring, the dashboard tables and chart output.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use polars::prelude::DataFrame;
use storefront_rfm::{build_rfm_table, classify, composite, logging, orders_frame, report, viz, Args, Dataset, Score};
use tracing::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    if let Some(scores) = args.parse_scores()? {
        run_classify_mode(scores);
    } else {
        run_dashboard(&args)?;
    }

    Ok(())
}

/// Print the composite and segment for a single set of scores
fn run_classify_mode((r, f, m): (Score, Score, Score)) {
    let rfm = composite(r, f, m);
    println!("=== Classify Mode ===");
    println!("Input scores: R={}, F={}, M={}", r, f, m);
    println!("\n✓ RFM score: {}", rfm);
    println!("  Segment: {}", classify(rfm));
}

/// Run the full dashboard pipeline for one filter selection
fn run_dashboard(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    let dataset = Dataset::new(&args.input);
    let orders = dataset
        .orders()
        .with_context(|| format!("Failed to load orders from {}", args.input))?;

    if args.verbose {
        println!("Loaded {} order lines from {}", orders.len(), dataset.path().display());
        println!("  Years: {:?}", dataset.years()?);
        println!("  Segments: {:?}", dataset.segments()?);
        println!("  Regions: {:?}", dataset.regions()?);
    }

    let filter = args.order_filter();
    let filtered = filter.apply(&orders);
    info!(year = %filter.year, orders = filtered.len(), "filter selected");

    let table = build_rfm_table(&filtered).context("Customer scoring failed for the selected filter")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    let frame = orders_frame(&filtered)?;
    print_sales_analysis(&frame, args.top)?;
    print_product_analysis(&frame, args.top)?;

    let summaries = report::segment_summary(&table);
    viz::print_segment_statistics(&table, &summaries);

    println!("\n=== Top {} Customers Generating the Most Profit ===", args.top);
    for record in report::top_customers_by_profit(&table, args.top) {
        println!(
            "  {:24} | {:13} | {:>10.2} | {:>10.2}",
            record.customer_name,
            record.customer_segment.label(),
            record.total_profit.unwrap_or_default(),
            record.monetary
        );
    }

    if let Some(ref plot) = args.plot {
        viz::generate_visualization_report(&summaries, plot)?;
        println!("\nSegment chart saved to: {}", plot);
        println!("Profit chart saved to: {}", viz::profit_chart_path(plot));
    }

    info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "dashboard complete");
    Ok(())
}

fn print_sales_analysis(orders: &DataFrame, top: usize) -> Result<()> {
    viz::print_kpis(&report::kpis(orders)?);

    println!("\n=== Monthly Sales Trend ===");
    for month in report::monthly_trend(orders)? {
        println!("  {:10} | {:>12.2} | {:>10.2}", month.month, month.total_sales, month.total_profit);
    }

    println!("\n=== Sales by State ===");
    for state in report::sales_by_state(orders)? {
        println!(
            "  {:20} | {:2} | {:>12.2}",
            state.state,
            state.state_code.unwrap_or("--"),
            state.total_sales
        );
    }

    println!("\n=== Top {} Cities by Sales ===", top);
    for city in report::top_cities(orders, top)? {
        println!("  {:20} | {:>12.2}", city.label, city.value);
    }

    println!("\n=== Orders by Category ===");
    for category in report::category_summary(orders)? {
        println!(
            "  {:16} | {:6} orders | {:>12.2}",
            category.category, category.total_orders, category.total_sales
        );
    }

    println!("\n=== Orders by Shipping Mode ===");
    for mode in report::orders_by_ship_mode(orders)? {
        println!("  {:16} | {:6}", mode.label, mode.value);
    }

    Ok(())
}

fn print_product_analysis(orders: &DataFrame, top: usize) -> Result<()> {
    println!("\n=== Sales by Sub-category ===");
    for sub in report::sales_by_subcategory(orders)? {
        println!("  {:14} | {:>12.2}", sub.label, sub.value);
    }

    let products = report::product_summary(orders)?;

    println!("\n=== Top {} Most Sold Products ===", top);
    for product in report::top_sold(&products, top) {
        println!("  {:6} | {}", product.quantity_sold, product.product_name);
    }

    println!("\n=== Top {} Most Profitable Products ===", top);
    for product in report::top_profitable(&products, top) {
        println!("  {:>10.2} | {}", product.total_profit, product.product_name);
    }

    Ok(())
}
