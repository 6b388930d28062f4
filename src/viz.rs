//! Segment charts using Plotters, plus console tables

use plotters::prelude::*;

use crate::model::RfmTable;
use crate::report::{Kpis, SegmentSummary};
use crate::segment::Segment;

/// One color per segment, in `Segment::ALL` order
const SEGMENT_COLORS: [RGBColor; 5] = [
    GREEN,
    BLUE,
    CYAN,
    RED,
    RGBColor(128, 128, 128),
];

fn segment_color(segment: Segment) -> RGBColor {
    let index = Segment::ALL.iter().position(|&s| s == segment).unwrap_or(0);
    SEGMENT_COLORS[index]
}

/// Bar heights for a per-segment chart, one entry per segment in display order
pub fn segment_bars(summaries: &[SegmentSummary], value: impl Fn(&SegmentSummary) -> f64) -> Vec<(Segment, f64)> {
    Segment::ALL
        .iter()
        .map(|&segment| {
            let height = summaries
                .iter()
                .find(|s| s.segment == segment)
                .map_or(0.0, &value);
            (segment, height)
        })
        .collect()
}

/// Y range covering every bar and the zero line, padded by 10%
fn value_range(bars: &[(Segment, f64)]) -> (f64, f64) {
    let max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let min = bars.iter().map(|(_, v)| *v).fold(0.0, f64::min);
    let pad = ((max - min) * 0.1).max(1.0);
    (if min < 0.0 { min - pad } else { 0.0 }, max + pad)
}

/// Draw a bar chart with one bar per segment
pub fn create_segment_bar_chart(
    bars: &[(Segment, f64)],
    title: &str,
    y_desc: &str,
    output_path: &str,
) -> crate::Result<()> {
    let (y_min, y_max) = value_range(bars);

    let root = BitMapBackend::new(output_path, (700, 450)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(bars.len() as f64 - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x: &f64| {
            let index = x.round();
            if index < 0.0 {
                return String::new();
            }
            bars.get(index as usize)
                .map(|(segment, _)| segment.label().to_string())
                .unwrap_or_default()
        })
        .x_desc("Customer Segment")
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, &(segment, height)) in bars.iter().enumerate() {
        let color = segment_color(segment);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, height)],
            color.filled(),
        )))?;
    }

    root.present()?;
    tracing::info!(path = output_path, "chart saved");

    Ok(())
}

/// Print the segment breakdown to the console
pub fn print_segment_statistics(table: &RfmTable, summaries: &[SegmentSummary]) {
    println!("\n=== Customer Segmentation (RFM) ===");
    println!("Scored customers: {}", table.len());
    println!("Reference date: {}", table.reference_date);

    println!("\n  Segment        | Customers |  Share | Total Profit | Avg Discount");
    println!("  ---------------|-----------|--------|--------------|-------------");
    for summary in summaries {
        let discount = summary
            .avg_discount
            .map_or_else(|| "-".to_string(), |d| format!("{:.2}", d));
        println!(
            "  {:14} | {:9} | {:5.1}% | {:12.2} | {:>12}",
            summary.segment.label(),
            summary.customers,
            summary.share * 100.0,
            summary.total_profit,
            discount
        );
    }
}

pub fn print_kpis(kpis: &Kpis) {
    println!("\n=== KPI Metrics ===");
    println!("Total Sales:         ${:.2}M", kpis.total_sales / 1_000_000.0);
    println!("Total Profit:        ${:.2}K", kpis.total_profit / 1_000.0);
    println!("Total Transactions:  {}", kpis.total_orders);
    println!("Total Quantity Sold: {}", kpis.quantity_sold);
}

/// Render the segment proportion and profit-by-segment charts
///
/// The profit chart is written next to `base_output_path` with a `_profit` suffix.
pub fn generate_visualization_report(summaries: &[SegmentSummary], base_output_path: &str) -> crate::Result<()> {
    let customers = segment_bars(summaries, |s| s.customers as f64);
    create_segment_bar_chart(
        &customers,
        "Customer Segmentation (RFM)",
        "Number of Customers",
        base_output_path,
    )?;

    let profit = segment_bars(summaries, |s| s.total_profit);
    let profit_path = profit_chart_path(base_output_path);
    create_segment_bar_chart(&profit, "Total Profit by Customer Segment", "Total Profit ($)", &profit_path)?;

    Ok(())
}

pub fn profit_chart_path(base_output_path: &str) -> String {
    match base_output_path.strip_suffix(".png") {
        Some(stem) => format!("{}_profit.png", stem),
        None => format!("{}_profit.png", base_output_path),
    }
}
