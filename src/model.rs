//! RFM table: scored, segmented customers joined with their profitability

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::aggregate::{aggregate_frame, CustomerSummaries};
use crate::data::{f64_values, i64_values, orders_frame, Order};
use crate::error::RfmError;
use crate::score::{score_frequency, score_monetary, score_recency, Score};
use crate::segment::{classify, composite, Segment};

/// One scored customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmRecord {
    pub customer_id: String,
    pub customer_name: String,
    pub last_transaction: NaiveDate,
    pub recency: i64,
    pub frequency: usize,
    pub monetary: f64,
    pub r_score: Score,
    pub f_score: Score,
    pub m_score: Score,
    pub rfm_score: u16,
    pub customer_segment: Segment,
    /// `None` when the customer had no profit rows to join
    pub total_profit: Option<f64>,
    pub avg_discount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmTable {
    pub reference_date: NaiveDate,
    /// One record per customer, ordered by customer id then name
    pub records: Vec<RfmRecord>,
}

impl RfmTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Customers per segment, in [`Segment::ALL`] order
    pub fn segment_counts(&self) -> Vec<(Segment, usize)> {
        Segment::ALL
            .iter()
            .map(|&segment| {
                let count = self
                    .records
                    .iter()
                    .filter(|r| r.customer_segment == segment)
                    .count();
                (segment, count)
            })
            .collect()
    }
}

/// Total profit and mean discount per customer id
///
/// Null profits are skipped by the sum (an all-null customer totals 0.0);
/// null discounts are skipped by the mean (an all-null customer averages to null).
pub fn profitability_frame(orders: LazyFrame) -> LazyFrame {
    orders.group_by([col("customer_id")]).agg([
        col("profit").sum().alias("total_profit"),
        col("discount").mean().alias("avg_discount"),
    ])
}

/// Build the full RFM table for a filtered order set
///
/// # Arguments
/// * `orders` - Orders passing the active filter
///
/// # Returns
/// * Every customer scored, segmented and joined with profitability, or the
///   reason the set cannot be scored. Nothing partial is ever returned.
pub fn build_rfm_table(orders: &[&Order]) -> Result<RfmTable, RfmError> {
    if orders.is_empty() {
        return Err(RfmError::InsufficientData);
    }
    let frame = orders_frame(orders)?;
    let summaries = aggregate_frame(&frame)?;

    let r_scores = score_recency(&summaries.recency)?;
    let f_scores = score_frequency(&summaries.frequency)?;
    let m_scores = score_monetary(&summaries.monetary)?;

    let (total_profit, avg_discount) = join_profitability(&frame, &summaries)?;

    let records: Vec<RfmRecord> = summaries
        .recency
        .iter()
        .zip(&summaries.frequency)
        .zip(&summaries.monetary)
        .enumerate()
        .map(|(i, ((recency, frequency), monetary))| {
            let (r_score, f_score, m_score) = (r_scores[i], f_scores[i], m_scores[i]);
            let rfm_score = composite(r_score, f_score, m_score);

            RfmRecord {
                customer_id: recency.key.customer_id.clone(),
                customer_name: recency.key.customer_name.clone(),
                last_transaction: recency.last_transaction,
                recency: recency.recency,
                frequency: frequency.frequency,
                monetary: monetary.monetary,
                r_score,
                f_score,
                m_score,
                rfm_score,
                customer_segment: classify(rfm_score),
                total_profit: total_profit[i],
                avg_discount: avg_discount[i],
            }
        })
        .collect();

    info!(customers = records.len(), "rfm table built");

    Ok(RfmTable {
        reference_date: summaries.reference_date,
        records,
    })
}

/// Left-join profitability onto the scored customers by customer id
///
/// Returns profit and discount columns aligned with the summary order.
fn join_profitability(
    frame: &DataFrame,
    summaries: &CustomerSummaries,
) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>), RfmError> {
    let customers = summaries.customer_count();
    let ids: Vec<&str> = summaries
        .recency
        .iter()
        .map(|r| r.key.customer_id.as_str())
        .collect();
    let rows: Vec<i64> = (0..customers as i64).collect();
    let scored = DataFrame::new(vec![Series::new("customer_id", ids), Series::new("row", rows)])?;

    let joined = scored
        .lazy()
        .left_join(profitability_frame(frame.clone().lazy()), col("customer_id"), col("customer_id"))
        .collect()?;

    let mut total_profit = vec![None; customers];
    let mut avg_discount = vec![None; customers];
    let profits = f64_values(&joined, "total_profit")?;
    let discounts = f64_values(&joined, "avg_discount")?;

    for (i, row) in i64_values(&joined, "row")?.into_iter().enumerate() {
        let Some(row) = row.map(|r| r as usize).filter(|&r| r < customers) else {
            continue;
        };
        total_profit[row] = profits[i];
        avg_discount[row] = discounts[i];
    }

    Ok((total_profit, avg_discount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::str_values;

    fn line(customer: usize, order_id: &str, day: u32, sales: f64, profit: Option<f64>, discount: Option<f64>) -> Order {
        Order {
            customer_id: format!("C-{:02}", customer),
            customer_name: format!("Customer {}", customer),
            order_id: order_id.to_string(),
            order_date: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap() + chrono::Days::new(u64::from(day)),
            sales: Some(sales),
            profit,
            discount,
            quantity: Some(1),
            segment: "Consumer".to_string(),
            region: "West".to_string(),
            category: String::new(),
            subcategory: String::new(),
            state: String::new(),
            city: String::new(),
            ship_mode: String::new(),
            product_name: String::new(),
        }
    }

    /// Customer i orders i times, spends 100 * i, last ordered 5 * i days before the end
    fn create_test_orders() -> Vec<Order> {
        let mut orders = Vec::new();
        for customer in 1..=10usize {
            let last_day = 100 - 5 * customer as u32;
            for n in 0..customer {
                orders.push(line(
                    customer,
                    &format!("O-{}-{}", customer, n),
                    last_day - n as u32,
                    100.0,
                    Some(10.0),
                    Some(0.1 * n as f64),
                ));
            }
        }
        orders
    }

    #[test]
    fn test_build_rfm_table() {
        let orders = create_test_orders();
        let refs: Vec<&Order> = orders.iter().collect();

        let table = build_rfm_table(&refs).unwrap();
        assert_eq!(table.len(), 10);

        for record in &table.records {
            assert_eq!(
                record.rfm_score,
                100 * record.r_score.get() as u16 + 10 * record.f_score.get() as u16 + record.m_score.get() as u16
            );
            assert_eq!(record.customer_segment, classify(record.rfm_score));
            assert!(record.total_profit.is_some());
        }

        // Customer 1 ordered most recently but least often and for the least money
        let first = &table.records[0];
        assert_eq!(first.customer_id, "C-01");
        assert_eq!((first.r_score.get(), first.f_score.get(), first.m_score.get()), (5, 1, 1));
        assert_eq!(first.rfm_score, 511);
        assert_eq!(first.customer_segment, Segment::Champions);
    }

    #[test]
    fn test_profitability_join() {
        let orders = create_test_orders();
        let refs: Vec<&Order> = orders.iter().collect();
        let table = build_rfm_table(&refs).unwrap();

        let third = table.records.iter().find(|r| r.customer_id == "C-03").unwrap();
        assert_eq!(third.total_profit, Some(30.0));
        let avg = third.avg_discount.unwrap();
        assert!((avg - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_null_discounts_average_to_none() {
        let orders = vec![
            line(1, "O-1", 1, 5.0, None, None),
            line(2, "O-2", 1, 5.0, Some(4.0), Some(0.2)),
            line(2, "O-3", 2, 5.0, Some(-1.0), None),
        ];
        let refs: Vec<&Order> = orders.iter().collect();

        let profits = profitability_frame(orders_frame(&refs).unwrap().lazy())
            .collect()
            .unwrap();

        let mut rows: Vec<(String, Option<f64>, Option<f64>)> = str_values(&profits, "customer_id")
            .unwrap()
            .into_iter()
            .zip(f64_values(&profits, "total_profit").unwrap())
            .zip(f64_values(&profits, "avg_discount").unwrap())
            .map(|((id, profit), discount)| (id, profit, discount))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(rows[0], ("C-01".to_string(), Some(0.0), None));
        // The missing discount on O-3 does not drag the mean down
        assert_eq!(rows[1], ("C-02".to_string(), Some(3.0), Some(0.2)));
    }

    #[test]
    fn test_join_keys_on_customer_id_only() {
        let mut orders = create_test_orders();
        // Same id under a second name: both rows receive the id-wide totals
        let mut renamed = line(4, "O-extra", 1, 100.0, Some(5.0), Some(0.0));
        renamed.customer_name = "Customer 4 (renamed)".to_string();
        orders.push(renamed);
        let refs: Vec<&Order> = orders.iter().collect();

        let table = build_rfm_table(&refs).unwrap();
        let fours: Vec<&RfmRecord> = table.records.iter().filter(|r| r.customer_id == "C-04").collect();
        assert_eq!(fours.len(), 2);
        for record in fours {
            assert_eq!(record.total_profit, Some(45.0));
        }
    }

    #[test]
    fn test_too_few_customers() {
        let orders: Vec<Order> = (1..=3).map(|c| line(c, &format!("O-{}", c), c as u32, 10.0, None, None)).collect();
        let refs: Vec<&Order> = orders.iter().collect();

        assert!(matches!(
            build_rfm_table(&refs),
            Err(RfmError::InsufficientPopulation { customers: 3, .. })
        ));
    }

    #[test]
    fn test_empty_filter_result() {
        assert_eq!(build_rfm_table(&[]), Err(RfmError::InsufficientData));
    }

    #[test]
    fn test_segment_counts_cover_everyone() {
        let orders = create_test_orders();
        let refs: Vec<&Order> = orders.iter().collect();
        let table = build_rfm_table(&refs).unwrap();

        let total: usize = table.segment_counts().iter().map(|(_, count)| count).sum();
        assert_eq!(total, table.len());
    }
}
