//! Per-customer recency, frequency and monetary summaries

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::data::{f64_values, i64_values, orders_frame, str_values, Order};
use crate::error::RfmError;

/// Customer identity used to key every per-customer table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CustomerKey {
    pub customer_id: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecencySummary {
    pub key: CustomerKey,
    pub last_transaction: NaiveDate,
    /// Days between the reference date and the last transaction
    pub recency: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySummary {
    pub key: CustomerKey,
    /// Distinct order ids, never zero
    pub frequency: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonetarySummary {
    pub key: CustomerKey,
    /// Sum of present sales values
    pub monetary: f64,
}

/// The three per-customer summaries, each sorted by customer key
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummaries {
    /// Latest order date in the filtered set plus one day
    pub reference_date: NaiveDate,
    pub recency: Vec<RecencySummary>,
    pub frequency: Vec<FrequencySummary>,
    pub monetary: Vec<MonetarySummary>,
}

impl CustomerSummaries {
    pub fn customer_count(&self) -> usize {
        self.recency.len()
    }
}

/// Collapse filtered orders into per-customer summaries
///
/// The reference date is shared by every customer: one day after the latest
/// order anywhere in the filtered set.
pub fn aggregate(orders: &[&Order]) -> Result<CustomerSummaries, RfmError> {
    if orders.is_empty() {
        return Err(RfmError::InsufficientData);
    }
    aggregate_frame(&orders_frame(orders)?)
}

/// Group an order frame (see [`orders_frame`]) by customer
pub fn aggregate_frame(df: &DataFrame) -> Result<CustomerSummaries, RfmError> {
    let latest = df
        .column("order_date")?
        .i32()?
        .max()
        .ok_or(RfmError::InsufficientData)?;
    let reference_days = latest + 1;
    let reference_date = NaiveDate::from_num_days_from_ce_opt(reference_days).ok_or(RfmError::InsufficientData)?;

    let per_customer = df
        .clone()
        .lazy()
        .group_by([col("customer_id"), col("customer_name")])
        .agg([
            // Most recent order date per customer
            col("order_date").max().alias("last_transaction"),
            // Multi-line orders count once
            col("order_id").n_unique().alias("frequency"),
            // Null sales are skipped
            col("sales").sum().alias("monetary"),
        ])
        .with_columns([(lit(reference_days) - col("last_transaction")).alias("recency")])
        .collect()?;

    let customer_ids = str_values(&per_customer, "customer_id")?;
    let customer_names = str_values(&per_customer, "customer_name")?;
    let last_transactions = i64_values(&per_customer, "last_transaction")?;
    let recencies = i64_values(&per_customer, "recency")?;
    let frequencies = i64_values(&per_customer, "frequency")?;
    let monetaries = f64_values(&per_customer, "monetary")?;

    let mut rows = Vec::with_capacity(per_customer.height());
    for i in 0..per_customer.height() {
        let key = CustomerKey {
            customer_id: customer_ids[i].clone(),
            customer_name: customer_names[i].clone(),
        };
        let last_transaction = last_transactions[i]
            .and_then(|days| i32::try_from(days).ok())
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or(RfmError::InsufficientData)?;

        rows.push((
            key,
            last_transaction,
            recencies[i].unwrap_or_default(),
            frequencies[i].unwrap_or_default() as usize,
            monetaries[i].unwrap_or_default(),
        ));
    }
    // Group order is unspecified; every summary table is keyed in customer order
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut recency = Vec::with_capacity(rows.len());
    let mut frequency = Vec::with_capacity(rows.len());
    let mut monetary = Vec::with_capacity(rows.len());

    for (key, last_transaction, days, orders, sales) in rows {
        recency.push(RecencySummary {
            key: key.clone(),
            last_transaction,
            recency: days,
        });
        frequency.push(FrequencySummary {
            key: key.clone(),
            frequency: orders,
        });
        monetary.push(MonetarySummary { key, monetary: sales });
    }

    tracing::info!(
        customers = recency.len(),
        reference_date = %reference_date,
        "customer summaries aggregated"
    );

    Ok(CustomerSummaries {
        reference_date,
        recency,
        frequency,
        monetary,
    })
}
