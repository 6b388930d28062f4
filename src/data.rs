//! Order loading using Polars and the load-once dataset cache

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::RfmError;

/// One order line item
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub customer_id: String,
    pub customer_name: String,
    pub order_id: String,
    pub order_date: NaiveDate,
    /// Line sales amount, `None` when the cell was null or unparsable
    pub sales: Option<f64>,
    pub profit: Option<f64>,
    /// Discount fraction in [0, 1]
    pub discount: Option<f64>,
    pub quantity: Option<i64>,
    pub segment: String,
    pub region: String,
    pub category: String,
    pub subcategory: String,
    pub state: String,
    pub city: String,
    pub ship_mode: String,
    pub product_name: String,
}

impl Order {
    pub fn year(&self) -> i32 {
        self.order_date.year()
    }
}

const KEY_COLUMNS: [&str; 4] = ["customer_id", "customer_name", "order_id", "order_date"];
const NUMERIC_COLUMNS: [&str; 3] = ["sales", "profit", "discount"];

/// Date layouts seen in exports of the superstore dataset
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Load order lines from a CSV file
///
/// # Arguments
/// * `file_path` - Path to the CSV file
///
/// # Returns
/// * Typed orders in file order. Rows missing a customer, order id or a
///   parseable order date are dropped; null numeric cells stay `None` so
///   aggregates can skip them instead of counting them as zero.
pub fn load_orders(file_path: impl AsRef<Path>) -> crate::Result<Vec<Order>> {
    let file_path = file_path.as_ref();

    // Read every column as text; numeric columns are cast below so a bad cell
    // becomes null rather than failing the whole load
    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    debug!(rows = df.height(), path = %file_path.display(), "csv loaded");

    let orders = orders_from_frame(&df)?;

    info!(orders = orders.len(), path = %file_path.display(), "orders ingested");
    Ok(orders)
}

/// Convert a text-typed DataFrame into typed orders
pub fn orders_from_frame(df: &DataFrame) -> crate::Result<Vec<Order>> {
    let [customer_ids, customer_names, order_ids, order_dates] = KEY_COLUMNS.map(|name| text_column(df, name, true));
    let (customer_ids, customer_names, order_ids, order_dates) =
        (customer_ids?, customer_names?, order_ids?, order_dates?);

    let [sales, profit, discount] = NUMERIC_COLUMNS.map(|name| numeric_column(df, name));
    let (sales, profit, discount) = (sales?, profit?, discount?);
    let quantity = integer_column(df, "quantity")?;

    let segment = text_column(df, "segment", false)?;
    let region = text_column(df, "region", false)?;
    let category = text_column(df, "category", false)?;
    let subcategory = text_column(df, "subcategory", false)?;
    let state = text_column(df, "state", false)?;
    let city = text_column(df, "city", false)?;
    let ship_mode = text_column(df, "ship_mode", false)?;
    let product_name = text_column(df, "product_name", false)?;

    let mut orders = Vec::with_capacity(df.height());
    let mut dropped = 0usize;

    for i in 0..df.height() {
        let key = (
            customer_ids[i].clone(),
            customer_names[i].clone(),
            order_ids[i].clone(),
            order_dates[i].as_deref().and_then(parse_order_date),
        );
        let (Some(customer_id), Some(customer_name), Some(order_id), Some(order_date)) = key else {
            dropped += 1;
            continue;
        };

        orders.push(Order {
            customer_id,
            customer_name,
            order_id,
            order_date,
            sales: sales[i],
            profit: profit[i],
            discount: discount[i],
            quantity: quantity[i],
            segment: segment[i].clone().unwrap_or_default(),
            region: region[i].clone().unwrap_or_default(),
            category: category[i].clone().unwrap_or_default(),
            subcategory: subcategory[i].clone().unwrap_or_default(),
            state: state[i].clone().unwrap_or_default(),
            city: city[i].clone().unwrap_or_default(),
            ship_mode: ship_mode[i].clone().unwrap_or_default(),
            product_name: product_name[i].clone().unwrap_or_default(),
        });
    }

    if dropped > 0 {
        warn!(dropped, "rows without customer, order id or order date were skipped");
    }

    Ok(orders)
}

/// Extract a text column. Blank cells are treated as null.
/// Optional columns that are absent yield all-null values.
fn text_column(df: &DataFrame, name: &str, required: bool) -> crate::Result<Vec<Option<String>>> {
    let series = match df.column(name) {
        Ok(series) => series,
        Err(_) if !required => return Ok(vec![None; df.height()]),
        Err(_) => return Err(RfmError::MissingColumn(name.to_string()).into()),
    };

    let text = series.cast(&DataType::String)?;
    let values = text
        .str()?
        .into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
        .collect();

    Ok(values)
}

fn numeric_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| RfmError::MissingColumn(name.to_string()))?;

    let numbers = series.cast(&DataType::Float64)?;
    let values = numbers
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect();

    Ok(values)
}

/// Whole-number column; a fractional or unparsable cell becomes null
fn integer_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<i64>>> {
    let series = df
        .column(name)
        .map_err(|_| RfmError::MissingColumn(name.to_string()))?;

    let numbers = series.cast(&DataType::Int64)?;
    Ok(numbers.i64()?.into_iter().collect())
}

/// Columnar view of orders for group-by aggregation
///
/// `order_date` is stored as days from the common era and `month` as the
/// calendar month number, so no temporal dtypes are needed.
pub fn orders_frame(orders: &[&Order]) -> PolarsResult<DataFrame> {
    let text = |name: &str, field: fn(&Order) -> &str| {
        Series::new(name, orders.iter().map(|o| field(o)).collect::<Vec<&str>>())
    };

    DataFrame::new(vec![
        text("customer_id", |o| o.customer_id.as_str()),
        text("customer_name", |o| o.customer_name.as_str()),
        text("order_id", |o| o.order_id.as_str()),
        Series::new(
            "order_date",
            orders.iter().map(|o| o.order_date.num_days_from_ce()).collect::<Vec<i32>>(),
        ),
        Series::new(
            "month",
            orders.iter().map(|o| o.order_date.month() as i32).collect::<Vec<i32>>(),
        ),
        Series::new("sales", orders.iter().map(|o| o.sales).collect::<Vec<Option<f64>>>()),
        Series::new("profit", orders.iter().map(|o| o.profit).collect::<Vec<Option<f64>>>()),
        Series::new("discount", orders.iter().map(|o| o.discount).collect::<Vec<Option<f64>>>()),
        Series::new("quantity", orders.iter().map(|o| o.quantity).collect::<Vec<Option<i64>>>()),
        text("segment", |o| o.segment.as_str()),
        text("region", |o| o.region.as_str()),
        text("category", |o| o.category.as_str()),
        text("subcategory", |o| o.subcategory.as_str()),
        text("state", |o| o.state.as_str()),
        text("city", |o| o.city.as_str()),
        text("ship_mode", |o| o.ship_mode.as_str()),
        text("product_name", |o| o.product_name.as_str()),
    ])
}

/// Read a text column of an aggregated frame
pub fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let values = df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let numbers = df.column(name)?.cast(&DataType::Float64)?;
    Ok(numbers.f64()?.into_iter().collect())
}

pub fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let numbers = df.column(name)?.cast(&DataType::Int64)?;
    Ok(numbers.i64()?.into_iter().collect())
}

/// Parse an order date; a time-of-day component is discarded
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// The static order dataset, loaded on first use and kept for the process lifetime
///
/// The dataset never changes, so there is no invalidation.
#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    orders: OnceLock<Arc<[Order]>>,
}

impl Dataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            orders: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.orders.get().is_some()
    }

    /// All orders, loading the file on the first call
    pub fn orders(&self) -> crate::Result<Arc<[Order]>> {
        if let Some(orders) = self.orders.get() {
            return Ok(Arc::clone(orders));
        }

        let loaded: Arc<[Order]> = load_orders(&self.path)?.into();
        // A concurrent caller may have won the race; either copy is identical
        let orders = self.orders.get_or_init(|| loaded);
        Ok(Arc::clone(orders))
    }

    /// Order years, newest first
    pub fn years(&self) -> crate::Result<Vec<i32>> {
        let mut years: Vec<i32> = self.orders()?.iter().map(Order::year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }

    /// Customer segments in order of first appearance
    pub fn segments(&self) -> crate::Result<Vec<String>> {
        Ok(distinct_in_order(self.orders()?.iter().map(|o| o.segment.as_str())))
    }

    /// Regions in order of first appearance
    pub fn regions(&self) -> crate::Result<Vec<String>> {
        Ok(distinct_in_order(self.orders()?.iter().map(|o| o.region.as_str())))
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for value in values {
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}
