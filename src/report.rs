//! Dashboard tables built from the filtered order frame and the RFM table
//!
//! Order-level tables are polars group-bys over [`crate::data::orders_frame`];
//! rendering is left to the caller.
//! Rankings break ties by name so repeated runs print identical tables.

use std::cmp::Ordering;

use chrono::Month;
use polars::prelude::*;
use serde::Serialize;

use crate::data::{f64_values, i64_values, str_values};
use crate::model::{RfmRecord, RfmTable};
use crate::segment::Segment;

/// Headline metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_orders: usize,
    pub quantity_sold: i64,
}

pub fn kpis(orders: &DataFrame) -> crate::Result<Kpis> {
    let totals = orders
        .clone()
        .lazy()
        .select([
            col("sales").sum(),
            col("profit").sum(),
            col("order_id").n_unique(),
            col("quantity").sum(),
        ])
        .collect()?;

    let first_f64 = |name: &str| -> crate::Result<f64> {
        Ok(f64_values(&totals, name)?.first().copied().flatten().unwrap_or_default())
    };
    let first_i64 = |name: &str| -> crate::Result<i64> {
        Ok(i64_values(&totals, name)?.first().copied().flatten().unwrap_or_default())
    };

    Ok(Kpis {
        total_sales: first_f64("sales")?,
        total_profit: first_f64("profit")?,
        total_orders: first_i64("order_id")? as usize,
        quantity_sold: first_i64("quantity")?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub month: String,
    pub month_number: u32,
    pub total_sales: f64,
    pub total_profit: f64,
}

/// Sales and profit per calendar month across all selected years,
/// January first. Months without orders are omitted.
pub fn monthly_trend(orders: &DataFrame) -> crate::Result<Vec<MonthlyTotals>> {
    let months = group_by(orders, "month", [col("sales").sum(), col("profit").sum()])?;

    let numbers = i64_values(&months, "month")?;
    let sales = f64_values(&months, "sales")?;
    let profit = f64_values(&months, "profit")?;

    let mut trend: Vec<MonthlyTotals> = (0..months.height())
        .map(|i| {
            let month_number = numbers[i].unwrap_or_default() as u32;
            MonthlyTotals {
                month: month_name(month_number),
                month_number,
                total_sales: sales[i].unwrap_or_default(),
                total_profit: profit[i].unwrap_or_default(),
            }
        })
        .collect();
    trend.sort_by_key(|m| m.month_number);

    Ok(trend)
}

fn month_name(month_number: u32) -> String {
    u8::try_from(month_number)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}

/// A labelled total, used for every single-dimension breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSales {
    pub state: String,
    /// USPS code for the choropleth; `None` for unknown states
    pub state_code: Option<&'static str>,
    pub total_sales: f64,
}

/// Sales per state, alphabetical
pub fn sales_by_state(orders: &DataFrame) -> crate::Result<Vec<StateSales>> {
    let states = sum_by(orders, "state", col("sales").sum())?
        .into_iter()
        .map(|row| StateSales {
            state_code: state_code(&row.label),
            state: row.label,
            total_sales: row.value,
        })
        .collect();
    Ok(states)
}

/// Cities with the highest sales
pub fn top_cities(orders: &DataFrame, n: usize) -> crate::Result<Vec<Breakdown>> {
    Ok(top_n(sum_by(orders, "city", col("sales").sum())?, n))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub total_orders: usize,
    pub total_sales: f64,
}

/// Distinct orders and sales per product category
pub fn category_summary(orders: &DataFrame) -> crate::Result<Vec<CategorySummary>> {
    let categories = group_by(
        orders,
        "category",
        [col("order_id").n_unique().alias("total_orders"), col("sales").sum()],
    )?;

    let names = str_values(&categories, "category")?;
    let order_counts = i64_values(&categories, "total_orders")?;
    let sales = f64_values(&categories, "sales")?;

    let mut summary: Vec<CategorySummary> = names
        .into_iter()
        .enumerate()
        .map(|(i, category)| CategorySummary {
            category,
            total_orders: order_counts[i].unwrap_or_default() as usize,
            total_sales: sales[i].unwrap_or_default(),
        })
        .collect();
    summary.sort_by(|a, b| a.category.cmp(&b.category));

    Ok(summary)
}

/// Distinct orders per shipping mode
pub fn orders_by_ship_mode(orders: &DataFrame) -> crate::Result<Vec<Breakdown>> {
    sum_by(orders, "ship_mode", col("order_id").n_unique())
}

pub fn sales_by_subcategory(orders: &DataFrame) -> crate::Result<Vec<Breakdown>> {
    sum_by(orders, "subcategory", col("sales").sum())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_name: String,
    pub quantity_sold: i64,
    pub total_sales: f64,
    pub total_profit: f64,
    pub avg_discount: Option<f64>,
    /// Category of the first line seen for the product
    pub category: String,
}

/// Per-product totals, rounded to cents
pub fn product_summary(orders: &DataFrame) -> crate::Result<Vec<ProductSummary>> {
    let products = orders
        .clone()
        .lazy()
        .group_by_stable([col("product_name")])
        .agg([
            col("quantity").sum(),
            col("sales").sum(),
            col("profit").sum(),
            col("discount").mean(),
            col("category").first(),
        ])
        .collect()?;

    let names = str_values(&products, "product_name")?;
    let quantity = i64_values(&products, "quantity")?;
    let sales = f64_values(&products, "sales")?;
    let profit = f64_values(&products, "profit")?;
    let discount = f64_values(&products, "discount")?;
    let category = str_values(&products, "category")?;

    let mut summary: Vec<ProductSummary> = names
        .into_iter()
        .enumerate()
        .map(|(i, product_name)| ProductSummary {
            product_name,
            quantity_sold: quantity[i].unwrap_or_default(),
            total_sales: round2(sales[i].unwrap_or_default()),
            total_profit: round2(profit[i].unwrap_or_default()),
            avg_discount: discount[i].map(round2),
            category: category[i].clone(),
        })
        .collect();
    summary.sort_by(|a, b| a.product_name.cmp(&b.product_name));

    Ok(summary)
}

/// Products with the largest quantity sold
pub fn top_sold(products: &[ProductSummary], n: usize) -> Vec<ProductSummary> {
    let mut ranked = products.to_vec();
    ranked.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    ranked.truncate(n);
    ranked
}

/// Products with the largest total profit
pub fn top_profitable(products: &[ProductSummary], n: usize) -> Vec<ProductSummary> {
    let mut ranked = products.to_vec();
    ranked.sort_by(|a, b| {
        descending(a.total_profit, b.total_profit).then_with(|| a.product_name.cmp(&b.product_name))
    });
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    /// Fraction of all scored customers
    pub share: f64,
    /// Sum over customers with a joined profit
    pub total_profit: f64,
    /// Mean of per-customer average discounts, skipping customers without one
    pub avg_discount: Option<f64>,
}

/// Per-segment proportion, profit and discount; segments without customers are omitted
pub fn segment_summary(table: &RfmTable) -> Vec<SegmentSummary> {
    let total = table.len();

    Segment::ALL
        .iter()
        .filter_map(|&segment| {
            let members: Vec<&RfmRecord> = table
                .records
                .iter()
                .filter(|r| r.customer_segment == segment)
                .collect();
            if members.is_empty() {
                return None;
            }

            let discounts: Vec<f64> = members.iter().filter_map(|r| r.avg_discount).collect();
            let avg_discount =
                (!discounts.is_empty()).then(|| discounts.iter().sum::<f64>() / discounts.len() as f64);

            Some(SegmentSummary {
                segment,
                customers: members.len(),
                share: members.len() as f64 / total as f64,
                total_profit: members.iter().filter_map(|r| r.total_profit).sum(),
                avg_discount,
            })
        })
        .collect()
}

/// Customers generating the most profit; customers without a joined profit are excluded
pub fn top_customers_by_profit(table: &RfmTable, n: usize) -> Vec<&RfmRecord> {
    let mut ranked: Vec<&RfmRecord> = table
        .records
        .iter()
        .filter(|r| r.total_profit.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        descending(a.total_profit.unwrap_or_default(), b.total_profit.unwrap_or_default())
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    ranked.truncate(n);
    ranked
}

fn group_by<E: AsRef<[Expr]>>(orders: &DataFrame, key: &str, aggs: E) -> PolarsResult<DataFrame> {
    orders.clone().lazy().group_by([col(key)]).agg(aggs).collect()
}

/// One aggregated value per distinct `key`, ordered by label
fn sum_by(orders: &DataFrame, key: &str, value: Expr) -> crate::Result<Vec<Breakdown>> {
    let totals = group_by(orders, key, [value.alias("value")])?;

    let mut rows: Vec<Breakdown> = str_values(&totals, key)?
        .into_iter()
        .zip(f64_values(&totals, "value")?)
        .map(|(label, value)| Breakdown {
            label,
            value: value.unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(rows)
}

fn top_n(mut rows: Vec<Breakdown>, n: usize) -> Vec<Breakdown> {
    rows.sort_by(|a, b| descending(a.value, b.value).then_with(|| a.label.cmp(&b.label)));
    rows.truncate(n);
    rows
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// USPS code for a US state or DC
pub fn state_code(state: &str) -> Option<&'static str> {
    STATE_CODES
        .iter()
        .find(|(name, _)| *name == state)
        .map(|(_, code)| *code)
}

const STATE_CODES: [(&str, &str); 51] = [
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{orders_frame, Order};
    use crate::score::Score;
    use chrono::NaiveDate;

    #[allow(clippy::too_many_arguments)]
    fn line(
        order_id: &str,
        date: &str,
        city: &str,
        state: &str,
        product: &str,
        category: &str,
        sales: f64,
        profit: f64,
        quantity: i64,
    ) -> Order {
        Order {
            customer_id: "C-1".to_string(),
            customer_name: "Customer".to_string(),
            order_id: order_id.to_string(),
            order_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            sales: Some(sales),
            profit: Some(profit),
            discount: Some(0.2),
            quantity: Some(quantity),
            segment: "Consumer".to_string(),
            region: "West".to_string(),
            category: category.to_string(),
            subcategory: format!("{} sub", category),
            state: state.to_string(),
            city: city.to_string(),
            ship_mode: "Standard Class".to_string(),
            product_name: product.to_string(),
        }
    }

    fn create_test_frame() -> DataFrame {
        let orders = create_test_orders();
        let refs: Vec<&Order> = orders.iter().collect();
        orders_frame(&refs).unwrap()
    }

    fn create_test_orders() -> Vec<Order> {
        vec![
            line("O-1", "2017-01-10", "Seattle", "Washington", "Stapler", "Office Supplies", 20.0, 5.0, 2),
            line("O-1", "2017-01-10", "Seattle", "Washington", "Desk", "Furniture", 300.0, -10.0, 1),
            line("O-2", "2016-03-05", "Austin", "Texas", "Stapler", "Office Supplies", 10.0, 2.5, 1),
            line("O-3", "2017-03-20", "Portland", "Oregon", "Phone", "Technology", 500.0, 120.0, 1),
        ]
    }

    #[test]
    fn test_kpis() {
        let frame = create_test_frame();

        let kpis = kpis(&frame).unwrap();
        assert_eq!(kpis.total_sales, 830.0);
        assert_eq!(kpis.total_profit, 117.5);
        assert_eq!(kpis.total_orders, 3);
        assert_eq!(kpis.quantity_sold, 5);
    }

    #[test]
    fn test_monthly_trend_is_calendar_ordered() {
        let frame = create_test_frame();

        let trend = monthly_trend(&frame).unwrap();
        let months: Vec<&str> = trend.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["January", "March"]);
        assert_eq!(trend[1].total_sales, 510.0);
    }

    #[test]
    fn test_geography() {
        let frame = create_test_frame();

        let states = sales_by_state(&frame).unwrap();
        assert_eq!(states[0].state, "Oregon");
        assert_eq!(states[0].state_code, Some("OR"));

        let cities = top_cities(&frame, 2).unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].label, "Portland");
        assert_eq!(cities[1].label, "Seattle");
    }

    #[test]
    fn test_category_and_shipping() {
        let frame = create_test_frame();

        let categories = category_summary(&frame).unwrap();
        let office = categories.iter().find(|c| c.category == "Office Supplies").unwrap();
        assert_eq!(office.total_orders, 2);
        assert_eq!(office.total_sales, 30.0);

        let shipping = orders_by_ship_mode(&frame).unwrap();
        assert_eq!(shipping, vec![Breakdown { label: "Standard Class".to_string(), value: 3.0 }]);
    }

    #[test]
    fn test_product_rankings() {
        let frame = create_test_frame();

        let products = product_summary(&frame).unwrap();
        assert_eq!(products.len(), 3);

        let sold = top_sold(&products, 1);
        assert_eq!(sold[0].product_name, "Stapler");
        assert_eq!(sold[0].quantity_sold, 3);
        assert_eq!(sold[0].avg_discount, Some(0.2));

        let profitable = top_profitable(&products, 10);
        assert_eq!(profitable[0].product_name, "Phone");
        assert_eq!(profitable.last().unwrap().product_name, "Desk");
    }

    #[test]
    fn test_null_values_are_skipped() {
        let mut orders = create_test_orders();
        orders[0].sales = None;
        orders[0].discount = None;
        orders[3].quantity = None;
        let refs: Vec<&Order> = orders.iter().collect();
        let frame = orders_frame(&refs).unwrap();

        let kpis = kpis(&frame).unwrap();
        assert_eq!(kpis.total_sales, 810.0);
        assert_eq!(kpis.quantity_sold, 4);

        let stapler = product_summary(&frame)
            .unwrap()
            .into_iter()
            .find(|p| p.product_name == "Stapler")
            .unwrap();
        assert_eq!(stapler.total_sales, 10.0);
        assert_eq!(stapler.avg_discount, Some(0.2));

        let subcategories = sales_by_subcategory(&frame).unwrap();
        let labels: Vec<&str> = subcategories.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Furniture sub", "Office Supplies sub", "Technology sub"]);
        assert_eq!(subcategories[1].value, 10.0);
    }

    #[test]
    fn test_empty_frame_kpis() {
        let frame = orders_frame(&[]).unwrap();
        let kpis = kpis(&frame).unwrap();
        assert_eq!(kpis.total_orders, 0);
        assert_eq!(kpis.total_sales, 0.0);
        assert!(monthly_trend(&frame).unwrap().is_empty());
    }

    fn record(id: &str, segment: Segment, profit: Option<f64>, discount: Option<f64>) -> RfmRecord {
        let score = Score::new(1).unwrap();
        RfmRecord {
            customer_id: id.to_string(),
            customer_name: format!("{} Name", id),
            last_transaction: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            recency: 1,
            frequency: 1,
            monetary: 1.0,
            r_score: score,
            f_score: score,
            m_score: score,
            rfm_score: 111,
            customer_segment: segment,
            total_profit: profit,
            avg_discount: discount,
        }
    }

    #[test]
    fn test_segment_summary() {
        let table = RfmTable {
            reference_date: NaiveDate::from_ymd_opt(2017, 1, 2).unwrap(),
            records: vec![
                record("A", Segment::Champions, Some(100.0), Some(0.1)),
                record("B", Segment::Champions, Some(50.0), Some(0.3)),
                record("C", Segment::AtRisk, None, None),
                record("D", Segment::AtRisk, Some(-20.0), Some(0.5)),
            ],
        };

        let summary = segment_summary(&table);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].segment, Segment::Champions);
        assert_eq!(summary[0].share, 0.5);
        assert_eq!(summary[0].total_profit, 150.0);
        assert!((summary[0].avg_discount.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(summary[1].total_profit, -20.0);
        assert_eq!(summary[1].avg_discount, Some(0.5));

        let top = top_customers_by_profit(&table, 10);
        let ids: Vec<&str> = top.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "D"]);
    }
}
