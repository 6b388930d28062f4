//! Storefront RFM: sales dashboard analytics with RFM customer segmentation
//!
//! This library filters retail order lines, scores every customer on
//! Recency, Frequency and Monetary quintiles, maps the composite score to a
//! named segment and builds the tables a dashboard renders.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod report;
pub mod score;
pub mod segment;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_orders, orders_frame, Dataset, Order};
pub use error::RfmError;
pub use filter::{OrderFilter, YearSelection};
pub use model::{build_rfm_table, RfmRecord, RfmTable};
pub use score::{Metric, Score};
pub use segment::{classify, composite, Segment};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
