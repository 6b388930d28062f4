//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::filter::{OrderFilter, YearSelection};
use crate::score::Score;

/// Superstore sales dashboard with RFM customer segmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the orders CSV file
    #[arg(short, long, default_value = "Dataset/superstore.csv")]
    pub input: String,

    /// Order year to analyse, or "all"
    #[arg(short, long, default_value = "all")]
    pub year: YearSelection,

    /// Customer segment to include (repeatable); all segments when omitted
    #[arg(short, long = "segment")]
    pub segments: Vec<String>,

    /// Region to include (repeatable); all regions when omitted
    #[arg(short, long = "region")]
    pub regions: Vec<String>,

    /// Number of rows in top-N tables
    #[arg(short = 'n', long, default_value = "10")]
    pub top: usize,

    /// Output path for the segment chart; the profit chart gets a `_profit` suffix
    #[arg(short, long)]
    pub plot: Option<String>,

    /// Print the RFM table as JSON instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Classify mode: provide R,F,M scores as comma-separated string
    /// Example: --classify "5,1,1" prints composite 511 and its segment
    #[arg(short, long)]
    pub classify: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Filter built from the year, segment and region options
    pub fn order_filter(&self) -> OrderFilter {
        let selection = |values: &[String]| (!values.is_empty()).then(|| values.to_vec());
        OrderFilter {
            year: self.year,
            segments: selection(&self.segments),
            regions: selection(&self.regions),
        }
    }

    /// Parse RFM scores from the classify string
    /// Expected format: "r,f,m" with each score between 1 and 5
    pub fn parse_scores(&self) -> crate::Result<Option<(Score, Score, Score)>> {
        let Some(ref classify_str) = self.classify else {
            return Ok(None);
        };

        let parts: Vec<&str> = classify_str.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("Classify values must be in format 'r,f,m'");
        }

        let parse = |name: &str, raw: &str| -> crate::Result<Score> {
            let value: u8 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid {} score: {}", name, raw))?;
            Ok(Score::new(value)?)
        };

        Ok(Some((
            parse("recency", parts[0])?,
            parse("frequency", parts[1])?,
            parse("monetary", parts[2])?,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            input: "test.csv".to_string(),
            year: YearSelection::All,
            segments: Vec::new(),
            regions: Vec::new(),
            top: 10,
            plot: None,
            json: false,
            classify: Some("5,1,1".to_string()),
            verbose: false,
        }
    }

    #[test]
    fn test_parse_scores() {
        let mut args = args();

        let (r, f, m) = args.parse_scores().unwrap().unwrap();
        assert_eq!((r.get(), f.get(), m.get()), (5, 1, 1));

        args.classify = None;
        assert!(args.parse_scores().unwrap().is_none());

        args.classify = Some("invalid".to_string());
        assert!(args.parse_scores().is_err());

        args.classify = Some("6,1,1".to_string());
        assert!(args.parse_scores().is_err());
    }

    #[test]
    fn test_order_filter_from_args() {
        let args = Args::parse_from([
            "storefront-rfm",
            "--year",
            "2017",
            "--segment",
            "Consumer",
            "--segment",
            "Corporate",
        ]);

        let filter = args.order_filter();
        assert_eq!(filter.year, YearSelection::Year(2017));
        assert_eq!(
            filter.segments,
            Some(vec!["Consumer".to_string(), "Corporate".to_string()])
        );
        assert_eq!(filter.regions, None);
    }
}
