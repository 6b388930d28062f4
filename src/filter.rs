//! Year, segment and region predicates applied ahead of every aggregation

use std::fmt;
use std::str::FromStr;

use crate::data::Order;

/// Year selection from the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearSelection {
    #[default]
    All,
    Year(i32),
}

impl FromStr for YearSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<i32>()
            .map(Self::Year)
            .map_err(|_| anyhow::anyhow!("Invalid year '{}': expected a year such as 2017 or 'all'", s))
    }
}

impl fmt::Display for YearSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Year(year) => write!(f, "{}", year),
        }
    }
}

/// Active dashboard filter
///
/// `None` for segments or regions selects every value. `Some` with an empty
/// list selects nothing, matching a multiselect the user has cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub year: YearSelection,
    pub segments: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        let year_ok = match self.year {
            YearSelection::All => true,
            YearSelection::Year(year) => order.year() == year,
        };

        year_ok
            && selected(self.segments.as_deref(), &order.segment)
            && selected(self.regions.as_deref(), &order.region)
    }

    /// Orders passing all three predicates, in input order
    pub fn apply<'a>(&self, orders: &'a [Order]) -> Vec<&'a Order> {
        let filtered: Vec<&Order> = orders.iter().filter(|order| self.matches(order)).collect();

        tracing::debug!(
            year = %self.year,
            total = orders.len(),
            kept = filtered.len(),
            "filter applied"
        );

        filtered
    }
}

fn selected(choices: Option<&[String]>, value: &str) -> bool {
    choices.map_or(true, |choices| choices.iter().any(|c| c == value))
}
