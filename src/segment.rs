//! Composite RFM score and the segment band table

use std::fmt;

use serde::Serialize;

use crate::score::Score;

/// Named customer segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Segment {
    Champions,
    Loyal,
    Potential,
    #[serde(rename = "At Risk")]
    AtRisk,
    Uncategorized,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Champions,
        Segment::Loyal,
        Segment::Potential,
        Segment::AtRisk,
        Segment::Uncategorized,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::Potential => "Potential",
            Segment::AtRisk => "At Risk",
            Segment::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive composite range mapped to a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBand {
    pub low: u16,
    pub high: u16,
    pub segment: Segment,
}

impl SegmentBand {
    const fn new(low: u16, high: u16, segment: Segment) -> Self {
        Self { low, high, segment }
    }

    pub fn contains(&self, composite: u16) -> bool {
        (self.low..=self.high).contains(&composite)
    }
}

/// Ordered, non-overlapping bands. Composites matching none of them
/// (111 through 150) are `Uncategorized`.
pub const SEGMENT_BANDS: &[SegmentBand] = &[
    SegmentBand::new(511, 555, Segment::Champions),
    SegmentBand::new(451, 510, Segment::Loyal),
    SegmentBand::new(351, 450, Segment::Potential),
    SegmentBand::new(151, 350, Segment::AtRisk),
];

/// R, F and M digits read as one base-10 number
pub fn composite(r: Score, f: Score, m: Score) -> u16 {
    100 * u16::from(r.get()) + 10 * u16::from(f.get()) + u16::from(m.get())
}

pub fn classify(composite: u16) -> Segment {
    classify_with(SEGMENT_BANDS, composite)
}

/// Classify against a caller-supplied band table
pub fn classify_with(bands: &[SegmentBand], composite: u16) -> Segment {
    bands
        .iter()
        .find(|band| band.contains(composite))
        .map_or(Segment::Uncategorized, |band| band.segment)
}
