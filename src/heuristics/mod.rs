// src/heuristics/mod.rs

mod categories;
mod fields;
mod generic;
mod retailers;

use tracing::debug;

use crate::registry::Retailer;
use crate::types::LineItemCandidate;

pub use categories::categorize;
pub use fields::{DeclaredTotals, extract_date, extract_receipt_number, extract_totals};
pub use generic::RESERVED_KEYWORDS;

/// Starting confidence for items found by a retailer-specific strategy.
pub const SPECIALIZED_CONFIDENCE: f64 = 0.9;
/// Starting confidence for items found by the generic fallback.
pub const GENERIC_CONFIDENCE: f64 = 0.7;

/// How lines are filtered and scored for one retailer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStrategy {
    /// Excluded on top of [`RESERVED_KEYWORDS`], case-insensitively.
    pub extra_excluded: &'static [&'static str],
    pub base_confidence: f64,
}

impl LineStrategy {
    pub const GENERIC: LineStrategy = LineStrategy {
        extra_excluded: &[],
        base_confidence: GENERIC_CONFIDENCE,
    };

    /// The retailer's specialized strategy, or the generic one.
    pub fn for_retailer(retailer: Retailer) -> Self {
        match retailers::excluded_keywords(retailer) {
            Some(extra_excluded) => LineStrategy {
                extra_excluded,
                base_confidence: SPECIALIZED_CONFIDENCE,
            },
            None => Self::GENERIC,
        }
    }

    pub fn is_specialized(&self) -> bool {
        self.base_confidence == SPECIALIZED_CONFIDENCE
    }
}

/// Extract item candidates from raw receipt lines.
///
/// Output order follows input order and duplicate lines are kept. Lines
/// that are structural (totals, tax, receipt numbers) never become items.
pub fn parse_lines<S: AsRef<str>>(lines: &[S], retailer: Retailer) -> Vec<LineItemCandidate> {
    let strategy = LineStrategy::for_retailer(retailer);
    let items: Vec<LineItemCandidate> = lines
        .iter()
        .filter_map(|line| generic::parse_line(line.as_ref(), &strategy))
        .collect();

    debug!(
        retailer = ?retailer,
        specialized = strategy.is_specialized(),
        lines = lines.len(),
        items = items.len(),
        "Line parsing complete"
    );
    items
}
