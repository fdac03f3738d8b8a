use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use super::{LineStrategy, categorize};
use crate::types::LineItemCandidate;

/// Structural words that never appear on a purchasable line.
pub const RESERVED_KEYWORDS: &[&str] = &["TOTAL", "SUBTOTAL", "TAX", "RECEIPT", "#"];

/// Names this short are noise (a stray currency symbol, a lone letter).
const MIN_NAME_CHARS: usize = 3;
const SKU_PENALTY: f64 = 0.1;

static TRAILING_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?(\d+\.\d{2})\s*$").expect("valid trailing price regex"));

/// `2 @ $3.20` or `2x $3.20`: quantity plus unit price.
static QTY_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:@|x)\s*\$?(\d+\.\d{2})").expect("valid quantity regex")
});

// ---------------------------------------------------------------------------
// Line-level extraction
// ---------------------------------------------------------------------------

/// Turn one raw line into an item candidate, or `None` if it is not a
/// purchase line. Dropping a line is a filtering decision, not an error.
pub(super) fn parse_line(raw: &str, strategy: &LineStrategy) -> Option<LineItemCandidate> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    // Exclusion runs before price matching so a `TOTAL $45.67` line can
    // never turn into an item.
    if let Some(keyword) = excluded_keyword(line, strategy) {
        debug!(line, keyword, "Skipping structural line");
        return None;
    }

    let caps = TRAILING_PRICE_RE.captures(line)?;
    let price_match = caps.get(0)?;
    let extended: Decimal = caps[1].parse().ok()?;
    if extended <= Decimal::ZERO {
        debug!(line, "Skipping non-positive price");
        return None;
    }

    let name = line[..price_match.start()].trim();
    if name.chars().count() < MIN_NAME_CHARS {
        debug!(line, "Skipping line with no usable name");
        return None;
    }

    let (name, quantity, unit_price) = split_quantity(name, extended);

    let mut line_confidence = strategy.base_confidence;
    if looks_like_sku(&name) {
        line_confidence -= SKU_PENALTY;
    }

    Some(LineItemCandidate {
        raw_line: line.to_string(),
        category: categorize(&name),
        name,
        unit_price,
        quantity,
        line_confidence: line_confidence.clamp(0.0, 1.0),
    })
}

fn excluded_keyword<'a>(line: &str, strategy: &'a LineStrategy) -> Option<&'a str> {
    let upper = line.to_uppercase();
    RESERVED_KEYWORDS
        .iter()
        .chain(strategy.extra_excluded.iter())
        .find(|k| upper.contains(**k))
        .copied()
}

/// Pull an explicit `N @ $P` / `Nx $P` out of the name.
///
/// The decomposition is only trusted when `N * P` equals the extended
/// price; otherwise the line stays a single unit at the extended price.
fn split_quantity(name: &str, extended: Decimal) -> (String, u32, Decimal) {
    let fallback = (name.to_string(), 1, extended);

    let Some(caps) = QTY_UNIT_RE.captures(name) else {
        return fallback;
    };
    let (Ok(quantity), Ok(unit)) = (caps[1].parse::<u32>(), caps[2].parse::<Decimal>()) else {
        return fallback;
    };
    if quantity == 0 || unit <= Decimal::ZERO {
        return fallback;
    }
    // Garbled digits can overflow the 96-bit mantissa.
    if unit.checked_mul(Decimal::from(quantity)) != Some(extended) {
        return fallback;
    }

    let Some(whole) = caps.get(0) else {
        return fallback;
    };
    let stripped = format!("{} {}", &name[..whole.start()], &name[whole.end()..]);
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = if stripped.chars().count() >= MIN_NAME_CHARS {
        stripped
    } else {
        name.to_string()
    };

    (name, quantity, unit)
}

/// No letters at all: probably a product code rather than a description.
fn looks_like_sku(name: &str) -> bool {
    !name.chars().any(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(line: &str) -> Option<LineItemCandidate> {
        parse_line(line, &LineStrategy::GENERIC)
    }

    #[test]
    fn reserved_keywords_are_case_insensitive() {
        assert!(generic("Total $45.67").is_none());
        assert!(generic("subtotal 45.67").is_none());
        assert!(generic("GST/Tax 1.23").is_none());
        assert!(generic("Receipt 000123 9.99").is_none());
        assert!(generic("Item #4421 2.50").is_none());
    }

    #[test]
    fn price_must_be_at_line_end() {
        assert!(generic("$4.50 Milk").is_none());
        assert!(generic("Milk").is_none());
        let item = generic("  Milk    4.50  ").unwrap();
        assert_eq!(item.name, "Milk");
        assert_eq!(item.raw_line, "Milk    4.50");
    }

    #[test]
    fn short_names_and_zero_prices_are_dropped() {
        assert!(generic("$ $4.50").is_none());
        assert!(generic("ab 4.50").is_none());
        assert!(generic("Free sample $0.00").is_none());
    }

    #[test]
    fn unit_price_quantity_is_extracted_when_it_adds_up() {
        let item = generic("Limes 2 @ $1.10 $2.20").unwrap();
        assert_eq!(item.name, "Limes");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.unit_price, Decimal::new(110, 2));

        let item = generic("3x $1.50 Apples $4.50").unwrap();
        assert_eq!(item.name, "Apples");
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price, Decimal::new(150, 2));
    }

    #[test]
    fn unverifiable_quantity_keeps_extended_price() {
        let item = generic("2x Bread $6.40").unwrap();
        assert_eq!(item.name, "2x Bread");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, Decimal::new(640, 2));

        let item = generic("Limes 2 @ $1.10 $5.00").unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, Decimal::new(500, 2));
    }

    #[test]
    fn overflowing_quantity_product_falls_back_to_one_unit() {
        let line = "Widget 4294967295 @ $99999999999999999999.99 $1.00";
        let item = generic(line).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, Decimal::new(100, 2));
        assert_eq!(item.name, "Widget 4294967295 @ $99999999999999999999.99");
    }

    #[test]
    fn sku_only_names_lose_confidence() {
        let item = generic("9400547-001 $3.99").unwrap();
        assert!((item.line_confidence - 0.6).abs() < 1e-9);
        let item = generic("Butter 500g $5.49").unwrap();
        assert_eq!(item.line_confidence, 0.7);
        assert_eq!(item.category, Some(crate::types::Category::Dairy));
    }
}
