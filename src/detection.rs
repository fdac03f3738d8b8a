// src/detection.rs

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::identify::normalize_text;
use crate::registry::SignatureRegistry;
use crate::types::{DetectionFeatures, DetectionResult, GeometryFeatures, OcrFragment};

/// Words that show up on receipts and invoices but rarely elsewhere.
const RECEIPT_KEYWORDS: &[&str] = &[
    "receipt",
    "invoice",
    "total",
    "subtotal",
    "tax",
    "amount",
    "price",
    "super value",
    "woolworths",
    "coles",
    "safeway",
    "foodstuffs",
];

const KEYWORD_WEIGHT: f64 = 0.4;
const PRICE_WEIGHT: f64 = 0.3;
const DATE_WEIGHT: f64 = 0.2;
const FRAGMENT_COUNT_BONUS: f64 = 0.1;
const RETAILER_BONUS: f64 = 0.2;

/// More fragments than this earns the fragment-count bonus.
const FRAGMENT_COUNT_THRESHOLD: usize = 5;
/// Above this confidence the image is considered a receipt.
pub const RECEIPT_THRESHOLD: f64 = 0.5;

/// Pixel spread both axes must exceed for the layout to count as rectangular.
const MIN_SPREAD_PX: f64 = 100.0;
const MIN_RECTANGULAR_FRAGMENTS: usize = 4;
const EDGE_DENSITY_SATURATION: f64 = 20.0;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?\d+\.\d{2}").expect("valid price regex"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").expect("valid date regex")
});

/// Decide whether the OCR output plausibly came from a receipt.
///
/// Never fails. Fragments with missing geometry still count toward the
/// text signals.
pub fn detect(fragments: &[OcrFragment], registry: &SignatureRegistry) -> DetectionResult {
    let buffer = normalize_text(
        &fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    );

    let retailer_names = registry.retailer_keywords();
    let has_retailer_keyword = retailer_names.iter().any(|n| buffer.contains(n.as_str()))
        || registry.signatures().iter().any(|s| s.matches(&buffer));
    let has_receipt_keyword =
        RECEIPT_KEYWORDS.iter().any(|k| buffer.contains(*k)) || has_retailer_keyword;
    let has_price_pattern = PRICE_RE.is_match(&buffer);
    let has_date_pattern = DATE_RE.is_match(&buffer);

    let mut confidence: f64 = 0.0;
    if has_receipt_keyword {
        confidence += KEYWORD_WEIGHT;
    }
    if has_price_pattern {
        confidence += PRICE_WEIGHT;
    }
    if has_date_pattern {
        confidence += DATE_WEIGHT;
    }
    if fragments.len() > FRAGMENT_COUNT_THRESHOLD {
        confidence += FRAGMENT_COUNT_BONUS;
    }
    if has_retailer_keyword {
        confidence += RETAILER_BONUS;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    let features = DetectionFeatures {
        has_text: fragments.iter().any(|f| !f.text.trim().is_empty()),
        has_receipt_keyword,
        has_price_pattern,
        has_date_pattern,
        has_retailer_keyword,
        fragment_count: fragments.len(),
        geometry: geometry_features(fragments),
    };

    debug!(
        confidence,
        keyword = has_receipt_keyword,
        price = has_price_pattern,
        date = has_date_pattern,
        retailer = has_retailer_keyword,
        fragments = fragments.len(),
        "Receipt detection"
    );

    DetectionResult {
        is_receipt: confidence > RECEIPT_THRESHOLD,
        confidence,
        features,
    }
}

fn geometry_features(fragments: &[OcrFragment]) -> GeometryFeatures {
    let boxes: Vec<_> = fragments.iter().filter_map(|f| f.bbox).collect();
    if boxes.is_empty() {
        return GeometryFeatures::default();
    }

    let min_x = boxes.iter().map(|b| b.min_x()).fold(f64::INFINITY, f64::min);
    let max_x = boxes.iter().map(|b| b.max_x()).fold(f64::NEG_INFINITY, f64::max);
    let min_y = boxes.iter().map(|b| b.min_y()).fold(f64::INFINITY, f64::min);
    let max_y = boxes.iter().map(|b| b.max_y()).fold(f64::NEG_INFINITY, f64::max);
    let horizontal_spread = max_x - min_x;
    let vertical_spread = max_y - min_y;

    let is_rectangular = boxes.len() >= MIN_RECTANGULAR_FRAGMENTS
        && horizontal_spread > MIN_SPREAD_PX
        && vertical_spread > MIN_SPREAD_PX;

    let ratio_sum: f64 = boxes
        .iter()
        .map(|b| {
            let (w, h) = (b.width(), b.height());
            if w > 0.0 && h > 0.0 { w / h } else { 1.0 }
        })
        .sum();
    let aspect_ratio = (ratio_sum / boxes.len() as f64).clamp(0.5, 5.0);

    // Only boxed fragments carry layout signal.
    let edge_density = (boxes.len() as f64 / EDGE_DENSITY_SATURATION).min(1.0);

    GeometryFeatures {
        is_rectangular,
        aspect_ratio,
        edge_density,
        horizontal_spread,
        vertical_spread,
    }
}
