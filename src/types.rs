// src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::registry::Retailer;

/// Store name reported when no retailer signature matches.
pub const UNKNOWN_STORE: &str = "Unknown Store";

/// An `[x, y]` pixel coordinate.
pub type Point = [f64; 2];

/// Four corner points of a detected text span, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox {
    pub corners: [Point; 4],
}

impl BoundingBox {
    /// Build a box from corner points, rejecting non-finite coordinates.
    pub fn from_corners(corners: [Point; 4]) -> Option<Self> {
        corners
            .iter()
            .flatten()
            .all(|v| v.is_finite())
            .then_some(Self { corners })
    }

    /// Build an axis-aligned box from two opposite corners.
    pub fn from_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        Self::from_corners([[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
    }

    pub fn min_x(&self) -> f64 {
        self.corners.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min)
    }

    pub fn max_x(&self) -> f64 {
        self.corners.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_y(&self) -> f64 {
        self.corners.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min)
    }

    pub fn max_y(&self) -> f64 {
        self.corners.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Width along the top edge.
    pub fn width(&self) -> f64 {
        (self.corners[1][0] - self.corners[0][0]).abs()
    }

    /// Vertical distance from the top-left to the bottom-right corner.
    pub fn height(&self) -> f64 {
        (self.corners[2][1] - self.corners[0][1]).abs()
    }

    pub fn center_y(&self) -> f64 {
        (self.min_y() + self.max_y()) / 2.0
    }
}

/// One detected text span from the OCR engine.
///
/// Decoding is lenient: a field that fails to parse degrades to a safe
/// default instead of rejecting the fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFragment")]
pub struct OcrFragment {
    pub text: String,
    pub bbox: Option<BoundingBox>,
    pub confidence: f64,
}

impl OcrFragment {
    pub fn new(text: impl Into<String>, bbox: Option<BoundingBox>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: sanitize_confidence(Some(confidence)),
        }
    }

    /// A fragment with no geometry, as produced from plain text lines.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, None, 1.0)
    }
}

#[derive(Deserialize)]
struct RawFragment {
    #[serde(default)]
    text: Value,
    #[serde(default)]
    bbox: Value,
    #[serde(default)]
    confidence: Value,
}

impl From<RawFragment> for OcrFragment {
    fn from(raw: RawFragment) -> Self {
        let text = match raw.text {
            Value::String(s) => s,
            _ => String::new(),
        };
        Self {
            text,
            bbox: parse_bbox(&raw.bbox),
            confidence: sanitize_confidence(raw.confidence.as_f64()),
        }
    }
}

/// Missing, non-numeric or negative confidence reads as 1.0; values above 1 clamp.
fn sanitize_confidence(value: Option<f64>) -> f64 {
    match value {
        Some(c) if c.is_finite() && c >= 0.0 => c.min(1.0),
        _ => 1.0,
    }
}

/// Accepts `[[x,y] x 4]` corner lists or a flat `[x0, y0, x1, y1]` rectangle.
fn parse_bbox(value: &Value) -> Option<BoundingBox> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }

    if items.iter().all(Value::is_number) {
        let n: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
        if n.len() != 4 {
            return None;
        }
        return BoundingBox::from_rect(n[0], n[1], n[2], n[3]);
    }

    let mut corners = [[0.0; 2]; 4];
    for (slot, item) in corners.iter_mut().zip(items) {
        let pair = item.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        *slot = [pair[0].as_f64()?, pair[1].as_f64()?];
    }
    BoundingBox::from_corners(corners)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Response body of the OCR service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrPayload {
    #[serde(default)]
    pub results: Vec<OcrFragment>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub image_size: Option<ImageSize>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Layout signals derived from fragment bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryFeatures {
    pub is_rectangular: bool,
    pub aspect_ratio: f64,
    pub edge_density: f64,
    pub horizontal_spread: f64,
    pub vertical_spread: f64,
}

impl Default for GeometryFeatures {
    fn default() -> Self {
        Self {
            is_rectangular: false,
            aspect_ratio: 1.0,
            edge_density: 0.0,
            horizontal_spread: 0.0,
            vertical_spread: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionFeatures {
    pub has_text: bool,
    pub has_receipt_keyword: bool,
    pub has_price_pattern: bool,
    pub has_date_pattern: bool,
    pub has_retailer_keyword: bool,
    pub fragment_count: usize,
    pub geometry: GeometryFeatures,
}

/// Outcome of the "is this a receipt at all" check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_receipt: bool,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub features: DetectionFeatures,
}

// ---------------------------------------------------------------------------
// Parsed receipt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Fresh Produce")]
    FreshProduce,
    Dairy,
    Meat,
    Pantry,
    Beverages,
    Snacks,
    Frozen,
    Household,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::FreshProduce,
        Category::Dairy,
        Category::Meat,
        Category::Pantry,
        Category::Beverages,
        Category::Snacks,
        Category::Frozen,
        Category::Household,
    ];

    /// Inverse of [`Category::as_str`].
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FreshProduce => "Fresh Produce",
            Category::Dairy => "Dairy",
            Category::Meat => "Meat",
            Category::Pantry => "Pantry",
            Category::Beverages => "Beverages",
            Category::Snacks => "Snacks",
            Category::Frozen => "Frozen",
            Category::Household => "Household",
        }
    }
}

/// One purchasable line extracted from the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemCandidate {
    pub raw_line: String,
    pub name: String,
    /// Always greater than zero.
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_confidence: f64,
    pub category: Option<Category>,
}

impl LineItemCandidate {
    /// `unit_price * quantity`, saturating instead of overflowing.
    pub fn extended_price(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Structured receipt handed to persistence and the correction UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub store_name: String,
    pub retailer: Retailer,
    pub store_confidence: f64,
    pub date: Option<Date>,
    pub receipt_number: Option<String>,
    /// Source line order; duplicates are kept.
    pub items: Vec<LineItemCandidate>,
    pub declared_subtotal: Option<Decimal>,
    pub declared_tax: Option<Decimal>,
    pub declared_total: Option<Decimal>,
}

impl ParsedReceipt {
    /// A receipt with nothing extracted, used when detection gates a scan out.
    pub fn empty() -> Self {
        Self {
            store_name: UNKNOWN_STORE.to_string(),
            retailer: Retailer::Unknown,
            store_confidence: 0.0,
            date: None,
            receipt_number: None,
            items: Vec::new(),
            declared_subtotal: None,
            declared_tax: None,
            declared_total: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Valid,
    NeedsReview,
    Rejected,
}

impl VerdictStatus {
    /// Inverse of [`VerdictStatus::as_str`].
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "valid" => Some(VerdictStatus::Valid),
            "needs_review" => Some(VerdictStatus::NeedsReview),
            "rejected" => Some(VerdictStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Valid => "valid",
            VerdictStatus::NeedsReview => "needs_review",
            VerdictStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub status: VerdictStatus,
    /// Always within `[0, 1]`.
    pub overall_confidence: f64,
    /// Every triggered condition, in decision-table order.
    pub issues: Vec<String>,
    pub computed_subtotal: Decimal,
    /// `computed_subtotal + tax - declared_total`, signed.
    pub total_discrepancy: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_decodes_well_formed_json() {
        let frag: OcrFragment = serde_json::from_str(
            r#"{"text": "MILK $4.50", "bbox": [[0,0],[120,0],[120,20],[0,20]], "confidence": 0.93}"#,
        )
        .unwrap();
        assert_eq!(frag.text, "MILK $4.50");
        assert_eq!(frag.confidence, 0.93);
        let bbox = frag.bbox.unwrap();
        assert_eq!(bbox.width(), 120.0);
        assert_eq!(bbox.height(), 20.0);
    }

    #[test]
    fn malformed_fields_degrade_individually() {
        let frag: OcrFragment =
            serde_json::from_str(r#"{"text": "TOTAL", "bbox": [[0,0],[1]], "confidence": -3}"#)
                .unwrap();
        assert_eq!(frag.text, "TOTAL");
        assert!(frag.bbox.is_none());
        assert_eq!(frag.confidence, 1.0);

        let frag: OcrFragment =
            serde_json::from_str(r#"{"text": 42, "bbox": null, "confidence": "high"}"#).unwrap();
        assert_eq!(frag.text, "");
        assert!(frag.bbox.is_none());
        assert_eq!(frag.confidence, 1.0);
    }

    #[test]
    fn missing_confidence_defaults_to_one_and_large_values_clamp() {
        let frag: OcrFragment = serde_json::from_str(r#"{"text": "a"}"#).unwrap();
        assert_eq!(frag.confidence, 1.0);
        let frag: OcrFragment = serde_json::from_str(r#"{"text": "a", "confidence": 7.5}"#).unwrap();
        assert_eq!(frag.confidence, 1.0);
    }

    #[test]
    fn flat_rectangle_bbox_is_accepted() {
        let frag: OcrFragment =
            serde_json::from_str(r#"{"text": "a", "bbox": [10, 20, 110, 40]}"#).unwrap();
        let bbox = frag.bbox.unwrap();
        assert_eq!(bbox.min_x(), 10.0);
        assert_eq!(bbox.max_y(), 40.0);
        assert_eq!(bbox.center_y(), 30.0);
    }

    #[test]
    fn extended_price_multiplies_quantity() {
        let item = LineItemCandidate {
            raw_line: "Bread 2 @ $3.20 $6.40".into(),
            name: "Bread".into(),
            unit_price: Decimal::new(320, 2),
            quantity: 2,
            line_confidence: 0.7,
            category: None,
        };
        assert_eq!(item.extended_price(), Decimal::new(640, 2));
    }

    #[test]
    fn extended_price_saturates_on_overflow() {
        let item = LineItemCandidate {
            raw_line: "Widget".into(),
            name: "Widget".into(),
            unit_price: Decimal::MAX,
            quantity: u32::MAX,
            line_confidence: 0.7,
            category: None,
        };
        assert_eq!(item.extended_price(), Decimal::MAX);
    }
}
