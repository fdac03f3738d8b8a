// src/pipeline.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::detection::detect;
use crate::errors::ReceiptError;
use crate::heuristics::{extract_date, extract_receipt_number, extract_totals, parse_lines};
use crate::identify::{StoreMatch, identify};
use crate::reconcile::{Reconciliation, reconcile};
use crate::registry::SignatureRegistry;
use crate::types::{DetectionResult, OcrFragment, ParsedReceipt, ValidationVerdict};
use crate::validation::{REJECTION_THRESHOLD, validate};

/// Everything one scan produced, ready for persistence or the correction UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub detection: DetectionResult,
    pub receipt: ParsedReceipt,
    pub verdict: ValidationVerdict,
}

/// Detection, identification, parsing, reconciliation and validation over
/// already-fetched OCR output.
///
/// Holds only the read-only registry, so a single pipeline can be cloned
/// into as many concurrent scans as needed.
#[derive(Debug, Clone)]
pub struct ReceiptPipeline {
    registry: Arc<SignatureRegistry>,
}

impl ReceiptPipeline {
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self { registry }
    }

    /// Compile the built-in retailer table. Fails at startup if it is invalid.
    pub fn with_builtin_registry() -> Result<Self, ReceiptError> {
        Ok(Self::new(Arc::new(SignatureRegistry::builtin()?)))
    }

    /// Run one scan. Never fails: garbled or non-receipt input degrades to
    /// a `Rejected` or `NeedsReview` verdict.
    pub fn process(&self, fragments: &[OcrFragment]) -> ScanOutcome {
        let span = info_span!("scan", fragments = fragments.len());
        let _guard = span.enter();

        let detection = detect(fragments, &self.registry);

        let (receipt, store, reconciliation) = if detection.confidence < REJECTION_THRESHOLD {
            debug!(confidence = detection.confidence, "Below rejection threshold, skipping parse");
            (
                ParsedReceipt::empty(),
                StoreMatch::unknown(),
                Reconciliation::default(),
            )
        } else {
            self.parse(&group_lines(fragments))
        };

        let verdict = validate(&detection, &store, &receipt.items, &reconciliation);

        info!(
            status = verdict.status.as_str(),
            confidence = verdict.overall_confidence,
            store = %receipt.store_name,
            items = receipt.items.len(),
            subtotal = %verdict.computed_subtotal,
            discrepancy = %verdict.total_discrepancy,
            issues = verdict.issues.len(),
            "Scan verdict"
        );

        ScanOutcome {
            detection,
            receipt,
            verdict,
        }
    }

    /// Run a scan over plain text lines, e.g. a receipt typed in by hand.
    pub fn process_lines<S: AsRef<str>>(&self, lines: &[S]) -> ScanOutcome {
        let fragments: Vec<OcrFragment> = lines
            .iter()
            .map(|line| OcrFragment::text_only(line.as_ref()))
            .collect();
        self.process(&fragments)
    }

    fn parse(&self, lines: &[String]) -> (ParsedReceipt, StoreMatch, Reconciliation) {
        let store = identify(&lines.join("\n"), &self.registry);
        let items = parse_lines(lines, store.retailer);
        let totals = extract_totals(lines);
        let reconciliation = reconcile(&items, totals.total, totals.tax);

        let receipt = ParsedReceipt {
            store_name: store.store_name.clone(),
            retailer: store.retailer,
            store_confidence: store.confidence,
            date: extract_date(lines),
            receipt_number: extract_receipt_number(lines),
            items,
            declared_subtotal: totals.subtotal,
            declared_tax: totals.tax,
            declared_total: totals.total,
        };
        (receipt, store, reconciliation)
    }
}

struct LineBuilder {
    top: f64,
    bottom: f64,
    parts: Vec<(f64, String)>,
}

impl LineBuilder {
    fn finish(mut self) -> String {
        self.parts.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.parts
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Rebuild printed lines from OCR fragments.
///
/// A fragment joins the line being built when its vertical centre falls
/// inside that line's band; parts are then ordered by left edge. Fragments
/// without a bounding box are lines of their own. Empty text is dropped.
pub fn group_lines(fragments: &[OcrFragment]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<LineBuilder> = None;

    for fragment in fragments {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }

        let Some(bbox) = fragment.bbox else {
            if let Some(line) = current.take() {
                lines.push(line.finish());
            }
            lines.push(text.to_string());
            continue;
        };

        let center = bbox.center_y();
        match current.as_mut() {
            Some(line) if center >= line.top && center <= line.bottom => {
                line.top = line.top.min(bbox.min_y());
                line.bottom = line.bottom.max(bbox.max_y());
                line.parts.push((bbox.min_x(), text.to_string()));
            }
            _ => {
                if let Some(line) = current.take() {
                    lines.push(line.finish());
                }
                current = Some(LineBuilder {
                    top: bbox.min_y(),
                    bottom: bbox.max_y(),
                    parts: vec![(bbox.min_x(), text.to_string())],
                });
            }
        }
    }

    if let Some(line) = current {
        lines.push(line.finish());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Retailer;
    use crate::types::{BoundingBox, VerdictStatus};
    use rust_decimal::Decimal;

    fn frag(text: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> OcrFragment {
        OcrFragment::new(text, BoundingBox::from_rect(x0, y0, x1, y1), 0.95)
    }

    fn pipeline() -> ReceiptPipeline {
        ReceiptPipeline::with_builtin_registry().unwrap()
    }

    #[test]
    fn fragments_on_one_row_join_left_to_right() {
        let fragments = [
            frag("$4.50", 300.0, 100.0, 360.0, 120.0),
            frag("Milk 2L", 10.0, 102.0, 120.0, 122.0),
            frag("Bread", 10.0, 140.0, 80.0, 160.0),
            frag("$3.20", 300.0, 141.0, 360.0, 161.0),
        ];
        assert_eq!(group_lines(&fragments), ["Milk 2L $4.50", "Bread $3.20"]);
    }

    #[test]
    fn fragments_without_geometry_stand_alone() {
        let fragments = [
            frag("COUNTDOWN", 10.0, 10.0, 200.0, 30.0),
            OcrFragment::text_only("Milk $4.50"),
            frag("Bread $3.20", 10.0, 12.0, 200.0, 32.0),
            OcrFragment::text_only("   "),
        ];
        assert_eq!(
            group_lines(&fragments),
            ["COUNTDOWN", "Milk $4.50", "Bread $3.20"]
        );
    }

    #[test]
    fn known_store_receipt_is_valid_end_to_end() {
        let outcome = pipeline().process_lines(&[
            "COUNTDOWN",
            "Milk 2L $4.50",
            "Bread $3.20",
            "TOTAL $7.70",
        ]);
        assert_eq!(outcome.receipt.retailer, Retailer::Countdown);
        assert_eq!(outcome.receipt.items.len(), 2);
        assert_eq!(outcome.receipt.declared_total, Some(Decimal::new(770, 2)));
        assert_eq!(outcome.verdict.computed_subtotal, Decimal::new(770, 2));
        assert_eq!(outcome.verdict.total_discrepancy, Decimal::ZERO);
        assert_eq!(outcome.verdict.status, VerdictStatus::Valid);
    }

    #[test]
    fn gated_scan_skips_parsing() {
        let outcome = pipeline().process_lines(&["hello world"]);
        assert!(!outcome.detection.is_receipt);
        assert_eq!(outcome.receipt, ParsedReceipt::empty());
        assert_eq!(outcome.verdict.status, VerdictStatus::Rejected);
    }

    #[test]
    fn pipeline_is_shareable_across_threads() {
        let pipeline = pipeline();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = pipeline.clone();
                std::thread::spawn(move || p.process_lines(&["Bread $3.20", "TOTAL $3.20"]))
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
    }
}
