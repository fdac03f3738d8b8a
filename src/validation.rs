// src/validation.rs

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::detection::RECEIPT_THRESHOLD;
use crate::identify::StoreMatch;
use crate::reconcile::Reconciliation;
use crate::types::{DetectionResult, LineItemCandidate, ValidationVerdict, VerdictStatus};

/// Detection confidence below this rejects the scan outright.
pub const REJECTION_THRESHOLD: f64 = 0.3;
/// A group this large is more likely a double scan than a real purchase.
pub const DUPLICATE_SCAN_GROUP: usize = 3;

pub const ISSUE_NOT_A_RECEIPT: &str = "does not appear to be a receipt";
pub const ISSUE_NO_ITEMS: &str = "no line items could be extracted";
pub const ISSUE_TOTAL_MISMATCH: &str = "total does not match sum of items";
pub const ISSUE_NO_TOTAL: &str = "no printed total to reconcile against";
pub const ISSUE_DUPLICATE_SCAN: &str = "possible duplicate scan";
pub const ISSUE_UNKNOWN_STORE: &str = "store not recognized";

/// Rounding slack allowed between the printed total and the item sum.
fn discrepancy_tolerance() -> Decimal {
    Decimal::new(2, 2)
}

/// Combine detection, store identification and reconciliation into one verdict.
///
/// Status comes from the first triggered rule, evaluated in order:
/// not-a-receipt, no items, total mismatch, duplicate scan, unknown store.
/// Every triggered rule is listed in `issues`.
pub fn validate(
    detection: &DetectionResult,
    store: &StoreMatch,
    items: &[LineItemCandidate],
    reconciliation: &Reconciliation,
) -> ValidationVerdict {
    let mut triggered: Vec<(Option<VerdictStatus>, String)> = Vec::new();

    if detection.confidence < REJECTION_THRESHOLD {
        triggered.push((Some(VerdictStatus::Rejected), ISSUE_NOT_A_RECEIPT.to_string()));
    }
    if items.is_empty() {
        triggered.push((Some(VerdictStatus::Rejected), ISSUE_NO_ITEMS.to_string()));
    }
    if reconciliation.discrepancy.abs() > discrepancy_tolerance() {
        let detail = reconciliation
            .declared_total
            .map(|total| {
                format!(
                    "{ISSUE_TOTAL_MISMATCH} (items {} vs printed {total}, off by {})",
                    reconciliation.computed_subtotal, reconciliation.discrepancy
                )
            })
            .unwrap_or_else(|| ISSUE_TOTAL_MISMATCH.to_string());
        triggered.push((Some(VerdictStatus::NeedsReview), detail));
    }
    // Informational only; a missing total never decides the status.
    if reconciliation.declared_total.is_none() && !items.is_empty() {
        triggered.push((None, ISSUE_NO_TOTAL.to_string()));
    }
    if reconciliation.largest_duplicate_group() >= DUPLICATE_SCAN_GROUP {
        triggered.push((Some(VerdictStatus::NeedsReview), ISSUE_DUPLICATE_SCAN.to_string()));
    }
    if !store.is_known() || store.confidence == 0.0 {
        triggered.push((Some(VerdictStatus::NeedsReview), ISSUE_UNKNOWN_STORE.to_string()));
    }

    let status = triggered
        .iter()
        .find_map(|(status, _)| *status)
        .unwrap_or(VerdictStatus::Valid);
    let overall_confidence = overall_confidence(detection, reconciliation);
    let issues: Vec<String> = triggered.into_iter().map(|(_, issue)| issue).collect();

    debug!(
        status = status.as_str(),
        overall_confidence,
        issues = issues.len(),
        likely_receipt = detection.confidence > RECEIPT_THRESHOLD,
        "Validation verdict"
    );

    ValidationVerdict {
        status,
        overall_confidence,
        issues,
        computed_subtotal: reconciliation.computed_subtotal,
        total_discrepancy: reconciliation.discrepancy,
    }
}

/// Detection confidence scaled by how far the items are from the printed
/// total. An unknown store is not penalised here; the status already is.
fn overall_confidence(detection: &DetectionResult, reconciliation: &Reconciliation) -> f64 {
    let mut confidence = detection.confidence;

    if let Some(total) = reconciliation.declared_total {
        let off = reconciliation.discrepancy.abs();
        let ratio = if total > Decimal::ZERO {
            off.checked_div(total)
                .and_then(|r| r.to_f64())
                .unwrap_or(1.0)
                .min(1.0)
        } else if off.is_zero() {
            0.0
        } else {
            1.0
        };
        confidence *= 1.0 - ratio;
    }

    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}
