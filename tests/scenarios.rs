use receipt_ingest::detection::detect;
use receipt_ingest::heuristics::parse_lines;
use receipt_ingest::identify::identify;
use receipt_ingest::reconcile::reconcile;
use receipt_ingest::validation::{ISSUE_DUPLICATE_SCAN, ISSUE_TOTAL_MISMATCH, validate};
use receipt_ingest::{ReceiptPipeline, Retailer, SignatureRegistry, VerdictStatus};
use rust_decimal::Decimal;

fn pipeline() -> ReceiptPipeline {
    ReceiptPipeline::with_builtin_registry().unwrap()
}

fn dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[test]
fn scenario_a_milk_and_bread() {
    let lines = ["Milk 2L $4.50", "Bread $3.20", "TOTAL $7.70"];

    let items = parse_lines(&lines, Retailer::Unknown);
    let summary: Vec<_> = items
        .iter()
        .map(|i| (i.name.as_str(), i.unit_price, i.quantity))
        .collect();
    assert_eq!(summary, [("Milk 2L", dollars(450), 1), ("Bread", dollars(320), 1)]);

    let rec = reconcile(&items, Some(dollars(770)), None);
    assert_eq!(rec.computed_subtotal, dollars(770));
    assert_eq!(rec.discrepancy, Decimal::ZERO);

    // With a recognised store nothing else stands in the way of Valid.
    let mut with_store = vec!["COUNTDOWN"];
    with_store.extend(lines);
    let outcome = pipeline().process_lines(&with_store);
    assert_eq!(outcome.verdict.status, VerdictStatus::Valid);
    assert_eq!(outcome.verdict.computed_subtotal, dollars(770));
    assert_eq!(outcome.verdict.total_discrepancy, Decimal::ZERO);
    assert!(outcome.verdict.issues.is_empty());
}

#[test]
fn scenario_a_without_a_store_is_flagged_only_for_the_store() {
    let outcome = pipeline().process_lines(&["Milk 2L $4.50", "Bread $3.20", "TOTAL $7.70"]);
    assert_eq!(outcome.receipt.items.len(), 2);
    assert_eq!(outcome.verdict.total_discrepancy, Decimal::ZERO);
    assert_eq!(outcome.verdict.status, VerdictStatus::NeedsReview);
    assert_eq!(outcome.verdict.issues, ["store not recognized"]);
}

#[test]
fn scenario_b_retailer_keyword_boosts_detection() {
    let registry = SignatureRegistry::builtin().unwrap();
    let pipeline = pipeline();

    let with_store = pipeline.process_lines(&["COUNTDOWN", "Milk $4.50"]);
    let without_store = pipeline.process_lines(&["corner shop", "Milk $4.50"]);

    assert_eq!(with_store.receipt.retailer, Retailer::Countdown);
    assert_eq!(with_store.receipt.store_name, "Countdown");
    assert!(with_store.detection.is_receipt);
    assert!(with_store.detection.features.has_retailer_keyword);
    assert!(!with_store.detection.features.has_date_pattern);
    assert!(with_store.detection.confidence > without_store.detection.confidence);

    assert_eq!(identify("countdown milk 4.50", &registry).retailer, Retailer::Countdown);
}

#[test]
fn scenario_c_triple_scan_needs_review() {
    let outcome = pipeline().process_lines(&["Apples $4.50", "Apples $4.50", "Apples $4.50"]);
    assert_eq!(outcome.receipt.items.len(), 3);
    assert_eq!(outcome.verdict.status, VerdictStatus::NeedsReview);
    assert!(outcome.verdict.issues.iter().any(|i| i == ISSUE_DUPLICATE_SCAN));
}

#[test]
fn scenario_d_tax_inclusive_mismatch() {
    let outcome = pipeline().process_lines(&[
        "COUNTDOWN",
        "Groceries $45.00",
        "SUBTOTAL $45.00",
        "GST $2.00",
        "TOTAL $50.00",
    ]);
    assert_eq!(outcome.receipt.declared_subtotal, Some(dollars(4500)));
    assert_eq!(outcome.receipt.declared_tax, Some(dollars(200)));
    assert_eq!(outcome.receipt.declared_total, Some(dollars(5000)));
    assert_eq!(outcome.verdict.computed_subtotal, dollars(4500));
    assert_eq!(outcome.verdict.total_discrepancy, dollars(-300));
    assert_eq!(outcome.verdict.status, VerdictStatus::NeedsReview);
    assert!(outcome.verdict.issues[0].starts_with(ISSUE_TOTAL_MISMATCH));
}

#[test]
fn validate_is_callable_on_hand_built_stages() {
    let registry = SignatureRegistry::builtin().unwrap();
    let lines = ["NEW WORLD", "Cheese $8.99", "AMOUNT DUE $8.99", "TOTAL $8.99"];
    let fragments: Vec<_> = lines
        .iter()
        .map(|l| receipt_ingest::OcrFragment::text_only(*l))
        .collect();

    let detection = detect(&fragments, &registry);
    let store = identify(&lines.join("\n"), &registry);
    let items = parse_lines(&lines, store.retailer);
    let rec = reconcile(&items, Some(dollars(899)), None);
    let verdict = validate(&detection, &store, &items, &rec);

    assert_eq!(store.retailer, Retailer::NewWorld);
    assert_eq!(items.len(), 1);
    assert_eq!(verdict.status, VerdictStatus::Valid);
}
