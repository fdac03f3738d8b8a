// src/reconcile.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identify::normalize_text;
use crate::types::LineItemCandidate;

/// Arithmetic cross-check between parsed items and the printed totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub computed_subtotal: Decimal,
    /// `computed_subtotal + tax - total`; zero when no total was printed.
    pub discrepancy: Decimal,
    /// The printed total reconciled against, if any.
    pub declared_total: Option<Decimal>,
    /// Indices into the item list, one group per repeated normalized name,
    /// ordered by first occurrence.
    pub duplicate_groups: Vec<Vec<usize>>,
}

impl Reconciliation {
    pub fn largest_duplicate_group(&self) -> usize {
        self.duplicate_groups.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Sum the items in exact decimal arithmetic and compare against the
/// declared total. Duplicates are annotated, never removed.
pub fn reconcile(
    items: &[LineItemCandidate],
    declared_total: Option<Decimal>,
    declared_tax: Option<Decimal>,
) -> Reconciliation {
    let computed_subtotal = items
        .iter()
        .map(LineItemCandidate::extended_price)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let tax = declared_tax.unwrap_or(Decimal::ZERO);

    let discrepancy = match declared_total {
        Some(total) => computed_subtotal.saturating_add(tax).saturating_sub(total),
        None => Decimal::ZERO,
    };

    let duplicate_groups = duplicate_groups(items);

    debug!(
        subtotal = %computed_subtotal,
        discrepancy = %discrepancy,
        declared_total = ?declared_total,
        duplicate_groups = duplicate_groups.len(),
        "Reconciliation"
    );

    Reconciliation {
        computed_subtotal,
        discrepancy,
        declared_total,
        duplicate_groups,
    }
}

fn duplicate_groups(items: &[LineItemCandidate]) -> Vec<Vec<usize>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    for (idx, item) in items.iter().enumerate() {
        let key = normalize_text(&item.name);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(idx);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter(|group| group.len() >= 2)
        .collect()
}
