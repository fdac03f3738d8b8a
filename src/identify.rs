use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{Retailer, SignatureRegistry};

/// The identified retailer and how sure we are about it.
///
/// Confidence is binary: 1.0 for a signature match, 0.0 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMatch {
    pub retailer: Retailer,
    pub store_name: String,
    pub confidence: f64,
}

impl StoreMatch {
    pub fn unknown() -> Self {
        Self {
            retailer: Retailer::Unknown,
            store_name: Retailer::Unknown.canonical_name().to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.retailer != Retailer::Unknown
    }
}

/// Lower-case and collapse runs of whitespace to a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Pick the highest-priority retailer whose signature matches `full_text`.
///
/// Priorities are unique (enforced by the registry), so the winner is
/// deterministic. A near-miss reports unknown rather than a guess.
pub fn identify(full_text: &str, registry: &SignatureRegistry) -> StoreMatch {
    let normalized = normalize_text(full_text);

    let best = registry
        .signatures()
        .iter()
        .filter(|sig| sig.matches(&normalized))
        .max_by_key(|sig| sig.priority);

    match best {
        Some(sig) => {
            debug!(retailer = ?sig.retailer, priority = sig.priority, "Store identified");
            StoreMatch {
                retailer: sig.retailer,
                store_name: sig.retailer.canonical_name().to_string(),
                confidence: 1.0,
            }
        }
        None => {
            debug!("No retailer signature matched");
            StoreMatch::unknown()
        }
    }
}
