// src/registry.rs

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ReceiptError;

/// Retailers the pipeline knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Retailer {
    Countdown,
    NewWorld,
    PaknSave,
    FourSquare,
    MooreWilsons,
    Warehouse,
    FreshChoice,
    SuperValue,
    Unknown,
}

impl Retailer {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Retailer::Countdown => "Countdown",
            Retailer::NewWorld => "New World",
            Retailer::PaknSave => "Pak'nSave",
            Retailer::FourSquare => "Four Square",
            Retailer::MooreWilsons => "Moore Wilson's Fresh",
            Retailer::Warehouse => "The Warehouse",
            Retailer::FreshChoice => "Fresh Choice",
            Retailer::SuperValue => "Super Value",
            Retailer::Unknown => crate::types::UNKNOWN_STORE,
        }
    }
}

/// Static rule set identifying one retailer from receipt text.
///
/// Keywords are matched as case-insensitive substrings. The optional anchor
/// regex counts as one more `must_contain` alternative.
#[derive(Debug, Clone)]
pub struct RetailerSignature {
    pub retailer: Retailer,
    pub must_contain: &'static [&'static str],
    pub must_not_contain: &'static [&'static str],
    pub priority: i32,
    pub anchor: Option<&'static str>,
}

pub const BUILTIN_SIGNATURES: &[RetailerSignature] = &[
    RetailerSignature {
        retailer: Retailer::Countdown,
        must_contain: &["countdown", "countdown.co.nz"],
        must_not_contain: &[],
        priority: 80,
        anchor: None,
    },
    RetailerSignature {
        retailer: Retailer::NewWorld,
        must_contain: &["new world"],
        must_not_contain: &[],
        priority: 70,
        anchor: Some(r"\bnew\s*world\b"),
    },
    RetailerSignature {
        retailer: Retailer::PaknSave,
        must_contain: &["paknsave", "pak'n save", "pak'nsave", "pak'n'save", "pak n save"],
        must_not_contain: &[],
        priority: 60,
        anchor: Some(r"\bpak\s*'?\s*n\s*'?\s*save\b"),
    },
    RetailerSignature {
        retailer: Retailer::FreshChoice,
        must_contain: &["fresh choice", "freshchoice"],
        must_not_contain: &[],
        priority: 50,
        anchor: None,
    },
    RetailerSignature {
        retailer: Retailer::MooreWilsons,
        must_contain: &["moore wilson", "wilson fresh"],
        must_not_contain: &[],
        priority: 40,
        anchor: None,
    },
    RetailerSignature {
        retailer: Retailer::FourSquare,
        must_contain: &["four square", "4 square"],
        must_not_contain: &[],
        priority: 30,
        anchor: Some(r"\b(four|4)\s*square\b"),
    },
    RetailerSignature {
        retailer: Retailer::SuperValue,
        must_contain: &["super value", "supervalue"],
        must_not_contain: &[],
        priority: 20,
        anchor: None,
    },
    RetailerSignature {
        retailer: Retailer::Warehouse,
        must_contain: &["the warehouse", "warehouse"],
        must_not_contain: &["warehouse stationery"],
        priority: 10,
        anchor: None,
    },
];

/// A signature with its anchor compiled and keywords lower-cased.
#[derive(Debug)]
pub struct CompiledSignature {
    pub retailer: Retailer,
    pub priority: i32,
    must_contain: Vec<String>,
    must_not_contain: Vec<String>,
    anchor: Option<Regex>,
}

impl CompiledSignature {
    /// Whether `normalized` (lower-cased, whitespace-collapsed) satisfies this signature.
    pub fn matches(&self, normalized: &str) -> bool {
        let positive = self.must_contain.iter().any(|k| normalized.contains(k.as_str()))
            || self.anchor.as_ref().is_some_and(|re| re.is_match(normalized));
        positive && !self.must_not_contain.iter().any(|k| normalized.contains(k.as_str()))
    }
}

/// Immutable table of retailer signatures, validated once at startup.
#[derive(Debug)]
pub struct SignatureRegistry {
    signatures: Vec<CompiledSignature>,
}

impl SignatureRegistry {
    /// Compile and validate a signature table.
    ///
    /// Fails on duplicate priorities, signatures for `Retailer::Unknown`,
    /// signatures with nothing to match on, or anchors that do not compile.
    pub fn new(signatures: &[RetailerSignature]) -> Result<Self, ReceiptError> {
        let mut seen: HashMap<i32, Retailer> = HashMap::new();
        let mut compiled = Vec::with_capacity(signatures.len());

        for sig in signatures {
            if sig.retailer == Retailer::Unknown {
                return Err(ReceiptError::Registry(
                    "Unknown is not a matchable retailer".to_string(),
                ));
            }
            if sig.must_contain.is_empty() && sig.anchor.is_none() {
                return Err(ReceiptError::Registry(format!(
                    "{} has no keywords or anchor",
                    sig.retailer.canonical_name()
                )));
            }
            if let Some(previous) = seen.insert(sig.priority, sig.retailer) {
                return Err(ReceiptError::Registry(format!(
                    "{} and {} share priority {}",
                    previous.canonical_name(),
                    sig.retailer.canonical_name(),
                    sig.priority
                )));
            }

            let anchor = sig
                .anchor
                .map(|pat| Regex::new(&format!("(?i){pat}")))
                .transpose()
                .map_err(|e| {
                    ReceiptError::Registry(format!(
                        "bad anchor for {}: {e}",
                        sig.retailer.canonical_name()
                    ))
                })?;

            compiled.push(CompiledSignature {
                retailer: sig.retailer,
                priority: sig.priority,
                must_contain: sig.must_contain.iter().map(|k| k.to_lowercase()).collect(),
                must_not_contain: sig.must_not_contain.iter().map(|k| k.to_lowercase()).collect(),
                anchor,
            });
        }

        debug!(signatures = compiled.len(), "Retailer registry compiled");
        Ok(Self { signatures: compiled })
    }

    /// The built-in New Zealand grocery table.
    pub fn builtin() -> Result<Self, ReceiptError> {
        Self::new(BUILTIN_SIGNATURES)
    }

    /// Signatures in declaration order.
    pub fn signatures(&self) -> &[CompiledSignature] {
        &self.signatures
    }

    /// Lower-cased canonical names of every registered retailer.
    pub fn retailer_keywords(&self) -> Vec<String> {
        self.signatures
            .iter()
            .map(|s| s.retailer.canonical_name().to_lowercase())
            .collect()
    }
}
