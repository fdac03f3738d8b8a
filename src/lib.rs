//! Turns raw OCR fragments from a photographed grocery receipt into a
//! structured, validated receipt record.

pub mod config;
pub mod detection;
pub mod errors;
pub mod heuristics;
pub mod identify;
pub mod ocr_client;
pub mod pipeline;
pub mod receipt_db;
pub mod reconcile;
pub mod registry;
pub mod types;
pub mod validation;

pub use errors::ReceiptError;
pub use pipeline::{ReceiptPipeline, ScanOutcome, group_lines};
pub use registry::{Retailer, SignatureRegistry};
pub use types::{
    BoundingBox, Category, DetectionResult, LineItemCandidate, OcrFragment, OcrPayload,
    ParsedReceipt, ValidationVerdict, VerdictStatus,
};
