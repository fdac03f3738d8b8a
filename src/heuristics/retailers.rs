use crate::registry::Retailer;

// Payment and change lines print a trailing amount on every NZ grocery
// format we handle.
const COUNTDOWN: &[&str] = &["GST", "CHANGE", "EFTPOS"];
const NEW_WORLD: &[&str] = &["AMOUNT DUE", "GST", "CHANGE", "EFTPOS"];
const PAKNSAVE: &[&str] = &["AMOUNT", "TXN", "TRANS", "GST", "CHANGE", "EFTPOS"];
const MOORE_WILSONS: &[&str] = &["TXN", "AMOUNT DUE", "GST", "CHANGE", "EFTPOS"];
const WAREHOUSE: &[&str] = &["TXN", "TRANS", "GST", "CHANGE", "EFTPOS"];
const FRESH_CHOICE: &[&str] = &["TXN", "TRANS", "GST", "CHANGE", "EFTPOS"];

/// Keywords a retailer's specialized strategy excludes, or `None` when the
/// retailer has no specialized strategy and falls back to the generic one.
pub(super) fn excluded_keywords(retailer: Retailer) -> Option<&'static [&'static str]> {
    match retailer {
        Retailer::Countdown => Some(COUNTDOWN),
        Retailer::NewWorld => Some(NEW_WORLD),
        Retailer::PaknSave => Some(PAKNSAVE),
        Retailer::MooreWilsons => Some(MOORE_WILSONS),
        Retailer::Warehouse => Some(WAREHOUSE),
        Retailer::FreshChoice => Some(FRESH_CHOICE),
        Retailer::FourSquare | Retailer::SuperValue | Retailer::Unknown => None,
    }
}
