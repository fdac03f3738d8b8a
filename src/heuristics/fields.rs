use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

/// Amounts printed against the totals block of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeclaredTotals {
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
}

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?\s*(\d+\.\d{2})").expect("valid amount regex"));

static DATE_ISO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid ISO date regex")
});
static DATE_DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").expect("valid d/m/y date regex")
});
static DATE_MONTH_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{4})\b")
        .expect("valid month-name date regex")
});

static RECEIPT_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:receipt|rn|invoice|txn|trans)\s*[#:]?\s*(\d+)")
        .expect("valid receipt number regex")
});

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Find the printed subtotal, tax and total. Later lines override earlier
/// ones; the amount is the last price token on the line.
///
/// "GST included in total" notes restate tax already inside the total and
/// are ignored.
pub fn extract_totals<S: AsRef<str>>(lines: &[S]) -> DeclaredTotals {
    let mut totals = DeclaredTotals::default();

    for line in lines {
        let line = line.as_ref();
        let lower = line.to_lowercase();
        let Some(amount) = last_amount(line) else {
            continue;
        };
        if is_tax_inclusive_note(&lower) {
            continue;
        }

        let compact: String = lower.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
        if compact.contains("subtotal") {
            totals.subtotal = Some(amount);
        } else if lower.contains("total")
            || lower.contains("amount due")
            || lower.contains("balance due")
        {
            totals.total = Some(amount);
        } else if lower.contains("tax") || lower.contains("gst") {
            totals.tax = Some(amount);
        }
    }

    totals
}

/// `GST included in total $1.00`, as opposed to `Total incl GST $8.70`.
fn is_tax_inclusive_note(lower: &str) -> bool {
    if !lower.contains("incl") {
        return false;
    }
    let tax_at = ["gst", "tax"].iter().filter_map(|k| lower.find(k)).min();
    match (tax_at, lower.find("total")) {
        (Some(tax), Some(total)) => tax < total,
        (Some(_), None) => true,
        _ => false,
    }
}

fn last_amount(line: &str) -> Option<Decimal> {
    AMOUNT_RE
        .captures_iter(line)
        .last()
        .and_then(|c| c[1].parse().ok())
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

/// First valid calendar date on the receipt. Slash/dash dates are read
/// day-first; two-digit years are 20xx.
pub fn extract_date<S: AsRef<str>>(lines: &[S]) -> Option<Date> {
    lines.iter().find_map(|line| date_in_line(line.as_ref()))
}

fn date_in_line(line: &str) -> Option<Date> {
    if let Some(d) = DATE_ISO_RE
        .captures_iter(line)
        .find_map(|c| calendar_date(&c[1], &c[2], &c[3]))
    {
        return Some(d);
    }
    if let Some(d) = DATE_DMY_RE
        .captures_iter(line)
        .find_map(|c| calendar_date(&c[3], &c[2], &c[1]))
    {
        return Some(d);
    }
    DATE_MONTH_NAME_RE.captures_iter(line).find_map(|c| {
        let month = month_from_abbrev(&c[2])?;
        calendar_date(&c[3], &month.to_string(), &c[1])
    })
}

fn calendar_date(year: &str, month: &str, day: &str) -> Option<Date> {
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year, month, day.parse().ok()?).ok()
}

fn month_from_abbrev(abbrev: &str) -> Option<u8> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let abbrev = abbrev.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|idx| idx as u8 + 1)
}

// ---------------------------------------------------------------------------
// Receipt number
// ---------------------------------------------------------------------------

pub fn extract_receipt_number<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    lines
        .iter()
        .find_map(|line| RECEIPT_NO_RE.captures(line.as_ref()).map(|c| c[1].to_string()))
}
