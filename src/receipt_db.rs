use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::path::Path;
use time::Date;
use tracing::info;

use crate::errors::ReceiptError;
use crate::types::{Category, LineItemCandidate, ParsedReceipt, ValidationVerdict, VerdictStatus};

/// SQLite store for parsed receipts, their items and validation issues.
pub struct ReceiptStore {
    conn: Connection,
}

impl ReceiptStore {
    /// Open (or create) the receipt database. `":memory:"` works for tests.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, ReceiptError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS receipts (
                uid TEXT PRIMARY KEY,
                store_name TEXT NOT NULL,
                retailer TEXT NOT NULL,
                store_confidence REAL NOT NULL,
                receipt_date TEXT,
                receipt_number TEXT,
                declared_subtotal TEXT,
                declared_tax TEXT,
                declared_total TEXT,
                computed_subtotal TEXT NOT NULL,
                total_discrepancy TEXT NOT NULL,
                status TEXT NOT NULL,
                overall_confidence REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS receipt_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                receipt_uid TEXT NOT NULL,
                position INTEGER NOT NULL,
                raw_line TEXT NOT NULL,
                name TEXT NOT NULL,
                unit_price TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                line_confidence REAL NOT NULL,
                category TEXT,
                FOREIGN KEY (receipt_uid) REFERENCES receipts(uid) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS receipt_issues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                receipt_uid TEXT NOT NULL,
                position INTEGER NOT NULL,
                issue TEXT NOT NULL,
                FOREIGN KEY (receipt_uid) REFERENCES receipts(uid) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_receipts_status ON receipts(status)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_items_receipt_uid ON receipt_items(receipt_uid)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_issues_receipt_uid ON receipt_issues(receipt_uid)",
            [],
        )?;

        info!("Receipt database initialized");
        Ok(Self { conn })
    }

    /// Stable ID for a scan, so saving the same receipt twice upserts.
    pub fn scan_uid(
        store_name: &str,
        date: Option<Date>,
        total: Option<Decimal>,
        items: &[LineItemCandidate],
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(store_name.as_bytes());
        hasher.update(date.map(|d| d.to_string()).unwrap_or_default().as_bytes());
        hasher.update(total.map(|t| t.to_string()).unwrap_or_default().as_bytes());
        for item in items {
            hasher.update(b"\n");
            hasher.update(item.raw_line.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Insert or replace a receipt with its items and issues. Returns the uid.
    pub fn save(
        &self,
        receipt: &ParsedReceipt,
        verdict: &ValidationVerdict,
    ) -> Result<String, ReceiptError> {
        let uid = Self::scan_uid(
            &receipt.store_name,
            receipt.date,
            receipt.declared_total,
            &receipt.items,
        );
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO receipts
                (uid, store_name, retailer, store_confidence, receipt_date, receipt_number,
                 declared_subtotal, declared_tax, declared_total,
                 computed_subtotal, total_discrepancy, status, overall_confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(uid) DO UPDATE SET
                store_confidence = excluded.store_confidence,
                receipt_number = excluded.receipt_number,
                declared_subtotal = excluded.declared_subtotal,
                declared_tax = excluded.declared_tax,
                computed_subtotal = excluded.computed_subtotal,
                total_discrepancy = excluded.total_discrepancy,
                status = excluded.status,
                overall_confidence = excluded.overall_confidence",
            params![
                uid,
                receipt.store_name,
                format!("{:?}", receipt.retailer),
                receipt.store_confidence,
                receipt.date.map(|d| d.to_string()),
                receipt.receipt_number,
                receipt.declared_subtotal.map(|d| d.to_string()),
                receipt.declared_tax.map(|d| d.to_string()),
                receipt.declared_total.map(|d| d.to_string()),
                verdict.computed_subtotal.to_string(),
                verdict.total_discrepancy.to_string(),
                verdict.status.as_str(),
                verdict.overall_confidence,
            ],
        )?;

        tx.execute("DELETE FROM receipt_items WHERE receipt_uid = ?1", params![uid])?;
        tx.execute("DELETE FROM receipt_issues WHERE receipt_uid = ?1", params![uid])?;

        for (position, item) in receipt.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO receipt_items
                    (receipt_uid, position, raw_line, name, unit_price, quantity, line_confidence, category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    uid,
                    position as i64,
                    item.raw_line,
                    item.name,
                    item.unit_price.to_string(),
                    item.quantity,
                    item.line_confidence,
                    item.category.map(|c| c.as_str()),
                ],
            )?;
        }

        for (position, issue) in verdict.issues.iter().enumerate() {
            tx.execute(
                "INSERT INTO receipt_issues (receipt_uid, position, issue) VALUES (?1, ?2, ?3)",
                params![uid, position as i64, issue],
            )?;
        }

        tx.commit()?;
        info!(
            uid = %uid,
            status = verdict.status.as_str(),
            items = receipt.items.len(),
            "Receipt stored"
        );
        Ok(uid)
    }

    /// Verdict status of a stored receipt, if it exists.
    pub fn get_status(&self, uid: &str) -> Result<Option<VerdictStatus>, ReceiptError> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM receipts WHERE uid = ?1",
                params![uid],
                |row| {
                    let label: String = row.get(0)?;
                    VerdictStatus::from_label(&label).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            Type::Text,
                            format!("unknown status '{label}'").into(),
                        )
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    /// Items of a stored receipt in their original line order.
    pub fn get_items(&self, uid: &str) -> Result<Vec<LineItemCandidate>, ReceiptError> {
        let mut stmt = self.conn.prepare(
            "SELECT raw_line, name, unit_price, quantity, line_confidence, category
             FROM receipt_items
             WHERE receipt_uid = ?1
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![uid], |row| Self::row_to_item(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_issues(&self, uid: &str) -> Result<Vec<String>, ReceiptError> {
        let mut stmt = self.conn.prepare(
            "SELECT issue FROM receipt_issues WHERE receipt_uid = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![uid], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<LineItemCandidate> {
        let price: String = row.get(2)?;
        let unit_price = price
            .parse::<Decimal>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        let category: Option<String> = row.get(5)?;
        Ok(LineItemCandidate {
            raw_line: row.get(0)?,
            name: row.get(1)?,
            unit_price,
            quantity: row.get(3)?,
            line_confidence: row.get(4)?,
            category: category.as_deref().and_then(Category::from_label),
        })
    }

    /// Receipt counts: (total, valid, needs_review, rejected).
    pub fn get_counts(&self) -> Result<(usize, usize, usize, usize), ReceiptError> {
        let total: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?;

        let by_status = |status: VerdictStatus| -> Result<usize, ReceiptError> {
            Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM receipts WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?)
        };

        Ok((
            total,
            by_status(VerdictStatus::Valid)?,
            by_status(VerdictStatus::NeedsReview)?,
            by_status(VerdictStatus::Rejected)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ReceiptPipeline;

    fn store() -> ReceiptStore {
        ReceiptStore::new(":memory:").unwrap()
    }

    fn scan(lines: &[&str]) -> crate::pipeline::ScanOutcome {
        ReceiptPipeline::with_builtin_registry()
            .unwrap()
            .process_lines(lines)
    }

    #[test]
    fn test_uid_generation() {
        let uid1 = ReceiptStore::scan_uid("Countdown", None, Some(Decimal::new(770, 2)), &[]);
        let uid2 = ReceiptStore::scan_uid("Countdown", None, Some(Decimal::new(770, 2)), &[]);
        let uid3 = ReceiptStore::scan_uid("New World", None, Some(Decimal::new(770, 2)), &[]);

        assert_eq!(uid1, uid2);
        assert_ne!(uid1, uid3);
        assert_eq!(uid1.len(), 64);
    }

    #[test]
    fn saved_receipt_round_trips_items_and_status() {
        let db = store();
        let outcome = scan(&["COUNTDOWN", "Milk 2L $4.50", "Bread $3.20", "TOTAL $7.70"]);
        let uid = db.save(&outcome.receipt, &outcome.verdict).unwrap();

        assert_eq!(db.get_status(&uid).unwrap(), Some(VerdictStatus::Valid));
        assert_eq!(db.get_items(&uid).unwrap(), outcome.receipt.items);
        assert!(db.get_issues(&uid).unwrap().is_empty());
    }

    #[test]
    fn saving_twice_upserts() {
        let db = store();
        let outcome = scan(&["COUNTDOWN", "Apples $4.50", "TOTAL $9.00"]);
        let first = db.save(&outcome.receipt, &outcome.verdict).unwrap();
        let second = db.save(&outcome.receipt, &outcome.verdict).unwrap();

        assert_eq!(first, second);
        assert_eq!(db.get_counts().unwrap().0, 1);
        assert_eq!(db.get_items(&first).unwrap().len(), 1);
        assert_eq!(db.get_issues(&first).unwrap().len(), 1);
    }

    #[test]
    fn counts_split_by_status() {
        let db = store();
        for lines in [
            vec!["COUNTDOWN", "Milk $4.50", "TOTAL $4.50"],
            vec!["corner dairy", "Milk $4.50", "TOTAL $4.50"],
            vec!["nothing useful here"],
        ] {
            let outcome = scan(&lines);
            db.save(&outcome.receipt, &outcome.verdict).unwrap();
        }
        assert_eq!(db.get_counts().unwrap(), (3, 1, 1, 1));
    }

    #[test]
    fn missing_receipt_has_no_status() {
        assert_eq!(store().get_status("nope").unwrap(), None);
    }
}
