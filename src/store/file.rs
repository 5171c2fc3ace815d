use super::{DateRange, ResultStore, SettingsStore, TradeLedger};
use crate::core::{read_trades_csv, read_trades_json, Result, TaxError, TaxYear, Trade};
use crate::tax::{TaxCalculationResult, TaxSettings};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SETTINGS_FILE: &str = "settings.json";
const RESULTS_FILE: &str = "results.jsonl";
const TRADES_DIR: &str = "trades";

/// Data directory layout:
///
/// ```text
/// <root>/settings.json        user id -> settings
/// <root>/trades/<user>.json   ledger as {"trades": [...]} (or <user>.csv)
/// <root>/results.jsonl        one result per line, append only
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    append_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            root: root.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ledger_path(&self, user_id: &str) -> Result<Option<PathBuf>> {
        if user_id.is_empty() || user_id.contains(['/', '\\']) || user_id.starts_with('.') {
            return Err(TaxError::Store(format!("invalid user id: {user_id:?}")));
        }
        let dir = self.root.join(TRADES_DIR);
        Ok(["json", "csv"]
            .iter()
            .map(|ext| dir.join(format!("{user_id}.{ext}")))
            .find(|path| path.exists()))
    }

    fn read_results(&self) -> Result<Vec<TaxCalculationResult>> {
        let path = self.root.join(RESULTS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut results = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            results.push(serde_json::from_str(&line)?);
        }
        Ok(results)
    }
}

impl TradeLedger for FileStore {
    fn trades(&self, user_id: &str, range: DateRange) -> Result<Vec<Trade>> {
        let Some(path) = self.ledger_path(user_id)? else {
            log::warn!("No trade ledger for user {} in {}", user_id, self.root.display());
            return Ok(Vec::new());
        };
        let file = BufReader::new(File::open(&path)?);
        let trades = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => read_trades_csv(file)?,
            _ => read_trades_json(file)?,
        };
        log::debug!("Read {} trades from {}", trades.len(), path.display());
        Ok(trades
            .into_iter()
            .filter(|t| range.contains(t.entry_time.date_naive()))
            .collect())
    }
}

impl SettingsStore for FileStore {
    fn settings(&self, user_id: &str) -> Result<Option<TaxSettings>> {
        let path = self.root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let mut all: HashMap<String, TaxSettings> =
            serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Ok(all.remove(user_id))
    }
}

impl ResultStore for FileStore {
    fn latest(&self, user_id: &str, tax_year: TaxYear) -> Result<Option<TaxCalculationResult>> {
        Ok(self
            .read_results()?
            .into_iter()
            .filter(|r| r.user_id == user_id && r.tax_year == tax_year)
            .last())
    }

    fn history(&self, user_id: &str, tax_year: TaxYear) -> Result<Vec<TaxCalculationResult>> {
        Ok(self
            .read_results()?
            .into_iter()
            .filter(|r| r.user_id == user_id && r.tax_year == tax_year)
            .collect())
    }

    fn insert(&self, result: &TaxCalculationResult) -> Result<()> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');

        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| TaxError::Store("result file lock poisoned".to_string()))?;
        fs::create_dir_all(&self.root)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(RESULTS_FILE))?;
        // One write per record so a failed run never leaves a partial row
        file.write_all(&line)?;
        file.flush()?;
        log::info!(
            "Stored result {} for {} tax year {}",
            result.id,
            result.user_id,
            result.tax_year
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;
    use crate::tax::{compute, TaxOptions};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("taxlot-{}", uuid::Uuid::new_v4()))
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn reads_settings_and_json_ledger() {
        let root = temp_root();
        write(
            &root.join(SETTINGS_FILE),
            r#"{"alice": {"residency": "UK", "method": "LIFO"}}"#,
        );
        write(
            &root.join(TRADES_DIR).join("alice.json"),
            r#"{"trades": [
                {"id": "s1", "symbol": "BTC", "side": "sell", "quantity": "1", "price": "30",
                 "entry_time": "2025-03-01"},
                {"id": "b1", "symbol": "BTC", "side": "buy", "quantity": "1", "price": "10",
                 "entry_time": "2025-01-01"},
                {"id": "b2", "symbol": "BTC", "side": "buy", "quantity": "1", "price": "20",
                 "entry_time": "2025-06-01"}
            ]}"#,
        );
        let store = FileStore::new(&root);

        let settings = store.settings("alice").unwrap().unwrap();
        assert_eq!(settings.residency, "UK");
        assert!(store.settings("bob").unwrap().is_none());

        let range = DateRange::until(NaiveDate::from_ymd_opt(2025, 4, 5).unwrap());
        let trades = store.trades("alice", range).unwrap();
        let ids: Vec<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b1", "s1"]);
        assert_eq!(trades[1].side, Side::Sell);

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_ledger_is_empty() {
        let store = FileStore::new(temp_root());
        let range = DateRange::until(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(store.trades("nobody", range).unwrap().is_empty());
        assert!(store.settings("nobody").unwrap().is_none());
        assert!(store.latest("nobody", TaxYear(2025)).unwrap().is_none());
    }

    #[test]
    fn user_ids_cannot_escape_the_data_directory() {
        let store = FileStore::new(temp_root());
        let range = DateRange::until(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(matches!(
            store.trades("../etc/passwd", range),
            Err(TaxError::Store(_))
        ));
    }

    #[test]
    fn results_are_appended_one_per_line() {
        let root = temp_root();
        let store = FileStore::new(&root);
        let options = TaxSettings::new("US")
            .resolve(&TaxOptions::default())
            .unwrap();

        let first = compute("alice", TaxYear(2025), &[], &options, dec!(10)).unwrap();
        let second = compute("alice", TaxYear(2025), &[], &options, dec!(20)).unwrap();
        let other = compute("alice", TaxYear(2024), &[], &options, dec!(30)).unwrap();
        for result in [&first, &second, &other] {
            store.insert(result).unwrap();
        }

        let contents = fs::read_to_string(root.join(RESULTS_FILE)).unwrap();
        assert_eq!(contents.lines().count(), 3);

        let history = store.history("alice", TaxYear(2025)).unwrap();
        assert_eq!(history, vec![first, second.clone()]);
        assert_eq!(store.latest("alice", TaxYear(2025)).unwrap(), Some(second));

        fs::remove_dir_all(root).unwrap();
    }
}
