use super::error::{Result, TaxError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Asset class for tax treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum AssetClass {
    Crypto,
    #[default]
    Stock,
    Forex,
}

/// A historical buy or sell as recorded by the trade ledger. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Trade {
    /// Unique identifier of the trade within the ledger
    pub id: String,
    /// Instrument symbol (e.g. "BTC", "VOD.L", "EURUSD")
    pub symbol: String,
    pub side: Side,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Price per unit
    #[schemars(with = "f64")]
    pub price: Decimal,
    /// When the position was entered (RFC3339 with offset; date-only assumes UTC)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub entry_time: DateTime<FixedOffset>,
    /// When a sell settled (sell only)
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    #[schemars(with = "Option<String>")]
    pub exit_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fees: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub foreign_tax_withheld: Decimal,
    #[serde(default)]
    pub asset_class: AssetClass,
}

impl Trade {
    /// Gross value of the trade, before fees
    pub fn gross_value(&self) -> Result<Decimal> {
        self.price
            .checked_mul(self.quantity)
            .ok_or_else(|| TaxError::invalid_trade(&self.id, "value out of range"))
    }

    /// Time the trade counts for tax purposes: exit for sells, entry for buys
    pub fn settled_at(&self) -> DateTime<FixedOffset> {
        match self.side {
            Side::Buy => self.entry_time,
            Side::Sell => self.exit_time.unwrap_or(self.entry_time),
        }
    }

    pub fn settled_date(&self) -> NaiveDate {
        self.settled_at().date_naive()
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(TaxError::invalid_trade(&self.id, "quantity must be positive"));
        }
        if self.price.is_sign_negative() {
            return Err(TaxError::invalid_trade(&self.id, "price must not be negative"));
        }
        if self.fees.is_sign_negative() || self.foreign_tax_withheld.is_sign_negative() {
            return Err(TaxError::invalid_trade(
                &self.id,
                "fees and foreign tax must not be negative",
            ));
        }
        if self.symbol.trim().is_empty() {
            return Err(TaxError::invalid_trade(&self.id, "symbol is empty"));
        }
        self.gross_value()?;
        Ok(())
    }
}

/// Input root for the trade ledger JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LedgerInput {
    pub trades: Vec<Trade>,
}

/// CSV row for the trade ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub entry_time: String,
    #[serde(default)]
    pub exit_time: Option<String>,
    #[serde(default)]
    pub fees: Option<Decimal>,
    #[serde(default)]
    pub foreign_tax_withheld: Option<Decimal>,
    #[serde(default)]
    pub asset_class: Option<AssetClass>,
}

pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "symbol",
    "side",
    "quantity",
    "price",
    "entry_time",
    "exit_time",
    "fees",
    "foreign_tax_withheld",
    "asset_class",
];

impl TryFrom<TradeRecord> for Trade {
    type Error = TaxError;

    fn try_from(record: TradeRecord) -> Result<Self> {
        let entry_time = parse_datetime(&record.entry_time)
            .ok_or_else(|| TaxError::invalid_trade(&record.id, "invalid entry_time"))?;
        let exit_time = match record.exit_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                parse_datetime(s)
                    .ok_or_else(|| TaxError::invalid_trade(&record.id, "invalid exit_time"))?,
            ),
        };
        Ok(Trade {
            id: record.id,
            symbol: record.symbol,
            side: record.side,
            quantity: record.quantity,
            price: record.price,
            entry_time,
            exit_time,
            fees: record.fees.unwrap_or_default(),
            foreign_tax_withheld: record.foreign_tax_withheld.unwrap_or_default(),
            asset_class: record.asset_class.unwrap_or_default(),
        })
    }
}

/// Read trades from ledger JSON, sorted by entry time
pub fn read_trades_json<R: Read>(reader: R) -> Result<Vec<Trade>> {
    let input: LedgerInput = serde_json::from_reader(reader)?;
    let mut trades = input.trades;
    trades.sort_by_key(|t| t.entry_time);
    Ok(trades)
}

/// Read trades from ledger CSV, sorted by entry time
pub fn read_trades_csv<R: Read>(reader: R) -> Result<Vec<Trade>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut trades = rdr
        .deserialize::<TradeRecord>()
        .map(|record| Trade::try_from(record?))
        .collect::<Result<Vec<_>>>()?;
    trades.sort_by_key(|t| t.entry_time);
    Ok(trades)
}

pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().fixed_offset());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
}

fn deserialize_datetime<'de, D>(
    deserializer: D,
) -> std::result::Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {s}")))
}

fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_date_only_as_utc_midnight() {
        let dt = parse_datetime("2024-03-01").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_datetime("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn rejects_garbage_datetime() {
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn json_ledger_is_sorted_and_defaults_applied() {
        let json = r#"{"trades": [
            {"id": "2", "symbol": "BTC", "side": "sell", "quantity": "1", "price": "30000",
             "entry_time": "2024-05-01", "exit_time": "2024-05-02"},
            {"id": "1", "symbol": "BTC", "side": "buy", "quantity": 1, "price": 20000,
             "entry_time": "2024-01-01", "fees": 10}
        ]}"#;
        let trades = read_trades_json(json.as_bytes()).unwrap();
        assert_eq!(trades[0].id, "1");
        assert_eq!(trades[0].fees, dec!(10));
        assert_eq!(trades[0].asset_class, AssetClass::Stock);
        assert_eq!(trades[1].foreign_tax_withheld, Decimal::ZERO);
        assert_eq!(trades[1].settled_date(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }

    #[test]
    fn csv_ledger_reads_optional_columns() {
        let csv = "\
id,symbol,side,quantity,price,entry_time,exit_time,fees,foreign_tax_withheld,asset_class
b1,VOD.L,buy,100,1.20,2024-02-01,,1.5,,Stock
s1,VOD.L,sell,40,1.50,2024-03-01,2024-03-03,1,0.2,
";
        let trades = read_trades_csv(csv.as_bytes()).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_time, None);
        assert_eq!(trades[1].foreign_tax_withheld, dec!(0.2));
        assert_eq!(trades[1].gross_value().unwrap(), dec!(60.00));
    }

    #[test]
    fn sell_without_exit_time_settles_at_entry() {
        let trade = Trade {
            id: "s".to_string(),
            symbol: "BTC".to_string(),
            side: Side::Sell,
            quantity: dec!(1),
            price: dec!(1),
            entry_time: parse_datetime("2024-06-01").unwrap(),
            exit_time: None,
            fees: Decimal::ZERO,
            foreign_tax_withheld: Decimal::ZERO,
            asset_class: AssetClass::Crypto,
        };
        assert_eq!(trade.settled_at(), trade.entry_time);
    }

    fn valid_buy() -> Trade {
        Trade {
            id: "x".to_string(),
            symbol: "BTC".to_string(),
            side: Side::Buy,
            quantity: dec!(1),
            price: dec!(1),
            entry_time: parse_datetime("2024-06-01").unwrap(),
            exit_time: None,
            fees: Decimal::ZERO,
            foreign_tax_withheld: Decimal::ZERO,
            asset_class: AssetClass::Crypto,
        }
    }

    fn rejection(trade: Trade) -> String {
        match trade.validate() {
            Err(TaxError::InvalidTrade { trade_id, reason }) => {
                assert_eq!(trade_id, "x");
                reason
            }
            other => panic!("expected InvalidTrade, got {other:?}"),
        }
    }

    #[test]
    fn validation_accepts_zero_price_and_fees() {
        let mut trade = valid_buy();
        trade.price = Decimal::ZERO;
        assert!(trade.validate().is_ok());
    }

    #[test]
    fn validation_rejects_non_positive_quantity() {
        let mut trade = valid_buy();
        trade.quantity = Decimal::ZERO;
        assert_eq!(rejection(trade.clone()), "quantity must be positive");
        trade.quantity = dec!(-1);
        assert_eq!(rejection(trade), "quantity must be positive");
    }

    #[test]
    fn validation_rejects_negative_price() {
        let mut trade = valid_buy();
        trade.price = dec!(-0.01);
        assert_eq!(rejection(trade), "price must not be negative");
    }

    #[test]
    fn validation_rejects_negative_fees_and_foreign_tax() {
        let mut trade = valid_buy();
        trade.fees = dec!(-1);
        assert_eq!(rejection(trade), "fees and foreign tax must not be negative");

        let mut trade = valid_buy();
        trade.foreign_tax_withheld = dec!(-1);
        assert_eq!(rejection(trade), "fees and foreign tax must not be negative");
    }

    #[test]
    fn validation_rejects_blank_symbol() {
        let mut trade = valid_buy();
        trade.symbol = "  ".to_string();
        assert_eq!(rejection(trade), "symbol is empty");
    }

    #[test]
    fn validation_rejects_value_out_of_range() {
        let mut trade = valid_buy();
        trade.quantity = dec!(10_000_000_000_000_000);
        trade.price = dec!(100_000_000_000_000);
        assert!(trade.gross_value().is_err());
        assert_eq!(rejection(trade), "value out of range");
    }

    #[test]
    fn csv_ledger_rejects_bad_entry_time() {
        let csv = "\
id,symbol,side,quantity,price,entry_time,exit_time,fees,foreign_tax_withheld,asset_class
b1,BTC,buy,1,100,last tuesday,,,,
";
        match read_trades_csv(csv.as_bytes()) {
            Err(TaxError::InvalidTrade { trade_id, reason }) => {
                assert_eq!(trade_id, "b1");
                assert_eq!(reason, "invalid entry_time");
            }
            other => panic!("expected InvalidTrade, got {other:?}"),
        }
    }

    #[test]
    fn csv_ledger_rejects_bad_exit_time() {
        let csv = "\
id,symbol,side,quantity,price,entry_time,exit_time,fees,foreign_tax_withheld,asset_class
s1,BTC,sell,1,100,2024-03-01,03/04/2024,,,
";
        match read_trades_csv(csv.as_bytes()) {
            Err(TaxError::InvalidTrade { trade_id, reason }) => {
                assert_eq!(trade_id, "s1");
                assert_eq!(reason, "invalid exit_time");
            }
            other => panic!("expected InvalidTrade, got {other:?}"),
        }
    }
}
