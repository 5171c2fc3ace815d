use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

pub type Result<T> = std::result::Result<T, TaxError>;

/// Errors raised while matching lots or running a calculation.
#[derive(Debug, thiserror::Error)]
pub enum TaxError {
    #[error("no tax settings found for user '{user_id}'")]
    Configuration { user_id: String },
    #[error("tax residency '{0}' has no rules module")]
    UnsupportedResidency(String),
    #[error(
        "sell {trade_id} of {requested} {symbol} exceeds open lots ({available} available)"
    )]
    LotIntegrity {
        trade_id: String,
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },
    #[error("trade {trade_id} at {entry_time} is earlier than the preceding trade at {previous}")]
    UnorderedLedger {
        trade_id: String,
        entry_time: DateTime<FixedOffset>,
        previous: DateTime<FixedOffset>,
    },
    #[error("invalid trade {trade_id}: {reason}")]
    InvalidTrade { trade_id: String, reason: String },
    #[error("store error: {0}")]
    Store(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl TaxError {
    pub fn invalid_trade(trade_id: &str, reason: impl Into<String>) -> Self {
        TaxError::InvalidTrade {
            trade_id: trade_id.to_string(),
            reason: reason.into(),
        }
    }
}
