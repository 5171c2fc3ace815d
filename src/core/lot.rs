use super::error::{Result, TaxError};
use super::residency::{Residency, TaxYear};
use super::trade::{AssetClass, Side, Trade};
use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which open lot a sale is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum AccountingMethod {
    /// First in, first out: oldest lot first
    #[default]
    #[serde(rename = "FIFO", alias = "fifo")]
    Fifo,
    /// Last in, first out: newest lot first
    #[serde(rename = "LIFO", alias = "lifo")]
    Lifo,
}

impl fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountingMethod::Fifo => write!(f, "FIFO"),
            AccountingMethod::Lifo => write!(f, "LIFO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LotStatus {
    Open,
    Closed,
}

/// The part of a single sale matched against one lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LotDisposal {
    /// Sell trade that consumed this slice
    pub trade_id: String,
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub tax_year: TaxYear,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub proceeds: Decimal,
    /// Cost basis released by this slice
    #[schemars(with = "f64")]
    pub cost: Decimal,
    /// Sell fees apportioned to the slice, plus the lot's acquisition fee on its first slice
    #[schemars(with = "f64")]
    pub fees: Decimal,
    #[schemars(with = "f64")]
    pub foreign_tax: Decimal,
}

impl LotDisposal {
    pub fn gain(&self) -> Decimal {
        self.proceeds - self.cost
    }
}

/// A specific acquisition and its disposal history.
///
/// Lots are never removed: a closed lot is the audit trail of the gain or
/// loss realised on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxLot {
    pub id: usize,
    /// Buy trade that opened the lot
    pub trade_id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    /// Remaining open quantity
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub original_quantity: Decimal,
    /// Total cost of the original quantity
    #[schemars(with = "f64")]
    pub cost_basis: Decimal,
    #[schemars(with = "String")]
    pub acquired_at: DateTime<FixedOffset>,
    #[schemars(with = "Option<String>")]
    pub disposed_at: Option<DateTime<FixedOffset>>,
    /// Running total of sale proceeds apportioned to the lot
    #[schemars(with = "f64")]
    pub proceeds: Decimal,
    #[schemars(with = "f64")]
    pub fees_paid: Decimal,
    #[schemars(with = "f64")]
    pub foreign_tax_paid: Decimal,
    pub status: LotStatus,
    /// Tax year the lot was acquired in
    pub tax_year: TaxYear,
    pub disposals: Vec<LotDisposal>,
}

impl TaxLot {
    fn open(id: usize, trade: &Trade, residency: Residency) -> Result<Self> {
        let lot = TaxLot {
            id,
            trade_id: trade.id.clone(),
            symbol: trade.symbol.clone(),
            asset_class: trade.asset_class,
            quantity: trade.quantity,
            original_quantity: trade.quantity,
            cost_basis: trade.gross_value()?,
            acquired_at: trade.entry_time,
            disposed_at: None,
            proceeds: Decimal::ZERO,
            fees_paid: trade.fees,
            foreign_tax_paid: trade.foreign_tax_withheld,
            status: LotStatus::Open,
            tax_year: residency.tax_year(trade.entry_time.date_naive()),
            disposals: Vec::new(),
        };
        log::debug!(
            "Lot {} OPEN {}: qty={}, cost={}",
            lot.id,
            lot.symbol,
            lot.quantity,
            lot.cost_basis
        );
        Ok(lot)
    }

    pub fn is_open(&self) -> bool {
        self.status == LotStatus::Open && self.quantity > Decimal::ZERO
    }

    pub fn disposed_quantity(&self) -> Decimal {
        self.original_quantity - self.quantity
    }

    /// Cost basis released to disposals so far
    pub fn released_cost(&self) -> Decimal {
        self.disposals.iter().map(|d| d.cost).sum()
    }

    /// Gain realised on the disposed part of the lot
    pub fn realized_gain(&self) -> Decimal {
        self.proceeds - self.released_cost()
    }

    /// Cost basis released by disposing of `quantity` units. The slice that
    /// closes the lot takes whatever basis is left.
    fn cost_of(&self, quantity: Decimal, trade_id: &str) -> Result<Decimal> {
        if quantity == self.quantity {
            return Ok(self.cost_basis - self.released_cost());
        }
        apportion(self.cost_basis, quantity, self.original_quantity, trade_id)
    }

    /// Consume `quantity` units for a sale. The caller guarantees
    /// `quantity <= self.quantity`.
    fn consume(&mut self, quantity: Decimal, share: SaleShare<'_>) {
        let cost = share.cost;

        // Acquisition costs are realised with the first slice
        let (fees, foreign_tax) = if self.disposals.is_empty() {
            (
                self.fees_paid + share.fees,
                self.foreign_tax_paid + share.foreign_tax,
            )
        } else {
            (share.fees, share.foreign_tax)
        };

        self.quantity -= quantity;
        self.proceeds += share.proceeds;
        self.fees_paid += share.fees;
        self.foreign_tax_paid += share.foreign_tax;

        if self.quantity.is_zero() {
            self.status = LotStatus::Closed;
            self.disposed_at = Some(share.settled_at);
        }

        log::debug!(
            "Lot {} CONSUME {}: qty={}, proceeds={}, cost={}. Remaining: qty={}",
            self.id,
            self.symbol,
            quantity,
            share.proceeds,
            cost,
            self.quantity
        );

        self.disposals.push(LotDisposal {
            trade_id: share.trade_id.to_string(),
            date: share.settled_at.date_naive(),
            tax_year: share.tax_year,
            quantity,
            proceeds: share.proceeds,
            cost,
            fees,
            foreign_tax,
        });
    }
}

/// `amount * part / whole` to 8 places, failing instead of overflowing
fn apportion(amount: Decimal, part: Decimal, whole: Decimal, trade_id: &str) -> Result<Decimal> {
    amount
        .checked_mul(part)
        .and_then(|v| v.checked_div(whole))
        .map(|v| v.round_dp(8))
        .ok_or_else(|| TaxError::invalid_trade(trade_id, "value out of range"))
}

/// What one lot receives from a sale
struct SaleShare<'a> {
    trade_id: &'a str,
    settled_at: DateTime<FixedOffset>,
    tax_year: TaxYear,
    proceeds: Decimal,
    cost: Decimal,
    fees: Decimal,
    foreign_tax: Decimal,
}

/// Working set of lots for one matching run
#[derive(Debug)]
pub struct LotBook {
    method: AccountingMethod,
    residency: Residency,
    lots: Vec<TaxLot>,
    /// Lot indices per symbol, in acquisition order
    by_symbol: HashMap<String, Vec<usize>>,
    last_entry: Option<DateTime<FixedOffset>>,
}

impl LotBook {
    pub fn new(method: AccountingMethod, residency: Residency) -> Self {
        LotBook {
            method,
            residency,
            lots: Vec::new(),
            by_symbol: HashMap::new(),
            last_entry: None,
        }
    }

    pub fn apply(&mut self, trade: &Trade) -> Result<()> {
        trade.validate()?;
        if let Some(previous) = self.last_entry {
            if trade.entry_time < previous {
                return Err(TaxError::UnorderedLedger {
                    trade_id: trade.id.clone(),
                    entry_time: trade.entry_time,
                    previous,
                });
            }
        }
        self.last_entry = Some(trade.entry_time);

        match trade.side {
            Side::Buy => {
                let id = self.lots.len() + 1;
                self.lots.push(TaxLot::open(id, trade, self.residency)?);
                self.by_symbol
                    .entry(trade.symbol.clone())
                    .or_default()
                    .push(id - 1);
                Ok(())
            }
            Side::Sell => self.sell(trade),
        }
    }

    /// Open quantity for a symbol
    pub fn open_quantity(&self, symbol: &str) -> Decimal {
        self.by_symbol
            .get(symbol)
            .map(|indices| indices.iter().map(|&i| self.lots[i].quantity).sum())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn lots(&self) -> &[TaxLot] {
        &self.lots
    }

    pub fn into_lots(self) -> Vec<TaxLot> {
        self.lots
    }

    fn sell(&mut self, trade: &Trade) -> Result<()> {
        let available = self.open_quantity(&trade.symbol);
        if trade.quantity > available {
            return Err(TaxError::LotIntegrity {
                trade_id: trade.id.clone(),
                symbol: trade.symbol.clone(),
                requested: trade.quantity,
                available,
            });
        }

        let mut order = self
            .by_symbol
            .get(&trade.symbol)
            .cloned()
            .unwrap_or_default();
        if self.method == AccountingMethod::Lifo {
            order.reverse();
        }

        let settled_at = trade.settled_at();
        let tax_year = self.residency.tax_year(settled_at.date_naive());
        let mut remaining = trade.quantity;
        let mut fees_left = trade.fees;
        let mut foreign_tax_left = trade.foreign_tax_withheld;

        // Work out every slice before touching a lot
        let mut slices = Vec::new();
        for index in order {
            if remaining.is_zero() {
                break;
            }
            let lot = &self.lots[index];
            if !lot.is_open() {
                continue;
            }

            let consumed = remaining.min(lot.quantity);
            let last_slice = consumed == remaining;
            // The final slice takes whatever is left so shares sum exactly
            let (fees, foreign_tax) = if last_slice {
                (fees_left, foreign_tax_left)
            } else {
                (
                    apportion(trade.fees, consumed, trade.quantity, &trade.id)?,
                    apportion(trade.foreign_tax_withheld, consumed, trade.quantity, &trade.id)?,
                )
            };
            let proceeds = trade
                .price
                .checked_mul(consumed)
                .ok_or_else(|| TaxError::invalid_trade(&trade.id, "value out of range"))?;

            slices.push((
                index,
                consumed,
                SaleShare {
                    trade_id: &trade.id,
                    settled_at,
                    tax_year,
                    proceeds,
                    cost: lot.cost_of(consumed, &trade.id)?,
                    fees,
                    foreign_tax,
                },
            ));

            remaining -= consumed;
            fees_left -= fees;
            foreign_tax_left -= foreign_tax;
        }

        for (index, consumed, share) in slices {
            self.lots[index].consume(consumed, share);
        }

        Ok(())
    }
}

/// Match sells against open lots, returning every lot opened during the run
/// with its disposal history. Trades must be ordered by entry time.
pub fn match_lots(
    trades: &[Trade],
    method: AccountingMethod,
    residency: Residency,
) -> Result<Vec<TaxLot>> {
    let mut book = LotBook::new(method, residency);
    for trade in trades {
        book.apply(trade)?;
    }
    Ok(book.into_lots())
}
