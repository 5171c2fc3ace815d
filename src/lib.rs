//! Tax lot accounting: FIFO/LIFO lot matching over a trade ledger, yearly
//! gain and loss aggregation, and per-residency loss offset, carryforward and
//! rate rules.

pub mod core;
pub mod store;
pub mod tax;
