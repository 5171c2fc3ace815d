pub mod calculator;
pub mod result;
pub mod rules;
pub mod settings;

pub use calculator::{compute, Calculator};
pub use result::TaxCalculationResult;
pub use rules::{apply_rules, RulesInput, RulesOutcome};
pub use settings::{EffectiveOptions, TaxOptions, TaxSettings};
