use crate::core::{AccountingMethod, AggregateOptions, Residency, Result};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Stored per-user accounting preferences. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxSettings {
    /// Residency code, e.g. "UK", "US", "DE"
    pub residency: String,
    #[serde(default)]
    pub method: AccountingMethod,
    #[serde(default = "default_true")]
    pub include_fees: bool,
    #[serde(default = "default_true")]
    pub include_foreign_tax: bool,
    #[serde(default = "default_true")]
    pub offset_losses: bool,
    #[serde(default = "default_true")]
    pub carry_forward: bool,
    /// Losses recorded at onboarding. Calculations take their carryforward
    /// from the prior year's stored result or an explicit override instead.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub previous_year_losses: Decimal,
}

impl TaxSettings {
    pub fn new(residency: &str) -> Self {
        TaxSettings {
            residency: residency.to_string(),
            method: AccountingMethod::Fifo,
            include_fees: true,
            include_foreign_tax: true,
            offset_losses: true,
            carry_forward: true,
            previous_year_losses: Decimal::ZERO,
        }
    }

    /// Merge per-call overrides over the stored settings, field by field.
    pub fn resolve(&self, overrides: &TaxOptions) -> Result<EffectiveOptions> {
        let residency_code = overrides.residency.as_deref().unwrap_or(&self.residency);
        Ok(EffectiveOptions {
            residency: Residency::resolve(residency_code)?,
            method: overrides.method.unwrap_or(self.method),
            include_fees: overrides.include_fees.unwrap_or(self.include_fees),
            include_foreign_tax: overrides
                .include_foreign_tax
                .unwrap_or(self.include_foreign_tax),
            offset_losses: overrides.offset_losses.unwrap_or(self.offset_losses),
            carry_forward: overrides.carry_forward.unwrap_or(self.carry_forward),
            previous_year_losses: overrides.previous_year_losses,
        })
    }
}

/// Per-call overrides; `None` keeps the stored setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxOptions {
    pub residency: Option<String>,
    pub method: Option<AccountingMethod>,
    pub include_fees: Option<bool>,
    pub include_foreign_tax: Option<bool>,
    pub offset_losses: Option<bool>,
    pub carry_forward: Option<bool>,
    /// Explicit carryforward figure; skips the prior-year result lookup
    pub previous_year_losses: Option<Decimal>,
}

/// Settings after overrides, with the residency resolved to its rules module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveOptions {
    pub residency: Residency,
    pub method: AccountingMethod,
    pub include_fees: bool,
    pub include_foreign_tax: bool,
    pub offset_losses: bool,
    pub carry_forward: bool,
    pub previous_year_losses: Option<Decimal>,
}

impl EffectiveOptions {
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            include_fees: self.include_fees,
            include_foreign_tax: self.include_foreign_tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaxError;
    use rust_decimal_macros::dec;

    #[test]
    fn settings_defaults_from_json() {
        let settings: TaxSettings = serde_json::from_str(r#"{"residency": "UK"}"#).unwrap();
        assert_eq!(settings, TaxSettings::new("UK"));
    }

    #[test]
    fn overrides_win_field_by_field() {
        let mut settings = TaxSettings::new("US");
        settings.include_fees = false;
        settings.previous_year_losses = dec!(250);

        let overrides = TaxOptions {
            method: Some(AccountingMethod::Lifo),
            carry_forward: Some(false),
            ..TaxOptions::default()
        };
        let effective = settings.resolve(&overrides).unwrap();

        assert_eq!(effective.residency, Residency::Us);
        assert_eq!(effective.method, AccountingMethod::Lifo);
        assert!(!effective.include_fees);
        assert!(effective.include_foreign_tax);
        assert!(!effective.carry_forward);
        // The stored figure is never used as an override
        assert_eq!(effective.previous_year_losses, None);
    }

    #[test]
    fn residency_override_is_resolved() {
        let overrides = TaxOptions {
            residency: Some("DE".to_string()),
            ..TaxOptions::default()
        };
        let effective = TaxSettings::new("UK").resolve(&overrides).unwrap();
        assert_eq!(effective.residency, Residency::De);
    }

    #[test]
    fn unsupported_residency_is_rejected() {
        assert!(matches!(
            TaxSettings::new("Narnia").resolve(&TaxOptions::default()),
            Err(TaxError::UnsupportedResidency(_))
        ));
    }
}
