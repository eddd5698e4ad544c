use crate::error::{DeclarationError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tunables shared by the text extractors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ExtractionConfig {
    #[schemars(description = "Minimum similarity (exclusive) for a fuzzy balance-sheet match")]
    pub balance_sheet_cutoff: f64,

    #[schemars(description = "Minimum similarity (exclusive) for a fuzzy income-statement match")]
    pub income_statement_cutoff: f64,

    #[schemars(description = "Registry candidates whose normalized length differs by more than this are not scored")]
    pub length_window: usize,

    #[schemars(description = "Lines a wrapped KDV description may span before the amounts line")]
    pub kdv_lookahead: usize,

    #[schemars(description = "Window scanned for partially-withheld quadruples split across lines")]
    pub kdv_quadruple_window: usize,

    #[schemars(description = "Lines after the income-statement title searched for an inflation caption")]
    pub inflation_lookahead: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            balance_sheet_cutoff: 0.65,
            income_statement_cutoff: 0.75,
            length_window: 30,
            kdv_lookahead: 4,
            kdv_quadruple_window: 5,
            inflation_lookahead: 5,
        }
    }
}

impl ExtractionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("balance_sheet_cutoff", self.balance_sheet_cutoff),
            ("income_statement_cutoff", self.income_statement_cutoff),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(DeclarationError::InvalidConfig {
                    field,
                    details: format!("must be in [0, 1), got {}", value),
                });
            }
        }

        if self.kdv_lookahead == 0 {
            return Err(DeclarationError::InvalidConfig {
                field: "kdv_lookahead",
                details: "must be at least 1".to_string(),
            });
        }

        if self.kdv_quadruple_window < 2 {
            return Err(DeclarationError::InvalidConfig {
                field: "kdv_quadruple_window",
                details: format!("must be at least 2, got {}", self.kdv_quadruple_window),
            });
        }

        Ok(())
    }
}

/// Market data for the per-share ratios. Both values are optional; the market
/// category reports `undefined` without them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct MarketInputs {
    pub share_price: Option<f64>,
    pub share_count: Option<f64>,
}

impl MarketInputs {
    pub fn new(share_price: f64, share_count: f64) -> Self {
        Self {
            share_price: Some(share_price),
            share_count: Some(share_count),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(count) = self.share_count {
            if count < 0.0 || !count.is_finite() {
                return Err(DeclarationError::InvalidConfig {
                    field: "share_count",
                    details: format!("must be a non-negative number, got {}", count),
                });
            }
        }
        if let Some(price) = self.share_price {
            if price < 0.0 || !price.is_finite() {
                return Err(DeclarationError::InvalidConfig {
                    field: "share_price",
                    details: format!("must be a non-negative number, got {}", price),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExtractionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.length_window, 30);
        assert_eq!(config.kdv_lookahead, 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ExtractionConfig::from_json(r#"{"balance_sheet_cutoff": 0.7}"#).unwrap();
        assert_eq!(config.balance_sheet_cutoff, 0.7);
        assert_eq!(config.income_statement_cutoff, 0.75);
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let err = ExtractionConfig::from_json(r#"{"income_statement_cutoff": 1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            DeclarationError::InvalidConfig { field: "income_statement_cutoff", .. }
        ));
    }

    #[test]
    fn test_market_inputs_validation() {
        assert!(MarketInputs::new(12.5, 1000.0).validate().is_ok());
        assert!(MarketInputs {
            share_price: Some(-1.0),
            share_count: None
        }
        .validate()
        .is_err());
    }
}
