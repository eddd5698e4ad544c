//! Financial ratio analysis over parsed corporate statements.
//!
//! [`aggregate`] sums chart-of-accounts groups without double counting,
//! [`catalogue`] evaluates and classifies the ratios of one period and
//! [`trend`] comments on how they moved across years.

pub mod aggregate;
pub mod catalogue;
pub mod trend;

pub use aggregate::{aggregate, block_total, group_keyword_code, DerivedFigures};
pub use catalogue::{
    compute_ratios, definition, Classification, RatioCategory, RatioDefinition, RatioReport,
    RatioResult, Thresholds, RATIO_CATALOGUE,
};
pub use trend::{analyze_trends, RatioTrend, TrendLabel, TrendReport};

use crate::schema::{BalanceSheet, IncomeStatement, NormalizedDocument};
use log::warn;

/// The two statements a ratio report is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStatements {
    pub balance_sheet: BalanceSheet,
    pub income_statement: IncomeStatement,
}

impl FinancialStatements {
    pub fn new(balance_sheet: BalanceSheet, income_statement: IncomeStatement) -> Self {
        Self {
            balance_sheet,
            income_statement,
        }
    }

    /// Takes the first balance sheet and the first income statement among
    /// `documents`. A missing statement is left empty, which leaves the
    /// ratios depending on it undefined.
    pub fn from_documents(documents: &[NormalizedDocument]) -> Self {
        let balance_sheet = documents.iter().find_map(NormalizedDocument::balance_sheet);
        let income_statement = documents.iter().find_map(NormalizedDocument::income_statement);

        if balance_sheet.is_none() {
            warn!("No balance sheet among {} documents", documents.len());
        }
        if income_statement.is_none() {
            warn!("No income statement among {} documents", documents.len());
        }

        Self {
            balance_sheet: balance_sheet.cloned().unwrap_or_default(),
            income_statement: income_statement.cloned().unwrap_or_default(),
        }
    }
}
