//! # Beyanname Analiz
//!
//! Turns Turkish tax declarations into coded, machine-readable records and
//! derives financial ratios from them.
//!
//! ## Core Concepts
//!
//! - **KDV**: monthly VAT declarations, flattened into an ordered list of
//!   section headers and `field → amount` rows
//! - **Bilanço / Gelir Tablosu**: the balance sheet and income statement
//!   attached to the corporate-tax declaration, parsed into line items
//!   carrying a uniform chart-of-accounts code
//! - **Contra accounts**: deductive accounts are stored negative so that group
//!   totals are plain sums
//! - **Ratios**: 23 ratios in five categories, classified against
//!   safe/adequate thresholds and followed across years
//!
//! Input is per-page text from a PDF extractor or the XML filed with the tax
//! office. Every parse call returns a [`ParseOutcome`]; identity fields that
//! could not be read carry the [`UNKNOWN`] sentinel and such records are
//! reported as rejected.
//!
//! ## Example
//!
//! ```rust,ignore
//! use beyanname_analiz::*;
//! use std::collections::BTreeMap;
//!
//! let config = ExtractionConfig::default();
//! let bilanco = parse_balance_sheet(&bilanco_text, &config).into_document().unwrap();
//! let gelir = parse_income_statement(&gelir_text, &config).into_document().unwrap();
//!
//! let statements = FinancialStatements::from_documents(&[bilanco, gelir]);
//! let years = BTreeMap::from([(2023, statements)]);
//! let analysis = analyze_years(&years, &MarketInputs::default(), &RatioCategory::ALL);
//! println!("{}", analysis.trends.overall_summary);
//! ```

pub mod balance_sheet;
pub mod batch;
pub mod chart_of_accounts;
pub mod config;
pub mod error;
pub mod identity;
pub mod income_statement;
pub mod kdv;
pub mod numeric;
pub mod ratios;
pub mod schema;
pub mod utils;
pub mod xml;

pub use balance_sheet::{parse_balance_sheet, parse_balance_sheet_with};
pub use batch::{parse_batch, parse_document, BatchEntry, BatchInput, Disposition};
pub use chart_of_accounts::{AccountResolver, ChartEntry, ChartKind, ChartRegistry};
pub use config::{ExtractionConfig, MarketInputs};
pub use error::{DeclarationError, Result};
pub use identity::{extract_identity, DetectedKind, TaxpayerIdentity};
pub use income_statement::{parse_income_statement, parse_income_statement_with};
pub use kdv::{consolidate_periods, parse_kdv, parse_kdv_pages, KdvSection, KdvSummary, KdvTable};
pub use numeric::{format_amount, parse_amount, parse_xml_amount, PeriodColumns};
pub use ratios::{
    aggregate, analyze_trends, compute_ratios, Classification, DerivedFigures,
    FinancialStatements, RatioCategory, RatioReport, RatioResult, RatioTrend, TrendLabel,
    TrendReport,
};
pub use schema::*;
pub use xml::{parse_corporate_xml, parse_vat_xml, parse_xml, CorporateStatements, XmlDeclaration};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-year ratio reports and the trend commentary built on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatioAnalysis {
    pub reports: BTreeMap<i32, RatioReport>,
    pub trends: TrendReport,
}

/// Computes the selected ratio categories for every year, reading the
/// current-period column of each year's statements, then analyses the trends.
pub fn analyze_years(
    statements: &BTreeMap<i32, FinancialStatements>,
    market: &MarketInputs,
    categories: &[RatioCategory],
) -> RatioAnalysis {
    info!(
        "Analysing {} years over {} ratio categories",
        statements.len(),
        categories.len()
    );

    let reports: BTreeMap<i32, RatioReport> = statements
        .iter()
        .map(|(year, s)| (*year, compute_ratios(s, ReportingPeriod::Current, market, categories)))
        .collect();
    let trends = analyze_trends(&reports);

    RatioAnalysis { reports, trends }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(current_assets: f64, short_term: f64) -> FinancialStatements {
        let item = |code: &str, value: f64| {
            LineItem::new(
                code,
                "kalem",
                PeriodColumns {
                    current: Some(value),
                    ..PeriodColumns::default()
                },
            )
        };
        FinancialStatements::new(
            BalanceSheet {
                aktif: vec![item("100", current_assets)],
                pasif: vec![item("320", short_term), item("500", current_assets - short_term)],
                ..BalanceSheet::default()
            },
            IncomeStatement::default(),
        )
    }

    #[test]
    fn test_analyze_years() {
        let years = BTreeMap::from([(2022, statements(300.0, 200.0)), (2023, statements(400.0, 200.0))]);
        let analysis = analyze_years(&years, &MarketInputs::default(), &[RatioCategory::Liquidity]);

        assert_eq!(analysis.reports.len(), 2);
        assert_eq!(analysis.reports[&2022].value("Cari Oran"), Some(1.5));
        assert_eq!(analysis.reports[&2023].value("Cari Oran"), Some(2.0));

        let current = analysis.trends.get("Cari Oran").unwrap();
        assert_eq!(current.trend_label, TrendLabel::StrongRise);
        assert_eq!(current.classification, Classification::Safe);
        assert_eq!(current.mean, 1.75);
    }
}
