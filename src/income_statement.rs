//! Income-statement extraction: coded rows with prior, current and
//! inflation-adjusted columns.

use crate::balance_sheet::is_noise_line;
use crate::chart_of_accounts::{AccountResolver, ChartKind, ChartRegistry};
use crate::config::ExtractionConfig;
use crate::error::DeclarationError;
use crate::identity::{extract_identity, DetectedKind};
use crate::numeric::{split_trailing_amounts, PeriodColumns};
use crate::schema::{
    DocumentKind, IncomeStatement, LineItem, NormalizedDocument, ParseOutcome, Payload,
};
use crate::utils::canonical_upper;
use log::{debug, info, warn};
use std::collections::HashSet;

const TITLE: &str = "GELIR TABLOSU";
const TERMINAL_ROW: &str = "DONEM NET KARI VEYA ZARARI";

fn is_title_line(line: &str) -> bool {
    canonical_upper(line).contains(TITLE)
}

fn is_terminal_line(line: &str) -> bool {
    canonical_upper(line).contains(TERMINAL_ROW)
}

/// Single pass over the statement: collection starts at the title line and
/// stops right after the net profit/loss row.
pub fn extract_income_statement(
    text: &str,
    resolver: &AccountResolver<'_>,
    config: &ExtractionConfig,
) -> Option<IncomeStatement> {
    let lines: Vec<&str> = text.lines().collect();
    let title_idx = lines.iter().position(|l| is_title_line(l))?;

    let caption_end = (title_idx + config.inflation_lookahead + 1).min(lines.len());
    let mut has_inflation = lines[title_idx..caption_end]
        .iter()
        .any(|l| l.to_lowercase().contains("enflasyon"));

    let mut rows = Vec::new();
    let mut seen_codes: HashSet<String> = HashSet::new();

    for raw in &lines[title_idx + 1..] {
        let line = raw.trim();
        if line.is_empty() || is_noise_line(line) {
            continue;
        }

        let terminal = is_terminal_line(line);
        let split = split_trailing_amounts(line, 3);
        let has_amounts = split.amounts.iter().any(Option::is_some);
        if !terminal && (!has_amounts || split.description.is_empty()) {
            continue;
        }

        if split.amounts.len() >= 3 {
            has_inflation = true;
        }

        let mut code = resolver.resolve(&split.description, None, None);
        if !code.is_empty() && !seen_codes.insert(code.clone()) {
            debug!("Duplicate income statement code {} for '{}', demoted", code, split.description);
            code.clear();
        }

        let mut columns = PeriodColumns::from_trailing(&split.amounts);
        if ChartKind::IncomeStatement.is_contra(&code) || split.description.contains("(-)") {
            columns = columns.negated();
        }

        rows.push(LineItem::new(code, split.description, columns));

        if terminal {
            break;
        }
    }

    Some(IncomeStatement {
        rows,
        has_inflation_column: has_inflation,
    })
}

pub fn parse_income_statement(text: &str, config: &ExtractionConfig) -> ParseOutcome {
    parse_income_statement_with(text, ChartRegistry::income_statement(), config)
}

pub fn parse_income_statement_with(
    text: &str,
    registry: &ChartRegistry,
    config: &ExtractionConfig,
) -> ParseOutcome {
    let kind = Some(DocumentKind::Gelir);
    if text.trim().is_empty() {
        return ParseOutcome::failed(kind, DeclarationError::EmptyDocument);
    }

    let identity = extract_identity(text);
    if identity.detected == DetectedKind::Vat {
        return ParseOutcome::failed(
            kind,
            DeclarationError::WrongDocumentKind {
                expected: "income statement".to_string(),
                found: "VAT".to_string(),
            },
        );
    }

    let resolver = AccountResolver::for_income_statement(registry, config);
    let mut warnings = Vec::new();
    let statement = match extract_income_statement(text, &resolver, config) {
        Some(statement) => statement,
        None => {
            warn!("GELİR TABLOSU title not found");
            warnings.push("GELİR TABLOSU title not found".to_string());
            IncomeStatement::default()
        }
    };

    info!(
        "Income statement parsed: {} rows (inflation column: {})",
        statement.rows.len(),
        statement.has_inflation_column
    );

    ParseOutcome::from_parts(
        NormalizedDocument::new(
            identity.tax_id,
            identity.taxpayer_name,
            identity.period,
            Payload::Gelir(statement),
        ),
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AccountResolver<'static> {
        AccountResolver::for_income_statement(
            ChartRegistry::income_statement(),
            &ExtractionConfig::default(),
        )
    }

    const STATEMENT: &str = "Başlık satırı 999,00\n\
        GELİR TABLOSU\n\
        Açıklama Önceki Dönem Cari Dönem\n\
        (2022) (2023)\n\
        A. Brüt Satışlar 1.000,00 2.000,00\n\
        600 Yurtiçi Satışlar 1.000,00 2.000,00\n\
        B. Satış İndirimleri (-) 50,00 60,00\n\
        610 Satıştan İadeler 50,00 60,00\n\
        Satılan Ticari Mallar Maliyeti 400,00 500,00\n\
        Genel Yönetim Giderleri 100,00 120,00\n\
        Dönem Net Karı veya Zararı 450,00 1.320,00\n\
        600 Sonradan Gelen Satır 1,00 1,00\n";

    #[test]
    fn test_collects_between_title_and_terminal_row() {
        let statement =
            extract_income_statement(STATEMENT, &resolver(), &ExtractionConfig::default()).unwrap();
        assert_eq!(statement.rows.len(), 7);
        assert!(!statement.has_inflation_column);
        assert_eq!(statement.rows.last().unwrap().description, "Dönem Net Karı veya Zararı");
        assert!(statement.rows.iter().all(|r| r.description != "Başlık satırı"));
    }

    #[test]
    fn test_sign_rules() {
        let statement =
            extract_income_statement(STATEMENT, &resolver(), &ExtractionConfig::default()).unwrap();

        let heading = &statement.rows[2];
        assert_eq!(heading.code, "");
        assert_eq!(heading.current_period, Some(-60.0));

        let returns = &statement.rows[3];
        assert_eq!(returns.code, "610");
        assert_eq!(returns.prior_period, Some(-50.0));

        let cost = statement.rows.iter().find(|r| r.code == "621").unwrap();
        assert_eq!(cost.current_period, Some(-500.0));

        let admin = statement.rows.iter().find(|r| r.code == "632").unwrap();
        assert_eq!(admin.current_period, Some(-120.0));

        let sales = statement.rows.iter().find(|r| r.code == "600").unwrap();
        assert_eq!(sales.current_period, Some(2000.0));
    }

    #[test]
    fn test_inflation_caption_after_title() {
        let text = "GELİR TABLOSU\nAçıklama\nEnflasyon Düzeltmeli\n600 Yurtiçi Satışlar 1,00 2,00\n";
        let statement =
            extract_income_statement(text, &resolver(), &ExtractionConfig::default()).unwrap();
        assert!(statement.has_inflation_column);
        assert_eq!(statement.rows.len(), 1);
    }

    #[test]
    fn test_missing_title_is_partial() {
        let outcome = parse_income_statement("600 Yurtiçi Satışlar 1,00", &ExtractionConfig::default());
        assert_eq!(outcome.warnings().len(), 1);
        assert!(outcome.document().unwrap().income_statement().unwrap().rows.is_empty());
    }

    #[test]
    fn test_vat_text_is_rejected() {
        let outcome = parse_income_statement(
            "KATMA DEĞER VERGİSİ BEYANNAMESİ\nGELİR TABLOSU",
            &ExtractionConfig::default(),
        );
        assert!(outcome.error().is_some());
    }
}
