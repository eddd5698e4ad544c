//! Balance-sheet (Bilanço) table extraction.
//!
//! A declaration prints the AKTİF block followed by the PASİF block. Each block
//! opens with a header carrying the "Açıklama" column caption and two or three
//! parenthesised years, and closes with a `<BLOCK> TOPLAMI` footer whose values
//! are kept separately as the authoritative block total.

use crate::chart_of_accounts::{is_heading, AccountResolver, ChartKind, ChartRegistry, ParentGroup};
use crate::config::ExtractionConfig;
use crate::error::DeclarationError;
use crate::identity::{extract_identity, DetectedKind};
use crate::numeric::{split_trailing_amounts, PeriodColumns};
use crate::schema::{
    BalanceSheet, BalanceSheetBlock, BalanceSheetTotals, DocumentKind, LineItem,
    NormalizedDocument, ParseOutcome, Payload,
};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

struct BlockPatterns {
    header: Regex,
    end: Regex,
}

impl BlockPatterns {
    fn build(title: &str) -> Self {
        let title = regex::escape(title);
        Self {
            header: Regex::new(&format!(
                r"(?is){}.*?Açıklama.*?(?:\n.*?Cari Dönem)?.*?\(\d{{4}}\).*?\(\d{{4}}\)",
                title
            ))
            .expect("valid block header regex"),
            end: Regex::new(&format!(r"(?i)\n\s*{}\s*TOPLAMI", title))
                .expect("valid block end regex"),
        }
    }
}

static AKTIF_PATTERNS: LazyLock<BlockPatterns> = LazyLock::new(|| BlockPatterns::build("AKTİF"));
static PASIF_PATTERNS: LazyLock<BlockPatterns> = LazyLock::new(|| BlockPatterns::build("PASİF"));
// Some layouts drop the PASİF caption and open the block at "III. KISA VADELİ ...".
static LIABILITIES_NUMERAL_PATTERNS: LazyLock<BlockPatterns> =
    LazyLock::new(|| BlockPatterns::build("III."));

static THIRD_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\n]*?\(\d{4}\)").expect("valid third year regex"));

static NOISE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^TEK DÜZEN.*",
        r"^\s*AKTİF\s*$",
        r"^\s*PASİF\s*$",
        r"^\s*Açıklama.*",
        r"^\s*\(?\d{4}\)?(?:\s*\(?\d{4}\)?)*\s*$",
        r"^\s*Cari Dönem\s*$",
        r"^\s*HESAP KODU.*",
        r"^\s*Enflasyon Düzeltmesi.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid noise regex"))
    .collect()
});

static PASIF_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PASİF\s*(?:\n|$)").expect("valid PASİF split regex"));

static PASIF_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PASİF\s*TOPLAMI|GELİR\s*TABLOSU").expect("valid PASİF end regex")
});

static AKTIF_TOTAL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AKTİF\s*TOPLAMI[^\n]*\n").expect("valid AKTİF total line regex")
});

static TOTAL_RES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)AKTİF\s*TOPLAMI([^\n]*)").expect("valid AKTİF total regex"),
        Regex::new(r"(?i)PASİF\s*TOPLAMI([^\n]*)").expect("valid PASİF total regex"),
    ]
});

pub fn is_noise_line(line: &str) -> bool {
    NOISE_RES.iter().any(|re| re.is_match(line))
}

/// Rows of one block plus whether its header was found at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockExtraction {
    pub rows: Vec<LineItem>,
    pub has_inflation_column: bool,
    pub found: bool,
}

fn patterns_for(block: BalanceSheetBlock) -> &'static BlockPatterns {
    match block {
        BalanceSheetBlock::Aktif => &AKTIF_PATTERNS,
        BalanceSheetBlock::Pasif => &PASIF_PATTERNS,
    }
}

/// Extracts the line items of `block` from `text`.
///
/// A missing header yields an empty, not-found extraction rather than an error.
pub fn extract_block(
    text: &str,
    block: BalanceSheetBlock,
    resolver: &AccountResolver<'_>,
) -> BlockExtraction {
    let extraction = extract_with_patterns(text, block, patterns_for(block), resolver);
    if extraction.found || block != BalanceSheetBlock::Pasif {
        return extraction;
    }
    debug!("PASİF header not found, retrying with the III. group heading");
    extract_with_patterns(text, block, &LIABILITIES_NUMERAL_PATTERNS, resolver)
}

fn extract_with_patterns(
    text: &str,
    block: BalanceSheetBlock,
    patterns: &BlockPatterns,
    resolver: &AccountResolver<'_>,
) -> BlockExtraction {
    let Some(header) = patterns.header.find(text) else {
        return BlockExtraction::default();
    };

    let mut has_inflation = header.as_str().to_lowercase().contains("enflasyon");
    let mut content_start = header.end();
    if let Some(third) = THIRD_YEAR_RE.find(&text[content_start..]) {
        has_inflation = true;
        content_start += third.end();
    }

    let after_header = &text[content_start..];
    let content = match patterns.end.find(after_header) {
        Some(end) => &after_header[..end.start()],
        None => after_header,
    };

    let mut rows = Vec::new();
    let mut seen_codes: HashSet<String> = HashSet::new();
    let mut parent = ParentGroup::default();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_noise_line(line) {
            debug!("Skipping noise line '{}'", line);
            continue;
        }

        let split = split_trailing_amounts(line, 3);
        if is_heading(&split.description) {
            if let Some(hint) = resolver.registry().group_hint(&split.description) {
                parent.apply(hint);
            }
        }
        if split.description.is_empty() || split.amounts.iter().all(Option::is_none) {
            continue;
        }

        if split.amounts.len() >= 3 {
            has_inflation = true;
        }

        let mut code = resolver.resolve(&split.description, Some(block), Some(&parent));
        if !code.is_empty() && !seen_codes.insert(code.clone()) {
            debug!("Duplicate code {} in {} for '{}', demoted", code, block.title(), split.description);
            code.clear();
        }

        let mut columns = PeriodColumns::from_trailing(&split.amounts);
        if ChartKind::BalanceSheet.is_contra(&code) || split.description.contains("(-)") {
            columns = columns.negated();
        }

        rows.push(LineItem::new(code, split.description, columns));
    }

    BlockExtraction {
        rows,
        has_inflation_column: has_inflation,
        found: true,
    }
}

/// Values on the literal `<BLOCK> TOPLAMI` line, if the line carries any.
pub fn parse_block_total(text: &str, block: BalanceSheetBlock) -> Option<PeriodColumns> {
    let re = match block {
        BalanceSheetBlock::Aktif => &TOTAL_RES[0],
        BalanceSheetBlock::Pasif => &TOTAL_RES[1],
    };

    let caps = re.captures(text)?;
    let split = split_trailing_amounts(&caps[1], 3);
    let amounts: Vec<Option<f64>> = split.amounts.into_iter().filter(Option::is_some).collect();
    if amounts.is_empty() {
        return None;
    }
    Some(PeriodColumns::from_trailing(&amounts))
}

/// Splits a whole declaration into the AKTİF text and the PASİF text.
pub fn split_document(text: &str) -> (String, String) {
    if text.contains("PASİF") && text.contains("AKTİF") {
        if let Some(split) = PASIF_SPLIT_RE.find(text) {
            let aktif = &text[..split.start()];
            let rest = &text[split.end()..];
            let pasif = match PASIF_END_RE.find(rest) {
                Some(end) => &rest[..end.start()],
                None => rest,
            };
            return (aktif.to_string(), with_pasif_caption(pasif));
        }
    }

    match AKTIF_TOTAL_LINE_RE.find(text) {
        Some(total) => (
            text[..total.start()].to_string(),
            with_pasif_caption(&text[total.end()..]),
        ),
        None => (text.to_string(), String::new()),
    }
}

fn with_pasif_caption(pasif: &str) -> String {
    if pasif.trim().is_empty() || pasif.to_uppercase().contains("PASİF") {
        pasif.to_string()
    } else {
        format!("PASİF\n{}", pasif)
    }
}

pub fn parse_balance_sheet(text: &str, config: &ExtractionConfig) -> ParseOutcome {
    parse_balance_sheet_with(text, ChartRegistry::balance_sheet(), config)
}

pub fn parse_balance_sheet_with(
    text: &str,
    registry: &ChartRegistry,
    config: &ExtractionConfig,
) -> ParseOutcome {
    let kind = Some(DocumentKind::Bilanco);
    if text.trim().is_empty() {
        return ParseOutcome::failed(kind, DeclarationError::EmptyDocument);
    }

    let identity = extract_identity(text);
    if identity.detected == DetectedKind::Vat {
        return ParseOutcome::failed(
            kind,
            DeclarationError::WrongDocumentKind {
                expected: "balance sheet".to_string(),
                found: "VAT".to_string(),
            },
        );
    }

    let resolver = AccountResolver::for_balance_sheet(registry, config);
    let (aktif_text, pasif_text) = split_document(text);
    let aktif = extract_block(&aktif_text, BalanceSheetBlock::Aktif, &resolver);
    let pasif = extract_block(&pasif_text, BalanceSheetBlock::Pasif, &resolver);

    let totals = BalanceSheetTotals {
        aktif: parse_block_total(text, BalanceSheetBlock::Aktif),
        pasif: parse_block_total(text, BalanceSheetBlock::Pasif),
    };

    let has_inflation_column = aktif.has_inflation_column
        || pasif.has_inflation_column
        || [totals.aktif, totals.pasif]
            .iter()
            .flatten()
            .any(|t| t.inflation_adjusted.is_some_and(|v| v != 0.0));

    let mut warnings = Vec::new();
    for (block, extraction) in [(BalanceSheetBlock::Aktif, &aktif), (BalanceSheetBlock::Pasif, &pasif)] {
        if !extraction.found {
            warn!("{} block header not found", block.title());
            warnings.push(format!("{} block not found", block.title()));
        }
    }

    info!(
        "Balance sheet parsed: {} AKTİF rows, {} PASİF rows (inflation column: {})",
        aktif.rows.len(),
        pasif.rows.len(),
        has_inflation_column
    );

    let payload = Payload::Bilanco(BalanceSheet {
        aktif: aktif.rows,
        pasif: pasif.rows,
        totals,
        has_inflation_column,
    });

    ParseOutcome::from_parts(
        NormalizedDocument::new(identity.tax_id, identity.taxpayer_name, identity.period, payload),
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AccountResolver<'static> {
        AccountResolver::for_balance_sheet(ChartRegistry::balance_sheet(), &ExtractionConfig::default())
    }

    const AKTIF_BLOCK: &str = "AKTİF\n\
        Açıklama Önceki Dönem Cari Dönem\n\
        (2022) (2023)\n\
        100 Kasa 40,00 80,00\n\
        102 Bankalar 50,00 100,00\n\
        153 Ticari Mallar 10,00 20,00\n\
        AKTİF TOPLAMI 100,00 200,00\n";

    #[test]
    fn test_block_rows_and_totals() {
        let extraction = extract_block(AKTIF_BLOCK, BalanceSheetBlock::Aktif, &resolver());
        assert!(extraction.found);
        assert_eq!(extraction.rows.len(), 3);
        assert!(!extraction.has_inflation_column);
        assert_eq!(extraction.rows[1].code, "102");
        assert_eq!(extraction.rows[1].prior_period, Some(50.0));
        assert_eq!(extraction.rows[1].current_period, Some(100.0));

        let total = parse_block_total(AKTIF_BLOCK, BalanceSheetBlock::Aktif).unwrap();
        assert_eq!(total.prior, Some(100.0));
        assert_eq!(total.current, Some(200.0));
        assert_eq!(total.inflation_adjusted, None);
    }

    #[test]
    fn test_missing_header_is_not_a_failure() {
        let extraction = extract_block("no table here", BalanceSheetBlock::Aktif, &resolver());
        assert!(!extraction.found);
        assert!(extraction.rows.is_empty());
        assert!(!extraction.has_inflation_column);
    }

    #[test]
    fn test_third_year_sets_inflation_column() {
        let text = "AKTİF\nAçıklama\n(2022) (2023) (2023)\n100 Kasa 1,00 2,00 3,00\n";
        let extraction = extract_block(text, BalanceSheetBlock::Aktif, &resolver());
        assert!(extraction.has_inflation_column);
        assert_eq!(extraction.rows.len(), 1);
        assert_eq!(extraction.rows[0].current_period_inflation_adjusted, Some(3.0));
    }

    #[test]
    fn test_contra_accounts_are_negative() {
        let text = "AKTİF\nAçıklama (2022) (2023)\n257 Birikmiş Amortismanlar 5,00 7,00\n";
        let extraction = extract_block(text, BalanceSheetBlock::Aktif, &resolver());
        assert_eq!(extraction.rows[0].current_period, Some(-7.0));
        assert_eq!(extraction.rows[0].prior_period, Some(-5.0));
    }

    #[test]
    fn test_duplicate_codes_are_demoted() {
        let text = "AKTİF\nAçıklama (2022) (2023)\n100 Kasa 1,00 2,00\n100 Kasa 3,00 4,00\n";
        let extraction = extract_block(text, BalanceSheetBlock::Aktif, &resolver());
        assert_eq!(extraction.rows.len(), 2);
        assert_eq!(extraction.rows[0].code, "100");
        assert_eq!(extraction.rows[1].code, "");
        assert_eq!(extraction.rows[1].current_period, Some(4.0));
    }

    #[test]
    fn test_noise_lines() {
        assert!(is_noise_line("TEK DÜZEN HESAP PLANI"));
        assert!(is_noise_line("(2022) (2023)"));
        assert!(is_noise_line("HESAP KODU AÇIKLAMA"));
        assert!(!is_noise_line("100 Kasa 1,00"));
    }

    #[test]
    fn test_split_document_at_pasif_heading() {
        let text = "AKTİF\nAçıklama (2022) (2023)\n100 Kasa 1,00 2,00\nAKTİF TOPLAMI 1,00 2,00\n\
                    PASİF\nAçıklama (2022) (2023)\n500 Sermaye 1,00 2,00\nPASİF TOPLAMI 1,00 2,00\n";
        let (aktif, pasif) = split_document(text);
        assert!(aktif.contains("100 Kasa"));
        assert!(!aktif.contains("500 Sermaye"));
        assert!(pasif.starts_with("PASİF\n"));
        assert!(pasif.contains("500 Sermaye"));
        assert!(!pasif.contains("PASİF TOPLAMI"));
    }

    #[test]
    fn test_parse_balance_sheet_outcome() {
        let text = "KURUMLAR VERGİSİ BEYANNAMESİ Bilanço\n\
                    Vergi Kimlik Numarası 1234567890\n\
                    DÖNEM: 2023\n\
                    AKTİF\nAçıklama (2022) (2023)\n100 Kasa 1,00 2,00\nAKTİF TOPLAMI 1,00 2,00\n\
                    PASİF\nAçıklama (2022) (2023)\n500 Sermaye 1,00 2,00\nPASİF TOPLAMI 1,00 2,00\n";
        let outcome = parse_balance_sheet(text, &ExtractionConfig::default());
        let document = outcome.document().unwrap();
        assert!(outcome.warnings().is_empty());
        assert_eq!(document.tax_id, "1234567890");
        assert_eq!(document.period, "2023");
        let sheet = document.balance_sheet().unwrap();
        assert_eq!(sheet.aktif.len(), 1);
        assert_eq!(sheet.pasif.len(), 1);
        assert_eq!(sheet.pasif[0].code, "500");
        assert_eq!(sheet.totals.pasif.unwrap().current, Some(2.0));
    }

    #[test]
    fn test_missing_pasif_is_partial() {
        let outcome = parse_balance_sheet(AKTIF_BLOCK, &ExtractionConfig::default());
        assert!(matches!(outcome, ParseOutcome::PartialOk { .. }));
        assert_eq!(outcome.warnings(), &["PASİF block not found".to_string()]);
    }
}
