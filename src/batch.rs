//! Kind detection and parallel processing of many uploaded declarations.

use crate::balance_sheet::parse_balance_sheet;
use crate::config::ExtractionConfig;
use crate::error::DeclarationError;
use crate::income_statement::parse_income_statement;
use crate::kdv::parse_kdv_pages;
use crate::schema::{DocumentKind, NormalizedDocument, ParseOutcome, Payload};
use crate::utils::{canonical_upper, join_pages};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn has_statement_rows(outcome: &ParseOutcome) -> bool {
    outcome
        .document()
        .is_some_and(|doc| !doc.payload.is_empty())
}

fn is_balance_sheet_candidate(outcome: &ParseOutcome) -> bool {
    matches!(
        outcome.document().map(|d| &d.payload),
        Some(Payload::Bilanco(sheet)) if !sheet.aktif.is_empty() || !sheet.pasif.is_empty()
    )
}

/// Detects the declaration kind of per-page PDF text and parses it.
///
/// A corporate declaration is tried as a balance sheet first and falls back
/// to the income statement; a VAT title goes straight to the KDV extractor.
/// Without any title the extractors are tried in turn: income statement,
/// balance sheet, KDV.
pub fn parse_document<S: AsRef<str>>(pages: &[S], config: &ExtractionConfig) -> ParseOutcome {
    let text = join_pages(pages);
    if text.trim().is_empty() {
        return ParseOutcome::failed(None, DeclarationError::EmptyDocument);
    }
    let upper = canonical_upper(&text);

    if upper.contains("BILANCO") || upper.contains("GELIR TABLOSU") {
        let balance = parse_balance_sheet(&text, config);
        if is_balance_sheet_candidate(&balance) {
            debug!("Dispatched as balance sheet");
            return balance;
        }
        debug!("No balance-sheet rows, trying the income statement");
        return parse_income_statement(&text, config);
    }

    if upper.contains("KATMA DEGER VERGISI") {
        debug!("Dispatched as VAT declaration");
        return parse_kdv_pages(pages, config);
    }

    let attempts = [
        parse_income_statement(&text, config),
        parse_balance_sheet(&text, config),
        parse_kdv_pages(pages, config),
    ];
    match attempts.into_iter().find(has_statement_rows) {
        Some(outcome) => outcome,
        None => {
            warn!("Declaration kind could not be determined");
            ParseOutcome::failed(None, DeclarationError::UnknownDocumentKind)
        }
    }
}

/// A named upload: file name plus per-page text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchInput {
    pub name: String,
    pub pages: Vec<String>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    Parsed {
        kind: DocumentKind,
        warnings: Vec<String>,
    },
    /// Parsed, but the taxpayer or the period could not be identified.
    Rejected { kind: DocumentKind, reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub name: String,
    pub disposition: Disposition,
    pub document: Option<NormalizedDocument>,
}

impl BatchEntry {
    fn from_outcome(name: String, outcome: ParseOutcome) -> Self {
        let warnings = outcome.warnings().to_vec();
        if let Some(error) = outcome.error() {
            return Self {
                name,
                disposition: Disposition::Failed {
                    error: error.to_string(),
                },
                document: None,
            };
        }

        match outcome.into_document() {
            Some(document) if document.is_rejected() => Self {
                name,
                disposition: Disposition::Rejected {
                    kind: document.kind,
                    reason: "tax id or period could not be identified".to_string(),
                },
                document: None,
            },
            Some(document) => Self {
                name,
                disposition: Disposition::Parsed {
                    kind: document.kind,
                    warnings,
                },
                document: Some(document),
            },
            None => Self {
                name,
                disposition: Disposition::Failed {
                    error: DeclarationError::UnknownDocumentKind.to_string(),
                },
                document: None,
            },
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.disposition, Disposition::Parsed { .. })
    }
}

/// Parses every input in parallel. Entries keep the input order.
pub fn parse_batch(inputs: &[BatchInput], config: &ExtractionConfig) -> Vec<BatchEntry> {
    let entries: Vec<BatchEntry> = inputs
        .par_iter()
        .map(|input| {
            let outcome = parse_document(&input.pages, config);
            BatchEntry::from_outcome(input.name.clone(), outcome)
        })
        .collect();

    let parsed = entries.iter().filter(|e| e.is_parsed()).count();
    info!("Batch finished: {} of {} documents parsed", parsed, entries.len());
    for entry in entries.iter().filter(|e| !e.is_parsed()) {
        warn!("{}: {:?}", entry.name, entry.disposition);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const BALANCE_SHEET: &str = "KURUMLAR VERGİSİ BEYANNAMESİ\n\
        Vergi Kimlik No 1234567890\n\
        DÖNEM: 2023\n\
        Bilanço\n\
        AKTİF\n\
        Açıklama Önceki Dönem Cari Dönem\n\
        (2022) (2023)\n\
        100 Kasa 40,00 80,00\n\
        AKTİF TOPLAMI 40,00 80,00\n\
        PASİF\n\
        Açıklama Önceki Dönem Cari Dönem\n\
        (2022) (2023)\n\
        500 Sermaye 40,00 80,00\n\
        PASİF TOPLAMI 40,00 80,00\n";

    const VAT: &str = "KATMA DEĞER VERGİSİ BEYANNAMESİ\n\
        Vergi Kimlik No 1234567890\n\
        Yıl 2024 Ay Şubat\n\
        TEVKİFAT UYGULANMAYAN İŞLEMLER\n\
        Teslim ve Hizmetler 1.000,00 20 200,00\n";

    #[test]
    fn test_dispatch_by_title() {
        let config = ExtractionConfig::default();
        let sheet = parse_document(&[BALANCE_SHEET], &config);
        assert_eq!(sheet.document().unwrap().kind, DocumentKind::Bilanco);

        let vat = parse_document(&[VAT], &config);
        assert_eq!(vat.document().unwrap().kind, DocumentKind::Kdv);
    }

    #[test]
    fn test_unrecognised_text_fails() {
        let outcome = parse_document(&["alışveriş listesi\nelma armut"], &ExtractionConfig::default());
        assert!(outcome.error().is_some());
        assert!(parse_document::<&str>(&[], &ExtractionConfig::default()).error().is_some());
    }

    #[test]
    fn test_batch_dispositions() {
        let inputs = vec![
            BatchInput::new("bilanco.pdf", vec![BALANCE_SHEET.to_string()]),
            BatchInput::new("kdv.pdf", vec![VAT.to_string()]),
            BatchInput::new(
                "kimliksiz.pdf",
                vec![VAT.replace("Vergi Kimlik No 1234567890\n", "")],
            ),
            BatchInput::new("bos.pdf", vec![String::new()]),
        ];
        let entries = parse_batch(&inputs, &ExtractionConfig::default());

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bilanco.pdf", "kdv.pdf", "kimliksiz.pdf", "bos.pdf"]);
        assert!(entries[0].is_parsed());
        assert!(entries[1].is_parsed());
        assert!(matches!(
            entries[2].disposition,
            Disposition::Rejected { kind: DocumentKind::Kdv, .. }
        ));
        assert!(entries[2].document.is_none());
        assert!(matches!(entries[3].disposition, Disposition::Failed { .. }));
    }
}
