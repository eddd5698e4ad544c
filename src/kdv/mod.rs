//! VAT (KDV) declaration extraction.
//!
//! Page text is fed line by line through a small state machine. The current
//! section decides which [`rules`] can fire; every recognised line becomes one
//! or more `KdvRow`s under a `§ <SECTION>` header row. The raw rows are then
//! key-normalized and rebuilt in the fixed section order ([`postprocess`]).

pub mod postprocess;
pub mod rules;
pub mod sections;

pub use postprocess::{
    consolidate, consolidate_periods, normalize_field_name, normalize_keys, reorder, KdvSummary,
    KdvTable, KdvTableRow,
};
pub use sections::{KdvSection, OutputSlot, TAX_BASE_SUMMARY};

use crate::config::ExtractionConfig;
use crate::error::DeclarationError;
use crate::identity::extract_identity;
use crate::schema::{DocumentKind, KdvDeclaration, KdvRow, NormalizedDocument, ParseOutcome, Payload};
use crate::utils::join_pages;
use log::{debug, info, warn};
use rules::{LineContext, PendingAction, RuleMatch, Transition, KDV_RULES};

struct KdvMachine<'c> {
    config: &'c ExtractionConfig,
    rows: Vec<KdvRow>,
    section: Option<KdvSection>,
    in_tax_base: bool,
    other_header_added: bool,
}

impl<'c> KdvMachine<'c> {
    fn new(config: &'c ExtractionConfig) -> Self {
        Self {
            config,
            rows: Vec::new(),
            section: None,
            in_tax_base: false,
            other_header_added: false,
        }
    }

    /// Adds a header unless the most recent header already carries the title.
    /// "DİĞER İŞLEMLER" is only ever opened once per declaration.
    fn ensure_header(&mut self, title: &str) {
        let other = KdvSection::OtherTransactions.title();
        if title == other {
            if self.other_header_added {
                return;
            }
            self.other_header_added = true;
        }

        let last_header = self.rows.iter().rev().find_map(KdvRow::header_title);
        if last_header != Some(title) {
            self.rows.push(KdvRow::header(title));
        }
    }

    fn apply(&mut self, matched: RuleMatch, index: usize, pending: &mut Vec<(usize, String)>) {
        match matched.transition {
            Some(Transition::Enter(section)) => {
                debug!("VAT section -> {}", section.title());
                self.section = Some(section);
                self.in_tax_base = false;
            }
            Some(Transition::EnterTaxBase) => self.in_tax_base = true,
            None => {}
        }

        if let Some(header) = matched.header {
            self.ensure_header(header);
        }
        self.rows.extend(matched.rows);

        match matched.pending {
            PendingAction::Keep => {}
            PendingAction::Clear => pending.clear(),
            PendingAction::Push(text) => pending.push((index, text)),
        }
    }

    fn process_page(&mut self, page: &str) {
        let lines: Vec<&str> = page.lines().collect();
        let mut pending: Vec<(usize, String)> = Vec::new();
        let lookahead = self.config.kdv_lookahead;
        let mut index = 0;

        while index < lines.len() {
            pending.retain(|(at, _)| index - at <= lookahead);
            let pending_text: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();

            let ctx = LineContext {
                lines: &lines,
                index,
                section: self.section,
                in_tax_base: self.in_tax_base,
                pending: &pending_text,
                config: self.config,
            };

            let matched = KDV_RULES
                .iter()
                .find_map(|(name, rule)| rule(&ctx).map(|m| (*name, m)));

            let mut consumed = 0;
            if let Some((name, matched)) = matched {
                debug!("VAT line {} matched rule {}", index, name);
                consumed = matched.consumed;
                self.apply(matched, index, &mut pending);
            }

            index += 1 + consumed;
        }
    }
}

/// Raw rows in source order, before key normalization and reordering.
pub fn extract_kdv_rows<S: AsRef<str>>(pages: &[S], config: &ExtractionConfig) -> Vec<KdvRow> {
    let mut machine = KdvMachine::new(config);
    for page in pages {
        machine.process_page(page.as_ref());
    }
    machine.rows
}

pub fn parse_kdv(text: &str, config: &ExtractionConfig) -> ParseOutcome {
    parse_kdv_pages(&[text], config)
}

/// Parses a VAT declaration given as per-page text.
pub fn parse_kdv_pages<S: AsRef<str>>(pages: &[S], config: &ExtractionConfig) -> ParseOutcome {
    let kind = Some(DocumentKind::Kdv);
    let full_text = join_pages(pages);
    if full_text.trim().is_empty() {
        return ParseOutcome::failed(kind, DeclarationError::EmptyDocument);
    }

    let identity = extract_identity(&full_text);
    if identity.detected.is_corporate() {
        return ParseOutcome::failed(
            kind,
            DeclarationError::WrongDocumentKind {
                expected: "VAT".to_string(),
                found: "corporate tax".to_string(),
            },
        );
    }

    let raw = extract_kdv_rows(pages, config);
    let rows = reorder(&normalize_keys(&raw));

    let data_rows = rows.iter().filter(|r| !r.is_header()).count();
    let mut warnings = Vec::new();
    if data_rows == 0 {
        warn!("No VAT rows recognised");
        warnings.push("No VAT rows recognised".to_string());
    }

    info!(
        "VAT declaration parsed: {} rows ({} data) for period {}",
        rows.len(),
        data_rows,
        identity.period
    );

    ParseOutcome::from_parts(
        NormalizedDocument::new(
            identity.tax_id,
            identity.taxpayer_name,
            identity.period,
            Payload::Kdv(KdvDeclaration { rows }),
        ),
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECLARATION: &str = "KATMA DEĞER VERGİSİ BEYANNAMESİ\n\
        Vergi Kimlik No 1234567890\n\
        Yıl 2024 Ay Ocak\n\
        TEVKİFAT UYGULANMAYAN İŞLEMLER\n\
        Teslim ve Hizmetler 10.000,00 20 2.000,00\n\
        Matrah Toplamı 10.000,00\n\
        Hesaplanan Katma Değer Vergisi 2.000,00\n\
        Toplam Katma Değer Vergisi 2.000,00\n\
        İNDİRİMLER\n\
        Önceki Dönemden Devreden İndirilecek KDV 300,00\n\
        İndirimler Toplamı 1.500,00\n\
        SONUÇ HESAPLARI\n\
        Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi 500,00\n";

    fn rows(outcome: &ParseOutcome) -> Vec<(String, String)> {
        outcome
            .document()
            .unwrap()
            .kdv()
            .unwrap()
            .rows
            .iter()
            .map(|r| (r.field_name.clone(), r.value.clone()))
            .collect()
    }

    #[test]
    fn test_parse_declaration() {
        let outcome = parse_kdv(DECLARATION, &ExtractionConfig::default());
        let doc = outcome.document().unwrap();
        assert_eq!(doc.tax_id, "1234567890");
        assert_eq!(doc.period, "Ocak / 2024");

        let rows = rows(&outcome);
        let names: Vec<&str> = rows.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "§ TEVKİFAT UYGULANMAYAN İŞLEMLER",
                "Tevkifatsız İşlem (%20) - Matrah",
                "Tevkifatsız İşlem (%20) - Vergi",
                "§ MATRAH TOPLAMI",
                "Matrah Toplamı",
                "Hesaplanan KDV",
                "Toplam KDV",
                "§ İNDİRİMLER",
                "Önceki Dönemden Devreden İndirilecek KDV",
                "İndirimler Toplamı",
                "§ SONUÇ",
                "Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi",
            ]
        );
        assert!(outcome.warnings().is_empty());
    }

    #[test]
    fn test_wrapped_other_transaction() {
        let text = "DİĞER İŞLEMLER\n\
            Alınan Malların İadesi, İndirimlerin\n\
            İptali ve Benzeri İşlemler\n\
            1.000,00 180,00\n";
        let rows = extract_kdv_rows(&[text], &ExtractionConfig::default());
        assert_eq!(
            rows,
            vec![
                KdvRow::header("DİĞER İŞLEMLER"),
                KdvRow::data(
                    "Alınan Malların İadesi, İndirimlerin İptali ve Benzeri İşlemler - Matrah",
                    "1.000,00"
                ),
                KdvRow::data(
                    "Alınan Malların İadesi, İndirimlerin İptali ve Benzeri İşlemler - Vergi",
                    "180,00"
                ),
            ]
        );
    }

    #[test]
    fn test_wrapped_description_with_gap_line() {
        let text = "DİĞER İŞLEMLER\n\
            Alınan Malların İadesi, İndirimlerin\n\
            İptali ve Benzeri İşlemler\n\
            \n\
            1.000,00 180,00\n";
        let rows = extract_kdv_rows(&[text], &ExtractionConfig::default());
        let other = "Alınan Malların İadesi, İndirimlerin İptali ve Benzeri İşlemler";
        assert_eq!(
            rows,
            vec![
                KdvRow::header("DİĞER İŞLEMLER"),
                KdvRow::data(format!("{} - Matrah", other), "1.000,00"),
                KdvRow::data(format!("{} - Vergi", other), "180,00"),
            ]
        );
    }

    #[test]
    fn test_pending_expires_after_lookahead() {
        let text = "DİĞER İŞLEMLER\n\
            Eski açıklama\n\
            satır\n\
            satır\n\
            satır\n\
            satır\n\
            Yeni 10,00 1,80\n";
        let config = ExtractionConfig {
            kdv_lookahead: 1,
            ..ExtractionConfig::default()
        };
        let rows = extract_kdv_rows(&[text], &config);
        assert_eq!(rows[1].field_name, "satır Yeni - Matrah");
    }

    #[test]
    fn test_other_header_added_once() {
        let text = "DİĞER İŞLEMLER\n\
            İşlem Türü Matrah Vergi\n\
            Amortisman 100,00 18,00\n";
        let rows = extract_kdv_rows(&[text], &ExtractionConfig::default());
        assert_eq!(rows.iter().filter(|r| r.is_header()).count(), 1);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_corporate_text_rejected() {
        let outcome = parse_kdv(
            "KURUMLAR VERGİSİ BEYANNAMESİ\nBilanço\nAKTİF",
            &ExtractionConfig::default(),
        );
        assert!(outcome.error().unwrap().contains("corporate tax"));
    }

    #[test]
    fn test_no_rows_is_partial() {
        let outcome = parse_kdv("KATMA DEĞER VERGİSİ BEYANNAMESİ\nboş sayfa", &ExtractionConfig::default());
        assert_eq!(outcome.warnings(), &["No VAT rows recognised".to_string()]);
    }
}
