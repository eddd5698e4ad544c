//! VAT declaration sections and their canonical order.

use crate::utils::canonical_upper;
use serde::{Deserialize, Serialize};

/// The canonical sections of a VAT declaration, in output order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KdvSection {
    NonWithheld,
    PartiallyWithheld,
    OtherTransactions,
    Deductions,
    DeductibleThisPeriod,
    ExportRegistered,
    FullExemption,
    OtherRefundEligible,
    Result,
    OtherInformation,
}

/// Title of the synthetic tax-base summary block ("Matrah Toplamı" and the
/// computed-tax lines that follow it).
pub const TAX_BASE_SUMMARY: &str = "MATRAH TOPLAMI";

/// Misspellings produced by PDF text extraction, mapped to the section they
/// stand for.
const SECTION_ALIASES: &[(&str, KdvSection)] = &[
    ("DİĞER İŞLEMELER", KdvSection::OtherTransactions),
    ("TEVKİFAT UYGULANMAYAN İŞLEMELER", KdvSection::NonWithheld),
    ("İNDİRİMİNLEDRİRİMLER", KdvSection::Deductions),
    ("DİĞER İŞLİENMDLİRERİMLER", KdvSection::OtherTransactions),
    (
        "BU DÖNEME AİT İNDİRİLECEK KDV TUTARININ ORANLARA GÖRE DAĞILIMI",
        KdvSection::DeductibleThisPeriod,
    ),
    ("SONUÇ HESAPLARI", KdvSection::Result),
];

impl KdvSection {
    pub const ALL: [KdvSection; 10] = [
        KdvSection::NonWithheld,
        KdvSection::PartiallyWithheld,
        KdvSection::OtherTransactions,
        KdvSection::Deductions,
        KdvSection::DeductibleThisPeriod,
        KdvSection::ExportRegistered,
        KdvSection::FullExemption,
        KdvSection::OtherRefundEligible,
        KdvSection::Result,
        KdvSection::OtherInformation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            KdvSection::NonWithheld => "TEVKİFAT UYGULANMAYAN İŞLEMLER",
            KdvSection::PartiallyWithheld => "KISMİ TEVKİFAT UYGULANAN İŞLEMLER",
            KdvSection::OtherTransactions => "DİĞER İŞLEMLER",
            KdvSection::Deductions => "İNDİRİMLER",
            KdvSection::DeductibleThisPeriod => "BU DÖNEME AİT İNDİRİLECEK KDV",
            KdvSection::ExportRegistered => "İHRAÇ KAYDIYLA TESLİMLERE AİT BİLDİRİM",
            KdvSection::FullExemption => "TAM İSTİSNA KAPSAMINA GİREN İŞLEMLER",
            KdvSection::OtherRefundEligible => "DİĞER İADE HAKKI DOĞURAN İŞLEMLER",
            KdvSection::Result => "SONUÇ",
            KdvSection::OtherInformation => "DİĞER BİLGİLER",
        }
    }

    /// Sections whose rows are a description followed by one amount.
    pub fn is_label_section(&self) -> bool {
        !matches!(
            self,
            KdvSection::NonWithheld | KdvSection::PartiallyWithheld | KdvSection::OtherTransactions
        )
    }

    /// Exact match of a canonicalised line against the titles and aliases.
    pub fn from_line(line: &str) -> Option<KdvSection> {
        let canonical = canonical_upper(line);
        if canonical.is_empty() {
            return None;
        }

        KdvSection::ALL
            .iter()
            .copied()
            .find(|s| canonical_upper(s.title()) == canonical)
            .or_else(|| {
                SECTION_ALIASES
                    .iter()
                    .find(|(alias, _)| canonical_upper(alias) == canonical)
                    .map(|(_, section)| *section)
            })
    }
}

/// Output slot of a header title during canonical reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputSlot {
    Section(KdvSection),
    TaxBaseSummary,
}

impl OutputSlot {
    /// Fixed output order; the tax-base summary follows the transaction
    /// sections it totals.
    pub const ORDER: [OutputSlot; 11] = [
        OutputSlot::Section(KdvSection::NonWithheld),
        OutputSlot::Section(KdvSection::PartiallyWithheld),
        OutputSlot::Section(KdvSection::OtherTransactions),
        OutputSlot::TaxBaseSummary,
        OutputSlot::Section(KdvSection::Deductions),
        OutputSlot::Section(KdvSection::DeductibleThisPeriod),
        OutputSlot::Section(KdvSection::ExportRegistered),
        OutputSlot::Section(KdvSection::FullExemption),
        OutputSlot::Section(KdvSection::OtherRefundEligible),
        OutputSlot::Section(KdvSection::Result),
        OutputSlot::Section(KdvSection::OtherInformation),
    ];

    pub fn from_title(title: &str) -> Option<OutputSlot> {
        if canonical_upper(title) == canonical_upper(TAX_BASE_SUMMARY) {
            return Some(OutputSlot::TaxBaseSummary);
        }
        KdvSection::from_line(title).map(OutputSlot::Section)
    }

    pub fn position(&self) -> usize {
        OutputSlot::ORDER
            .iter()
            .position(|slot| slot == self)
            .unwrap_or(OutputSlot::ORDER.len())
    }
}
