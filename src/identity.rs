//! Taxpayer identity and declaration-kind detection shared by the text
//! extractors.

use crate::schema::{DocumentKind, UNKNOWN};
use crate::utils::month_number;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Declaration family as far as it can be told from the cover page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectedKind {
    BalanceSheet,
    IncomeStatement,
    /// A corporate-tax declaration with neither statement caption.
    CorporateTax,
    Vat,
    Unknown,
}

impl DetectedKind {
    pub fn document_kind(&self) -> Option<DocumentKind> {
        match self {
            DetectedKind::BalanceSheet => Some(DocumentKind::Bilanco),
            DetectedKind::IncomeStatement => Some(DocumentKind::Gelir),
            DetectedKind::Vat => Some(DocumentKind::Kdv),
            DetectedKind::CorporateTax | DetectedKind::Unknown => None,
        }
    }

    pub fn is_corporate(&self) -> bool {
        matches!(
            self,
            DetectedKind::BalanceSheet | DetectedKind::IncomeStatement | DetectedKind::CorporateTax
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxpayerIdentity {
    pub tax_id: String,
    pub taxpayer_name: String,
    pub period: String,
    pub detected: DetectedKind,
}

impl TaxpayerIdentity {
    pub fn is_complete(&self) -> bool {
        self.tax_id != UNKNOWN && self.period != UNKNOWN
    }
}

pub const CORPORATE_TAX_TITLE: &str = "KURUMLAR VERGİSİ BEYANNAMESİ";
pub const VAT_TITLE: &str = "KATMA DEĞER VERGİSİ BEYANNAMESİ";

static VKN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Vergi Kimlik (?:No|Numarası)(?:\s*\(TC Kimlik No\))?\s+(\d{10,11})")
        .expect("valid VKN regex")
});

static VKN_FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Kimlik\s+Numarası\s+(\d{10,11})").expect("valid VKN fallback regex")
});

static NAME_CAPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Soyadı,? Adı \(Unvanı\)|Soyadı \(Unvanı\)").expect("valid name caption regex")
});

static NAME_SAME_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Unvanı\)\s+(.+)$").expect("valid same-line name regex")
});

static CAPTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)devamı|kimlik|vergi dairesi|ticaret sicil|e-posta|telefon|\(")
        .expect("valid caption regex")
});

const MONTH_WORD: &str = r"([A-Za-zÇÖŞİÜĞçöşıüğ]+)";

static VAT_YEAR_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)Yıl\s+(\d{{4}}).*?Ay\s+{}", MONTH_WORD))
        .expect("valid year-month regex")
});

static VAT_MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)Ay\s+{}.*?Yıl\s+(\d{{4}})", MONTH_WORD))
        .expect("valid month-year regex")
});

static CURRENT_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Cari Dönem\s*\n\s*\((\d{4})\)").expect("valid current period regex")
});

static PERIOD_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)DÖNEM TİPİ.*?Yıl\s+(\d{4})").expect("valid period type regex")
});

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DÖNEM[:\s]+(\d{4})").expect("valid period regex"));

pub fn detect_kind(text: &str) -> DetectedKind {
    let upper = text.to_uppercase();
    if upper.contains(CORPORATE_TAX_TITLE) {
        if text.contains("Bilanço") || text.contains("BİLANÇO") {
            DetectedKind::BalanceSheet
        } else if text.contains("GELİR TABLOSU") {
            DetectedKind::IncomeStatement
        } else {
            DetectedKind::CorporateTax
        }
    } else if upper.contains(VAT_TITLE) {
        DetectedKind::Vat
    } else {
        DetectedKind::Unknown
    }
}

pub fn extract_tax_id(text: &str) -> Option<String> {
    VKN_RE
        .captures(text)
        .or_else(|| VKN_FALLBACK_RE.captures(text))
        .map(|caps| caps[1].to_string())
}

/// Reads the name printed beside or below the "Soyadı, Adı (Unvanı)" caption,
/// joining a continuation line when the title wraps.
pub fn extract_taxpayer_name(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if !NAME_CAPTION_RE.is_match(line) {
            continue;
        }

        if let Some(caps) = NAME_SAME_LINE_RE.captures(line) {
            let candidate = caps[1].trim();
            if candidate.chars().count() > 3 {
                return Some(candidate.to_uppercase());
            }
        }

        let Some(next) = lines.get(idx + 1).map(|l| l.trim()) else {
            continue;
        };
        if next.chars().count() <= 3 {
            continue;
        }

        let mut name = next.to_uppercase();
        let continuation = match lines.get(idx + 2).map(|l| l.trim()) {
            Some(caption) if caption.to_lowercase().contains("devamı") => {
                lines.get(idx + 3).map(|l| l.trim())
            }
            Some(other) if !CAPTION_LINE_RE.is_match(other) => Some(other),
            _ => None,
        };
        if let Some(rest) = continuation.filter(|r| !r.is_empty() && !CAPTION_LINE_RE.is_match(r)) {
            name.push(' ');
            name.push_str(&rest.to_uppercase());
        }
        return Some(name);
    }

    None
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let head: String = if first == 'i' {
                "İ".to_string()
            } else {
                first.to_uppercase().collect()
            };
            let tail: String = chars
                .flat_map(|c| match c {
                    'I' => vec!['ı'],
                    'İ' => vec!['i'],
                    other => other.to_lowercase().collect(),
                })
                .collect();
            head + &tail
        }
        None => String::new(),
    }
}

/// VAT declarations report "<Month> / YYYY".
pub fn extract_vat_period(text: &str) -> Option<String> {
    let candidates = [
        VAT_YEAR_MONTH_RE
            .captures(text)
            .map(|c| (c[2].to_string(), c[1].to_string())),
        VAT_MONTH_YEAR_RE
            .captures(text)
            .map(|c| (c[1].to_string(), c[2].to_string())),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|(month, _)| month_number(month).is_some())
        .map(|(month, year)| format!("{} / {}", capitalize(&month), year))
}

/// Corporate declarations report the fiscal year "YYYY".
pub fn extract_corporate_period(text: &str) -> Option<String> {
    CURRENT_PERIOD_RE
        .captures(text)
        .or_else(|| PERIOD_TYPE_RE.captures(text))
        .or_else(|| PERIOD_RE.captures(text))
        .map(|caps| caps[1].to_string())
}

pub fn extract_identity(text: &str) -> TaxpayerIdentity {
    let detected = detect_kind(text);

    let period = match detected {
        DetectedKind::Vat => extract_vat_period(text),
        _ => extract_corporate_period(text),
    };

    let identity = TaxpayerIdentity {
        tax_id: extract_tax_id(text).unwrap_or_else(|| UNKNOWN.to_string()),
        taxpayer_name: extract_taxpayer_name(text).unwrap_or_else(|| UNKNOWN.to_string()),
        period: period.unwrap_or_else(|| UNKNOWN.to_string()),
        detected,
    };

    debug!(
        "Identity: kind={:?} tax_id={} period={}",
        identity.detected, identity.tax_id, identity.period
    );
    if !identity.is_complete() {
        warn!(
            "Incomplete taxpayer identity (tax_id={}, period={})",
            identity.tax_id, identity.period
        );
    }

    identity
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAT_COVER: &str = "KATMA DEĞER VERGİSİ BEYANNAMESİ\n\
        Dönem Tipi Aylık\n\
        Yıl 2024 Ay Mart\n\
        Vergi Kimlik Numarası 1234567890\n\
        Soyadı, Adı (Unvanı)\n\
        ÖRNEK GIDA SANAYİ\n\
        Adı (Unvanın Devamı)\n\
        ANONİM ŞİRKETİ\n";

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(VAT_COVER), DetectedKind::Vat);
        assert_eq!(
            detect_kind("KURUMLAR VERGİSİ BEYANNAMESİ\nKazancın Tespit Yöntemi Bilanço"),
            DetectedKind::BalanceSheet
        );
        assert_eq!(
            detect_kind("KURUMLAR VERGİSİ BEYANNAMESİ\nGELİR TABLOSU"),
            DetectedKind::IncomeStatement
        );
        assert_eq!(detect_kind("random text"), DetectedKind::Unknown);
    }

    #[test]
    fn test_vat_identity() {
        let identity = extract_identity(VAT_COVER);
        assert_eq!(identity.tax_id, "1234567890");
        assert_eq!(identity.period, "Mart / 2024");
        assert_eq!(identity.taxpayer_name, "ÖRNEK GIDA SANAYİ ANONİM ŞİRKETİ");
        assert!(identity.is_complete());
    }

    #[test]
    fn test_month_before_year() {
        let text = "Ay Ocak\nYıl 2023\n";
        assert_eq!(extract_vat_period(text).as_deref(), Some("Ocak / 2023"));
    }

    #[test]
    fn test_name_on_caption_line() {
        let text = "Soyadı, Adı (Unvanı) DENEME LTD ŞTİ\nVergi Dairesi X";
        assert_eq!(extract_taxpayer_name(text).as_deref(), Some("DENEME LTD ŞTİ"));
    }

    #[test]
    fn test_corporate_period_sources() {
        assert_eq!(
            extract_corporate_period("Açıklama Cari Dönem\n(2023)").as_deref(),
            Some("2023")
        );
        assert_eq!(
            extract_corporate_period("DÖNEM TİPİ Yıllık\nYıl 2022").as_deref(),
            Some("2022")
        );
        assert_eq!(extract_corporate_period("DÖNEM: 2021").as_deref(), Some("2021"));
    }

    #[test]
    fn test_tax_id_fallback_and_unknown() {
        assert_eq!(
            extract_tax_id("TC Kimlik Numarası 12345678901").as_deref(),
            Some("12345678901")
        );
        let identity = extract_identity("nothing useful here");
        assert_eq!(identity.tax_id, UNKNOWN);
        assert_eq!(identity.period, UNKNOWN);
        assert!(!identity.is_complete());
    }
}
