//! Per-line extraction rules for the VAT state machine.
//!
//! Each rule is a pure function of the current line and the machine state.
//! The machine evaluates [`KDV_RULES`] in order and applies the first match.

use super::sections::{KdvSection, TAX_BASE_SUMMARY};
use crate::config::ExtractionConfig;
use crate::schema::KdvRow;
use crate::utils::{canonical_upper, collapse_whitespace};
use regex::Regex;
use std::sync::LazyLock;

const AMT: &str = r"\d{1,3}(?:\.\d{3})*,\d{2}";

static AMT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b{}\b", AMT)).expect("valid amount regex"));

static NON_WITHHELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({AMT})\s+(\d+)\s+({AMT})\b")).expect("valid non-withheld regex")
});

static QUADRUPLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(.*?)\s+({AMT})\s+(\d{{1,2}})\s+(\d+/\d+)\s+({AMT})$"))
        .expect("valid quadruple regex")
});

static QUADRUPLE_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(.*?)\s+({AMT})\s+(\d{{1,2}})\s+(\d+/\d+)\s+({AMT})"))
        .expect("valid quadruple window regex")
});

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(.*?)\s*\b({AMT})\s+({AMT})\s*$")).expect("valid pair regex")
});

static IMPLICIT_OTHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ALINAN MALLARIN IADESI|AMORTI?S?MAN").expect("valid implicit section regex")
});

/// Summary lines inside the tax-base block and the name they are reported as.
const SUMMARY_REDIRECTS: &[(&str, &str)] = &[
    ("Hesaplanan Katma Değer Vergisi", "Hesaplanan KDV"),
    (
        "Daha Önce İndirim Konusu Yapılan KDV'nin İlavesi",
        "Daha Önce İndirim Konusu Yapılan KDV'nin İlavesi",
    ),
    ("Toplam Katma Değer Vergisi", "Toplam KDV"),
];

const RESULT_ROWS: &[&str] = &[
    "Tecil Edilecek Katma Değer Vergisi",
    "Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi",
    "Sonraki Döneme Devreden Katma Değer Vergisi",
    "İade Edilmesi Gereken Katma Değer Vergisi",
];

/// Canonical fragments that end a wrapped description.
const BOUNDARY_KEYWORDS: &[&str] = &[
    "TOPLAMI",
    "ISLEM TURU",
    "TEVKIFAT UYGULANMAYAN",
    "KISMI TEVKIFAT",
    "SONUC HESAPLARI",
    "DIGER BILGILER",
    "BEYANNAME",
];

/// First amount on the line, or `"0,00"`.
pub fn first_amount(line: &str) -> String {
    AMT_RE
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "0,00".to_string())
}

pub fn amount_count(line: &str) -> usize {
    AMT_RE.find_iter(line).count()
}

/// State the machine is in before a rule is applied.
pub struct LineContext<'a> {
    pub lines: &'a [&'a str],
    pub index: usize,
    pub section: Option<KdvSection>,
    pub in_tax_base: bool,
    pub pending: &'a [String],
    pub config: &'a ExtractionConfig,
}

impl<'a> LineContext<'a> {
    pub fn line(&self) -> &'a str {
        self.lines.get(self.index).copied().unwrap_or("")
    }

    pub fn canonical(&self) -> String {
        canonical_upper(self.line())
    }

    fn pending_prefix(&self, own: &str) -> String {
        let mut parts: Vec<&str> = self.pending.iter().map(String::as_str).collect();
        if !own.trim().is_empty() {
            parts.push(own);
        }
        collapse_whitespace(&parts.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Enter(KdvSection),
    EnterTaxBase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingAction {
    #[default]
    Keep,
    Clear,
    Push(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMatch {
    /// Header to emit (once) before `rows`.
    pub header: Option<&'static str>,
    pub rows: Vec<KdvRow>,
    pub transition: Option<Transition>,
    /// Number of following lines this match used up.
    pub consumed: usize,
    pub pending: PendingAction,
}

impl RuleMatch {
    fn rows(header: &'static str, rows: Vec<KdvRow>) -> Self {
        Self {
            header: Some(header),
            rows,
            ..Self::default()
        }
    }
}

pub type KdvRule = fn(&LineContext) -> Option<RuleMatch>;

pub const KDV_RULES: &[(&str, KdvRule)] = &[
    ("tax_base_total", tax_base_total),
    ("tax_base_summary", tax_base_summary),
    ("result_row", result_row),
    ("other_table_header", other_table_header),
    ("section_title", section_title),
    ("non_withheld", non_withheld),
    ("partially_withheld", partially_withheld),
    ("implicit_other", implicit_other),
    ("other_pair", other_pair),
    ("label_row", label_row),
    ("boundary", boundary),
    ("pending_description", pending_description),
];

pub fn tax_base_total(ctx: &LineContext) -> Option<RuleMatch> {
    if !ctx.canonical().contains(TAX_BASE_SUMMARY) {
        return None;
    }
    Some(RuleMatch {
        transition: Some(Transition::EnterTaxBase),
        pending: PendingAction::Clear,
        ..RuleMatch::rows(
            TAX_BASE_SUMMARY,
            vec![KdvRow::data("Matrah Toplamı", first_amount(ctx.line()))],
        )
    })
}

pub fn tax_base_summary(ctx: &LineContext) -> Option<RuleMatch> {
    if !ctx.in_tax_base {
        return None;
    }
    let canonical = ctx.canonical();
    SUMMARY_REDIRECTS
        .iter()
        .find(|(source, _)| canonical.contains(&canonical_upper(source)))
        .map(|(_, shown)| {
            RuleMatch::rows(
                TAX_BASE_SUMMARY,
                vec![KdvRow::data(*shown, first_amount(ctx.line()))],
            )
        })
}

pub fn result_row(ctx: &LineContext) -> Option<RuleMatch> {
    let canonical = ctx.canonical();
    RESULT_ROWS
        .iter()
        .find(|name| canonical.contains(&canonical_upper(name)))
        .map(|name| {
            RuleMatch {
                pending: PendingAction::Clear,
                ..RuleMatch::rows(
                    KdvSection::Result.title(),
                    vec![KdvRow::data(*name, first_amount(ctx.line()))],
                )
            }
        })
}

/// "İşlem Türü Matrah Vergi" column header with "Diğer İşlemler" printed
/// within two lines of it.
pub fn other_table_header(ctx: &LineContext) -> Option<RuleMatch> {
    let canonical = ctx.canonical();
    if !["ISLEM", "TURU", "MATRAH", "VERG"]
        .iter()
        .all(|kw| canonical.contains(kw))
    {
        return None;
    }

    let start = ctx.index.saturating_sub(2);
    let end = (ctx.index + 3).min(ctx.lines.len());
    let context = ctx.lines[start..end]
        .iter()
        .map(|l| canonical_upper(l))
        .collect::<Vec<_>>()
        .join(" ");
    if !context.contains(&canonical_upper(KdvSection::OtherTransactions.title())) {
        return None;
    }

    Some(RuleMatch {
        header: Some(KdvSection::OtherTransactions.title()),
        transition: Some(Transition::Enter(KdvSection::OtherTransactions)),
        pending: PendingAction::Clear,
        ..RuleMatch::default()
    })
}

pub fn section_title(ctx: &LineContext) -> Option<RuleMatch> {
    KdvSection::from_line(ctx.line()).map(|section| RuleMatch {
        header: Some(section.title()),
        transition: Some(Transition::Enter(section)),
        pending: PendingAction::Clear,
        ..RuleMatch::default()
    })
}

/// Matrah / oran / vergi triples. Lines in this section that carry no triple
/// are swallowed.
pub fn non_withheld(ctx: &LineContext) -> Option<RuleMatch> {
    if ctx.section != Some(KdvSection::NonWithheld) {
        return None;
    }

    let rows = NON_WITHHELD_RE
        .captures_iter(ctx.line())
        .flat_map(|caps| {
            let rate = &caps[2];
            [
                KdvRow::data(format!("Tevkifatsız İşlem (%{}) - Matrah", rate), &caps[1]),
                KdvRow::data(format!("Tevkifatsız İşlem (%{}) - Vergi", rate), &caps[3]),
            ]
        })
        .collect();

    Some(RuleMatch {
        rows,
        ..RuleMatch::default()
    })
}

fn quadruple_rows(desc: &str, matrah: &str, rate: &str, withholding: &str, tax: &str) -> Vec<KdvRow> {
    let desc = collapse_whitespace(desc);
    vec![
        KdvRow::data(format!("{} - Matrah", desc), matrah),
        KdvRow::data(format!("{} - KDV Oranı", desc), format!("{}%", rate)),
        KdvRow::data(format!("{} - Tevkifat Oranı", desc), withholding),
        KdvRow::data(format!("{} - Vergi", desc), tax),
    ]
}

/// Matrah / KDV oranı / tevkifat oranı / vergi quadruples, on one line or
/// spread over the configured window. Window matches consume the lines up to
/// the one carrying the tax amount.
pub fn partially_withheld(ctx: &LineContext) -> Option<RuleMatch> {
    if ctx.section != Some(KdvSection::PartiallyWithheld) {
        return None;
    }

    if let Some(caps) = QUADRUPLE_LINE_RE.captures(ctx.line().trim()) {
        return Some(RuleMatch {
            rows: quadruple_rows(&caps[1], &caps[2], &caps[3], &caps[4], &caps[5]),
            ..RuleMatch::default()
        });
    }

    let end = (ctx.index + ctx.config.kdv_quadruple_window).min(ctx.lines.len());
    let window_lines = &ctx.lines[ctx.index..end];
    let window = window_lines.join(" ");
    let caps = QUADRUPLE_WINDOW_RE.captures(&window)?;

    let tax = &caps[5];
    let consumed = window_lines
        .iter()
        .position(|l| l.contains(tax))
        .unwrap_or(0);

    Some(RuleMatch {
        rows: quadruple_rows(&caps[1], &caps[2], &caps[3], &caps[4], tax),
        consumed,
        ..RuleMatch::default()
    })
}

fn pair_rows(ctx: &LineContext) -> Option<Vec<KdvRow>> {
    let caps = PAIR_RE.captures(ctx.line().trim())?;
    let desc = ctx.pending_prefix(&caps[1]);
    if desc.is_empty() {
        return None;
    }
    Some(vec![
        KdvRow::data(format!("{} - Matrah", desc), &caps[2]),
        KdvRow::data(format!("{} - Vergi", desc), &caps[3]),
    ])
}

/// "Alınan Malların İadesi" / "Amortisman" lines with a matrah and vergi open
/// the other-transactions section even without its title.
pub fn implicit_other(ctx: &LineContext) -> Option<RuleMatch> {
    if ctx.section == Some(KdvSection::OtherTransactions)
        || !IMPLICIT_OTHER_RE.is_match(&ctx.canonical())
        || amount_count(ctx.line()) < 2
    {
        return None;
    }

    Some(RuleMatch {
        header: Some(KdvSection::OtherTransactions.title()),
        rows: pair_rows(ctx).unwrap_or_default(),
        transition: Some(Transition::Enter(KdvSection::OtherTransactions)),
        pending: PendingAction::Clear,
        ..RuleMatch::default()
    })
}

/// Matrah + vergi pairs; a wrapped description waiting in the pending buffer
/// is prefixed to the line's own text.
pub fn other_pair(ctx: &LineContext) -> Option<RuleMatch> {
    if ctx.section != Some(KdvSection::OtherTransactions) {
        return None;
    }
    pair_rows(ctx).map(|rows| RuleMatch {
        rows,
        pending: PendingAction::Clear,
        ..RuleMatch::default()
    })
}

/// Description followed by an amount, for the single-value sections. The
/// rightmost amount is reported.
pub fn label_row(ctx: &LineContext) -> Option<RuleMatch> {
    let section = ctx.section.filter(KdvSection::is_label_section)?;
    let line = ctx.line().trim();
    let first = AMT_RE.find(line)?;
    let last = AMT_RE.find_iter(line).last()?;

    let desc = ctx.pending_prefix(line[..first.start()].trim_end_matches([' ', ':', '-']));
    if desc.is_empty() {
        return None;
    }

    Some(RuleMatch {
        rows: vec![KdvRow::data(desc, last.as_str())],
        header: Some(section.title()),
        pending: PendingAction::Clear,
        ..RuleMatch::default()
    })
}

pub fn boundary(ctx: &LineContext) -> Option<RuleMatch> {
    if ctx.pending.is_empty() {
        return None;
    }
    let canonical = ctx.canonical();
    BOUNDARY_KEYWORDS
        .iter()
        .any(|kw| canonical.contains(kw))
        .then(|| RuleMatch {
            pending: PendingAction::Clear,
            ..RuleMatch::default()
        })
}

/// Text-only lines in sections that expect a description are held until
/// the amounts arrive.
pub fn pending_description(ctx: &LineContext) -> Option<RuleMatch> {
    let section = ctx.section?;
    if section != KdvSection::OtherTransactions && !section.is_label_section() {
        return None;
    }
    let line = ctx.line().trim();
    if line.is_empty() || amount_count(line) > 0 {
        return None;
    }
    if ctx.pending.is_empty() && BOUNDARY_KEYWORDS.iter().any(|kw| ctx.canonical().contains(kw)) {
        return None;
    }

    Some(RuleMatch {
        pending: PendingAction::Push(line.to_string()),
        ..RuleMatch::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        lines: &'a [&'a str],
        index: usize,
        section: Option<KdvSection>,
        pending: &'a [String],
        config: &'a ExtractionConfig,
    ) -> LineContext<'a> {
        LineContext {
            lines,
            index,
            section,
            in_tax_base: false,
            pending,
            config,
        }
    }

    #[test]
    fn test_first_amount() {
        assert_eq!(first_amount("Matrah Toplamı 12.345,67"), "12.345,67");
        assert_eq!(first_amount("Matrah Toplamı"), "0,00");
        assert_eq!(amount_count("1234,56"), 0);
    }

    #[test]
    fn test_tax_base_total() {
        let config = ExtractionConfig::default();
        let lines = ["Matrah Toplamı 10.000,00"];
        let m = tax_base_total(&ctx(&lines, 0, None, &[], &config)).unwrap();
        assert_eq!(m.header, Some(TAX_BASE_SUMMARY));
        assert_eq!(m.rows, vec![KdvRow::data("Matrah Toplamı", "10.000,00")]);
        assert_eq!(m.transition, Some(Transition::EnterTaxBase));
    }

    #[test]
    fn test_tax_base_summary_requires_sub_state() {
        let config = ExtractionConfig::default();
        let lines = ["Hesaplanan Katma Değer Vergisi 2.000,00"];
        let mut c = ctx(&lines, 0, None, &[], &config);
        assert!(tax_base_summary(&c).is_none());
        c.in_tax_base = true;
        let m = tax_base_summary(&c).unwrap();
        assert_eq!(m.rows, vec![KdvRow::data("Hesaplanan KDV", "2.000,00")]);
    }

    #[test]
    fn test_result_rows() {
        let config = ExtractionConfig::default();
        let lines = ["Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi 1.500,00"];
        let m = result_row(&ctx(&lines, 0, None, &[], &config)).unwrap();
        assert_eq!(m.header, Some("SONUÇ"));
        assert_eq!(m.rows[0].value, "1.500,00");
    }

    #[test]
    fn test_non_withheld_triples() {
        let config = ExtractionConfig::default();
        let lines = ["Teslim ve Hizmetler 10.000,00 20 2.000,00"];
        let m = non_withheld(&ctx(&lines, 0, Some(KdvSection::NonWithheld), &[], &config)).unwrap();
        assert_eq!(
            m.rows,
            vec![
                KdvRow::data("Tevkifatsız İşlem (%20) - Matrah", "10.000,00"),
                KdvRow::data("Tevkifatsız İşlem (%20) - Vergi", "2.000,00"),
            ]
        );
    }

    #[test]
    fn test_partially_withheld_single_line() {
        let config = ExtractionConfig::default();
        let lines = ["601 Yapım İşleri 1.000,00 20 4/10 120,00"];
        let m = partially_withheld(&ctx(&lines, 0, Some(KdvSection::PartiallyWithheld), &[], &config))
            .unwrap();
        assert_eq!(m.rows.len(), 4);
        assert_eq!(m.rows[1], KdvRow::data("601 Yapım İşleri - KDV Oranı", "20%"));
        assert_eq!(m.rows[2].value, "4/10");
        assert_eq!(m.consumed, 0);
    }

    #[test]
    fn test_partially_withheld_window_consumes_lines() {
        let config = ExtractionConfig::default();
        let lines = ["602 Etüt Plan Proje", "Danışmanlık 5.000,00 20 9/10", "900,00", "sonraki"];
        let m = partially_withheld(&ctx(&lines, 0, Some(KdvSection::PartiallyWithheld), &[], &config))
            .unwrap();
        assert_eq!(m.rows[0].field_name, "602 Etüt Plan Proje Danışmanlık - Matrah");
        assert_eq!(m.rows[3].value, "900,00");
        assert_eq!(m.consumed, 2);
    }

    #[test]
    fn test_other_pair_uses_pending() {
        let config = ExtractionConfig::default();
        let lines = ["1.000,00 180,00"];
        let pending = vec!["Alınan Malların İadesi ve".to_string(), "Hizmet İptalleri".to_string()];
        let m = other_pair(&ctx(&lines, 0, Some(KdvSection::OtherTransactions), &pending, &config))
            .unwrap();
        assert_eq!(
            m.rows,
            vec![
                KdvRow::data("Alınan Malların İadesi ve Hizmet İptalleri - Matrah", "1.000,00"),
                KdvRow::data("Alınan Malların İadesi ve Hizmet İptalleri - Vergi", "180,00"),
            ]
        );
        assert_eq!(m.pending, PendingAction::Clear);
    }

    #[test]
    fn test_implicit_other_section() {
        let config = ExtractionConfig::default();
        let lines = ["Amortisman Yoluyla İndirim 500,00 90,00"];
        let m = implicit_other(&ctx(&lines, 0, Some(KdvSection::Deductions), &[], &config)).unwrap();
        assert_eq!(m.transition, Some(Transition::Enter(KdvSection::OtherTransactions)));
        assert_eq!(m.rows.len(), 2);
    }

    #[test]
    fn test_other_table_header_needs_context() {
        let config = ExtractionConfig::default();
        let lines = ["DİĞER İŞLEMLER", "İşlem Türü Matrah Vergi"];
        assert!(other_table_header(&ctx(&lines, 1, None, &[], &config)).is_some());
        let lines = ["İNDİRİMLER", "İşlem Türü Matrah Vergi"];
        assert!(other_table_header(&ctx(&lines, 1, None, &[], &config)).is_none());
    }

    #[test]
    fn test_label_row() {
        let config = ExtractionConfig::default();
        let lines = ["İndirimler Toplamı 3.000,00"];
        let m = label_row(&ctx(&lines, 0, Some(KdvSection::Deductions), &[], &config)).unwrap();
        assert_eq!(m.rows, vec![KdvRow::data("İndirimler Toplamı", "3.000,00")]);
        assert!(label_row(&ctx(&lines, 0, Some(KdvSection::OtherTransactions), &[], &config)).is_none());
    }

    #[test]
    fn test_boundary_and_pending() {
        let config = ExtractionConfig::default();
        let pending = vec!["Yarım kalan".to_string()];
        let lines = ["KISMİ TEVKİFAT UYGULANAN İŞLEMLER ÖZETİ"];
        assert!(boundary(&ctx(&lines, 0, Some(KdvSection::OtherTransactions), &pending, &config)).is_some());

        let lines = ["açıklama devamı"];
        let m = pending_description(&ctx(&lines, 0, Some(KdvSection::OtherTransactions), &[], &config))
            .unwrap();
        assert_eq!(m.pending, PendingAction::Push("açıklama devamı".to_string()));
        assert!(pending_description(&ctx(&lines, 0, None, &[], &config)).is_none());
    }
}
