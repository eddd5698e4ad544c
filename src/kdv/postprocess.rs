//! Clean-up passes over extracted VAT rows, plus the multi-period table and
//! summary figures built from them.

use super::sections::OutputSlot;
use crate::numeric::{format_amount, parse_amount};
use crate::schema::KdvRow;
use crate::utils::{canonical_upper, collapse_whitespace, parse_period};
use log::debug;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid separator regex"));

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*-\s*(matrah|vergi|kdv oran[ıi]|tevkifat oran[ıi])$").expect("valid suffix regex")
});

const SUFFIXES: &[(&str, &str)] = &[
    ("MATRAH", "Matrah"),
    ("VERGI", "Vergi"),
    ("KDV ORANI", "KDV Oranı"),
    ("TEVKIFAT ORANI", "Tevkifat Oranı"),
];

/// Cross-check tolerance between detail sums and printed totals.
const CHECK_TOLERANCE: f64 = 1.0;

/// Canonical field name: separators collapsed, typographic apostrophes
/// straightened and the trailing column suffix spelled one way.
pub fn normalize_field_name(name: &str) -> String {
    let straightened = name.replace(['’', '‘'], "'");
    let collapsed = SEPARATOR_RE.replace_all(straightened.trim(), " ").trim().to_string();

    let Some(caps) = SUFFIX_RE.captures(&collapsed) else {
        return collapsed;
    };
    let Some(whole) = caps.get(0) else {
        return collapsed;
    };
    let suffix_key = canonical_upper(&caps[1]);
    let Some((_, suffix)) = SUFFIXES.iter().find(|(key, _)| *key == suffix_key) else {
        return collapsed;
    };

    let stem = collapsed[..whole.start()].trim_end();
    if stem.is_empty() {
        return collapsed;
    }
    format!("{} - {}", stem, suffix)
}

pub fn normalize_keys(rows: &[KdvRow]) -> Vec<KdvRow> {
    rows.iter()
        .map(|row| {
            if row.is_header() {
                row.clone()
            } else {
                KdvRow::data(normalize_field_name(&row.field_name), row.value.trim())
            }
        })
        .collect()
}

/// Blank cells as they come out of spreadsheets and text extraction.
pub fn is_blank_value(value: &str) -> bool {
    matches!(value.trim(), "" | "nan" | "None" | "-")
}

/// Merges rows that share a canonical field name. The merged row sits where
/// the name first appeared and keeps the first non-blank value.
pub fn consolidate(rows: &[KdvRow]) -> Vec<KdvRow> {
    let mut merged: Vec<KdvRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<(bool, String), usize> = HashMap::new();

    for row in rows {
        let field_name = if row.is_header() {
            row.field_name.clone()
        } else {
            normalize_field_name(&row.field_name)
        };
        let key = (row.is_header(), field_name.clone());

        match index.get(&key) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                if is_blank_value(&existing.value) && !is_blank_value(&row.value) {
                    existing.value = row.value.trim().to_string();
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(KdvRow {
                    field_name,
                    value: row.value.trim().to_string(),
                    kind: row.kind,
                });
            }
        }
    }

    merged
}

/// Rebuilds the rows in the fixed section order. Every data row travels with
/// the header it followed; rows with no header, or under a header that is not
/// a known section, are appended at the end in source order.
pub fn reorder(rows: &[KdvRow]) -> Vec<KdvRow> {
    let mut headers: BTreeMap<usize, Vec<KdvRow>> = BTreeMap::new();
    let mut bodies: BTreeMap<usize, Vec<KdvRow>> = BTreeMap::new();
    let mut unrecognized = Vec::new();
    let mut current: Option<usize> = None;

    for row in rows {
        if let Some(title) = row.header_title() {
            current = OutputSlot::from_title(title).map(|slot| slot.position());
            match current {
                Some(pos) => headers.entry(pos).or_default().push(row.clone()),
                None => {
                    debug!("Unrecognized VAT header '{}' kept at the end", title);
                    unrecognized.push(row.clone());
                }
            }
            continue;
        }

        match current {
            Some(pos) => bodies.entry(pos).or_default().push(row.clone()),
            None => unrecognized.push(row.clone()),
        }
    }

    let mut ordered = Vec::with_capacity(rows.len());
    for pos in 0..OutputSlot::ORDER.len() {
        if let Some(slot_headers) = headers.remove(&pos) {
            ordered.extend(slot_headers);
        }
        if let Some(slot_rows) = bodies.remove(&pos) {
            ordered.extend(slot_rows);
        }
    }
    ordered.extend(unrecognized);
    ordered
}

/// Report column label for a declaration period: `"Ocak / 2024"` becomes
/// `"2024/OCAK"`.
pub fn period_column(period: &str) -> String {
    match period.split_once('/') {
        Some((month, year)) if year.trim().parse::<i32>().is_ok() => {
            format!("{}/{}", year.trim(), month.trim().to_uppercase())
        }
        _ => collapse_whitespace(period),
    }
}

fn period_sort_key(column: &str) -> (i32, u32) {
    parse_period(column).unwrap_or((i32::MAX, u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KdvTableRow {
    pub field_name: String,
    pub is_header: bool,
    /// Value per period column; periods where the field is absent are missing.
    pub values: BTreeMap<String, String>,
}

/// Several months of VAT declarations side by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KdvTable {
    pub periods: Vec<String>,
    pub rows: Vec<KdvTableRow>,
}

impl KdvTable {
    pub fn value(&self, field_name: &str, period: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.field_name == field_name)
            .and_then(|r| r.values.get(period))
            .map(String::as_str)
    }
}

/// Merges per-period row lists into one table. Columns are sorted
/// chronologically; within a field the first non-blank value per column wins.
/// Row order follows the canonical section order.
pub fn consolidate_periods<P: AsRef<str>>(declarations: &[(P, Vec<KdvRow>)]) -> KdvTable {
    let mut periods: Vec<String> = Vec::new();
    let mut merged: Vec<KdvRow> = Vec::new();
    let mut values: HashMap<(bool, String), BTreeMap<String, String>> = HashMap::new();

    for (period, rows) in declarations {
        let column = period_column(period.as_ref());
        if !periods.contains(&column) {
            periods.push(column.clone());
        }

        for row in consolidate(rows) {
            let key = (row.is_header(), row.field_name.clone());
            let cells = values.entry(key).or_insert_with(|| {
                merged.push(KdvRow {
                    field_name: row.field_name.clone(),
                    value: String::new(),
                    kind: row.kind,
                });
                BTreeMap::new()
            });
            if row.is_header() {
                continue;
            }
            match cells.get_mut(&column) {
                Some(cell) if is_blank_value(cell) && !is_blank_value(&row.value) => {
                    *cell = row.value.clone();
                }
                Some(_) => {}
                None => {
                    cells.insert(column.clone(), row.value.clone());
                }
            }
        }
    }

    periods.sort_by_key(|p| period_sort_key(p));

    let rows = reorder(&merged)
        .into_iter()
        .map(|row| {
            let key = (row.is_header(), row.field_name.clone());
            KdvTableRow {
                values: values.remove(&key).unwrap_or_default(),
                is_header: row.is_header(),
                field_name: row.field_name,
            }
        })
        .collect();

    KdvTable { periods, rows }
}

/// Headline figures of one VAT declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KdvSummary {
    pub tax_base: f64,
    pub computed_tax: f64,
    pub total_deductions: f64,
    pub carried_over: f64,
    pub payable: f64,
    pub refundable: f64,
    /// Sum of the per-rate non-withheld tax bases.
    pub tax_base_detail: f64,
    /// Sum of the per-rate non-withheld tax amounts.
    pub computed_tax_detail: f64,
}

impl KdvSummary {
    pub fn from_rows(rows: &[KdvRow]) -> Self {
        let mut summary = KdvSummary::default();

        for row in rows.iter().filter(|r| !r.is_header()) {
            let key = canonical_upper(&row.field_name);
            let value = parse_amount(&row.value).unwrap_or(0.0);

            if key.contains("MATRAH TOPLAMI") {
                summary.tax_base = value;
            } else if key.contains("HESAPLANAN KDV") || key.contains("TOPLAM KDV") {
                summary.computed_tax = value;
            } else if key.contains("INDIRIMLER TOPLAMI") {
                summary.total_deductions = value;
            } else if key.contains("SONRAKI DONEME DEVREDEN") {
                summary.carried_over = value;
            } else if key.contains("ODENMESI GEREKEN") {
                summary.payable = value;
            } else if key.contains("IADE EDILMESI GEREKEN") {
                summary.refundable = value;
            }

            if key.contains("(%") {
                if key.ends_with("- MATRAH") {
                    summary.tax_base_detail += value;
                } else if key.ends_with("- VERGI") {
                    summary.computed_tax_detail += value;
                }
            }
        }

        summary
    }

    /// Mismatches between the per-rate detail and the printed totals, worded
    /// for the report.
    pub fn inconsistencies(&self, period: &str) -> Vec<String> {
        let mut messages = Vec::new();
        if (self.tax_base - self.tax_base_detail).abs() > CHECK_TOLERANCE {
            messages.push(format!(
                "{} dönemi için Matrah Detayı toplamı ({}) ile Toplam Matrah ({}) uyumsuz.",
                period,
                format_amount(self.tax_base_detail),
                format_amount(self.tax_base)
            ));
        }
        if (self.computed_tax - self.computed_tax_detail).abs() > CHECK_TOLERANCE {
            messages.push(format!(
                "{} dönemi için KDV Detayı toplamı ({}) ile Toplam KDV ({}) uyumsuz.",
                period,
                format_amount(self.computed_tax_detail),
                format_amount(self.computed_tax)
            ));
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<KdvRow> {
        vec![
            KdvRow::data("Önceden gelen", "1,00"),
            KdvRow::header("SONUÇ"),
            KdvRow::data("Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi", "500,00"),
            KdvRow::header("TEVKİFAT UYGULANMAYAN İŞLEMLER"),
            KdvRow::data("Tevkifatsız İşlem (%20) - Matrah", "10.000,00"),
            KdvRow::data("Tevkifatsız İşlem (%20) - Vergi", "2.000,00"),
            KdvRow::header("BİLİNMEYEN BÖLÜM"),
            KdvRow::data("Serbest satır", "3,00"),
            KdvRow::header("MATRAH TOPLAMI"),
            KdvRow::data("Matrah Toplamı", "10.000,00"),
        ]
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(
            normalize_field_name("Alınan Malların İadesi,  ve Hizmet -Matrah"),
            "Alınan Malların İadesi ve Hizmet - Matrah"
        );
        assert_eq!(normalize_field_name("KDV’nin İlavesi"), "KDV'nin İlavesi");
        assert_eq!(normalize_field_name("Yapım İşleri -  kdv oranı"), "Yapım İşleri - KDV Oranı");
        assert_eq!(normalize_field_name("- Vergi"), "- Vergi");
    }

    #[test]
    fn test_consolidate_first_non_blank_wins() {
        let rows = vec![
            KdvRow::data("İhracat - Matrah", "-"),
            KdvRow::data("İhracat -Matrah", "1.000,00"),
            KdvRow::data("İhracat - Matrah", "2.000,00"),
            KdvRow::data("İhracat - Vergi", "0,00"),
        ];
        let merged = consolidate(&rows);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], KdvRow::data("İhracat - Matrah", "1.000,00"));
        assert_eq!(merged[1].value, "0,00");
    }

    #[test]
    fn test_reorder_follows_section_order() {
        let ordered = reorder(&sample());
        let names: Vec<&str> = ordered.iter().map(|r| r.field_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "§ TEVKİFAT UYGULANMAYAN İŞLEMLER",
                "Tevkifatsız İşlem (%20) - Matrah",
                "Tevkifatsız İşlem (%20) - Vergi",
                "§ MATRAH TOPLAMI",
                "Matrah Toplamı",
                "§ SONUÇ",
                "Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi",
                "Önceden gelen",
                "§ BİLİNMEYEN BÖLÜM",
                "Serbest satır",
            ]
        );
    }

    #[test]
    fn test_reorder_idempotent_and_count_preserving() {
        let once = reorder(&sample());
        assert_eq!(once.len(), sample().len());
        assert_eq!(reorder(&once), once);
    }

    #[test]
    fn test_period_column() {
        assert_eq!(period_column("Ocak / 2024"), "2024/OCAK");
        assert_eq!(period_column("2023"), "2023");
    }

    #[test]
    fn test_consolidate_periods() {
        let march = vec![
            KdvRow::header("SONUÇ"),
            KdvRow::data("Sonraki Döneme Devreden Katma Değer Vergisi", "100,00"),
        ];
        let january = vec![
            KdvRow::header("TEVKİFAT UYGULANMAYAN İŞLEMLER"),
            KdvRow::data("Tevkifatsız İşlem (%20) - Matrah", "5.000,00"),
            KdvRow::header("SONUÇ"),
            KdvRow::data("Sonraki Döneme Devreden Katma Değer Vergisi", "-"),
        ];

        let table = consolidate_periods(&[("Mart / 2024", march), ("Ocak / 2024", january)]);
        assert_eq!(table.periods, vec!["2024/OCAK", "2024/MART"]);
        assert_eq!(table.rows[0].field_name, "§ TEVKİFAT UYGULANMAYAN İŞLEMLER");
        assert_eq!(
            table.value("Sonraki Döneme Devreden Katma Değer Vergisi", "2024/MART"),
            Some("100,00")
        );
        assert_eq!(
            table.value("Sonraki Döneme Devreden Katma Değer Vergisi", "2024/OCAK"),
            Some("-")
        );
        assert_eq!(table.value("Tevkifatsız İşlem (%20) - Matrah", "2024/MART"), None);
    }

    #[test]
    fn test_summary_and_cross_check() {
        let rows = vec![
            KdvRow::data("Tevkifatsız İşlem (%20) - Matrah", "10.000,00"),
            KdvRow::data("Tevkifatsız İşlem (%20) - Vergi", "2.000,00"),
            KdvRow::data("Tevkifatsız İşlem (%10) - Matrah", "1.000,00"),
            KdvRow::data("Tevkifatsız İşlem (%10) - Vergi", "100,00"),
            KdvRow::data("Matrah Toplamı", "11.000,00"),
            KdvRow::data("Hesaplanan KDV", "2.000,00"),
            KdvRow::data("İndirimler Toplamı", "1.500,00"),
            KdvRow::data("Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi", "600,00"),
        ];
        let summary = KdvSummary::from_rows(&rows);
        assert_eq!(summary.tax_base, 11_000.0);
        assert_eq!(summary.total_deductions, 1_500.0);
        assert_eq!(summary.payable, 600.0);
        assert_eq!(summary.computed_tax_detail, 2_100.0);

        let issues = summary.inconsistencies("2024/OCAK");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("KDV Detayı toplamı (2.100,00)"));
    }
}
