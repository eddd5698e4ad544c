//! Hierarchical sums over coded statement rows.
//!
//! A requested code matches itself and every code that extends it ("10"
//! matches "100" and "100.01"). Un-coded group rows ("I. DÖNEN VARLIKLAR")
//! match through a caption table. Overlapping matches are counted once.

use crate::chart_of_accounts::strip_heading_marker;
use crate::schema::{BalanceSheet, BalanceSheetBlock, IncomeStatement, LineItem, ReportingPeriod};
use crate::utils::{canonical_upper, normalize_description};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Group captions and the account-code prefix they total.
const GROUP_KEYWORDS: &[(&str, &str)] = &[
    ("kisa vadeli yabanci kaynaklar", "3"),
    ("uzun vadeli yabanci kaynaklar", "4"),
    ("diger kisa vadeli yabanci kaynaklar", "39"),
    ("diger uzun vadeli yabanci kaynaklar", "49"),
    ("donen varliklar", "1"),
    ("duran varliklar", "2"),
    ("oz kaynaklar", "5"),
    ("ozkaynaklar", "5"),
    ("hazir degerler", "10"),
    ("menkul kiymetler", "11"),
    ("ticari alacaklar", "12"),
    ("diger alacaklar", "13"),
    ("stoklar", "15"),
    ("diger donen varliklar", "19"),
    ("diger duran varliklar", "29"),
    ("brut satislar", "60"),
    ("satis indirimleri", "61"),
    ("satislarin maliyeti", "62"),
    ("faaliyet giderleri", "63"),
    ("diger faaliyetlerden olagan gelir ve karlar", "64"),
    ("diger faaliyetlerden olagan gider ve zararlar", "65"),
    ("finansman giderleri", "66"),
    ("olagandisi gelir ve karlar", "67"),
    ("olagandisi gider ve zararlar", "68"),
];

fn overlaps(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

fn is_block_total(row: &LineItem) -> bool {
    let upper = canonical_upper(&row.description);
    [BalanceSheetBlock::Aktif, BalanceSheetBlock::Pasif]
        .iter()
        .any(|b| upper.contains(&canonical_upper(b.total_marker())))
}

/// Account-code prefix a group caption stands for. The heading marker
/// ("I.", "A.") is dropped and the rest must match a caption exactly.
pub fn group_keyword_code(description: &str) -> Option<&'static str> {
    let normalized = normalize_description(strip_heading_marker(description));
    GROUP_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == normalized)
        .map(|(_, code)| *code)
}

fn same_block_pair(a: char, b: char) -> bool {
    matches!((a, b), ('1' | '2', '1' | '2') | ('3' | '4', '3' | '4'))
}

/// Group key of every row. Subgroup captions shared by both halves of a
/// block ("Ticari Alacaklar" is 12 under DÖNEN and 22 under DURAN) take the
/// class of the enclosing class caption or the last coded row.
fn group_keys(rows: &[LineItem]) -> Vec<Option<String>> {
    let mut class: Option<char> = None;
    rows.iter()
        .map(|row| {
            if !row.code.is_empty() {
                class = row.code.chars().next();
                return None;
            }
            if is_block_total(row) {
                return None;
            }
            let key = group_keyword_code(&row.description)?;
            let mut chars = key.chars();
            let key_class = chars.next()?;
            if key.len() == 1 {
                class = Some(key_class);
                return Some(key.to_string());
            }
            match class {
                Some(c) if c != key_class && same_block_pair(c, key_class) => {
                    Some(format!("{}{}", c, chars.as_str()))
                }
                _ => Some(key.to_string()),
            }
        })
        .collect()
}

fn matches_request(code: &str, requested: &[&str]) -> bool {
    !code.is_empty() && requested.iter().any(|r| code.starts_with(r))
}

/// Rows following a counted group row that belong to that group: coded rows
/// extending its prefix and un-coded rows that are not a sibling or parent
/// group caption.
fn group_region(rows: &[LineItem], keys: &[Option<String>], start: usize, prefix: &str) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .skip(start + 1)
        .take_while(|(idx, row)| {
            if !row.code.is_empty() {
                return row.code.starts_with(prefix);
            }
            if is_block_total(row) {
                return false;
            }
            match keys[*idx].as_deref() {
                Some(key) => key.len() > prefix.len() && key.starts_with(prefix),
                None => true,
            }
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// The literal block-total row, when the request covers every coded row of
/// the slice.
fn block_total_shortcut(requested: &[&str], rows: &[LineItem], period: ReportingPeriod) -> Option<f64> {
    let coded: Vec<&LineItem> = rows.iter().filter(|r| !r.code.is_empty()).collect();
    if coded.is_empty() || !coded.iter().all(|r| matches_request(&r.code, requested)) {
        return None;
    }
    rows.iter()
        .filter(|r| is_block_total(r))
        .find_map(|r| r.value(period))
}

/// Sums the `period` value of every row matching `requested`.
///
/// Group rows matched through a keyword are considered first, broadest
/// prefix first, and shadow the rows of their group. Coded rows follow,
/// longest code first; a row whose code overlaps an already counted code is
/// skipped. Missing values count as zero.
pub fn aggregate(requested: &[&str], rows: &[LineItem], period: ReportingPeriod) -> f64 {
    if requested.is_empty() {
        return 0.0;
    }
    if let Some(total) = block_total_shortcut(requested, rows, period) {
        debug!("Aggregate {:?} taken from the block total row", requested);
        return total;
    }

    let keys = group_keys(rows);
    let mut counted: Vec<&str> = Vec::new();
    let mut excluded: HashSet<usize> = HashSet::new();
    let mut sum = 0.0;

    let mut groups: Vec<(usize, &str)> = rows
        .iter()
        .zip(&keys)
        .enumerate()
        .filter_map(|(idx, (row, key))| {
            let key = key.as_deref()?;
            let wanted = requested.iter().any(|r| key.starts_with(r));
            (wanted && row.value(period).is_some()).then_some((idx, key))
        })
        .collect();
    groups.sort_by_key(|(_, key)| key.len());

    for (idx, key) in groups {
        if excluded.contains(&idx) || counted.iter().any(|c| overlaps(c, key)) {
            continue;
        }
        sum += rows[idx].value(period).unwrap_or(0.0);
        counted.push(key);
        excluded.extend(group_region(rows, &keys, idx, key));
    }

    let mut coded: Vec<(usize, &str)> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| matches_request(&row.code, requested))
        .map(|(idx, row)| (idx, row.code.as_str()))
        .collect();
    coded.sort_by_key(|(_, code)| std::cmp::Reverse(code.len()));

    for (idx, code) in coded {
        if excluded.contains(&idx) || counted.iter().any(|c| overlaps(c, code)) {
            continue;
        }
        sum += rows[idx].value(period).unwrap_or(0.0);
        counted.push(code);
    }

    sum
}

/// Total of a balance-sheet block: the declared `<BLOCK> TOPLAMI` values
/// when present, otherwise the sum of the block's account classes.
pub fn block_total(sheet: &BalanceSheet, block: BalanceSheetBlock, period: ReportingPeriod) -> f64 {
    let declared = sheet.totals.for_block(block).and_then(|t| match period {
        ReportingPeriod::Prior => t.prior,
        ReportingPeriod::Current => t.current,
        ReportingPeriod::CurrentInflationAdjusted => t.inflation_adjusted.or(t.current),
    });
    if let Some(total) = declared {
        return total;
    }

    let classes: Vec<String> = block.code_classes().iter().map(char::to_string).collect();
    let requested: Vec<&str> = classes.iter().map(String::as_str).collect();
    aggregate(&requested, sheet.block(block), period)
}

/// Figures the ratio formulas are written in. Expense and contra groups are
/// negative, so profits are plain sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedFigures {
    pub current_assets: f64,
    pub fixed_assets: f64,
    pub cash: f64,
    pub securities: f64,
    pub trade_receivables: f64,
    pub inventories: f64,
    pub total_assets: f64,
    pub short_term_liabilities: f64,
    pub long_term_liabilities: f64,
    pub total_liabilities: f64,
    pub equity: f64,
    pub total_liabilities_and_equity: f64,
    pub gross_sales: f64,
    pub sales_deductions: f64,
    pub net_sales: f64,
    pub cost_of_sales: f64,
    pub gross_profit: f64,
    pub operating_expenses: f64,
    pub operating_profit: f64,
    pub ordinary_profit: f64,
    pub period_profit: f64,
    pub tax_provision: f64,
    pub net_profit: f64,
}

impl DerivedFigures {
    pub fn compute(
        sheet: &BalanceSheet,
        statement: &IncomeStatement,
        period: ReportingPeriod,
    ) -> Self {
        let aktif = |codes: &[&str]| aggregate(codes, &sheet.aktif, period);
        let pasif = |codes: &[&str]| aggregate(codes, &sheet.pasif, period);
        let income = |codes: &[&str]| aggregate(codes, &statement.rows, period);

        let short_term_liabilities = pasif(&["3"]);
        let long_term_liabilities = pasif(&["4"]);

        let gross_sales = income(&["60"]);
        let sales_deductions = income(&["61"]);
        let net_sales = gross_sales + sales_deductions;
        let cost_of_sales = income(&["62"]);
        let gross_profit = net_sales + cost_of_sales;
        let operating_expenses = income(&["63"]);
        let operating_profit = gross_profit + operating_expenses;
        let ordinary_profit = operating_profit + income(&["64"]) + income(&["65"]) + income(&["66"]);
        let period_profit = ordinary_profit + income(&["67"]) + income(&["68"]);
        let tax_provision = income(&["690"]);

        Self {
            current_assets: aktif(&["1"]),
            fixed_assets: aktif(&["2"]),
            cash: aktif(&["10"]),
            securities: aktif(&["11"]),
            trade_receivables: aktif(&["12"]),
            inventories: aktif(&["15"]),
            total_assets: block_total(sheet, BalanceSheetBlock::Aktif, period),
            short_term_liabilities,
            long_term_liabilities,
            total_liabilities: short_term_liabilities + long_term_liabilities,
            equity: pasif(&["5"]),
            total_liabilities_and_equity: block_total(sheet, BalanceSheetBlock::Pasif, period),
            gross_sales,
            sales_deductions,
            net_sales,
            cost_of_sales,
            gross_profit,
            operating_expenses,
            operating_profit,
            ordinary_profit,
            period_profit,
            tax_provision,
            net_profit: period_profit + tax_provision,
        }
    }
}
