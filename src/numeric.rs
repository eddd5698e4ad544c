//! Turkish-locale amount parsing and formatting.
//!
//! Declarations print amounts as `1.234.567,89`, sometimes negated with
//! parentheses (`(1.234,56)`) or a trailing dash (`1.234,56 -`). Everything in
//! this module is total: malformed input yields `None`, never a panic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::LazyLock;

static AMOUNT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?[-+]?\d[\d.,]*\)?-?$").expect("valid amount token regex")
});

/// Parses a Turkish formatted amount.
///
/// Dot/comma disambiguation when no comma is present: more than one dot means
/// thousands separators; exactly one dot followed by exactly three digits is
/// also read as a thousands separator (`1.234` is 1234, not 1.234).
pub fn parse_amount(token: &str) -> Option<f64> {
    let mut s = token.trim();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        negative = true;
        s = s[1..s.len() - 1].trim();
    }
    if let Some(stripped) = s.strip_suffix('-') {
        negative = true;
        s = stripped.trim();
    }

    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        let dots = s.matches('.').count();
        if dots > 1 {
            s.replace('.', "")
        } else if dots == 1 {
            let tail = s.rsplit('.').next().unwrap_or("");
            if tail.len() == 3 && tail.chars().all(|c| c.is_ascii_digit()) {
                s.replace('.', "")
            } else {
                s.to_string()
            }
        } else {
            s.to_string()
        }
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if negative { -value } else { value })
}

/// Amount rule used for XML declarations: empty or malformed values count as
/// zero, a comma is always the decimal separator.
pub fn parse_xml_amount(text: &str) -> f64 {
    let s = text.trim();
    if s.is_empty() {
        return 0.0;
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Formats an amount the way declarations print it: `-1.234.567,89`.
pub fn format_amount(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let integer = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{},{:02}", sign, grouped, fraction)
}

pub fn is_amount_token(token: &str) -> bool {
    AMOUNT_TOKEN_RE.is_match(token)
}

/// A table line split into its description and trailing amount columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountSplit {
    pub description: String,
    pub amounts: Vec<Option<f64>>,
}

/// Splits off up to `max_tokens` trailing amount tokens from a table line.
///
/// A detached trailing dash (`1.234,56 -`) is merged into the amount before it.
/// Amounts are returned in reading order (left to right).
pub fn split_trailing_amounts(line: &str, max_tokens: usize) -> AmountSplit {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    let mut taken: Vec<String> = Vec::new();

    while taken.len() < max_tokens {
        let Some(last) = tokens.last().copied() else {
            break;
        };

        if last == "-" && tokens.len() >= 2 && is_amount_token(tokens[tokens.len() - 2]) {
            let amount = tokens[tokens.len() - 2];
            taken.push(format!("{}-", amount));
            tokens.truncate(tokens.len() - 2);
            continue;
        }

        if is_amount_token(last) {
            taken.push(last.to_string());
            tokens.pop();
        } else {
            break;
        }
    }

    taken.reverse();
    let description = clean_description(&tokens.join(" "));

    AmountSplit {
        description,
        amounts: taken.iter().map(|t| parse_amount(t)).collect(),
    }
}

fn clean_description(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c == '.' || c == ' ' || c == '•')
        .trim_start_matches(|c: char| c == '-' || c == ' ' || c == '•')
        .to_string()
}

/// Period columns of a statement row, assigned right to left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodColumns {
    pub prior: Option<f64>,
    pub current: Option<f64>,
    pub inflation_adjusted: Option<f64>,
}

impl PeriodColumns {
    /// Three tokens: prior, current, inflation-adjusted current.
    /// Two tokens: prior, current. One token: current only.
    pub fn from_trailing(amounts: &[Option<f64>]) -> Self {
        match amounts {
            [.., prior, current, inflation] => Self {
                prior: *prior,
                current: *current,
                inflation_adjusted: *inflation,
            },
            [prior, current] => Self {
                prior: *prior,
                current: *current,
                inflation_adjusted: None,
            },
            [current] => Self {
                prior: None,
                current: *current,
                inflation_adjusted: None,
            },
            [] => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prior.is_none() && self.current.is_none() && self.inflation_adjusted.is_none()
    }

    /// Forces every populated column negative (`-abs`).
    pub fn negated(self) -> Self {
        let neg = |v: Option<f64>| v.map(|x| -x.abs());
        Self {
            prior: neg(self.prior),
            current: neg(self.current),
            inflation_adjusted: neg(self.inflation_adjusted),
        }
    }
}
