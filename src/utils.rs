use chrono::{Days, NaiveDate};

/// Folds Turkish letters onto their ASCII base so that "İNDİRİMLER" and
/// "INDIRIMLER" compare equal.
pub fn fold_turkish(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\u{0307}')
        .map(|c| match c {
            'İ' => 'I',
            'ı' => 'i',
            'Ş' => 'S',
            'ş' => 's',
            'Ğ' => 'G',
            'ğ' => 'g',
            'Ü' => 'U',
            'ü' => 'u',
            'Ö' => 'O',
            'ö' => 'o',
            'Ç' => 'C',
            'ç' => 'c',
            'Â' => 'A',
            'â' => 'a',
            'Î' => 'I',
            'î' => 'i',
            'Û' => 'U',
            'û' => 'u',
            '’' | '‘' => '\'',
            other => other,
        })
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded, whitespace-collapsed, upper-cased form used for section titles and
/// keyword lookups.
pub fn canonical_upper(text: &str) -> String {
    collapse_whitespace(&fold_turkish(text)).to_uppercase()
}

/// Folded, lower-cased form with punctuation removed, used when comparing a
/// free-text description with registry descriptions.
pub fn normalize_description(text: &str) -> String {
    let folded = fold_turkish(text).to_lowercase();
    let stripped: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    collapse_whitespace(&stripped)
}

/// Ratcliff/Obershelp similarity: `2 * matched / (len(a) + len(b))`, in `[0, 1]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }

    len + matched_chars(&a[..start_a], &b[..start_b])
        + matched_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            curr[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            if curr[j + 1] > best.2 {
                best = (i + 1 - curr[j + 1], j + 1 - curr[j + 1], curr[j + 1]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Joins per-page extracted text into one document, one newline per page break.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Month number for a Turkish month name ("Ocak", "ŞUBAT", ...) or a numeric
/// month ("01", "3").
pub fn month_number(name: &str) -> Option<u32> {
    let trimmed = name.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }

    let month = match canonical_upper(trimmed).as_str() {
        "OCAK" => 1,
        "SUBAT" => 2,
        "MART" => 3,
        "NISAN" => 4,
        "MAYIS" => 5,
        "HAZIRAN" => 6,
        "TEMMUZ" => 7,
        "AGUSTOS" => 8,
        "EYLUL" => 9,
        "EKIM" => 10,
        "KASIM" => 11,
        "ARALIK" => 12,
        _ => return None,
    };
    Some(month)
}

const MONTH_NAMES: [&str; 12] = [
    "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran", "Temmuz", "Ağustos", "Eylül", "Ekim",
    "Kasım", "Aralık",
];

pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_NAMES.get(index).copied()
}

/// Parses the period strings this crate produces ("Ocak / 2024", "2024") into
/// `(year, month)`. An annual period maps to month 12.
pub fn parse_period(period: &str) -> Option<(i32, u32)> {
    match period.split_once('/') {
        Some((left, right)) => {
            let (left, right) = (left.trim(), right.trim());
            if let Ok(year) = right.parse::<i32>() {
                Some((year, month_number(left)?))
            } else {
                Some((left.parse::<i32>().ok()?, month_number(right)?))
            }
        }
        None => {
            let year = period.trim().parse::<i32>().ok()?;
            Some((year, 12))
        }
    }
}

/// Last calendar day covered by a period string.
pub fn period_end_date(period: &str) -> Option<NaiveDate> {
    let (year, month) = parse_period(period)?;
    last_day_of_month(year, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_and_canonical_upper() {
        assert_eq!(canonical_upper("  İndirimler   toplamı "), "INDIRIMLER TOPLAMI");
        assert_eq!(canonical_upper("DİĞER İŞLEMLER"), "DIGER ISLEMLER");
        assert_eq!(fold_turkish("İNDİRİMLER"), fold_turkish("INDIRIMLER"));
        assert_eq!(fold_turkish("Dönem Net Kârı"), "Donem Net Kari");
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("Ticari Alacaklar."), "ticari alacaklar");
        assert_eq!(normalize_description("TİCARİ, ALACAKLAR!"), "ticari alacaklar");
        assert_eq!(normalize_description("Verilen Çekler (-)"), "verilen cekler");
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        // difflib.SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), Some("Ocak"));
        assert_eq!(month_name(12), Some("Aralık"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
        assert_eq!(month_number(month_name(8).unwrap()), Some(8));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("Ocak / 2024"), Some((2024, 1)));
        assert_eq!(parse_period("Şubat/2023"), Some((2023, 2)));
        assert_eq!(parse_period("2023 / 11"), Some((2023, 11)));
        assert_eq!(parse_period("2022"), Some((2022, 12)));
        assert_eq!(parse_period("Unknown"), None);
        assert_eq!(
            period_end_date("Nisan / 2024"),
            NaiveDate::from_ymd_opt(2024, 4, 30)
        );
    }
}
