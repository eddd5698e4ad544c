//! Multi-year trend commentary over per-year ratio reports.

use super::catalogue::{Classification, RatioReport};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative change separating a strong move from a moderate one.
const STRONG_CHANGE: f64 = 0.05;

const RISKY_ADVICE: &str = "Bu oranda iyileştirme için nakit akış ve borç yönetimini gözden geçirin.";
const DECLINE_ADVICE: &str = "Düşüşü durdurmak adına kısa vadede maliyet optimizasyonu yapın.";
const DEBT_GROWTH_ADVICE: &str = "Borçlanmayı azaltarak sürdürülebilir büyümeyi destekleyin.";

const GENERAL_RECOMMENDATIONS: [&str; 3] = [
    "Likidite yönetimini güçlendirmek için stok ve alacak devir hızını artırın.",
    "Borç/özkaynak oranını dengelemek adına uzun vadeli finansman kaynaklarına yönelin.",
    "Kârlılık oranlarını destekleyecek maliyet kontrol ve fiyatlama stratejileri uygulayın.",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    StrongRise,
    ModerateRise,
    StrongDecline,
    ModerateDecline,
    Flat,
}

impl TrendLabel {
    /// Buckets the change from `first` to `last`, measured against `|first|`.
    pub fn classify(first: f64, last: f64) -> Self {
        let band = first.abs() * STRONG_CHANGE;
        if last > first + band {
            TrendLabel::StrongRise
        } else if last > first {
            TrendLabel::ModerateRise
        } else if last < first - band {
            TrendLabel::StrongDecline
        } else if last < first {
            TrendLabel::ModerateDecline
        } else {
            TrendLabel::Flat
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrendLabel::StrongRise => "Güçlü artış",
            TrendLabel::ModerateRise => "Ilımlı artış",
            TrendLabel::StrongDecline => "Önemli düşüş",
            TrendLabel::ModerateDecline => "Ilımlı düşüş",
            TrendLabel::Flat => "Yatay seyir",
        }
    }

    fn in_sentence(&self) -> &'static str {
        match self {
            TrendLabel::StrongRise => "güçlü artış",
            TrendLabel::ModerateRise => "ılımlı artış",
            TrendLabel::StrongDecline => "önemli düşüş",
            TrendLabel::ModerateDecline => "ılımlı düşüş",
            TrendLabel::Flat => "yatay seyir",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatioTrend {
    pub name: String,
    /// Defined values only; years where the ratio was undefined are absent.
    pub values_by_year: BTreeMap<i32, f64>,
    pub trend_label: TrendLabel,
    pub mean: f64,
    pub last_value: f64,
    /// Level of the last value against the latest report's thresholds.
    pub classification: Classification,
    pub narrative: String,
    pub advice: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TrendReport {
    pub ratios: Vec<RatioTrend>,
    pub overall_summary: String,
    pub recommendations: Vec<String>,
}

impl TrendReport {
    pub fn get(&self, name: &str) -> Option<&RatioTrend> {
        self.ratios.iter().find(|t| t.name == name)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio_names(reports: &BTreeMap<i32, RatioReport>) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for report in reports.values() {
        for result in &report.results {
            if !names.contains(&result.name.as_str()) {
                names.push(&result.name);
            }
        }
    }
    names
}

fn analyze_ratio(name: &str, reports: &BTreeMap<i32, RatioReport>) -> Option<RatioTrend> {
    let values_by_year: BTreeMap<i32, f64> = reports
        .iter()
        .filter_map(|(year, report)| report.value(name).map(|v| (*year, v)))
        .collect();

    let (&first_year, &first) = values_by_year.iter().next()?;
    let (&last_year, &last) = values_by_year.iter().next_back()?;
    let mean = round2(values_by_year.values().sum::<f64>() / values_by_year.len() as f64);
    let label = TrendLabel::classify(first, last);

    let latest = reports
        .values()
        .next_back()
        .and_then(|report| report.get(name));
    let classification = latest
        .and_then(|r| r.thresholds)
        .map(|t| t.classify(last))
        .unwrap_or(Classification::Undefined);

    let narrative = format!(
        "{}–{} arasında {}; ortalama {:.2}, son değer {:.2}. Mevcut seviye: {}.",
        first_year,
        last_year,
        label.in_sentence(),
        mean,
        last,
        classification.label()
    );

    let mut advice: Vec<String> = latest
        .and_then(|r| r.advice_text.clone())
        .into_iter()
        .collect();
    if classification == Classification::Risky {
        advice.push(RISKY_ADVICE.to_string());
    }
    if label == TrendLabel::StrongDecline {
        advice.push(DECLINE_ADVICE.to_string());
    }
    if label == TrendLabel::StrongRise && name.to_lowercase().contains("borç") {
        advice.push(DEBT_GROWTH_ADVICE.to_string());
    }

    Some(RatioTrend {
        name: name.to_string(),
        values_by_year,
        trend_label: label,
        mean,
        last_value: last,
        classification,
        narrative,
        advice,
    })
}

/// Builds per-ratio trends from reports keyed by year. Ratios that are
/// undefined in every year are left out.
pub fn analyze_trends(reports: &BTreeMap<i32, RatioReport>) -> TrendReport {
    let ratios: Vec<RatioTrend> = ratio_names(reports)
        .into_iter()
        .filter_map(|name| analyze_ratio(name, reports))
        .collect();
    debug!("Trend analysis over {} years: {} ratios", reports.len(), ratios.len());

    let outlook = if ratios.iter().any(|t| t.trend_label == TrendLabel::StrongRise) {
        "olumlu"
    } else {
        "istikrarlı veya iyileşme potansiyeli taşıyan"
    };
    let mut overall_summary = format!("Finansal oranlarınız genel olarak {} bir tablo çiziyor.", outlook);
    if ratios.iter().any(|t| t.classification == Classification::Risky) {
        overall_summary.push_str(
            " Bazı oranlarda riskli seviyeler mevcut; özellikle nakit likiditenize ve borç yapınıza dikkat etmenizi öneririz.",
        );
    }

    TrendReport {
        ratios,
        overall_summary,
        recommendations: GENERAL_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratios::catalogue::{RatioCategory, RatioResult, Thresholds};

    fn report(name: &str, value: Option<f64>, thresholds: Thresholds) -> RatioReport {
        let classification = value.map_or(Classification::Undefined, |v| thresholds.classify(v));
        RatioReport {
            results: vec![RatioResult {
                name: name.to_string(),
                category: RatioCategory::Structure,
                value,
                classification,
                formula_text: String::new(),
                meaning: String::new(),
                advice_text: Some(format!("{:?} tavsiyesi", classification)),
                thresholds: Some(thresholds),
            }],
            ..RatioReport::default()
        }
    }

    #[test]
    fn test_trend_buckets() {
        assert_eq!(TrendLabel::classify(1.0, 1.2), TrendLabel::StrongRise);
        assert_eq!(TrendLabel::classify(1.0, 1.03), TrendLabel::ModerateRise);
        assert_eq!(TrendLabel::classify(1.0, 0.5), TrendLabel::StrongDecline);
        assert_eq!(TrendLabel::classify(1.0, 0.97), TrendLabel::ModerateDecline);
        assert_eq!(TrendLabel::classify(1.0, 1.0), TrendLabel::Flat);
        assert_eq!(TrendLabel::classify(-10.0, -5.0), TrendLabel::StrongRise);
        assert_eq!(TrendLabel::classify(0.0, 0.0), TrendLabel::Flat);
    }

    #[test]
    fn test_narrative_and_advice() {
        let t = Thresholds::new(3.0, 2.5);
        let reports = BTreeMap::from([
            (2021, report("Borç/Özsermaye Oranı", Some(1.0), t)),
            (2022, report("Borç/Özsermaye Oranı", None, t)),
            (2023, report("Borç/Özsermaye Oranı", Some(2.0), t)),
        ]);
        let trends = analyze_trends(&reports);
        let trend = trends.get("Borç/Özsermaye Oranı").unwrap();

        assert_eq!(trend.values_by_year.len(), 2);
        assert_eq!(trend.trend_label, TrendLabel::StrongRise);
        assert_eq!(trend.mean, 1.5);
        assert_eq!(trend.classification, Classification::Risky);
        assert_eq!(
            trend.narrative,
            "2021–2023 arasında güçlü artış; ortalama 1.50, son değer 2.00. Mevcut seviye: riskli."
        );
        assert_eq!(
            trend.advice,
            vec![
                "Risky tavsiyesi".to_string(),
                RISKY_ADVICE.to_string(),
                DEBT_GROWTH_ADVICE.to_string()
            ]
        );
        assert!(trends.overall_summary.contains("olumlu"));
        assert!(trends.overall_summary.contains("riskli seviyeler"));
        assert_eq!(trends.recommendations.len(), 3);
    }

    #[test]
    fn test_undefined_everywhere_is_skipped() {
        let t = Thresholds::new(2.0, 1.5);
        let reports = BTreeMap::from([
            (2022, report("Cari Oran", None, t)),
            (2023, report("Cari Oran", None, t)),
        ]);
        let trends = analyze_trends(&reports);
        assert!(trends.ratios.is_empty());
        assert_eq!(
            trends.overall_summary,
            "Finansal oranlarınız genel olarak istikrarlı veya iyileşme potansiyeli taşıyan bir tablo çiziyor."
        );
    }

    #[test]
    fn test_strong_decline_advice() {
        let t = Thresholds::new(2.0, 1.5);
        let reports = BTreeMap::from([
            (2022, report("Cari Oran", Some(3.0), t)),
            (2023, report("Cari Oran", Some(2.5), t)),
        ]);
        let trend = analyze_trends(&reports).ratios.remove(0);
        assert_eq!(trend.trend_label, TrendLabel::StrongDecline);
        assert_eq!(trend.classification, Classification::Safe);
        assert_eq!(trend.advice.last().unwrap(), DECLINE_ADVICE);
    }
}
