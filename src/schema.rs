use crate::numeric::PeriodColumns;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel for identity fields that could not be resolved. A document whose
/// `tax_id` or `period` carries it must be rejected by the caller.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[schemars(description = "Corporate balance sheet (Bilanço)")]
    Bilanco,

    #[schemars(description = "Corporate income statement (Gelir Tablosu)")]
    Gelir,

    #[schemars(description = "Value-added tax declaration (KDV Beyannamesi)")]
    Kdv,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Bilanco => "bilanco",
            DocumentKind::Gelir => "gelir",
            DocumentKind::Kdv => "kdv",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSheetBlock {
    Aktif,
    Pasif,
}

impl BalanceSheetBlock {
    /// Block title as printed on the declaration.
    pub fn title(&self) -> &'static str {
        match self {
            BalanceSheetBlock::Aktif => "AKTİF",
            BalanceSheetBlock::Pasif => "PASİF",
        }
    }

    /// Literal footer line carrying the authoritative block total.
    pub fn total_marker(&self) -> &'static str {
        match self {
            BalanceSheetBlock::Aktif => "AKTİF TOPLAMI",
            BalanceSheetBlock::Pasif => "PASİF TOPLAMI",
        }
    }

    /// First digits of the account codes that live in this block.
    pub fn code_classes(&self) -> &'static [char] {
        match self {
            BalanceSheetBlock::Aktif => &['1', '2'],
            BalanceSheetBlock::Pasif => &['3', '4', '5'],
        }
    }
}

/// Which value column of a statement row an aggregation reads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportingPeriod {
    Prior,
    #[default]
    Current,
    CurrentInflationAdjusted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "Uniform chart-of-accounts code; empty for group headings and unresolved rows")]
    pub code: String,

    pub description: String,

    pub prior_period: Option<f64>,

    pub current_period: Option<f64>,

    #[serde(default)]
    pub current_period_inflation_adjusted: Option<f64>,
}

impl LineItem {
    pub fn new(code: impl Into<String>, description: impl Into<String>, columns: PeriodColumns) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            prior_period: columns.prior,
            current_period: columns.current,
            current_period_inflation_adjusted: columns.inflation_adjusted,
        }
    }

    pub fn value(&self, period: ReportingPeriod) -> Option<f64> {
        match period {
            ReportingPeriod::Prior => self.prior_period,
            ReportingPeriod::Current => self.current_period,
            ReportingPeriod::CurrentInflationAdjusted => self
                .current_period_inflation_adjusted
                .or(self.current_period),
        }
    }

    pub fn columns(&self) -> PeriodColumns {
        PeriodColumns {
            prior: self.prior_period,
            current: self.current_period,
            inflation_adjusted: self.current_period_inflation_adjusted,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BalanceSheetTotals {
    #[schemars(description = "Values parsed from the literal 'AKTİF TOPLAMI' line, if present")]
    pub aktif: Option<PeriodColumns>,

    #[schemars(description = "Values parsed from the literal 'PASİF TOPLAMI' line, if present")]
    pub pasif: Option<PeriodColumns>,
}

impl BalanceSheetTotals {
    pub fn for_block(&self, block: BalanceSheetBlock) -> Option<&PeriodColumns> {
        match block {
            BalanceSheetBlock::Aktif => self.aktif.as_ref(),
            BalanceSheetBlock::Pasif => self.pasif.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BalanceSheet {
    pub aktif: Vec<LineItem>,
    pub pasif: Vec<LineItem>,
    pub totals: BalanceSheetTotals,
    pub has_inflation_column: bool,
}

impl BalanceSheet {
    pub fn block(&self, block: BalanceSheetBlock) -> &[LineItem] {
        match block {
            BalanceSheetBlock::Aktif => &self.aktif,
            BalanceSheetBlock::Pasif => &self.pasif,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct IncomeStatement {
    pub rows: Vec<LineItem>,
    pub has_inflation_column: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KdvRowKind {
    Header,
    Data,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub struct KdvRow {
    #[schemars(description = "Canonical field name; section headers are prefixed with '§ '")]
    pub field_name: String,

    #[schemars(description = "Currency formatted value as printed (e.g. '1.234,56'); empty for headers")]
    pub value: String,

    pub kind: KdvRowKind,
}

impl KdvRow {
    pub const HEADER_PREFIX: &'static str = "§ ";

    pub fn header(title: &str) -> Self {
        Self {
            field_name: format!("{}{}", Self::HEADER_PREFIX, title),
            value: String::new(),
            kind: KdvRowKind::Header,
        }
    }

    pub fn data(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
            kind: KdvRowKind::Data,
        }
    }

    pub fn is_header(&self) -> bool {
        self.kind == KdvRowKind::Header
    }

    /// Section title for header rows (`"§ SONUÇ"` → `"SONUÇ"`).
    pub fn header_title(&self) -> Option<&str> {
        if self.is_header() {
            Some(
                self.field_name
                    .strip_prefix(Self::HEADER_PREFIX)
                    .unwrap_or(&self.field_name),
            )
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct KdvDeclaration {
    pub rows: Vec<KdvRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum Payload {
    Bilanco(BalanceSheet),
    Gelir(IncomeStatement),
    Kdv(KdvDeclaration),
}

impl Payload {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Payload::Bilanco(_) => DocumentKind::Bilanco,
            Payload::Gelir(_) => DocumentKind::Gelir,
            Payload::Kdv(_) => DocumentKind::Kdv,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Bilanco(b) => b.aktif.is_empty() && b.pasif.is_empty(),
            Payload::Gelir(g) => g.rows.is_empty(),
            Payload::Kdv(k) => k.rows.iter().all(KdvRow::is_header),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct NormalizedDocument {
    pub kind: DocumentKind,

    #[schemars(description = "VKN (10-11 digits) or 'Unknown'")]
    pub tax_id: String,

    pub taxpayer_name: String,

    #[schemars(description = "'<Month> / YYYY' for VAT declarations, 'YYYY' for corporate declarations, or 'Unknown'")]
    pub period: String,

    pub payload: Payload,
}

impl NormalizedDocument {
    pub fn new(
        tax_id: impl Into<String>,
        taxpayer_name: impl Into<String>,
        period: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            kind: payload.kind(),
            tax_id: tax_id.into(),
            taxpayer_name: taxpayer_name.into(),
            period: period.into(),
            payload,
        }
    }

    /// True when the identity is incomplete and the record must not be stored.
    pub fn is_rejected(&self) -> bool {
        self.tax_id == UNKNOWN || self.period == UNKNOWN
    }

    pub fn balance_sheet(&self) -> Option<&BalanceSheet> {
        match &self.payload {
            Payload::Bilanco(b) => Some(b),
            _ => None,
        }
    }

    pub fn income_statement(&self) -> Option<&IncomeStatement> {
        match &self.payload {
            Payload::Gelir(g) => Some(g),
            _ => None,
        }
    }

    pub fn kdv(&self) -> Option<&KdvDeclaration> {
        match &self.payload {
            Payload::Kdv(k) => Some(k),
            _ => None,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NormalizedDocument)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Disposition of a single parse call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseOutcome {
    Ok {
        document: NormalizedDocument,
    },
    /// A usable record with gaps, e.g. a balance sheet whose PASİF block was
    /// not found.
    PartialOk {
        document: NormalizedDocument,
        warnings: Vec<String>,
    },
    Failed {
        kind: Option<DocumentKind>,
        error: String,
    },
}

impl ParseOutcome {
    pub fn from_parts(document: NormalizedDocument, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            ParseOutcome::Ok { document }
        } else {
            ParseOutcome::PartialOk { document, warnings }
        }
    }

    pub fn failed(kind: Option<DocumentKind>, error: impl std::fmt::Display) -> Self {
        ParseOutcome::Failed {
            kind,
            error: error.to_string(),
        }
    }

    pub fn document(&self) -> Option<&NormalizedDocument> {
        match self {
            ParseOutcome::Ok { document } | ParseOutcome::PartialOk { document, .. } => Some(document),
            ParseOutcome::Failed { .. } => None,
        }
    }

    pub fn into_document(self) -> Option<NormalizedDocument> {
        match self {
            ParseOutcome::Ok { document } | ParseOutcome::PartialOk { document, .. } => Some(document),
            ParseOutcome::Failed { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ParseOutcome::PartialOk { warnings, .. } => warnings,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ParseOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> NormalizedDocument {
        NormalizedDocument::new(
            "1234567890",
            "ÖRNEK TİCARET A.Ş.",
            "2023",
            Payload::Gelir(IncomeStatement {
                rows: vec![LineItem::new(
                    "600",
                    "Yurtiçi Satışlar",
                    PeriodColumns {
                        prior: Some(10.0),
                        current: Some(20.0),
                        inflation_adjusted: None,
                    },
                )],
                has_inflation_column: false,
            }),
        )
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = NormalizedDocument::schema_as_json().unwrap();
        assert!(schema_json.contains("tax_id"));
        assert!(schema_json.contains("taxpayer_name"));
        assert!(schema_json.contains("payload"));
    }

    #[test]
    fn test_serialization_keeps_payload_kind() {
        let document = sample_document();
        let json = serde_json::to_string_pretty(&document).unwrap();
        assert!(json.contains("\"kind\": \"gelir\""));

        let restored: NormalizedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, document);
        assert_eq!(restored.payload.kind(), DocumentKind::Gelir);
    }

    #[test]
    fn test_unknown_identity_is_rejected() {
        let mut document = sample_document();
        assert!(!document.is_rejected());
        document.tax_id = UNKNOWN.to_string();
        assert!(document.is_rejected());
    }

    #[test]
    fn test_kdv_row_header_title() {
        let header = KdvRow::header("SONUÇ");
        assert_eq!(header.field_name, "§ SONUÇ");
        assert_eq!(header.header_title(), Some("SONUÇ"));
        assert_eq!(KdvRow::data("Matrah Toplamı", "1,00").header_title(), None);
    }
}
