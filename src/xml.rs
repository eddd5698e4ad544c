//! Electronic (XML) declarations: monthly VAT and annual corporate tax.
//!
//! The document is read with `quick-xml` into a small element tree and then
//! queried by local element names, so namespace prefixes do not matter.

use crate::chart_of_accounts::ChartKind;
use crate::error::{DeclarationError, Result};
use crate::kdv::{reorder, KdvSection, TAX_BASE_SUMMARY};
use crate::numeric::{format_amount, parse_xml_amount, PeriodColumns};
use crate::schema::{
    BalanceSheet, BalanceSheetBlock, IncomeStatement, KdvDeclaration, KdvRow,
    LineItem, NormalizedDocument, Payload, UNKNOWN,
};
use crate::utils::month_name;
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| DeclarationError::XmlSyntax(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a XmlNode> {
        self.children
            .iter()
            .filter(move |c| names.contains(&c.name.as_str()))
    }

    /// First element with this name anywhere below `self`, depth first.
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.descendant(name) })
    }

    pub fn trimmed_text(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }

    /// Text of a direct child element.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::trimmed_text)
    }

    /// Value carried either as an attribute or as a child element.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.attr(name).or_else(|| self.child_text(name))
    }
}

/// Reads an XML document into an element tree rooted at its document element.
pub fn read_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(XmlNode::from_start(e)?),
            Ok(Event::Empty(ref e)) => {
                let node = XmlNode::from_start(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| DeclarationError::XmlSyntax(err.to_string()))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(_)) => {
                let Some(node) = stack.pop() else {
                    return Err(DeclarationError::XmlSyntax("unbalanced closing tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DeclarationError::XmlSyntax(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DeclarationError::XmlSyntax(
            "document ended inside an open element".to_string(),
        ));
    }
    root.ok_or_else(|| DeclarationError::XmlSyntax("document has no root element".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTaxpayer {
    pub tax_id: String,
    pub taxpayer_name: String,
    pub period: String,
}

/// `genelBilgiler/idari` and `genelBilgiler/mukellef`.
pub fn extract_general_info(root: &XmlNode) -> XmlTaxpayer {
    let general = root.child("genelBilgiler");
    let admin = general.and_then(|g| g.child("idari"));
    let taxpayer = general.and_then(|g| g.child("mukellef"));

    let year = admin.and_then(|a| a.child_text("yil"));
    let month = admin.and_then(|a| a.child_text("ay")).map(|m| {
        m.parse::<u32>()
            .ok()
            .and_then(month_name)
            .map(str::to_string)
            .unwrap_or_else(|| m.to_string())
    });
    let period = match (month, year) {
        (Some(month), Some(year)) => format!("{} / {}", month, year),
        (None, Some(year)) => year.to_string(),
        _ => UNKNOWN.to_string(),
    };

    let tax_id = taxpayer
        .and_then(|t| {
            t.child_text("vergiNo")
                .or_else(|| t.child_text("vergiKimlikNo"))
                .or_else(|| t.child_text("tcKimlikNo"))
        })
        .unwrap_or(UNKNOWN)
        .to_string();

    let taxpayer_name = taxpayer
        .and_then(|t| {
            t.child_text("ticaretUnvani")
                .or_else(|| t.child_text("unvan"))
                .map(str::to_string)
                .or_else(|| {
                    let full = [t.child_text("ad"), t.child_text("soyad")]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ");
                    Some(full).filter(|n| !n.is_empty())
                })
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    XmlTaxpayer {
        tax_id,
        taxpayer_name,
        period,
    }
}

/// Which XML declaration family a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlKind {
    Vat,
    CorporateTax,
}

pub fn detect_xml_kind(root: &XmlNode) -> Option<XmlKind> {
    let child_names: Vec<String> = root.children.iter().map(|c| c.name.to_lowercase()).collect();
    let schema = root
        .attr("noNamespaceSchemaLocation")
        .unwrap_or("")
        .to_lowercase();

    if child_names.iter().any(|n| n.contains("kdv")) || schema.contains("kdv") {
        Some(XmlKind::Vat)
    } else if child_names
        .iter()
        .any(|n| n.contains("kurumlar") || n.contains("geçici") || n.contains("gecici"))
        || schema.contains("kurum")
    {
        Some(XmlKind::CorporateTax)
    } else {
        None
    }
}

const VAT_LISTS: &[(&[&str], KdvSection)] = &[
    (
        &["tevkifatUygulanmayanIslemler", "kdvTevkifatUygulanmayanIslemler"],
        KdvSection::NonWithheld,
    ),
    (&["kismiTevkifatUygulananIslemler"], KdvSection::PartiallyWithheld),
    (&["digerIslemler"], KdvSection::OtherTransactions),
];

fn vat_list_rows(list: &XmlNode) -> Vec<KdvRow> {
    let mut items: Vec<&XmlNode> = list.children_named(&["satir"]).collect();
    if items.is_empty() {
        items = list.children_named(&["islem"]).collect();
    }

    items
        .into_iter()
        .filter_map(|item| {
            let kind = item.field("turAd").or_else(|| item.field("tur")).unwrap_or("");
            let base = parse_xml_amount(item.field("matrah").unwrap_or(""));
            let tax = parse_xml_amount(item.field("vergi").unwrap_or(""));
            (base > 0.0).then(|| {
                [
                    KdvRow::data(format!("{} - Matrah", kind), format_amount(base)),
                    KdvRow::data(format!("{} - Vergi", kind), format_amount(tax)),
                ]
            })
        })
        .flatten()
        .collect()
}

fn vat_node(root: &XmlNode) -> Option<&XmlNode> {
    root.child("kdv1")
        .or_else(|| root.child("kdv"))
        .or_else(|| root.children.iter().find(|c| c.name.to_lowercase().contains("kdv")))
}

fn vat_document(root: &XmlNode) -> Result<NormalizedDocument> {
    let info = extract_general_info(root);
    let vat = vat_node(root).ok_or(DeclarationError::MissingXmlSection("kdv"))?;

    let mut rows = Vec::new();
    if let Some(base) = vat.child("matrah") {
        for (names, section) in VAT_LISTS {
            rows.push(KdvRow::header(section.title()));
            for list in base.children_named(names) {
                rows.extend(vat_list_rows(list));
            }
        }

        let total = base
            .child_text("toplamMatrah")
            .or_else(|| base.child_text("matrahToplami"))
            .map(parse_xml_amount)
            .unwrap_or(0.0);
        rows.push(KdvRow::header(TAX_BASE_SUMMARY));
        rows.push(KdvRow::data("Matrah Toplamı", format_amount(total)));
    }

    if let Some(result) = vat.child("sonuc") {
        rows.push(KdvRow::header(KdvSection::Result.title()));
        for (tag, name) in [
            ("odenmesiGerekenKDV", "Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi"),
            ("sonrakiDonemeDevredenKDV", "Sonraki Döneme Devreden Katma Değer Vergisi"),
        ] {
            let value = parse_xml_amount(result.child_text(tag).unwrap_or(""));
            if value > 0.0 {
                rows.push(KdvRow::data(name, format_amount(value)));
            }
        }
    }

    info!("VAT XML parsed: {} rows for period {}", rows.len(), info.period);
    Ok(NormalizedDocument::new(
        info.tax_id,
        info.taxpayer_name,
        info.period,
        Payload::Kdv(KdvDeclaration {
            rows: reorder(&rows),
        }),
    ))
}

/// Applies the contra-account sign rule used by the text extractors.
fn signed(kind: ChartKind, code: &str, description: &str, columns: PeriodColumns) -> PeriodColumns {
    if kind.is_contra(code) || description.contains("(-)") {
        columns.negated()
    } else {
        columns
    }
}

fn income_statement_rows(tables: &XmlNode) -> Vec<LineItem> {
    let Some(statement) = tables.child("gelirTablosu") else {
        return Vec::new();
    };

    statement
        .children_named(&["kalem", "toplam"])
        .filter_map(|item| {
            let code = item.field("kod").unwrap_or("").to_string();
            let description = item
                .field("ad")
                .or_else(|| item.child_text("aciklama"))
                .unwrap_or("")
                .to_string();
            if code.is_empty() && description.is_empty() {
                return None;
            }

            let columns = PeriodColumns {
                prior: amount_field(item, "onceki"),
                current: amount_field(item, "cari"),
                inflation_adjusted: None,
            };
            let columns = signed(ChartKind::IncomeStatement, &code, &description, columns);
            Some(LineItem::new(code, description, columns))
        })
        .collect()
}

/// Amount in an attribute or child element; `None` when absent or blank.
fn amount_field(item: &XmlNode, name: &str) -> Option<f64> {
    item.field(name)
        .filter(|t| !t.trim().is_empty())
        .map(parse_xml_amount)
}

/// Element text, falling back to the `tutar` attribute when the text is
/// missing or zero.
fn item_amount(item: &XmlNode) -> Option<f64> {
    let from_text = item.trimmed_text().map(parse_xml_amount);
    match from_text {
        Some(value) if value != 0.0 => Some(value),
        _ => amount_field(item, "tutar").or(from_text),
    }
}

/// Rows of one balance-sheet side, plus its grand total when declared.
fn balance_sheet_side(side: &XmlNode) -> (Vec<LineItem>, Option<PeriodColumns>) {
    let mut rows = Vec::new();
    let mut total = None;

    for item in side.children_named(&["kalem", "grup", "toplam", "genelToplam"]) {
        let amount = item_amount(item);
        if item.name == "genelToplam" {
            total = Some(PeriodColumns {
                current: amount,
                ..PeriodColumns::default()
            });
            continue;
        }

        let code = item.attr("kod").unwrap_or("").to_string();
        let description = match (item.attr("ad"), code.is_empty()) {
            (Some(name), _) => name.to_string(),
            (None, false) => format!("Kalem {}", code),
            (None, true) => "Bilinmeyen".to_string(),
        };
        let columns = PeriodColumns {
            current: amount,
            ..PeriodColumns::default()
        };
        let columns = signed(ChartKind::BalanceSheet, &code, &description, columns);
        rows.push(LineItem::new(code, description, columns));
    }

    (rows, total)
}

/// Balance sheet and income statement carried by one corporate-tax XML.
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateStatements {
    pub balance_sheet: NormalizedDocument,
    pub income_statement: NormalizedDocument,
}

fn corporate_documents(root: &XmlNode) -> Result<CorporateStatements> {
    let info = extract_general_info(root);
    let tables = root
        .descendant("maliTablolar")
        .ok_or(DeclarationError::MissingXmlSection("maliTablolar"))?;

    let mut balance_sheet = BalanceSheet::default();
    if let Some(bilanco) = tables.child("bilanco") {
        for block in [BalanceSheetBlock::Aktif, BalanceSheetBlock::Pasif] {
            let tag = match block {
                BalanceSheetBlock::Aktif => "aktif",
                BalanceSheetBlock::Pasif => "pasif",
            };
            let Some(side) = bilanco.child(tag) else {
                debug!("Corporate XML has no {} side", tag);
                continue;
            };
            let (rows, total) = balance_sheet_side(side);
            match block {
                BalanceSheetBlock::Aktif => {
                    balance_sheet.aktif = rows;
                    balance_sheet.totals.aktif = total;
                }
                BalanceSheetBlock::Pasif => {
                    balance_sheet.pasif = rows;
                    balance_sheet.totals.pasif = total;
                }
            }
        }
    }

    let income_statement = IncomeStatement {
        rows: income_statement_rows(tables),
        has_inflation_column: false,
    };

    info!(
        "Corporate XML parsed: {} AKTİF, {} PASİF, {} income statement rows",
        balance_sheet.aktif.len(),
        balance_sheet.pasif.len(),
        income_statement.rows.len()
    );

    Ok(CorporateStatements {
        balance_sheet: NormalizedDocument::new(
            info.tax_id.clone(),
            info.taxpayer_name.clone(),
            info.period.clone(),
            Payload::Bilanco(balance_sheet),
        ),
        income_statement: NormalizedDocument::new(
            info.tax_id,
            info.taxpayer_name,
            info.period,
            Payload::Gelir(income_statement),
        ),
    })
}

pub fn parse_vat_xml(xml: &str) -> Result<NormalizedDocument> {
    vat_document(&read_tree(xml)?)
}

pub fn parse_corporate_xml(xml: &str) -> Result<CorporateStatements> {
    corporate_documents(&read_tree(xml)?)
}

/// Result of [`parse_xml`].
#[derive(Debug, Clone, PartialEq)]
pub enum XmlDeclaration {
    Vat(NormalizedDocument),
    Corporate(CorporateStatements),
}

impl XmlDeclaration {
    pub fn into_documents(self) -> Vec<NormalizedDocument> {
        match self {
            XmlDeclaration::Vat(doc) => vec![doc],
            XmlDeclaration::Corporate(statements) => {
                vec![statements.balance_sheet, statements.income_statement]
            }
        }
    }
}

/// Detects the declaration family and dispatches to the matching reader.
pub fn parse_xml(xml: &str) -> Result<XmlDeclaration> {
    let root = read_tree(xml)?;
    match detect_xml_kind(&root) {
        Some(XmlKind::Vat) => vat_document(&root).map(XmlDeclaration::Vat),
        Some(XmlKind::CorporateTax) => corporate_documents(&root).map(XmlDeclaration::Corporate),
        None => Err(DeclarationError::UnsupportedXml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentKind;

    const VAT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<beyanname xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="kdv_31.xsd">
  <genelBilgiler>
    <idari><yil>2024</yil><ay>3</ay></idari>
    <mukellef><vergiNo>1234567890</vergiNo><soyad>YILMAZ</soyad><ad>AHMET</ad></mukellef>
  </genelBilgiler>
  <kdv1>
    <matrah>
      <tevkifatUygulanmayanIslemler>
        <satir><tur>Teslim (%20)</tur><matrah>10000,00</matrah><vergi>2000,00</vergi></satir>
        <satir><tur>Sıfır</tur><matrah>0</matrah><vergi>0</vergi></satir>
      </tevkifatUygulanmayanIslemler>
      <toplamMatrah>10000,00</toplamMatrah>
    </matrah>
    <sonuc>
      <odenmesiGerekenKDV>500,00</odenmesiGerekenKDV>
      <sonrakiDonemeDevredenKDV>0</sonrakiDonemeDevredenKDV>
    </sonuc>
  </kdv1>
</beyanname>"#;

    const CORPORATE_XML: &str = r#"<beyanname>
  <genelBilgiler>
    <idari><yil>2023</yil></idari>
    <mukellef><vergiNo>9876543210</vergiNo><ticaretUnvani>ÖRNEK A.Ş.</ticaretUnvani></mukellef>
  </genelBilgiler>
  <kurumlarVergisi>
    <ekler>
      <maliTablolar>
        <bilanco>
          <aktif>
            <kalem kod="100" ad="Kasa">1.500,00</kalem>
            <kalem kod="103" ad="Verilen Çekler ve Ödeme Emirleri (-)" tutar="200,00"/>
            <genelToplam>1.300,00</genelToplam>
          </aktif>
          <pasif>
            <kalem kod="320">1.300,00</kalem>
            <kalem kod="331" ad="Ortaklara Borçlar"/>
          </pasif>
        </bilanco>
        <gelirTablosu>
          <kalem kod="600" ad="Yurtiçi Satışlar" cari="5000,00" onceki="4000,00"/>
          <kalem><kod>621</kod><ad>Satılan Ticari Mallar Maliyeti</ad><cari>3000,00</cari></kalem>
          <toplam ad="Dönem Net Karı veya Zararı" cari="2000,00"/>
        </gelirTablosu>
      </maliTablolar>
    </ekler>
  </kurumlarVergisi>
</beyanname>"#;

    #[test]
    fn test_read_tree() {
        let root = read_tree("<a x=\"1\"><b>text</b><c/></a>").unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.child_text("b"), Some("text"));
        assert!(root.child("c").is_some());
        assert!(read_tree("<a><b></a>").is_err());
    }

    #[test]
    fn test_vat_xml() {
        let doc = parse_vat_xml(VAT_XML).unwrap();
        assert_eq!(doc.kind, DocumentKind::Kdv);
        assert_eq!(doc.tax_id, "1234567890");
        assert_eq!(doc.taxpayer_name, "AHMET YILMAZ");
        assert_eq!(doc.period, "Mart / 2024");

        let rows = &doc.kdv().unwrap().rows;
        assert_eq!(rows[0], KdvRow::header("TEVKİFAT UYGULANMAYAN İŞLEMLER"));
        assert_eq!(rows[1], KdvRow::data("Teslim (%20) - Matrah", "10.000,00"));
        assert_eq!(rows[2], KdvRow::data("Teslim (%20) - Vergi", "2.000,00"));
        assert!(rows.contains(&KdvRow::data("Matrah Toplamı", "10.000,00")));
        assert!(rows.contains(&KdvRow::data(
            "Bu Dönemde Ödenmesi Gereken Katma Değer Vergisi",
            "500,00"
        )));
        assert!(!rows.iter().any(|r| r.field_name.starts_with("Sonraki")));
    }

    #[test]
    fn test_corporate_xml() {
        let statements = parse_corporate_xml(CORPORATE_XML).unwrap();
        let sheet = statements.balance_sheet.balance_sheet().unwrap();
        assert_eq!(statements.balance_sheet.period, "2023");
        assert_eq!(sheet.aktif.len(), 2);
        assert_eq!(sheet.aktif[1].current_period, Some(-200.0));
        assert_eq!(sheet.totals.aktif.unwrap().current, Some(1300.0));
        assert_eq!(sheet.pasif[0].description, "Kalem 320");
        assert_eq!(sheet.pasif[1].current_period, None);

        let statement = statements.income_statement.income_statement().unwrap();
        assert_eq!(statement.rows.len(), 3);
        assert_eq!(statement.rows[0].prior_period, Some(4000.0));
        assert_eq!(statement.rows[1].current_period, Some(-3000.0));
        assert_eq!(statement.rows[1].prior_period, None);
        assert_eq!(statement.rows[2].prior_period, None);
    }

    #[test]
    fn test_dispatch() {
        assert!(matches!(parse_xml(VAT_XML), Ok(XmlDeclaration::Vat(_))));
        let docs = parse_xml(CORPORATE_XML).unwrap().into_documents();
        assert_eq!(docs.len(), 2);
        assert!(matches!(
            parse_xml("<beyanname><baska/></beyanname>"),
            Err(DeclarationError::UnsupportedXml)
        ));
        assert!(matches!(
            parse_xml("<beyanname><kdv1/></beyanname>"),
            Ok(XmlDeclaration::Vat(_))
        ));
    }
}
