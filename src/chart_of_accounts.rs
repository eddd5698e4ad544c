//! Turkish Uniform Chart of Accounts (TDHP) registries and the description →
//! account-code resolver.

use crate::config::ExtractionConfig;
use crate::error::{DeclarationError, Result};
use crate::schema::BalanceSheetBlock;
use crate::utils::{normalize_description, similarity_ratio};
use log::debug;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ChartEntry {
    pub group: String,
    pub subgroup: String,
    pub code: String,
    pub canonical_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    BalanceSheet,
    IncomeStatement,
}

/// Contra and expense accounts whose values are always reported negative.
pub const BALANCE_SHEET_CONTRA_CODES: &[&str] = &[
    "103", "119", "122", "124", "129", "137", "139", "158", "199", "222", "224", "229", "237",
    "239", "241", "243", "244", "246", "247", "249", "257", "268", "278", "298", "299", "302",
    "308", "322", "337", "371", "402", "408", "422", "437", "501", "503", "580", "591",
];

pub const INCOME_STATEMENT_CONTRA_CODES: &[&str] = &[
    "610", "611", "612", "620", "621", "622", "623", "630", "631", "632", "653", "654", "655",
    "656", "657", "658", "659", "660", "661", "680", "681", "689", "690",
];

impl ChartKind {
    pub fn is_contra(&self, code: &str) -> bool {
        let codes = match self {
            ChartKind::BalanceSheet => BALANCE_SHEET_CONTRA_CODES,
            ChartKind::IncomeStatement => INCOME_STATEMENT_CONTRA_CODES,
        };
        codes.contains(&code)
    }
}

type RawChart = &'static [(&'static str, &'static [(&'static str, &'static [(&'static str, &'static str)])])];

const BALANCE_SHEET_CHART: RawChart = &[
    ("DÖNEN VARLIKLAR", &[
        ("Hazır Değerler", &[
            ("100", "Kasa"),
            ("101", "Alınan Çekler"),
            ("102", "Bankalar"),
            ("103", "Verilen Çekler ve Ödeme Emirleri (-)"),
            ("108", "Diğer Hazır Değerler"),
        ]),
        ("Menkul Kıymetler", &[
            ("110", "Hisse Senetleri"),
            ("111", "Özel Kesim Tahvil Senet ve Bonoları"),
            ("112", "Kamu Kesimi Tahvil Senet ve Bonoları"),
            ("118", "Diğer Menkul Kıymetler"),
            ("119", "Menkul Kıymetler Değer Düşüklüğü Karşılığı (-)"),
        ]),
        ("Ticari Alacaklar", &[
            ("120", "Alıcılar"),
            ("121", "Alacak Senetleri"),
            ("122", "Alacak Senetleri Reeskontu (-)"),
            ("124", "Kazanılmamış Finansal Kiralama Faiz Gelirleri (-)"),
            ("126", "Verilen Depozito ve Teminatlar"),
            ("127", "Diğer Ticari Alacaklar"),
            ("128", "Şüpheli Ticari Alacaklar"),
            ("129", "Şüpheli Ticari Alacaklar Karşılığı (-)"),
        ]),
        ("Diğer Alacaklar", &[
            ("131", "Ortaklardan Alacaklar"),
            ("132", "İştiraklerden Alacaklar"),
            ("133", "Bağlı Ortaklıklardan Alacaklar"),
            ("135", "Personelden Alacaklar"),
            ("136", "Diğer Çeşitli Alacaklar"),
            ("137", "Diğer Alacak Senetleri Reeskontu (-)"),
            ("138", "Şüpheli Diğer Alacaklar"),
            ("139", "Şüpheli Diğer Alacaklar Karşılığı (-)"),
        ]),
        ("Stoklar", &[
            ("150", "İlk Madde ve Malzeme"),
            ("151", "Yarı Mamuller"),
            ("152", "Mamuller"),
            ("153", "Ticari Mallar"),
            ("157", "Diğer Stoklar"),
            ("158", "Stok Değer Düşüklüğü Karşılığı (-)"),
            ("159", "Verilen Sipariş Avansları"),
        ]),
        ("Yıllara Yaygın İnşaat ve Onarım Maliyetleri", &[
            ("170", "Yıllara Yaygın İnşaat ve Onarım Maliyetleri"),
            ("178", "Yıllara Yaygın İnşaat Enflasyon Düzeltme Hesabı"),
            ("179", "Taşeronlara Verilen Avanslar"),
        ]),
        ("Gelecek Aylara Ait Giderler ve Gelir Tahakkukları", &[
            ("180", "Gelecek Aylara Ait Giderler"),
            ("181", "Gelir Tahakkukları"),
        ]),
        ("Diğer Dönen Varlıklar", &[
            ("190", "Devreden KDV"),
            ("191", "İndirilecek KDV"),
            ("192", "Diğer KDV"),
            ("193", "Peşin Ödenen Vergiler ve Fonlar"),
            ("195", "İş Avansları"),
            ("196", "Personel Avansları"),
            ("197", "Sayım ve Tesellüm Noksanları"),
            ("198", "Diğer Çeşitli Dönen Varlıklar"),
            ("199", "Diğer Dönen Varlıklar Karşılığı (-)"),
        ]),
    ]),
    ("DURAN VARLIKLAR", &[
        ("Ticari Alacaklar", &[
            ("220", "Alıcılar"),
            ("221", "Alacak Senetleri"),
            ("222", "Alacak Senetleri Reeskontu (-)"),
            ("224", "Kazanılmamış Finansal Kiralama Faiz Gelirleri (-)"),
            ("226", "Verilen Depozito ve Teminatlar"),
            ("229", "Şüpheli Alacaklar Karşılığı (-)"),
        ]),
        ("Diğer Alacaklar", &[
            ("231", "Ortaklardan Alacaklar"),
            ("232", "İştiraklerden Alacaklar"),
            ("233", "Bağlı Ortaklıklardan Alacaklar"),
            ("235", "Personelden Alacaklar"),
            ("236", "Diğer Çeşitli Alacaklar"),
            ("237", "Diğer Alacak Senetleri Reeskontu (-)"),
            ("239", "Şüpheli Diğer Alacaklar Karşılığı (-)"),
        ]),
        ("Mali Duran Varlıklar", &[
            ("240", "Bağlı Menkul Kıymetler"),
            ("241", "Bağlı Menkul Kıymetler Değer Düşüklüğü Karşılığı (-)"),
            ("242", "İştirakler"),
            ("243", "İştiraklere Sermaye Taahhütleri (-)"),
            ("244", "İştirakler Sermaye Payları Değer Düşüklüğü Karşılığı (-)"),
            ("245", "Bağlı Ortaklıklar"),
            ("246", "Bağlı Ortaklıklara Sermaye Taahhütleri (-)"),
            ("247", "Bağlı Ortaklıklar Sermaye Payları Değer Düşüklüğü Karşılığı (-)"),
            ("248", "Diğer Mali Duran Varlıklar"),
            ("249", "Diğer Mali Duran Varlıklar Karşılığı (-)"),
        ]),
        ("Maddi Duran Varlıklar", &[
            ("250", "Arazi ve Arsalar"),
            ("251", "Yeraltı ve Yerüstü Düzenleri"),
            ("252", "Binalar"),
            ("253", "Tesis Makine ve Cihazlar"),
            ("254", "Taşıtlar"),
            ("255", "Demirbaşlar"),
            ("256", "Diğer Maddi Duran Varlıklar"),
            ("257", "Birikmiş Amortismanlar (-)"),
            ("258", "Yapılmakta Olan Yatırımlar"),
            ("259", "Verilen Avanslar"),
        ]),
        ("Maddi Olmayan Duran Varlıklar", &[
            ("260", "Haklar"),
            ("261", "Şerefiye"),
            ("262", "Kuruluş ve Örgütlenme Giderleri"),
            ("263", "Araştırma ve Geliştirme Giderleri"),
            ("264", "Özel Maliyetler"),
            ("267", "Diğer Maddi Olmayan Duran Varlıklar"),
            ("268", "Birikmiş Amortismanlar (-)"),
            ("269", "Verilen Avanslar"),
        ]),
        ("Özel Tükenmeye Tabi Varlıklar", &[
            ("271", "Arama Giderleri"),
            ("272", "Hazırlık ve Geliştirme Giderleri"),
            ("277", "Diğer Özel Tükenmeye Tabi Varlıklar"),
            ("278", "Birikmiş Tükenme Payları (-)"),
            ("279", "Verilen Avanslar"),
        ]),
        ("Gelecek Yıllara Ait Giderler ve Gelir Tahakkukları", &[
            ("280", "Gelecek Yıllara Ait Giderler"),
            ("281", "Gelir Tahakkukları"),
        ]),
        ("Diğer Duran Varlıklar", &[
            ("291", "Gelecek Yıllarda İndirilecek KDV"),
            ("292", "Diğer KDV"),
            ("293", "Gelecek Yıllar İhtiyacı Stoklar"),
            ("294", "Elden Çıkarılacak Stoklar ve Maddi Duran Varlıklar"),
            ("295", "Peşin Ödenen Vergi ve Fonlar"),
            ("297", "Diğer Çeşitli Duran Varlıklar"),
            ("298", "Stok Değer Düşüklüğü Karşılığı (-)"),
            ("299", "Birikmiş Amortismanlar (-)"),
        ]),
    ]),
    ("KISA VADELİ YABANCI KAYNAKLAR", &[
        ("Mali Borçlar", &[
            ("300", "Banka Kredileri"),
            ("301", "Finansal Kiralama İşlemlerinden Borçlar"),
            ("302", "Ertelenmiş Finansal Kiralama Borçlanma Maliyetleri (-)"),
            ("303", "Uzun Vadeli Kredilerin Anapara Taksitleri ve Faizleri"),
            ("304", "Tahvil Anapara Borç Taksit ve Faizleri"),
            ("305", "Çıkarılmış Bonolar ve Senetler"),
            ("306", "Çıkarılmış Diğer Menkul Kıymetler"),
            ("308", "Menkul Kıymetler İhraç Farkı (-)"),
            ("309", "Diğer Mali Borçlar"),
        ]),
        ("Ticari Borçlar", &[
            ("320", "Satıcılar"),
            ("321", "Borç Senetleri"),
            ("322", "Borç Senetleri Reeskontu (-)"),
            ("326", "Alınan Depozito ve Teminatlar"),
            ("329", "Diğer Ticari Borçlar"),
        ]),
        ("Diğer Borçlar", &[
            ("331", "Ortaklara Borçlar"),
            ("332", "İştiraklere Borçlar"),
            ("333", "Bağlı Ortaklıklara Borçlar"),
            ("335", "Personele Borçlar"),
            ("336", "Diğer Çeşitli Borçlar"),
            ("337", "Diğer Borç Senetleri Reeskontu (-)"),
        ]),
        ("Alınan Avanslar", &[
            ("340", "Alınan Sipariş Avansları"),
            ("349", "Alınan Diğer Avanslar"),
        ]),
        ("Yıllara Yaygın İnşaat ve Onarım Hakedişleri", &[
            ("350", "Yıllara Yaygın İnşaat ve Onarım Hakediş Bedelleri"),
        ]),
        ("Ödenecek Vergi ve Diğer Yükümlülükler", &[
            ("360", "Ödenecek Vergi ve Fonlar"),
            ("361", "Ödenecek Sosyal Güvenlik Kesintileri"),
            ("368", "Vadesi Geçmiş Ertelenmiş veya Taksitlendirilmiş Vergi ve Diğer Yükümlülükler"),
            ("369", "Ödenecek Diğer Yükümlülükler"),
        ]),
        ("Borç ve Gider Karşılıkları", &[
            ("370", "Dönem Karı Vergi ve Diğer Yasal Yükümlülük Karşılıkları"),
            ("371", "Dönem Karının Peşin Ödenen Vergi ve Diğer Yükümlülükleri (-)"),
            ("372", "Kıdem Tazminatı Karşılığı"),
            ("373", "Maliyet Giderleri Karşılığı"),
            ("379", "Diğer Borç ve Gider Karşılıkları"),
        ]),
        ("Gelecek Aylara Ait Gelirler ve Gider Tahakkukları", &[
            ("380", "Gelecek Aylara Ait Gelirler"),
            ("381", "Gider Tahakkukları"),
        ]),
        ("Diğer Kısa Vadeli Yabancı Kaynaklar", &[
            ("391", "Hesaplanan KDV"),
            ("392", "Diğer KDV"),
            ("393", "Merkez ve Şubeler Cari Hesabı"),
            ("397", "Sayım ve Tesellüm Fazlaları"),
            ("399", "Diğer Çeşitli Yabancı Kaynaklar"),
        ]),
    ]),
    ("UZUN VADELİ YABANCI KAYNAKLAR", &[
        ("Mali Borçlar", &[
            ("400", "Banka Kredileri"),
            ("401", "Finansal Kiralama İşlemlerinden Borçlar"),
            ("402", "Ertelenmiş Finansal Kiralama Borçlanma Maliyetleri (-)"),
            ("405", "Çıkarılmış Tahviller"),
            ("407", "Çıkarılmış Diğer Menkul Kıymetler"),
            ("408", "Menkul Kıymetler İhraç Farkı (-)"),
            ("409", "Diğer Mali Borçlar"),
        ]),
        ("Ticari Borçlar", &[
            ("420", "Satıcılar"),
            ("421", "Borç Senetleri"),
            ("422", "Borç Senetleri Reeskontu (-)"),
            ("426", "Alınan Depozito ve Teminatlar"),
            ("429", "Diğer Ticari Borçlar"),
        ]),
        ("Diğer Borçlar", &[
            ("431", "Ortaklara Borçlar"),
            ("432", "İştiraklere Borçlar"),
            ("433", "Bağlı Ortaklıklara Borçlar"),
            ("436", "Diğer Çeşitli Borçlar"),
            ("437", "Diğer Borç Senetleri Reeskontu (-)"),
            ("438", "Kamuya Olan Ertelenmiş veya Taksitlendirilmiş Borçlar"),
        ]),
        ("Alınan Avanslar", &[
            ("440", "Alınan Sipariş Avansları"),
            ("449", "Alınan Diğer Avanslar"),
        ]),
        ("Borç ve Gider Karşılıkları", &[
            ("472", "Kıdem Tazminatı Karşılığı"),
            ("479", "Diğer Borç ve Gider Karşılıkları"),
        ]),
        ("Gelecek Yıllara Ait Gelirler ve Gider Tahakkukları", &[
            ("480", "Gelecek Yıllara Ait Gelirler"),
            ("481", "Gider Tahakkukları"),
        ]),
        ("Diğer Uzun Vadeli Yabancı Kaynaklar", &[
            ("492", "Gelecek Yıllara Ertelenmiş veya Terkin Edilecek KDV"),
            ("493", "Tesise Katılma Payları"),
            ("499", "Diğer Çeşitli Uzun Vadeli Yabancı Kaynaklar"),
        ]),
    ]),
    ("ÖZKAYNAKLAR", &[
        ("Ödenmiş Sermaye", &[
            ("500", "Sermaye"),
            ("501", "Ödenmemiş Sermaye (-)"),
            ("502", "Sermaye Düzeltmesi Olumlu Farkları"),
            ("503", "Sermaye Düzeltmesi Olumsuz Farkları (-)"),
        ]),
        ("Sermaye Yedekleri", &[
            ("520", "Hisse Senedi İhraç Primleri"),
            ("521", "Hisse Senedi İptal Karları"),
            ("522", "Maddi Duran Varlık Yeniden Değerleme Artışları"),
            ("523", "İştirakler Yeniden Değerleme Artışları"),
            ("529", "Diğer Sermaye Yedekleri"),
        ]),
        ("Kar Yedekleri", &[
            ("540", "Yasal Yedekler"),
            ("541", "Statü Yedekleri"),
            ("542", "Olağanüstü Yedekler"),
            ("548", "Diğer Kar Yedekleri"),
            ("549", "Özel Fonlar"),
        ]),
        ("Geçmiş Yıllar Karları", &[("570", "Geçmiş Yıllar Karları")]),
        ("Geçmiş Yıllar Zararları", &[("580", "Geçmiş Yıllar Zararları (-)")]),
        ("Dönem Net Karı (Zararı)", &[
            ("590", "Dönem Net Karı"),
            ("591", "Dönem Net Zararı (-)"),
        ]),
    ]),
];

const INCOME_STATEMENT_CHART: RawChart = &[
    ("BRÜT SATIŞLAR", &[(
        "Brüt Satışlar",
        &[
            ("600", "Yurtiçi Satışlar"),
            ("601", "Yurtdışı Satışlar"),
            ("602", "Diğer Gelirler"),
        ],
    )]),
    ("SATIŞ İNDİRİMLERİ", &[(
        "Satış İndirimleri (-)",
        &[
            ("610", "Satıştan İadeler (-)"),
            ("611", "Satış İskontoları (-)"),
            ("612", "Diğer İndirimler (-)"),
        ],
    )]),
    ("SATIŞLARIN MALİYETİ", &[(
        "Satışların Maliyeti (-)",
        &[
            ("620", "Satılan Mamuller Maliyeti (-)"),
            ("621", "Satılan Ticari Mallar Maliyeti (-)"),
            ("622", "Satılan Hizmet Maliyeti (-)"),
            ("623", "Diğer Satışların Maliyeti (-)"),
        ],
    )]),
    ("FAALİYET GİDERLERİ", &[(
        "Faaliyet Giderleri (-)",
        &[
            ("630", "Araştırma ve Geliştirme Giderleri (-)"),
            ("631", "Pazarlama Satış ve Dağıtım Giderleri (-)"),
            ("632", "Genel Yönetim Giderleri (-)"),
        ],
    )]),
    ("DİĞER FAALİYETLERDEN OLAĞAN GELİR VE KARLAR", &[(
        "Diğer Faaliyetlerden Olağan Gelir ve Karlar",
        &[
            ("640", "İştiraklerden Temettü Gelirleri"),
            ("641", "Bağlı Ortaklıklardan Temettü Gelirleri"),
            ("642", "Faiz Gelirleri"),
            ("643", "Komisyon Gelirleri"),
            ("644", "Konusu Kalmayan Karşılıklar"),
            ("645", "Menkul Kıymet Satış Karları"),
            ("646", "Kambiyo Karları"),
            ("647", "Reeskont Faiz Gelirleri"),
            ("648", "Enflasyon Düzeltmesi Karları"),
            ("649", "Diğer Olağan Gelir ve Karlar"),
        ],
    )]),
    ("DİĞER FAALİYETLERDEN OLAĞAN GİDER VE ZARARLAR", &[(
        "Diğer Faaliyetlerden Olağan Gider ve Zararlar (-)",
        &[
            ("653", "Komisyon Giderleri (-)"),
            ("654", "Karşılık Giderleri (-)"),
            ("655", "Menkul Kıymet Satış Zararları (-)"),
            ("656", "Kambiyo Zararları (-)"),
            ("657", "Reeskont Faiz Giderleri (-)"),
            ("658", "Enflasyon Düzeltmesi Zararları (-)"),
            ("659", "Diğer Olağan Gider ve Zararlar (-)"),
        ],
    )]),
    ("FİNANSMAN GİDERLERİ", &[(
        "Finansman Giderleri (-)",
        &[
            ("660", "Kısa Vadeli Borçlanma Giderleri (-)"),
            ("661", "Uzun Vadeli Borçlanma Giderleri (-)"),
        ],
    )]),
    ("OLAĞANDIŞI GELİR VE KARLAR", &[(
        "Olağandışı Gelir ve Karlar",
        &[
            ("671", "Önceki Dönem Gelir ve Karları"),
            ("679", "Diğer Olağandışı Gelir ve Karlar"),
        ],
    )]),
    ("OLAĞANDIŞI GİDER VE ZARARLAR", &[(
        "Olağandışı Gider ve Zararlar (-)",
        &[
            ("680", "Çalışmayan Kısım Gider ve Zararları (-)"),
            ("681", "Önceki Dönem Gider ve Zararları (-)"),
            ("689", "Diğer Olağandışı Gider ve Zararlar (-)"),
        ],
    )]),
    ("DÖNEM NET KARI VEYA ZARARI", &[(
        "Dönem Net Karı veya Zararı",
        &[
            ("690", "Dönem Karı Vergi ve Diğer Yasal Yükümlülük Karşılıkları (-)"),
            ("692", "Dönem Net Karı veya Zararı"),
        ],
    )]),
];

fn flatten(raw: RawChart) -> Vec<ChartEntry> {
    raw.iter()
        .flat_map(|(group, subgroups)| {
            subgroups.iter().flat_map(move |(subgroup, accounts)| {
                accounts.iter().map(move |(code, description)| ChartEntry {
                    group: group.to_string(),
                    subgroup: subgroup.to_string(),
                    code: code.to_string(),
                    canonical_description: description.to_string(),
                })
            })
        })
        .collect()
}

static BALANCE_SHEET_REGISTRY: LazyLock<ChartRegistry> =
    LazyLock::new(|| ChartRegistry::from_entries_unchecked(flatten(BALANCE_SHEET_CHART)));

static INCOME_STATEMENT_REGISTRY: LazyLock<ChartRegistry> =
    LazyLock::new(|| ChartRegistry::from_entries_unchecked(flatten(INCOME_STATEMENT_CHART)));

/// An immutable chart-of-accounts registry with descriptions pre-normalized
/// for matching.
#[derive(Debug, Clone)]
pub struct ChartRegistry {
    entries: Vec<ChartEntry>,
    normalized: Vec<String>,
}

impl ChartRegistry {
    pub fn balance_sheet() -> &'static ChartRegistry {
        &BALANCE_SHEET_REGISTRY
    }

    pub fn income_statement() -> &'static ChartRegistry {
        &INCOME_STATEMENT_REGISTRY
    }

    pub fn default_for(kind: ChartKind) -> &'static ChartRegistry {
        match kind {
            ChartKind::BalanceSheet => Self::balance_sheet(),
            ChartKind::IncomeStatement => Self::income_statement(),
        }
    }

    pub fn new(entries: Vec<ChartEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let code_ok = (1..=3).contains(&entry.code.len())
                && entry.code.chars().all(|c| c.is_ascii_digit());
            if !code_ok {
                return Err(DeclarationError::InvalidRegistry(format!(
                    "account code '{}' must be 1-3 digits",
                    entry.code
                )));
            }
            if entry.canonical_description.trim().is_empty() {
                return Err(DeclarationError::InvalidRegistry(format!(
                    "account {} has an empty description",
                    entry.code
                )));
            }
            if !seen.insert(entry.code.as_str()) {
                return Err(DeclarationError::InvalidRegistry(format!(
                    "duplicate account code {}",
                    entry.code
                )));
            }
        }
        Ok(Self::from_entries_unchecked(entries))
    }

    /// Loads a registry from a JSON array of [`ChartEntry`] values.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<ChartEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    fn from_entries_unchecked(entries: Vec<ChartEntry>) -> Self {
        let normalized = entries
            .iter()
            .map(|e| normalize_description(&e.canonical_description))
            .collect();
        Self { entries, normalized }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn entries(&self) -> &[ChartEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&ChartEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    /// Maps a heading's text ("A. Hazır Değerler", "II. DURAN VARLIKLAR") to a
    /// group or subgroup name carried by the registry.
    pub fn group_hint(&self, heading: &str) -> Option<GroupHint> {
        let text = normalize_description(strip_heading_marker(heading));
        if text.is_empty() {
            return None;
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| normalize_description(&e.group) == text)
        {
            return Some(GroupHint::Group(entry.group.clone()));
        }

        self.entries
            .iter()
            .find(|e| normalize_description(&e.subgroup) == text)
            .map(|entry| GroupHint::Subgroup(entry.subgroup.clone()))
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let mut current_group = "";
        let mut current_subgroup = "";

        for entry in &self.entries {
            if entry.group != current_group {
                md.push_str(&format!("\n## {}\n", entry.group));
                current_group = &entry.group;
                current_subgroup = "";
            }
            if entry.subgroup != current_subgroup {
                md.push_str(&format!("\n### {}\n\n", entry.subgroup));
                current_subgroup = &entry.subgroup;
            }
            md.push_str(&format!("- `{}` {}\n", entry.code, entry.canonical_description));
        }

        md
    }
}

/// The registry group named by the most recent heading row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupHint {
    Group(String),
    Subgroup(String),
}

/// Tracks the enclosing group and subgroup while walking a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentGroup {
    pub group: Option<String>,
    pub subgroup: Option<String>,
}

impl ParentGroup {
    pub fn apply(&mut self, hint: GroupHint) {
        match hint {
            GroupHint::Group(group) => {
                self.group = Some(group);
                self.subgroup = None;
            }
            GroupHint::Subgroup(subgroup) => self.subgroup = Some(subgroup),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_none() && self.subgroup.is_none()
    }
}

static LEADING_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3})(?:\s*[.\-]\s*|\s+)[^\d\s]").expect("valid leading code regex")
});

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[A-ZÇĞİÖŞÜ]|[IVXLCDM]+)\.\s*[\p{L}\s\-(),'/&]+$")
        .expect("valid heading regex")
});

static HEADING_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[A-ZÇĞİÖŞÜ]|[IVXLCDM]+)\.\s*").expect("valid heading marker regex")
});

pub fn is_heading(description: &str) -> bool {
    HEADING_RE.is_match(description)
}

pub fn strip_heading_marker(text: &str) -> &str {
    match HEADING_MARKER_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Everything a resolver rule may consult besides the description itself.
pub struct ResolveContext<'a> {
    pub candidates: Vec<(&'a ChartEntry, &'a str)>,
    pub cutoff: f64,
    pub length_window: usize,
}

/// A resolver rule: `Some(code)` ends resolution (an empty code is a valid
/// answer), `None` falls through to the next rule.
pub type ResolverRule = fn(&str, &ResolveContext) -> Option<String>;

pub const RESOLVER_RULES: &[(&str, ResolverRule)] = &[
    ("leading_code", leading_code_rule),
    ("heading", heading_rule),
    ("containment", containment_rule),
    ("fuzzy", fuzzy_rule),
];

pub fn leading_code_rule(description: &str, _ctx: &ResolveContext) -> Option<String> {
    LEADING_CODE_RE
        .captures(description)
        .map(|caps| caps[1].to_string())
}

pub fn heading_rule(description: &str, _ctx: &ResolveContext) -> Option<String> {
    is_heading(description).then(String::new)
}

pub fn containment_rule(description: &str, ctx: &ResolveContext) -> Option<String> {
    let needle = normalize_description(description);
    if needle.is_empty() {
        return None;
    }

    if let Some((entry, _)) = ctx.candidates.iter().find(|(_, norm)| *norm == needle) {
        return Some(entry.code.clone());
    }

    // The longest registry description found inside the line wins, then the
    // shortest registry description that contains the whole line.
    let within = ctx
        .candidates
        .iter()
        .filter(|(_, norm)| !norm.is_empty() && contains_words(&needle, norm))
        .max_by_key(|(_, norm)| norm.len());
    if let Some((entry, _)) = within {
        return Some(entry.code.clone());
    }

    ctx.candidates
        .iter()
        .filter(|(_, norm)| contains_words(norm, &needle))
        .min_by_key(|(_, norm)| norm.len())
        .map(|(entry, _)| entry.code.clone())
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    let padded_hay = format!(" {} ", haystack);
    let padded_needle = format!(" {} ", needle);
    padded_hay.contains(&padded_needle)
}

pub fn fuzzy_rule(description: &str, ctx: &ResolveContext) -> Option<String> {
    let needle = normalize_description(description);
    if needle.is_empty() {
        return None;
    }
    let needle_len = needle.chars().count();

    let mut best: Option<(&ChartEntry, f64)> = None;
    for (entry, norm) in &ctx.candidates {
        if norm.chars().count().abs_diff(needle_len) > ctx.length_window {
            continue;
        }
        let score = similarity_ratio(&needle, norm);
        if score > ctx.cutoff && best.map_or(true, |(_, s)| score > s) {
            best = Some((*entry, score));
        }
    }

    best.map(|(entry, score)| {
        debug!(
            "Fuzzy matched '{}' to {} '{}' (score {:.2})",
            description, entry.code, entry.canonical_description, score
        );
        entry.code.clone()
    })
}

/// Resolves free-text line descriptions to account codes against one registry.
pub struct AccountResolver<'a> {
    registry: &'a ChartRegistry,
    cutoff: f64,
    length_window: usize,
}

impl<'a> AccountResolver<'a> {
    pub fn new(registry: &'a ChartRegistry, cutoff: f64, length_window: usize) -> Self {
        Self {
            registry,
            cutoff,
            length_window,
        }
    }

    pub fn for_balance_sheet(registry: &'a ChartRegistry, config: &ExtractionConfig) -> Self {
        Self::new(registry, config.balance_sheet_cutoff, config.length_window)
    }

    pub fn for_income_statement(registry: &'a ChartRegistry, config: &ExtractionConfig) -> Self {
        Self::new(registry, config.income_statement_cutoff, config.length_window)
    }

    pub fn registry(&self) -> &'a ChartRegistry {
        self.registry
    }

    /// Returns the account code for `description`, or an empty string when
    /// the line is a heading or nothing in scope matches.
    pub fn resolve(
        &self,
        description: &str,
        block: Option<BalanceSheetBlock>,
        parent: Option<&ParentGroup>,
    ) -> String {
        let ctx = ResolveContext {
            candidates: self.candidates(block, parent),
            cutoff: self.cutoff,
            length_window: self.length_window,
        };

        for (name, rule) in RESOLVER_RULES {
            if let Some(code) = rule(description, &ctx) {
                debug!("Resolved '{}' via {} rule -> '{}'", description, name, code);
                return code;
            }
        }

        debug!("No account code for '{}'", description);
        String::new()
    }

    fn candidates(
        &self,
        block: Option<BalanceSheetBlock>,
        parent: Option<&ParentGroup>,
    ) -> Vec<(&'a ChartEntry, &'a str)> {
        let in_block: Vec<(&'a ChartEntry, &'a str)> = self
            .registry
            .entries
            .iter()
            .zip(self.registry.normalized.iter().map(String::as_str))
            .filter(|(entry, _)| match block {
                Some(block) => entry
                    .code
                    .chars()
                    .next()
                    .is_some_and(|c| block.code_classes().contains(&c)),
                None => true,
            })
            .collect();

        let Some(parent) = parent.filter(|p| !p.is_empty()) else {
            return in_block;
        };

        let scoped: Vec<_> = in_block
            .iter()
            .copied()
            .filter(|(entry, _)| {
                parent.group.as_ref().map_or(true, |g| &entry.group == g)
                    && parent.subgroup.as_ref().map_or(true, |s| &entry.subgroup == s)
            })
            .collect();
        if !scoped.is_empty() {
            return scoped;
        }

        if let Some(group) = &parent.group {
            let by_group: Vec<_> = in_block
                .iter()
                .copied()
                .filter(|(entry, _)| &entry.group == group)
                .collect();
            if !by_group.is_empty() {
                return by_group;
            }
        }

        in_block
    }
}
