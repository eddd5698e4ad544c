//! The ratio catalogue: formulas, thresholds and Turkish commentary.

use super::aggregate::DerivedFigures;
use super::FinancialStatements;
use crate::config::MarketInputs;
use crate::error::{DeclarationError, Result};
use crate::schema::ReportingPeriod;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioCategory {
    #[schemars(description = "Likidite oranları")]
    Liquidity,
    #[schemars(description = "Finansal yapı oranları")]
    Structure,
    #[schemars(description = "Varlık kullanım (devir hızı) oranları")]
    Activity,
    #[schemars(description = "Kârlılık oranları")]
    Profitability,
    #[schemars(description = "Borsa performans oranları")]
    Market,
}

impl RatioCategory {
    pub const ALL: [RatioCategory; 5] = [
        RatioCategory::Liquidity,
        RatioCategory::Structure,
        RatioCategory::Activity,
        RatioCategory::Profitability,
        RatioCategory::Market,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RatioCategory::Liquidity => "likidite",
            RatioCategory::Structure => "yapi",
            RatioCategory::Activity => "varlik",
            RatioCategory::Profitability => "karlilik",
            RatioCategory::Market => "borsa",
        }
    }

    /// Resolves a category key; "tümü", "tum" and "all" select every category.
    pub fn select(key: &str) -> Result<Vec<RatioCategory>> {
        let key = key.trim().to_lowercase();
        if matches!(key.as_str(), "tümü" | "tum" | "all") {
            return Ok(Self::ALL.to_vec());
        }
        Self::ALL
            .iter()
            .find(|c| c.key() == key)
            .map(|c| vec![*c])
            .ok_or_else(|| DeclarationError::InvalidConfig {
                field: "category",
                details: format!("unknown ratio category '{}'", key),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Safe,
    Adequate,
    Risky,
    Undefined,
}

impl Classification {
    /// Level wording used in narratives.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Safe => "güvende",
            Classification::Adequate => "yeterli",
            Classification::Risky => "riskli",
            Classification::Undefined => "tanımsız",
        }
    }
}

/// A (safe, adequate) pair: `value >= safe` is safe, `value >= adequate` is
/// adequate, anything below is risky. The same comparison holds for every
/// ratio, whichever of the two bounds is larger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Thresholds {
    pub safe: f64,
    pub adequate: f64,
}

impl Thresholds {
    pub const fn new(safe: f64, adequate: f64) -> Self {
        Self { safe, adequate }
    }

    pub fn classify(&self, value: f64) -> Classification {
        if value >= self.safe {
            Classification::Safe
        } else if value >= self.adequate {
            Classification::Adequate
        } else {
            Classification::Risky
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Advice {
    pub safe: &'static str,
    pub adequate: &'static str,
    pub risky: &'static str,
}

impl Advice {
    pub fn for_level(&self, level: Classification) -> Option<&'static str> {
        match level {
            Classification::Safe => Some(self.safe),
            Classification::Adequate => Some(self.adequate),
            Classification::Risky => Some(self.risky),
            Classification::Undefined => None,
        }
    }
}

type Formula = fn(&DerivedFigures, &MarketInputs) -> Option<f64>;

pub struct RatioDefinition {
    pub name: &'static str,
    pub category: RatioCategory,
    pub formula_text: &'static str,
    pub meaning: &'static str,
    pub thresholds: Option<Thresholds>,
    pub advice: Advice,
    compute: Formula,
}

impl RatioDefinition {
    /// Value rounded to two decimals; `None` when a denominator is zero or an
    /// input is missing.
    pub fn evaluate(&self, figures: &DerivedFigures, market: &MarketInputs) -> Option<f64> {
        (self.compute)(figures, market).filter(|v| v.is_finite()).map(round2)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn div(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}

fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    div(numerator, denominator).map(|v| v * 100.0)
}

fn earnings_per_share(f: &DerivedFigures, m: &MarketInputs) -> Option<f64> {
    m.share_price?;
    let count = m.share_count.filter(|c| *c != 0.0)?;
    Some(round2(f.net_profit / count))
}

pub static RATIO_CATALOGUE: &[RatioDefinition] = &[
    RatioDefinition {
        name: "Cari Oran",
        category: RatioCategory::Liquidity,
        formula_text: "Dönen Varlıklar / Kısa Vadeli Yabancı Kaynaklar",
        meaning: "Cari oran, işletmenin kısa vadeli yükümlülüklerini yerine getirebilme kapasitesini gösteren temel likidite ölçütüdür. \
            2 civarı değerler, işletmenin finansal istikrarı için uygun kabul edilir. \
            Dönen varlıklar (nakit, menkul kıymetler, ticari alacaklar, stoklar vb.) kısa vadeli borçları karşılamakta kullanılır. \
            Yüksek bir cari oran, finansal esnekliği ve borç ödeme güvenini artırırken; çok yüksek oranlar, gereksiz sermaye bağlandığını gösterir.",
        thresholds: Some(Thresholds::new(2.0, 1.5)),
        advice: Advice {
            safe: "Cari oranınız 2’nin üzerinde, bu da kısa vadeli borçlarınızın kolaylıkla karşılanabileceğini gösterir. \
                Fazla sermaye bağlanmasını önlemek için stok ve alacak yönetimini optimize edin ve kısa vadeli fazla nakitinizi yatırım araçlarında değerlendirin.",
            adequate: "Cari oranınız makul seviyede ancak ideal eşiğe (2:1) ulaşabilmek için alacak tahsil süreçlerini hızlandırın, \
                stok devir hızını artırın ve gereksiz giderleri kontrol edin.",
            risky: "Cari oranınız 1,5’in altında; borç ödeme kapasiteniz sınırlı. Likiditeyi artırmak için nakit akış planlaması yapın, \
                stok döngüsünü hızlandırın ve acil ödeme planları oluşturun.",
        },
        compute: |f, _| div(f.current_assets, f.short_term_liabilities),
    },
    RatioDefinition {
        name: "Likidite (Asit Test) Oranı",
        category: RatioCategory::Liquidity,
        formula_text: "(Dönen Varlıklar - Stoklar) / Kısa Vadeli Yabancı Kaynaklar",
        meaning: "Asit test oranı, stokların paraya çevrilme gecikmesini hesaba katarak net likidite gücünü ölçer. \
            Stok dışı dönen varlıklarınızın (nakit, menkul kıymetler, alacaklar vb.) kısa vadeli borçlara oranı, \
            ani nakit ihtiyaçlarında dayanıklılığınızı gösterir.",
        thresholds: Some(Thresholds::new(1.0, 0.8)),
        advice: Advice {
            safe: "Asit test oranınız 1’in üzerinde; stoklarınız olmasa da borçlarınızı karşılayacak yeterli likit varlık bulunduruyorsunuz. \
                Ani nakit ihtiyaçlarınızda rahat hareket edebilirsiniz.",
            adequate: "Asit test oranınız 0,8–1,0 arasında. Kritik durumlar için nakit rezervinizi güçlendirin, \
                alacak tahsilatlarını hızlandırın ve stok yönetimini gözden geçirin.",
            risky: "Asit test oranınız 0,8’in altında; stoklara bağımlılığınız yüksek. Nakit yönetimi süreçlerinizi iyileştirin \
                ve acil borç ödeme planları oluşturun.",
        },
        compute: |f, _| div(f.current_assets - f.inventories.abs(), f.short_term_liabilities),
    },
    RatioDefinition {
        name: "Nakit Oranı",
        category: RatioCategory::Liquidity,
        formula_text: "(Hazır Değerler + Menkul Kıymetler) / Kısa Vadeli Yabancı Kaynaklar",
        meaning: "Nakit oranı, hemen kullanılabilir finansal varlıklarınızın (kasa nakti, mevduat ve kısa vadeli menkul kıymetler) \
            kısa vadeli borçlara oranını gösterir. Ani nakit ihtiyacında dayanıklılığınızı en net biçimde yansıtır.",
        thresholds: Some(Thresholds::new(0.20, 0.15)),
        advice: Advice {
            safe: "Nakit oranınız %20’nin üzerinde; bu da borçlarınızın önemli bir kısmını doğrudan nakit rezervinizle karşılayabileceğiniz anlamına gelir.",
            adequate: "Nakit oranınız %15–20 aralığında. Ani finansman ihtiyaçlarınızı güvence altına almak için nakit dengenizi korumaya özen gösterin.",
            risky: "Nakit oranınız %15’in altında; borçlarınızda zorluk yaşama riskiniz var. Nakit akış planlaması yapın ve gereksiz harcamaları kısıtlayın.",
        },
        compute: |f, _| div(f.cash + f.securities, f.short_term_liabilities),
    },
    RatioDefinition {
        name: "Stok Bağımlılık Oranı",
        category: RatioCategory::Liquidity,
        formula_text: "(KVYK - (Hazır Değerler + Menkul Kıymetler + Ticari Alacaklar)) / Stoklar",
        meaning: "Stok bağımlılık oranı, kısa vadeli borçlarınızın ne kadarının stokla finanse edildiğini gösterir. \
            Düşük bir oran, stok dışı varlıklarla borç ödeme gücünüzü ortaya koyar.",
        thresholds: Some(Thresholds::new(0.0, 0.5)),
        advice: Advice {
            safe: "Stok bağımlılık oranınız 0’a yakın; borçlarınız stok dışı varlıklarla karşılanıyor. \
                Bu, stok yönetiminde verimliliğinizin yüksek olduğunu gösterir.",
            adequate: "Stok bağımlılık oranınız 0,5’in altında. Stok döngüsünü hızlandırarak bu oranı daha da düşürebilirsiniz.",
            risky: "Stok bağımlılık oranınız 0,5’in üzerinde; borç ödeme gücünüz stoklara bağlı. \
                Alacak ve stok yönetimini iyileştirerek riski azaltın.",
        },
        compute: |f, _| {
            div(
                f.short_term_liabilities - (f.cash + f.securities + f.trade_receivables),
                f.inventories.abs(),
            )
        },
    },
    RatioDefinition {
        name: "Yabancı Kaynak Oranı",
        category: RatioCategory::Structure,
        formula_text: "Toplam Yabancı Kaynaklar / Pasif Toplamı",
        meaning: "Yabancı kaynak oranı, varlıklarınızın ne kadarını borçlarla finanse ettiğinizi gösterir. \
            Yüksek bir oran finansman maliyetinizi ve riskinizi artırırken; dengeli bir yapı, sermaye maliyetinizi düşürür.",
        thresholds: Some(Thresholds::new(0.50, 0.60)),
        advice: Advice {
            safe: "Yabancı kaynak oranınız %50’nin altında; bu da borçlanma seviyenizin makul olduğunu ve özsermaye yapınızın sağlam kaldığını gösterir.",
            adequate: "Yabancı kaynak oranınız %50–60 arasında. Borçlanma stratejinizi gözden geçirerek uzun vadeli sabit kaynaklara ağırlık verin.",
            risky: "Yabancı kaynak oranınız %60’ın üzerinde; borçluluk seviyeniz yüksek. Faiz ve vade riskinizi azaltmak için \
                borç yapılandırma ve özkaynak artırımı seçeneklerini değerlendirin.",
        },
        compute: |f, _| div(f.total_liabilities, f.total_assets),
    },
    RatioDefinition {
        name: "Özkaynak Oranı",
        category: RatioCategory::Structure,
        formula_text: "Özkaynaklar / Pasif Toplamı",
        meaning: "Özkaynak oranı, varlıklarınızın ne kadarının hissedar sermayesiyle finanse edildiğini gösterir. \
            Yüksek oran, finansal istikrar ve büyüme esnekliği sağlar.",
        thresholds: Some(Thresholds::new(0.50, 0.30)),
        advice: Advice {
            safe: "Özkaynak oranınız %50’nin üzerinde; güçlü bir sermaye yapısına sahipsiniz ve dış finansman maliyetlerinizi düşürebilirsiniz.",
            adequate: "Özkaynak oranınız %30–50 aralığında. Daha sağlıklı bir finansman yapısı için kârlılığınızı artırarak özkaynak birikimini destekleyin.",
            risky: "Özkaynak oranınız %30’un altında; borç ağırlıklı bir finansman yapınız var. Sermaye artırımı, \
                hisse geri alımı stratejileri veya kârlılık iyileştirmeleriyle özkaynağı güçlendirin.",
        },
        compute: |f, _| div(f.equity, f.total_assets),
    },
    RatioDefinition {
        name: "Borç/Özsermaye Oranı",
        category: RatioCategory::Structure,
        formula_text: "Toplam Yabancı Kaynaklar / Özkaynaklar",
        meaning: "Borç/özkaynak oranı, işletmenin finansman kalitesini gösterir. 1:1 ile 2:1 arası dengeli kabul edilirken, \
            daha yüksek oranlar risk iştahını artırır.",
        thresholds: Some(Thresholds::new(1.0, 1.5)),
        advice: Advice {
            safe: "Borç/özkaynak oranınız 1’in altında; bu durum borç kullanımınızın makul olduğunu ve finansal riskinizin düşük kaldığını gösterir.",
            adequate: "Borç/özkaynak oranınız 1–1,5 aralığında. Finansman maliyetlerinizi optimize etmek için borç vadelerini uzun vadeye taşıyabilirsiniz.",
            risky: "Borç/özkaynak oranınız 1,5’in üzerinde; borç yükünüz ağırlık kazanıyor. \
                Faiz giderlerinizi ve geri ödeme tarihlerinizi yeniden yapılandırmayı düşünün.",
        },
        compute: |f, _| div(f.total_liabilities, f.equity),
    },
    RatioDefinition {
        name: "Kısa Vadeli Yabancı Kaynak Oranı",
        category: RatioCategory::Structure,
        formula_text: "KVYK / Pasif Toplamı",
        meaning: "Kısa vadeli yabancı kaynak oranı, toplam finansmanın kısa vadeli borçlarla ne kadar finanse edildiğini gösterir. \
            Yüksek oran nakit akış baskısını artırır.",
        thresholds: Some(Thresholds::new(0.33, 0.50)),
        advice: Advice {
            safe: "Kısa vadeli yabancı kaynak oranınız %33’ün altında; borç vade yapınız dengeli ve nakit baskısı düşük.",
            adequate: "Kısa vadeli yabancı kaynak oranınız %33–50 aralığında. Vadeleri uzatarak likidite riskinizi azaltın.",
            risky: "Kısa vadeli yabancı kaynak oranınız %50’nin üzerinde; ani nakit çıkışlarında zorlanabilirsiniz. \
                Borç vadelerini uzun vadeye kaydırın.",
        },
        compute: |f, _| div(f.short_term_liabilities, f.total_assets),
    },
    RatioDefinition {
        name: "Uzun Vadeli Yabancı Kaynak Oranı",
        category: RatioCategory::Structure,
        formula_text: "UVYK / Pasif Toplamı",
        meaning: "Uzun vadeli yabancı kaynak oranı, toplam finansmanın ne kadarının uzun vadeli borçlarla finanse edildiğini gösterir. \
            İdeal oran yaklaşık %17 civarındadır.",
        thresholds: Some(Thresholds::new(0.17, 0.30)),
        advice: Advice {
            safe: "Uzun vadeli yabancı kaynak oranınız %17’nin altında; borçlarınız dengeli vadede ve vade baskınız düşük.",
            adequate: "Uzun vadeli yabancı kaynak oranınız %17–30 aralığında. Daha istikrarlı nakit akış yönetimi için uzun vadeli kredilerden yararlanın.",
            risky: "Uzun vadeli yabancı kaynak oranınız %30’un üzerinde; uzun vadeli yükümlülükleriniz maliyetli olabilir. \
                Vade uyum stratejileri geliştirin.",
        },
        compute: |f, _| div(f.long_term_liabilities, f.total_assets),
    },
    RatioDefinition {
        name: "Yabancı Kaynaklar Vade Yapısı Oranı",
        category: RatioCategory::Structure,
        formula_text: "KVYK / Toplam Yabancı Kaynaklar",
        meaning: "Vade yapısı oranı, toplam borç içindeki kısa vadeli payı ölçer. \
            Yaklaşık %66 kısa, %34 uzun vadeli denge oldukça sağlıklıdır.",
        thresholds: Some(Thresholds::new(0.66, 0.80)),
        advice: Advice {
            safe: "Vade yapısı oranınız yaklaşık %66; bu denge kısa ve uzun vadeli yükümlülüklerde standarttır.",
            adequate: "Vade yapısı oranınız %66–80 arasında. Kısa vade payını azaltmak için uzun vadeli kaynaklara yönelin.",
            risky: "Vade yapısı oranınız %80’in üstünde; nakit akış baskınız artabilir. Kısa vade borçları uzatarak dengeyi sağlayın.",
        },
        compute: |f, _| div(f.short_term_liabilities, f.total_liabilities),
    },
    RatioDefinition {
        name: "Alacak Devir Hızı",
        category: RatioCategory::Activity,
        formula_text: "Net Satışlar / Ortalama Ticari Alacaklar",
        meaning: "Alacak devir hızı, alacaklarınızın yılda kaç kez tahsil edildiğini gösterir. \
            Yüksek hız, etkin tahsilat süreçlerine işaret eder.",
        thresholds: Some(Thresholds::new(6.0, 4.0)),
        advice: Advice {
            safe: "Alacak devir hızınız 6’nın üzerinde; tahsilat süreçleriniz verimli işliyor ve likiditeniz güçlü.",
            adequate: "Alacak devir hızınız 4–6 aralığında. Tahsilat prosedürlerinizi hızlandırıp vade sürelerini kısaltarak bu hızı artırabilirsiniz.",
            risky: "Alacak devir hızınız 4’ün altında; alacak tahsilat süreçlerinizi yeniden yapılandırın ve erken tahsilat teşvikleri sunun.",
        },
        compute: |f, _| div(f.net_sales, f.trade_receivables),
    },
    RatioDefinition {
        name: "Stok Devir Hızı",
        category: RatioCategory::Activity,
        formula_text: "Satışların Maliyeti / Ortalama Stoklar",
        meaning: "Stok devir hızı, stoklarınızın yılda kaç kez satıldığını gösterir. \
            Yüksek devir hızı, verimli stok yönetimine işaret eder.",
        thresholds: Some(Thresholds::new(8.0, 5.0)),
        advice: Advice {
            safe: "Stok devir hızınız 8’in üzerinde; stoklarınızı hızlı satarak işletme sermayesini etkin kullanıyorsunuz.",
            adequate: "Stok devir hızınız 5–8 aralığında. Talep tahminlerinizi iyileştirerek ve stok güvenlik seviyelerini optimize ederek hızı artırabilirsiniz.",
            risky: "Stok devir hızınız 5’in altında; stok maliyetleriniz yüksek. Hasara uğrayan veya modası geçen ürünleri azaltın \
                ve rotasyon stratejileri uygulayın.",
        },
        compute: |f, _| div(f.cost_of_sales.abs(), f.inventories),
    },
    RatioDefinition {
        name: "Aktif Devir Hızı",
        category: RatioCategory::Activity,
        formula_text: "Net Satışlar / Aktif Toplamı",
        meaning: "Aktif devir hızı, işletmenin toplam varlıklarını ne kadar etkin kullanarak satış ürettiğini gösterir. \
            Yüksek oran, varlık kullanım verimliliğini işaret eder.",
        thresholds: Some(Thresholds::new(1.0, 0.8)),
        advice: Advice {
            safe: "Aktif devir hızınız 1’in üzerinde; varlıklarınızı etkin kullanarak satış yaratıyorsunuz.",
            adequate: "Aktif devir hızınız 0,8–1 aralığında. Varlık kullanımını artırmak için gereksiz yatırımları gözden geçirin.",
            risky: "Aktif devir hızınız 0,8’in altında; varlıklarınız verimsiz kullanılmakta. Kullanımdaki araç ve stokları optimize edin.",
        },
        compute: |f, _| div(f.net_sales, f.total_assets),
    },
    RatioDefinition {
        name: "Brüt Kar Marjı",
        category: RatioCategory::Profitability,
        formula_text: "(Brüt Satış Kârı / Net Satışlar) * 100",
        meaning: "Brüt kar marjı, net satışlardan direkt maliyetler çıkarıldıktan sonra elde edilen kar yüzdesidir. \
            Yüksek marj, maliyet kontrolünüzün ve fiyatlama stratejinizin etkinliğini gösterir.",
        thresholds: Some(Thresholds::new(30.0, 20.0)),
        advice: Advice {
            safe: "Brüt kar marjınız %30’un üzerinde; bu, maliyet yapınızın kontrollü olduğunu ve fiyatlama gücünüzün yüksek olduğunu gösterir.",
            adequate: "Brüt kar marjınız %20–30 aralığında. Maliyetleri optimize ederek veya fiyat politikanızı gözden geçirerek marjı artırabilirsiniz.",
            risky: "Brüt kar marjınız %20’nin altında; maliyet yapınızı yeniden yapılandırın ve fiyatlama stratejisi uygulamalarını güçlendirin.",
        },
        compute: |f, _| percent(f.gross_profit, f.net_sales),
    },
    RatioDefinition {
        name: "Faaliyet Kar Marjı",
        category: RatioCategory::Profitability,
        formula_text: "(Faaliyet Kârı / Net Satışlar) * 100",
        meaning: "Faaliyet kar marjı, işletmenin ana faaliyetlerinden elde ettiği kar yüzdesidir. \
            Faaliyet giderlerinizin etkin yönetimini yansıtır.",
        thresholds: Some(Thresholds::new(5.0, 2.0)),
        advice: Advice {
            safe: "Faaliyet kar marjınız %5’in üzerinde; işletme giderleriniz etkin yönetiliyor.",
            adequate: "Faaliyet kar marjınız %2–5 arasında. Faaliyet giderlerinizi detaylı analiz ederek verimliliği artırın.",
            risky: "Faaliyet kar marjınız %2’nin altında; gider kalemlerinizi gözden geçirin ve tasarruf planları hayata geçirin.",
        },
        compute: |f, _| percent(f.operating_profit, f.net_sales),
    },
    RatioDefinition {
        name: "Olağan Kar Marjı",
        category: RatioCategory::Profitability,
        formula_text: "(Olağan Kâr / Net Satışlar) * 100",
        meaning: "Olağan kar marjı, esas faaliyet karı ile finansman ve diğer olağan gelir/giderlerin net etkisini yansıtır. \
            İşletmenin tüm rutin faaliyetlerinin kârlılığını gösterir.",
        thresholds: Some(Thresholds::new(4.0, 2.0)),
        advice: Advice {
            safe: "Olağan kar marjınız %4’ün üzerinde; işletmenin tüm olağan faaliyetleri kârlı yönetiliyor.",
            adequate: "Olağan kar marjınız %2–4 arasında. Diğer gelir ve gider kalemlerini optimize ederek marjı yükseltin.",
            risky: "Olağan kar marjınız %2’nin altında; olağan dışı giderlerinizi kontrol altına alın ve ek gelir fırsatları yaratın.",
        },
        compute: |f, _| percent(f.ordinary_profit, f.net_sales),
    },
    RatioDefinition {
        name: "Dönem Kar Marjı",
        category: RatioCategory::Profitability,
        formula_text: "(Dönem Kârı / Net Satışlar) * 100",
        meaning: "Dönem kar marjı, vergi ve olağandışı kalemler dahil tüm gelir-gider işlemlerinin ardından elde edilen net kâr yüzdesidir.",
        thresholds: Some(Thresholds::new(5.0, 3.0)),
        advice: Advice {
            safe: "Dönem kar marjınız %5’in üzerinde; net kârlılığınız güçlü ve vergi sonrası durumunuz sağlıklı.",
            adequate: "Dönem kar marjınız %3–5 aralığında. Vergi planlaması ve maliyet kontrolü ile net kârlılığınızı iyileştirebilirsiniz.",
            risky: "Dönem kar marjınız %3’ün altında; maliyet ve vergi stratejilerinizi gözden geçirin, ek gelir kalemleri geliştirin.",
        },
        compute: |f, _| percent(f.period_profit, f.net_sales),
    },
    RatioDefinition {
        name: "Net Kar Marjı (Satışların Karlılığı)",
        category: RatioCategory::Profitability,
        formula_text: "(Net Kâr / Net Satışlar) * 100",
        meaning: "Net kar marjı, tüm faaliyetlerin nihai sonucunu yansıtan kâr yüzdesidir. \
            Şirketin genel finansal verimliliğini gösterir.",
        thresholds: Some(Thresholds::new(4.0, 2.0)),
        advice: Advice {
            safe: "Net kar marjınız %4’ün üzerinde; genel mali performansınız güçlü.",
            adequate: "Net kar marjınız %2–4 arasında. Genel gider yönetimi ve gelir kalemlerinizi optimize ederek marjı artırın.",
            risky: "Net kar marjınız %2’nin altında; kârlılığı destekleyici stratejiler geliştirin ve maliyet yapınızı yeniden yapılandırın.",
        },
        compute: |f, _| percent(f.net_profit, f.net_sales),
    },
    RatioDefinition {
        name: "Özsermaye Karlılığı",
        category: RatioCategory::Profitability,
        formula_text: "(Net Kâr / Özkaynaklar) * 100",
        meaning: "Özsermaye karlılığı, hissedarların yatırdıkları sermayenin ne kadar verim elde ettiğini gösterir. \
            Yüksek oran, sermaye kullanım etkinliğini işaret eder.",
        thresholds: Some(Thresholds::new(15.0, 10.0)),
        advice: Advice {
            safe: "Özsermaye karlılığınız %15’in üzerinde; sermaye verimliliğiniz yüksek.",
            adequate: "Özsermaye karlılığınız %10–15 aralığında. Yatırım ve kârlılık projelerinizi gözden geçirerek verim alın.",
            risky: "Özsermaye karlılığınız %10’un altında; kârlılığı artıracak stratejiler ve yatırım analizi yapın.",
        },
        compute: |f, _| percent(f.net_profit, f.equity),
    },
    RatioDefinition {
        name: "Aktif Karlılığı",
        category: RatioCategory::Profitability,
        formula_text: "(Dönem Kârı / Aktif Toplamı) * 100",
        meaning: "Aktif karlılığı, işletmenin tüm aktif varlıklarını ne kadar kârlı kullandığını gösterir. \
            Yüksek oran, varlıkların etkin kullanımına işaret eder.",
        thresholds: Some(Thresholds::new(10.0, 7.0)),
        advice: Advice {
            safe: "Aktif karlılığınız %10’un üzerinde; varlıklarınızı kârlı kullanıyorsunuz.",
            adequate: "Aktif karlılığınız %7–10 aralığında. Varlık kullanım verimliliğinizi artırmak için gereksiz varlıkları azaltın.",
            risky: "Aktif karlılığınız %7’nin altında; aktif kullanım stratejilerinizi gözden geçirin ve verimsiz varlıkları elden çıkarın.",
        },
        compute: |f, _| percent(f.period_profit, f.total_assets),
    },
    RatioDefinition {
        name: "Hisse Başına Kâr (EPS)",
        category: RatioCategory::Market,
        formula_text: "Net Kâr / Toplam Hisse Sayısı",
        meaning: "EPS, her bir hisse senedine düşen net kârı gösterir. \
            Şirket kârlılığı ve hisse performansı hakkında doğrudan bilgi sağlar.",
        thresholds: None,
        advice: Advice {
            safe: "EPS’niz pozitif ve artış trendindeyse; hisse performansınız yatırımcılar nezdinde olumlu algılanır.",
            adequate: "EPS’niz sabitse kârlılığınızı yükseltici faaliyetlere odaklanın.",
            risky: "EPS’niz negatifse; kârlılığı artırmaya yönelik maliyet kontrolü ve gelir artırıcı stratejiler geliştirin.",
        },
        compute: earnings_per_share,
    },
    RatioDefinition {
        name: "Fiyat Kazanç (F/K) Oranı",
        category: RatioCategory::Market,
        formula_text: "Hisse Fiyatı / EPS",
        meaning: "F/K oranı, hisse senedinin fiyatına göre kârlılık değerlemesini gösterir. \
            Düşük F/K, hisseyi görece ucuz; yüksek F/K ise pahalı olarak işaret edebilir.",
        thresholds: Some(Thresholds::new(15.0, 20.0)),
        advice: Advice {
            safe: "F/K oranınız 15’in altında; hisse değerlemeniz makul kabul edilir.",
            adequate: "F/K oranınız 15–20 aralığında. Piyasa beklentilerini takip ederek hisse performansınızı değerlendirin.",
            risky: "F/K oranınız 20’nin üzerinde; hisse aşırı değerlenmiş olabilir. Kârlılık artışını hızlandırarak değer önerinizi güçlendirin.",
        },
        compute: |f, m| div(m.share_price?, earnings_per_share(f, m)?),
    },
    RatioDefinition {
        name: "Piyasa Değeri / Defter Değeri Oranı",
        category: RatioCategory::Market,
        formula_text: "Piyasa Değeri / Özkaynaklar",
        meaning: "Piyasa/defter oranı, piyasa değerinin muhasebe defter değerine oranını gösterir. \
            1’in altı piyasanın defter değerinin altında işlem gördüğünü, üstü ise primli olduğunu işaret eder.",
        thresholds: Some(Thresholds::new(1.0, 0.8)),
        advice: Advice {
            safe: "Piyasa/defter oranınız 1’in üzerinde; yatırımcılar şirketinizi defter değerinin üzerinde değerli buluyor.",
            adequate: "Piyasa/defter oranınız 0,8–1 aralığında. Hisse değerlemesini artırmak için büyüme hikayenizi güçlendirin.",
            risky: "Piyasa/defter oranınız 0,8’in altında; hisse görece ucuz. Yatırımcı güvenini artırmak için kârlılık ve büyüme stratejilerinizi paylaşın.",
        },
        compute: |f, m| {
            let count = m.share_count.filter(|c| *c != 0.0)?;
            div(m.share_price? * count, f.equity)
        },
    },
];

pub fn definition(name: &str) -> Option<&'static RatioDefinition> {
    RATIO_CATALOGUE.iter().find(|d| d.name == name)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatioResult {
    pub name: String,
    pub category: RatioCategory,
    pub value: Option<f64>,
    pub classification: Classification,
    pub formula_text: String,
    pub meaning: String,
    pub advice_text: Option<String>,
    pub thresholds: Option<Thresholds>,
}

impl RatioResult {
    fn evaluate(definition: &RatioDefinition, figures: &DerivedFigures, market: &MarketInputs) -> Self {
        let value = definition.evaluate(figures, market);
        let classification = match (value, definition.thresholds) {
            (Some(v), Some(t)) => t.classify(v),
            _ => Classification::Undefined,
        };
        Self {
            name: definition.name.to_string(),
            category: definition.category,
            value,
            classification,
            formula_text: definition.formula_text.to_string(),
            meaning: definition.meaning.to_string(),
            advice_text: definition.advice.for_level(classification).map(str::to_string),
            thresholds: definition.thresholds,
        }
    }
}

/// Ratios of one reporting period, in catalogue order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatioReport {
    pub figures: DerivedFigures,
    pub results: Vec<RatioResult>,
}

impl RatioReport {
    pub fn get(&self, name: &str) -> Option<&RatioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|r| r.value)
    }
}

pub fn compute_ratios(
    statements: &FinancialStatements,
    period: ReportingPeriod,
    market: &MarketInputs,
    categories: &[RatioCategory],
) -> RatioReport {
    let figures = DerivedFigures::compute(&statements.balance_sheet, &statements.income_statement, period);
    debug!("Derived figures for {:?}: {:?}", period, figures);

    let results: Vec<RatioResult> = RATIO_CATALOGUE
        .iter()
        .filter(|d| categories.contains(&d.category))
        .map(|d| RatioResult::evaluate(d, &figures, market))
        .collect();

    let undefined = results
        .iter()
        .filter(|r| r.classification == Classification::Undefined)
        .count();
    info!(
        "Computed {} ratios ({} undefined) for {:?}",
        results.len(),
        undefined,
        period
    );

    RatioReport { figures, results }
}
