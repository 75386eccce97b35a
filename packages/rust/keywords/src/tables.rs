//! Bilingual term → English search phrase tables.
//!
//! The built-in vocabulary is plain data; [`TranslationTables`] can also be
//! loaded from a TOML file with `[cover]` and `[section]` string tables.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::Deserialize;

use illustra_shared::{IllustraError, Language, Result};

/// `(term, cover phrase, section phrase)`.
///
/// Cover phrases favour broad, poster-like imagery; section phrases favour
/// concrete scenes that sit well inside body text.
const BUILTIN_TERMS: &[(&str, &str, &str)] = &[
    // Technology
    ("人工智能", "artificial intelligence technology", "ai robot interface"),
    ("ai", "artificial intelligence technology", "ai robot interface"),
    ("机器学习", "machine learning data visualization", "neural network diagram"),
    ("深度学习", "deep learning neural network", "neural network layers"),
    ("大模型", "large language model ai", "ai chatbot screen"),
    ("算法", "algorithm abstract code", "flowchart algorithm"),
    ("数据", "big data visualization", "data dashboard charts"),
    ("大数据", "big data technology", "data center servers"),
    ("云计算", "cloud computing technology", "cloud server infrastructure"),
    ("区块链", "blockchain technology network", "blockchain blocks chain"),
    ("互联网", "internet global network", "people using internet"),
    ("网络", "network connection technology", "network cables connection"),
    ("编程", "programming code screen", "developer writing code"),
    ("代码", "source code screen", "code editor closeup"),
    ("软件", "software development", "software interface screen"),
    ("开发", "software development team", "developer workspace"),
    ("程序员", "programmer at work", "programmer laptop desk"),
    ("芯片", "semiconductor chip technology", "microchip closeup"),
    ("手机", "smartphone technology", "hand holding smartphone"),
    ("电脑", "computer technology", "laptop on desk"),
    ("机器人", "robot technology future", "industrial robot arm"),
    ("自动化", "automation technology", "automated factory line"),
    ("安全", "cyber security technology", "security lock digital"),
    ("网络安全", "cyber security shield", "hacker security screen"),
    ("数字化", "digital transformation", "digital workplace"),
    ("科技", "modern technology innovation", "technology gadgets"),
    ("技术", "technology innovation", "technical engineering work"),
    ("创新", "innovation creative idea", "lightbulb idea innovation"),
    ("未来", "futuristic city technology", "future concept design"),
    ("元宇宙", "metaverse virtual reality", "vr headset user"),
    ("虚拟现实", "virtual reality experience", "person wearing vr headset"),
    ("物联网", "internet of things smart devices", "smart home devices"),
    ("5g", "5g network technology", "cell tower antenna"),
    ("新能源", "renewable energy solar wind", "solar panels field"),
    ("电动车", "electric vehicle charging", "electric car charger"),
    ("汽车", "modern car design", "car on road"),
    // Business
    ("商业", "business strategy meeting", "business people office"),
    ("创业", "startup entrepreneur", "startup team brainstorm"),
    ("企业", "corporate business building", "office teamwork"),
    ("公司", "company office building", "office interior"),
    ("管理", "business management leadership", "team meeting whiteboard"),
    ("营销", "digital marketing strategy", "marketing analytics screen"),
    ("市场", "market analysis business", "stock market chart"),
    ("销售", "sales growth business", "sales team handshake"),
    ("客户", "customer service relationship", "customer support agent"),
    ("产品", "product design concept", "product prototype desk"),
    ("设计", "creative design concept", "designer sketching"),
    ("品牌", "brand identity design", "brand logo mockup"),
    ("投资", "investment finance growth", "investment chart coins"),
    ("金融", "finance financial district", "financial charts screen"),
    ("经济", "global economy", "economy growth graph"),
    ("股票", "stock market trading", "stock ticker screen"),
    ("电商", "ecommerce online shopping", "online shopping cart"),
    ("团队", "teamwork collaboration", "team working together"),
    ("领导力", "leadership business", "leader presenting team"),
    ("职场", "workplace career", "office workers desk"),
    ("效率", "productivity efficiency", "organized workspace"),
    ("增长", "business growth chart", "upward arrow growth"),
    ("战略", "business strategy chess", "strategy planning board"),
    // Life and society
    ("教育", "education learning", "students classroom"),
    ("学习", "learning study books", "student studying"),
    ("学生", "students campus", "students reading books"),
    ("老师", "teacher education", "teacher whiteboard"),
    ("健康", "health wellness lifestyle", "healthy food plate"),
    ("医疗", "healthcare medical technology", "doctor with patient"),
    ("医院", "modern hospital", "hospital corridor"),
    ("运动", "sports fitness", "people running outdoors"),
    ("健身", "fitness workout gym", "gym training weights"),
    ("旅游", "travel destination landscape", "traveler with backpack"),
    ("旅行", "travel adventure", "road trip scenery"),
    ("美食", "delicious food cuisine", "chef cooking kitchen"),
    ("咖啡", "coffee cafe", "coffee cup closeup"),
    ("城市", "city skyline", "city street life"),
    ("自然", "nature landscape", "forest path nature"),
    ("环境", "environment nature protection", "green environment plants"),
    ("环保", "eco friendly green", "recycling sustainability"),
    ("气候", "climate change earth", "weather clouds sky"),
    ("音乐", "music concert", "musical instruments"),
    ("电影", "cinema film", "movie theater seats"),
    ("艺术", "art gallery creative", "painting artwork studio"),
    ("文化", "culture heritage", "traditional culture art"),
    ("历史", "history ancient architecture", "historic building"),
    ("家庭", "happy family", "family at home"),
    ("儿童", "children playing", "kids learning"),
    ("阅读", "reading books library", "open book reading"),
    ("写作", "writing creative", "hands typing notebook"),
    ("社交", "social media network", "friends using phones"),
    ("媒体", "media communication", "news media studio"),
    ("新闻", "news media", "newspaper headlines"),
    ("沟通", "communication teamwork", "people talking meeting"),
    ("成长", "personal growth", "plant sprout growing"),
    ("心理", "psychology mind", "calm meditation person"),
    ("时间", "time management clock", "clock on desk"),
    ("成功", "success achievement", "mountain summit success"),
];

static BUILTIN: LazyLock<TranslationTables> = LazyLock::new(|| {
    let mut cover = HashMap::with_capacity(BUILTIN_TERMS.len());
    let mut section = HashMap::with_capacity(BUILTIN_TERMS.len());
    for (term, cover_phrase, section_phrase) in BUILTIN_TERMS {
        cover.insert(normalize_key(term), (*cover_phrase).to_string());
        section.insert(normalize_key(term), (*section_phrase).to_string());
    }
    TranslationTables {
        cover: TranslationTable { entries: cover },
        section: TranslationTable { entries: section },
    }
});

/// Latin keys compare case-insensitively; CJK keys compare exactly.
fn normalize_key(term: &str) -> String {
    match Language::of(term) {
        Language::Latin => term.to_lowercase(),
        Language::Cjk => term.to_string(),
    }
}

// ---------------------------------------------------------------------------
// TranslationTable
// ---------------------------------------------------------------------------

/// An immutable exact-match mapping from source terms to search phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    entries: HashMap<String, String>,
}

impl TranslationTable {
    /// Look up the phrase for `term`.
    pub fn lookup(&self, term: &str) -> Option<&str> {
        self.entries.get(&normalize_key(term)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for TranslationTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (normalize_key(&k), v))
                .collect(),
        }
    }
}

/// The two table variants: whole-article cover search and in-body section search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTables {
    pub cover: TranslationTable,
    pub section: TranslationTable,
}

#[derive(Deserialize)]
struct TableFile {
    #[serde(default)]
    cover: HashMap<String, String>,
    #[serde(default)]
    section: HashMap<String, String>,
}

impl TranslationTables {
    /// The built-in vocabulary (built once per process).
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parse tables from TOML (`[cover]` / `[section]` string maps).
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: TableFile = toml::from_str(input)
            .map_err(|e| IllustraError::config(format!("invalid keyword table: {e}")))?;
        Ok(Self {
            cover: file.cover.into_iter().collect(),
            section: file.section.into_iter().collect(),
        })
    }

    /// Load tables from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IllustraError::io(path, e))?;
        let tables = Self::from_toml_str(&content)?;
        tracing::debug!(
            ?path,
            cover = tables.cover.len(),
            section = tables.section.len(),
            "loaded keyword tables"
        );
        Ok(tables)
    }
}
