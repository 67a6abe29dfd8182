use std::fmt;

use serde::{Deserialize, Serialize};

/// The three sites that embed scene data, each in its own format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteVariant {
    /// realsee.com: `__module__data` statement inside a `work_code` script.
    Realsee,
    /// open.realsee.com: escaped HTML comment inside a `houseInfo` script.
    OpenRealsee,
    /// realsee.cn: escaped HTML comment holding an init-data query.
    RealseeCn,
}

// open.realsee.com shares the realsee.com domain, so it must be tested first.
const PATTERNS: [(&str, SiteVariant); 6] = [
    ("http://open.realsee.com", SiteVariant::OpenRealsee),
    ("https://open.realsee.com", SiteVariant::OpenRealsee),
    ("http://realsee.com", SiteVariant::Realsee),
    ("https://realsee.com", SiteVariant::Realsee),
    ("http://realsee.cn", SiteVariant::RealseeCn),
    ("https://realsee.cn", SiteVariant::RealseeCn),
];

pub fn classify(url: &str) -> Option<SiteVariant> {
    PATTERNS
        .iter()
        .find(|(pattern, _)| url.contains(pattern))
        .map(|(_, variant)| *variant)
}

impl SiteVariant {
    pub fn host(&self) -> &'static str {
        match self {
            SiteVariant::Realsee => "realsee.com",
            SiteVariant::OpenRealsee => "open.realsee.com",
            SiteVariant::RealseeCn => "realsee.cn",
        }
    }
}

impl fmt::Display for SiteVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.host()) }
}
