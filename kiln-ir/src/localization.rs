use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Locale-specific string overrides parsed from one localization file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    /// Culture identifier (e.g. `en-us`); `None` applies to every culture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codepage: Option<u32>,
    /// File the localization was parsed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    pub strings: IndexMap<String, String>,
}

impl Localization {
    /// Whether this localization applies when building for `cultures`.
    ///
    /// An empty culture list accepts everything; a neutral localization
    /// is accepted by every culture list.
    pub fn applies_to(&self, cultures: &[String]) -> bool {
        match &self.culture {
            None => true,
            Some(_) if cultures.is_empty() => true,
            Some(culture) => cultures.iter().any(|c| c.eq_ignore_ascii_case(culture)),
        }
    }
}
