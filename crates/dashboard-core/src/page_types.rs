use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::PageType;

// ── PageTypeRules ─────────────────────────────────────────────────────────────

/// One `pattern → page type` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTypeRule {
    /// Substring looked for in the group label (case-insensitive).
    pub pattern: String,
    pub page_type: PageType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Ordered group → page-type rule table. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageTypeRules {
    rules: Vec<PageTypeRule>,
}

impl Default for PageTypeRules {
    fn default() -> Self {
        Self::new(vec![
            PageTypeRule {
                pattern: "main_avatar".to_string(),
                page_type: PageType::Videos,
                description: "Main avatar accounts, linked to the videos page".to_string(),
            },
            PageTypeRule {
                pattern: "wan_produce101".to_string(),
                page_type: PageType::Download,
                description: "Produce101 accounts, linked to the download page".to_string(),
            },
        ])
    }
}

impl PageTypeRules {
    /// Build a table from rules in precedence order. Rules with a blank
    /// pattern are dropped since they would match every group.
    pub fn new(rules: Vec<PageTypeRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| {
                let keep = !r.pattern.trim().is_empty();
                if !keep {
                    warn!("Ignoring page-type rule with an empty pattern");
                }
                keep
            })
            .collect();
        Self { rules }
    }

    /// Page type of `group`: the first rule whose pattern occurs in it, or
    /// [`PageType::Other`].
    pub fn classify(&self, group: &str) -> PageType {
        let group = group.trim().to_lowercase();
        self.rules
            .iter()
            .find(|r| group.contains(&r.pattern.trim().to_lowercase()))
            .map(|r| r.page_type)
            .unwrap_or(PageType::Other)
    }

    pub fn rules(&self) -> &[PageTypeRule] {
        &self.rules
    }

    /// Patterns mapped to `page_type`, in precedence order.
    pub fn patterns_for(&self, page_type: PageType) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.page_type == page_type)
            .map(|r| r.pattern.as_str())
            .collect()
    }
}

// ── LinkRules ─────────────────────────────────────────────────────────────────

/// A tracked landing link and the group whose views it converts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRule {
    pub url: String,
    pub group: String,
}

impl LinkRule {
    pub fn new(url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            group: group.into(),
        }
    }

    /// Whether a clicked `page_url` is this link. `http://` and `https://`
    /// compare equal.
    pub fn matches_url(&self, page_url: &str) -> bool {
        strip_scheme(page_url).eq_ignore_ascii_case(strip_scheme(&self.url))
    }

    /// Whether `group_label` contains this rule's target group.
    pub fn matches_group(&self, group_label: &str) -> bool {
        group_label
            .to_lowercase()
            .contains(&self.group.trim().to_lowercase())
    }
}

fn strip_scheme(url: &str) -> &str {
    let url = url.trim();
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// Ordered link → group table for the link-conversion analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkRules {
    rules: Vec<LinkRule>,
}

impl Default for LinkRules {
    fn default() -> Self {
        Self {
            rules: vec![
                LinkRule::new("https://insnap.ai/videos", "yujie_main_avatar"),
                LinkRule::new("https://insnap.ai/zh/download", "wan_produce101"),
            ],
        }
    }
}

impl LinkRules {
    pub fn new(rules: Vec<LinkRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[LinkRule] {
        &self.rules
    }

    /// Target group of the first rule matching `page_url`.
    pub fn group_for_url(&self, page_url: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.matches_url(page_url))
            .map(|r| r.group.as_str())
    }
}

// ── MappingConfig ─────────────────────────────────────────────────────────────

/// The mapping file: page-type rules and link rules.
///
/// Stored as JSON at `~/.tiktok-dashboard/mappings.json` unless `--mappings`
/// names another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MappingConfig {
    #[serde(default)]
    pub page_type_rules: PageTypeRules,
    #[serde(default)]
    pub link_rules: LinkRules,
}

impl MappingConfig {
    /// Default location of the mapping file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Mapping file location rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".tiktok-dashboard").join("mappings.json")
    }

    /// Load the mapping file, falling back to the built-in rules when it is
    /// absent or unreadable.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<MappingConfig>(&content) {
            Ok(config) => Self {
                page_type_rules: PageTypeRules::new(config.page_type_rules.rules),
                link_rules: config.link_rules,
            },
            Err(e) => {
                warn!(
                    "Invalid mapping file {}: {}; using built-in rules",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Atomically write the mapping file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}
