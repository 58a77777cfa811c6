use dashboard_data::analysis::SourceFiles;
use serde::Serialize;

/// Page title shown in the header and the browser tab.
pub const TITLE: &str = "TikTok Performance Dashboard";

/// One input file line under the title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLine {
    pub label: &'static str,
    /// File name, or `"not found"`.
    pub file: String,
    pub found: bool,
}

/// Template context of the page header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderContext {
    pub title: &'static str,
    /// `"[ timezone | loaded at ]"`.
    pub subtitle: String,
    pub sources: Vec<SourceLine>,
}

/// Dashboard header: title, timezone and load time, and the file chosen for
/// each source.
pub struct Header<'a> {
    pub timezone: &'a str,
    /// RFC 3339 load time of the snapshot.
    pub loaded_at: &'a str,
    pub files: &'a SourceFiles,
}

impl<'a> Header<'a> {
    pub fn new(timezone: &'a str, loaded_at: &'a str, files: &'a SourceFiles) -> Self {
        Self {
            timezone,
            loaded_at,
            files,
        }
    }

    pub fn to_context(&self) -> HeaderContext {
        let loaded = chrono::DateTime::parse_from_rfc3339(self.loaded_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| self.loaded_at.to_string());

        let line = |label: &'static str, path: &Option<std::path::PathBuf>| SourceLine {
            label,
            file: path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "not found".to_string()),
            found: path.is_some(),
        };

        HeaderContext {
            title: TITLE,
            subtitle: format!("[ {} | loaded {} ]", self.timezone, loaded),
            sources: vec![
                line("Metrics", &self.files.metrics),
                line("Accounts", &self.files.accounts),
                line("Clicks", &self.files.clicks),
            ],
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
