use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `/api/health` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub openclaw_available: bool,
    #[serde(default)]
    pub session_dir_exists: bool,
    #[serde(default)]
    pub today_log_exists: bool,
    #[serde(default)]
    pub output: Option<String>,
}

/// `/api/version` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

/// One entry of `/api/sessions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Transcript file modification time, epoch seconds.
    #[serde(default)]
    pub mtime: Option<f64>,
    #[serde(default)]
    pub idle_since: Option<f64>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "labelType")]
    pub label_type: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub models: BTreeMap<String, TokenUsage>,
}

impl SessionSummary {
    pub fn is_processing(&self) -> bool {
        self.status.as_deref() == Some("processing")
    }

    /// Human label: known label types first, then `{platform}_{dm|group}`,
    /// then the server-provided label, then a shortened id.
    pub fn display_label(&self) -> String {
        if let Some(label_type) = self.label_type.as_deref() {
            match label_type {
                "heartbeat" => return "Heartbeat".to_string(),
                "cron" => return "Cron".to_string(),
                "main" => return "Main session".to_string(),
                _ => {}
            }
            if let Some((platform, scope)) = label_type.rsplit_once('_') {
                match scope {
                    "dm" if !platform.is_empty() => return format!("{platform} DM"),
                    "group" if !platform.is_empty() => return format!("{platform} group"),
                    _ => {}
                }
            }
        }
        if let Some(label) = self.label.as_deref().filter(|label| !label.is_empty()) {
            return label.to_string();
        }
        abbreviate_id(&self.id)
    }
}

/// `0123abcd-4567-...` becomes `0123abcd-4567…`.
pub fn abbreviate_id(id: &str) -> String {
    match (id.get(..8), id.get(9..13)) {
        (Some(head), Some(tail)) => format!("{head}-{tail}…"),
        _ => id.to_string(),
    }
}

/// First eight characters of an id followed by an ellipsis.
pub fn short_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((cut, _)) => format!("{}…", &id[..cut]),
        None => id.to_string(),
    }
}
