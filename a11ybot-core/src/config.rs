//! Configuration system for a11ybot.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/a11ybot/config.toml` and/or `.a11ybot/config.toml`
//! in the workspace directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Hard ceiling on keyboard presses during the forward tab walk.
pub const MAX_TAB_STEPS_CEILING: usize = 50;

/// Default selector used to locate a modal dialog.
pub const DEFAULT_MODAL_SELECTOR: &str = r#"[role="dialog"], [role="alertdialog"]"#;

/// Top-level configuration for a11ybot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct A11yConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub rule_engine: RuleEngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Configuration for the shared browser process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to the Chrome/Chromium binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
    /// Whether to run headless (no visible window).
    pub headless: bool,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// How long to wait for the browser process to come up.
    pub launch_timeout_secs: u64,
    /// Per-command DevTools timeout. Must exceed `audit.navigation_timeout_ms`
    /// so navigation is bounded by the audit, not by the protocol client.
    pub request_timeout_ms: u64,
    /// Extra command-line arguments passed to the browser.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            launch_timeout_secs: 30,
            request_timeout_ms: 90_000,
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

/// Configuration for a single audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Upper bound on page load during navigation.
    pub navigation_timeout_ms: u64,
    /// Forward tab-walk cap; clamped to [`MAX_TAB_STEPS_CEILING`].
    pub max_tab_steps: usize,
    /// Selector used to find the modal dialog under test.
    pub modal_selector: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            max_tab_steps: MAX_TAB_STEPS_CEILING,
            modal_selector: DEFAULT_MODAL_SELECTOR.to_string(),
        }
    }
}

/// Configuration for the external rule engine (axe-core).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleEngineConfig {
    /// Path to the axe-core script source injected into audited pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
}

/// Configuration for report artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory where reports are written when no explicit path is given.
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

impl A11yConfig {
    /// Reject settings the audit engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.navigation_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "audit.navigation_timeout_ms must be greater than zero".into(),
            });
        }
        if self.browser.request_timeout_ms <= self.audit.navigation_timeout_ms {
            return Err(ConfigError::Invalid {
                message: format!(
                    "browser.request_timeout_ms ({}) must be greater than audit.navigation_timeout_ms ({})",
                    self.browser.request_timeout_ms, self.audit.navigation_timeout_ms
                ),
            });
        }
        if self.audit.max_tab_steps == 0 || self.audit.max_tab_steps > MAX_TAB_STEPS_CEILING {
            return Err(ConfigError::Invalid {
                message: format!(
                    "audit.max_tab_steps must be between 1 and {MAX_TAB_STEPS_CEILING}"
                ),
            });
        }
        if self.audit.modal_selector.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "audit.modal_selector".into(),
            });
        }
        Ok(())
    }
}

/// Load configuration with layered sources.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&A11yConfig>,
) -> Result<A11yConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(A11yConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "a11ybot", "a11ybot") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".a11ybot").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (A11YBOT_AUDIT__NAVIGATION_TIMEOUT_MS, A11YBOT_BROWSER__HEADLESS, etc.)
    figment = figment.merge(Env::prefixed("A11YBOT_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
