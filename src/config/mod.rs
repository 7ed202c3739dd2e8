use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::ClientMode;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub client: ClientConfig,
    pub ui: UiConfig,
    pub history: HistoryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    pub mode: ClientMode,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub page_size: usize,
    pub max_table_rows: usize,
    pub truncate_chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryConfig {
    pub keep: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig {
                mode: ClientMode::Live,
                base_url: crate::client::DEFAULT_BASE_URL.to_string(),
            },
            ui: UiConfig {
                color: true,
                page_size: crate::view::DEFAULT_PAGE_SIZE,
                max_table_rows: 20,
                truncate_chars: crate::view::DEFAULT_TRUNCATE_CHARS,
            },
            history: HistoryConfig { keep: true },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    client: Option<RawClientConfig>,
    ui: Option<RawUiConfig>,
    history: Option<RawHistoryConfig>,
}

#[derive(Debug, Deserialize)]
struct RawClientConfig {
    mode: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    page_size: Option<usize>,
    max_table_rows: Option<usize>,
    truncate_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryConfig {
    keep: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/geoscreen/config.toml")
}

pub fn effective_home_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match home {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
        _ => Err(anyhow::anyhow!("HOME is not set")),
    }
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw)?;
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) -> Result<()> {
    if let Some(client) = raw.client {
        if let Some(mode) = client.mode {
            cfg.client.mode = mode
                .parse::<ClientMode>()
                .map_err(anyhow::Error::msg)
                .context("client.mode")?;
        }
        if let Some(base_url) = client.base_url {
            cfg.client.base_url = base_url;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(page_size) = ui.page_size {
            cfg.ui.page_size = page_size;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
        if let Some(truncate_chars) = ui.truncate_chars {
            cfg.ui.truncate_chars = truncate_chars;
        }
    }

    if let Some(history) = raw.history {
        if let Some(keep) = history.keep {
            cfg.history.keep = keep;
        }
    }

    Ok(())
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("GEOSCREEN_CLIENT_MODE") {
        cfg.client.mode = v
            .parse::<ClientMode>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "GEOSCREEN_CLIENT_MODE")?;
    }
    if let Ok(v) = std::env::var("GEOSCREEN_CLIENT_BASE_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.client.base_url = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("GEOSCREEN_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "GEOSCREEN_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("GEOSCREEN_UI_PAGE_SIZE") {
        cfg.ui.page_size = v
            .trim()
            .parse::<usize>()
            .with_context(|| "GEOSCREEN_UI_PAGE_SIZE")?;
    }
    if let Ok(v) = std::env::var("GEOSCREEN_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "GEOSCREEN_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("GEOSCREEN_UI_TRUNCATE_CHARS") {
        cfg.ui.truncate_chars = v
            .trim()
            .parse::<usize>()
            .with_context(|| "GEOSCREEN_UI_TRUNCATE_CHARS")?;
    }
    if let Ok(v) = std::env::var("GEOSCREEN_HISTORY_KEEP") {
        cfg.history.keep = parse_bool(&v).with_context(|| "GEOSCREEN_HISTORY_KEEP")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
