use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::AnalysisResult;

const PROMPT_EXCERPT_CHARS: usize = 200;
const MAX_ENTRY_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub schema_version: String,
    pub tool_version: String,
    pub started_at: String,
    pub finished_at: String,
    pub mode: String,
    pub prompt_excerpt: String,
    pub prompt_chars: usize,
    pub result: AnalysisResult,
}

#[derive(Debug, Clone)]
pub struct HistoryFile {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified_unix_nanos: Option<u128>,
}

pub fn history_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/geoscreen/history")
}

pub fn exports_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/geoscreen/exports")
}

pub fn write_analysis(
    home_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    mode: &str,
    prompt: &str,
    result: &AnalysisResult,
) -> Result<PathBuf> {
    let dir = history_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create history directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let file_name = format!("analysis-{pid}-{ts}.json");
    let path = dir.join(file_name);

    let entry = HistoryEntry {
        schema_version: "1.0".to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: format_rfc3339(started_at),
        finished_at: format_rfc3339(finished_at),
        mode: mode.to_string(),
        prompt_excerpt: crate::view::truncate_text(prompt.trim(), PROMPT_EXCERPT_CHARS),
        prompt_chars: prompt.trim().chars().count(),
        result: result.clone(),
    };

    let buf = serde_json::to_vec_pretty(&entry).context("failed to serialize history entry")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write history entry: {}", path.display()))?;
    Ok(path)
}

// Newest first. A missing directory is an empty history, not an error.
pub fn list(home_dir: &Path) -> Result<Vec<HistoryFile>> {
    let dir = history_dir(home_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read history directory: {}", dir.display()))?;
    for entry in read_dir {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with("analysis-") || !file_name.ends_with(".json") {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified_unix_nanos = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos());
        entries.push(HistoryFile {
            file_name: file_name.to_string(),
            path,
            size: meta.len(),
            modified_unix_nanos,
        });
    }

    entries.sort_by(|a, b| {
        b.modified_unix_nanos
            .cmp(&a.modified_unix_nanos)
            .then_with(|| b.file_name.cmp(&a.file_name))
    });
    Ok(entries)
}

pub fn load(path: &Path) -> Result<HistoryEntry> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("failed to stat history entry: {}", path.display()))?;
    if meta.len() > MAX_ENTRY_BYTES {
        anyhow::bail!(
            "history entry too large ({} bytes): {}",
            meta.len(),
            path.display()
        );
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history entry: {}", path.display()))?;
    serde_json::from_str(&s)
        .with_context(|| format!("failed to parse history entry: {}", path.display()))
}

pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}
