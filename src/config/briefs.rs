// src/config/briefs.rs
//! Target list + schedule, loaded once at startup and handed to the scheduler.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::{default_slots, ScheduleSlot};
use crate::target::{default_targets, Target};

pub const ENV_BRIEFS_CONFIG_PATH: &str = "BRIEFS_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct BriefsConfig {
    pub targets: Vec<Target>,
    pub schedule: Vec<ScheduleSlot>,
}

impl Default for BriefsConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            schedule: default_slots(),
        }
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    targets: Vec<Target>,
    #[serde(default)]
    schedule: Vec<ScheduleSlot>,
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_briefs_from(path: &Path) -> Result<BriefsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading briefs config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_briefs(&content, ext.as_str())
}

/// Load using env var + fallbacks:
/// 1) $BRIEFS_CONFIG_PATH
/// 2) config/briefs.toml
/// 3) config/briefs.json
/// 4) built-in targets and schedule
pub fn load_briefs_default() -> Result<BriefsConfig> {
    if let Ok(p) = std::env::var(ENV_BRIEFS_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_briefs_from(&pb);
        }
        return Err(anyhow!("BRIEFS_CONFIG_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/briefs.toml");
    if toml_p.exists() {
        return load_briefs_from(&toml_p);
    }
    let json_p = PathBuf::from("config/briefs.json");
    if json_p.exists() {
        return load_briefs_from(&json_p);
    }
    Ok(BriefsConfig::default())
}

fn parse_briefs(s: &str, hint_ext: &str) -> Result<BriefsConfig> {
    let raw: RawConfig = if hint_ext == "json" {
        serde_json::from_str(s).context("parsing briefs json")?
    } else {
        match toml::from_str(s) {
            Ok(v) => v,
            Err(toml_err) => serde_json::from_str(s)
                .map_err(|_| anyhow!("unsupported briefs config format: {toml_err}"))?,
        }
    };
    clean(raw)
}

/// A key is used as a store path segment.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && key != "."
        && key != ".."
}

fn clean(raw: RawConfig) -> Result<BriefsConfig> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::with_capacity(raw.targets.len());
    for mut t in raw.targets {
        t.key = t.key.trim().to_string();
        if !is_valid_key(&t.key) {
            return Err(anyhow!("invalid target key {:?}", t.key));
        }
        if !seen.insert(t.key.clone()) {
            tracing::warn!(key = %t.key, "duplicate target key; keeping the first");
            continue;
        }
        targets.push(t);
    }
    if targets.is_empty() {
        targets = default_targets();
    }

    for slot in &raw.schedule {
        if slot.hour > 23 || slot.minute > 59 {
            return Err(anyhow!(
                "invalid schedule time {:02}:{:02}",
                slot.hour,
                slot.minute
            ));
        }
    }
    let schedule = if raw.schedule.is_empty() {
        default_slots()
    } else {
        raw.schedule
    };

    Ok(BriefsConfig { targets, schedule })
}
