use crate::model::Rules;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) tick_ms: u64,
    pub(crate) autosave_secs: u64,
    pub(crate) enable_color: bool,
    pub(crate) log_filter: String,
    pub(crate) rules: Rules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            autosave_secs: 10,
            enable_color: true,
            log_filter: "info".to_string(),
            rules: Rules::default(),
        }
    }
}

impl Settings {
    pub(crate) fn clamped(mut self) -> Self {
        self.tick_ms = self.tick_ms.clamp(50, 10_000);
        self.autosave_secs = self.autosave_secs.clamp(1, 60 * 60);
        self.rules = self.rules.clamped();
        self
    }
}

pub(crate) struct Paths {
    pub(crate) save_path: PathBuf,
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

impl Paths {
    pub(crate) fn in_dir(dir: &Path) -> Self {
        Self {
            save_path: dir.join("save.json"),
            settings_path: dir.join("settings.json"),
            log_path: dir.join("digipal.log"),
        }
    }
}

/// `~/.digipal`, created on first use.
pub(crate) fn data_paths() -> Result<Paths> {
    let base = BaseDirs::new().context("could not resolve the home directory")?;
    let dir = base.home_dir().join(".digipal");
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(Paths::in_dir(&dir))
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    let Ok(s) = fs::read_to_string(path) else {
        return Settings::default();
    };
    match serde_json::from_str::<Settings>(&s) {
        Ok(v) => v.clamped(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data)
}

/// Writes to a sibling temp file, then renames over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    // rename-over-existing is not atomic on Windows
    if cfg!(windows) && path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
