//! Persisted user preferences: display theme and locale.
//!
//! Stored as a small JSON document. A missing or unreadable file loads the
//! defaults (dark, zh-CN) instead of failing startup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "dark" => Ok(ThemeMode::Dark),
            "light" => Ok(ThemeMode::Light),
            other => bail!("unknown theme: {}", other),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "zh-CN" => Ok(Locale::ZhCn),
            "en-US" => Ok(Locale::EnUs),
            other => bail!("unknown locale: {}", other),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Locale::ZhCn => Locale::EnUs,
            Locale::EnUs => Locale::ZhCn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: ThemeMode,
    #[serde(default)]
    pub locale: Locale,
}

pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Preferences {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Preferences::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Prefs,
                    "load_failed",
                    obj(&[
                        ("path", v_str(&self.path.to_string_lossy())),
                        ("msg", v_str(&err.to_string())),
                    ]),
                );
                Preferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let body = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing preferences to {}", self.path.display()))?;
        log(
            Level::Debug,
            Domain::Prefs,
            "saved",
            obj(&[("path", v_str(&self.path.to_string_lossy()))]),
        );
        Ok(())
    }

    /// Load, apply `f`, persist; returns the new value.
    pub fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        let mut prefs = self.load();
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}
