//! Loader configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{Args, LiveViewPage, Selection};
use crate::core::vis::parse_vis;
use crate::io::catalog::Scripts;

/// Loader configuration.
///
/// Missing fields default to values suitable for interactive use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// How many navigation events a slow subscriber may fall behind.
    pub navigation_capacity: usize,

    /// How long the CLI waits for the load state to settle after replaying.
    pub settle_timeout_ms: u64,

    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Script the session context offers as its default.
    pub defaults: Option<DefaultsConfig>,
}

/// Context-default script, resolved against the script bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultsConfig {
    pub id: String,
    #[serde(default)]
    pub args: Args,
    #[serde(default)]
    pub live_view_page: LiveViewPage,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            navigation_capacity: 64,
            settle_timeout_ms: 2_000,
            log_filter: "warn".to_string(),
            defaults: None,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.navigation_capacity == 0 {
            return Err(anyhow!("navigation_capacity must be > 0"));
        }
        if self.settle_timeout_ms == 0 {
            return Err(anyhow!("settle_timeout_ms must be > 0"));
        }
        if let Some(defaults) = &self.defaults {
            if defaults.id.trim().is_empty() {
                return Err(anyhow!("defaults.id must be non-empty"));
            }
        }
        Ok(())
    }
}

impl DefaultsConfig {
    /// Build the context selection for these defaults from `scripts`.
    pub fn resolve(&self, scripts: &Scripts) -> Result<Selection> {
        let script = scripts
            .get(&self.id)
            .with_context(|| format!("default script '{}' not in bundle", self.id))?;
        let vis = parse_vis(&script.vis)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("parse vis of default script '{}'", self.id))?;
        Ok(Selection {
            pxl: script.pxl.clone(),
            vis: Some(vis),
            args: self.args.clone(),
            id: self.id.clone(),
            live_view_page: self.live_view_page,
        })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoaderConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoaderConfig> {
    if !path.exists() {
        let cfg = LoaderConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoaderConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
