//! Script catalog provider.
//!
//! The catalog becomes available asynchronously (e.g. after the script bundle
//! is fetched). [`ScriptCatalog`] memoizes that future so every navigation
//! event awaits the same resolution.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::core::types::Script;

/// Known scripts keyed by id.
pub type Scripts = HashMap<String, Script>;

/// Source of the script catalog, queried once per navigation event.
///
/// The URL reactor keeps one subscription per source; handing the loader a
/// different source re-subscribes.
pub trait CatalogSource: Send + Sync {
    fn scripts(&self) -> BoxFuture<'static, Arc<Scripts>>;
}

/// Shareable, memoized catalog future.
#[derive(Clone)]
pub struct ScriptCatalog {
    inner: Shared<BoxFuture<'static, Arc<Scripts>>>,
}

impl std::fmt::Debug for ScriptCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCatalog")
            .field("resolved", &self.inner.peek().is_some())
            .finish()
    }
}

impl ScriptCatalog {
    pub fn new<F>(scripts: F) -> Self
    where
        F: Future<Output = Arc<Scripts>> + Send + 'static,
    {
        Self {
            inner: scripts.boxed().shared(),
        }
    }

    /// Catalog that is already available.
    pub fn ready(scripts: Scripts) -> Self {
        Self::new(future::ready(Arc::new(scripts)))
    }

    /// Catalog delivered later through `rx`.
    ///
    /// If the sender is dropped the catalog never resolves; navigations stay
    /// pending instead of being treated as misses.
    pub fn from_receiver(rx: oneshot::Receiver<Scripts>) -> Self {
        Self::new(async move {
            match rx.await {
                Ok(scripts) => {
                    debug!(count = scripts.len(), "script catalog resolved");
                    Arc::new(scripts)
                }
                Err(_) => {
                    warn!("script catalog sender dropped before resolving");
                    future::pending::<Arc<Scripts>>().await
                }
            }
        })
    }

    /// Resolved catalog, if available yet.
    #[cfg(any(test, feature = "test-support"))]
    pub fn peek(&self) -> Option<Arc<Scripts>> {
        self.inner.peek().cloned()
    }
}

impl CatalogSource for ScriptCatalog {
    fn scripts(&self) -> BoxFuture<'static, Arc<Scripts>> {
        self.inner.clone().boxed()
    }
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default)]
    scripts: Scripts,
}

/// Parse a TOML script bundle.
///
/// ```toml
/// [scripts."px/cluster"]
/// pxl = "import px\n..."
/// vis = '{"variables": []}'
/// ```
pub fn parse_bundle(contents: &str) -> Result<Scripts> {
    let bundle: Bundle = toml::from_str(contents).context("parse script bundle toml")?;
    if let Some((id, _)) = bundle.scripts.iter().find(|(_, s)| s.pxl.trim().is_empty()) {
        return Err(anyhow!("script '{}' has empty pxl", id));
    }
    Ok(bundle.scripts)
}

/// Load a TOML script bundle from disk.
pub fn load_bundle(path: &Path) -> Result<Scripts> {
    debug!(path = %path.display(), "loading script bundle");
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_bundle(&contents).with_context(|| format!("load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"
[scripts."px/cluster"]
pxl = "import px\npx.display(px.DataFrame('process_stats'))"
vis = '{"variables": [{"name": "start_time", "type": "PX_STRING", "defaultValue": "-5m"}]}'

[scripts."px/no_vis"]
pxl = "import px"
"#;

    #[test]
    fn bundle_parses_scripts_by_id() {
        let scripts = parse_bundle(BUNDLE).expect("parse");
        assert_eq!(scripts.len(), 2);
        assert!(scripts["px/cluster"].vis.contains("start_time"));
        assert_eq!(scripts["px/no_vis"].vis, "");
    }

    #[test]
    fn bundle_rejects_empty_pxl() {
        let err = parse_bundle("[scripts.\"px/x\"]\npxl = \" \"\n").expect_err("should fail");
        assert!(format!("{err:#}").contains("px/x"));
    }

    #[test]
    fn load_bundle_reads_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scripts.toml");
        fs::write(&path, BUNDLE).expect("write");
        assert_eq!(load_bundle(&path).expect("load").len(), 2);
    }

    #[test]
    fn load_missing_bundle_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_bundle(&temp.path().join("missing.toml")).is_err());
    }

    #[tokio::test]
    async fn ready_catalog_resolves_immediately() {
        let catalog = ScriptCatalog::ready(parse_bundle(BUNDLE).expect("parse"));
        let scripts = catalog.scripts().await;
        assert!(scripts.contains_key("px/cluster"));
        assert!(catalog.peek().is_some());
    }

    #[tokio::test]
    async fn receiver_catalog_is_shared_between_queries() {
        let (tx, rx) = oneshot::channel();
        let catalog = ScriptCatalog::from_receiver(rx);
        let first = catalog.scripts();
        let second = catalog.scripts();
        assert!(catalog.peek().is_none());

        tx.send(parse_bundle(BUNDLE).expect("parse")).expect("send");
        let (a, b) = tokio::join!(first, second);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
