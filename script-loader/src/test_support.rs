//! Test-only helpers: sample scripts, a gated catalog, and a mount harness.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{oneshot, watch};

use crate::core::types::{LiveViewPage, NavigationEvent, Script, Selection};
use crate::core::vis::parse_vis;
use crate::io::catalog::{CatalogSource, ScriptCatalog, Scripts};
use crate::io::context::{SessionContext, SessionResults};
use crate::io::executor::RecordingExecutor;
use crate::io::navigation::{UrlParams, parse_navigation};
use crate::loader::{LoaderDeps, ScriptLoader};

pub const CLUSTER_VIS: &str = r#"{"variables": [
    {"name": "start_time", "type": "PX_STRING", "defaultValue": "-5m"}
], "widgets": [{"name": "Nodes", "func": {"name": "nodes"}}]}"#;

pub const POD_VIS: &str = r#"{"variables": [
    {"name": "start_time", "type": "PX_STRING", "defaultValue": "-5m"},
    {"name": "pod", "type": "PX_POD"}
]}"#;

pub const DEFAULT_PXL: &str = "df = px.display(px.DataFrame('http_events'))";

fn script(pxl: &str, vis: &str) -> Script {
    Script {
        pxl: pxl.to_string(),
        vis: vis.to_string(),
    }
}

/// Deterministic catalog covering every loader branch.
///
/// - `px/cluster`, `px/nodes`, `px/http_data`: runnable.
/// - `px/pod`: requires a `pod` argument.
/// - `px/trace`: mutating.
/// - `px/bad_vis`: vis spec does not parse.
pub fn sample_scripts() -> Scripts {
    let mut scripts = Scripts::new();
    scripts.insert(
        "px/cluster".to_string(),
        script("import px\npx.display(px.DataFrame('process_stats'))", CLUSTER_VIS),
    );
    scripts.insert(
        "px/nodes".to_string(),
        script("import px\npx.display(px.DataFrame('node_stats'))", CLUSTER_VIS),
    );
    scripts.insert(
        "px/http_data".to_string(),
        script("import px\npx.display(px.DataFrame('http_events'))", CLUSTER_VIS),
    );
    scripts.insert(
        "px/pod".to_string(),
        script("import px\npx.display(px.DataFrame('process_stats'))", POD_VIS),
    );
    scripts.insert(
        "px/trace".to_string(),
        script("import px\nimport pxtrace\n", CLUSTER_VIS),
    );
    scripts.insert(
        "px/bad_vis".to_string(),
        script("import px", "{\"variables\": ["),
    );
    scripts
}

/// Parse `url` into a navigation event.
pub fn navigation(url: &str) -> NavigationEvent {
    parse_navigation(url).expect("navigation url")
}

/// Complete context defaults (code plus vis).
pub fn default_selection() -> Selection {
    Selection {
        pxl: DEFAULT_PXL.to_string(),
        vis: Some(parse_vis(CLUSTER_VIS).expect("vis")),
        args: Default::default(),
        id: "px/http_data".to_string(),
        live_view_page: LiveViewPage::Default,
    }
}

/// Catalog whose every query blocks until released by the test.
///
/// Queries are released individually, in any order, to simulate out-of-order
/// catalog resolutions.
pub struct GatedCatalog {
    scripts: Arc<Scripts>,
    gates: Mutex<VecDeque<Option<oneshot::Sender<()>>>>,
    queries: watch::Sender<usize>,
}

impl GatedCatalog {
    pub fn new(scripts: Scripts) -> Arc<Self> {
        let (queries, _) = watch::channel(0);
        Arc::new(Self {
            scripts: Arc::new(scripts),
            gates: Mutex::new(VecDeque::new()),
            queries,
        })
    }

    /// Wait until at least `n` queries have been made.
    pub async fn wait_for_queries(&self, n: usize) {
        let mut rx = self.queries.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Release the query with index `index` (0-based, in query order).
    pub fn release(&self, index: usize) {
        let sender = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(index)
            .and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

impl CatalogSource for GatedCatalog {
    fn scripts(&self) -> BoxFuture<'static, Arc<Scripts>> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Some(tx));
        self.queries.send_modify(|count| *count += 1);
        let scripts = self.scripts.clone();
        async move {
            let _ = rx.await;
            scripts
        }
        .boxed()
    }
}

/// Collaborators wired up for mounting a loader in tests.
pub struct Harness {
    pub navigation: UrlParams,
    pub context: Arc<SessionContext>,
    pub results: Arc<SessionResults>,
    pub executor: Arc<RecordingExecutor>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            navigation: UrlParams::new(16),
            context: Arc::new(SessionContext::default()),
            results: Arc::new(SessionResults::default()),
            executor: Arc::new(RecordingExecutor::default()),
        }
    }

    pub fn mount(&self, catalog: Arc<dyn CatalogSource>) -> ScriptLoader {
        ScriptLoader::mount(LoaderDeps {
            navigation: self.navigation.clone(),
            catalog,
            context: self.context.clone(),
            results: self.results.clone(),
            executor: self.executor.clone(),
        })
    }

    /// Mount against an already resolved [`sample_scripts`] catalog.
    pub fn mount_ready(&self) -> ScriptLoader {
        self.mount(Arc::new(ScriptCatalog::ready(sample_scripts())))
    }

    pub fn navigate(&self, url: &str) {
        self.navigation.set_url(url).expect("navigate");
    }

    /// Ids of executed requests, in order.
    pub fn executed_ids(&self) -> Vec<String> {
        self.executor
            .requests()
            .into_iter()
            .map(|request| request.id)
            .collect()
    }
}
