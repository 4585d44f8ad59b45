//! Lifecycle tests for a mounted loader.
//!
//! These tests mount the loader against in-process collaborators, drive it
//! through the navigation stream, and verify the load-state transitions and
//! the execution requests that reach the executor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use script_loader::core::types::{Args, LiveViewPage, LoadState, Selection};
use script_loader::core::vis::Vis;
use script_loader::io::catalog::{ScriptCatalog, Scripts};
use script_loader::io::context::{ScriptContext, SessionContext};
use script_loader::io::executor::RecordingExecutor;
use script_loader::loader::{LoaderDeps, ScriptLoader};
use script_loader::test_support::{GatedCatalog, Harness, default_selection, sample_scripts};
use tokio::sync::{oneshot, watch};

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Scenario: known well-known page with a matching, non-mutating script.
#[tokio::test]
async fn cluster_page_executes_once_with_skip_url_update() {
    let h = Harness::new();
    let loader = h.mount_ready();

    h.navigate("/live/clusters/prod?start_time=-30m");
    let state = within(loader.wait_for_state(|s| s != LoadState::Unloaded)).await;
    within(loader.idle()).await;

    assert_eq!(state, LoadState::UrlLoaded);
    let requests = h.executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, "px/cluster");
    assert!(requests[0].skip_url_update);
    assert_eq!(
        requests[0].args.get("start_time").map(String::as_str),
        Some("-30m")
    );
    assert_eq!(h.results.clear_count(), 1);
}

/// Scenario: unknown script id, context supplies defaults later.
#[tokio::test]
async fn unknown_script_falls_back_to_context_defaults_once() {
    let h = Harness::new();
    let loader = h.mount_ready();

    h.navigate("/live?script=unknown-script");
    within(loader.wait_for_state(|s| s == LoadState::UrlSkipped)).await;
    within(loader.idle()).await;
    assert!(h.executor.requests().is_empty());

    h.context.set_defaults(default_selection());
    within(loader.wait_for_state(|s| s == LoadState::ContextLoaded)).await;
    within(loader.idle()).await;

    // Further context changes never re-run the default. `idle` settles the
    // context defaults itself, so the new selection has been evaluated here.
    h.context.set_defaults(default_selection());
    within(loader.idle()).await;

    let requests = h.executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, "px/http_data");
    assert!(!requests[0].skip_url_update);
    assert_eq!(loader.state(), LoadState::ContextLoaded);
}

#[tokio::test]
async fn defaults_present_at_mount_run_after_skip() {
    let h = Harness::new();
    h.context.set_defaults(default_selection());
    let loader = h.mount_ready();
    within(loader.idle()).await;
    assert_eq!(loader.state(), LoadState::Unloaded);
    assert!(h.executor.requests().is_empty());

    h.navigate("/live");
    within(loader.wait_for_state(|s| s == LoadState::ContextLoaded)).await;
    within(loader.idle()).await;
    assert_eq!(h.executed_ids(), vec!["px/http_data".to_string()]);
}

#[tokio::test]
async fn context_defaults_do_not_run_after_url_load() {
    let h = Harness::new();
    h.context.set_defaults(default_selection());
    let loader = h.mount_ready();

    h.navigate("/live/clusters/prod/nodes");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;

    assert_eq!(h.executed_ids(), vec!["px/nodes".to_string()]);
}

#[tokio::test]
async fn mutating_script_is_selected_but_not_executed() {
    let h = Harness::new();
    h.context.set_defaults(default_selection());
    let loader = h.mount_ready();

    h.navigate("/live?script=px/trace");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;

    assert!(h.executor.requests().is_empty());
    let selection = h.context.selection();
    assert_eq!(selection.id, "px/trace");
    assert!(selection.vis.is_some());
}

#[tokio::test]
async fn failed_resolution_leaves_state_for_next_navigation() {
    let h = Harness::new();
    let loader = h.mount_ready();

    h.navigate("/live?script=px/bad_vis");
    within(loader.idle()).await;
    assert_eq!(loader.state(), LoadState::Unloaded);
    assert_eq!(h.context.errors().len(), 1);

    h.navigate("/live?script=px/pod&pod=ns/web-0");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;
    assert_eq!(h.executed_ids(), vec!["px/pod".to_string()]);
}

/// Scenario: A then B, with A's catalog resolution completing after B's.
#[tokio::test]
async fn late_resolution_of_superseded_navigation_is_a_no_op() {
    let h = Harness::new();
    let catalog = GatedCatalog::new(sample_scripts());
    let loader = h.mount(catalog.clone());

    h.navigate("/live?script=px/http_data");
    h.navigate("/live/clusters/prod");
    within(catalog.wait_for_queries(2)).await;

    catalog.release(1);
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;

    catalog.release(0);
    within(loader.idle()).await;

    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
    assert_eq!(h.results.clear_count(), 1);
    assert_eq!(loader.state(), LoadState::UrlLoaded);
}

#[tokio::test]
async fn late_miss_never_overrides_loaded_state() {
    let h = Harness::new();
    h.context.set_defaults(default_selection());
    let catalog = GatedCatalog::new(sample_scripts());
    let loader = h.mount(catalog.clone());

    h.navigate("/live?script=unknown-script");
    within(catalog.wait_for_queries(1)).await;
    h.navigate("/live/clusters/prod");
    within(catalog.wait_for_queries(2)).await;

    catalog.release(1);
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    catalog.release(0);
    within(loader.idle()).await;

    assert_eq!(loader.state(), LoadState::UrlLoaded);
    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
}

#[tokio::test]
async fn terminal_state_is_kept_across_later_navigations() {
    let h = Harness::new();
    let loader = h.mount_ready();

    h.navigate("/live/clusters/prod");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;

    h.navigate("/live?script=unknown-script");
    within(loader.idle()).await;
    h.navigate("/live/clusters/prod/nodes");
    within(loader.idle()).await;

    assert_eq!(loader.state(), LoadState::UrlLoaded);
    assert_eq!(
        h.executed_ids(),
        vec!["px/cluster".to_string(), "px/nodes".to_string()]
    );
}

#[tokio::test]
async fn unmount_stops_future_events_but_in_flight_completion_is_guard_safe() {
    let h = Harness::new();
    let catalog = GatedCatalog::new(sample_scripts());
    let loader = h.mount(catalog.clone());
    let mut state_rx = loader.watch_state();

    h.navigate("/live/clusters/prod");
    within(catalog.wait_for_queries(1)).await;

    within(loader.unmount()).await;
    assert_eq!(h.navigation.subscriber_count(), 0);
    h.navigate("/live/clusters/prod/nodes");

    catalog.release(0);
    within(state_rx.wait_for(|s| *s == LoadState::UrlLoaded))
        .await
        .expect("state cell alive");
    tokio::task::yield_now().await;

    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
}

#[tokio::test]
async fn in_flight_navigation_uses_executor_current_at_dispatch() {
    let h = Harness::new();
    let catalog = GatedCatalog::new(sample_scripts());
    let loader = h.mount(catalog.clone());

    h.navigate("/live/clusters/prod");
    within(catalog.wait_for_queries(1)).await;

    let replacement = Arc::new(RecordingExecutor::default());
    loader.set_executor(replacement.clone());
    catalog.release(0);
    within(loader.idle()).await;

    assert!(h.executor.requests().is_empty());
    assert_eq!(replacement.count(), 1);
}

#[tokio::test]
async fn navigation_waits_for_catalog_availability() {
    let h = Harness::new();
    let (tx, rx) = oneshot::channel();
    let loader = h.mount(Arc::new(ScriptCatalog::from_receiver(rx)));

    h.navigate("/live/clusters/prod");
    tokio::task::yield_now().await;
    assert_eq!(loader.state(), LoadState::Unloaded);
    assert!(h.executor.requests().is_empty());

    tx.send(sample_scripts()).expect("send catalog");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;
    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
}

#[tokio::test]
async fn changing_catalog_identity_resubscribes() {
    let h = Harness::new();
    let empty = Arc::new(ScriptCatalog::ready(Scripts::new()));
    let mut loader = h.mount(empty.clone());
    assert_eq!(h.navigation.subscriber_count(), 1);

    loader.set_catalog(empty);
    assert_eq!(h.navigation.subscriber_count(), 1);

    loader.set_catalog(Arc::new(ScriptCatalog::ready(sample_scripts())));
    within(loader.idle()).await;

    h.navigate("/live/clusters/prod");
    within(loader.wait_for_state(|s| s == LoadState::UrlLoaded)).await;
    within(loader.idle()).await;
    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
}

/// Context whose selection reads are slow, so the context-default reactor is
/// still deciding while a URL hit is being handled on another worker.
struct SlowSelectionContext {
    inner: Arc<SessionContext>,
}

impl ScriptContext for SlowSelectionContext {
    fn selection(&self) -> Selection {
        std::thread::sleep(Duration::from_millis(300));
        self.inner.selection()
    }

    fn watch_selection(&self) -> watch::Receiver<Selection> {
        self.inner.watch_selection()
    }

    fn set_script(&self, vis: Vis, pxl: String, args: Args, id: String, page: LiveViewPage) {
        self.inner.set_script(vis, pxl, args, id, page);
    }

    fn parse_vis_or_show_error(&self, source: &str) -> Option<Vis> {
        self.inner.parse_vis_or_show_error(source)
    }

    fn args_for_vis_or_show_error(&self, vis: &Vis, args: &Args, script_id: &str) -> Option<Args> {
        self.inner.args_for_vis_or_show_error(vis, args, script_id)
    }
}

/// Scenario: miss, then hit, with both reactors running on separate workers.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn url_hit_after_skip_runs_once_on_multi_thread_runtime() {
    let h = Harness::new();
    let loader = ScriptLoader::mount(LoaderDeps {
        navigation: h.navigation.clone(),
        catalog: Arc::new(ScriptCatalog::ready(sample_scripts())),
        context: Arc::new(SlowSelectionContext {
            inner: h.context.clone(),
        }),
        results: h.results.clone(),
        executor: h.executor.clone(),
    });

    h.navigate("/live?script=unknown-script");
    within(loader.wait_for_state(|s| s == LoadState::UrlSkipped)).await;
    let mut selection_rx = h.context.watch_selection();
    h.navigate("/live/clusters/prod");
    within(selection_rx.wait_for(|selection| selection.id == "px/cluster"))
        .await
        .expect("context alive");
    within(loader.idle()).await;

    assert_eq!(h.executed_ids(), vec!["px/cluster".to_string()]);
    assert_eq!(loader.state(), LoadState::UrlSkipped);
    assert_eq!(h.context.selection().id, "px/cluster");
}
