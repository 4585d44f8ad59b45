//! Orchestration of the two load reactors.
//!
//! - The URL-change reactor subscribes to [`UrlParams`]. Each navigation is
//!   handled in its own continuation: await the catalog, classify the path,
//!   then either skip (`unloaded -> url-skipped`) or publish and execute the
//!   selected script (`unloaded -> url-loaded`).
//! - The context-default reactor watches the load state, the context selection
//!   and the executor. Once the URL was skipped and the context offers both
//!   code and vis, it runs the default (`url-skipped -> context-loaded`).
//!
//! All state changes go through [`LoadStateCell::transition`], so a late or
//! repeated decision never overrides a state that already advanced.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::core::entity::{match_live_view_entity, merge_args, selected_script_id};
use crate::core::load_state::LoadStateCell;
use crate::core::pxl::contains_mutation;
use crate::core::types::{ExecutionRequest, LoadState, NavigationEvent};
use crate::io::catalog::{CatalogSource, Scripts};
use crate::io::context::{ResultsSink, ScriptContext};
use crate::io::executor::{Executor, LatestExecutor};
use crate::io::navigation::UrlParams;

/// Collaborators a [`ScriptLoader`] is mounted with.
pub struct LoaderDeps {
    pub navigation: UrlParams,
    pub catalog: Arc<dyn CatalogSource>,
    pub context: Arc<dyn ScriptContext>,
    pub results: Arc<dyn ResultsSink>,
    pub executor: Arc<dyn Executor>,
}

/// Mounted loader. Dropping it unsubscribes both reactors.
///
/// Continuations already dispatched for earlier navigations are not cancelled;
/// they still complete, and the transition guards keep them harmless.
pub struct ScriptLoader {
    reactors: Arc<Reactors>,
    navigation: UrlParams,
    catalog: Arc<dyn CatalogSource>,
    url_task: Option<JoinHandle<()>>,
    context_task: Option<JoinHandle<()>>,
}

/// State shared by the subscription task, its continuations, and the
/// context-default reactor.
struct Reactors {
    state: LoadStateCell,
    executor: LatestExecutor,
    context: Arc<dyn ScriptContext>,
    results: Arc<dyn ResultsSink>,
    /// Sequence number of the most recently dispatched navigation.
    latest_seq: AtomicU64,
    /// Set once the URL reactor published a selection; the context selection
    /// is no longer a default from then on.
    url_published: AtomicBool,
    /// Held for the whole of each reactor decision, so the context reactor
    /// never observes a URL publish halfway through.
    decisions: Mutex<()>,
    /// Continuations dispatched but not finished.
    in_flight: watch::Sender<usize>,
}

impl ScriptLoader {
    /// Mount the loader: state starts `unloaded`, the navigation subscription
    /// and the context-default reactor start running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(deps: LoaderDeps) -> Self {
        let (in_flight, _) = watch::channel(0);
        let reactors = Arc::new(Reactors {
            state: LoadStateCell::new(),
            executor: LatestExecutor::new(deps.executor),
            context: deps.context,
            results: deps.results,
            latest_seq: AtomicU64::new(0),
            url_published: AtomicBool::new(false),
            decisions: Mutex::new(()),
            in_flight,
        });

        let url_task = spawn_url_reactor(
            reactors.clone(),
            deps.navigation.subscribe(),
            deps.catalog.clone(),
        );
        let context_task = spawn_context_reactor(reactors.clone());
        info!("script loader mounted");

        Self {
            reactors,
            navigation: deps.navigation,
            catalog: deps.catalog,
            url_task: Some(url_task),
            context_task: Some(context_task),
        }
    }

    pub fn state(&self) -> LoadState {
        self.reactors.state.get()
    }

    pub fn watch_state(&self) -> watch::Receiver<LoadState> {
        self.reactors.state.subscribe()
    }

    /// Wait until the load state satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> LoadState
    where
        F: FnMut(LoadState) -> bool,
    {
        let mut rx = self.watch_state();
        match rx.wait_for(|state| predicate(*state)).await {
            Ok(state) => *state,
            // The cell lives as long as `self`.
            Err(_) => self.state(),
        }
    }

    /// Replace the execute capability. Continuations still in flight dispatch
    /// to this one.
    pub fn set_executor(&self, executor: Arc<dyn Executor>) {
        self.reactors.executor.replace(executor);
    }

    /// Point the loader at a catalog source. Re-subscribes only when the
    /// source identity changes.
    pub fn set_catalog(&mut self, catalog: Arc<dyn CatalogSource>) {
        if std::ptr::addr_eq(Arc::as_ptr(&self.catalog), Arc::as_ptr(&catalog)) {
            return;
        }
        debug!("catalog source changed, re-subscribing");
        if let Some(task) = self.url_task.take() {
            task.abort();
        }
        self.url_task = Some(spawn_url_reactor(
            self.reactors.clone(),
            self.navigation.subscribe(),
            catalog.clone(),
        ));
        self.catalog = catalog;
    }

    /// Wait until every navigation picked up so far has been fully handled,
    /// then settle the context defaults against the resulting state and
    /// selection.
    ///
    /// Cooperative: yields first so the subscription task can dispatch events
    /// broadcast just before the call. Settling runs the same guarded decision
    /// as the context-default reactor, so once this returns any default the
    /// current state calls for has run (at most once).
    pub async fn idle(&self) {
        tokio::task::yield_now().await;
        let mut rx = self.reactors.in_flight.subscribe();
        let _ = rx.wait_for(|pending| *pending == 0).await;
        self.reactors.apply_context_defaults();
        tokio::task::yield_now().await;
    }

    /// Unsubscribe from navigation and stop the context-default reactor.
    pub async fn unmount(mut self) {
        for task in self.stop_tasks() {
            // Cancellation is the expected outcome.
            let _ = task.await;
        }
        info!(state = self.state().as_str(), "script loader unmounted");
    }

    fn stop_tasks(&mut self) -> Vec<JoinHandle<()>> {
        [self.url_task.take(), self.context_task.take()]
            .into_iter()
            .flatten()
            .inspect(|task| task.abort())
            .collect()
    }
}

impl Drop for ScriptLoader {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

fn spawn_url_reactor(
    reactors: Arc<Reactors>,
    mut rx: broadcast::Receiver<NavigationEvent>,
    catalog: Arc<dyn CatalogSource>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let seq = reactors.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;
                    let guard = InFlight::new(reactors.clone());
                    let scripts = catalog.scripts();
                    debug!(seq, pathname = %event.pathname, "navigation dispatched");
                    tokio::spawn(async move {
                        let scripts = scripts.await;
                        guard.reactors.handle_navigation(seq, &event, &scripts);
                        drop(guard);
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "loader lagged, navigation events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_context_reactor(reactors: Arc<Reactors>) -> JoinHandle<()> {
    let mut state_rx = reactors.state.subscribe();
    let mut selection_rx = reactors.context.watch_selection();
    let mut executor_rx = reactors.executor.subscribe();
    tokio::spawn(async move {
        loop {
            reactors.apply_context_defaults();
            let changed = tokio::select! {
                changed = state_rx.changed() => changed,
                changed = selection_rx.changed() => changed,
                changed = executor_rx.changed() => changed,
            };
            if changed.is_err() {
                break;
            }
        }
    })
}

/// Counts a dispatched continuation until it is dropped, including on panic.
struct InFlight {
    reactors: Arc<Reactors>,
}

impl InFlight {
    fn new(reactors: Arc<Reactors>) -> Self {
        reactors.in_flight.send_modify(|pending| *pending += 1);
        Self { reactors }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.reactors
            .in_flight
            .send_modify(|pending| *pending = pending.saturating_sub(1));
    }
}

impl Reactors {
    /// URL-change reactor body, run once the catalog for `event` resolved.
    #[instrument(skip_all, fields(seq = seq, pathname = %event.pathname))]
    fn handle_navigation(&self, seq: u64, event: &NavigationEvent, scripts: &Scripts) {
        let _decision = self.decisions.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = self.latest_seq.load(Ordering::SeqCst);
        if latest != seq {
            debug!(latest, "navigation superseded before catalog resolved");
            return;
        }

        let entity = match_live_view_entity(&event.pathname);
        let selected = selected_script_id(&entity, event)
            .and_then(|id| scripts.get(&id).map(|script| (id, script)));
        let Some((id, script)) = selected else {
            debug!(
                page = ?entity.page,
                cluster = ?entity.cluster,
                script_id = ?event.script_id,
                "no catalog script for navigation"
            );
            self.state.transition(LoadState::Unloaded, LoadState::UrlSkipped);
            return;
        };

        debug!(id = %id, page = ?entity.page, cluster = ?entity.cluster, "catalog script selected");

        let merged = merge_args(&event.args, &entity.params);
        let Some(vis) = self.context.parse_vis_or_show_error(&script.vis) else {
            return;
        };
        let Some(args) = self.context.args_for_vis_or_show_error(&vis, &merged, &id) else {
            return;
        };

        self.results.clear_results();
        self.url_published.store(true, Ordering::SeqCst);
        self.context.set_script(
            vis.clone(),
            script.pxl.clone(),
            args.clone(),
            id.clone(),
            entity.page,
        );

        // Argument state is initialized from the published selection; a
        // failure here leaves the script selected but not executed.
        if self
            .context
            .args_for_vis_or_show_error(&vis, &merged, &id)
            .is_none()
        {
            return;
        }

        if contains_mutation(&script.pxl) {
            info!(id = %id, "script contains a mutation, not executing automatically");
        } else {
            self.executor.execute(ExecutionRequest {
                id,
                pxl: script.pxl.clone(),
                vis,
                args,
                live_view_page: entity.page,
                skip_url_update: true,
            });
        }

        self.state.transition(LoadState::Unloaded, LoadState::UrlLoaded);
    }

    /// Context-default reactor body.
    fn apply_context_defaults(&self) {
        let _decision = self.decisions.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state.get() != LoadState::UrlSkipped {
            return;
        }
        if self.url_published.load(Ordering::SeqCst) {
            debug!("selection came from the url, not running context defaults");
            return;
        }
        let Some(request) = self.context.selection().to_request() else {
            debug!("context defaults incomplete, waiting");
            return;
        };
        // Claim the transition first so the default runs at most once.
        if self
            .state
            .transition(LoadState::UrlSkipped, LoadState::ContextLoaded)
        {
            self.executor.execute(request);
        }
    }
}
