//! Shared deterministic types for loader core logic.
//!
//! These types define the contracts between the reactors and their
//! collaborators. They do not depend on external state or I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::vis::Vis;

/// Script arguments keyed by variable name.
///
/// Ordered so serialized requests are stable.
pub type Args = BTreeMap<String, String>;

/// Progress of the load decision for the mounted loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    #[default]
    Unloaded,
    /// The URL named a known script and the URL reactor handled it.
    UrlLoaded,
    /// The URL named no known script; context defaults may run.
    UrlSkipped,
    /// Context defaults ran after the URL was skipped.
    ContextLoaded,
}

impl LoadState {
    /// True for `from -> to` pairs the state machine allows.
    pub fn can_transition_to(self, to: LoadState) -> bool {
        matches!(
            (self, to),
            (LoadState::Unloaded, LoadState::UrlLoaded)
                | (LoadState::Unloaded, LoadState::UrlSkipped)
                | (LoadState::UrlSkipped, LoadState::ContextLoaded)
        )
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::UrlLoaded | LoadState::ContextLoaded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Unloaded => "unloaded",
            LoadState::UrlLoaded => "url-loaded",
            LoadState::UrlSkipped => "url-skipped",
            LoadState::ContextLoaded => "context-loaded",
        }
    }
}

/// Logical live-view page derived from a pathname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiveViewPage {
    /// URL-parameterized page; the script id comes from the URL.
    #[default]
    Default,
    Cluster,
    Namespace,
    Namespaces,
    Node,
    Nodes,
    Pod,
    Pods,
    Service,
    Services,
}

impl LiveViewPage {
    /// Well-known script id for non-default pages.
    pub fn script_id(self) -> Option<&'static str> {
        match self {
            LiveViewPage::Default => None,
            LiveViewPage::Cluster => Some("px/cluster"),
            LiveViewPage::Namespace => Some("px/namespace"),
            LiveViewPage::Namespaces => Some("px/namespaces"),
            LiveViewPage::Node => Some("px/node"),
            LiveViewPage::Nodes => Some("px/nodes"),
            LiveViewPage::Pod => Some("px/pod"),
            LiveViewPage::Pods => Some("px/pods"),
            LiveViewPage::Service => Some("px/service"),
            LiveViewPage::Services => Some("px/services"),
        }
    }
}

/// One navigation notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub pathname: String,
    pub args: Args,
    /// Value of the `script` URL parameter, if any.
    pub script_id: Option<String>,
}

/// Catalog entry: executable code plus its unparsed vis spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub pxl: String,
    #[serde(default)]
    pub vis: String,
}

/// The single output artifact handed to an executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub id: String,
    pub pxl: String,
    pub vis: Vis,
    pub args: Args,
    pub live_view_page: LiveViewPage,
    /// Set when the request originates from the URL, which is already current.
    pub skip_url_update: bool,
}

/// The script currently selected in the script context.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub pxl: String,
    pub vis: Option<Vis>,
    pub args: Args,
    pub id: String,
    pub live_view_page: LiveViewPage,
}

impl Selection {
    /// Build a default-execution request, if both code and vis are present.
    pub fn to_request(&self) -> Option<ExecutionRequest> {
        if self.pxl.is_empty() {
            return None;
        }
        let vis = self.vis.clone()?;
        Some(ExecutionRequest {
            id: self.id.clone(),
            pxl: self.pxl.clone(),
            vis,
            args: self.args.clone(),
            live_view_page: self.live_view_page,
            skip_url_update: false,
        })
    }
}
