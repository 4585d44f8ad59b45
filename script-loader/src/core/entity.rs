//! Deterministic classification of live-view pathnames.

use percent_encoding::percent_decode_str;

use crate::core::types::{Args, LiveViewPage, NavigationEvent};

/// Page classification plus the entity parameters the path carries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveViewEntity {
    pub page: LiveViewPage,
    pub cluster: Option<String>,
    /// Script arguments implied by the path (e.g. `namespace`, `pod`).
    pub params: Args,
}

/// Classify `pathname` into a live-view page.
///
/// An optional leading `live` segment is ignored; empty segments (double or
/// trailing slashes) are skipped. Segments are percent-decoded after
/// splitting, so an encoded `/` stays inside its segment. Paths outside the known routes map to
/// [`LiveViewPage::Default`].
pub fn match_live_view_entity(pathname: &str) -> LiveViewEntity {
    let decoded: Vec<String> = pathname
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect();
    let mut segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    if segments.first() == Some(&"live") {
        segments.remove(0);
    }

    let (cluster, rest) = match segments.as_slice() {
        ["clusters", cluster, rest @ ..] => (*cluster, rest),
        _ => return LiveViewEntity::default(),
    };

    let (page, params) = match rest {
        [] => (LiveViewPage::Cluster, Vec::new()),
        ["namespaces"] => (LiveViewPage::Namespaces, Vec::new()),
        ["namespaces", ns] => (LiveViewPage::Namespace, vec![("namespace", ns.to_string())]),
        ["namespaces", ns, "pods"] => (LiveViewPage::Pods, vec![("namespace", ns.to_string())]),
        ["namespaces", ns, "pods", pod] => (LiveViewPage::Pod, vec![("pod", format!("{ns}/{pod}"))]),
        ["namespaces", ns, "services"] => {
            (LiveViewPage::Services, vec![("namespace", ns.to_string())])
        }
        ["namespaces", ns, "services", svc] => (
            LiveViewPage::Service,
            vec![("service", format!("{ns}/{svc}"))],
        ),
        ["nodes"] => (LiveViewPage::Nodes, Vec::new()),
        ["nodes", node] => (LiveViewPage::Node, vec![("node", node.to_string())]),
        _ => return LiveViewEntity::default(),
    };

    LiveViewEntity {
        page,
        cluster: Some(cluster.to_string()),
        params: params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    }
}

/// Script id a navigation selects: the URL's own id on the default page,
/// the page's well-known id otherwise.
pub fn selected_script_id(entity: &LiveViewEntity, event: &NavigationEvent) -> Option<String> {
    match entity.page.script_id() {
        Some(id) => Some(id.to_string()),
        None => event.script_id.clone(),
    }
}

/// URL arguments overlaid with entity parameters (entity parameters win).
pub fn merge_args(url_args: &Args, params: &Args) -> Args {
    let mut merged = url_args.clone();
    merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
