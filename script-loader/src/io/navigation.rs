//! URL-change notifications.
//!
//! [`UrlParams`] is the navigation source the URL reactor subscribes to. Every
//! navigation is parsed into a [`NavigationEvent`] and broadcast to all current
//! subscribers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

use crate::core::types::{Args, NavigationEvent};

/// Query parameter naming the script on the default page.
pub const SCRIPT_PARAM: &str = "script";

const BASE_URL: &str = "http://localhost/";

/// Broadcast source of navigation events.
#[derive(Debug, Clone)]
pub struct UrlParams {
    tx: Arc<broadcast::Sender<NavigationEvent>>,
}

impl UrlParams {
    /// `capacity` bounds how many events a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast `event`. Returns how many subscribers received it.
    pub fn navigate(&self, event: NavigationEvent) -> usize {
        debug!(pathname = %event.pathname, script_id = ?event.script_id, "navigation");
        self.tx.send(event).unwrap_or(0)
    }

    /// Parse `url` and broadcast the resulting event.
    pub fn set_url(&self, url: &str) -> Result<NavigationEvent> {
        let event = parse_navigation(url)?;
        self.navigate(event.clone());
        Ok(event)
    }
}

/// Parse an absolute URL or a path with query into a [`NavigationEvent`].
///
/// The `script` parameter becomes the script id (empty means none); all other
/// query parameters become arguments, last occurrence winning.
pub fn parse_navigation(url: &str) -> Result<NavigationEvent> {
    let base = Url::parse(BASE_URL).context("parse base url")?;
    let parsed = base
        .join(url)
        .with_context(|| format!("parse navigation url {url}"))?;

    let mut script_id = None;
    let mut args = Args::new();
    for (key, value) in parsed.query_pairs() {
        if key == SCRIPT_PARAM {
            script_id = Some(value.into_owned()).filter(|id| !id.is_empty());
        } else {
            args.insert(key.into_owned(), value.into_owned());
        }
    }

    Ok(NavigationEvent {
        pathname: parsed.path().to_string(),
        args,
        script_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_are_split() {
        let event =
            parse_navigation("/live?script=px%2Fhttp_data&start_time=-5m&namespace=default")
                .expect("parse");
        assert_eq!(event.pathname, "/live");
        assert_eq!(event.script_id.as_deref(), Some("px/http_data"));
        assert_eq!(event.args.get("start_time").map(String::as_str), Some("-5m"));
        assert_eq!(event.args.get("namespace").map(String::as_str), Some("default"));
        assert!(!event.args.contains_key(SCRIPT_PARAM));
    }

    #[test]
    fn absolute_urls_keep_only_path() {
        let event = parse_navigation("https://work.example.com/live/clusters/prod").expect("parse");
        assert_eq!(event.pathname, "/live/clusters/prod");
        assert!(event.script_id.is_none());
        assert!(event.args.is_empty());
    }

    #[test]
    fn empty_script_param_is_none() {
        let event = parse_navigation("/live?script=").expect("parse");
        assert!(event.script_id.is_none());
    }

    #[test]
    fn subscribers_receive_navigations() {
        let params = UrlParams::new(4);
        let mut rx = params.subscribe();
        let sent = params.set_url("/live/clusters/c").expect("set url");
        assert_eq!(params.subscriber_count(), 1);
        assert_eq!(rx.try_recv().expect("event"), sent);
    }

    #[test]
    fn navigate_without_subscribers_is_dropped() {
        let params = UrlParams::new(4);
        assert_eq!(params.navigate(NavigationEvent::default()), 0);
    }
}
