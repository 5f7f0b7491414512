//! View invalidation after successful mutations.
//!
//! Each guarded operation names the exact set of pages whose rendered output is
//! now stale. Targets are published on a broadcast channel owned by `AppState`;
//! whoever renders or caches pages subscribes. Publishing never blocks and never
//! fails the operation that triggered it.

use std::fmt;

use tokio::sync::broadcast;

// Slow subscribers lose the oldest targets beyond this many.
const CHANNEL_CAPACITY: usize = 256;

/// ViewTarget
///
/// A page whose content depends on mutable data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewTarget {
    /// `/`, the published post listing.
    Home,
    /// `/dashboard`, the author's own posts.
    Dashboard,
    /// `/admin`, the moderation overview.
    Admin,
    /// `/post/{slug}`
    Post(String),
}

impl ViewTarget {
    pub fn path(&self) -> String {
        match self {
            ViewTarget::Home => "/".to_string(),
            ViewTarget::Dashboard => "/dashboard".to_string(),
            ViewTarget::Admin => "/admin".to_string(),
            ViewTarget::Post(slug) => format!("/post/{slug}"),
        }
    }

    pub fn post_created(slug: &str) -> Vec<ViewTarget> {
        vec![
            ViewTarget::Home,
            ViewTarget::Dashboard,
            ViewTarget::Admin,
            ViewTarget::Post(slug.to_string()),
        ]
    }

    /// An edit that renamed the slug invalidates both the old and the new page.
    pub fn post_updated(old_slug: &str, new_slug: &str) -> Vec<ViewTarget> {
        let mut targets = Self::post_created(new_slug);
        if old_slug != new_slug {
            targets.push(ViewTarget::Post(old_slug.to_string()));
        }
        targets
    }

    pub fn post_deleted(slug: &str) -> Vec<ViewTarget> {
        Self::post_created(slug)
    }

    /// Comment and like changes move the counters shown on listings and the post page.
    pub fn post_activity(slug: &str) -> Vec<ViewTarget> {
        vec![
            ViewTarget::Home,
            ViewTarget::Dashboard,
            ViewTarget::Post(slug.to_string()),
        ]
    }
}

impl fmt::Display for ViewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Invalidator
///
/// Cloneable publisher for [`ViewTarget`]s.
#[derive(Clone)]
pub struct Invalidator {
    sender: broadcast::Sender<ViewTarget>,
}

impl Default for Invalidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Invalidator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewTarget> {
        self.sender.subscribe()
    }

    /// Fire-and-forget: having no subscriber is not an error.
    pub fn publish(&self, targets: Vec<ViewTarget>) {
        for target in targets {
            tracing::debug!(target_path = %target, "invalidating view");
            let _ = self.sender.send(target);
        }
    }
}
