//! Scheduled broadcasters: poll a source, post what is new to a fixed channel.
//!
//! Each feed remembers the id of the newest item it has already handled. The very first
//! poll after start only records that id, so a restart never re-posts old items.

pub mod news;
pub mod video;
pub mod weather;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First poll: the cache was filled, nothing was sent
    Seeded,
    /// Nothing new
    Skipped,
    /// This many messages were posted
    Dispatched(usize),
}

impl TickOutcome {
    /// Folds per-feed outcomes of one tick into a single outcome.
    pub fn combine(self, other: TickOutcome) -> TickOutcome {
        use TickOutcome::*;
        match (self, other) {
            (Dispatched(a), Dispatched(b)) => Dispatched(a + b),
            (Dispatched(a), _) | (_, Dispatched(a)) => Dispatched(a),
            (Seeded, _) | (_, Seeded) => Seeded,
            _ => Skipped,
        }
    }
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tick(&self) -> anyhow::Result<TickOutcome>;
}

#[derive(Debug, PartialEq)]
pub enum FeedDiff<T> {
    /// Never seen this feed; remember this id and send nothing
    Seed(String),
    Unchanged,
    /// New items, oldest first
    Fresh(Vec<T>),
}

/// Last handled item id per feed. In memory only.
#[derive(Default)]
pub struct SeenCache {
    last: Mutex<HashMap<String, String>>,
}

impl SeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares a newest-first item list against the cached id.
    ///
    /// When the cached id is no longer in the list only the newest item counts as new,
    /// so a long outage does not flood the channel.
    pub fn diff<T>(&self, feed: &str, items: Vec<T>, id: impl Fn(&T) -> &str) -> FeedDiff<T> {
        let Some(latest) = items.first().map(|item| id(item).to_string()) else {
            return FeedDiff::Unchanged;
        };

        let cached = self
            .last
            .lock()
            .ok()
            .and_then(|last| last.get(feed).cloned());

        let Some(cached) = cached else {
            self.record(feed, &latest);
            return FeedDiff::Seed(latest);
        };
        if cached == latest {
            return FeedDiff::Unchanged;
        }

        let mut fresh: Vec<T> = match items.iter().position(|item| id(item) == cached) {
            Some(seen_at) => items.into_iter().take(seen_at).collect(),
            None => items.into_iter().take(1).collect(),
        };
        fresh.reverse();
        FeedDiff::Fresh(fresh)
    }

    /// Marks `id` as handled. Call only after the item was sent.
    pub fn record(&self, feed: &str, id: &str) {
        if let Ok(mut last) = self.last.lock() {
            last.insert(feed.to_string(), id.to_string());
        }
    }

    pub fn last(&self, feed: &str) -> Option<String> {
        self.last.lock().ok()?.get(feed).cloned()
    }
}
