//! Button-driven pagination over a fixed list.
//!
//! Pager state lives in memory only, keyed by the Discord message that shows it. Entries
//! expire after a TTL and the store is bounded, so abandoned pagers eventually disappear.

use lru::LruCache;
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Paginator<T> {
    items: Vec<T>,
    page: usize,
    per_page: usize,
}

impl<T> Paginator<T> {
    pub fn new(items: Vec<T>, per_page: usize) -> Self {
        Self {
            items,
            page: 0,
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.per_page).max(1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current(&self) -> &[T] {
        let start = (self.page * self.per_page).min(self.items.len());
        let end = (start + self.per_page).min(self.items.len());
        &self.items[start..end]
    }

    /// Index of the first item on the current page.
    pub fn offset(&self) -> usize {
        self.page * self.per_page
    }

    /// Advances one page; the last page wraps to the first.
    pub fn next(&mut self) {
        self.page = (self.page + 1) % self.page_count();
    }

    /// Goes back one page; the first page wraps to the last.
    pub fn prev(&mut self) {
        let count = self.page_count();
        self.page = (self.page + count - 1) % count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerAction {
    Prev,
    Next,
    Close,
}

impl PagerAction {
    /// Parses a button id of the form `{prefix}:prev|next|close`.
    pub fn parse(prefix: &str, custom_id: &str) -> Option<Self> {
        let action = custom_id.strip_prefix(prefix)?.strip_prefix(':')?;
        match action {
            "prev" => Some(Self::Prev),
            "next" => Some(Self::Next),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

/// The ◀ / ▶ / ✖ row, with a page indicator on a disabled button.
pub fn nav_row(prefix: &str, page: usize, page_count: usize, closable: bool) -> CreateActionRow {
    let mut buttons = vec![
        CreateButton::new(format!("{prefix}:prev"))
            .label("◀")
            .style(ButtonStyle::Secondary),
        CreateButton::new(format!("{prefix}:page"))
            .label(format!("{}/{}", page + 1, page_count))
            .style(ButtonStyle::Secondary)
            .disabled(true),
        CreateButton::new(format!("{prefix}:next"))
            .label("▶")
            .style(ButtonStyle::Secondary),
    ];
    if closable {
        buttons.push(
            CreateButton::new(format!("{prefix}:close"))
                .label("✖")
                .style(ButtonStyle::Danger),
        );
    }
    CreateActionRow::Buttons(buttons)
}

pub struct PagerStore<T> {
    entries: Mutex<LruCache<u64, (Paginator<T>, Instant)>>,
    ttl: Duration,
}

impl<T: Clone> PagerStore<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    pub fn insert(&self, message_id: u64, pager: Paginator<T>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(message_id, (pager, Instant::now()));
        }
    }

    /// Applies `f` to a live pager and returns the result. Expired entries are dropped.
    pub fn with<R>(&self, message_id: u64, f: impl FnOnce(&mut Paginator<T>) -> R) -> Option<R> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(&message_id) {
            Some((_, created)) => created.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            entries.pop(&message_id);
            return None;
        }
        entries.get_mut(&message_id).map(|(pager, _)| f(pager))
    }

    pub fn remove(&self, message_id: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(&message_id);
        }
    }
}
