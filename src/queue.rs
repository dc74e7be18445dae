//! The work queues that drive static generation. Rendering a page reports the
//! pages it links to through a [`PageDiscoverySink`]; during generation that
//! sink is a [`DiscoveryQueues`], which enqueues every page it hasn't seen yet.

use crate::page::TagPage;
use log::debug;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Receives the pages a renderer links to.
pub trait PageDiscoverySink {
    /// Called for every link to an index page of `tag` (`None` for the global
    /// index).
    fn on_tag_page(&mut self, tag: Option<&str>, page: usize);

    /// Called for every link to an article page.
    fn on_article_page(&mut self, name: &str);
}

/// A sink that ignores every discovery, for rendering one page on demand.
pub struct NoDiscovery;

impl PageDiscoverySink for NoDiscovery {
    fn on_tag_page(&mut self, _tag: Option<&str>, _page: usize) {}
    fn on_article_page(&mut self, _name: &str) {}
}

/// A FIFO queue that accepts each item at most once over its lifetime (until
/// [`WorkQueue::clear`]). Items are either pending or visited; pushing an item
/// that is in either state is a no-op.
#[derive(Debug)]
pub struct WorkQueue<T> {
    pending: VecDeque<T>,
    queued: HashSet<T>,
    visited: HashSet<T>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        WorkQueue {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> WorkQueue<T> {
    pub fn new() -> WorkQueue<T> {
        WorkQueue::default()
    }

    /// Appends `item` unless it is already pending or visited. Returns whether
    /// it was appended.
    pub fn push(&mut self, item: T) -> bool {
        if self.visited.contains(&item) || !self.queued.insert(item.clone()) {
            return false;
        }
        self.pending.push_back(item);
        true
    }

    /// Takes the oldest pending item and marks it visited.
    pub fn pop(&mut self) -> Option<T> {
        while let Some(item) = self.pending.pop_front() {
            self.queued.remove(&item);
            // it may have been visited directly while pending
            if self.visited.insert(item.clone()) {
                return Some(item);
            }
        }
        None
    }

    /// Marks `item` visited without queueing it. Returns `false` if it was
    /// already visited.
    pub fn visit(&mut self, item: T) -> bool {
        self.visited.insert(item)
    }

    pub fn is_visited(&self, item: &T) -> bool {
        self.visited.contains(item)
    }

    /// Returns whether no items are pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The number of pending items.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drops every pending item, keeping the visited set.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }

    /// Forgets every item, pending or visited.
    pub fn clear(&mut self) {
        self.discard_pending();
        self.visited.clear();
    }
}

/// The two queues of a generation run: index pages and article pages.
/// Discoveries are only recorded while `follow` is set.
#[derive(Debug, Default)]
pub struct DiscoveryQueues {
    pub follow: bool,
    pub tags: WorkQueue<TagPage>,
    pub articles: WorkQueue<String>,
}

impl DiscoveryQueues {
    pub fn new() -> DiscoveryQueues {
        DiscoveryQueues::default()
    }

    /// Returns whether both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.articles.is_empty()
    }

    pub fn discard_pending(&mut self) {
        self.tags.discard_pending();
        self.articles.discard_pending();
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.articles.clear();
    }
}

impl PageDiscoverySink for DiscoveryQueues {
    fn on_tag_page(&mut self, tag: Option<&str>, page: usize) {
        if self.follow && self.tags.push(TagPage::new(tag, page)) {
            debug!("discovered index page {:?} {}", tag, page);
        }
    }

    fn on_article_page(&mut self, name: &str) {
        if self.follow && self.articles.push(name.to_owned()) {
            debug!("discovered article page {}", name);
        }
    }
}
