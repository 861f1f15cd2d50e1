//! Change notifications for incremental consumers.
//!
//! Every mutation of a folder's children, a project's file projection or its
//! review view is published as a [`ListChange`] carrying
//! `(position, removed, added)`. Consumers apply the splice to their own copy
//! of the list instead of reloading it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::entity::NodeId;

/// Which observable list changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "camelCase")]
pub enum ListKind {
    /// `children` of a folder.
    Children(NodeId),
    /// Flat text-file projection of a project.
    ProjectFiles(NodeId),
    /// Files awaiting approval in a project.
    ReviewFiles(NodeId),
}

/// A splice applied to an observable list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListChange {
    pub list: ListKind,
    pub position: usize,
    pub removed: usize,
    pub added: usize,
}

impl ListChange {
    /// Smallest single splice turning `old` into `new`, or `None` when equal.
    pub fn between<T: PartialEq>(list: ListKind, old: &[T], new: &[T]) -> Option<Self> {
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if prefix == old.len() && prefix == new.len() {
            return None;
        }
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        Some(Self {
            list,
            position: prefix,
            removed: old.len() - prefix - suffix,
            added: new.len() - prefix - suffix,
        })
    }
}

/// Events published by the file graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GraphEvent {
    ListChanged(ListChange),
    ActiveProjectChanged { path: Option<PathBuf> },
    ActiveFileChanged { path: Option<PathBuf> },
}

type Listener = Box<dyn Fn(&GraphEvent) + Send>;

/// Synchronous fan-out of [`GraphEvent`]s to subscribers.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&GraphEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&self, event: GraphEvent) {
        tracing::trace!(?event, "graph event");
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Publish a list splice.
    pub fn list_changed(&self, list: ListKind, position: usize, removed: usize, added: usize) {
        if removed == 0 && added == 0 {
            return;
        }
        self.emit(GraphEvent::ListChanged(ListChange {
            list,
            position,
            removed,
            added,
        }));
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Collects events for later inspection.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<GraphEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener closure to pass to [`EventBus::subscribe`].
    pub fn listener(&self) -> impl Fn(&GraphEvent) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |event| {
            if let Ok(mut guard) = events.lock() {
                guard.push(event.clone());
            }
        }
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Recorded list splices only.
    pub fn list_changes(&self) -> Vec<ListChange> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                GraphEvent::ListChanged(change) => Some(change),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}
