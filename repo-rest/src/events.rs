//! Collection lifecycle events
//!
//! Every collection carries an ordered list of listeners per [`EventKind`].
//! Emission awaits each listener in registration order; the first error stops
//! the broadcast and fails the request, rolling back an open transaction.
//!
//! `will*` events fire before a save or delete and hand listeners mutable
//! access to the in-flight item, so a listener can rewrite what gets stored.
//! `did*` events fire only after the operation succeeded.
//!
//! # Example
//!
//! ```rust
//! use repo_rest::events::{listener_fn, EventKind};
//! use serde_json::json;
//!
//! let stamp = listener_fn(|event| {
//!     if let Some(item) = event.item_mut() {
//!         item.update_value(json!({"reviewed": true}))?;
//!     }
//!     Ok(())
//! });
//! # let _ = (stamp, EventKind::WillPutItem);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::repository::{Item, Options};

/// Named lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WillPutItem,
    DidPutItem,
    DidGetItem,
    WillDeleteItem,
    DidDeleteItem,
    DidFindItems,
    DidCountItems,
    DidFindAndDeleteItems,
    DidGetItems,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::WillPutItem,
        EventKind::DidPutItem,
        EventKind::DidGetItem,
        EventKind::WillDeleteItem,
        EventKind::DidDeleteItem,
        EventKind::DidFindItems,
        EventKind::DidCountItems,
        EventKind::DidFindAndDeleteItems,
        EventKind::DidGetItems,
    ];

    /// Wire name of the event
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WillPutItem => "willPutItem",
            Self::DidPutItem => "didPutItem",
            Self::DidGetItem => "didGetItem",
            Self::WillDeleteItem => "willDeleteItem",
            Self::DidDeleteItem => "didDeleteItem",
            Self::DidFindItems => "didFindItems",
            Self::DidCountItems => "didCountItems",
            Self::DidFindAndDeleteItems => "didFindAndDeleteItems",
            Self::DidGetItems => "didGetItems",
        }
    }

    /// Whether the event fires before the operation
    pub const fn is_before(&self) -> bool {
        matches!(self, Self::WillPutItem | Self::WillDeleteItem)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Event name not in [`EventKind`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event '{0}'")]
pub struct UnknownEvent(pub String);

/// What an event is about
pub enum EventSubject<'a> {
    /// A single item, mutable for `will*` events
    Item(&'a mut (dyn Item + 'static)),
    /// A query result in storage and client representation
    Items {
        items: &'a [Box<dyn Item>],
        client_items: &'a [Value],
    },
    /// A count or number of deleted items
    Count(u64),
}

/// Notification passed to listeners
pub struct Event<'a> {
    pub kind: EventKind,
    /// Registered name of the collection
    pub collection: &'a str,
    pub options: &'a Options,
    pub authorization: Option<&'a str>,
    pub subject: EventSubject<'a>,
}

impl<'a> Event<'a> {
    pub fn item(&self) -> Option<&dyn Item> {
        match &self.subject {
            EventSubject::Item(item) => Some(&**item),
            _ => None,
        }
    }

    pub fn item_mut(&mut self) -> Option<&mut dyn Item> {
        match &mut self.subject {
            EventSubject::Item(item) => Some(&mut **item),
            _ => None,
        }
    }

    pub fn items(&self) -> &[Box<dyn Item>] {
        match &self.subject {
            EventSubject::Items { items, .. } => *items,
            _ => &[],
        }
    }

    pub fn client_items(&self) -> &[Value] {
        match &self.subject {
            EventSubject::Items { client_items, .. } => *client_items,
            _ => &[],
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self.subject {
            EventSubject::Count(count) => Some(count),
            _ => None,
        }
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("collection", &self.collection)
            .field("item", &self.item().and_then(|i| i.id()))
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// Receives collection events
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &mut Event<'_>) -> Result<()>;
}

/// Listener backed by a synchronous closure
pub struct FnListener<F>(F);

/// Wrap a closure as an [`EventListener`]
pub fn listener_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

#[async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync,
{
    async fn on_event(&self, event: &mut Event<'_>) -> Result<()> {
        (self.0)(event)
    }
}

/// Broadcast an event to listeners in order
pub async fn emit(listeners: &[Arc<dyn EventListener>], event: &mut Event<'_>) -> Result<()> {
    if listeners.is_empty() {
        return Ok(());
    }
    tracing::trace!(
        event = %event.kind,
        collection = event.collection,
        listeners = listeners.len(),
        "emitting collection event"
    );
    for listener in listeners {
        listener.on_event(event).await?;
    }
    Ok(())
}
