//! Collection registry
//!
//! The registry maps URL slugs to [`RegisteredCollection`] descriptors. It is
//! assembled once while configuring the service and is read-only afterwards;
//! the dispatcher receives it explicitly rather than through global state.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use repo_rest::memory::MemoryCollection;
//! use repo_rest::registry::{Method, RegisteredCollection, Registry};
//!
//! let people = RegisteredCollection::builder(Arc::new(MemoryCollection::new("UserAccounts")))
//!     .collection_method("countRetired", Method::Passthrough)
//!     .build();
//! assert_eq!(people.slug(), "user-accounts");
//!
//! let registry = Registry::new().with(people).unwrap();
//! assert!(registry.get("user-accounts").is_some());
//! ```

mod methods;

pub use methods::{method_fn, FnMethod, Method, MethodHandler, MethodRequest, MethodResponse};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::authorization::Authorizer;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventListener};
use crate::naming::{camel_case, kebab_case};
use crate::repository::Collection;

/// Custom method resolved at registration
#[derive(Clone)]
pub struct RegisteredMethod {
    /// Canonical (camelCase) name forwarded to storage and handlers
    pub name: String,
    pub handler: Arc<dyn MethodHandler>,
}

impl fmt::Debug for RegisteredMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMethod")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Everything the dispatcher knows about one collection
pub struct RegisteredCollection {
    name: String,
    slug: String,
    storage: Arc<dyn Collection>,
    client: Arc<dyn Collection>,
    authorizer: Option<Arc<dyn Authorizer>>,
    collection_methods: HashMap<String, RegisteredMethod>,
    item_methods: HashMap<String, RegisteredMethod>,
    listeners: HashMap<EventKind, Vec<Arc<dyn EventListener>>>,
}

impl RegisteredCollection {
    /// Start describing a collection; its name defaults to the storage name
    pub fn builder(storage: Arc<dyn Collection>) -> CollectionBuilder {
        CollectionBuilder {
            name: storage.name().to_string(),
            storage,
            client: None,
            authorizer: None,
            collection_methods: HashMap::new(),
            item_methods: HashMap::new(),
            listeners: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kebab-case URL segment
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Collection holding the stored items
    pub fn storage(&self) -> &Arc<dyn Collection> {
        &self.storage
    }

    /// Collection used to build the representation sent to clients
    pub fn client(&self) -> &Arc<dyn Collection> {
        &self.client
    }

    pub fn authorizer(&self) -> Option<&Arc<dyn Authorizer>> {
        self.authorizer.as_ref()
    }

    /// Look up a collection method by URL fragment, in either spelling
    pub fn collection_method(&self, fragment: &str) -> Option<&RegisteredMethod> {
        self.collection_methods.get(&kebab_case(fragment))
    }

    /// Look up an item method by URL fragment, in either spelling
    pub fn item_method(&self, fragment: &str) -> Option<&RegisteredMethod> {
        self.item_methods.get(&kebab_case(fragment))
    }

    /// Listeners for an event, in registration order
    pub fn listeners(&self, kind: EventKind) -> &[Arc<dyn EventListener>] {
        self.listeners.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Debug for RegisteredCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut collection_methods: Vec<_> = self.collection_methods.keys().collect();
        collection_methods.sort();
        let mut item_methods: Vec<_> = self.item_methods.keys().collect();
        item_methods.sort();
        f.debug_struct("RegisteredCollection")
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("authorizer", &self.authorizer.is_some())
            .field("collection_methods", &collection_methods)
            .field("item_methods", &item_methods)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RegisteredCollection`]
pub struct CollectionBuilder {
    name: String,
    storage: Arc<dyn Collection>,
    client: Option<Arc<dyn Collection>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    collection_methods: HashMap<String, RegisteredMethod>,
    item_methods: HashMap<String, RegisteredMethod>,
    listeners: HashMap<EventKind, Vec<Arc<dyn EventListener>>>,
}

impl CollectionBuilder {
    /// Override the registered name (and therefore the slug)
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a separate collection for client representations
    #[must_use]
    pub fn client(mut self, client: Arc<dyn Collection>) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn authorize(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    #[must_use]
    pub fn collection_method(mut self, name: &str, method: impl Into<Method>) -> Self {
        let (key, registered) = resolve(name, method.into());
        self.collection_methods.insert(key, registered);
        self
    }

    #[must_use]
    pub fn item_method(mut self, name: &str, method: impl Into<Method>) -> Self {
        let (key, registered) = resolve(name, method.into());
        self.item_methods.insert(key, registered);
        self
    }

    /// Append a listener for an event
    #[must_use]
    pub fn on(mut self, kind: EventKind, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.entry(kind).or_default().push(listener);
        self
    }

    pub fn build(self) -> RegisteredCollection {
        RegisteredCollection {
            slug: kebab_case(&self.name),
            name: self.name,
            client: self.client.unwrap_or_else(|| Arc::clone(&self.storage)),
            storage: self.storage,
            authorizer: self.authorizer,
            collection_methods: self.collection_methods,
            item_methods: self.item_methods,
            listeners: self.listeners,
        }
    }
}

fn resolve(name: &str, method: Method) -> (String, RegisteredMethod) {
    (
        kebab_case(name),
        RegisteredMethod {
            name: camel_case(name),
            handler: method.into_handler(),
        },
    )
}

/// Slug-indexed set of collections
#[derive(Default)]
pub struct Registry {
    collections: HashMap<String, Arc<RegisteredCollection>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection; slugs must be unique and non-empty
    pub fn register(&mut self, collection: RegisteredCollection) -> Result<()> {
        if collection.slug.is_empty() {
            return Err(Error::Misconfigured(format!(
                "collection '{}' has an empty slug",
                collection.name
            )));
        }
        if self.collections.contains_key(&collection.slug) {
            return Err(Error::Misconfigured(format!(
                "duplicate collection slug '{}'",
                collection.slug
            )));
        }
        tracing::debug!(
            collection = %collection.name,
            slug = %collection.slug,
            "registered collection"
        );
        self.collections
            .insert(collection.slug.clone(), Arc::new(collection));
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, collection: RegisteredCollection) -> Result<Self> {
        self.register(collection)?;
        Ok(self)
    }

    pub fn get(&self, slug: &str) -> Option<&Arc<RegisteredCollection>> {
        self.collections.get(slug)
    }

    /// Client collection for items carrying the given type tag
    pub fn client_for_type(&self, type_tag: &str) -> Option<Arc<dyn Collection>> {
        self.collections
            .values()
            .find(|c| c.storage.type_tag() == type_tag)
            .map(|c| Arc::clone(&c.client))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredCollection>> {
        self.collections.values()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slugs: Vec<_> = self.collections.keys().collect();
        slugs.sort();
        f.debug_struct("Registry").field("slugs", &slugs).finish()
    }
}
