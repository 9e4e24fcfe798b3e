//! In-memory collection
//!
//! [`MemoryCollection`] keeps [`Document`]s in key order inside a `BTreeMap`,
//! which makes `start`/`end` range queries and reverse scans trivial. It is
//! the storage used by the test suite and the demo server, and a reference
//! for implementing [`Collection`] over a real engine.
//!
//! # Query options
//!
//! | key       | meaning                                         |
//! |-----------|-------------------------------------------------|
//! | `start`   | smallest id to include (inclusive)              |
//! | `end`     | largest id to include (inclusive)               |
//! | `reverse` | scan in descending id order                     |
//! | `limit`   | maximum number of documents                     |
//! | `filter`  | object of field values documents must equal     |
//!
//! # Example
//!
//! ```rust
//! use repo_rest::memory::MemoryCollection;
//! use repo_rest::repository::{Collection, Options};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let people = MemoryCollection::new("people");
//! let saved = people.insert(json!({"id": "bob", "age": 42})).await.unwrap();
//! assert_eq!(saved["age"], 42);
//! assert_eq!(people.count_items(&Options::new()).await.unwrap(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::ids::item_id;
use crate::naming::camel_case;
use crate::repository::{
    Collection, Item, Options, RepositoryError, RepositoryOperation, RepositoryResult,
    Transaction, ERROR_IF_MISSING,
};

const ID: &str = "id";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Named collection method: receives the documents selected by the options
pub type CollectionMethodFn =
    dyn Fn(&[Document], &Options) -> RepositoryResult<Option<Value>> + Send + Sync;

/// Named item method: may modify the document, which is written back when stored
pub type ItemMethodFn =
    dyn Fn(&mut Document, &Options) -> RepositoryResult<Option<Value>> + Send + Sync;

/// A stored record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    id: Option<String>,
    fields: Map<String, Value>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Build a document from client values
    ///
    /// `id` is kept; timestamps are ignored and set on save.
    pub fn from_source(source: Value) -> RepositoryResult<Self> {
        let mut fields = into_object(source, RepositoryOperation::CreateItem)?;
        let id = fields.remove(ID).and_then(id_string);
        fields.remove(CREATED_AT);
        fields.remove(UPDATED_AT);
        Ok(Self {
            id,
            fields,
            ..Self::default()
        })
    }

    /// Rebuild a document from its serialized form, timestamps included
    pub fn from_serialized(value: Value) -> RepositoryResult<Self> {
        let mut fields = into_object(value, RepositoryOperation::CreateItem)?;
        let id = fields.remove(ID).and_then(id_string);
        let created_at = fields.remove(CREATED_AT).and_then(parse_timestamp);
        let updated_at = fields.remove(UPDATED_AT).and_then(parse_timestamp);
        Ok(Self {
            id,
            fields,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field; identity and timestamps cannot be set this way
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !is_managed(&key) {
            self.fields.insert(key, value);
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Shallow merge of an object into the writable fields
    pub fn merge(&mut self, value: Value) -> RepositoryResult<()> {
        for (key, value) in into_object(value, RepositoryOperation::UpdateValue)? {
            self.set(key, value);
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 3);
        if let Some(ref id) = self.id {
            object.insert(ID.to_string(), Value::String(id.clone()));
        }
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        if let Some(created_at) = self.created_at {
            object.insert(CREATED_AT.to_string(), timestamp(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            object.insert(UPDATED_AT.to_string(), timestamp(updated_at));
        }
        Value::Object(object)
    }

    fn matches(&self, filter: &Map<String, Value>) -> bool {
        filter.iter().all(|(key, expected)| match key.as_str() {
            ID => self.id.as_deref() == expected.as_str(),
            _ => self.fields.get(key) == Some(expected),
        })
    }
}

fn is_managed(key: &str) -> bool {
    matches!(key, ID | CREATED_AT | UPDATED_AT)
}

fn into_object(value: Value, operation: RepositoryOperation) -> RepositoryResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(RepositoryError::validation_failed(
            operation,
            format!("expected an object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn id_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_timestamp(value: Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Prior state of every key written since the transaction began
type UndoLog = BTreeMap<String, Option<Document>>;

/// Documents plus the undo log of the open transaction, if any
#[derive(Default)]
struct Store {
    docs: BTreeMap<String, Document>,
    undo: Option<UndoLog>,
}

impl Store {
    fn put(&mut self, id: String, doc: Document) {
        self.record(&id);
        self.docs.insert(id, doc);
    }

    fn remove(&mut self, id: &str) -> bool {
        if !self.docs.contains_key(id) {
            return false;
        }
        self.record(id);
        self.docs.remove(id).is_some()
    }

    /// Keep the first prior state of `id`; later writes in the same
    /// transaction must not overwrite it
    fn record(&mut self, id: &str) {
        if let Some(undo) = self.undo.as_mut() {
            if !undo.contains_key(id) {
                undo.insert(id.to_string(), self.docs.get(id).cloned());
            }
        }
    }

    /// Restore only the keys the open transaction wrote
    fn undo(&mut self) {
        for (id, prior) in self.undo.take().unwrap_or_default() {
            match prior {
                Some(doc) => {
                    self.docs.insert(id, doc);
                }
                None => {
                    self.docs.remove(&id);
                }
            }
        }
    }
}

struct MemoryInner {
    name: String,
    type_tag: String,
    store: RwLock<Store>,
    tx_lock: Arc<Mutex<()>>,
    collection_methods: HashMap<String, Arc<CollectionMethodFn>>,
    item_methods: HashMap<String, Arc<ItemMethodFn>>,
}

impl MemoryInner {
    async fn select(&self, options: &Options) -> Vec<Document> {
        let store = self.store.read().await;
        select(&store.docs, options).into_iter().cloned().collect()
    }
}

/// Pick documents by id range, filter, direction and limit
fn select<'a>(documents: &'a BTreeMap<String, Document>, options: &Options) -> Vec<&'a Document> {
    let start = key_bound(options, "start");
    let end = key_bound(options, "end");
    if let (Some(start), Some(end)) = (&start, &end) {
        if start > end {
            return Vec::new();
        }
    }

    let lower = start.map_or(Bound::Unbounded, Bound::Included);
    let upper = end.map_or(Bound::Unbounded, Bound::Included);
    let range = documents.range::<String, _>((lower, upper)).map(|(_, doc)| doc);

    let filter = options.get("filter").and_then(Value::as_object);
    let keep = |doc: &&Document| filter.map_or(true, |f| doc.matches(f));
    let limit = options.u64("limit").map_or(usize::MAX, |l| l as usize);

    if options.flag("reverse", false) {
        range.rev().filter(keep).take(limit).collect()
    } else {
        range.filter(keep).take(limit).collect()
    }
}

/// Range bound option; numbers decoded from the query compare as their text
fn key_bound(options: &Options, key: &str) -> Option<String> {
    match options.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `Collection` backed by an in-process ordered map
#[derive(Clone)]
pub struct MemoryCollection {
    inner: Arc<MemoryInner>,
}

impl fmt::Debug for MemoryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("name", &self.inner.name)
            .field("type_tag", &self.inner.type_tag)
            .finish_non_exhaustive()
    }
}

impl MemoryCollection {
    /// Create an empty collection whose type tag is its name
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> MemoryCollectionBuilder {
        let name = name.into();
        MemoryCollectionBuilder {
            type_tag: name.clone(),
            name,
            collection_methods: HashMap::new(),
            item_methods: HashMap::new(),
        }
    }

    /// Create and save a document in its own transaction, returning its
    /// serialized form
    ///
    /// Waits for any open transaction on the collection to finish, so it must
    /// not be called from inside one.
    pub async fn insert(&self, source: Value) -> RepositoryResult<Value> {
        let mut item = self.create_item(source)?;
        let tx = self.begin_transaction().await?;
        match item.save(&Options::new()).await {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }
        Ok(item.serialize())
    }

    fn item(&self, doc: Document) -> Box<dyn Item> {
        Box::new(MemoryItem {
            inner: Arc::clone(&self.inner),
            doc,
        })
    }
}

/// Builder for [`MemoryCollection`]
pub struct MemoryCollectionBuilder {
    name: String,
    type_tag: String,
    collection_methods: HashMap<String, Arc<CollectionMethodFn>>,
    item_methods: HashMap<String, Arc<ItemMethodFn>>,
}

impl MemoryCollectionBuilder {
    #[must_use]
    pub fn type_tag(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = type_tag.into();
        self
    }

    /// Register a named collection method
    ///
    /// Names are matched in camelCase, so `count-retired` and `countRetired`
    /// are the same method.
    #[must_use]
    pub fn collection_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&[Document], &Options) -> RepositoryResult<Option<Value>> + Send + Sync + 'static,
    {
        self.collection_methods.insert(camel_case(name), Arc::new(method));
        self
    }

    /// Register a named item method
    #[must_use]
    pub fn item_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&mut Document, &Options) -> RepositoryResult<Option<Value>> + Send + Sync + 'static,
    {
        self.item_methods.insert(camel_case(name), Arc::new(method));
        self
    }

    pub fn build(self) -> MemoryCollection {
        MemoryCollection {
            inner: Arc::new(MemoryInner {
                name: self.name,
                type_tag: self.type_tag,
                store: RwLock::new(Store::default()),
                tx_lock: Arc::new(Mutex::new(())),
                collection_methods: self.collection_methods,
                item_methods: self.item_methods,
            }),
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn type_tag(&self) -> &str {
        &self.inner.type_tag
    }

    fn create_item(&self, source: Value) -> RepositoryResult<Box<dyn Item>> {
        Ok(self.item(Document::from_source(source)?))
    }

    fn unserialize_item(&self, value: Value) -> RepositoryResult<Box<dyn Item>> {
        Ok(self.item(Document::from_serialized(value)?))
    }

    async fn get_item(&self, id: &str, options: &Options) -> RepositoryResult<Option<Box<dyn Item>>> {
        let found = self.inner.store.read().await.docs.get(id).cloned();
        match found {
            Some(doc) => Ok(Some(self.item(doc))),
            None if options.flag(ERROR_IF_MISSING, false) => {
                Err(RepositoryError::not_found(&self.inner.name, id))
            }
            None => Ok(None),
        }
    }

    async fn get_items(&self, ids: &[String], options: &Options) -> RepositoryResult<Vec<Box<dyn Item>>> {
        let error_if_missing = options.flag(ERROR_IF_MISSING, true);
        let store = self.inner.store.read().await;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match store.docs.get(id) {
                Some(doc) => items.push(self.item(doc.clone())),
                None if error_if_missing => {
                    return Err(RepositoryError::not_found(&self.inner.name, id)
                        .with_operation(RepositoryOperation::GetItems));
                }
                None => {}
            }
        }
        Ok(items)
    }

    async fn find_items(&self, options: &Options) -> RepositoryResult<Vec<Box<dyn Item>>> {
        let docs = self.inner.select(options).await;
        Ok(docs.into_iter().map(|doc| self.item(doc)).collect())
    }

    async fn count_items(&self, options: &Options) -> RepositoryResult<u64> {
        let store = self.inner.store.read().await;
        Ok(select(&store.docs, options).len() as u64)
    }

    async fn find_and_delete_items(&self, options: &Options) -> RepositoryResult<u64> {
        let mut store = self.inner.store.write().await;
        let ids: Vec<String> = select(&store.docs, options)
            .into_iter()
            .filter_map(|doc| doc.id.clone())
            .collect();
        let removed = ids.iter().filter(|id| store.remove(id)).count();
        Ok(removed as u64)
    }

    async fn begin_transaction(&self) -> RepositoryResult<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.inner.tx_lock).lock_owned().await;
        self.inner.store.write().await.undo = Some(UndoLog::new());
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            _guard: guard,
        }))
    }

    async fn call_method(&self, name: &str, options: &Options) -> RepositoryResult<Option<Value>> {
        let method = self
            .inner
            .collection_methods
            .get(&camel_case(name))
            .cloned()
            .ok_or_else(|| RepositoryError::unsupported(RepositoryOperation::CallMethod, name))?;
        let docs = self.inner.select(options).await;
        method(&docs, options)
    }
}

/// Item handle bound to its [`MemoryCollection`]
struct MemoryItem {
    inner: Arc<MemoryInner>,
    doc: Document,
}

#[async_trait]
impl Item for MemoryItem {
    fn id(&self) -> Option<&str> {
        self.doc.id()
    }

    fn type_tag(&self) -> &str {
        &self.inner.type_tag
    }

    fn serialize(&self) -> Value {
        self.doc.to_value()
    }

    fn update_value(&mut self, value: Value) -> RepositoryResult<()> {
        self.doc.merge(value)
    }

    async fn save(&mut self, _options: &Options) -> RepositoryResult<()> {
        let now = Utc::now();
        let id = self
            .doc
            .id
            .get_or_insert_with(|| item_id(&self.inner.type_tag))
            .clone();
        self.doc.created_at.get_or_insert(now);
        self.doc.updated_at = Some(now);
        self.inner.store.write().await.put(id, self.doc.clone());
        Ok(())
    }

    async fn delete(&mut self, _options: &Options) -> RepositoryResult<bool> {
        let Some(id) = self.doc.id() else {
            return Ok(false);
        };
        Ok(self.inner.store.write().await.remove(id))
    }

    async fn call_method(&mut self, name: &str, options: &Options) -> RepositoryResult<Option<Value>> {
        let method = self
            .inner
            .item_methods
            .get(&camel_case(name))
            .cloned()
            .ok_or_else(|| RepositoryError::unsupported(RepositoryOperation::CallMethod, name))?;
        let result = method(&mut self.doc, options)?;

        // write back changes made to a stored document
        if let Some(id) = self.doc.id.clone() {
            let mut store = self.inner.store.write().await;
            if store.docs.contains_key(&id) {
                store.put(id, self.doc.clone());
            }
        }
        Ok(result)
    }
}

/// Writer lock held until commit or rollback
///
/// Writes made while the lock is held are journaled in the store's undo log;
/// rollback restores just those keys.
struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.inner.store.write().await.undo = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        self.inner.store.write().await.undo();
        Ok(())
    }
}
