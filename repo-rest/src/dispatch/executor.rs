//! Collection operations
//!
//! Every operation follows the same pipeline: authorize, emit `will*` events,
//! touch storage, emit `did*` events, answer. Mutations run inside a storage
//! transaction; any error on the way (including one raised by a listener or
//! a custom method) rolls it back and is returned to the client.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::context::{RequestContext, Scope};
use super::response::Reply;
use super::route::CollectionRoute;
use crate::authorization::{AuthorizationGate, AuthorizationRequest, Operation};
use crate::config::{DeletionReport, RestConfig, UpsertPolicy};
use crate::error::{Error, Result};
use crate::events::{self, Event, EventKind, EventSubject};
use crate::registry::{MethodRequest, RegisteredMethod, Registry};
use crate::repository::{Collection, Item, Options, CREATE_IF_MISSING, ERROR_IF_MISSING};

/// Run `work` inside a storage transaction
///
/// Commits on success. On failure the transaction is rolled back and the
/// error from `work` returned; a failing rollback is logged, not surfaced.
pub async fn in_transaction<T, F>(storage: &dyn Collection, work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
{
    let transaction = storage.begin_transaction().await?;
    match work.await {
        Ok(value) => {
            transaction.commit().await?;
            Ok(value)
        }
        Err(error) => {
            tracing::debug!(
                collection = storage.name(),
                error = %error,
                "rolling back transaction"
            );
            if let Err(rollback) = transaction.rollback().await {
                tracing::error!(
                    collection = storage.name(),
                    error = %rollback,
                    "transaction rollback failed"
                );
            }
            Err(error)
        }
    }
}

/// Serialize an item the way the client collection presents it
fn to_client(client: &dyn Collection, item: &dyn Item) -> Result<Value> {
    Ok(client.unserialize_item(item.serialize())?.serialize())
}

/// Ids for `get-items`: a JSON array of strings or numbers
fn parse_ids(body: Option<Value>) -> Result<Vec<String>> {
    let Some(Value::Array(values)) = body else {
        return Err(Error::BadRequest(
            "get-items expects a JSON array of ids".to_string(),
        ));
    };
    values
        .into_iter()
        .map(|value| match value {
            Value::String(id) => Ok(id),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(Error::BadRequest(format!("invalid item id: {other}"))),
        })
        .collect()
}

/// Executes the operation a collection route selected
pub struct Executor<'s> {
    registry: &'s Registry,
    gate: &'s AuthorizationGate,
    upsert: UpsertPolicy,
    deletion_report: DeletionReport,
}

impl<'s> Executor<'s> {
    pub fn new(registry: &'s Registry, gate: &'s AuthorizationGate, config: &RestConfig) -> Self {
        Self {
            registry,
            gate,
            upsert: config.upsert,
            deletion_report: config.deletion_report,
        }
    }

    pub async fn execute(&self, ctx: &mut RequestContext, route: CollectionRoute<'_>) -> Result<Reply> {
        tracing::debug!(
            collection = ctx.collection.name(),
            operation = route.label(),
            "dispatching collection request"
        );

        let is_post = ctx.is_post();
        match route {
            CollectionRoute::Count => {
                let scope = ctx.scope();
                self.count_items(scope).await
            }
            CollectionRoute::GetItems => {
                let body = ctx.take_body().await?;
                let scope = ctx.scope();
                self.get_items(scope, body).await
            }
            CollectionRoute::CollectionMethod(method) => {
                let body = if is_post { ctx.take_body().await? } else { None };
                let scope = ctx.scope();
                self.call_collection_method(scope, &method, body, is_post).await
            }
            CollectionRoute::ItemMethod { id, method } => {
                let body = if is_post { ctx.take_body().await? } else { None };
                let scope = ctx.scope();
                self.call_item_method(scope, id, &method, body, is_post).await
            }
            CollectionRoute::GetItem(id) => {
                let scope = ctx.scope();
                self.get_item(scope, id).await
            }
            CollectionRoute::CreateItem => {
                let body = ctx.take_body().await?;
                let scope = ctx.scope();
                self.create_item(scope, body).await
            }
            CollectionRoute::UpdateItem(id) => {
                let body = ctx.take_body().await?;
                let scope = ctx.scope();
                self.update_item(scope, id, body).await
            }
            CollectionRoute::DeleteItem(id) => {
                let scope = ctx.scope();
                self.delete_item(scope, id).await
            }
            CollectionRoute::FindItems => {
                let scope = ctx.scope();
                self.find_items(scope).await
            }
            CollectionRoute::FindAndDeleteItems => {
                let scope = ctx.scope();
                self.find_and_delete_items(scope).await
            }
        }
    }

    async fn authorize(
        &self,
        scope: &Scope<'_>,
        operation: Operation,
        item: Option<&dyn Item>,
    ) -> Result<()> {
        let request = AuthorizationRequest {
            authorization: scope.authorization,
            collection: scope.storage(),
            client_collection: scope.client(),
            operation: &operation,
            options: scope.options,
            item,
        };
        self.gate.check(scope.collection.authorizer(), request).await
    }

    async fn emit(&self, scope: &Scope<'_>, kind: EventKind, subject: EventSubject<'_>) -> Result<()> {
        let mut event = Event {
            kind,
            collection: scope.collection.name(),
            options: scope.options,
            authorization: scope.authorization,
            subject,
        };
        events::emit(scope.collection.listeners(kind), &mut event).await
    }

    /// Fetch without failing; the caller applies the missing policy
    async fn lookup(&self, scope: &Scope<'_>, id: &str) -> Result<Option<Box<dyn Item>>> {
        let options = scope.options.clone().with(ERROR_IF_MISSING, false);
        Ok(scope.storage().get_item(id, &options).await?)
    }

    /// 404 unless the client passed `errorIfMissing=false`, then 204
    fn missing(&self, scope: &Scope<'_>, id: &str) -> Result<Reply> {
        if scope.options.flag(ERROR_IF_MISSING, true) {
            Err(Error::NotFound(format!(
                "item '{id}' not found in {}",
                scope.collection.name()
            )))
        } else {
            Ok(Reply::no_content())
        }
    }

    fn upsert_allowed(&self, options: &Options) -> bool {
        match self.upsert {
            UpsertPolicy::Never => false,
            UpsertPolicy::OnRequest => options.flag(CREATE_IF_MISSING, false),
            UpsertPolicy::Always => true,
        }
    }

    fn deletion_reply(&self, outcome: impl Into<Value>) -> Reply {
        match self.deletion_report {
            DeletionReport::NoContent => Reply::no_content(),
            DeletionReport::Outcome => Reply::ok(outcome),
        }
    }

    async fn get_item(&self, scope: Scope<'_>, id: &str) -> Result<Reply> {
        let Some(mut item) = self.lookup(&scope, id).await? else {
            return self.missing(&scope, id);
        };
        self.authorize(&scope, Operation::GetItem, Some(&*item)).await?;
        self.emit(&scope, EventKind::DidGetItem, EventSubject::Item(&mut *item))
            .await?;
        Ok(Reply::ok(to_client(scope.client(), &*item)?))
    }

    async fn create_item(&self, scope: Scope<'_>, body: Option<Value>) -> Result<Reply> {
        let source = body.unwrap_or_else(|| Value::Object(Map::new()));
        let candidate = scope.client().create_item(source)?;
        let storage = scope.storage();

        let item = in_transaction(storage, async {
            let mut item = storage.create_item(candidate.serialize())?;
            self.authorize(&scope, Operation::PutItem, Some(&*item)).await?;
            self.emit(&scope, EventKind::WillPutItem, EventSubject::Item(&mut *item))
                .await?;
            item.save(scope.options).await?;
            self.emit(&scope, EventKind::DidPutItem, EventSubject::Item(&mut *item))
                .await?;
            Ok::<_, Error>(item)
        })
        .await?;

        Ok(Reply::created(to_client(scope.client(), &*item)?))
    }

    async fn update_item(&self, scope: Scope<'_>, id: &str, body: Option<Value>) -> Result<Reply> {
        let source = body.unwrap_or_else(|| Value::Object(Map::new()));
        let candidate = scope.client().create_item(source)?;
        let storage = scope.storage();
        let upsert = self.upsert_allowed(scope.options);

        let updated = in_transaction(storage, async {
            let mut item = match self.lookup(&scope, id).await? {
                Some(item) => item,
                None if upsert => {
                    tracing::debug!(collection = scope.collection.name(), id, "upserting missing item");
                    storage.create_item(json!({ "id": id }))?
                }
                None => return Ok(None),
            };
            self.authorize(&scope, Operation::PutItem, Some(&*item)).await?;
            item.update_value(candidate.serialize())?;
            self.emit(&scope, EventKind::WillPutItem, EventSubject::Item(&mut *item))
                .await?;
            item.save(scope.options).await?;
            self.emit(&scope, EventKind::DidPutItem, EventSubject::Item(&mut *item))
                .await?;
            Ok::<_, Error>(Some(item))
        })
        .await?;

        match updated {
            Some(item) => Ok(Reply::ok(to_client(scope.client(), &*item)?)),
            None => self.missing(&scope, id),
        }
    }

    async fn delete_item(&self, scope: Scope<'_>, id: &str) -> Result<Reply> {
        let storage = scope.storage();

        let outcome = in_transaction(storage, async {
            let Some(mut item) = self.lookup(&scope, id).await? else {
                return Ok(None);
            };
            self.authorize(&scope, Operation::DeleteItem, Some(&*item)).await?;
            self.emit(&scope, EventKind::WillDeleteItem, EventSubject::Item(&mut *item))
                .await?;
            let removed = item.delete(scope.options).await?;
            if removed {
                self.emit(&scope, EventKind::DidDeleteItem, EventSubject::Item(&mut *item))
                    .await?;
            }
            Ok::<_, Error>(Some(removed))
        })
        .await?;

        match outcome {
            Some(removed) => Ok(self.deletion_reply(removed)),
            None => self.missing(&scope, id),
        }
    }

    async fn find_items(&self, scope: Scope<'_>) -> Result<Reply> {
        self.authorize(&scope, Operation::FindItems, None).await?;
        let items = scope.storage().find_items(scope.options).await?;
        let client = scope.client();
        let client_items = items
            .iter()
            .map(|item| to_client(client, &**item))
            .collect::<Result<Vec<_>>>()?;

        self.emit(
            &scope,
            EventKind::DidFindItems,
            EventSubject::Items {
                items: &items,
                client_items: &client_items,
            },
        )
        .await?;

        Ok(Reply::ok(Value::Array(client_items)))
    }

    async fn count_items(&self, scope: Scope<'_>) -> Result<Reply> {
        self.authorize(&scope, Operation::CountItems, None).await?;
        let count = scope.storage().count_items(scope.options).await?;
        self.emit(&scope, EventKind::DidCountItems, EventSubject::Count(count))
            .await?;
        Ok(Reply::ok(count))
    }

    async fn find_and_delete_items(&self, scope: Scope<'_>) -> Result<Reply> {
        self.authorize(&scope, Operation::FindAndDeleteItems, None).await?;
        let storage = scope.storage();

        let deleted = in_transaction(storage, async {
            let deleted = storage.find_and_delete_items(scope.options).await?;
            self.emit(&scope, EventKind::DidFindAndDeleteItems, EventSubject::Count(deleted))
                .await?;
            Ok::<_, Error>(deleted)
        })
        .await?;

        Ok(self.deletion_reply(deleted))
    }

    async fn get_items(&self, scope: Scope<'_>, body: Option<Value>) -> Result<Reply> {
        let ids = parse_ids(body)?;
        self.authorize(&scope, Operation::GetItems, None).await?;

        let mut options = scope.options.clone();
        if options.get(ERROR_IF_MISSING).is_none() {
            options.insert(ERROR_IF_MISSING, true);
        }
        let items = scope.storage().get_items(&ids, &options).await?;

        // items may come from other collections; resolve each type tag once
        let mut clients: HashMap<String, Arc<dyn Collection>> = HashMap::new();
        let mut client_items = Vec::with_capacity(items.len());
        let mut pairs = Vec::with_capacity(items.len());
        for item in &items {
            let tag = item.type_tag();
            let client = match clients.get(tag) {
                Some(client) => Arc::clone(client),
                None => {
                    let client = self
                        .registry
                        .client_for_type(tag)
                        .unwrap_or_else(|| Arc::clone(scope.collection.client()));
                    clients.insert(tag.to_string(), Arc::clone(&client));
                    client
                }
            };
            let value = to_client(client.as_ref(), &**item)?;
            pairs.push(json!({ "typeTag": tag, "value": value.clone() }));
            client_items.push(value);
        }

        self.emit(
            &scope,
            EventKind::DidGetItems,
            EventSubject::Items {
                items: &items,
                client_items: &client_items,
            },
        )
        .await?;

        Ok(Reply::created(Value::Array(pairs)))
    }

    async fn call_collection_method(
        &self,
        scope: Scope<'_>,
        method: &RegisteredMethod,
        body: Option<Value>,
        is_post: bool,
    ) -> Result<Reply> {
        self.authorize(&scope, Operation::Custom(method.name.clone()), None)
            .await?;

        let call = method.handler.call(MethodRequest {
            name: &method.name,
            collection: scope.storage(),
            client_collection: scope.client(),
            options: scope.options,
            authorization: scope.authorization,
            body: body.as_ref(),
            item: None,
        });
        let response = if is_post {
            in_transaction(scope.storage(), call).await?
        } else {
            call.await?
        };

        Ok(Reply::from_method(response, is_post))
    }

    async fn call_item_method(
        &self,
        scope: Scope<'_>,
        id: &str,
        method: &RegisteredMethod,
        body: Option<Value>,
        is_post: bool,
    ) -> Result<Reply> {
        let work = async {
            let Some(mut item) = self.lookup(&scope, id).await? else {
                return Ok(None);
            };
            self.authorize(&scope, Operation::Custom(method.name.clone()), Some(&*item))
                .await?;
            let response = method
                .handler
                .call(MethodRequest {
                    name: &method.name,
                    collection: scope.storage(),
                    client_collection: scope.client(),
                    options: scope.options,
                    authorization: scope.authorization,
                    body: body.as_ref(),
                    item: Some(&mut *item),
                })
                .await?;
            Ok::<_, Error>(Some(response))
        };

        // item methods may write the item back, whatever the verb
        let response = in_transaction(scope.storage(), work).await?;

        match response {
            Some(response) => Ok(Reply::from_method(response, is_post)),
            None => self.missing(&scope, id),
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryCollection;
    use crate::repository::{RepositoryError, RepositoryOperation};

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let people = MemoryCollection::new("people");
        let value = in_transaction(&people, async {
            people.create_item(json!({"id": "a"}))?.save(&Options::new()).await?;
            Ok::<_, Error>(1)
        })
        .await
        .unwrap();
        assert_eq!(value, 1);
        assert_eq!(people.count_items(&Options::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let people = MemoryCollection::new("people");
        people.insert(json!({"id": "kept"})).await.unwrap();

        let result: Result<()> = in_transaction(&people, async {
            people
                .create_item(json!({"id": "discarded"}))?
                .save(&Options::new())
                .await?;
            Err(Error::Repository(RepositoryError::validation_failed(
                RepositoryOperation::SaveItem,
                "listener refused",
            )))
        })
        .await;

        assert!(result.is_err());
        let remaining = people.find_items(&Options::new()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), Some("kept"));
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(
            parse_ids(Some(json!(["a", 2]))).unwrap(),
            vec!["a".to_string(), "2".to_string()]
        );
        assert!(parse_ids(None).is_err());
        assert!(parse_ids(Some(json!({"ids": []}))).is_err());
        assert!(parse_ids(Some(json!([null]))).is_err());
    }
}
