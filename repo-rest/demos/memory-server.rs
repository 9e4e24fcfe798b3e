//! In-Memory Repository Server
//!
//! Serves two in-memory collections over the generic REST surface:
//!
//! - `people`: an item method `retire`, a passthrough collection method
//!   `countRetired`, a handler method `stats`, and a `willPutItem` listener
//!   that normalizes names
//! - `notes`: read-only for anonymous clients
//!
//! Sign-in is enabled with the account `ada` / `lovelace`.
//!
//! ## Running
//!
//! ```bash
//! cargo run --example memory-server
//! ```
//!
//! ## Testing
//!
//! ```bash
//! curl http://localhost:8080/ping
//! curl -X POST http://localhost:8080/people -d '{"name": "  grace hopper "}'
//! curl "http://localhost:8080/people?limit=10&reverse=true"
//! curl http://localhost:8080/people/count
//! curl -X POST http://localhost:8080/people/<id>/retire
//! curl http://localhost:8080/people/count-retired
//! curl -i http://localhost:8080/people/stats
//!
//! # writing notes needs a token
//! TOKEN=$(curl -s -X POST http://localhost:8080/authorizations \
//!   -d '{"username": "ada", "password": "lovelace"}' | tr -d '"')
//! curl -X POST "http://localhost:8080/notes?authorization=$TOKEN" -d '{"text": "hi"}'
//! ```

use std::sync::Arc;

use repo_rest::prelude::*;
use serde_json::{json, Value};

fn people_storage() -> MemoryCollection {
    MemoryCollection::builder("people")
        .collection_method("countRetired", |docs, _| {
            let retired = docs
                .iter()
                .filter(|doc| doc.get("retired") == Some(&Value::Bool(true)))
                .count();
            Ok(Some(json!(retired)))
        })
        .item_method("retire", |doc, _| {
            doc.set("retired", json!(true));
            Ok(Some(doc.to_value()))
        })
        .build()
}

fn people(storage: MemoryCollection) -> RegisteredCollection {
    let stats_storage = storage.clone();
    RegisteredCollection::builder(Arc::new(storage))
        .collection_method("countRetired", Method::Passthrough)
        .item_method("retire", Method::Passthrough)
        .collection_method(
            "stats",
            method_fn(move |request| {
                Ok(MethodResponse::body(json!({
                    "collection": request.collection.name(),
                    "typeTag": stats_storage.type_tag(),
                }))
                .with_header("xServedBy", "memory-server"))
            }),
        )
        .on(
            EventKind::WillPutItem,
            listener_fn(|event| {
                let Some(item) = event.item_mut() else {
                    return Ok(());
                };
                let name = item.serialize()["name"].as_str().map(|n| n.trim().to_string());
                if let Some(name) = name {
                    item.update_value(json!({ "name": name }))?;
                }
                Ok(())
            }),
        )
        .on(
            EventKind::DidDeleteItem,
            listener_fn(|event| {
                tracing::info!(
                    item = ?event.item().and_then(|i| i.id()),
                    "person deleted"
                );
                Ok(())
            }),
        )
        .build()
}

fn notes() -> RegisteredCollection {
    RegisteredCollection::builder(Arc::new(MemoryCollection::new("notes")))
        .authorize(authorizer_fn(|request| {
            Ok(request.authorization.is_some()
                || matches!(
                    request.operation,
                    Operation::GetItem
                        | Operation::GetItems
                        | Operation::FindItems
                        | Operation::CountItems
                ))
        }))
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load_for_service("memory-server")?;
    config.rest.sign_in = true;
    config.validate()?;
    init_tracing(&config)?;

    let service = RestService::builder()
        .config(config.rest.clone())
        .collection(people(people_storage()))
        .collection(notes())
        .credentials(Arc::new(
            InMemoryCredentials::new().with_account("ada", "lovelace"),
        ))
        .build()?;

    Server::new(config).serve(service).await
}
