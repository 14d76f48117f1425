//! The generic repository engine.
//!
//! [`Repository`] is the uniform operation set over one entity type;
//! [`ElasticsearchRepository`] implements it once, parameterized by an
//! [`EntityDescriptor`] and the shared client handle. Request bodies are
//! engine-native JSON supplied by the caller (queries) or produced by the
//! codec (documents); responses are materialized into typed results.
//!
//! Every operation owns its own request/response cycle; the engine keeps
//! no cross-call state. Point lookup, paginated query, and suggestion are
//! safe to issue from latency-sensitive paths: no thread blocks while the
//! engine call is outstanding.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::response::Response;
use elasticsearch::indices::{IndicesCreateParts, IndicesDeleteParts};
use elasticsearch::{BulkParts, DeleteParts, Elasticsearch, GetParts, IndexParts, SearchParts};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::codec::DocumentCodec;
use crate::descriptor::{EntityDescriptor, EntityMetadata};
use crate::error::{BulkFailure, CodecError, ConfigError, RepositoryError, RepositoryResult};
use crate::materialize::{Page, bulk_failures_from_response, page_from_response,
                         suggestions_from_response};

/// Number of suggestions requested per suggest call.
pub const SUGGEST_SIZE: usize = 30;

/// The uniform CRUD/query contract over one entity type.
///
/// `T` is the entity type, `Id` the identifier type declared alongside it.
/// Boolean results report the engine's acknowledgement or shard outcome;
/// definite failures are errors, never `false`.
#[async_trait]
pub trait Repository<T, Id>: Send + Sync
where
    T: Send + Sync,
    Id: Send + Sync,
{
    /// Creates the entity's index from a settings+mappings document.
    /// Returns true iff the engine acknowledges the creation.
    async fn create_index(&self, source: Value) -> RepositoryResult<bool>;

    /// Deletes the entity's index.
    /// Returns true iff the engine acknowledges the deletion.
    async fn delete_index(&self) -> RepositoryResult<bool>;

    /// Indexes one entity under the string form of its identifier field.
    /// Returns true iff the engine reports zero shard-level failures.
    async fn save(&self, entity: &T) -> RepositoryResult<bool>;

    /// Indexes a batch of entities in one bulk request.
    ///
    /// An empty batch succeeds without a network call. Item-level failures
    /// raise [`BulkFailure`] with per-item detail; `Ok(true)` means every
    /// item was indexed.
    async fn save_all(&self, entities: &[T]) -> RepositoryResult<bool>;

    /// Deletes the document with the given identifier.
    /// Returns true iff the engine reports zero shard-level failures.
    async fn delete_by_id(&self, id: &Id) -> RepositoryResult<bool>;

    /// Point lookup by identifier. A missing document is a
    /// [`RepositoryError::NotFound`], never a zero-valued entity.
    async fn query_by_id(&self, id: &Id) -> RepositoryResult<T>;

    /// Runs a caller-supplied, engine-native search body and materializes
    /// the hits into a page with highlight fragments merged in.
    ///
    /// The body is passed through verbatim; its internal structure is not
    /// validated here.
    async fn query_page(&self, query: Value) -> RepositoryResult<Page<T>>;

    /// Prefix completion on a single field. Up to [`SUGGEST_SIZE`]
    /// suggestions, blank entries dropped, exact duplicates collapsed.
    async fn suggest(&self, field: &str, prefix: &str) -> RepositoryResult<Vec<String>>;
}

/// Elasticsearch-backed [`Repository`] implementation, bound to one entity
/// type and the shared client handle.
pub struct ElasticsearchRepository<T, Id> {
    client: Arc<Elasticsearch>,
    descriptor: Arc<EntityDescriptor<T>>,
    codec: DocumentCodec<T>,
    _id: PhantomData<fn() -> Id>,
}

impl<T, Id> ElasticsearchRepository<T, Id>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    Id: Display + Send + Sync,
{
    /// Derives a descriptor from `metadata` and binds a repository to it.
    ///
    /// Fails with a [`ConfigError`] for mis-declared metadata; no
    /// repository is produced in that case.
    pub fn new(
        client: Arc<Elasticsearch>,
        metadata: &EntityMetadata,
    ) -> Result<Self, ConfigError> {
        let descriptor = Arc::new(EntityDescriptor::describe(metadata)?);
        Ok(Self::with_descriptor(client, descriptor))
    }

    /// Binds a repository to an already-derived (typically cached)
    /// descriptor.
    pub fn with_descriptor(
        client: Arc<Elasticsearch>,
        descriptor: Arc<EntityDescriptor<T>>,
    ) -> Self {
        let codec = DocumentCodec::new(descriptor.clone());
        Self {
            client,
            descriptor,
            codec,
            _id: PhantomData,
        }
    }

    /// The index this repository operates on.
    pub fn index_name(&self) -> &str {
        self.descriptor.index_name()
    }

    /// Parses a successful response body, mapping parse failures to
    /// transport errors.
    async fn read_body(response: Response) -> RepositoryResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(RepositoryError::from)
    }

    /// Turns a non-success response into a query error carrying the
    /// engine's reported reason.
    async fn status_error(response: Response) -> RepositoryError {
        let status = response.status_code().as_u16();
        let reason = response.text().await.unwrap_or_default();
        RepositoryError::Query { status, reason }
    }
}

/// Reads `_shards.failed` from an index/delete acknowledgement body.
fn zero_shard_failures(body: &Value) -> bool {
    body.get("_shards")
        .and_then(|s| s.get("failed"))
        .and_then(Value::as_u64)
        .map(|failed| failed == 0)
        .unwrap_or(false)
}

/// Interprets a bulk response body: any item-level failure raises
/// [`BulkFailure`] with per-item detail, never a bare `false`.
fn bulk_outcome(body: &Value) -> RepositoryResult<bool> {
    if body.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return Err(BulkFailure {
            failures: bulk_failures_from_response(body),
        }
        .into());
    }
    Ok(true)
}

/// Interprets a get response body: the document's `_source` when found,
/// [`RepositoryError::NotFound`] otherwise.
fn get_source(body: &Value, index: &str, id: &str) -> RepositoryResult<Value> {
    if !body.get("found").and_then(Value::as_bool).unwrap_or(false) {
        return Err(RepositoryError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        });
    }
    body.get("_source").cloned().ok_or_else(|| {
        CodecError::Decode {
            message: "get response carries no _source".to_string(),
        }
        .into()
    })
}

#[async_trait]
impl<T, Id> Repository<T, Id> for ElasticsearchRepository<T, Id>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    Id: Display + Send + Sync,
{
    async fn create_index(&self, source: Value) -> RepositoryResult<bool> {
        let index = self.descriptor.index_name();

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(source)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        let acknowledged = body
            .get("acknowledged")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::debug!("Created index '{}' (acknowledged: {})", index, acknowledged);
        Ok(acknowledged)
    }

    async fn delete_index(&self) -> RepositoryResult<bool> {
        let index = self.descriptor.index_name();

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        let acknowledged = body
            .get("acknowledged")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::debug!("Deleted index '{}' (acknowledged: {})", index, acknowledged);
        Ok(acknowledged)
    }

    async fn save(&self, entity: &T) -> RepositoryResult<bool> {
        // Identifier extraction fails fast, before any network call.
        let id = self.codec.extract_id(entity)?;
        let document = self.codec.encode(entity)?;

        let response = self
            .client
            .index(IndexParts::IndexId(self.descriptor.index_name(), &id))
            .body(document)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        Ok(zero_shard_failures(&body))
    }

    async fn save_all(&self, entities: &[T]) -> RepositoryResult<bool> {
        if entities.is_empty() {
            return Ok(true);
        }

        // Identifier extraction for every entity happens up front; a single
        // unset identifier fails the whole batch before anything is sent.
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(entities.len() * 2);
        for entity in entities {
            let id = self.codec.extract_id(entity)?;
            let document = self.codec.encode(entity)?;
            body.push(json!({ "index": { "_id": id } }).into());
            body.push(document.into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(self.descriptor.index_name()))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        if let Err(err) = bulk_outcome(&body) {
            tracing::debug!(
                "Bulk save to '{}' failed: {}",
                self.descriptor.index_name(),
                err
            );
            return Err(err);
        }

        Ok(true)
    }

    async fn delete_by_id(&self, id: &Id) -> RepositoryResult<bool> {
        let doc_id = id.to_string();

        let response = self
            .client
            .delete(DeleteParts::IndexId(
                self.descriptor.index_name(),
                &doc_id,
            ))
            .send()
            .await?;

        let status = response.status_code();
        // 404 still carries shard results ("result": "not_found").
        if !status.is_success() && status.as_u16() != 404 {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        Ok(zero_shard_failures(&body))
    }

    async fn query_by_id(&self, id: &Id) -> RepositoryResult<T> {
        let index = self.descriptor.index_name();
        let doc_id = id.to_string();

        let response = self
            .client
            .get(GetParts::IndexId(index, &doc_id))
            .send()
            .await?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(RepositoryError::NotFound {
                index: index.to_string(),
                id: doc_id,
            });
        }
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        let source = get_source(&body, index, &doc_id)?;
        Ok(self.codec.decode(source)?)
    }

    async fn query_page(&self, query: Value) -> RepositoryResult<Page<T>> {
        let index = self.descriptor.index_name();

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(query)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        page_from_response(&self.codec, &body)
    }

    async fn suggest(&self, field: &str, prefix: &str) -> RepositoryResult<Vec<String>> {
        let index = self.descriptor.index_name();

        let body = json!({
            "suggest": {
                "suggestions": {
                    "prefix": prefix,
                    "completion": {
                        "field": field,
                        "size": SUGGEST_SIZE,
                        "skip_duplicates": true
                    }
                }
            }
        });

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = Self::read_body(response).await?;
        Ok(suggestions_from_response(&body, SUGGEST_SIZE))
    }
}
