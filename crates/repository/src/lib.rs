//! Generic entity repository layer over the Elasticsearch HTTP API.
//!
//! This crate sits between application code and the search engine: given an
//! entity type and declarative metadata (index name override, identifier
//! field), it derives everything needed to index, look up, search, and
//! suggest over that entity's documents — no per-entity request/response
//! marshalling.
//!
//! # Architecture
//!
//! - [`descriptor`] - per-entity-type metadata derivation and caching
//! - [`codec`] - entity ↔ document conversion, highlight injection, id extraction
//! - [`repository`] - the generic operation set ([`Repository`] trait and
//!   its Elasticsearch implementation)
//! - [`materialize`] - raw response → typed [`Page`]/suggestion materialization
//! - [`registry`] - explicit startup-time binding registration
//! - [`client`] - shared client configuration and construction
//! - [`error`] - the error taxonomy for all operations
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use searchkit_repository::{
//!     ClientConfig, EntityMetadata, FieldMetadata, Repository, RepositoryRegistry,
//! };
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct BlogPost {
//!     id: Option<u64>,
//!     title: String,
//! }
//!
//! const BLOG_POST: EntityMetadata = EntityMetadata {
//!     type_name: "BlogPost",
//!     index: None, // derived: "blogPost"
//!     fields: &[FieldMetadata::id("id"), FieldMetadata::new("title")],
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RepositoryRegistry::from_config(&ClientConfig::default())?;
//! let posts = registry.register::<BlogPost, u64>(&BLOG_POST)?;
//!
//! posts.save(&BlogPost { id: Some(1), title: "Go systems".into() }).await?;
//! let post = posts.query_by_id(&1).await?;
//! let names = posts.suggest("title", "go").await?;
//! # let _ = (post, names);
//! # Ok(())
//! # }
//! ```
//!
//! # Error model
//!
//! Mis-declared metadata is a construction-time [`ConfigError`]: no
//! repository is produced for it. Call-time failures — invalid entities,
//! codec errors, transport failures, non-success engine statuses, missing
//! documents, partial bulk failures — are all delivered through the same
//! `Result` channel as success. An empty page with `total == 0` is
//! success, not an error.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod materialize;
pub mod registry;
pub mod repository;

pub use client::{ClientAuth, ClientConfig, build_client};
pub use codec::DocumentCodec;
pub use descriptor::{DescriptorCache, EntityDescriptor, EntityMetadata, FieldMetadata};
pub use error::{
    BulkFailure, BulkItemFailure, CodecError, ConfigError, RepositoryError, RepositoryResult,
};
pub use materialize::Page;
pub use registry::RepositoryRegistry;
pub use repository::{ElasticsearchRepository, Repository, SUGGEST_SIZE};
