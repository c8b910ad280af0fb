//! Lorcana Store - card catalog, collections and data lifecycle
//!
//! Keeps cards, sets, prices, collections and metadata as whole JSON
//! documents (flat files or SQLite) and serves them over a small REST API.

pub mod catalog;
pub mod collections;
pub mod config;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod models;
pub mod normalize;
pub mod store;
pub mod web;

pub use catalog::{CardCatalog, CardFilters};
pub use collections::{CollectionService, LineItemOutcome};
pub use config::StoreConfig;
pub use error::{ErrorCategory, Result, StoreError, ValidationError};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use lifecycle::{DataLifecycle, DataStats, ImportResult, RestoreResult};
pub use normalize::ImportKind;
pub use store::{DocumentKind, DocumentStore, FileStore, Records, SqliteStore};
pub use web::AppState;
