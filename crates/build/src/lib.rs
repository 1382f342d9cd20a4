//! Catalog builder.
//!
//! Folds any number of independently produced [`IndexDocument`]s into one
//! deduplicated [`CatalogModel`]. Identities are merged by fingerprint, so the
//! same assembly seen in a framework and in a package becomes a single row
//! owned by both.
//!
//! [`IndexDocument`]: apicat_model::IndexDocument
//! [`CatalogModel`]: apicat_model::CatalogModel

mod builder;
pub mod error;
mod pipeline;
mod report;

pub use crate::builder::CatalogBuilder;
pub use crate::pipeline::{BuildEvent, build_directory, discover, ingest_directory};
pub use crate::report::{Build, BuildReport, FailedDocument, Issue};
