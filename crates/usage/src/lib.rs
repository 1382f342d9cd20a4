//! SQLite ledger of feature usage.
//!
//! Tracks which reference units (packages or telemetry submissions) used
//! which features, independently of the catalog itself, and rolls usage up
//! into per-feature adoption percentages. The ancestor closure between
//! features is supplied by the caller, either edge by edge or derived from a
//! [`FeatureCatalog`].

mod catalog;
mod db;
pub mod error;
mod models;
mod repo;

pub use crate::catalog::FeatureCatalog;
pub use crate::db::UsageDatabase;
pub use crate::models::{Feature, FeatureUsage, ReferenceUnit};
pub use crate::repo::UsageRepository;
