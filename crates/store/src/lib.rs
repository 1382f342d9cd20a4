//! Binary catalog artifact.
//!
//! [`save`] serialises a [`CatalogModel`](apicat_model::CatalogModel) into one
//! self-contained, checksummed file; [`Catalog::open`] loads it back for
//! read-only queries. The api tree and identity tables are resident after
//! loading, while declaration markup is decoded only when asked for.
//!
//! ```no_run
//! # fn main() -> apicat_store::error::Result<()> {
//! let catalog = apicat_store::Catalog::open("apis.cat")?;
//! for api in catalog.search("Span") {
//!     println!("{} ({} owners)", api.full_name(), api.availability().len());
//! }
//! # Ok(())
//! # }
//! ```

mod catalog;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod format;
mod ids;
mod surface;
mod views;
mod write;

pub use crate::catalog::{Catalog, Statistics};
pub use crate::ids::{ApiId, AssemblyId, DeclarationId, FrameworkId, PackageId};
pub use crate::surface::{ApiSurface, FrameworkSurface, PackageSurface};
pub use crate::views::{Api, Assembly, Availability, Declaration, DepthFirst, Framework, Owner, Package};
pub use crate::write::{encode, save, write};
pub use apicat_compress::Compression;
