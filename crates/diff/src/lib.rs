//! Diff engine.
//!
//! Compares two [`ApiSurface`](apicat_store::ApiSurface)s of one catalog api
//! by api. Declarations with different markup are further diffed token by
//! token, and the whole tree can be rendered as marked-up text.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use apicat_diff::{CatalogDiff, DiffOptions};
//! use apicat_store::{Catalog, FrameworkSurface};
//!
//! let catalog = Catalog::open("apis.cat")?;
//! let left = FrameworkSurface::new(catalog.framework("net8.0").ok_or("net8.0")?);
//! let right = FrameworkSurface::new(catalog.framework("net9.0").ok_or("net9.0")?);
//! let diff = CatalogDiff::new(&left, &right)?;
//! print!("{}", diff.render(DiffOptions { exclude_unchanged: true, ..DiffOptions::default() })?);
//! # Ok(())
//! # }
//! ```

pub mod error;
#[cfg(test)]
mod fixtures;
mod render;
mod tokens;
mod tree;

pub use crate::render::DiffOptions;
pub use crate::tokens::{DiffOp, DiffToken, diff_tokens};
pub use crate::tree::{CatalogDiff, DiffKind, DiffSummary};
