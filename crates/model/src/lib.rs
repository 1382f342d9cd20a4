//! Core vocabulary of the API catalog.
//!
//! - [`Fingerprint`]: content-addressed identity of packages, assemblies and apis.
//! - [`Markup`]: tokenised declaration syntax with embedded cross-references.
//! - [`IndexDocument`]: the per-unit input produced by the extraction front end.
//! - [`CatalogModel`]: the merged, immutable entity graph.

mod catalog;
mod document;
pub mod error;
mod fingerprint;
mod identity;
mod kind;
mod markup;

pub use crate::catalog::{
    ApiEntry, AssemblyEntry, CatalogModel, Declaration, FrameworkEntry, PackageAssembly, PackageEntry,
    ReverseIndex, Violation,
};
pub use crate::document::{
    ApiRecord, AssemblyRecord, DeclarationRecord, FrameworkDocument, IndexDocument, PackageDocument,
};
pub use crate::fingerprint::Fingerprint;
pub use crate::identity::AssemblyIdentity;
pub use crate::kind::ApiKind;
pub use crate::markup::{Markup, MarkupBuilder, MarkupToken, TokenKind};
