//! Dense integer handles into a loaded [`Catalog`](crate::Catalog).
//!
//! Handles are only meaningful for the catalog that produced them.

use derive_more::Display;

macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[display("{_0}")]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    )+};
}

entity_id!(
    /// An api row.
    ApiId,
    /// An assembly row.
    AssemblyId,
    /// A framework row.
    FrameworkId,
    /// A package row.
    PackageId,
);

/// One declaration: the `slot`-th declaration of `assembly`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{assembly}:{slot}")]
pub struct DeclarationId {
    pub assembly: AssemblyId,
    pub slot: u32,
}
