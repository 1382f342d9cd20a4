//! Points of comparison: one declaration per api.

use crate::catalog::Catalog;
use crate::ids::{ApiId, DeclarationId, FrameworkId};
use crate::views::{Assembly, Declaration, Framework, Package};
use std::collections::HashMap;

/// Resolves at most one declaration per api of a catalog.
pub trait ApiSurface<'a> {
    fn catalog(&self) -> &'a Catalog;

    fn declaration(&self, api: ApiId) -> Option<Declaration<'a>>;

    fn contains(&self, api: ApiId) -> bool {
        self.declaration(api).is_some()
    }
}

/// Indexes the declarations of `assemblies`; the first assembly declaring an
/// api wins.
fn index<'a>(assemblies: impl Iterator<Item = Assembly<'a>>) -> HashMap<ApiId, DeclarationId> {
    let mut declarations = HashMap::new();
    for assembly in assemblies {
        for declaration in assembly.declarations() {
            declarations.entry(declaration.api().id()).or_insert(declaration.id());
        }
    }
    declarations
}

/// Everything a framework ships in-box.
#[derive(Debug)]
pub struct FrameworkSurface<'a> {
    framework: Framework<'a>,
    declarations: HashMap<ApiId, DeclarationId>,
}

impl<'a> FrameworkSurface<'a> {
    pub fn new(framework: Framework<'a>) -> Self {
        Self { framework, declarations: index(framework.assemblies()) }
    }

    pub fn framework(&self) -> Framework<'a> {
        self.framework
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl<'a> ApiSurface<'a> for FrameworkSurface<'a> {
    fn catalog(&self) -> &'a Catalog {
        self.framework.catalog()
    }

    fn declaration(&self, api: ApiId) -> Option<Declaration<'a>> {
        self.declarations.get(&api).map(|&id| self.catalog().declaration(id))
    }
}

/// What a package ships, either for one target framework or for all of them.
#[derive(Debug)]
pub struct PackageSurface<'a> {
    package: Package<'a>,
    framework: Option<FrameworkId>,
    declarations: HashMap<ApiId, DeclarationId>,
}

impl<'a> PackageSurface<'a> {
    pub fn new(package: Package<'a>, framework: Option<FrameworkId>) -> Self {
        Self { package, framework, declarations: index(package.assemblies(framework)) }
    }

    pub fn package(&self) -> Package<'a> {
        self.package
    }

    pub fn framework(&self) -> Option<FrameworkId> {
        self.framework
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl<'a> ApiSurface<'a> for PackageSurface<'a> {
    fn catalog(&self) -> &'a Catalog {
        self.package.catalog()
    }

    fn declaration(&self, api: ApiId) -> Option<Declaration<'a>> {
        self.declarations.get(&api).map(|&id| self.catalog().declaration(id))
    }
}
