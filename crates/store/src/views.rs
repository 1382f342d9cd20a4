//! Borrowed, copyable views over catalog rows.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::ids::{ApiId, AssemblyId, DeclarationId, FrameworkId, PackageId};
use apicat_model::{ApiKind, AssemblyIdentity, Fingerprint, Markup};
use std::fmt;

// =============================================================================
// Api
// =============================================================================

#[derive(Clone, Copy)]
pub struct Api<'a> {
    catalog: &'a Catalog,
    id: ApiId,
}

impl<'a> Api<'a> {
    pub(crate) fn new(catalog: &'a Catalog, id: ApiId) -> Self {
        Self { catalog, id }
    }

    pub fn id(&self) -> ApiId {
        self.id
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog.apis[self.id.index()].fingerprint
    }

    pub fn kind(&self) -> ApiKind {
        self.catalog.apis[self.id.index()].kind
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string(self.catalog.apis[self.id.index()].name)
    }

    pub fn parent(&self) -> Option<Api<'a>> {
        self.catalog.apis[self.id.index()].parent.map(|id| Api::new(self.catalog, id))
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = Api<'a>> + 'a {
        let catalog = self.catalog;
        catalog.apis[self.id.index()].children.iter().map(move |&id| Api::new(catalog, id))
    }

    /// Parent, grandparent and so on up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Api<'a>> + 'a {
        std::iter::successors(self.parent(), |api| api.parent())
    }

    /// Names from the root down to this api, dot separated.
    pub fn full_name(&self) -> String {
        let mut names: Vec<&str> = self.ancestors().map(|api| api.name()).collect();
        names.reverse();
        names.push(self.name());
        names.join(".")
    }

    /// Every declaration of this api across all assemblies.
    pub fn declarations(&self) -> impl ExactSizeIterator<Item = Declaration<'a>> + 'a {
        let catalog = self.catalog;
        catalog.api_declarations[self.id.index()].iter().map(move |&id| Declaration::new(catalog, id))
    }

    /// Where this api is available: one entry per owner of each declaring
    /// assembly, frameworks first (by framework), then packages (by package,
    /// then framework).
    pub fn availability(&self) -> Vec<Availability<'a>> {
        let mut availability = Vec::new();
        for declaration in self.declarations() {
            let assembly = declaration.assembly().id();
            for &framework in &self.catalog.assembly_frameworks[assembly.index()] {
                availability.push(Availability { owner: Owner::Framework(framework), declaration });
            }
            for &(package, framework) in &self.catalog.assembly_packages[assembly.index()] {
                availability.push(Availability { owner: Owner::Package(package, framework), declaration });
            }
        }
        availability.sort_by_key(|entry| (entry.owner, entry.declaration.id()));
        availability
    }
}

impl fmt::Debug for Api<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").field("id", &self.id).field("kind", &self.kind()).field("name", &self.name()).finish()
    }
}

impl PartialEq for Api<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.catalog, other.catalog) && self.id == other.id
    }
}

impl Eq for Api<'_> {}

/// Who ships an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner {
    Framework(FrameworkId),
    Package(PackageId, FrameworkId),
}

#[derive(Debug, Clone, Copy)]
pub struct Availability<'a> {
    pub owner: Owner,
    pub declaration: Declaration<'a>,
}

/// Iterator returned by [`Catalog::apis_depth_first`].
pub struct DepthFirst<'a> {
    catalog: &'a Catalog,
    stack: Vec<ApiId>,
}

impl<'a> DepthFirst<'a> {
    pub(crate) fn new(catalog: &'a Catalog, mut roots: Vec<ApiId>) -> Self {
        roots.reverse();
        Self { catalog, stack: roots }
    }
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = Api<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(self.catalog.apis[id.index()].children.iter().rev());
        Some(Api::new(self.catalog, id))
    }
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Clone, Copy)]
pub struct Declaration<'a> {
    catalog: &'a Catalog,
    id: DeclarationId,
}

impl<'a> Declaration<'a> {
    pub(crate) fn new(catalog: &'a Catalog, id: DeclarationId) -> Self {
        Self { catalog, id }
    }

    pub fn id(&self) -> DeclarationId {
        self.id
    }

    fn row(&self) -> (ApiId, u32) {
        self.catalog.assemblies[self.id.assembly.index()].declarations[self.id.slot as usize]
    }

    pub fn api(&self) -> Api<'a> {
        Api::new(self.catalog, self.row().0)
    }

    pub fn assembly(&self) -> Assembly<'a> {
        Assembly::new(self.catalog, self.id.assembly)
    }

    /// Heap slot of the markup. Equal slots within one catalog mean equal
    /// markup.
    pub fn markup_index(&self) -> u32 {
        self.row().1
    }

    /// Decodes the markup of this declaration.
    pub fn markup(&self) -> Result<Markup> {
        self.catalog.markup(self.markup_index())
    }
}

impl fmt::Debug for Declaration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration").field("id", &self.id).field("markup", &self.markup_index()).finish()
    }
}

// =============================================================================
// Owners
// =============================================================================

#[derive(Clone, Copy)]
pub struct Assembly<'a> {
    catalog: &'a Catalog,
    id: AssemblyId,
}

impl<'a> Assembly<'a> {
    pub(crate) fn new(catalog: &'a Catalog, id: AssemblyId) -> Self {
        Self { catalog, id }
    }

    pub fn id(&self) -> AssemblyId {
        self.id
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog.assemblies[self.id.index()].fingerprint
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string(self.catalog.assemblies[self.id.index()].name)
    }

    pub fn identity(&self) -> AssemblyIdentity {
        let row = &self.catalog.assemblies[self.id.index()];
        AssemblyIdentity::new(
            self.catalog.string(row.name),
            self.catalog.string(row.version),
            self.catalog.string(row.public_key_token),
        )
    }

    pub fn roots(&self) -> impl ExactSizeIterator<Item = Api<'a>> + 'a {
        let catalog = self.catalog;
        catalog.assemblies[self.id.index()].roots.iter().map(move |&id| Api::new(catalog, id))
    }

    pub fn declarations(&self) -> impl ExactSizeIterator<Item = Declaration<'a>> + 'a {
        let catalog = self.catalog;
        let assembly = self.id;
        (0..catalog.assemblies[assembly.index()].declarations.len() as u32)
            .map(move |slot| Declaration::new(catalog, DeclarationId { assembly, slot }))
    }

    /// The declaration of `api` in this assembly, if any.
    pub fn declaration_of(&self, api: ApiId) -> Option<Declaration<'a>> {
        let rows = &self.catalog.assemblies[self.id.index()].declarations;
        let slot = rows.binary_search_by_key(&api, |&(api, _)| api).ok()?;
        Some(Declaration::new(self.catalog, DeclarationId { assembly: self.id, slot: slot as u32 }))
    }

    pub fn frameworks(&self) -> impl ExactSizeIterator<Item = Framework<'a>> + 'a {
        let catalog = self.catalog;
        catalog.assembly_frameworks[self.id.index()].iter().map(move |&id| Framework::new(catalog, id))
    }

    pub fn packages(&self) -> impl ExactSizeIterator<Item = (Package<'a>, Framework<'a>)> + 'a {
        let catalog = self.catalog;
        catalog.assembly_packages[self.id.index()]
            .iter()
            .map(move |&(package, framework)| (Package::new(catalog, package), Framework::new(catalog, framework)))
    }
}

impl fmt::Debug for Assembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly").field("id", &self.id).field("name", &self.name()).finish()
    }
}

#[derive(Clone, Copy)]
pub struct Framework<'a> {
    catalog: &'a Catalog,
    id: FrameworkId,
}

impl<'a> Framework<'a> {
    pub(crate) fn new(catalog: &'a Catalog, id: FrameworkId) -> Self {
        Self { catalog, id }
    }

    pub fn id(&self) -> FrameworkId {
        self.id
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string(self.catalog.frameworks[self.id.index()].name)
    }

    pub fn assemblies(&self) -> impl ExactSizeIterator<Item = Assembly<'a>> + 'a {
        let catalog = self.catalog;
        catalog.frameworks[self.id.index()].assemblies.iter().map(move |&id| Assembly::new(catalog, id))
    }
}

impl fmt::Debug for Framework<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Framework").field(&self.name()).finish()
    }
}

#[derive(Clone, Copy)]
pub struct Package<'a> {
    catalog: &'a Catalog,
    id: PackageId,
}

impl<'a> Package<'a> {
    pub(crate) fn new(catalog: &'a Catalog, id: PackageId) -> Self {
        Self { catalog, id }
    }

    pub fn handle(&self) -> PackageId {
        self.id
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog.packages[self.id.index()].fingerprint
    }

    pub fn id(&self) -> &'a str {
        self.catalog.string(self.catalog.packages[self.id.index()].id)
    }

    pub fn version(&self) -> &'a str {
        self.catalog.string(self.catalog.packages[self.id.index()].version)
    }

    /// Frameworks this package targets, in first-seen order.
    pub fn frameworks(&self) -> Vec<Framework<'a>> {
        let mut frameworks: Vec<FrameworkId> = Vec::new();
        for &(framework, _) in &self.catalog.packages[self.id.index()].assemblies {
            if !frameworks.contains(&framework) {
                frameworks.push(framework);
            }
        }
        frameworks.into_iter().map(|id| Framework::new(self.catalog, id)).collect()
    }

    /// Assemblies shipped for `framework`, or for every framework when `None`.
    pub fn assemblies(&self, framework: Option<FrameworkId>) -> impl Iterator<Item = Assembly<'a>> + 'a {
        let catalog = self.catalog;
        catalog.packages[self.id.index()]
            .assemblies
            .iter()
            .filter(move |&&(owner, _)| framework.is_none_or(|framework| framework == owner))
            .map(move |&(_, assembly)| Assembly::new(catalog, assembly))
    }
}

impl fmt::Debug for Package<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package").field("id", &self.id()).field("version", &self.version()).finish()
    }
}
