//! The merged entity graph.
//!
//! Entities reference each other by compact indexes into the four tables.
//! These indexes are local to one build and mean nothing to another catalog;
//! only fingerprints are comparable across builds.

use crate::fingerprint::Fingerprint;
use crate::identity::AssemblyIdentity;
use crate::kind::ApiKind;
use crate::markup::Markup;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkEntry {
    pub name: String,
    /// In-box assemblies, ascending.
    pub assemblies: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub fingerprint: Fingerprint,
    pub id: String,
    pub version: String,
    /// Ordered by framework, then assembly.
    pub assemblies: Vec<PackageAssembly>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageAssembly {
    pub framework: usize,
    pub assembly: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyEntry {
    pub fingerprint: Fingerprint,
    pub identity: AssemblyIdentity,
    /// Declared apis without a parent, in api order.
    pub roots: Vec<usize>,
    /// Ordered by api.
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub api: usize,
    pub markup: Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEntry {
    pub fingerprint: Fingerprint,
    pub kind: ApiKind,
    pub parent: Option<usize>,
    pub name: String,
    /// In discovery order.
    pub children: Vec<usize>,
}

/// Lookups from an entity back to everything that refers to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseIndex {
    /// For each api: `(assembly, declaration slot)`, by assembly.
    pub api_declarations: Vec<Vec<(usize, usize)>>,
    /// For each assembly: the frameworks shipping it in-box.
    pub assembly_frameworks: Vec<Vec<usize>>,
    /// For each assembly: `(package, framework)` pairs shipping it.
    pub assembly_packages: Vec<Vec<(usize, usize)>>,
}

impl ReverseIndex {
    fn compute(
        frameworks: &[FrameworkEntry],
        packages: &[PackageEntry],
        assemblies: &[AssemblyEntry],
        api_count: usize,
    ) -> Self {
        let mut index = Self {
            api_declarations: vec![Vec::new(); api_count],
            assembly_frameworks: vec![Vec::new(); assemblies.len()],
            assembly_packages: vec![Vec::new(); assemblies.len()],
        };
        for (assembly_id, assembly) in assemblies.iter().enumerate() {
            for (slot, declaration) in assembly.declarations.iter().enumerate() {
                if let Some(entries) = index.api_declarations.get_mut(declaration.api) {
                    entries.push((assembly_id, slot));
                }
            }
        }
        for (framework_id, framework) in frameworks.iter().enumerate() {
            for &assembly in &framework.assemblies {
                if let Some(entries) = index.assembly_frameworks.get_mut(assembly) {
                    entries.push(framework_id);
                }
            }
        }
        for (package_id, package) in packages.iter().enumerate() {
            for pair in &package.assemblies {
                if let Some(entries) = index.assembly_packages.get_mut(pair.assembly) {
                    entries.push((package_id, pair.framework));
                }
            }
        }
        index
    }
}

/// One immutable catalog generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogModel {
    frameworks: Vec<FrameworkEntry>,
    packages: Vec<PackageEntry>,
    assemblies: Vec<AssemblyEntry>,
    apis: Vec<ApiEntry>,
    index: ReverseIndex,
}

impl CatalogModel {
    /// Assembles a catalog from its tables and derives the reverse index.
    pub fn new(
        frameworks: Vec<FrameworkEntry>,
        packages: Vec<PackageEntry>,
        assemblies: Vec<AssemblyEntry>,
        apis: Vec<ApiEntry>,
    ) -> Self {
        let index = ReverseIndex::compute(&frameworks, &packages, &assemblies, apis.len());
        Self { frameworks, packages, assemblies, apis, index }
    }

    pub fn frameworks(&self) -> &[FrameworkEntry] {
        &self.frameworks
    }

    pub fn packages(&self) -> &[PackageEntry] {
        &self.packages
    }

    pub fn assemblies(&self) -> &[AssemblyEntry] {
        &self.assemblies
    }

    pub fn apis(&self) -> &[ApiEntry] {
        &self.apis
    }

    pub fn index(&self) -> &ReverseIndex {
        &self.index
    }

    pub fn find_api(&self, fingerprint: Fingerprint) -> Option<usize> {
        self.apis.iter().position(|api| api.fingerprint == fingerprint)
    }

    pub fn find_assembly(&self, fingerprint: Fingerprint) -> Option<usize> {
        self.assemblies.iter().position(|assembly| assembly.fingerprint == fingerprint)
    }

    pub fn find_framework(&self, name: &str) -> Option<usize> {
        self.frameworks.iter().position(|framework| framework.name == name)
    }

    /// Apis without a parent, in table order.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.apis.iter().enumerate().filter(|(_, api)| api.parent.is_none()).map(|(id, _)| id)
    }

    /// Checks referential integrity, returning every violation found.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let apis = self.apis.len();
        let assemblies = self.assemblies.len();

        for (id, api) in self.apis.iter().enumerate() {
            if let Some(parent) = api.parent {
                match self.apis.get(parent) {
                    None => violations.push(Violation::ApiOutOfRange { from: id, api: parent }),
                    Some(entry) if !entry.children.contains(&id) => {
                        violations.push(Violation::ChildNotLinked { parent, child: id });
                    },
                    Some(_) => {},
                }
            }
            for &child in &api.children {
                if self.apis.get(child).and_then(|entry| entry.parent) != Some(id) {
                    violations.push(Violation::ChildNotLinked { parent: id, child });
                }
            }
            if !self.reaches_root(id) {
                violations.push(Violation::UnresolvedParentChain { api: id });
            }
        }

        for (id, assembly) in self.assemblies.iter().enumerate() {
            for declaration in &assembly.declarations {
                if declaration.api >= apis {
                    violations.push(Violation::DeclarationOutOfRange { assembly: id, api: declaration.api });
                }
            }
            for &root in &assembly.roots {
                if self.apis.get(root).is_none_or(|api| api.parent.is_some()) {
                    violations.push(Violation::InvalidRoot { assembly: id, api: root });
                }
            }
        }

        for framework in &self.frameworks {
            for &assembly in &framework.assemblies {
                if assembly >= assemblies {
                    violations.push(Violation::AssemblyOutOfRange { owner: framework.name.clone(), assembly });
                }
            }
        }
        for package in &self.packages {
            for pair in &package.assemblies {
                if pair.assembly >= assemblies || pair.framework >= self.frameworks.len() {
                    violations.push(Violation::AssemblyOutOfRange {
                        owner: format!("{} {}", package.id, package.version),
                        assembly: pair.assembly,
                    });
                }
            }
        }
        violations
    }

    fn reaches_root(&self, api: usize) -> bool {
        let mut seen = HashSet::new();
        let mut current = api;
        loop {
            if !seen.insert(current) {
                return false;
            }
            match self.apis.get(current) {
                None => return false,
                Some(entry) => match entry.parent {
                    None => return true,
                    Some(parent) => current = parent,
                },
            }
        }
    }
}

/// A broken reference found by [`CatalogModel::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    ApiOutOfRange { from: usize, api: usize },
    ChildNotLinked { parent: usize, child: usize },
    UnresolvedParentChain { api: usize },
    DeclarationOutOfRange { assembly: usize, api: usize },
    InvalidRoot { assembly: usize, api: usize },
    AssemblyOutOfRange { owner: String, assembly: usize },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ApiOutOfRange { from, api } => write!(f, "api {from} has parent {api} which does not exist"),
            Self::ChildNotLinked { parent, child } => write!(f, "api {child} is not linked to parent {parent}"),
            Self::UnresolvedParentChain { api } => write!(f, "api {api} has no parent chain to a root"),
            Self::DeclarationOutOfRange { assembly, api } => {
                write!(f, "assembly {assembly} declares api {api} which does not exist")
            },
            Self::InvalidRoot { assembly, api } => write!(f, "assembly {assembly} lists api {api} as a root"),
            Self::AssemblyOutOfRange { owner, assembly } => {
                write!(f, "{owner} references assembly {assembly} which does not exist")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(id: &str, kind: ApiKind, parent: Option<usize>, children: Vec<usize>) -> ApiEntry {
        ApiEntry { fingerprint: Fingerprint::of_api(id), kind, parent, name: id.to_string(), children }
    }

    fn model() -> CatalogModel {
        let apis = vec![
            api("N:N", ApiKind::Namespace, None, vec![1]),
            api("T:N.T", ApiKind::Class, Some(0), vec![2]),
            api("M:N.T.M", ApiKind::Method, Some(1), vec![]),
        ];
        let assembly = AssemblyEntry {
            fingerprint: Fingerprint::of_api("assembly"),
            identity: AssemblyIdentity::new("A", "1.0.0.0", ""),
            roots: vec![0],
            declarations: (0..3).map(|api| Declaration { api, markup: Markup::default() }).collect(),
        };
        let framework = FrameworkEntry { name: "net8.0".to_string(), assemblies: vec![0] };
        let package = PackageEntry {
            fingerprint: Fingerprint::of_package("P", "1.0.0"),
            id: "P".to_string(),
            version: "1.0.0".to_string(),
            assemblies: vec![PackageAssembly { framework: 0, assembly: 0 }],
        };
        CatalogModel::new(vec![framework], vec![package], vec![assembly], apis)
    }

    #[test]
    fn reverse_index() {
        let model = model();
        assert_eq!(model.index().api_declarations[2], vec![(0, 2)]);
        assert_eq!(model.index().assembly_frameworks[0], vec![0]);
        assert_eq!(model.index().assembly_packages[0], vec![(0, 0)]);
        assert_eq!(model.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(model.find_api(Fingerprint::of_api("T:N.T")), Some(1));
    }

    #[test]
    fn valid_model_has_no_violations() {
        assert!(model().validate().is_empty());
    }

    #[test]
    fn detects_broken_references() {
        let mut apis = model().apis().to_vec();
        apis[2].parent = Some(9);
        apis[1].children.clear();
        let broken = CatalogModel::new(vec![], vec![], vec![], apis);
        let violations = broken.validate();
        assert!(violations.contains(&Violation::ApiOutOfRange { from: 2, api: 9 }));
        assert!(violations.contains(&Violation::UnresolvedParentChain { api: 2 }));
    }

    #[test]
    fn detects_cycles() {
        let apis = vec![
            api("T:A", ApiKind::Class, Some(1), vec![1]),
            api("T:B", ApiKind::Class, Some(0), vec![0]),
        ];
        let violations = CatalogModel::new(vec![], vec![], vec![], apis).validate();
        assert!(violations.contains(&Violation::UnresolvedParentChain { api: 0 }));
        assert!(violations.contains(&Violation::UnresolvedParentChain { api: 1 }));
    }
}
