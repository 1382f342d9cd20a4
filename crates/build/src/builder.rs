//! Two-phase merge of index documents.
//!
//! Phase one registers every identity (apis, assemblies, frameworks and
//! packages) and queues declarations and ownership links as plain
//! fingerprints. Phase two, [`CatalogBuilder::commit`], runs once every
//! identity is known, so documents may arrive in any order.

use crate::report::{Build, BuildReport, FailedDocument, Issue};
use apicat_model::{
    ApiEntry, ApiKind, ApiRecord, AssemblyEntry, AssemblyIdentity, AssemblyRecord, CatalogModel, Declaration,
    Fingerprint, FrameworkEntry, IndexDocument, Markup, PackageAssembly, PackageEntry,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingApi {
    fingerprint: Fingerprint,
    kind: u8,
    parent: Option<Fingerprint>,
    name: String,
}

#[derive(Debug, Clone)]
struct PendingPackage {
    fingerprint: Fingerprint,
    id: String,
    version: String,
}

#[derive(Debug)]
struct PendingDeclaration {
    assembly: Fingerprint,
    api: Fingerprint,
    markup: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Unknown,
    Visiting,
    Kept,
    Dropped,
}

/// Accumulates identities from any number of documents.
///
/// Every `define_*` method is idempotent: redefining an entity with the same
/// key is a no-op and returns `false`.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    apis: Vec<PendingApi>,
    api_ids: HashMap<Fingerprint, usize>,
    assemblies: Vec<(Fingerprint, AssemblyIdentity)>,
    assembly_ids: HashMap<Fingerprint, usize>,
    frameworks: Vec<String>,
    framework_ids: HashMap<String, usize>,
    /// Registered by a package but not yet by a framework document.
    implicit_frameworks: HashSet<String>,
    packages: Vec<PendingPackage>,
    package_ids: HashMap<Fingerprint, usize>,
    declarations: Vec<PendingDeclaration>,
    declaration_keys: HashSet<(Fingerprint, Fingerprint)>,
    framework_assemblies: Vec<(String, Fingerprint)>,
    framework_assembly_keys: HashSet<(String, Fingerprint)>,
    package_assemblies: Vec<(Fingerprint, String, Fingerprint)>,
    package_assembly_keys: HashSet<(Fingerprint, String, Fingerprint)>,
    report: BuildReport,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    // =========================================================================
    // Identities
    // =========================================================================

    pub fn define_framework(&mut self, name: &str) -> bool {
        if self.implicit_frameworks.remove(name) {
            return true;
        }
        if self.framework_ids.contains_key(name) {
            self.report.duplicates += 1;
            return false;
        }
        self.framework_ids.insert(name.to_string(), self.frameworks.len());
        self.frameworks.push(name.to_string());
        true
    }

    pub fn define_package(&mut self, fingerprint: Fingerprint, id: &str, version: &str) -> bool {
        if let Some(&existing) = self.package_ids.get(&fingerprint) {
            let existing = &self.packages[existing];
            if existing.id != id || existing.version != version {
                self.conflict("package", fingerprint.to_string());
            } else {
                self.report.duplicates += 1;
            }
            return false;
        }
        self.package_ids.insert(fingerprint, self.packages.len());
        self.packages.push(PendingPackage { fingerprint, id: id.to_string(), version: version.to_string() });
        true
    }

    pub fn define_assembly(&mut self, fingerprint: Fingerprint, name: &str, version: &str, public_key_token: &str) -> bool {
        let identity = AssemblyIdentity::new(name, version, public_key_token);
        if let Some(&existing) = self.assembly_ids.get(&fingerprint) {
            if self.assemblies[existing].1 != identity {
                self.conflict("assembly", fingerprint.to_string());
            } else {
                self.report.duplicates += 1;
            }
            return false;
        }
        self.assembly_ids.insert(fingerprint, self.assemblies.len());
        self.assemblies.push((fingerprint, identity));
        true
    }

    pub fn define_api(&mut self, fingerprint: Fingerprint, kind: u8, parent: Option<Fingerprint>, name: &str) -> bool {
        let api = PendingApi { fingerprint, kind, parent, name: name.to_string() };
        if let Some(&existing) = self.api_ids.get(&fingerprint) {
            let existing = &self.apis[existing];
            // Display names may legitimately differ between producers.
            if existing.kind != api.kind || existing.parent != api.parent {
                self.conflict("api", fingerprint.to_string());
            } else {
                self.report.duplicates += 1;
            }
            return false;
        }
        self.api_ids.insert(fingerprint, self.apis.len());
        self.apis.push(api);
        true
    }

    // =========================================================================
    // Associations (resolved at commit)
    // =========================================================================

    pub fn define_declaration(&mut self, assembly: Fingerprint, api: Fingerprint, markup: &str) -> bool {
        if !self.declaration_keys.insert((assembly, api)) {
            self.report.duplicates += 1;
            return false;
        }
        self.declarations.push(PendingDeclaration { assembly, api, markup: markup.to_string() });
        true
    }

    pub fn define_framework_assembly(&mut self, framework: &str, assembly: Fingerprint) -> bool {
        if !self.framework_assembly_keys.insert((framework.to_string(), assembly)) {
            return false;
        }
        self.framework_assemblies.push((framework.to_string(), assembly));
        true
    }

    /// Frameworks only ever seen through packages are registered implicitly.
    pub fn define_package_assembly(&mut self, package: Fingerprint, framework: &str, assembly: Fingerprint) -> bool {
        if !self.framework_ids.contains_key(framework) {
            self.framework_ids.insert(framework.to_string(), self.frameworks.len());
            self.frameworks.push(framework.to_string());
            self.implicit_frameworks.insert(framework.to_string());
        }
        if !self.package_assembly_keys.insert((package, framework.to_string(), assembly)) {
            return false;
        }
        self.package_assemblies.push((package, framework.to_string(), assembly));
        true
    }

    // =========================================================================
    // Documents
    // =========================================================================

    #[instrument(skip_all, fields(unit = %document.label(), apis = document.apis().len()))]
    pub fn ingest(&mut self, document: &IndexDocument) {
        match document {
            IndexDocument::Framework(framework) => {
                self.define_framework(&framework.name);
                self.apply(&framework.apis, &framework.assemblies, |builder, assembly| {
                    builder.define_framework_assembly(&framework.name, assembly.fingerprint);
                });
            },
            IndexDocument::Package(package) => {
                self.define_package(package.fingerprint, &package.id, &package.version);
                self.apply(&package.apis, &package.assemblies, |builder, assembly| match &assembly.framework {
                    Some(framework) => {
                        builder.define_package_assembly(package.fingerprint, framework, assembly.fingerprint);
                    },
                    None => builder.issue(Issue::MissingFramework {
                        package: package.fingerprint,
                        assembly: assembly.fingerprint,
                    }),
                });
            },
        }
        self.report.documents += 1;
    }

    /// Shared by both document shapes; only the ownership link differs.
    fn apply<F>(&mut self, apis: &[ApiRecord], assemblies: &[AssemblyRecord], mut associate: F)
    where
        F: FnMut(&mut Self, &AssemblyRecord),
    {
        for api in apis {
            self.define_api(api.fingerprint, api.kind, api.parent, &api.name);
        }
        for assembly in assemblies {
            self.define_assembly(assembly.fingerprint, &assembly.name, &assembly.version, &assembly.public_key_token);
            associate(self, assembly);
            for declaration in &assembly.declarations {
                self.define_declaration(assembly.fingerprint, declaration.api_fingerprint, &declaration.markup_text);
            }
        }
    }

    pub fn record_failure(&mut self, failure: FailedDocument) {
        warn!(path = %failure.path.display(), message = %failure.message, "index document rejected");
        self.report.failed.push(failure);
    }

    fn issue(&mut self, issue: Issue) {
        warn!(%issue, "skipping record");
        self.report.issues.push(issue);
    }

    fn conflict(&mut self, entity: &'static str, key: String) {
        self.report.conflicts += 1;
        self.issue(Issue::Conflict { entity, key });
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Resolves every queued association and produces the immutable catalog.
    #[instrument(skip_all, fields(apis = self.apis.len(), assemblies = self.assemblies.len()))]
    pub fn commit(mut self) -> Build {
        let kept = self.resolve_apis();

        // Compact api ids, in definition order.
        let mut api_map: Vec<Option<usize>> = vec![None; self.apis.len()];
        let mut apis: Vec<ApiEntry> = Vec::new();
        for (index, pending) in self.apis.iter().enumerate() {
            if !kept[index] {
                continue;
            }
            let Some(kind) = ApiKind::from_ordinal(pending.kind) else {
                continue;
            };
            api_map[index] = Some(apis.len());
            apis.push(ApiEntry {
                fingerprint: pending.fingerprint,
                kind,
                parent: None,
                name: pending.name.clone(),
                children: Vec::new(),
            });
        }
        for (index, pending) in self.apis.iter().enumerate() {
            let Some(id) = api_map[index] else {
                continue;
            };
            let parent = pending
                .parent
                .and_then(|parent| self.api_ids.get(&parent))
                .and_then(|&parent| api_map[parent]);
            if let Some(parent) = parent {
                apis[id].parent = Some(parent);
                apis[parent].children.push(id);
            }
        }

        let mut assemblies: Vec<AssemblyEntry> = self
            .assemblies
            .iter()
            .map(|(fingerprint, identity)| AssemblyEntry {
                fingerprint: *fingerprint,
                identity: identity.clone(),
                roots: Vec::new(),
                declarations: Vec::new(),
            })
            .collect();
        for declaration in std::mem::take(&mut self.declarations) {
            let Some(&assembly) = self.assembly_ids.get(&declaration.assembly) else {
                self.skip_declaration(Issue::UndefinedAssembly {
                    owner: format!("declaration of {}", declaration.api),
                    assembly: declaration.assembly,
                });
                continue;
            };
            let Some(api) = self.api_ids.get(&declaration.api).and_then(|&api| api_map[api]) else {
                self.skip_declaration(Issue::UndefinedApi { assembly: declaration.assembly, api: declaration.api });
                continue;
            };
            match Markup::parse(&declaration.markup) {
                Ok(markup) => assemblies[assembly].declarations.push(Declaration { api, markup }),
                Err(err) => self.skip_declaration(Issue::InvalidMarkup {
                    assembly: declaration.assembly,
                    api: declaration.api,
                    message: (*err).to_string(),
                }),
            }
        }
        for assembly in &mut assemblies {
            assembly.declarations.sort_by_key(|declaration| declaration.api);
            assembly.roots = assembly
                .declarations
                .iter()
                .map(|declaration| declaration.api)
                .filter(|&api| apis[api].parent.is_none())
                .collect();
        }

        let mut frameworks: Vec<FrameworkEntry> = self
            .frameworks
            .iter()
            .map(|name| FrameworkEntry { name: name.clone(), assemblies: Vec::new() })
            .collect();
        for (framework, assembly) in std::mem::take(&mut self.framework_assemblies) {
            let (Some(&framework_id), Some(&assembly_id)) =
                (self.framework_ids.get(&framework), self.assembly_ids.get(&assembly))
            else {
                self.issue(Issue::UndefinedAssembly { owner: framework, assembly });
                continue;
            };
            frameworks[framework_id].assemblies.push(assembly_id);
        }
        for framework in &mut frameworks {
            framework.assemblies.sort_unstable();
        }

        let mut packages: Vec<PackageEntry> = self
            .packages
            .iter()
            .map(|package| PackageEntry {
                fingerprint: package.fingerprint,
                id: package.id.clone(),
                version: package.version.clone(),
                assemblies: Vec::new(),
            })
            .collect();
        for (package, framework, assembly) in std::mem::take(&mut self.package_assemblies) {
            let Some(&package_id) = self.package_ids.get(&package) else {
                self.issue(Issue::UndefinedPackage { package });
                continue;
            };
            let (Some(&framework_id), Some(&assembly_id)) =
                (self.framework_ids.get(&framework), self.assembly_ids.get(&assembly))
            else {
                self.issue(Issue::UndefinedAssembly { owner: package.to_string(), assembly });
                continue;
            };
            packages[package_id].assemblies.push(PackageAssembly { framework: framework_id, assembly: assembly_id });
        }
        for package in &mut packages {
            package.assemblies.sort_unstable();
        }

        let model = CatalogModel::new(frameworks, packages, assemblies, apis);
        debug!(
            frameworks = model.frameworks().len(),
            packages = model.packages().len(),
            assemblies = model.assemblies().len(),
            apis = model.apis().len(),
            "catalog committed"
        );
        Build { model, report: self.report }
    }

    fn skip_declaration(&mut self, issue: Issue) {
        self.report.skipped_declarations += 1;
        self.issue(issue);
    }

    /// Decides which apis survive: an api is kept when its kind is valid and
    /// its parent chain reaches a root through kept apis.
    ///
    /// A parent equal to [`Fingerprint::EMPTY`] that was never defined is the
    /// global namespace and makes the api a root.
    fn resolve_apis(&mut self) -> Vec<bool> {
        let mut state = vec![Resolution::Unknown; self.apis.len()];
        let mut issues = Vec::new();
        for start in 0..self.apis.len() {
            let mut path = Vec::new();
            let mut current = start;
            let kept = loop {
                match state[current] {
                    Resolution::Kept => break true,
                    Resolution::Dropped => break false,
                    Resolution::Visiting => {
                        issues.push(Issue::ParentCycle { api: self.apis[current].fingerprint });
                        break false;
                    },
                    Resolution::Unknown => {},
                }
                state[current] = Resolution::Visiting;
                path.push(current);
                let api = &self.apis[current];
                if ApiKind::from_ordinal(api.kind).is_none() {
                    issues.push(Issue::InvalidKind { api: api.fingerprint, ordinal: api.kind });
                    break false;
                }
                match api.parent {
                    None => break true,
                    Some(parent) => match self.api_ids.get(&parent) {
                        Some(&parent) => current = parent,
                        None if parent.is_empty() => break true,
                        None => {
                            issues.push(Issue::UnresolvedParent { api: api.fingerprint, parent });
                            break false;
                        },
                    },
                }
            };
            let resolution = if kept { Resolution::Kept } else { Resolution::Dropped };
            for index in path {
                state[index] = resolution;
            }
        }
        for issue in issues {
            self.issue(issue);
        }
        let kept: Vec<bool> = state.into_iter().map(|resolution| resolution == Resolution::Kept).collect();
        self.report.dropped_apis = kept.iter().filter(|&&kept| !kept).count();
        kept
    }
}
