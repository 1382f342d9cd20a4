use apicat_model::{CatalogModel, Fingerprint};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// The outcome of [`CatalogBuilder::commit`](crate::CatalogBuilder::commit).
#[derive(Debug, Clone)]
pub struct Build {
    pub model: CatalogModel,
    pub report: BuildReport,
}

/// A document that could not be merged at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDocument {
    pub path: PathBuf,
    pub message: String,
}

/// A referential-integrity problem. The offending record was skipped and the
/// build carried on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    InvalidKind { api: Fingerprint, ordinal: u8 },
    UnresolvedParent { api: Fingerprint, parent: Fingerprint },
    ParentCycle { api: Fingerprint },
    UndefinedApi { assembly: Fingerprint, api: Fingerprint },
    UndefinedAssembly { owner: String, assembly: Fingerprint },
    UndefinedPackage { package: Fingerprint },
    MissingFramework { package: Fingerprint, assembly: Fingerprint },
    InvalidMarkup { assembly: Fingerprint, api: Fingerprint, message: String },
    Conflict { entity: &'static str, key: String },
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::InvalidKind { api, ordinal } => write!(f, "api {api} has unknown kind {ordinal}"),
            Self::UnresolvedParent { api, parent } => write!(f, "api {api} has undefined parent {parent}"),
            Self::ParentCycle { api } => write!(f, "api {api} is its own ancestor"),
            Self::UndefinedApi { assembly, api } => write!(f, "assembly {assembly} declares undefined api {api}"),
            Self::UndefinedAssembly { owner, assembly } => write!(f, "{owner} references undefined assembly {assembly}"),
            Self::UndefinedPackage { package } => write!(f, "undefined package {package}"),
            Self::MissingFramework { package, assembly } => {
                write!(f, "package {package} ships assembly {assembly} without naming a framework")
            },
            Self::InvalidMarkup { assembly, api, message } => {
                write!(f, "declaration of {api} in {assembly} has invalid markup: {message}")
            },
            Self::Conflict { entity, key } => write!(f, "conflicting redefinition of {entity} {key}"),
        }
    }
}

/// Completeness report of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents successfully merged.
    pub documents: usize,
    pub failed: Vec<FailedDocument>,
    pub issues: Vec<Issue>,
    /// Redefinitions that matched the existing entity.
    pub duplicates: usize,
    /// Redefinitions that disagreed with the existing entity; the first
    /// definition wins.
    pub conflicts: usize,
    /// Apis left out because they or one of their ancestors were invalid.
    pub dropped_apis: usize,
    pub skipped_declarations: usize,
}

impl BuildReport {
    /// `false` when at least one document could not be merged.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.issues.is_empty()
    }
}

impl Display for BuildReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} documents merged, {} failed, {} issues ({} apis dropped, {} declarations skipped)",
            self.documents,
            self.failed.len(),
            self.issues.len(),
            self.dropped_apis,
            self.skipped_declarations
        )
    }
}
