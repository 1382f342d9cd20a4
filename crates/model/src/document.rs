//! Per-unit index documents, as produced by the extraction front end.
//!
//! A document describes exactly one framework, or one package across every
//! framework it supports. Both shapes share the api and assembly records; only
//! the way assemblies are associated with their owner differs.

use crate::error::{ErrorKind, Result};
use crate::fingerprint::Fingerprint;
use crate::identity::AssemblyIdentity;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const ROOT_FIELD: &str = "root";
const FRAMEWORK_ROOT: &str = "framework";
const PACKAGE_ROOT: &str = "package";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "root", rename_all = "lowercase")]
pub enum IndexDocument {
    Framework(FrameworkDocument),
    Package(PackageDocument),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDocument {
    pub name: String,
    #[serde(default)]
    pub apis: Vec<ApiRecord>,
    #[serde(default)]
    pub assemblies: Vec<AssemblyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDocument {
    pub fingerprint: Fingerprint,
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub apis: Vec<ApiRecord>,
    /// Every assembly names the framework it was shipped for.
    #[serde(default)]
    pub assemblies: Vec<AssemblyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRecord {
    pub fingerprint: Fingerprint,
    /// [`ApiKind`](crate::ApiKind) ordinal; validated when merged.
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Fingerprint>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyRecord {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub public_key_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default)]
    pub declarations: Vec<DeclarationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationRecord {
    pub api_fingerprint: Fingerprint,
    pub markup_text: String,
}

impl IndexDocument {
    /// Parses a JSON document, rejecting missing or unrecognised root kinds
    /// before looking at the rest of the shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).or_raise(|| ErrorKind::MalformedDocument)?;
        match value.get(ROOT_FIELD).and_then(Value::as_str) {
            None => exn::bail!(ErrorKind::MissingRoot),
            Some(FRAMEWORK_ROOT | PACKAGE_ROOT) => {},
            Some(other) => exn::bail!(ErrorKind::UnknownRoot(other.to_string())),
        }
        serde_json::from_value(value).or_raise(|| ErrorKind::MalformedDocument)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).or_raise(|| ErrorKind::MalformedDocument)
    }

    pub fn apis(&self) -> &[ApiRecord] {
        match self {
            Self::Framework(document) => &document.apis,
            Self::Package(document) => &document.apis,
        }
    }

    pub fn assemblies(&self) -> &[AssemblyRecord] {
        match self {
            Self::Framework(document) => &document.assemblies,
            Self::Package(document) => &document.assemblies,
        }
    }

    /// Human-readable name of the indexed unit, for diagnostics.
    pub fn label(&self) -> String {
        match self {
            Self::Framework(document) => document.name.clone(),
            Self::Package(document) => format!("{} {}", document.id, document.version),
        }
    }
}

impl AssemblyRecord {
    pub fn identity(&self) -> AssemblyIdentity {
        AssemblyIdentity::new(&self.name, &self.version, &self.public_key_token)
    }

    /// Recomputes this assembly's fingerprint from its identity and the
    /// markup of every api it declares.
    ///
    /// Declared apis are visited depth-first, starting at the ones whose parent
    /// is not declared here, with siblings in the order of `apis`.
    pub fn compute_fingerprint(&self, apis: &[ApiRecord]) -> Fingerprint {
        let markup: HashMap<Fingerprint, &str> = self
            .declarations
            .iter()
            .map(|declaration| (declaration.api_fingerprint, declaration.markup_text.as_str()))
            .collect();
        let declared: Vec<&ApiRecord> = apis.iter().filter(|api| markup.contains_key(&api.fingerprint)).collect();
        let known: HashSet<Fingerprint> = declared.iter().map(|api| api.fingerprint).collect();

        let mut children: HashMap<Fingerprint, Vec<Fingerprint>> = HashMap::new();
        let mut roots = Vec::new();
        for api in &declared {
            match api.parent.filter(|parent| known.contains(parent)) {
                Some(parent) => children.entry(parent).or_default().push(api.fingerprint),
                None => roots.push(api.fingerprint),
            }
        }

        let mut syntax = Vec::with_capacity(declared.len());
        let mut visited = HashSet::new();
        let mut stack: Vec<Fingerprint> = roots.into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(text) = markup.get(&current) {
                syntax.push(*text);
            }
            if let Some(below) = children.get(&current) {
                stack.extend(below.iter().rev());
            }
        }
        Fingerprint::of_assembly(&self.identity(), syntax)
    }
}
