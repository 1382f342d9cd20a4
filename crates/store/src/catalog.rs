//! Loaded, read-only catalog.
//!
//! Identity tables and the api tree are decoded eagerly. Declaration markup
//! stays encoded in the body and is decoded on demand, one declaration at a
//! time.

use crate::error::{ErrorKind, Result};
use crate::format::{Decoder, HEADER_LEN, Header, NO_PARENT};
use crate::ids::{ApiId, AssemblyId, DeclarationId, FrameworkId, PackageId};
use crate::views::{Api, Assembly, Declaration, DepthFirst, Framework, Package};
use apicat_compress::Compression;
use apicat_model::{
    ApiEntry, ApiKind, AssemblyEntry, AssemblyIdentity, CatalogModel, FrameworkEntry, Markup, MarkupToken,
    PackageAssembly, PackageEntry, TokenKind,
};
use apicat_model::{Declaration as ModelDeclaration, Fingerprint};
use exn::{OptionExt, ResultExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, instrument};

/// Smallest possible table entry: a single u32.
const MIN_ENTITY_SIZE: usize = 4;
const MIN_TOKEN_SIZE: usize = 6;

#[derive(Debug)]
pub(crate) struct FrameworkRow {
    pub name: u32,
    pub assemblies: Vec<AssemblyId>,
}

#[derive(Debug)]
pub(crate) struct PackageRow {
    pub fingerprint: Fingerprint,
    pub id: u32,
    pub version: u32,
    pub assemblies: Vec<(FrameworkId, AssemblyId)>,
}

#[derive(Debug)]
pub(crate) struct AssemblyRow {
    pub fingerprint: Fingerprint,
    pub name: u32,
    pub version: u32,
    pub public_key_token: u32,
    pub roots: Vec<ApiId>,
    /// `(api, markup)`, ordered by api.
    pub declarations: Vec<(ApiId, u32)>,
}

#[derive(Debug)]
pub(crate) struct ApiRow {
    pub fingerprint: Fingerprint,
    pub kind: ApiKind,
    pub parent: Option<ApiId>,
    pub name: u32,
    pub children: Vec<ApiId>,
}

/// Entity counts and heap sizes of a loaded catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub frameworks: usize,
    pub packages: usize,
    pub assemblies: usize,
    pub apis: usize,
    pub declarations: usize,
    pub strings: usize,
    pub markups: usize,
    pub body_size: usize,
}

/// A loaded catalog artifact.
///
/// Immutable and `Sync`: any number of threads may query it concurrently.
#[derive(Debug)]
pub struct Catalog {
    compression: Compression,
    body: Vec<u8>,
    strings: Vec<String>,
    markups: Vec<Range<usize>>,
    pub(crate) frameworks: Vec<FrameworkRow>,
    pub(crate) packages: Vec<PackageRow>,
    pub(crate) assemblies: Vec<AssemblyRow>,
    pub(crate) apis: Vec<ApiRow>,
    pub(crate) api_declarations: Vec<Vec<DeclarationId>>,
    pub(crate) assembly_frameworks: Vec<Vec<FrameworkId>>,
    pub(crate) assembly_packages: Vec<Vec<(PackageId, FrameworkId)>>,
    api_lookup: HashMap<Fingerprint, ApiId>,
    assembly_lookup: HashMap<Fingerprint, AssemblyId>,
    framework_lookup: HashMap<String, FrameworkId>,
    package_lookup: HashMap<Fingerprint, PackageId>,
}

impl Catalog {
    /// Loads a catalog artifact from disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).or_raise(|| ErrorKind::Io)?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a catalog artifact.
    ///
    /// Fails with a format error on foreign input, an unknown format version,
    /// truncation, a checksum mismatch or any out-of-range reference.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Header::decode(bytes)?;
        let compressed = bytes.get(HEADER_LEN..).ok_or_raise(|| ErrorKind::Truncated)?;
        // One byte past the declared length is enough to tell an oversized body.
        let body = header
            .compression
            .decompress_limited(compressed, header.body_len.saturating_add(1))
            .or_raise(|| ErrorKind::Compression)?;
        match (body.len() as u64).cmp(&header.body_len) {
            Ordering::Less => exn::bail!(ErrorKind::Truncated),
            Ordering::Greater => exn::bail!(ErrorKind::InvalidData("body length")),
            Ordering::Equal => {},
        }
        if crc32fast::hash(&body) != header.checksum {
            exn::bail!(ErrorKind::Corrupt);
        }
        let catalog = Self::decode_body(header, body)?;
        debug!(
            frameworks = catalog.frameworks.len(),
            packages = catalog.packages.len(),
            assemblies = catalog.assemblies.len(),
            apis = catalog.apis.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    fn decode_body(header: Header, body: Vec<u8>) -> Result<Self> {
        let mut input = Decoder::new(&body);

        let string_count = input.len(MIN_ENTITY_SIZE)?;
        let mut strings = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            let len = input.len(1)?;
            let raw = input.take(len)?;
            let value = std::str::from_utf8(raw).or_raise(|| ErrorKind::InvalidData("string encoding"))?;
            strings.push(value.to_string());
        }
        let string_bound = strings.len();

        let markup_count = input.len(MIN_ENTITY_SIZE)?;
        let mut markups = Vec::with_capacity(markup_count);
        for _ in 0..markup_count {
            let len = input.len(1)?;
            let start = input.position();
            input.take(len)?;
            markups.push(start..start + len);
        }
        let markup_bound = markups.len();

        let framework_count = input.len(MIN_ENTITY_SIZE)?;
        let assembly_bound = usize::try_from(header.counts.assemblies).or_raise(|| ErrorKind::TooLarge("assemblies"))?;
        let api_bound = usize::try_from(header.counts.apis).or_raise(|| ErrorKind::TooLarge("apis"))?;

        let mut frameworks = Vec::with_capacity(framework_count);
        for _ in 0..framework_count {
            let name = input.index(string_bound, "framework name")?;
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut assemblies = Vec::with_capacity(count);
            for _ in 0..count {
                assemblies.push(AssemblyId(input.index(assembly_bound, "framework assembly")?));
            }
            frameworks.push(FrameworkRow { name, assemblies });
        }
        let framework_bound = frameworks.len();

        let package_count = input.len(MIN_ENTITY_SIZE)?;
        let mut packages = Vec::with_capacity(package_count);
        for _ in 0..package_count {
            let fingerprint = input.fingerprint()?;
            let id = input.index(string_bound, "package id")?;
            let version = input.index(string_bound, "package version")?;
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut assemblies = Vec::with_capacity(count);
            for _ in 0..count {
                let framework = FrameworkId(input.index(framework_bound, "package framework")?);
                let assembly = AssemblyId(input.index(assembly_bound, "package assembly")?);
                assemblies.push((framework, assembly));
            }
            packages.push(PackageRow { fingerprint, id, version, assemblies });
        }

        let assembly_count = input.len(MIN_ENTITY_SIZE)?;
        if assembly_count != assembly_bound {
            exn::bail!(ErrorKind::InvalidData("assembly count"));
        }
        let mut assemblies = Vec::with_capacity(assembly_count);
        for _ in 0..assembly_count {
            let fingerprint = input.fingerprint()?;
            let name = input.index(string_bound, "assembly name")?;
            let version = input.index(string_bound, "assembly version")?;
            let public_key_token = input.index(string_bound, "assembly public key token")?;
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut roots = Vec::with_capacity(count);
            for _ in 0..count {
                roots.push(ApiId(input.index(api_bound, "assembly root")?));
            }
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut declarations = Vec::with_capacity(count);
            for _ in 0..count {
                let api = ApiId(input.index(api_bound, "declaration api")?);
                let markup = input.index(markup_bound, "declaration markup")?;
                declarations.push((api, markup));
            }
            assemblies.push(AssemblyRow { fingerprint, name, version, public_key_token, roots, declarations });
        }

        let api_count = input.len(MIN_ENTITY_SIZE)?;
        if api_count != api_bound {
            exn::bail!(ErrorKind::InvalidData("api count"));
        }
        let mut apis = Vec::with_capacity(api_count);
        for _ in 0..api_count {
            let fingerprint = input.fingerprint()?;
            let kind = ApiKind::from_ordinal(input.u8()?).ok_or_raise(|| ErrorKind::InvalidData("api kind"))?;
            let parent = match input.u32()? {
                NO_PARENT => None,
                parent if usize::try_from(parent).is_ok_and(|parent| parent < api_bound) => Some(ApiId(parent)),
                _ => exn::bail!(ErrorKind::InvalidData("api parent")),
            };
            let name = input.index(string_bound, "api name")?;
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut children = Vec::with_capacity(count);
            for _ in 0..count {
                children.push(ApiId(input.index(api_bound, "api child")?));
            }
            apis.push(ApiRow { fingerprint, kind, parent, name, children });
        }
        check_api_tree(&apis)?;

        let mut api_declarations = Vec::with_capacity(api_count);
        for _ in 0..api_count {
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut declarations = Vec::with_capacity(count);
            for _ in 0..count {
                let assembly = input.index(assembly_bound, "indexed assembly")?;
                let slot = input.u32()?;
                let in_range = assemblies
                    .get(assembly as usize)
                    .is_some_and(|row| usize::try_from(slot).is_ok_and(|slot| slot < row.declarations.len()));
                if !in_range {
                    exn::bail!(ErrorKind::InvalidData("indexed declaration"));
                }
                declarations.push(DeclarationId { assembly: AssemblyId(assembly), slot });
            }
            api_declarations.push(declarations);
        }
        let mut assembly_frameworks = Vec::with_capacity(assembly_count);
        for _ in 0..assembly_count {
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut owners = Vec::with_capacity(count);
            for _ in 0..count {
                owners.push(FrameworkId(input.index(framework_bound, "indexed framework")?));
            }
            assembly_frameworks.push(owners);
        }
        let mut assembly_packages = Vec::with_capacity(assembly_count);
        for _ in 0..assembly_count {
            let count = input.len(MIN_ENTITY_SIZE)?;
            let mut owners = Vec::with_capacity(count);
            for _ in 0..count {
                let package = PackageId(input.index(packages.len(), "indexed package")?);
                let framework = FrameworkId(input.index(framework_bound, "indexed framework")?);
                owners.push((package, framework));
            }
            assembly_packages.push(owners);
        }
        if !input.is_empty() {
            exn::bail!(ErrorKind::InvalidData("trailing bytes"));
        }
        if frameworks.len() as u64 != u64::from(header.counts.frameworks)
            || packages.len() as u64 != u64::from(header.counts.packages)
        {
            exn::bail!(ErrorKind::InvalidData("entity counts"));
        }

        let api_lookup = apis.iter().enumerate().map(|(id, row)| (row.fingerprint, ApiId(id as u32))).collect();
        let assembly_lookup =
            assemblies.iter().enumerate().map(|(id, row)| (row.fingerprint, AssemblyId(id as u32))).collect();
        let framework_lookup = frameworks
            .iter()
            .enumerate()
            .map(|(id, row)| (strings[row.name as usize].clone(), FrameworkId(id as u32)))
            .collect();
        let package_lookup =
            packages.iter().enumerate().map(|(id, row)| (row.fingerprint, PackageId(id as u32))).collect();

        Ok(Self {
            compression: header.compression,
            body,
            strings,
            markups,
            frameworks,
            packages,
            assemblies,
            apis,
            api_declarations,
            assembly_frameworks,
            assembly_packages,
            api_lookup,
            assembly_lookup,
            framework_lookup,
            package_lookup,
        })
    }

    // =========================================================================
    // Heaps
    // =========================================================================

    pub(crate) fn string(&self, index: u32) -> &str {
        self.strings.get(index as usize).map(String::as_str).unwrap_or_default()
    }

    /// Decodes one markup entry of the body.
    pub(crate) fn markup(&self, index: u32) -> Result<Markup> {
        let range = self.markups.get(index as usize).ok_or_raise(|| ErrorKind::InvalidData("markup index"))?;
        let mut input = Decoder::new(&self.body[range.clone()]);
        let count = input.len(MIN_TOKEN_SIZE)?;
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = TokenKind::from_ordinal(input.u8()?).ok_or_raise(|| ErrorKind::InvalidData("token kind"))?;
            let text = self.string(input.index(self.strings.len(), "token text")?).to_string();
            let token = match input.u8()? {
                0 => MarkupToken { kind, text, reference: None },
                1 => MarkupToken { kind, text, reference: Some(input.fingerprint()?) },
                _ => exn::bail!(ErrorKind::InvalidData("token reference")),
            };
            tokens.push(token);
        }
        Ok(Markup::new(tokens))
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn api(&self, id: ApiId) -> Api<'_> {
        Api::new(self, id)
    }

    pub fn assembly(&self, id: AssemblyId) -> Assembly<'_> {
        Assembly::new(self, id)
    }

    pub fn declaration(&self, id: DeclarationId) -> Declaration<'_> {
        Declaration::new(self, id)
    }

    pub fn apis(&self) -> impl ExactSizeIterator<Item = Api<'_>> + '_ {
        (0..self.apis.len() as u32).map(|id| Api::new(self, ApiId(id)))
    }

    pub fn assemblies(&self) -> impl ExactSizeIterator<Item = Assembly<'_>> + '_ {
        (0..self.assemblies.len() as u32).map(|id| Assembly::new(self, AssemblyId(id)))
    }

    pub fn frameworks(&self) -> impl ExactSizeIterator<Item = Framework<'_>> + '_ {
        (0..self.frameworks.len() as u32).map(|id| Framework::new(self, FrameworkId(id)))
    }

    pub fn packages(&self) -> impl ExactSizeIterator<Item = Package<'_>> + '_ {
        (0..self.packages.len() as u32).map(|id| Package::new(self, PackageId(id)))
    }

    /// Apis without a parent.
    pub fn roots(&self) -> impl Iterator<Item = Api<'_>> + '_ {
        self.apis().filter(|api| api.parent().is_none())
    }

    /// Every api, parents before children, siblings in discovery order.
    pub fn apis_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst::new(self, self.roots().map(|api| api.id()).collect())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn api_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<Api<'_>> {
        self.api_lookup.get(&fingerprint).map(|&id| Api::new(self, id))
    }

    pub fn assembly_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<Assembly<'_>> {
        self.assembly_lookup.get(&fingerprint).map(|&id| Assembly::new(self, id))
    }

    pub fn framework(&self, name: &str) -> Option<Framework<'_>> {
        self.framework_lookup.get(name).map(|&id| Framework::new(self, id))
    }

    pub fn package(&self, id: &str, version: &str) -> Option<Package<'_>> {
        self.package_by_fingerprint(Fingerprint::of_package(id, version))
            .filter(|package| package.id() == id && package.version() == version)
            .or_else(|| self.packages().find(|package| package.id() == id && package.version() == version))
    }

    pub fn package_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<Package<'_>> {
        self.package_lookup.get(&fingerprint).map(|&id| Package::new(self, id))
    }

    /// Apis whose name contains `term`, ignoring case, in id order.
    pub fn search(&self, term: &str) -> Vec<Api<'_>> {
        let term = term.to_lowercase();
        self.apis().filter(|api| api.name().to_lowercase().contains(&term)).collect()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            frameworks: self.frameworks.len(),
            packages: self.packages.len(),
            assemblies: self.assemblies.len(),
            apis: self.apis.len(),
            declarations: self.assemblies.iter().map(|row| row.declarations.len()).sum(),
            strings: self.strings.len(),
            markups: self.markups.len(),
            body_size: self.body.len(),
        }
    }

    /// Rebuilds the full entity graph, decoding every declaration.
    pub fn to_model(&self) -> Result<CatalogModel> {
        let frameworks = self
            .frameworks
            .iter()
            .map(|row| FrameworkEntry {
                name: self.string(row.name).to_string(),
                assemblies: row.assemblies.iter().map(|id| id.index()).collect(),
            })
            .collect();
        let packages = self
            .packages
            .iter()
            .map(|row| PackageEntry {
                fingerprint: row.fingerprint,
                id: self.string(row.id).to_string(),
                version: self.string(row.version).to_string(),
                assemblies: row
                    .assemblies
                    .iter()
                    .map(|(framework, assembly)| PackageAssembly {
                        framework: framework.index(),
                        assembly: assembly.index(),
                    })
                    .collect(),
            })
            .collect();
        let mut assemblies = Vec::with_capacity(self.assemblies.len());
        for row in &self.assemblies {
            let mut declarations = Vec::with_capacity(row.declarations.len());
            for &(api, markup) in &row.declarations {
                declarations.push(ModelDeclaration { api: api.index(), markup: self.markup(markup)? });
            }
            assemblies.push(AssemblyEntry {
                fingerprint: row.fingerprint,
                identity: AssemblyIdentity::new(
                    self.string(row.name),
                    self.string(row.version),
                    self.string(row.public_key_token),
                ),
                roots: row.roots.iter().map(|id| id.index()).collect(),
                declarations,
            });
        }
        let apis = self
            .apis
            .iter()
            .map(|row| ApiEntry {
                fingerprint: row.fingerprint,
                kind: row.kind,
                parent: row.parent.map(|id| id.index()),
                name: self.string(row.name).to_string(),
                children: row.children.iter().map(|id| id.index()).collect(),
            })
            .collect();
        Ok(CatalogModel::new(frameworks, packages, assemblies, apis))
    }
}

/// Every listed child must name its lister as parent and every parent chain
/// must end at a root, so tree walks terminate.
fn check_api_tree(apis: &[ApiRow]) -> Result<()> {
    for (id, row) in apis.iter().enumerate() {
        for child in &row.children {
            if apis[child.index()].parent.map(ApiId::index) != Some(id) {
                exn::bail!(ErrorKind::InvalidData("api tree"));
            }
        }
    }
    let mut resolved = vec![false; apis.len()];
    for start in 0..apis.len() {
        let mut path = Vec::new();
        let mut current = start;
        while !resolved[current] {
            if path.len() == apis.len() {
                exn::bail!(ErrorKind::InvalidData("api tree"));
            }
            path.push(current);
            match apis[current].parent {
                Some(parent) => current = parent.index(),
                None => break,
            }
        }
        for id in path {
            resolved[id] = true;
        }
    }
    Ok(())
}
