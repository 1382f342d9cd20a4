//! Single-pass writer of the catalog artifact.

use crate::error::{ErrorKind, Result};
use crate::format::{Counts, Encoder, FORMAT_VERSION, Header, NO_PARENT, to_index};
use apicat_compress::Compression;
use apicat_model::{CatalogModel, Markup};
use exn::ResultExt;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument, warn};

const PARTIAL_EXTENSION: &str = "partial";

/// Interns every string of the model, in first-use order.
#[derive(Default)]
struct StringHeap<'a> {
    lookup: HashMap<&'a str, u32>,
    strings: Vec<&'a str>,
}

impl<'a> StringHeap<'a> {
    fn intern(&mut self, value: &'a str) -> Result<u32> {
        if let Some(&index) = self.lookup.get(value) {
            return Ok(index);
        }
        let index = to_index(self.strings.len(), "strings")?;
        self.lookup.insert(value, index);
        self.strings.push(value);
        Ok(index)
    }

    fn encode(&self, out: &mut Encoder) -> Result<()> {
        out.index(self.strings.len(), "strings")?;
        for value in &self.strings {
            out.index(value.len(), "string length")?;
            out.bytes(value.as_bytes());
        }
        Ok(())
    }
}

/// Deduplicates markup: identical declarations across assemblies share one
/// entry, so equal markup always has an equal index.
#[derive(Default)]
struct MarkupHeap<'a> {
    lookup: HashMap<&'a Markup, u32>,
    encoded: Encoder,
    count: usize,
}

impl<'a> MarkupHeap<'a> {
    fn intern(&mut self, markup: &'a Markup, strings: &mut StringHeap<'a>) -> Result<u32> {
        if let Some(&index) = self.lookup.get(markup) {
            return Ok(index);
        }
        let index = to_index(self.count, "markups")?;
        let mut entry = Encoder::default();
        entry.index(markup.len(), "markup tokens")?;
        for token in markup.tokens() {
            entry.u8(token.kind.ordinal());
            entry.u32(strings.intern(&token.text)?);
            match token.reference {
                Some(target) => {
                    entry.u8(1);
                    entry.fingerprint(target);
                },
                None => entry.u8(0),
            }
        }
        self.encoded.index(entry.len(), "markup length")?;
        self.encoded.bytes(&entry.into_inner());
        self.lookup.insert(markup, index);
        self.count += 1;
        Ok(index)
    }
}

/// Serialises the uncompressed body.
fn encode_body(model: &CatalogModel) -> Result<Vec<u8>> {
    let mut strings = StringHeap::default();
    let mut markups = MarkupHeap::default();
    let mut tables = Encoder::default();

    tables.index(model.frameworks().len(), "frameworks")?;
    for framework in model.frameworks() {
        tables.u32(strings.intern(&framework.name)?);
        tables.index(framework.assemblies.len(), "framework assemblies")?;
        for &assembly in &framework.assemblies {
            tables.index(assembly, "assembly")?;
        }
    }

    tables.index(model.packages().len(), "packages")?;
    for package in model.packages() {
        tables.fingerprint(package.fingerprint);
        tables.u32(strings.intern(&package.id)?);
        tables.u32(strings.intern(&package.version)?);
        tables.index(package.assemblies.len(), "package assemblies")?;
        for pair in &package.assemblies {
            tables.index(pair.framework, "framework")?;
            tables.index(pair.assembly, "assembly")?;
        }
    }

    tables.index(model.assemblies().len(), "assemblies")?;
    for assembly in model.assemblies() {
        tables.fingerprint(assembly.fingerprint);
        tables.u32(strings.intern(&assembly.identity.name)?);
        tables.u32(strings.intern(&assembly.identity.version)?);
        tables.u32(strings.intern(&assembly.identity.public_key_token)?);
        tables.index(assembly.roots.len(), "roots")?;
        for &root in &assembly.roots {
            tables.index(root, "api")?;
        }
        tables.index(assembly.declarations.len(), "declarations")?;
        for declaration in &assembly.declarations {
            tables.index(declaration.api, "api")?;
            tables.u32(markups.intern(&declaration.markup, &mut strings)?);
        }
    }

    tables.index(model.apis().len(), "apis")?;
    for api in model.apis() {
        tables.fingerprint(api.fingerprint);
        tables.u8(api.kind.ordinal());
        match api.parent {
            Some(parent) => tables.index(parent, "api")?,
            None => tables.u32(NO_PARENT),
        }
        tables.u32(strings.intern(&api.name)?);
        tables.index(api.children.len(), "children")?;
        for &child in &api.children {
            tables.index(child, "api")?;
        }
    }

    let index = model.index();
    for declarations in &index.api_declarations {
        tables.index(declarations.len(), "api declarations")?;
        for &(assembly, slot) in declarations {
            tables.index(assembly, "assembly")?;
            tables.index(slot, "declaration")?;
        }
    }
    for frameworks in &index.assembly_frameworks {
        tables.index(frameworks.len(), "assembly frameworks")?;
        for &framework in frameworks {
            tables.index(framework, "framework")?;
        }
    }
    for packages in &index.assembly_packages {
        tables.index(packages.len(), "assembly packages")?;
        for &(package, framework) in packages {
            tables.index(package, "package")?;
            tables.index(framework, "framework")?;
        }
    }

    let mut body = Encoder::default();
    strings.encode(&mut body)?;
    body.index(markups.count, "markups")?;
    body.bytes(&markups.encoded.into_inner());
    body.bytes(&tables.into_inner());
    Ok(body.into_inner())
}

/// Encodes a complete artifact in memory.
///
/// A model that fails [`CatalogModel::validate`] is rejected: the loader
/// would refuse the artifact anyway.
#[instrument(skip_all, fields(apis = model.apis().len(), %compression))]
pub fn encode(model: &CatalogModel, compression: Compression) -> Result<Vec<u8>> {
    let violations = model.validate();
    if !violations.is_empty() {
        for violation in &violations {
            warn!(%violation, "catalog model violation");
        }
        exn::bail!(ErrorKind::InvalidModel(violations.len()));
    }
    encode_unchecked(model, compression)
}

pub(crate) fn encode_unchecked(model: &CatalogModel, compression: Compression) -> Result<Vec<u8>> {
    let body = encode_body(model)?;
    let header = Header {
        version: FORMAT_VERSION,
        compression,
        counts: Counts {
            frameworks: to_index(model.frameworks().len(), "frameworks")?,
            packages: to_index(model.packages().len(), "packages")?,
            assemblies: to_index(model.assemblies().len(), "assemblies")?,
            apis: to_index(model.apis().len(), "apis")?,
        },
        body_len: u64::try_from(body.len()).or_raise(|| ErrorKind::TooLarge("body"))?,
        checksum: crc32fast::hash(&body),
    };
    let mut artifact = header.encode().to_vec();
    compression.compress_into(&body, &mut artifact).or_raise(|| ErrorKind::Compression)?;
    debug!(body = body.len(), artifact = artifact.len(), "catalog encoded");
    Ok(artifact)
}

/// Writes a complete artifact to `writer`.
pub fn write(model: &CatalogModel, mut writer: impl Write, compression: Compression) -> Result<()> {
    let artifact = encode(model, compression)?;
    writer.write_all(&artifact).or_raise(|| ErrorKind::Io)?;
    writer.flush().or_raise(|| ErrorKind::Io)
}

/// Writes the artifact next to `path` and renames it into place, so a
/// reader never observes a half-written catalog.
#[instrument(skip_all, fields(path = %path.as_ref().display(), %compression))]
pub fn save(model: &CatalogModel, path: impl AsRef<Path>, compression: Compression) -> Result<()> {
    let path = path.as_ref();
    let artifact = encode(model, compression)?;
    let partial = path.with_extension(PARTIAL_EXTENSION);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
    }
    fs::write(&partial, &artifact).or_raise(|| ErrorKind::Io)?;
    fs::rename(&partial, path).or_raise(|| ErrorKind::Io)
}
