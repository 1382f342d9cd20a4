//! Builds a catalog from a directory of JSON index documents.
//!
//! Documents are read and parsed concurrently, but merged by a single consumer
//! in sorted path order so the resulting catalog does not depend on which parse
//! happens to finish first.

use crate::builder::CatalogBuilder;
use crate::error::{ErrorKind, Result};
use crate::report::{Build, FailedDocument};
use apicat_model::IndexDocument;
use apicat_model::error::Result as ModelResult;
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt, pin_mut};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

const DOCUMENT_EXTENSION: &str = "json";

/// Progress events emitted by [`ingest_directory`].
///
/// [`Started`](Self::Started) and [`DiscoveryComplete`](Self::DiscoveryComplete)
/// are emitted exactly once, followed by one [`Ingested`](Self::Ingested) or
/// [`Failed`](Self::Failed) per document and a final [`Complete`](Self::Complete).
#[derive(Debug)]
pub enum BuildEvent {
    Started,
    DiscoveryComplete(u64),
    Ingested(PathBuf),
    Failed(FailedDocument),
    Complete,
}

/// Lists the index documents directly inside `directory`, sorted by path.
pub async fn discover(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(directory).await.or_raise(|| ErrorKind::Discovery(directory.to_path_buf()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Discovery(directory.to_path_buf()))? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|kind| kind.is_file()).unwrap_or(false);
        if is_file && path.extension().is_some_and(|extension| extension == DOCUMENT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// The outer result covers reading the file, the inner one the document itself.
async fn load_document(path: &Path) -> Result<ModelResult<IndexDocument>> {
    let bytes = fs::read(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
    tokio::task::spawn_blocking(move || IndexDocument::from_slice(&bytes)).await.or_raise(|| ErrorKind::Join)
}

/// Feeds every document in `directory` into `builder`, parsing up to
/// `concurrency` documents ahead of the merge.
///
/// Per-document failures are recorded in the builder's report and surfaced as
/// [`BuildEvent::Failed`] without ending the stream; only discovery failures
/// are fatal.
pub fn ingest_directory<'a>(
    builder: &'a mut CatalogBuilder,
    directory: &'a Path,
    concurrency: usize,
) -> impl Stream<Item = Result<BuildEvent>> + 'a {
    stream!({
        yield Ok(BuildEvent::Started);
        if concurrency == 0 {
            yield Err(exn::Exn::from(ErrorKind::InvalidConcurrency));
            return;
        }

        let paths = match discover(directory).await {
            Ok(paths) => paths,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(BuildEvent::DiscoveryComplete(u64::try_from(paths.len()).unwrap_or(0)));

        let loaded = futures::stream::iter(paths)
            .map(|path| async move {
                let result = load_document(&path).await;
                (path, result)
            })
            .buffered(concurrency);
        pin_mut!(loaded);
        while let Some((path, result)) = loaded.next().await {
            let message = match result {
                Ok(Ok(document)) => {
                    builder.ingest(&document);
                    debug!(path = %path.display(), "index document merged");
                    yield Ok(BuildEvent::Ingested(path));
                    continue;
                },
                Ok(Err(e)) => (*e).to_string(),
                Err(e) => (*e).to_string(),
            };
            let failure = FailedDocument { path, message };
            builder.record_failure(failure.clone());
            yield Ok(BuildEvent::Failed(failure));
        }

        yield Ok(BuildEvent::Complete);
    })
}

/// Builds a catalog from every index document in `directory`.
#[instrument(skip_all, fields(directory = %directory.as_ref().display(), concurrency = concurrency))]
pub async fn build_directory(directory: impl AsRef<Path>, concurrency: usize) -> Result<Build> {
    let directory = directory.as_ref();
    let mut builder = CatalogBuilder::new();
    {
        let events = ingest_directory(&mut builder, directory, concurrency);
        pin_mut!(events);
        while let Some(event) = events.next().await {
            event?;
        }
    }
    Ok(builder.commit())
}
