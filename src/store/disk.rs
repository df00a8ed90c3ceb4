//! Versioned on-disk index layout.
//!
//! ```text
//! <location>/
//!   CURRENT              "v000003"  (atomically replaced pointer)
//!   v000002/             previous version, kept for in-flight readers
//!   v000003/
//!     manifest.json      format, version, model, dims, count, checksum
//!     chunks.json        [{text, source, page}]
//!     vectors.bin        count × dims little-endian f32
//! ```
//!
//! A save writes the new version into a hidden staging directory, renames
//! it to `vNNNNNN`, then swaps `CURRENT` via a temp file and rename. A
//! reader therefore sees either the old or the new version, never a
//! partial one. A crash before the swap leaves the previous version live.
//!
//! Versions older than the retention count are pruned after the swap.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{IndexEntry, VectorIndex};
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::Chunk;

const FORMAT: &str = "marinereg-index/1";
const CURRENT: &str = "CURRENT";
const MANIFEST: &str = "manifest.json";
const CHUNKS: &str = "chunks.json";
const VECTORS: &str = "vectors.bin";
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub version: u64,
    pub model: String,
    pub dims: usize,
    pub count: usize,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of `vectors.bin`.
    pub vectors_sha256: String,
}

fn version_dir_name(version: u64) -> String {
    format!("v{:06}", version)
}

fn parse_version_dir(name: &str) -> Option<u64> {
    let digits = name.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True if anything at all exists inside `location`.
pub fn has_artifacts(location: &Path) -> bool {
    fs::read_dir(location)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Versions present on disk, ascending.
pub fn list_versions(location: &Path) -> Result<Vec<u64>> {
    let entries = match fs::read_dir(location) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(location, e)),
    };
    let mut versions: Vec<u64> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().and_then(parse_version_dir))
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

/// Live version according to `CURRENT`, or `None` if nothing was published.
pub fn current_version(location: &Path) -> Result<Option<u64>> {
    let pointer = location.join(CURRENT);
    let raw = match fs::read_to_string(&pointer) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(pointer, e)),
    };
    parse_version_dir(raw.trim())
        .map(Some)
        .ok_or_else(|| Error::corrupt(location, format!("unreadable {} pointer: {:?}", CURRENT, raw.trim())))
}

/// Write `index` as the next version at `location` and make it live.
pub fn save(index: &VectorIndex, location: &Path, retain: usize) -> Result<u64> {
    fs::create_dir_all(location).map_err(|e| Error::io(location, e))?;

    let latest = list_versions(location)?.last().copied().unwrap_or(0);
    let version = latest.max(current_version(location).ok().flatten().unwrap_or(0)) + 1;

    let staging = location.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
    fs::create_dir(&staging).map_err(|e| Error::io(&staging, e))?;
    if let Err(e) = write_version(index, &staging, version) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    let final_dir = location.join(version_dir_name(version));
    fs::rename(&staging, &final_dir).map_err(|e| Error::io(&final_dir, e))?;
    publish(location, version)?;

    tracing::info!(
        location = %location.display(),
        version,
        chunks = index.len(),
        "saved index version"
    );

    if let Err(e) = prune(location, version, retain) {
        tracing::warn!(location = %location.display(), error = %e, "failed to prune old index versions");
    }
    Ok(version)
}

fn write_version(index: &VectorIndex, dir: &Path, version: u64) -> Result<()> {
    let mut blob = Vec::with_capacity(index.len() * index.dims() * 4);
    for entry in index.entries() {
        blob.extend_from_slice(&vec_to_blob(&entry.vector));
    }
    let checksum = format!("{:x}", Sha256::digest(&blob));

    let chunks: Vec<&Chunk> = index.chunks().collect();
    let chunks_json = serde_json::to_vec(&chunks).map_err(|e| Error::Store(e.to_string()))?;

    let manifest = Manifest {
        format: FORMAT.to_string(),
        version,
        model: index.model().to_string(),
        dims: index.dims(),
        count: index.len(),
        created_at: Utc::now(),
        vectors_sha256: checksum,
    };
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).map_err(|e| Error::Store(e.to_string()))?;

    write_synced(&dir.join(VECTORS), &blob)?;
    write_synced(&dir.join(CHUNKS), &chunks_json)?;
    write_synced(&dir.join(MANIFEST), &manifest_json)?;
    sync_dir(dir)
}

/// Atomically point `CURRENT` at `version`.
fn publish(location: &Path, version: u64) -> Result<()> {
    let tmp = location.join(format!(".{}.{}.tmp", CURRENT, Uuid::new_v4()));
    write_synced(&tmp, version_dir_name(version).as_bytes())?;
    let pointer = location.join(CURRENT);
    if let Err(e) = fs::rename(&tmp, &pointer) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(pointer, e));
    }
    sync_dir(location)
}

/// Remove versions older than the newest `retain`, plus abandoned staging dirs.
fn prune(location: &Path, live: u64, retain: usize) -> Result<()> {
    let versions = list_versions(location)?;
    let keep_from = versions.len().saturating_sub(retain.max(1));
    for old in &versions[..keep_from] {
        if *old == live {
            continue;
        }
        let dir = location.join(version_dir_name(*old));
        fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        tracing::debug!(location = %location.display(), version = *old, "pruned index version");
    }

    let entries = fs::read_dir(location).map_err(|e| Error::io(location, e))?;
    for entry in entries.filter_map(|e| e.ok()) {
        if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            let path = entry.path();
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        }
    }
    Ok(())
}

/// Times `load` follows a moved `CURRENT` pointer before giving up.
const LOAD_ATTEMPTS: usize = 32;

/// Read the live version at `location`.
///
/// - Missing or empty directory, or nothing ever published →
///   [`Error::IndexNotFound`].
/// - Pointer or version data present but unreadable →
///   [`Error::IndexCorrupt`].
///
/// A concurrent save may publish a new version and prune the one being
/// read. When reading fails and `CURRENT` has moved since it was resolved,
/// the read restarts against the new version; corruption is only reported
/// for a version the pointer still names.
pub fn load(location: &Path) -> Result<VectorIndex> {
    let mut version = match resolve(location)? {
        Some(v) => v,
        None => return Err(Error::IndexNotFound(location.to_path_buf())),
    };
    let mut attempts = 1;
    loop {
        let err = match load_version(location, version) {
            Ok(index) => return Ok(index),
            Err(e @ Error::IndexCorrupt { .. }) => e,
            Err(e) => return Err(e),
        };
        match resolve(location) {
            Ok(Some(now)) if now != version && attempts < LOAD_ATTEMPTS => {
                tracing::debug!(location = %location.display(), from = version, to = now, "index version moved during load, retrying");
                version = now;
                attempts += 1;
            }
            Ok(None) => return Err(Error::IndexNotFound(location.to_path_buf())),
            _ => return Err(err),
        }
    }
}

/// Live version, `None` when nothing is published at `location`.
fn resolve(location: &Path) -> Result<Option<u64>> {
    if !has_artifacts(location) {
        return Ok(None);
    }
    match current_version(location)? {
        Some(v) => Ok(Some(v)),
        None if list_versions(location)?.is_empty() => Ok(None),
        None => Err(Error::corrupt(location, format!("versions present but no {} pointer", CURRENT))),
    }
}

fn load_version(location: &Path, version: u64) -> Result<VectorIndex> {
    let dir = location.join(version_dir_name(version));
    if !dir.is_dir() {
        return Err(Error::corrupt(location, format!("live version {} is missing", version)));
    }

    let manifest: Manifest = read_json(location, &dir.join(MANIFEST))?;
    if manifest.format != FORMAT {
        return Err(Error::corrupt(location, format!("unsupported format {:?}", manifest.format)));
    }
    if manifest.version != version {
        return Err(Error::corrupt(
            location,
            format!("manifest says version {}, pointer says {}", manifest.version, version),
        ));
    }

    let chunks: Vec<Chunk> = read_json(location, &dir.join(CHUNKS))?;
    if chunks.len() != manifest.count {
        return Err(Error::corrupt(
            location,
            format!("manifest lists {} chunks, found {}", manifest.count, chunks.len()),
        ));
    }

    let vectors_path = dir.join(VECTORS);
    let blob = fs::read(&vectors_path)
        .map_err(|e| Error::corrupt(location, format!("{}: {}", VECTORS, e)))?;
    if format!("{:x}", Sha256::digest(&blob)) != manifest.vectors_sha256 {
        return Err(Error::corrupt(location, "vector checksum mismatch"));
    }
    if blob.len() != manifest.count * manifest.dims * 4 {
        return Err(Error::corrupt(
            location,
            format!(
                "vector payload is {} bytes, expected {}",
                blob.len(),
                manifest.count * manifest.dims * 4
            ),
        ));
    }

    let floats = blob_to_vec(&blob);
    let entries = if manifest.dims == 0 {
        Vec::new()
    } else {
        chunks
            .into_iter()
            .zip(floats.chunks_exact(manifest.dims))
            .map(|(chunk, v)| IndexEntry {
                chunk,
                vector: v.to_vec(),
            })
            .collect()
    };
    if entries.len() != manifest.count {
        return Err(Error::corrupt(location, "entry count does not match manifest"));
    }

    Ok(VectorIndex::from_parts(manifest.model, manifest.dims, version, entries))
}

/// Delete the whole index directory. Returns whether anything was removed.
pub fn remove(location: &Path) -> Result<bool> {
    match fs::remove_dir_all(location) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(location, e)),
    }
}

/// [`remove`] on the blocking thread pool.
pub async fn remove_async(location: PathBuf) -> Result<bool> {
    tokio::task::spawn_blocking(move || remove(&location))
        .await
        .map_err(super::join_error)?
}

fn read_json<T: serde::de::DeserializeOwned>(location: &Path, path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| Error::corrupt(location, format!("{}: {}", display_name(path), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::corrupt(location, format!("{}: {}", display_name(path), e)))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(bytes).map_err(|e| Error::io(path, e))?;
    file.sync_all().map_err(|e| Error::io(path, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|f| f.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Path of a version directory, for diagnostics and tests.
pub fn version_path(location: &Path, version: u64) -> PathBuf {
    location.join(version_dir_name(version))
}
