//! Model archive adapter: ZIP container holding one architecture descriptor
//! and one weights payload.
//!
//! Entries are classified by extension:
//! - `*.json` (except `metadata.json`) is the architecture descriptor
//! - `*.bin` is the weights payload
//!
//! Directory entries, `__MACOSX/` resource forks and unrelated files are
//! skipped. Anything else about the pairing (missing or duplicated parts) is a
//! load failure.

use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::{ArtifactError, ModelArchitecture, ModelWeights, SequentialModel};

/// Upper bound on a single decompressed entry.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

const DESCRIPTOR: &str = "architecture descriptor (*.json)";
const WEIGHTS: &str = "weights payload (*.bin)";

/// Raw bytes of the two archive parts, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArchiveParts {
    pub descriptor_name: String,
    pub descriptor: Vec<u8>,
    pub weights_name: String,
    pub weights: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Descriptor,
    Weights,
    Ignored,
}

fn classify(name: &str) -> EntryKind {
    if name.starts_with("__MACOSX/") || name.ends_with('/') {
        return EntryKind::Ignored;
    }
    let base = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    if base.starts_with('.') {
        EntryKind::Ignored
    } else if base.ends_with(".json") && base != "metadata.json" {
        EntryKind::Descriptor
    } else if base.ends_with(".bin") {
        EntryKind::Weights
    } else {
        EntryKind::Ignored
    }
}

fn archive_err(e: zip::result::ZipError) -> ArtifactError {
    ArtifactError::Archive(e.to_string())
}

fn exactly_one(
    kind: &'static str,
    mut found: Vec<(String, Vec<u8>)>,
) -> Result<(String, Vec<u8>), ArtifactError> {
    match found.len() {
        0 => Err(ArtifactError::MissingEntry(kind)),
        1 => Ok(found.remove(0)),
        _ => Err(ArtifactError::AmbiguousEntry {
            kind,
            entries: found.into_iter().map(|(name, _)| name).collect(),
        }),
    }
}

/// Scan an archive and extract its descriptor and weights entries.
///
/// # Errors
/// Returns `ArtifactError::Archive` for unreadable archives or oversized
/// entries, `MissingEntry` when a part is absent and `AmbiguousEntry` when a
/// part appears more than once.
pub fn read_model_archive(bytes: &[u8]) -> Result<ModelArchiveParts, ArtifactError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut descriptors = Vec::new();
    let mut weights = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(archive_err)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let kind = classify(&name);
        if kind == EntryKind::Ignored {
            tracing::debug!("Skipping archive entry {name}");
            continue;
        }
        if entry.size() > MAX_ENTRY_BYTES {
            return Err(ArtifactError::Archive(format!(
                "entry {name} is {} bytes, limit is {MAX_ENTRY_BYTES}",
                entry.size()
            )));
        }

        // The declared size is untrusted; cap the actual read as well.
        let mut data = Vec::new();
        entry
            .take(MAX_ENTRY_BYTES + 1)
            .read_to_end(&mut data)
            .map_err(|e| ArtifactError::Archive(format!("reading {name}: {e}")))?;
        if data.len() as u64 > MAX_ENTRY_BYTES {
            return Err(ArtifactError::Archive(format!(
                "entry {name} exceeds {MAX_ENTRY_BYTES} bytes"
            )));
        }

        match kind {
            EntryKind::Descriptor => descriptors.push((name, data)),
            EntryKind::Weights => weights.push((name, data)),
            EntryKind::Ignored => {}
        }
    }

    let (descriptor_name, descriptor) = exactly_one(DESCRIPTOR, descriptors)?;
    let (weights_name, weights) = exactly_one(WEIGHTS, weights)?;

    tracing::debug!(
        "Model archive parts: {descriptor_name} ({} bytes), {weights_name} ({} bytes)",
        descriptor.len(),
        weights.len()
    );

    Ok(ModelArchiveParts {
        descriptor_name,
        descriptor,
        weights_name,
        weights,
    })
}

/// Write a model archive from named entries (deflate-compressed).
///
/// # Errors
/// Returns `ArtifactError::Archive` if the archive cannot be written.
pub fn write_archive(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, ArtifactError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in entries {
        writer.start_file(*name, options).map_err(archive_err)?;
        writer
            .write_all(data)
            .map_err(|e| ArtifactError::Archive(format!("writing {name}: {e}")))?;
    }

    let cursor = writer.finish().map_err(archive_err)?;
    Ok(cursor.into_inner())
}

/// Entry names written by [`pack_model`].
pub const DESCRIPTOR_ENTRY: &str = "model.json";
pub const WEIGHTS_ENTRY: &str = "model.weights.bin";

/// A freshly written model archive.
#[derive(Debug, Clone)]
pub struct PackedModel {
    pub archive: Vec<u8>,
    pub parameter_count: usize,
}

/// Build a model archive from a JSON descriptor and JSON layer weights.
///
/// The pair is assembled before anything is written, so the result always
/// loads.
///
/// # Errors
/// Returns `CardioriskError::Serialization` for unreadable weights JSON and
/// `CardioriskError::Artifact` when the descriptor and weights do not fit.
pub fn pack_model(descriptor: &[u8], weights_json: &[u8]) -> crate::Result<PackedModel> {
    let architecture = ModelArchitecture::from_json_bytes(descriptor)?;
    let weights: ModelWeights = serde_json::from_slice(weights_json)?;
    let payload = weights.to_bincode()?;
    let model = SequentialModel::assemble(architecture, weights)?;

    let archive = write_archive(&[
        (DESCRIPTOR_ENTRY, descriptor),
        (WEIGHTS_ENTRY, payload.as_slice()),
    ])?;
    Ok(PackedModel {
        archive,
        parameter_count: model.parameter_count(),
    })
}
