use crate::domain::bundle::{BundleFileEntry, BundleManifest, ChangeLog};
use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod changes;
pub mod validation;

const VERSIONS_DIR: &str = "versions";
const TMP_DIR: &str = "tmp";
const ACTIVE_POINTER: &str = "active";

fn internal(e: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %e, "Bundle storage error");
    AppError::Internal
}

/// Versioned store of client asset bundles under a single root directory.
/// Each version is an expanded archive in `versions/<tag>/`; a pointer file
/// names the active tag and is replaced with an atomic rename, so readers
/// see the old or the new version, never a partial switch.
#[derive(Clone, Debug)]
pub struct BundleService {
    root: PathBuf,
    max_versions_kept: usize,
}

impl BundleService {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, max_versions_kept: usize) -> Self {
        Self { root: root.into(), max_versions_kept: max_versions_kept.max(1) }
    }

    /// Creates the bundle directory layout.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join(VERSIONS_DIR)).await.map_err(internal)?;
        tokio::fs::create_dir_all(self.root.join(TMP_DIR)).await.map_err(internal)?;
        Ok(())
    }

    /// A fresh staging path for an incoming archive, inside the bundle root
    /// so the final rename stays on one filesystem.
    #[must_use]
    pub fn staging_archive_path(&self) -> PathBuf {
        self.root.join(TMP_DIR).join(format!("{}.zip", Uuid::new_v4()))
    }

    /// Validates and installs an uploaded archive. Nothing is mutated unless
    /// validation passes; on success the expanded tree is renamed into
    /// `versions/` and optionally activated, then retention prunes the
    /// oldest non-active versions.
    #[tracing::instrument(err(level = "warn"), skip(self, archive_path))]
    pub async fn install(&self, archive_path: PathBuf, activate: bool) -> Result<BundleManifest> {
        let root = self.root.clone();
        let max_kept = self.max_versions_kept;
        tokio::task::spawn_blocking(move || {
            let result = install_blocking(&root, max_kept, &archive_path, activate);
            let _ = std::fs::remove_file(&archive_path);
            result
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// Manifest of the active version, or of the newest retained version
    /// when `preview` is set.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn manifest(&self, preview: bool) -> Result<BundleManifest> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let tag = resolve_tag(&root, preview)?;
            build_manifest(&root.join(VERSIONS_DIR), &tag)
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// One file out of the selected version: content, content hash (ETag)
    /// and guessed mime type.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn file(&self, rel_path: &str, preview: bool) -> Result<(Vec<u8>, String, String)> {
        let safe: PathBuf = sanitize_rel_path(rel_path)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let tag = resolve_tag(&root, preview)?;
            let path = root.join(VERSIONS_DIR).join(&tag).join(&safe);
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
                Err(e) => return Err(internal(e)),
            };
            let hash = hex::encode(Sha256::digest(&bytes));
            let mime = mime_guess::from_path(&safe).first_or_octet_stream().essence_str().to_string();
            Ok((bytes, hash, mime))
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// All retained version tags (ascending) and the active one.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn list_versions(&self) -> Result<(Vec<String>, Option<String>)> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let tags = list_tags(&root)?;
            let active = read_active(&root)?;
            Ok((tags, active))
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// Atomically re-points the active version.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn switch(&self, tag: &str) -> Result<()> {
        let root = self.root.clone();
        let tag = tag.to_string();
        tokio::task::spawn_blocking(move || {
            if !root.join(VERSIONS_DIR).join(&tag).is_dir() {
                return Err(AppError::NotFound);
            }
            write_active(&root, &tag)?;
            tracing::info!(version = %tag, "Active bundle switched");
            Ok(())
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// Change report between two retained versions; `current` defaults to
    /// the active version, `target` to the newest retained one.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn changes(&self, current: Option<String>, target: Option<String>) -> Result<ChangeLog> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let versions_dir = root.join(VERSIONS_DIR);
            let current_tag = match current {
                Some(tag) => tag,
                None => resolve_tag(&root, false)?,
            };
            let target_tag = match target {
                Some(tag) => tag,
                None => resolve_tag(&root, true)?,
            };
            let current_manifest = build_manifest(&versions_dir, &current_tag)?;
            let target_manifest = build_manifest(&versions_dir, &target_tag)?;
            Ok(changes::diff_versions(&versions_dir, &current_manifest, &target_manifest))
        })
        .await
        .map_err(|_| AppError::Internal)?
    }
}

fn sanitize_rel_path(rel_path: &str) -> Result<PathBuf> {
    let path = Path::new(rel_path);
    let clean = path
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)));
    if rel_path.is_empty() || !clean {
        return Err(AppError::bad_request("INVALID_PATH", "file path must be a plain relative path"));
    }
    Ok(path.to_path_buf())
}

fn resolve_tag(root: &Path, preview: bool) -> Result<String> {
    if preview {
        return list_tags(root)?.pop().ok_or(AppError::NotFound);
    }
    read_active(root)?.ok_or(AppError::NotFound)
}

fn read_active(root: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(root.join(ACTIVE_POINTER)) {
        Ok(tag) => {
            let tag = tag.trim().to_string();
            Ok((!tag.is_empty()).then_some(tag))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(internal(e)),
    }
}

fn write_active(root: &Path, tag: &str) -> Result<()> {
    let temp = root.join(TMP_DIR).join(format!("active-{}", Uuid::new_v4()));
    std::fs::write(&temp, tag).map_err(internal)?;
    std::fs::rename(&temp, root.join(ACTIVE_POINTER)).map_err(internal)
}

fn list_tags(root: &Path) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    let entries = match std::fs::read_dir(root.join(VERSIONS_DIR)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tags),
        Err(e) => return Err(internal(e)),
    };
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            tags.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    // Tags carry a timestamp prefix, so lexical order is chronological.
    tags.sort();
    Ok(tags)
}

fn walk_files(base: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk_files(base, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(base)
                .map_err(std::io::Error::other)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((rel, path));
        }
    }
    Ok(())
}

fn build_manifest(versions_dir: &Path, tag: &str) -> Result<BundleManifest> {
    let dir = versions_dir.join(tag);
    if !dir.is_dir() {
        return Err(AppError::NotFound);
    }

    let mut files = Vec::new();
    walk_files(&dir, &dir, &mut files).map_err(internal)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::with_capacity(files.len());
    for (rel, path) in files {
        let bytes = std::fs::read(&path).map_err(internal)?;
        let meta = std::fs::metadata(&path).map_err(internal)?;
        let mod_time = meta.modified().map(OffsetDateTime::from).unwrap_or_else(|_| OffsetDateTime::now_utc());
        entries.push(BundleFileEntry {
            mime_type: mime_guess::from_path(&rel).first_or_octet_stream().essence_str().to_string(),
            hash: hex::encode(Sha256::digest(&bytes)),
            size: bytes.len() as u64,
            path: rel,
            mod_time,
        });
    }

    Ok(BundleManifest {
        version: tag.to_string(),
        generated_at: OffsetDateTime::now_utc(),
        hash: BundleManifest::compute_hash(&entries),
        files: entries,
    })
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let invalid =
        |detail: String| AppError::bad_request("INVALID_BUNDLE_ARCHIVE", detail);

    let file = std::fs::File::open(archive_path).map_err(internal)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| invalid(format!("archive is not a readable zip: {e}")))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| invalid(format!("corrupt archive entry: {e}")))?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(invalid(format!("entry {} escapes the archive root", entry.name())));
        };
        let out_path = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(internal)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(internal)?;
            }
            let mut out = std::fs::File::create(&out_path).map_err(internal)?;
            std::io::copy(&mut entry, &mut out).map_err(internal)?;
        }
    }

    Ok(())
}

fn version_tag(bundle_hash: &str) -> String {
    let format = time::macros::format_description!("[year][month][day][hour][minute][second]");
    let stamp = OffsetDateTime::now_utc().format(&format).unwrap_or_else(|_| "00000000000000".to_string());
    format!("{stamp}-{}", &bundle_hash[..8.min(bundle_hash.len())])
}

fn install_blocking(root: &Path, max_kept: usize, archive_path: &Path, activate: bool) -> Result<BundleManifest> {
    let staging = root.join(TMP_DIR).join(Uuid::new_v4().to_string());

    let staged = (|| {
        std::fs::create_dir_all(&staging).map_err(internal)?;
        extract_zip(archive_path, &staging)?;

        validation::validate_bundle_dir(&staging).map_err(|errors| {
            AppError::validation("INVALID_BUNDLE_STRUCTURE", "bundle failed structural validation", errors)
        })?;

        // Hash before the move so the tag can embed it.
        let mut files = Vec::new();
        walk_files(&staging, &staging, &mut files).map_err(internal)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));
        let mut hasher = Sha256::new();
        for (rel, path) in &files {
            let bytes = std::fs::read(path).map_err(internal)?;
            hasher.update(rel.as_bytes());
            hasher.update(b":");
            hasher.update(hex::encode(Sha256::digest(&bytes)).as_bytes());
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    })();

    let content_hash = match staged {
        Ok(hash) => hash,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    let tag = version_tag(&content_hash);
    let final_dir = root.join(VERSIONS_DIR).join(&tag);

    if final_dir.exists() {
        // Same content uploaded within the same second; the existing
        // version already is this bundle.
        let _ = std::fs::remove_dir_all(&staging);
    } else if let Err(e) = std::fs::rename(&staging, &final_dir) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(internal(e));
    }

    if activate {
        write_active(root, &tag)?;
    }

    prune_versions(root, max_kept)?;

    let manifest = build_manifest(&root.join(VERSIONS_DIR), &tag)?;
    tracing::info!(version = %tag, files = manifest.files.len(), activated = activate, "Bundle installed");
    Ok(manifest)
}

fn prune_versions(root: &Path, max_kept: usize) -> Result<()> {
    let tags = list_tags(root)?;
    if tags.len() <= max_kept {
        return Ok(());
    }
    let active = read_active(root)?;
    let mut to_remove = tags.len() - max_kept;

    for tag in tags {
        if to_remove == 0 {
            break;
        }
        if active.as_deref() == Some(tag.as_str()) {
            continue;
        }
        if let Err(e) = std::fs::remove_dir_all(root.join(VERSIONS_DIR).join(&tag)) {
            tracing::warn!(version = %tag, error = %e, "Failed to prune bundle version");
        } else {
            tracing::info!(version = %tag, "Pruned bundle version");
            to_remove -= 1;
        }
    }

    Ok(())
}
