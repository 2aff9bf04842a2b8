use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// One file inside a bundle version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleFileEntry {
    pub path: String,
    pub size: u64,
    pub hash: String,
    pub mime_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub mod_time: OffsetDateTime,
}

/// Ordered file list plus a bundle-wide hash. The hash is deterministic over
/// the sorted entries, so two directories with identical content produce the
/// same digest regardless of upload time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub hash: String,
    pub files: Vec<BundleFileEntry>,
}

impl BundleManifest {
    /// Digest over `"{path}:{hash}\n"` for each entry in path order.
    #[must_use]
    pub fn compute_hash(entries: &[BundleFileEntry]) -> String {
        let mut hasher = Sha256::new();
        for entry in entries {
            hasher.update(entry.path.as_bytes());
            hasher.update(b":");
            hasher.update(entry.hash.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// A named field extracted from a form's `schema.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Per-form delta between two bundle versions. A field whose type changed
/// appears once in `fields_removed` (old type) and once in `fields_added`
/// (new type).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormChange {
    pub name: String,
    pub changed_files: Vec<String>,
    pub fields_added: Vec<FormField>,
    pub fields_removed: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLog {
    pub current: String,
    pub target: String,
    pub files_added: Vec<String>,
    pub files_removed: Vec<String>,
    pub files_modified: Vec<String>,
    pub forms_added: Vec<String>,
    pub forms_removed: Vec<String>,
    pub forms_modified: Vec<FormChange>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn entry(path: &str, hash: &str) -> BundleFileEntry {
        BundleFileEntry {
            path: path.to_string(),
            size: 1,
            hash: hash.to_string(),
            mime_type: "text/plain".to_string(),
            mod_time: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn bundle_hash_depends_on_content_only() {
        let a = vec![entry("app/index.html", "h1"), entry("forms/f/schema.json", "h2")];
        let mut b = a.clone();
        b[0].mod_time = datetime!(2026-06-01 12:00:00 UTC);
        b[0].size = 999;
        assert_eq!(BundleManifest::compute_hash(&a), BundleManifest::compute_hash(&b));

        b[0].hash = "different".to_string();
        assert_ne!(BundleManifest::compute_hash(&a), BundleManifest::compute_hash(&b));
    }
}
