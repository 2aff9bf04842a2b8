use crate::domain::bundle::{BundleManifest, ChangeLog, FormChange};
use crate::services::bundle::validation::{extract_fields, fields_to_vec};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn path_map(manifest: &BundleManifest) -> BTreeMap<&str, &str> {
    manifest.files.iter().map(|f| (f.path.as_str(), f.hash.as_str())).collect()
}

fn form_name(path: &str) -> Option<&str> {
    path.strip_prefix("forms/")?.split('/').next()
}

fn read_schema_fields(version_dir: &Path, form: &str) -> BTreeMap<String, String> {
    std::fs::read(version_dir.join("forms").join(form).join("schema.json"))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .map(|schema| extract_fields(&schema))
        .unwrap_or_default()
}

/// Diffs two bundle versions. File-level adds/removes/hash changes, plus a
/// per-form report with field-level deltas; a field whose type changed is
/// emitted as one remove and one add.
pub(crate) fn diff_versions(
    versions_dir: &Path,
    current: &BundleManifest,
    target: &BundleManifest,
) -> ChangeLog {
    let current_files = path_map(current);
    let target_files = path_map(target);

    let mut files_added = Vec::new();
    let mut files_removed = Vec::new();
    let mut files_modified = Vec::new();

    for (path, hash) in &target_files {
        match current_files.get(path) {
            None => files_added.push((*path).to_string()),
            Some(old_hash) if old_hash != hash => files_modified.push((*path).to_string()),
            Some(_) => {}
        }
    }
    for path in current_files.keys() {
        if !target_files.contains_key(path) {
            files_removed.push((*path).to_string());
        }
    }

    let current_forms: BTreeSet<String> =
        current_files.keys().filter_map(|p| form_name(p)).map(String::from).collect();
    let target_forms: BTreeSet<String> =
        target_files.keys().filter_map(|p| form_name(p)).map(String::from).collect();

    let forms_added: Vec<String> = target_forms.difference(&current_forms).cloned().collect();
    let forms_removed: Vec<String> = current_forms.difference(&target_forms).cloned().collect();

    let mut forms_modified = Vec::new();
    for form in current_forms.intersection(&target_forms) {
        let prefix = format!("forms/{form}/");
        let changed_files: Vec<String> = files_modified
            .iter()
            .filter(|p| p.starts_with(&prefix))
            .map(|p| p[prefix.len()..].to_string())
            .collect();
        if changed_files.is_empty() {
            continue;
        }

        let old_fields = read_schema_fields(&versions_dir.join(&current.version), form);
        let new_fields = read_schema_fields(&versions_dir.join(&target.version), form);

        // A type change shows up on both sides, keeping the diff unambiguous.
        let added: BTreeMap<String, String> = new_fields
            .iter()
            .filter(|(name, field_type)| old_fields.get(*name) != Some(field_type))
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect();
        let removed: BTreeMap<String, String> = old_fields
            .iter()
            .filter(|(name, field_type)| new_fields.get(*name) != Some(field_type))
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect();

        forms_modified.push(FormChange {
            name: form.clone(),
            changed_files,
            fields_added: fields_to_vec(&added),
            fields_removed: fields_to_vec(&removed),
        });
    }

    ChangeLog {
        current: current.version.clone(),
        target: target.version.clone(),
        files_added,
        files_removed,
        files_modified,
        forms_added,
        forms_removed,
        forms_modified,
    }
}
