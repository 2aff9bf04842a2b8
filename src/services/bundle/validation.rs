use crate::domain::bundle::FormField;
use crate::error::FieldError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Renderer names clients ship natively; schemas may reference these without
/// the bundle carrying a renderer implementation.
pub(crate) const BUILTIN_RENDERERS: &[&str] = &[
    "text", "textarea", "number", "integer", "boolean", "date", "datetime", "time", "select", "multiselect",
    "checkbox", "radio", "photo", "signature", "location", "barcode",
];

const ALLOWED_TOP_LEVEL: &[&str] = &["app", "forms", "renderers"];

/// Structural validation of an expanded bundle directory. Collects every
/// violation instead of stopping at the first, so the uploader gets one
/// actionable report.
pub(crate) fn validate_bundle_dir(root: &Path) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut renderer_refs: BTreeSet<String> = BTreeSet::new();

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            return Err(vec![FieldError::new("", "UNREADABLE", format!("bundle directory unreadable: {e}"))]);
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || !ALLOWED_TOP_LEVEL.contains(&name.as_str()) {
            errors.push(FieldError::new(
                &name,
                "UNEXPECTED_ENTRY",
                "only the app/, forms/ and renderers/ directories are allowed at the bundle root",
            ));
        }
    }

    if !root.join("app/index.html").is_file() {
        errors.push(FieldError::new("app/index.html", "MISSING_FILE", "the bundle entry point is required"));
    }

    let forms_dir = root.join("forms");
    if forms_dir.is_dir()
        && let Ok(forms) = std::fs::read_dir(&forms_dir)
    {
        for form in forms.flatten() {
            let form_name = form.file_name().to_string_lossy().to_string();
            if !form.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                errors.push(FieldError::new(
                    format!("forms/{form_name}"),
                    "UNEXPECTED_ENTRY",
                    "forms/ may only contain form directories",
                ));
                continue;
            }
            for required in ["schema.json", "ui.json"] {
                let path = form.path().join(required);
                let rel = format!("forms/{form_name}/{required}");
                match std::fs::read(&path) {
                    Err(_) => {
                        errors.push(FieldError::new(rel, "MISSING_FILE", "every form needs this file"));
                    }
                    Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                        Err(e) => {
                            errors.push(FieldError::new(rel, "INVALID_JSON", format!("not valid JSON: {e}")));
                        }
                        Ok(json) => {
                            if required == "schema.json" {
                                collect_renderer_refs(&json, &mut renderer_refs);
                            }
                        }
                    },
                }
            }
        }
    }

    let mut provided_renderers: BTreeSet<String> = BTreeSet::new();
    let renderers_dir = root.join("renderers");
    if renderers_dir.is_dir()
        && let Ok(renderers) = std::fs::read_dir(&renderers_dir)
    {
        for renderer in renderers.flatten() {
            let renderer_name = renderer.file_name().to_string_lossy().to_string();
            if !renderer.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                errors.push(FieldError::new(
                    format!("renderers/{renderer_name}"),
                    "UNEXPECTED_ENTRY",
                    "renderers/ may only contain renderer directories",
                ));
                continue;
            }
            if renderer.path().join("renderer.jsx").is_file() {
                provided_renderers.insert(renderer_name);
            } else {
                errors.push(FieldError::new(
                    format!("renderers/{renderer_name}/renderer.jsx"),
                    "MISSING_FILE",
                    "every renderer directory needs a renderer.jsx",
                ));
            }
        }
    }

    for reference in renderer_refs {
        if !provided_renderers.contains(&reference) && !BUILTIN_RENDERERS.contains(&reference.as_str()) {
            errors.push(FieldError::new(
                format!("renderers/{reference}"),
                "UNKNOWN_RENDERER",
                format!("renderer {reference} is referenced by a schema but neither bundled nor built in"),
            ));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Walks a schema document and records every string value under a
/// `renderer` key.
pub(crate) fn collect_renderer_refs(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "renderer"
                    && let Value::String(name) = child
                {
                    out.insert(name.clone());
                }
                collect_renderer_refs(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_renderer_refs(child, out);
            }
        }
        _ => {}
    }
}

/// Field list of a form schema: `properties.<name>.type`, defaulting to
/// `unknown` when the type is absent or not a string.
pub(crate) fn extract_fields(schema: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (name, spec) in properties {
            let field_type =
                spec.get("type").and_then(Value::as_str).unwrap_or("unknown").to_string();
            fields.insert(name.clone(), field_type);
        }
    }
    fields
}

pub(crate) fn fields_to_vec(fields: &BTreeMap<String, String>) -> Vec<FormField> {
    fields.iter().map(|(name, field_type)| FormField { name: name.clone(), field_type: field_type.clone() }).collect()
}
