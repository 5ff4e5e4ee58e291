//! Human-readable diffs between property aspects for audit messages
use crate::request::RequestProperties;
use std::collections::BTreeMap;
use std::fmt::Write;

// flatten a properties aspect to the key/value view audit diffs work over
fn property_map(properties: &RequestProperties) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    if let Some(purpose) = &properties.purpose {
        map.insert("purpose", purpose.clone());
    }
    if let Some(details) = &properties.details {
        map.insert("details", details.clone());
    }
    if let Some(target) = &properties.target {
        map.insert("target", target.clone());
    }
    if !properties.field_accesses.is_empty() {
        let rendered = properties
            .field_accesses
            .iter()
            .map(|access| format!("{} ({})", access.field_path, access.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        map.insert("fieldAccesses", rendered);
    }
    map
}

/// Format the difference between two property aspects as a text block with
/// one line per removed, added, or modified key.
pub fn format_properties_difference(
    existing: &RequestProperties,
    updated: &RequestProperties,
) -> String {
    let left = property_map(existing);
    let right = property_map(updated);

    let mut out = String::from("Changes:\n");
    for (key, value) in &left {
        if !right.contains_key(key) {
            let _ = writeln!(out, "- [Removed] {key}: {value}");
        }
    }
    for (key, value) in &right {
        if !left.contains_key(key) {
            let _ = writeln!(out, "- [Added] {key}: {value}");
        }
    }
    for (key, old) in &left {
        if let Some(new) = right.get(key) {
            if new != old {
                let _ = writeln!(out, "- [Modified] {key}: {old} -> {new}");
            }
        }
    }
    out
}
