//! Local JSON Reference resolution.
//!
//! Only document-local references (`#/...`) are supported: the builder works on
//! an in-memory tree and never loads external files.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::AsyncApiError;

/// Resolve a JSON Reference like `#/components/schemas/User` from the spec root.
///
/// Returns `None` for external refs and for pointers that do not exist.
pub fn resolve_ref<'a>(root: &'a Value, ref_path: &str) -> Option<&'a Value> {
    let pointer = ref_path.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    let pointer = pointer.strip_prefix('/')?;
    let mut current = root;
    for segment in pointer.split('/') {
        let decoded = urlencoding::decode(segment).ok()?;
        let unescaped = decoded.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Array(items) => items.get(unescaped.parse::<usize>().ok()?)?,
            other => other.get(&unescaped)?,
        };
    }
    Some(current)
}

/// The `$ref` string of a node, if the node is a reference object.
pub fn ref_of(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(Value::as_str)
}

/// Follow a chain of reference objects until a concrete node is reached.
///
/// Returns the concrete node together with the last pointer followed, if any.
/// `entity` names the owner for error messages.
pub fn deref_node<'a>(
    root: &'a Value,
    value: &'a Value,
    entity: &str,
) -> Result<(&'a Value, Option<&'a str>), AsyncApiError> {
    let mut current = value;
    let mut last_ref = None;
    let mut seen = HashSet::new();
    while let Some(ref_str) = ref_of(current) {
        if !seen.insert(ref_str) {
            return Err(AsyncApiError::malformed(format!(
                "circular $ref '{}' in {}",
                ref_str, entity
            )));
        }
        current =
            resolve_ref(root, ref_str).ok_or_else(|| AsyncApiError::unresolvable(ref_str, entity))?;
        last_ref = Some(ref_str);
    }
    Ok((current, last_ref))
}

/// Resolve a payload schema.
///
/// The root reference chain is followed so the returned schema is concrete.
/// Nested `$ref`s stay in place once proven to resolve. Each target is checked
/// once, so schemas sharing sub-schemas stay linear in the size of the document.
pub fn resolve_schema_refs(
    value: &Value,
    root: &Value,
    entity: &str,
) -> Result<Value, AsyncApiError> {
    let (concrete, _) = deref_node(root, value, entity)?;
    let mut checked = HashSet::new();
    check_refs(concrete, root, entity, &mut checked)?;
    Ok(concrete.clone())
}

fn check_refs<'a>(
    value: &'a Value,
    root: &'a Value,
    entity: &str,
    checked: &mut HashSet<&'a str>,
) -> Result<(), AsyncApiError> {
    match value {
        Value::Object(obj) => {
            if let Some(ref_str) = obj.get("$ref").and_then(Value::as_str) {
                if checked.insert(ref_str) {
                    let target = resolve_ref(root, ref_str)
                        .ok_or_else(|| AsyncApiError::unresolvable(ref_str, entity))?;
                    check_refs(target, root, entity, checked)?;
                }
            }
            obj.iter()
                .filter(|(key, _)| key.as_str() != "$ref")
                .try_for_each(|(_, val)| check_refs(val, root, entity, checked))
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| check_refs(item, root, entity, checked)),
        _ => Ok(()),
    }
}
