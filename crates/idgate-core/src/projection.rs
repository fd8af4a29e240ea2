//! Dotted-path field projection over JSON trees

use serde_json::{Map, Value};

/// Keep only the listed fields of `item`.
///
/// Fields are top-level keys (`"email"`) or dotted paths into nested objects
/// (`"name.given"`); nested paths rebuild the intermediate objects in the
/// output. Paths that are missing or pass through a non-object are skipped.
/// An empty field list, or a non-object item, returns the item unchanged.
pub fn project<S: AsRef<str>>(item: &Value, fields: &[S]) -> Value {
    let Some(source) = item.as_object() else {
        return item.clone();
    };
    if fields.is_empty() {
        return item.clone();
    }

    let mut out = Map::new();
    for field in fields {
        let parts: Vec<&str> = field.as_ref().split('.').collect();
        if let Some(value) = lookup(source, &parts) {
            insert_path(&mut out, &parts, value.clone());
        }
    }

    Value::Object(out)
}

fn lookup<'a>(source: &'a Map<String, Value>, parts: &[&str]) -> Option<&'a Value> {
    let (last, parents) = parts.split_last()?;
    let mut current = source;
    for part in parents {
        current = current.get(*part)?.as_object()?;
    }
    current.get(*last)
}

fn insert_path(target: &mut Map<String, Value>, parts: &[&str], value: Value) {
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = target;
    for part in parents {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        json!({
            "id": "u1",
            "username": "ada",
            "name": {"given": "Ada", "family": "Lovelace"},
            "population": {"id": "p1"},
            "enabled": true
        })
    }

    #[test]
    fn test_top_level_fields() {
        assert_eq!(
            project(&user(), &["id", "enabled"]),
            json!({"id": "u1", "enabled": true})
        );
    }

    #[test]
    fn test_nested_fields_merge() {
        assert_eq!(
            project(&user(), &["name.given", "name.family", "population.id"]),
            json!({"name": {"given": "Ada", "family": "Lovelace"}, "population": {"id": "p1"}})
        );
    }

    #[test]
    fn test_missing_and_invalid_paths_skipped() {
        assert_eq!(
            project(&user(), &["missing", "username.first", "name.middle", "id"]),
            json!({"id": "u1"})
        );
    }

    #[test]
    fn test_empty_fields_and_non_objects_pass_through() {
        let empty: [&str; 0] = [];
        assert_eq!(project(&user(), &empty), user());
        assert_eq!(project(&json!([1, 2]), &["id"]), json!([1, 2]));
    }
}
