/// YAML template helpers: load, patch nested keys, save.
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};

pub fn load(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading template {}", path.display()))?;
    let doc: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing template {}", path.display()))?;
    Ok(match doc {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

pub fn save(doc: &Value, path: &Path) -> Result<()> {
    let text = serde_yaml::to_string(doc)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Set `doc[keys[0]][keys[1]]...` to `value`, creating missing mappings.
///
/// Fails when an intermediate key holds a non-mapping value.
pub fn set(doc: &mut Value, keys: &[&str], value: impl Into<Value>) -> Result<()> {
    let Some((last, parents)) = keys.split_last() else {
        bail!("empty key path");
    };
    let mut node = doc;
    for key in parents {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = node else {
            bail!("`{key}` is not under a mapping in {}", keys.join("."));
        };
        node = map
            .entry(Value::from(*key))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = node else {
        bail!("cannot set {}: parent is not a mapping", keys.join("."));
    };
    map.insert(Value::from(*last), value.into());
    Ok(())
}

/// Remove `doc[keys...]` if present.
pub fn remove(doc: &mut Value, keys: &[&str]) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut node = doc;
    for key in parents {
        match node.get_mut(*key) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Value::Mapping(map) = node {
        map.remove(*last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_creates_nested_mappings() {
        let mut doc: Value = serde_yaml::from_str("a: {b: 1}\nc: null\n").unwrap();
        set(&mut doc, &["a", "b"], 2).unwrap();
        set(&mut doc, &["a", "d", "e"], "x").unwrap();
        set(&mut doc, &["c", "f"], true).unwrap();
        assert_eq!(doc["a"]["b"].as_i64(), Some(2));
        assert_eq!(doc["a"]["d"]["e"].as_str(), Some("x"));
        assert_eq!(doc["c"]["f"].as_bool(), Some(true));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut doc: Value = serde_yaml::from_str("a: 3\n").unwrap();
        assert!(set(&mut doc, &["a", "b"], 1).is_err());
    }

    #[test]
    fn remove_is_silent_when_absent() {
        let mut doc: Value = serde_yaml::from_str("a: {b: 1, c: 2}\n").unwrap();
        remove(&mut doc, &["a", "b"]);
        remove(&mut doc, &["x", "y"]);
        assert!(doc["a"].get("b").is_none());
        assert_eq!(doc["a"]["c"].as_i64(), Some(2));
    }
}
