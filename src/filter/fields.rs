use serde_json::{Map, Value};

use super::columns::Entity;
use super::error::FilterError;

/// Output projection from `columns=` and `exclude=`.
///
/// Applied to one serialized element at a time; nested objects (`parent`) are
/// projected through dotted paths. `id` survives every projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    only: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl FieldSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Unknown paths are dropped. `columns` must keep at least one valid path.
    pub fn parse<E: Entity>(columns: Option<&str>, exclude: Option<&str>) -> Result<Self, FilterError> {
        let meta = E::meta();

        let only = match columns {
            None => None,
            Some(raw) => {
                let valid: Vec<String> = split_paths(raw)
                    .filter(|p| meta.resolves(p))
                    .map(String::from)
                    .collect();
                if valid.is_empty() {
                    return Err(FilterError::NoValidColumns(raw.to_string(), E::MODEL));
                }
                Some(valid)
            }
        };

        let exclude = exclude
            .map(|raw| {
                split_paths(raw)
                    .filter(|p| *p != "id" && meta.resolves(p))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { only, exclude })
    }

    pub fn is_all(&self) -> bool {
        self.only.is_none() && self.exclude.is_empty()
    }

    /// Tree responses nest children unless `exclude=children`
    pub fn keeps_children(&self) -> bool {
        !self.exclude.iter().any(|p| p == "children")
    }

    pub fn apply(&self, element: &mut Map<String, Value>) {
        if let Some(only) = &self.only {
            let paths: Vec<Vec<&str>> = only.iter().map(|p| p.split('.').collect()).collect();
            keep_paths(element, &paths);
        }
        for path in &self.exclude {
            let segments: Vec<&str> = path.split('.').collect();
            drop_path(element, &segments);
        }
    }
}

fn split_paths(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|p| !p.is_empty())
}

fn keep_paths(map: &mut Map<String, Value>, paths: &[Vec<&str>]) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if key == "id" {
            continue;
        }
        let wanted: Vec<Vec<&str>> = paths
            .iter()
            .filter(|p| p.first() == Some(&key.as_str()))
            .map(|p| p[1..].to_vec())
            .collect();
        if wanted.is_empty() {
            map.remove(&key);
            continue;
        }
        if wanted.iter().any(|rest| rest.is_empty()) {
            continue;
        }
        match map.get_mut(&key) {
            Some(Value::Object(inner)) => keep_paths(inner, &wanted),
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        keep_paths(inner, &wanted);
                    }
                }
            }
            _ => {}
        }
    }
}

fn drop_path(map: &mut Map<String, Value>, path: &[&str]) {
    match path {
        [] => {}
        [last] => {
            if *last != "id" {
                map.remove(*last);
            }
        }
        [head, rest @ ..] => match map.get_mut(*head) {
            Some(Value::Object(inner)) => drop_path(inner, rest),
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        drop_path(inner, rest);
                    }
                }
            }
            _ => {}
        },
    }
}
