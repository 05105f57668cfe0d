use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::task::Task;

/// Declarative description of the per-task payload edits applied between
/// export and merge: key renames/deletions, URL prefixing of one field,
/// and a regex substitution on one field.
///
/// A default spec is a no-op. The spec is immutable once built; `rewrite`
/// never mutates its input task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RewriteSpec {
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub strip_dirs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl RewriteSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename `old` to `new`; an empty `new` deletes the key instead.
    pub fn with_rename(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.renames.insert(old.into(), new.into());
        self
    }

    pub fn with_renames(mut self, renames: BTreeMap<String, String>) -> Self {
        self.renames = renames;
        self
    }

    pub fn with_url_prefix(
        mut self,
        field: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        self.prefix_field = Some(field.into());
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_strip_dirs(mut self, strip_dirs: bool) -> Self {
        self.strip_dirs = strip_dirs;
        self
    }

    pub fn with_regex(
        mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.regex_field = Some(field.into());
        self.pattern = Some(pattern.into());
        self.replacement = Some(replacement.into());
        self
    }

    /// True when applying this spec cannot change any task.
    pub fn is_noop(&self) -> bool {
        self.renames.is_empty()
            && (self.prefix_field.is_none() || self.base_url.is_none())
            && (self.regex_field.is_none() || self.pattern.is_none() || self.replacement.is_none())
    }
}

/// Parse a `old:new` rename spec; `old:` means "delete old".
pub fn parse_rename(spec: &str) -> Result<(String, String)> {
    let (old, new) = spec.split_once(':').ok_or_else(|| {
        CoreError::InvalidRewriteSpec(format!("rename '{}' is missing ':' (want old:new)", spec))
    })?;
    let old = old.trim();
    if old.is_empty() {
        return Err(CoreError::InvalidRewriteSpec(format!(
            "rename '{}' has an empty source key",
            spec
        )));
    }
    Ok((old.to_string(), new.trim().to_string()))
}

/// Apply `spec` to `task`, returning a new task. Pure: no I/O, the input is
/// untouched, and equal inputs always produce equal outputs.
///
/// Steps run in a fixed order: renames, then URL prefixing, then regex
/// substitution. Prefixing and substitution skip non-string values, and a
/// pattern that fails to compile leaves the field unchanged.
pub fn rewrite(task: &Task, spec: &RewriteSpec) -> Task {
    let mut data = task.data.clone();

    apply_renames(&mut data, &spec.renames);

    if let (Some(field), Some(base)) = (&spec.prefix_field, &spec.base_url) {
        apply_url_prefix(&mut data, field, base, spec.strip_dirs);
    }

    if let (Some(field), Some(pattern), Some(replacement)) =
        (&spec.regex_field, &spec.pattern, &spec.replacement)
    {
        apply_regex(&mut data, field, pattern, replacement);
    }

    Task {
        data,
        annotations: task.annotations.clone(),
        predictions: task.predictions.clone(),
    }
}

/// Renames are applied against a snapshot of the original key set, so
/// chained pairs like `{a -> b, b -> c}` move each value one step instead
/// of cascading within a single pass.
fn apply_renames(data: &mut Map<String, Value>, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }

    let mut moves: Vec<(&String, Value)> = Vec::new();
    for (old, new) in renames {
        if new == old {
            continue;
        }
        if let Some(value) = data.get(old) {
            moves.push((new, value.clone()));
        }
    }

    for (old, new) in renames {
        if new != old {
            data.remove(old);
        }
    }

    for (new, value) in moves {
        if !new.is_empty() {
            data.insert(new.clone(), value);
        }
    }
}

fn apply_url_prefix(data: &mut Map<String, Value>, field: &str, base: &str, strip_dirs: bool) {
    let joined = match data.get(field) {
        Some(Value::String(current)) => {
            let name = if strip_dirs {
                let trimmed = current.trim_end_matches('/');
                trimmed.rsplit('/').next().unwrap_or(trimmed)
            } else {
                current.as_str()
            };
            Some(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                name.trim_start_matches('/')
            ))
        }
        _ => None,
    };

    if let Some(joined) = joined {
        data.insert(field.to_string(), Value::String(joined));
    }
}

fn apply_regex(data: &mut Map<String, Value>, field: &str, pattern: &str, replacement: &str) {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        // Malformed patterns degrade to a no-op rather than failing the merge.
        Err(_) => return,
    };

    let replaced = match data.get(field) {
        Some(Value::String(current)) => Some(re.replace_all(current, replacement).into_owned()),
        _ => None,
    };

    if let Some(replaced) = replaced {
        data.insert(field.to_string(), Value::String(replaced));
    }
}
