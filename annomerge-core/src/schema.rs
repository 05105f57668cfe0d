use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::ProjectId;

/// One project's labeling schema as seen by the compatibility check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaEntry {
    pub project_id: ProjectId,
    pub raw: String,
    pub normalized: String,
}

/// Outcome of comparing the labeling schemas of the merge sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaReport {
    pub compatible: bool,
    pub entries: Vec<SchemaEntry>,
}

impl SchemaReport {
    /// Ids of projects whose normalized schema differs from the first entry's.
    pub fn divergent(&self) -> Vec<ProjectId> {
        match self.entries.first() {
            Some(first) => self
                .entries
                .iter()
                .skip(1)
                .filter(|e| e.normalized != first.normalized)
                .map(|e| e.project_id)
                .collect(),
            None => Vec::new(),
        }
    }
}

fn collapse(input: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(input, replacement).into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Normalize a labeling schema for comparison: collapse whitespace runs,
/// drop whitespace around tag brackets and attribute `=`, lower-case.
///
/// Purely syntactic. Two schemas that differ only in formatting or case
/// normalize to the same string; attribute reordering or structural changes
/// do not, and are treated as incompatible.
pub fn normalize_label_config(raw: &str) -> String {
    let s = collapse(raw, r"\s+", " ");
    let s = collapse(&s, r">\s*<", "><");
    let s = collapse(&s, r"\s*=\s*", "=");
    let s = collapse(&s, r"\s*/>", "/>");
    let s = collapse(&s, r"\s*>", ">");
    let s = collapse(&s, r"<\s*", "<");
    s.trim().to_lowercase()
}

/// Compare labeling schemas across projects: compatible iff every
/// normalized form is byte-equal.
///
/// An empty or single-element input is trivially compatible; callers gating
/// a merge must separately require at least two sources.
pub fn check_compatibility(configs: &[(ProjectId, String)]) -> SchemaReport {
    let entries: Vec<SchemaEntry> = configs
        .iter()
        .map(|(project_id, raw)| SchemaEntry {
            project_id: *project_id,
            raw: raw.clone(),
            normalized: normalize_label_config(raw),
        })
        .collect();

    let compatible = match entries.first() {
        Some(first) => entries.iter().all(|e| e.normalized == first.normalized),
        None => true,
    };

    SchemaReport {
        compatible,
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_formatting_only_differences() {
        let tight = r#"<View><Image name="img" value="$image"/></View>"#;
        let loose = "<view>\n  <image name = \"img\" value = \"$image\" />\n</view>";
        assert_eq!(
            normalize_label_config(tight),
            normalize_label_config(loose)
        );
    }

    #[test]
    fn test_normalize_keeps_structural_differences() {
        let a = r#"<View><Image name="img" value="$image"/></View>"#;
        let b = r#"<View><Text name="txt" value="$text"/></View>"#;
        assert_ne!(normalize_label_config(a), normalize_label_config(b));
    }

    #[test]
    fn test_divergent_lists_projects_that_differ_from_first() {
        let report = check_compatibility(&[
            (ProjectId(1), "<View/>".to_string()),
            (ProjectId(2), "<view />".to_string()),
            (ProjectId(3), "<Other/>".to_string()),
        ]);
        assert!(!report.compatible);
        assert_eq!(report.divergent(), vec![ProjectId(3)]);
    }
}
