use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::ProjectId;

/// One unit of annotatable work, reduced to the fields that survive a merge.
///
/// Server-assigned ids are dropped when a task is exported so re-import into
/// a destination project never collides. `annotations` and `predictions`
/// serialize only when present, matching the import endpoint's expectations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<Prediction>>,
}

impl Task {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data,
            annotations: None,
            predictions: None,
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn with_predictions(mut self, predictions: Vec<Prediction>) -> Self {
        self.predictions = Some(predictions);
        self
    }
}

/// A completed annotation; only the `result` payload is carried across a
/// merge, the rest (author, lead time, review state) stays behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(default)]
    pub result: Vec<Value>,
}

impl Annotation {
    pub fn new(result: Vec<Value>) -> Self {
        Self { result }
    }
}

/// A model prediction, carried the same way as [`Annotation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    #[serde(default)]
    pub result: Vec<Value>,
}

impl Prediction {
    pub fn new(result: Vec<Value>) -> Self {
        Self { result }
    }
}

/// The ordered output of exporting one source project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportBatch {
    pub project_id: ProjectId,
    pub tasks: Vec<Task>,
}

impl ExportBatch {
    pub fn new(project_id: ProjectId, tasks: Vec<Task>) -> Self {
        Self { project_id, tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
