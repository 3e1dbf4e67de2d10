//! Project and service descriptors
//!
//! Both are supplied by project discovery; the annotation service only reads
//! them to pick an adapter and the files it owns.

use annotation_core::TextFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "EDMXBackend")]
    EdmxBackend,
    #[serde(rename = "CAPJava")]
    CapJava,
    #[serde(rename = "CAPNodejs")]
    CapNodejs,
}

impl ProjectType {
    pub fn is_cap(&self) -> bool {
        matches!(self, ProjectType::CapJava | ProjectType::CapNodejs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Uri of the project root
    pub root: String,
    pub project_type: ProjectType,
    /// Application roots relative to `root`
    #[serde(default)]
    pub apps: Vec<String>,
}

impl Project {
    pub fn new(root: impl Into<String>, project_type: ProjectType) -> Self {
        Self {
            root: root.into(),
            project_type,
            apps: Vec::new(),
        }
    }
}

/// The files of one OData service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Service {
    /// EDMX metadata with XML annotation files
    LocalEdmx {
        metadata: TextFile,
        annotation_files: Vec<TextFile>,
    },
    /// CAP service defined in CDS files
    CapCds { files: Vec<TextFile> },
}

impl Service {
    pub fn kind(&self) -> &'static str {
        match self {
            Service::LocalEdmx { .. } => "local-edmx",
            Service::CapCds { .. } => "cap-cds",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_from_json() {
        let project: Project =
            serde_json::from_str(r#"{"root": "file:///app", "projectType": "CAPNodejs"}"#).unwrap();
        assert!(project.project_type.is_cap());
        assert!(project.apps.is_empty());

        let service: Service = serde_json::from_str(
            r#"{
                "type": "local-edmx",
                "metadata": {"uri": "file:///app/metadata.xml", "readOnly": true},
                "annotationFiles": [{"uri": "file:///app/annotations.xml"}]
            }"#,
        )
        .unwrap();
        assert_eq!(service.kind(), "local-edmx");
        let Service::LocalEdmx { metadata, annotation_files } = service else {
            panic!("expected local-edmx");
        };
        assert!(metadata.read_only);
        assert!(!annotation_files[0].read_only);
    }
}
