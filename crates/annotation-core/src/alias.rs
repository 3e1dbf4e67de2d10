//! Alias information for one annotation file
//!
//! Maps aliases to namespaces and back. A file's explicit references win;
//! vocabularies the file does not reference yet fall back to their default
//! alias, so content printed with those aliases resolves once the reference
//! reconciliation pass has added the missing import.
//!
//! ```rust
//! use annotation_core::alias::AliasInformation;
//!
//! let mut aliases = AliasInformation::new();
//! aliases.add("com.sap.vocabularies.UI.v1", Some("UI"));
//!
//! assert_eq!(aliases.to_full_name("UI.LineItem"), "com.sap.vocabularies.UI.v1.LineItem");
//! assert_eq!(aliases.to_aliased_name("com.sap.vocabularies.UI.v1.LineItem"), "UI.LineItem");
//! ```

use crate::adapter::MetadataSummary;
use crate::model::AnnotationFile;
use crate::vocabulary::VocabularyService;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static TERM_IN_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][\w.]*)").expect("valid term pattern"));

/// Alias lookup for one file
#[derive(Debug, Clone, Default)]
pub struct AliasInformation {
    pub current_file_namespace: Option<String>,
    pub current_file_alias: Option<String>,
    /// alias or namespace -> namespace
    alias_map: HashMap<String, String>,
    /// namespace -> alias
    reverse_alias_map: HashMap<String, String>,
}

impl AliasInformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the alias information of a file: its own schema namespace, its
    /// references, the service metadata namespaces and vocabulary defaults
    pub fn for_file(
        file: &AnnotationFile,
        metadata: &MetadataSummary,
        vocabularies: &VocabularyService,
    ) -> Self {
        let mut info = Self::new();
        if let Some(namespace) = &file.namespace {
            info.current_file_namespace = Some(namespace.name.clone());
            info.current_file_alias = namespace.alias.clone();
            info.add(&namespace.name, namespace.alias.as_deref());
        }
        for reference in &file.references {
            info.add(&reference.namespace, reference.alias.as_deref());
        }
        for namespace in &metadata.namespaces {
            info.add_default(&namespace.name, namespace.alias.as_deref());
        }
        for vocabulary in vocabularies.vocabularies() {
            info.add_default(&vocabulary.namespace, Some(&vocabulary.default_alias));
        }
        info
    }

    /// Register an explicit namespace/alias pair
    pub fn add(&mut self, namespace: &str, alias: Option<&str>) {
        self.alias_map
            .insert(namespace.to_string(), namespace.to_string());
        if let Some(alias) = alias {
            self.alias_map.insert(alias.to_string(), namespace.to_string());
            self.reverse_alias_map
                .insert(namespace.to_string(), alias.to_string());
        }
    }

    /// Register a fallback pair that never overrides explicit entries
    pub fn add_default(&mut self, namespace: &str, alias: Option<&str>) {
        self.alias_map
            .entry(namespace.to_string())
            .or_insert_with(|| namespace.to_string());
        let Some(alias) = alias else {
            return;
        };
        if self.alias_map.contains_key(alias) {
            return;
        }
        self.alias_map.insert(alias.to_string(), namespace.to_string());
        self.reverse_alias_map
            .entry(namespace.to_string())
            .or_insert_with(|| alias.to_string());
    }

    /// Namespace for an alias or namespace
    pub fn resolve_namespace(&self, alias_or_namespace: &str) -> Option<&str> {
        self.alias_map.get(alias_or_namespace).map(String::as_str)
    }

    pub fn alias_for(&self, namespace: &str) -> Option<&str> {
        self.reverse_alias_map.get(namespace).map(String::as_str)
    }

    /// `UI.LineItem` -> `com.sap.vocabularies.UI.v1.LineItem`
    pub fn to_full_name(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((prefix, simple)) => match self.resolve_namespace(prefix) {
                Some(namespace) => format!("{namespace}.{simple}"),
                None => name.to_string(),
            },
            None => name.to_string(),
        }
    }

    /// `com.sap.vocabularies.UI.v1.LineItem` -> `UI.LineItem`
    pub fn to_aliased_name(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((prefix, simple)) => {
                let namespace = self.resolve_namespace(prefix).unwrap_or(prefix);
                match self.alias_for(namespace) {
                    Some(alias) => format!("{alias}.{simple}"),
                    None => name.to_string(),
                }
            }
            None => name.to_string(),
        }
    }

    /// Normalize a target path (`Alias.Entity/prop`, `ns.action(ns.Type)`) to namespaces
    pub fn to_full_path(&self, path: &str) -> String {
        map_path(path, |name| self.to_full_name(name))
    }

    pub fn to_aliased_path(&self, path: &str) -> String {
        map_path(path, |name| self.to_aliased_name(name))
    }

    /// Enum member values: space separated `Type/Member` entries
    pub fn to_aliased_enum_member(&self, value: &str) -> String {
        map_enum_member(value, |name| self.to_aliased_name(name))
    }

    pub fn to_full_enum_member(&self, value: &str) -> String {
        map_enum_member(value, |name| self.to_full_name(name))
    }

    /// Alias term references inside annotation paths (`to_Item/@UI.LineItem#q`)
    pub fn to_aliased_annotation_path(&self, value: &str) -> String {
        TERM_IN_PATH
            .replace_all(value, |captures: &regex::Captures<'_>| {
                format!("@{}", self.to_aliased_name(&captures[1]))
            })
            .into_owned()
    }

    /// Namespaces of the terms referenced inside an annotation path
    pub fn annotation_path_terms(value: &str) -> Vec<String> {
        TERM_IN_PATH
            .captures_iter(value)
            .map(|captures| captures[1].to_string())
            .collect()
    }
}

fn map_enum_member(value: &str, f: impl Fn(&str) -> String) -> String {
    value
        .split_whitespace()
        .map(|member| match member.split_once('/') {
            Some((type_name, name)) => format!("{}/{name}", f(type_name)),
            None => member.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn map_path(path: &str, f: impl Fn(&str) -> String) -> String {
    path.split('/')
        .map(|segment| match segment.split_once('(') {
            Some((name, rest)) => {
                let params = rest.trim_end_matches(')');
                let mapped = params
                    .split(',')
                    .filter(|param| !param.is_empty())
                    .map(|param| map_qualified(param.trim(), &f))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}({mapped})", map_qualified(name, &f))
            }
            None => map_qualified(segment, &f),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn map_qualified(name: &str, f: &impl Fn(&str) -> String) -> String {
    if let Some(inner) = name.strip_prefix("Collection(").and_then(|n| n.strip_suffix(')')) {
        return format!("Collection({})", f(inner));
    }
    if name.contains('.') {
        f(name)
    } else {
        name.to_string()
    }
}
