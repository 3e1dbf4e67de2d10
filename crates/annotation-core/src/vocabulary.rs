//! Vocabulary service
//!
//! Supplies namespace, default alias and reference URI for the OASIS and SAP
//! vocabularies, plus term definitions for lookups. The service is built
//! explicitly by the caller and shared through `Arc`; there is no global
//! instance.

use crate::error::ApiError;
use crate::result::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub namespace: String,
    pub default_alias: String,
    pub uri: String,
    #[serde(default)]
    pub terms: IndexMap<String, TermDefinition>,
}

/// Type information of a vocabulary term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDefinition {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub collection: bool,
}

/// Registry of known vocabularies
#[derive(Debug, Clone)]
pub struct VocabularyService {
    vocabularies: IndexMap<String, Vocabulary>,
    aliases: HashMap<String, String>,
}

const OASIS: &str = "https://oasis-tcs.github.io/odata-vocabularies/vocabularies";
const SAP: &str = "https://sap.github.io/odata-vocabularies/vocabularies";

type TermSpec = (&'static str, &'static str, bool);

const BUILT_IN: &[(&str, &str, &str, &str, &[TermSpec])] = &[
    (
        "Org.OData.Core.V1",
        "Core",
        OASIS,
        "Org.OData.Core.V1.xml",
        &[
            ("Description", "Edm.String", false),
            ("LongDescription", "Edm.String", false),
            ("Computed", "Core.Tag", false),
            ("Immutable", "Core.Tag", false),
            ("Permissions", "Core.Permission", false),
        ],
    ),
    (
        "Org.OData.Capabilities.V1",
        "Capabilities",
        OASIS,
        "Org.OData.Capabilities.V1.xml",
        &[
            ("FilterRestrictions", "Capabilities.FilterRestrictionsType", false),
            ("SortRestrictions", "Capabilities.SortRestrictionsType", false),
            ("InsertRestrictions", "Capabilities.InsertRestrictionsType", false),
            ("UpdateRestrictions", "Capabilities.UpdateRestrictionsType", false),
            ("DeleteRestrictions", "Capabilities.DeleteRestrictionsType", false),
        ],
    ),
    (
        "Org.OData.Aggregation.V1",
        "Aggregation",
        OASIS,
        "Org.OData.Aggregation.V1.xml",
        &[
            ("ApplySupported", "Aggregation.ApplySupportedType", false),
            ("Groupable", "Core.Tag", false),
        ],
    ),
    (
        "Org.OData.Measures.V1",
        "Measures",
        OASIS,
        "Org.OData.Measures.V1.xml",
        &[
            ("ISOCurrency", "Edm.String", false),
            ("Unit", "Edm.String", false),
        ],
    ),
    (
        "Org.OData.Validation.V1",
        "Validation",
        OASIS,
        "Org.OData.Validation.V1.xml",
        &[
            ("Minimum", "Edm.PrimitiveType", false),
            ("Maximum", "Edm.PrimitiveType", false),
            ("AllowedValues", "Validation.AllowedValue", true),
        ],
    ),
    (
        "com.sap.vocabularies.Common.v1",
        "Common",
        SAP,
        "Common.xml",
        &[
            ("Label", "Edm.String", false),
            ("Heading", "Edm.String", false),
            ("QuickInfo", "Edm.String", false),
            ("Text", "Edm.String", false),
            ("TextArrangement", "UI.TextArrangementType", false),
            ("ValueList", "Common.ValueListType", false),
            ("SemanticObject", "Edm.String", false),
            ("FieldControl", "Common.FieldControlType", false),
            ("IsUpperCase", "Core.Tag", false),
            ("SideEffects", "Common.SideEffectsType", false),
        ],
    ),
    (
        "com.sap.vocabularies.UI.v1",
        "UI",
        SAP,
        "UI.xml",
        &[
            ("LineItem", "UI.DataFieldAbstract", true),
            ("HeaderInfo", "UI.HeaderInfoType", false),
            ("Identification", "UI.DataFieldAbstract", true),
            ("FieldGroup", "UI.FieldGroupType", false),
            ("Facets", "UI.Facet", true),
            ("HeaderFacets", "UI.Facet", true),
            ("SelectionFields", "Edm.PropertyPath", true),
            ("Chart", "UI.ChartDefinitionType", false),
            ("DataPoint", "UI.DataPointType", false),
            ("PresentationVariant", "UI.PresentationVariantType", false),
            ("SelectionVariant", "UI.SelectionVariantType", false),
            ("Hidden", "Core.Tag", false),
            ("HiddenFilter", "Core.Tag", false),
            ("Importance", "UI.ImportanceType", false),
            ("TextArrangement", "UI.TextArrangementType", false),
            ("Criticality", "UI.CriticalityType", false),
        ],
    ),
    (
        "com.sap.vocabularies.Communication.v1",
        "Communication",
        SAP,
        "Communication.xml",
        &[
            ("Contact", "Communication.ContactType", false),
            ("IsEmailAddress", "Core.Tag", false),
            ("IsPhoneNumber", "Core.Tag", false),
        ],
    ),
    (
        "com.sap.vocabularies.Analytics.v1",
        "Analytics",
        SAP,
        "Analytics.xml",
        &[
            ("Dimension", "Core.Tag", false),
            ("Measure", "Core.Tag", false),
        ],
    ),
    (
        "com.sap.vocabularies.PersonalData.v1",
        "PersonalData",
        SAP,
        "PersonalData.xml",
        &[
            ("IsPotentiallyPersonal", "Core.Tag", false),
            ("IsPotentiallySensitive", "Core.Tag", false),
        ],
    ),
    (
        "com.sap.vocabularies.Session.v1",
        "Session",
        SAP,
        "Session.xml",
        &[("StickySessionSupported", "Session.StickySessionSupportedType", false)],
    ),
    (
        "com.sap.vocabularies.HTML5.v1",
        "HTML5",
        SAP,
        "HTML5.xml",
        &[("CssDefaults", "HTML5.CssDefaultsType", false)],
    ),
    (
        "com.sap.vocabularies.CodeList.v1",
        "CodeList",
        SAP,
        "CodeList.xml",
        &[
            ("CurrencyCodes", "CodeList.CodeListSource", false),
            ("UnitsOfMeasure", "CodeList.CodeListSource", false),
        ],
    ),
    (
        "com.sap.vocabularies.Hierarchy.v1",
        "Hierarchy",
        SAP,
        "Hierarchy.xml",
        &[("RecursiveHierarchy", "Hierarchy.RecursiveHierarchyType", false)],
    ),
];

impl Default for VocabularyService {
    fn default() -> Self {
        Self::new()
    }
}

impl VocabularyService {
    /// Create a service with the built-in vocabularies
    pub fn new() -> Self {
        let mut service = Self::empty();
        for (namespace, alias, base, file, terms) in BUILT_IN {
            let terms = terms
                .iter()
                .map(|(name, type_name, collection)| {
                    (
                        (*name).to_string(),
                        TermDefinition {
                            type_name: (*type_name).to_string(),
                            collection: *collection,
                        },
                    )
                })
                .collect();
            service.register(Vocabulary {
                namespace: (*namespace).to_string(),
                default_alias: (*alias).to_string(),
                uri: format!("{base}/{file}"),
                terms,
            });
        }
        service
    }

    /// Create a service without any vocabulary
    pub fn empty() -> Self {
        Self {
            vocabularies: IndexMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register or replace a vocabulary
    pub fn register(&mut self, vocabulary: Vocabulary) {
        self.aliases.insert(
            vocabulary.default_alias.clone(),
            vocabulary.namespace.clone(),
        );
        self.vocabularies
            .insert(vocabulary.namespace.clone(), vocabulary);
    }

    /// Register additional vocabularies from a JSON array
    pub fn extend_from_json(&mut self, json: &str) -> Result<()> {
        let vocabularies: Vec<Vocabulary> = serde_json::from_str(json)
            .map_err(|e| ApiError::config_error(format!("Invalid vocabulary definition: {e}")))?;
        for vocabulary in vocabularies {
            tracing::debug!("Registering vocabulary {}", vocabulary.namespace);
            self.register(vocabulary);
        }
        Ok(())
    }

    pub fn by_namespace(&self, namespace: &str) -> Option<&Vocabulary> {
        self.vocabularies.get(namespace)
    }

    pub fn namespace_for_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Resolve an alias or namespace to a vocabulary
    pub fn resolve(&self, alias_or_namespace: &str) -> Option<&Vocabulary> {
        self.by_namespace(alias_or_namespace).or_else(|| {
            self.namespace_for_alias(alias_or_namespace)
                .and_then(|namespace| self.by_namespace(namespace))
        })
    }

    pub fn is_vocabulary(&self, namespace: &str) -> bool {
        self.vocabularies.contains_key(namespace)
    }

    /// Look up a term by its fully qualified name
    pub fn term(&self, full_name: &str) -> Option<&TermDefinition> {
        let (namespace, name) = full_name.rsplit_once('.')?;
        self.by_namespace(namespace)?.terms.get(name)
    }

    pub fn vocabularies(&self) -> impl Iterator<Item = &Vocabulary> {
        self.vocabularies.values()
    }
}
