//! Metadata structs used by watch payloads
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type information that is flattened into every kubernetes object
#[derive(Deserialize, Serialize, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// The version of the API
    pub api_version: String,

    /// The name of the API
    pub kind: String,
}

/// The subset of object metadata a watch consumer relies on
///
/// Every field is optional; bookmark payloads in particular carry nothing
/// beyond `resource_version`.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// The unique name of this object within its namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The namespace the object lives in, for namespaced resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Unique id assigned by the apiserver for the lifetime of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// An opaque value for tracking changes to this object
    ///
    /// This is the cursor a watch resumes from after a disconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// An untyped api object with the minimal metadata needed to follow a watch
///
/// Useful as the payload type when no concrete model type is at hand; all
/// non-metadata fields are retained in `data`.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,

    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: Value,
}

/// Read `metadata.resourceVersion` out of a raw api object.
///
/// Unknown shapes yield `None`; empty versions are treated as unset.
pub(crate) fn resource_version(object: &Value) -> Option<String> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .filter(|version| !version.is_empty())
        .map(String::from)
}
