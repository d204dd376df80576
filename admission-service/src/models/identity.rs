use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One language-tagged value of a stored identity attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    pub language: Option<String>,
    pub value: Option<String>,
}

/// Stored identity attributes keyed by attribute name (e.g. `fullName`).
pub type IdentityData = BTreeMap<String, Vec<IdentityInfo>>;

/// Free-form context handed to plugin filters.
pub type FilterProperties = BTreeMap<String, Value>;
