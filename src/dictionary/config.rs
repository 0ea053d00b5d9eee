//! Serialized form of a [Dictionary](super::Dictionary).
//!
//! ```json
//! {
//!   "anchors": ["NJPL", "CCSD"],
//!   "records": [
//!     {
//!       "type": 2,
//!       "name": "primary",
//!       "classification": "primary",
//!       "byte_size": 4,
//!       "fields": [
//!         {"id": "major", "bit_length": 8, "byte_offset": 1, "format": "unsigned_int"}
//!       ]
//!     }
//!   ],
//!   "properties": [
//!     {"name": "isFrame", "conditions": [
//!       {"chdo_type": 2, "clauses": [{"field": "major", "value": "6"}]}
//!     ]}
//!   ]
//! }
//! ```
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{Classification, FieldSchema, Property, RecordSchema, DEFAULT_ANCHORS};
use crate::prelude::*;

fn default_anchors() -> Vec<String> {
    DEFAULT_ANCHORS.iter().map(ToString::to_string).collect()
}

/// Unvalidated dictionary contents. See [super::Dictionary::new].
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct DictionaryConfig {
    #[serde(default = "default_anchors")]
    #[builder(default = default_anchors())]
    pub anchors: Vec<String>,
    #[serde(default)]
    #[builder(default)]
    pub records: Vec<RecordSchema>,
    #[serde(default)]
    #[builder(default)]
    pub properties: Vec<Property>,
}

/// Serialized form of a [RecordSchema].
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct RecordDefinition {
    #[serde(rename = "type")]
    pub chdo_type: u16,
    #[builder(setter(into))]
    pub name: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub byte_size: Option<usize>,
    #[serde(default)]
    #[builder(default)]
    pub fields: Vec<FieldSchema>,
}

impl RecordDefinition {
    /// # Errors
    /// See [RecordSchema::new].
    pub fn schema(self) -> Result<RecordSchema> {
        RecordSchema::new(
            self.chdo_type,
            self.name,
            self.classification,
            self.byte_size,
            self.fields,
        )
    }
}

impl TryFrom<RecordDefinition> for RecordSchema {
    type Error = Error;

    fn try_from(value: RecordDefinition) -> Result<Self> {
        value.schema()
    }
}

impl From<RecordSchema> for RecordDefinition {
    fn from(value: RecordSchema) -> Self {
        RecordDefinition {
            chdo_type: value.chdo_type(),
            name: value.name().to_string(),
            classification: value.classification(),
            byte_size: value.byte_size(),
            fields: value.fields().cloned().collect(),
        }
    }
}
