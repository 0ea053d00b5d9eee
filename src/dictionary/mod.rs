//! CHDO dictionary model.
//!
//! A [Dictionary] describes the layout of every CHDO a station may produce: which numeric
//! type codes exist, how each record is classified, where each named field lives within a
//! record, and which boolean properties are derived from field values. It is built once,
//! validated at construction, and is read-only afterwards, so it can be shared across
//! decoders via [std::sync::Arc].
mod config;

pub use config::{DictionaryConfig, RecordDefinition};

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::bits::{ByteOrder, SignRepr};
use crate::prelude::*;

/// Length of a control authority id anchor token.
pub const ANCHOR_LEN: usize = 4;

/// Control authority ids recognized when a dictionary does not list its own.
pub const DEFAULT_ANCHORS: [&str; 2] = ["NJPL", "CCSD"];

/// Role of a CHDO within an SFDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Zero-length container. Its declared length covers the records that follow it.
    Aggregation,
    Primary,
    Secondary,
    Tertiary,
    Quaternary,
    /// Carries the frame or packet; always the last record of a unit.
    Data,
}

impl Classification {
    #[must_use]
    pub fn is_data(self) -> bool {
        self == Classification::Data
    }

    #[must_use]
    pub fn is_aggregation(self) -> bool {
        self == Classification::Aggregation
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Classification::Aggregation => "aggregation",
            Classification::Primary => "primary",
            Classification::Secondary => "secondary",
            Classification::Tertiary => "tertiary",
            Classification::Quaternary => "quaternary",
            Classification::Data => "data",
        };
        f.write_str(name)
    }
}

/// Encoding of a field's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    UnsignedInt,
    /// Two's complement.
    SignedInt,
    SignMagnitudeInt,
    /// IEEE-754, 32 or 64 bits.
    Float,
    /// MIL-STD-1750A, 32 or 48 bits.
    Mil1750a,
    /// Day segmented time, see [crate::chdo::FieldValue::Date].
    Date,
    Sclk,
    Ascii,
    Flag,
    Binary,
}

impl FieldFormat {
    #[must_use]
    pub fn sign_repr(self) -> SignRepr {
        match self {
            FieldFormat::SignMagnitudeInt => SignRepr::SignMagnitude,
            _ => SignRepr::TwosComplement,
        }
    }
}

/// Valid range annotation for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: String,
    pub max: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Location and encoding of a named field within a CHDO.
///
/// Offsets are relative to the start of the CHDO data, i.e., just after the 4 byte
/// type and length header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct FieldSchema {
    #[builder(setter(into))]
    pub id: String,
    /// Field length in bits. Zero means the field runs to the end of the record.
    #[serde(default)]
    #[builder(default)]
    pub bit_length: usize,
    #[serde(default)]
    #[builder(default)]
    pub byte_offset: usize,
    /// First bit within the byte at `byte_offset`, 0 being the most significant.
    #[serde(default)]
    #[builder(default)]
    pub bit_offset: usize,
    pub format: FieldFormat,
    #[serde(default)]
    #[builder(default)]
    pub byte_order: ByteOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub range: Option<ValueRange>,
    /// Constant value for fields that never vary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(into, strip_option))]
    pub fixed_value: Option<String>,
}

impl FieldSchema {
    /// Absolute bit offset of the field within the CHDO data.
    #[must_use]
    pub fn start_bit(&self) -> usize {
        self.byte_offset * 8 + self.bit_offset
    }
}

/// Layout of a single CHDO type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordDefinition", into = "RecordDefinition")]
pub struct RecordSchema {
    chdo_type: u16,
    name: String,
    classification: Classification,
    byte_size: Option<usize>,
    fields: Vec<FieldSchema>,
    index: HashMap<String, usize>,
}

impl RecordSchema {
    /// # Errors
    /// [Error::Dictionary] if two fields share an id.
    pub fn new(
        chdo_type: u16,
        name: impl Into<String>,
        classification: Classification,
        byte_size: Option<usize>,
        fields: Vec<FieldSchema>,
    ) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if index.insert(field.id.clone(), idx).is_some() {
                return Err(Error::Dictionary(format!(
                    "duplicate field \"{}\" in CHDO {chdo_type} ({name})",
                    field.id
                )));
            }
        }
        Ok(RecordSchema {
            chdo_type,
            name,
            classification,
            byte_size,
            fields,
            index,
        })
    }

    #[must_use]
    pub fn chdo_type(&self) -> u16 {
        self.chdo_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Fixed data size in bytes, if the dictionary declares one.
    #[must_use]
    pub fn byte_size(&self) -> Option<usize> {
        self.byte_size
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.index.get(id).map(|&idx| &self.fields[idx])
    }

    #[must_use]
    pub fn has_field(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Fields in definition order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter()
    }
}

/// A single `field == value` (or `!=`) test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualityClause {
    pub field: String,
    pub value: String,
    /// `true` for equals, `false` for not-equals.
    #[serde(default = "default_equal")]
    pub equal: bool,
}

fn default_equal() -> bool {
    true
}

impl EqualityClause {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        EqualityClause {
            field: field.into(),
            value: value.into(),
            equal: true,
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        EqualityClause {
            field: field.into(),
            value: value.into(),
            equal: false,
        }
    }
}

/// Clauses against one CHDO type, all of which must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub chdo_type: u16,
    #[serde(default)]
    pub clauses: Vec<EqualityClause>,
}

impl Condition {
    #[must_use]
    pub fn new(chdo_type: u16, clauses: Vec<EqualityClause>) -> Self {
        Condition { chdo_type, clauses }
    }
}

/// Named boolean derived from decoded fields; true if any condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Property {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Property {
            name: name.into(),
            conditions,
        }
    }
}

/// Immutable CHDO dictionary.
///
/// # Example
/// ```
/// use sfdu::dictionary::{
///     Classification, Condition, Dictionary, DictionaryConfig, EqualityClause, FieldFormat,
///     FieldSchema, Property, RecordSchema,
/// };
///
/// let primary = RecordSchema::new(
///     2,
///     "primary",
///     Classification::Primary,
///     Some(4),
///     vec![FieldSchema::builder()
///         .id("major")
///         .bit_length(8)
///         .format(FieldFormat::UnsignedInt)
///         .build()],
/// )
/// .unwrap();
/// let config = DictionaryConfig::builder()
///     .records(vec![primary])
///     .properties(vec![Property::new(
///         "isFrame",
///         vec![Condition::new(2, vec![EqualityClause::equals("major", "6")])],
///     )])
///     .build();
/// let dict = Dictionary::new(config).unwrap();
/// assert_eq!(dict.schema(2).unwrap().name(), "primary");
/// assert!(dict.property("isFrame").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Dictionary {
    anchors: Vec<[u8; ANCHOR_LEN]>,
    schemas: HashMap<u16, RecordSchema>,
    properties: HashMap<String, Property>,
}

impl Dictionary {
    /// Validate and build a dictionary.
    ///
    /// # Errors
    /// [Error::Dictionary] if there are no anchors, an anchor is not exactly 4 bytes, a CHDO
    /// type or property name is defined more than once, or a condition references a CHDO
    /// type that is not defined.
    pub fn new(config: DictionaryConfig) -> Result<Self> {
        if config.anchors.is_empty() {
            return Err(Error::Dictionary(
                "at least one control authority id is required".to_string(),
            ));
        }
        let mut anchors = Vec::with_capacity(config.anchors.len());
        for anchor in &config.anchors {
            let token: [u8; ANCHOR_LEN] = anchor.as_bytes().try_into().map_err(|_| {
                Error::Dictionary(format!(
                    "control authority id \"{anchor}\" must be {ANCHOR_LEN} bytes"
                ))
            })?;
            anchors.push(token);
        }

        let mut schemas = HashMap::with_capacity(config.records.len());
        for schema in config.records {
            let chdo_type = schema.chdo_type();
            if schemas.insert(chdo_type, schema).is_some() {
                return Err(Error::Dictionary(format!(
                    "CHDO type {chdo_type} is defined more than once"
                )));
            }
        }

        let mut properties = HashMap::with_capacity(config.properties.len());
        let mut seen = HashSet::new();
        for property in config.properties {
            if !seen.insert(property.name.clone()) {
                return Err(Error::Dictionary(format!(
                    "property \"{}\" is defined more than once",
                    property.name
                )));
            }
            for cond in &property.conditions {
                if !schemas.contains_key(&cond.chdo_type) {
                    return Err(Error::Dictionary(format!(
                        "property \"{}\" references undefined CHDO type {}",
                        property.name, cond.chdo_type
                    )));
                }
            }
            properties.insert(property.name.clone(), property);
        }

        debug!(
            records = schemas.len(),
            properties = properties.len(),
            "loaded CHDO dictionary"
        );

        Ok(Dictionary {
            anchors,
            schemas,
            properties,
        })
    }

    /// Load a JSON dictionary document.
    ///
    /// # Errors
    /// [Error::Json] if the document cannot be deserialized, otherwise as
    /// [Dictionary::new].
    pub fn from_json(doc: &str) -> Result<Self> {
        let config: DictionaryConfig = serde_json::from_str(doc)?;
        Self::new(config)
    }

    /// Load a JSON dictionary document from a file.
    ///
    /// # Errors
    /// [Error::Io] if the file cannot be read, otherwise as [Dictionary::from_json].
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: DictionaryConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        Self::new(config)
    }

    #[must_use]
    pub fn schema(&self, chdo_type: u16) -> Option<&RecordSchema> {
        self.schemas.get(&chdo_type)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Recognized control authority ids, in configured order.
    #[must_use]
    pub fn anchors(&self) -> &[[u8; ANCHOR_LEN]] {
        &self.anchors
    }

    #[must_use]
    pub fn is_anchor(&self, window: &[u8]) -> bool {
        self.anchors.iter().any(|a| a[..] == *window)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }
}
