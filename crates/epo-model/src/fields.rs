//! Assay type field schemas and custom field values

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed custom-field type taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Text,
    Date,
    Integer,
    Float,
    Boolean,
    Dropdown,
    File,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "STRING",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Dropdown => "DROPDOWN",
            Self::File => "FILE",
        };
        f.write_str(s)
    }
}

/// Declared custom field on an assay type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub name: String,
    pub display_name: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Allowed values for `DROPDOWN` fields
    #[serde(default)]
    pub dropdown_options: Vec<String>,
}

impl CustomFieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            field_type,
            required: false,
            dropdown_options: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dropdown_options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Assay type: the schema assays of this type must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayType {
    pub name: String,
    pub fields: Vec<CustomFieldDef>,
}

impl AssayType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: CustomFieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a declared field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&CustomFieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True when any declared field is `FILE`-typed
    #[must_use]
    pub fn has_file_fields(&self) -> bool {
        self.fields.iter().any(|f| f.field_type == FieldType::File)
    }
}

/// Reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
}

impl FileRef {
    /// File name component of the path
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Custom field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldValue {
    String(String),
    Text(String),
    Date(NaiveDate),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Dropdown(String),
    File(FileRef),
}

impl FieldValue {
    /// Type tag of this value
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Text(_) => FieldType::Text,
            Self::Date(_) => FieldType::Date,
            Self::Integer(_) => FieldType::Integer,
            Self::Float(_) => FieldType::Float,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Dropdown(_) => FieldType::Dropdown,
            Self::File(_) => FieldType::File,
        }
    }

    /// Whether this value may be stored in a field of `expected` type
    ///
    /// Integers are accepted by `FLOAT` fields and plain strings by `TEXT`
    /// and `DROPDOWN` fields; everything else must match exactly.
    #[must_use]
    pub fn conforms_to(&self, expected: FieldType) -> bool {
        match (self, expected) {
            (Self::Integer(_), FieldType::Float) => true,
            (Self::String(_), FieldType::Text | FieldType::Dropdown) => true,
            (value, expected) => value.field_type() == expected,
        }
    }

    /// String payload for dropdown checks
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Text(s) | Self::Dropdown(s) => Some(s),
            _ => None,
        }
    }
}
