use crate::validation::{CustomValidators, FieldValidator};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Raw model definition, as written in a model YAML file or built in code.
/// Becomes a [`Model`](super::Model) once it passes `validate_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDefinition {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Declare a field. Redeclaring a name replaces the earlier definition.
    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.insert(name.into(), definition);
        self
    }

    /// Attach a custom validator to an already declared field. Custom
    /// validators run after the built-in constraints, in the order added.
    pub fn add_validator<V>(&mut self, field: &str, validator: V) -> crate::Result<()>
    where
        V: FieldValidator + 'static,
    {
        let definition = self.fields.get_mut(field).ok_or_else(|| {
            crate::ShelfDbError::UnknownField {
                field: field.to_string(),
            }
        })?;
        definition.custom_validators.push(Rc::new(validator));
        Ok(())
    }
}

/// Constraints declared on a single field. Every constraint is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub max: Option<Value>,
    #[serde(default)]
    pub min: Option<Value>,
    #[serde(default)]
    pub foreign_key: Option<ForeignKey>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(skip)]
    pub custom_validators: CustomValidators,
}

impl FieldDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn max(mut self, max: impl Into<Value>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn min(mut self, min: impl Into<Value>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Resolve this field at read time against the records of the referenced
    /// collection whose `join_key` equals this record's primary key.
    pub fn foreign_key(mut self, join_key: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            join_key: join_key.into(),
        });
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn validator<V: FieldValidator + 'static>(mut self, validator: V) -> Self {
        self.custom_validators.push(Rc::new(validator));
        self
    }
}

/// Join configuration of a foreign-key field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignKey {
    pub join_key: String,
}

/// Runtime type a field value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int,
    Float,
    /// Either an int or a float
    Number,
    String,
    List,
    Map,
    /// `YYYY-MM-DD` string
    Date,
    /// RFC 3339 string
    Datetime,
    Collection,
}

impl DataType {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (DataType::Bool, Value::Bool(_)) => true,
            (DataType::Int, Value::Int(_)) => true,
            (DataType::Float, Value::Float(_)) => true,
            (DataType::Number, Value::Int(_) | Value::Float(_)) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::List, Value::List(_)) => true,
            (DataType::Map, Value::Map(_)) => true,
            (DataType::Date, Value::String(s)) => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            (DataType::Datetime, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (DataType::Collection, Value::Collection(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::List => "list",
            DataType::Map => "map",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
            DataType::Collection => "collection",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
