mod types;

pub use types::{DataType, FieldDefinition, ForeignKey, ModelDefinition};

use crate::error::{Result, ShelfDbError};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::path::Path;

/// A validated model: a definition known to carry exactly one primary key
/// and a well-formed constraint set. Immutable once built.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    fields: IndexMap<String, FieldDefinition>,
    primary_key: String,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, FieldDefinition> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Name of the primary-key field
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn primary_key_definition(&self) -> &FieldDefinition {
        &self.fields[self.primary_key.as_str()]
    }

    /// Fail with `UnknownField` unless `name` is declared.
    pub fn require_field(&self, name: &str) -> Result<&FieldDefinition> {
        self.fields.get(name).ok_or_else(|| ShelfDbError::UnknownField {
            field: name.to_string(),
        })
    }
}

/// Parse a model definition from YAML. The `name` key may be left out, in
/// which case the name stays blank until the caller sets it.
pub fn parse_model_str(content: &str) -> Result<ModelDefinition> {
    Ok(serde_yaml::from_str(content)?)
}

/// Parse a model file. A file without a `name` key is named after its file
/// stem, so `models/staff.yaml` defines `staff`.
pub fn parse_model(path: &Path) -> Result<ModelDefinition> {
    let content = std::fs::read_to_string(path)?;
    let mut definition = parse_model_str(&content)?;

    if definition.name.trim().is_empty() {
        definition.name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ShelfDbError::Model(format!(
                    "cannot name the model in {}: no name key and no usable file stem",
                    path.display()
                ))
            })?;
    }

    log::debug!(
        "parsed model '{}' ({} fields) from {}",
        definition.name,
        definition.fields.len(),
        path.display()
    );
    Ok(definition)
}

/// Parse and validate a model file in one step.
pub fn load_model(path: &Path) -> Result<Model> {
    validate_model(parse_model(path)?)
}

/// Check a raw definition and turn it into a [`Model`]. The field map is kept
/// exactly as declared.
pub fn validate_model(definition: ModelDefinition) -> Result<Model> {
    if definition.name.trim().is_empty() {
        return Err(ShelfDbError::Model("model name must not be blank".to_string()));
    }

    let primary_keys: Vec<&String> = definition
        .fields
        .iter()
        .filter(|(_, field)| field.primary_key)
        .map(|(name, _)| name)
        .collect();

    let primary_key = match primary_keys.as_slice() {
        [] => {
            return Err(ShelfDbError::Model(format!(
                "model '{}' is missing a primary key",
                definition.name
            )))
        }
        [single] => (*single).clone(),
        many => {
            let names: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
            return Err(ShelfDbError::Model(format!(
                "model '{}' declares more than one primary key: {}",
                definition.name,
                names.join(", ")
            )));
        }
    };

    for (name, field) in &definition.fields {
        validate_field(&definition.name, name, field)?;
    }

    Ok(Model {
        name: definition.name,
        fields: definition.fields,
        primary_key,
    })
}

fn validate_field(model: &str, name: &str, field: &FieldDefinition) -> Result<()> {
    if let Some(choices) = &field.choices {
        if choices.is_empty() {
            return Err(ShelfDbError::Model(format!(
                "field '{model}.{name}' declares an empty choices list"
            )));
        }
    }

    if let (Some(min), Some(max)) = (&field.min, &field.max) {
        match min.compare(max) {
            Some(Ordering::Greater) => {
                return Err(ShelfDbError::Model(format!(
                    "field '{model}.{name}' has min {min} greater than max {max}"
                )));
            }
            None => {
                return Err(ShelfDbError::Model(format!(
                    "field '{model}.{name}' has bounds that cannot be compared ({min}, {max})"
                )));
            }
            _ => {}
        }
    }

    if let Some(fk) = &field.foreign_key {
        if fk.join_key.trim().is_empty() {
            return Err(ShelfDbError::Model(format!(
                "field '{model}.{name}' declares a foreign key without a join key"
            )));
        }
    }

    Ok(())
}
