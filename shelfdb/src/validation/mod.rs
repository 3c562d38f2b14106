mod custom;

pub use custom::{CustomValidators, FieldValidator, PatternValidator};

use crate::error::{ConstraintViolation, Result, ShelfDbError};
use crate::schema::{DataType, FieldDefinition, ForeignKey, Model};
use crate::store::Collection;
use crate::value::{Record, Value};
use std::cmp::Ordering;

/// Where a candidate record is being validated. `exclude` names the storage
/// slot of the record being replaced by an update, so it is not compared
/// against itself by the uniqueness checks.
#[derive(Clone, Copy)]
pub(crate) struct ValidationContext<'a> {
    pub collection: &'a Collection,
    pub exclude: Option<usize>,
}

/// Built-in constraint kinds, each carrying its declared payload.
#[derive(Debug, Clone, Copy)]
pub enum Constraint<'a> {
    Unique,
    PrimaryKey,
    Nullable(bool),
    Choices(&'a [Value]),
    DataType(DataType),
    MaxLength(usize),
    Max(&'a Value),
    Min(&'a Value),
    ForeignKey(&'a ForeignKey),
}

impl<'a> Constraint<'a> {
    /// Built-in constraints declared on a field, in evaluation order:
    /// unique, primary_key, nullable, choices, data_type, max_length, max,
    /// min, foreign_key.
    pub fn declared(field: &'a FieldDefinition) -> Vec<Constraint<'a>> {
        let mut constraints = Vec::new();
        if field.unique {
            constraints.push(Constraint::Unique);
        }
        if field.primary_key {
            constraints.push(Constraint::PrimaryKey);
        }
        if let Some(nullable) = field.nullable {
            constraints.push(Constraint::Nullable(nullable));
        }
        if let Some(choices) = &field.choices {
            constraints.push(Constraint::Choices(choices));
        }
        if let Some(data_type) = field.data_type {
            constraints.push(Constraint::DataType(data_type));
        }
        if let Some(max_length) = field.max_length {
            constraints.push(Constraint::MaxLength(max_length));
        }
        if let Some(max) = &field.max {
            constraints.push(Constraint::Max(max));
        }
        if let Some(min) = &field.min {
            constraints.push(Constraint::Min(min));
        }
        if let Some(fk) = &field.foreign_key {
            constraints.push(Constraint::ForeignKey(fk));
        }
        constraints
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Unique => "unique",
            Constraint::PrimaryKey => "primary_key",
            Constraint::Nullable(_) => "nullable",
            Constraint::Choices(_) => "choices",
            Constraint::DataType(_) => "data_type",
            Constraint::MaxLength(_) => "max_length",
            Constraint::Max(_) => "max",
            Constraint::Min(_) => "min",
            Constraint::ForeignKey(_) => "foreign_key",
        }
    }

    /// Length, bound and foreign-key checks have nothing to measure on a null.
    /// They are skipped for it only on fields that explicitly allow nulls.
    /// Choices and data_type always see the value.
    fn skips_null(&self, field: &FieldDefinition) -> bool {
        field.nullable == Some(true)
            && matches!(
                self,
                Constraint::MaxLength(_)
                    | Constraint::Max(_)
                    | Constraint::Min(_)
                    | Constraint::ForeignKey(_)
            )
    }

    pub(crate) fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        field: &str,
        value: &Value,
    ) -> Result<()> {
        match self {
            Constraint::Unique => check_unique(ctx, field, value),
            Constraint::PrimaryKey => {
                // Same scan as unique, reported under its own identity.
                check_unique(ctx, field, value).map_err(|err| match err {
                    ShelfDbError::Constraint(ConstraintViolation::NonUniqueValue {
                        field,
                        value,
                    }) => ConstraintViolation::PrimaryKeyViolation { field, value }.into(),
                    other => other,
                })
            }
            Constraint::Nullable(nullable) => {
                if !nullable && value.is_null() {
                    return Err(ConstraintViolation::Nullability {
                        field: field.to_string(),
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::Choices(choices) => {
                if !choices.contains(value) {
                    return Err(ConstraintViolation::InvalidChoice {
                        field: field.to_string(),
                        value: value.clone(),
                        allowed: choices.to_vec(),
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::DataType(data_type) => {
                if !data_type.accepts(value) {
                    return Err(ConstraintViolation::TypeMismatch {
                        field: field.to_string(),
                        expected: data_type.to_string(),
                        actual: value.type_name(),
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::MaxLength(bound) => {
                let length = value.length().ok_or_else(|| self.incompatible(field, value))?;
                if length > *bound {
                    return Err(ConstraintViolation::MaxLength {
                        field: field.to_string(),
                        value: value.clone(),
                        bound: *bound,
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::Max(bound) => {
                let ordering = value
                    .compare(bound)
                    .ok_or_else(|| self.incompatible(field, value))?;
                if ordering == Ordering::Greater {
                    return Err(ConstraintViolation::MaxValue {
                        field: field.to_string(),
                        value: value.clone(),
                        bound: (*bound).clone(),
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::Min(bound) => {
                let ordering = value
                    .compare(bound)
                    .ok_or_else(|| self.incompatible(field, value))?;
                if ordering == Ordering::Less {
                    return Err(ConstraintViolation::MinValue {
                        field: field.to_string(),
                        value: value.clone(),
                        bound: (*bound).clone(),
                    }
                    .into());
                }
                Ok(())
            }
            Constraint::ForeignKey(fk) => check_foreign_key(fk, field, value),
        }
    }

    fn incompatible(&self, field: &str, value: &Value) -> ShelfDbError {
        ShelfDbError::IncompatibleConstraint {
            field: field.to_string(),
            constraint: self.name(),
            actual: value.type_name(),
        }
    }
}

fn check_unique(ctx: &ValidationContext<'_>, field: &str, value: &Value) -> Result<()> {
    let taken = ctx
        .collection
        .records()
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != ctx.exclude)
        .any(|(_, record)| record.get(field) == Some(value));

    if taken {
        return Err(ConstraintViolation::NonUniqueValue {
            field: field.to_string(),
            value: value.clone(),
        }
        .into());
    }
    Ok(())
}

/// Only the wiring is checked on write: the value is a live collection handle
/// whose model declares the join key. The join itself happens on read.
fn check_foreign_key(fk: &ForeignKey, field: &str, value: &Value) -> Result<()> {
    let fk_error = |reason: String| ShelfDbError::ForeignKey {
        field: field.to_string(),
        reason,
    };

    let handle = value.as_collection().ok_or_else(|| {
        fk_error(format!("expected a collection handle, got {}", value.type_name()))
    })?;

    if !handle.is_alive() {
        return Err(fk_error(format!(
            "referenced collection '{}' no longer exists",
            handle.name()
        )));
    }

    if !handle.model().contains(&fk.join_key) {
        return Err(fk_error(format!(
            "referenced collection '{}' has no field '{}'",
            handle.name(),
            fk.join_key
        )));
    }
    Ok(())
}

/// Every field marked `required` must be present in the record.
/// Fails on the first missing one, in model declaration order.
pub fn check_required(model: &Model, record: &Record) -> Result<()> {
    for (name, field) in model.fields() {
        if field.required && !record.contains_key(name) {
            return Err(ConstraintViolation::MissingRequiredField {
                field: name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Run the full validation pipeline over a candidate record.
///
/// Fields are visited in the record's key order. For each field: reject it if
/// the model does not declare it, run its built-in constraints, then its
/// custom validators. The record-level required check runs once, right after
/// the built-ins of the first field. Finally the primary key must be present
/// unless it is auto-incremented.
pub(crate) fn validate_record(ctx: &ValidationContext<'_>, record: &Record) -> Result<()> {
    let model = ctx.collection.model();
    let mut required_checked = false;

    for (name, value) in record {
        let field = model.require_field(name)?;

        for constraint in Constraint::declared(field) {
            if value.is_null() && constraint.skips_null(field) {
                continue;
            }
            constraint.validate(ctx, name, value)?;
        }

        if !required_checked {
            check_required(model, record)?;
            required_checked = true;
        }

        for validator in field.custom_validators.iter() {
            validator.validate(ctx.collection, name, value)?;
        }
    }

    if !required_checked {
        check_required(model, record)?;
    }

    let primary_key = model.primary_key();
    if !record.contains_key(primary_key) && !model.primary_key_definition().auto_increment {
        return Err(ConstraintViolation::MissingPrimaryKey {
            field: primary_key.to_string(),
        }
        .into());
    }

    Ok(())
}
