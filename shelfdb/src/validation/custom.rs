use crate::error::{ConstraintViolation, Result, ShelfDbError};
use crate::store::Collection;
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::rc::Rc;

/// A user-supplied check attached to a field. Runs after every built-in
/// constraint of that field, in the order the validators were attached.
pub trait FieldValidator {
    fn validate(&self, collection: &Collection, field: &str, value: &Value) -> Result<()>;
}

/// Plain closures work as validators; an `Err(message)` becomes
/// `ConstraintViolation::Custom`.
impl<F> FieldValidator for F
where
    F: Fn(&Value) -> std::result::Result<(), String>,
{
    fn validate(&self, _collection: &Collection, field: &str, value: &Value) -> Result<()> {
        self(value).map_err(|message| {
            ConstraintViolation::Custom {
                field: field.to_string(),
                message,
            }
            .into()
        })
    }
}

/// Ordered list of custom validators on a field
#[derive(Clone, Default)]
pub struct CustomValidators(Vec<Rc<dyn FieldValidator>>);

impl CustomValidators {
    pub fn push(&mut self, validator: Rc<dyn FieldValidator>) {
        self.0.push(validator);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn FieldValidator>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CustomValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValidators({})", self.0.len())
    }
}

/// String values must match a regular expression.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    regex: Regex,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ShelfDbError::Model(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(PatternValidator { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl FieldValidator for PatternValidator {
    fn validate(&self, _collection: &Collection, field: &str, value: &Value) -> Result<()> {
        let Some(s) = value.as_str() else {
            return Err(ConstraintViolation::TypeMismatch {
                field: field.to_string(),
                expected: format!("string matching /{}/", self.pattern()),
                actual: value.type_name(),
            }
            .into());
        };

        if !self.regex.is_match(s) {
            return Err(ConstraintViolation::Custom {
                field: field.to_string(),
                message: format!("'{s}' does not match /{}/", self.pattern()),
            }
            .into());
        }
        Ok(())
    }
}
