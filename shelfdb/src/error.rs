use crate::value::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfDbError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Unknown field: {field} is not declared in the model")]
    UnknownField { field: String },

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("Foreign key error on '{field}': {reason}")]
    ForeignKey { field: String, reason: String },

    #[error("Constraint '{constraint}' on '{field}' cannot apply to a {actual} value")]
    IncompatibleConstraint {
        field: String,
        constraint: &'static str,
        actual: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ShelfDbError {
    /// True for data-validation failures the caller can recover from.
    /// Model, foreign-key and incompatible-constraint errors are programming errors.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, ShelfDbError::Constraint(_))
    }

    pub fn violation(&self) -> Option<&ConstraintViolation> {
        match self {
            ShelfDbError::Constraint(v) => Some(v),
            _ => None,
        }
    }
}

/// A record broke one of the constraints declared on its model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    #[error("the unique constraint has been violated ({field} -> {value})")]
    NonUniqueValue { field: String, value: Value },

    #[error("primary key '{field}' must be unique, {value} is already taken")]
    PrimaryKeyViolation { field: String, value: Value },

    #[error("{field} is not allowed to be null")]
    Nullability { field: String },

    #[error("{field} contains {value}, which is not one of {allowed:?}")]
    InvalidChoice {
        field: String,
        value: Value,
        allowed: Vec<Value>,
    },

    #[error("the value of {field} ({value}) exceeds the maximum length of {bound}")]
    MaxLength {
        field: String,
        value: Value,
        bound: usize,
    },

    #[error("the value of {field} ({value}) is bigger than the allowed maximum {bound}")]
    MaxValue {
        field: String,
        value: Value,
        bound: Value,
    },

    #[error("the value of {field} ({value}) is smaller than the allowed minimum {bound}")]
    MinValue {
        field: String,
        value: Value,
        bound: Value,
    },

    #[error("{field} expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },

    #[error("the field {field} is required but missing")]
    MissingRequiredField { field: String },

    #[error("record has no value for primary key '{field}'")]
    MissingPrimaryKey { field: String },

    #[error("{field}: {message}")]
    Custom { field: String, message: String },
}

impl ConstraintViolation {
    /// Name of the field that failed.
    pub fn field(&self) -> &str {
        match self {
            ConstraintViolation::NonUniqueValue { field, .. }
            | ConstraintViolation::PrimaryKeyViolation { field, .. }
            | ConstraintViolation::Nullability { field }
            | ConstraintViolation::InvalidChoice { field, .. }
            | ConstraintViolation::MaxLength { field, .. }
            | ConstraintViolation::MaxValue { field, .. }
            | ConstraintViolation::MinValue { field, .. }
            | ConstraintViolation::TypeMismatch { field, .. }
            | ConstraintViolation::MissingRequiredField { field }
            | ConstraintViolation::MissingPrimaryKey { field }
            | ConstraintViolation::Custom { field, .. } => field,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShelfDbError>;
