pub mod error;
pub mod schema;
pub mod storage;
pub mod store;
pub mod validation;
pub mod value;
pub mod view;

pub use error::{ConstraintViolation, Result, ShelfDbError};
pub use schema::{
    load_model, parse_model, parse_model_str, validate_model, DataType, FieldDefinition,
    ForeignKey, Model, ModelDefinition,
};
pub use store::{Collection, CollectionHandle, CollectionRef, UpdateOutcome};
pub use validation::{FieldValidator, PatternValidator};
pub use value::{Record, Value};
pub use view::{ops, ReadMode};
