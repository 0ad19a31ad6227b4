#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod constraint;
mod error;
mod form;
mod label;
mod model;
mod populate;
mod property;
mod shape;
mod store;
mod validate;
pub mod vocab;

pub use config::{
    Config, DEFAULT_BASE, DEFAULT_GRAPH_BOUNDARY, DEFAULT_INPUT_SHAPE, DEFAULT_NAME_SUBSTITUTE,
    FieldMode, UnknownFieldMode,
};
pub use constraint::{Coerced, Coercion, ConstraintKind};
pub use error::{ShapeError, StoreError};
pub use form::{FieldDescriptor, FieldOption, form_requirements};
pub use label::{EntityDictionary, EntityLabel};
pub use model::{
    NodeKind, NodeKindWarning, PropertyDescriptor, PropertyGroup, ScalarValue, Severity, Shape,
    local_name,
};
pub use populate::{MAX_DEPTH, PopulateOutcome, populate, validate_and_populate};
pub use property::{resolve_property, resolve_property_with};
pub use shape::{resolve_shape, resolve_shape_set, shape_for_class, shape_set_labels};
pub use store::{MemoryStore, SharedStore, TripleStore};
pub use validate::{ConstraintReport, ConstraintViolation, ValidationOutcome, validate_constraints};
