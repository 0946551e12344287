// Rust 1.93+ triggers false positives on thiserror/miette derive macro fields
#![allow(unused_assignments)]

//! Keel declaration engine
//!
//! The schema-derivation and evaluation core of a typed declaration
//! language for application manifests. A host type describes its shape
//! once; the engine derives a schema descriptor and a matching evaluator
//! from that description, registers both under a derived name, and turns
//! parsed expression trees into typed values - enforcing required and
//! optional fields, nested references, enums, and lists along the way.
//!
//! # Example
//!
//! ```text
//! volume cache {
//!   size: "2Gi"
//! }
//!
//! service api {
//!   image: "registry.local/api:1.4",
//!   replicas: 3,
//!   restart: onFailure,
//!   data: cache
//! }
//! ```
//!
//! The parser for documents like the one above and the generators that
//! consume evaluated declarations are separate components; this crate owns
//! everything between the parsed expression tree and the typed in-memory
//! declaration.

pub mod ast;
pub mod errors;
pub mod evaluator;
pub mod kind;
pub mod registry;
pub mod schema;
pub mod shape;
pub mod synth;

pub use ast::{Declaration, DictField, ExprNode, ImportSymbol, Span};
pub use errors::{EvalError, EvalResult, SynthResult, SynthesisError};
pub use evaluator::value::{ExtImport, Json, SqlBlock, TypedValue};
pub use evaluator::{eval_kind, Bindings};
pub use kind::{classify, FieldType, Kind, KnownTypes};
pub use registry::{
    decl_name_of, Decl, DeclRegistry, DeclType, DeclValue, EnumType, RegistryBuilder,
};
pub use schema::{DictEntry, SchemaBodyType, SchemaType};
pub use shape::{
    enum_field_type, enum_from_typed, BodyShape, DeclShape, EnumShape, FieldSpec, FieldValue,
    RecordBuilder, RecordShape, Ref, WrappedShape,
};
pub use synth::decl_type_of;
