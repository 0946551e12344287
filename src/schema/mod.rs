//! Schema descriptors attached to declaration types
//!
//! A declaration type's schema is either a direct value type (wrapped
//! shapes) or a dict of named entries (record shapes). Descriptors are
//! plain data: built once at registration time, serializable for
//! downstream tooling, and never mutated afterwards.

use std::fmt;

use serde::Serialize;

use crate::errors::OptionalNotLowerable;
use crate::kind::Kind;

/// Schema-level representation of a field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaType {
    String,
    Int,
    Double,
    Bool,
    List(Box<SchemaType>),
    ExtImport,
    Json,
    Quoted(&'static str),
    /// Reference-by-name to another declaration type
    DeclRef(String),
    /// Reference-by-name to an enum type
    EnumRef(String),
}

impl SchemaType {
    /// Lower a classified kind to its schema-level representation
    ///
    /// `Optional` has no schema representation: record synthesis strips the
    /// one legal outermost optional before lowering, so an optional
    /// reaching this point is a misplaced one. This is the single
    /// enforcement point for the optional-placement invariant, and it also
    /// catches `List(Optional)` and `Optional(Optional)` nesting.
    pub fn of(kind: &Kind) -> Result<SchemaType, OptionalNotLowerable> {
        match kind {
            Kind::String => Ok(SchemaType::String),
            Kind::Integer => Ok(SchemaType::Int),
            Kind::Double => Ok(SchemaType::Double),
            Kind::Bool => Ok(SchemaType::Bool),
            Kind::List(inner) => Ok(SchemaType::List(Box::new(SchemaType::of(inner)?))),
            Kind::Optional(_) => Err(OptionalNotLowerable),
            Kind::ExternalImport => Ok(SchemaType::ExtImport),
            Kind::JsonBlob => Ok(SchemaType::Json),
            Kind::QuotedBlock(tag) => Ok(SchemaType::Quoted(tag)),
            Kind::DeclRef(name) => Ok(SchemaType::DeclRef(name.clone())),
            Kind::EnumRef(name) => Ok(SchemaType::EnumRef(name.clone())),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::String => write!(f, "string"),
            SchemaType::Int => write!(f, "int"),
            SchemaType::Double => write!(f, "double"),
            SchemaType::Bool => write!(f, "bool"),
            SchemaType::List(inner) => write!(f, "list<{}>", inner),
            SchemaType::ExtImport => write!(f, "import"),
            SchemaType::Json => write!(f, "json block"),
            SchemaType::Quoted(tag) => write!(f, "{} block", tag),
            SchemaType::DeclRef(name) => write!(f, "reference to {}", name),
            SchemaType::EnumRef(name) => write!(f, "{}", name),
        }
    }
}

/// Body shape of a declaration type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaBodyType {
    /// A single direct value (wrapped shape)
    Value(SchemaType),
    /// Named entries (record shape), in host field declaration order
    Dict(Vec<DictEntry>),
}

/// One named entry in a dict body
///
/// Order is significant: it matches the host constructor's field order,
/// which is what positional construction during evaluation relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictEntry {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub required: bool,
}
