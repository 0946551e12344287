//! Field-kind classification
//!
//! [`classify`] maps the structural description of a host field type to one
//! semantic [`Kind`]. The rules are ordered and the first match wins:
//! reference wrappers around registered declaration types, then registered
//! enum types, then the fixed primitive table, then lists, then optionals.
//! Classification only inspects type structure and the already-populated
//! name tables; it never mutates anything.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::ClassifyError;

/// Structural description of a host field type, as written in a shape
/// descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A named Rust type: a primitive, a marker type, or a registered
    /// declaration/enum type
    Named(&'static str),
    /// `Ref<T>` - a reference wrapper around a declaration type
    Ref(Box<FieldType>),
    /// `Vec<T>`
    List(Box<FieldType>),
    /// `Option<T>`
    Optional(Box<FieldType>),
}

impl FieldType {
    /// Rendering used in build-time error messages
    pub fn describe(&self) -> String {
        match self {
            FieldType::Named(name) => (*name).to_string(),
            FieldType::Ref(inner) => format!("Ref<{}>", inner.describe()),
            FieldType::List(inner) => format!("Vec<{}>", inner.describe()),
            FieldType::Optional(inner) => format!("Option<{}>", inner.describe()),
        }
    }
}

/// Semantic kind of a field value
///
/// Selects both the schema lowering and the primitive evaluator; every
/// consumer matches exhaustively, so adding a kind forces the classifier,
/// the lowering, and the evaluator selection to be extended together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    String,
    Integer,
    Double,
    Bool,
    List(Box<Kind>),
    Optional(Box<Kind>),
    ExternalImport,
    JsonBlob,
    QuotedBlock(&'static str),
    DeclRef(String),
    EnumRef(String),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::String => write!(f, "string"),
            Kind::Integer => write!(f, "int"),
            Kind::Double => write!(f, "double"),
            Kind::Bool => write!(f, "bool"),
            Kind::List(inner) => write!(f, "list<{}>", inner),
            Kind::Optional(inner) => write!(f, "optional<{}>", inner),
            Kind::ExternalImport => write!(f, "import"),
            Kind::JsonBlob => write!(f, "json block"),
            Kind::QuotedBlock(tag) => write!(f, "{} block", tag),
            Kind::DeclRef(name) => write!(f, "reference to {}", name),
            Kind::EnumRef(name) => write!(f, "{} label", name),
        }
    }
}

/// Name tables consulted during classification: host type name mapped to
/// the derived registry name
///
/// Populated in full before any schema is synthesized, so declaration
/// types may reference each other regardless of registration order.
#[derive(Debug, Clone, Default)]
pub struct KnownTypes {
    decls: IndexMap<&'static str, String>,
    enums: IndexMap<&'static str, String>,
}

impl KnownTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_decl(&mut self, host_type: &'static str, name: String) {
        self.decls.insert(host_type, name);
    }

    pub fn add_enum(&mut self, host_type: &'static str, name: String) {
        self.enums.insert(host_type, name);
    }

    /// Derived declaration name for a host type, if registered
    pub fn decl_name(&self, host_type: &str) -> Option<&str> {
        self.decls.get(host_type).map(String::as_str)
    }

    /// Derived enum name for a host type, if registered
    pub fn enum_name(&self, host_type: &str) -> Option<&str> {
        self.enums.get(host_type).map(String::as_str)
    }
}

/// Fixed primitive table (rule 3)
fn primitive(name: &str) -> Option<Kind> {
    match name {
        "String" => Some(Kind::String),
        "i64" => Some(Kind::Integer),
        "f64" => Some(Kind::Double),
        "bool" => Some(Kind::Bool),
        "ExtImport" => Some(Kind::ExternalImport),
        "Json" => Some(Kind::JsonBlob),
        "SqlBlock" => Some(Kind::QuotedBlock("sql")),
        _ => None,
    }
}

/// Classify a structural field-type description into one semantic kind
///
/// Rule order matters: a reference wrapper around a registered declaration
/// type always wins, then a registered enum type, then the primitive
/// table, then lists, then optionals. Placement of `Optional` is the
/// caller's concern, not this function's.
pub fn classify(ty: &FieldType, known: &KnownTypes) -> Result<Kind, ClassifyError> {
    // Rule 1: reference wrapper around a registered declaration type
    if let FieldType::Ref(inner) = ty {
        if let FieldType::Named(host) = inner.as_ref() {
            if let Some(name) = known.decl_name(host) {
                return Ok(Kind::DeclRef(name.to_string()));
            }
        }
        return Err(ClassifyError {
            description: format!(
                "{} does not reference a registered declaration type",
                ty.describe()
            ),
        });
    }

    if let FieldType::Named(host) = ty {
        // Rule 2: registered enum type
        if let Some(name) = known.enum_name(host) {
            return Ok(Kind::EnumRef(name.to_string()));
        }
        // Rule 3: fixed primitive table
        if let Some(kind) = primitive(host) {
            return Ok(kind);
        }
    }

    match ty {
        // Rule 4: list of a classifiable element type
        FieldType::List(inner) => Ok(Kind::List(Box::new(classify(inner, known)?))),
        // Rule 5: optional of a classifiable inner type
        FieldType::Optional(inner) => Ok(Kind::Optional(Box::new(classify(inner, known)?))),
        _ => Err(ClassifyError {
            description: format!("{} is not a supported field type", ty.describe()),
        }),
    }
}
