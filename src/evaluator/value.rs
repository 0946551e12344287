//! Evaluated values
//!
//! [`TypedValue`] is the dynamic intermediate a primitive evaluator
//! produces before a declaration's constructor turns it into the typed
//! host value. The opaque leaf types ([`ExtImport`], [`Json`],
//! [`SqlBlock`]) carry their parsed payloads through unchanged.

use crate::ast::ImportSymbol;

/// External code reference, carried through evaluation unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtImport {
    pub symbol: ImportSymbol,
    pub path: String,
}

/// Raw JSON payload, passed through unvalidated
///
/// Any further validation is the payload consumer's responsibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json(pub String);

/// Embedded provisioning statements, opaque to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBlock(pub String);

/// Dynamic evaluated value, one variant per evaluable kind
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    List(Vec<TypedValue>),
    ExtImport(ExtImport),
    Json(Json),
    Quoted { tag: String, text: String },
    /// Resolved reference to a sibling declaration, by name
    DeclRef(String),
    /// Validated enum label
    Enum(String),
}

impl TypedValue {
    /// Get the kind name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::String(_) => "string",
            TypedValue::Int(_) => "int",
            TypedValue::Double(_) => "double",
            TypedValue::Bool(_) => "bool",
            TypedValue::List(_) => "list",
            TypedValue::ExtImport(_) => "import",
            TypedValue::Json(_) => "json block",
            TypedValue::Quoted { .. } => "quoted block",
            TypedValue::DeclRef(_) => "reference",
            TypedValue::Enum(_) => "enum label",
        }
    }

    /// Convert to a serde_json::Value for downstream rendering
    pub fn to_serde_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};
        match self {
            TypedValue::String(s) => Value::String(s.clone()),
            TypedValue::Int(n) => Value::Number(serde_json::Number::from(*n)),
            TypedValue::Double(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::List(items) => {
                Value::Array(items.iter().map(|v| v.to_serde_json()).collect())
            }
            TypedValue::ExtImport(import) => {
                let (kind, symbol) = match &import.symbol {
                    ImportSymbol::Default(name) => ("default", name),
                    ImportSymbol::Named(name) => ("named", name),
                };
                json!({"import": {"kind": kind, "symbol": symbol, "path": import.path}})
            }
            TypedValue::Json(Json(raw)) => json!({ "json": raw }),
            TypedValue::Quoted { tag, text } => json!({"block": {"tag": tag, "text": text}}),
            TypedValue::DeclRef(name) => json!({ "ref": name }),
            TypedValue::Enum(label) => Value::String(label.clone()),
        }
    }
}
