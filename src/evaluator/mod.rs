//! Primitive evaluators for the Keel engine
//!
//! [`eval_kind`] is the fixed library of per-kind evaluators: a pure,
//! recursive, terminating walk over an [`ExprNode`], selected by the
//! field's classified [`Kind`]. The match is exhaustive, so adding a kind
//! forces this function (and the schema lowering) to be extended with it.
//! No evaluator mutates shared state; the registry and bindings are
//! read-only inputs.

pub mod value;

use indexmap::IndexMap;

use crate::ast::ExprNode;
use crate::errors::{suggestion_help, EvalError, EvalResult};
use crate::kind::Kind;
use crate::registry::DeclRegistry;
use value::{ExtImport, Json, TypedValue};

/// Declaration names visible while evaluating one document, mapped to
/// their declaration type names
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    decls: IndexMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an instance name to its declaration type name
    pub fn bind(&mut self, name: impl Into<String>, decl_type: impl Into<String>) {
        self.decls.insert(name.into(), decl_type.into());
    }

    /// Declaration type name bound to `name`, if any
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.decls.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    /// Bound names, in binding order
    pub fn names(&self) -> Vec<String> {
        self.decls.keys().cloned().collect()
    }
}

/// Evaluate one expression node against the evaluator selected by `kind`
pub fn eval_kind(
    kind: &Kind,
    expr: &ExprNode,
    bindings: &Bindings,
    registry: &DeclRegistry,
) -> EvalResult<TypedValue> {
    match kind {
        Kind::String => match expr {
            ExprNode::String(s, _) => Ok(TypedValue::String(s.clone())),
            other => Err(mismatch(kind, other)),
        },
        Kind::Integer => match expr {
            ExprNode::Int(n, _) => Ok(TypedValue::Int(*n)),
            other => Err(mismatch(kind, other)),
        },
        Kind::Double => match expr {
            ExprNode::Double(n, _) => Ok(TypedValue::Double(*n)),
            // integer literals promote losslessly
            ExprNode::Int(n, _) => Ok(TypedValue::Double(*n as f64)),
            other => Err(mismatch(kind, other)),
        },
        Kind::Bool => match expr {
            ExprNode::Bool(b, _) => Ok(TypedValue::Bool(*b)),
            other => Err(mismatch(kind, other)),
        },
        Kind::List(elem) => match expr {
            ExprNode::List(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let elem_value =
                        eval_kind(elem, item, bindings, registry).map_err(|source| {
                            EvalError::InElement {
                                index,
                                source: Box::new(source),
                            }
                        })?;
                    values.push(elem_value);
                }
                Ok(TypedValue::List(values))
            }
            other => Err(mismatch(kind, other)),
        },
        Kind::ExternalImport => match expr {
            ExprNode::Import { symbol, path, .. } => Ok(TypedValue::ExtImport(ExtImport {
                symbol: symbol.clone(),
                path: path.clone(),
            })),
            other => Err(mismatch(kind, other)),
        },
        Kind::JsonBlob => match expr {
            ExprNode::Quoted { tag, text, span } => {
                if tag == "json" {
                    Ok(TypedValue::Json(Json(text.clone())))
                } else {
                    Err(EvalError::QuotedTagMismatch {
                        expected: "json".to_string(),
                        found: tag.clone(),
                        span: (*span).into(),
                    })
                }
            }
            other => Err(mismatch(kind, other)),
        },
        Kind::QuotedBlock(expected_tag) => match expr {
            ExprNode::Quoted { tag, text, span } => {
                if tag == expected_tag {
                    Ok(TypedValue::Quoted {
                        tag: tag.clone(),
                        text: text.clone(),
                    })
                } else {
                    Err(EvalError::QuotedTagMismatch {
                        expected: (*expected_tag).to_string(),
                        found: tag.clone(),
                        span: (*span).into(),
                    })
                }
            }
            other => Err(mismatch(kind, other)),
        },
        Kind::DeclRef(decl_name) => match expr {
            ExprNode::Identifier(name, span) => match bindings.lookup(name) {
                None => Err(EvalError::UnresolvedReference {
                    name: name.clone(),
                    span: (*span).into(),
                    help: suggestion_help(
                        name,
                        &bindings.names(),
                        "no declarations are in scope",
                    ),
                }),
                Some(actual) if actual != decl_name => Err(EvalError::ReferenceTypeMismatch {
                    reference: name.clone(),
                    expected: decl_name.clone(),
                    actual: actual.to_string(),
                    span: (*span).into(),
                }),
                Some(_) => Ok(TypedValue::DeclRef(name.clone())),
            },
            other => Err(mismatch(kind, other)),
        },
        Kind::EnumRef(enum_name) => match expr {
            ExprNode::Identifier(label, span) => {
                let Some(enum_type) = registry.lookup_enum(enum_name) else {
                    return Err(EvalError::internal(format!(
                        "enum type '{}' is not registered",
                        enum_name
                    )));
                };
                if enum_type.allows(label) {
                    Ok(TypedValue::Enum(label.clone()))
                } else {
                    let labels: Vec<String> =
                        enum_type.labels().iter().map(|l| (*l).to_string()).collect();
                    Err(EvalError::InvalidEnumLabel {
                        label: label.clone(),
                        enum_name: enum_name.clone(),
                        allowed: labels.join(", "),
                        span: (*span).into(),
                        help: suggestion_help(label, &labels, "the enum has no labels"),
                    })
                }
            }
            other => Err(mismatch(kind, other)),
        },
        // synthesis strips the one legal outermost optional on record
        // fields, so an optional kind can never reach a primitive evaluator
        Kind::Optional(_) => Err(EvalError::internal(
            "optional kind reached a primitive evaluator",
        )),
    }
}

fn mismatch(kind: &Kind, expr: &ExprNode) -> EvalError {
    EvalError::KindMismatch {
        expected: kind.to_string(),
        found: expr.describe(),
        span: expr.span().into(),
    }
}
