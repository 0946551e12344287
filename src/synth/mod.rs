//! Declaration-type synthesis
//!
//! [`decl_type_of`] turns a host type's shape descriptor into a
//! [`DeclType`]: one classification pass over the descriptor feeds both
//! the schema body and the evaluation closure. Schema and evaluator are
//! two readings of the same classified field list, never two traversals
//! that could disagree. Synthesis runs once per host shape at
//! registration time; every malformed shape is rejected here, before any
//! document is evaluated.

use crate::ast::ExprNode;
use crate::errors::{suggestion_help, EvalError, EvalResult, SynthResult, SynthesisError};
use crate::evaluator::{eval_kind, Bindings};
use crate::kind::{classify, Kind, KnownTypes};
use crate::registry::{decl_name_of, DeclRegistry, DeclType, DeclValue};
use crate::schema::{DictEntry, SchemaBodyType, SchemaType};
use crate::shape::{BodyShape, DeclShape, RecordShape, WrappedShape};

/// Synthesize the schema/evaluator pair for a declarable host type
pub fn decl_type_of<D: DeclShape>(known: &KnownTypes) -> SynthResult<DeclType> {
    let name = decl_name_of(D::TYPE_NAME);
    match D::shape() {
        BodyShape::Wrapped(shape) => wrapped_decl_type::<D>(name, shape, known),
        BodyShape::Record(shape) => record_decl_type::<D>(name, shape, known),
    }
}

fn wrapped_decl_type<D: DeclShape>(
    name: String,
    shape: WrappedShape<D>,
    known: &KnownTypes,
) -> SynthResult<DeclType> {
    let WrappedShape { ty, build } = shape;
    let kind = classify(&ty, known).map_err(|source| SynthesisError::UnsupportedShape {
        decl: D::TYPE_NAME.to_string(),
        context: "the wrapped value".to_string(),
        description: source.to_string(),
    })?;
    if matches!(kind, Kind::Optional(_)) {
        return Err(SynthesisError::OptionalWrappedValue {
            decl: D::TYPE_NAME.to_string(),
        });
    }
    let schema_ty = SchemaType::of(&kind).map_err(|_| SynthesisError::MisplacedOptional {
        decl: D::TYPE_NAME.to_string(),
        context: "the wrapped value".to_string(),
    })?;

    let evaluate = move |expr: &ExprNode,
                         bindings: &Bindings,
                         registry: &DeclRegistry|
          -> EvalResult<DeclValue> {
        let value = eval_kind(&kind, expr, bindings, registry)?;
        let decl = build(value)?;
        Ok(Box::new(decl) as DeclValue)
    };

    Ok(DeclType::new(
        name,
        D::TYPE_NAME,
        SchemaBodyType::Value(schema_ty),
        evaluate,
    ))
}

/// Per-field evaluation plan, mirroring one schema entry
struct EntryPlan {
    name: &'static str,
    /// Inner kind for optional entries
    kind: Kind,
    required: bool,
}

fn record_decl_type<D: DeclShape>(
    name: String,
    shape: RecordShape<D>,
    known: &KnownTypes,
) -> SynthResult<DeclType> {
    let RecordShape { fields, build } = shape;
    if fields.is_empty() {
        return Err(SynthesisError::EmptyRecord {
            decl: D::TYPE_NAME.to_string(),
        });
    }

    let mut entries = Vec::with_capacity(fields.len());
    let mut plans: Vec<EntryPlan> = Vec::with_capacity(fields.len());
    for field in &fields {
        if plans.iter().any(|plan| plan.name == field.name) {
            return Err(SynthesisError::DuplicateField {
                decl: D::TYPE_NAME.to_string(),
                field: field.name.to_string(),
            });
        }
        let kind = classify(&field.ty, known).map_err(|source| SynthesisError::UnsupportedShape {
            decl: D::TYPE_NAME.to_string(),
            context: format!("field '{}'", field.name),
            description: source.to_string(),
        })?;
        let (kind, required) = match kind {
            Kind::Optional(inner) => (*inner, false),
            kind => (kind, true),
        };
        let ty = SchemaType::of(&kind).map_err(|_| SynthesisError::MisplacedOptional {
            decl: D::TYPE_NAME.to_string(),
            context: format!("field '{}'", field.name),
        })?;
        entries.push(DictEntry {
            name: field.name,
            ty,
            required,
        });
        plans.push(EntryPlan {
            name: field.name,
            kind,
            required,
        });
    }

    let decl_name = name.clone();
    let evaluate = move |expr: &ExprNode,
                         bindings: &Bindings,
                         registry: &DeclRegistry|
          -> EvalResult<DeclValue> {
        let (dict, dict_span) = match expr {
            ExprNode::Dict(dict_fields, span) => (dict_fields, span),
            other => {
                return Err(EvalError::KindMismatch {
                    expected: "a dict literal".to_string(),
                    found: other.describe(),
                    span: other.span().into(),
                })
            }
        };

        // reject entries the schema does not name before evaluating anything
        for entry in dict {
            if !plans.iter().any(|plan| plan.name == entry.name) {
                let field_names: Vec<String> =
                    plans.iter().map(|plan| plan.name.to_string()).collect();
                return Err(EvalError::UnknownDictField {
                    field: entry.name.clone(),
                    decl_type: decl_name.clone(),
                    span: entry.span.into(),
                    help: suggestion_help(
                        &entry.name,
                        &field_names,
                        "this declaration type has no fields",
                    ),
                });
            }
        }

        // one slot per declared field, in declaration order; absent
        // optionals never touch their inner evaluator
        let mut slots = Vec::with_capacity(plans.len());
        for plan in &plans {
            match dict.iter().find(|entry| entry.name == plan.name) {
                Some(entry) => {
                    let value = eval_kind(&plan.kind, &entry.value, bindings, registry).map_err(
                        |source| EvalError::InField {
                            field: plan.name.to_string(),
                            source: Box::new(source),
                        },
                    )?;
                    slots.push(Some(value));
                }
                None if plan.required => {
                    return Err(EvalError::MissingRequiredField {
                        field: plan.name.to_string(),
                        decl_type: decl_name.clone(),
                        span: (*dict_span).into(),
                    })
                }
                None => slots.push(None),
            }
        }

        let mut queue = slots.into_iter();
        let decl = build(&mut queue)?;
        Ok(Box::new(decl) as DeclValue)
    };

    Ok(DeclType::new(
        name,
        D::TYPE_NAME,
        SchemaBodyType::Dict(entries),
        evaluate,
    ))
}
