//! Host-type shape descriptors
//!
//! Rust has no runtime reflection, so every declarable type carries an
//! explicit shape descriptor. Descriptors are built through a typed
//! combinator API in which a single [`RecordBuilder::field`] call
//! contributes both the schema entry and the evaluator step for that
//! field - the derived schema and evaluator cannot drift apart because
//! they are two readings of the same descriptor.

use std::marker::PhantomData;
use std::vec;

use crate::errors::{EvalError, EvalResult};
use crate::evaluator::value::{ExtImport, Json, SqlBlock, TypedValue};
use crate::kind::FieldType;

/// A Rust type usable as a declaration field
///
/// `field_type` names the structural description fed to the classifier and
/// `from_typed` converts the dynamic value the matching primitive
/// evaluator produced. The two are defined together per type, which keeps
/// classification and conversion in lock-step; a `from_typed` failure
/// therefore signals an engine bug, not a document error.
pub trait FieldValue: Sized + Send + Sync + 'static {
    fn field_type() -> FieldType;

    fn from_typed(value: TypedValue) -> EvalResult<Self>;

    /// Value used when an optional dict entry is absent. `None` marks the
    /// type as required.
    fn absent() -> Option<Self> {
        None
    }
}

impl FieldValue for String {
    fn field_type() -> FieldType {
        FieldType::Named("String")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::String(s) => Ok(s),
            other => Err(conversion_bug("string", &other)),
        }
    }
}

impl FieldValue for i64 {
    fn field_type() -> FieldType {
        FieldType::Named("i64")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::Int(n) => Ok(n),
            other => Err(conversion_bug("int", &other)),
        }
    }
}

impl FieldValue for f64 {
    fn field_type() -> FieldType {
        FieldType::Named("f64")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::Double(n) => Ok(n),
            other => Err(conversion_bug("double", &other)),
        }
    }
}

impl FieldValue for bool {
    fn field_type() -> FieldType {
        FieldType::Named("bool")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::Bool(b) => Ok(b),
            other => Err(conversion_bug("bool", &other)),
        }
    }
}

impl FieldValue for ExtImport {
    fn field_type() -> FieldType {
        FieldType::Named("ExtImport")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::ExtImport(import) => Ok(import),
            other => Err(conversion_bug("import", &other)),
        }
    }
}

impl FieldValue for Json {
    fn field_type() -> FieldType {
        FieldType::Named("Json")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::Json(json) => Ok(json),
            other => Err(conversion_bug("json block", &other)),
        }
    }
}

impl FieldValue for SqlBlock {
    fn field_type() -> FieldType {
        FieldType::Named("SqlBlock")
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::Quoted { text, .. } => Ok(SqlBlock(text)),
            other => Err(conversion_bug("sql block", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::List(items) => items.into_iter().map(T::from_typed).collect(),
            other => Err(conversion_bug("list", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        FieldType::Optional(Box::new(T::field_type()))
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        Ok(Some(T::from_typed(value)?))
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

fn conversion_bug(expected: &str, found: &TypedValue) -> EvalError {
    EvalError::internal(format!(
        "expected an evaluated {}, got {}",
        expected,
        found.type_name()
    ))
}

/// A host type declarable in manifest documents
pub trait DeclShape: Sized + Send + Sync + 'static {
    /// Host type name; the registry name is derived from it by lowering
    /// the first character
    const TYPE_NAME: &'static str;

    /// Shape descriptor: a single wrapped value or a record of named fields
    fn shape() -> BodyShape<Self>;
}

/// An enum usable as a field's label set
pub trait EnumShape: Sized + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    /// Allowed labels, in declaration order
    fn labels() -> &'static [&'static str];

    fn from_label(label: &str) -> Option<Self>;

    fn label(&self) -> &'static str;
}

/// `FieldValue::field_type` body for enum types
pub fn enum_field_type<E: EnumShape>() -> FieldType {
    FieldType::Named(E::TYPE_NAME)
}

/// `FieldValue::from_typed` body for enum types
pub fn enum_from_typed<E: EnumShape>(value: TypedValue) -> EvalResult<E> {
    match value {
        TypedValue::Enum(label) => E::from_label(&label).ok_or_else(|| {
            EvalError::internal(format!(
                "label '{}' passed validation but is not a {} label",
                label,
                E::TYPE_NAME
            ))
        }),
        other => Err(conversion_bug("enum label", &other)),
    }
}

/// Typed reference to another declaration, carried by name
pub struct Ref<T: DeclShape> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeclShape> Ref<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Name of the referenced declaration
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: DeclShape> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<T: DeclShape> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ref<{}>({})", T::TYPE_NAME, self.name)
    }
}

impl<T: DeclShape> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T: DeclShape> Eq for Ref<T> {}

impl<T: DeclShape> FieldValue for Ref<T> {
    fn field_type() -> FieldType {
        FieldType::Ref(Box::new(FieldType::Named(T::TYPE_NAME)))
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        match value {
            TypedValue::DeclRef(name) => Ok(Ref::new(name)),
            other => Err(conversion_bug("reference", &other)),
        }
    }
}

/// Queue of evaluated field values, in declared field order; `None` marks
/// an absent optional entry
pub type FieldQueue = vec::IntoIter<Option<TypedValue>>;

type Extract<A> = Box<dyn Fn(&mut FieldQueue) -> EvalResult<A> + Send + Sync>;

/// Shape of a declaration body
pub enum BodyShape<D> {
    /// Exactly one unnamed field (`struct Semver(String)`)
    Wrapped(WrappedShape<D>),
    /// Named fields (`struct Service { ... }`)
    Record(RecordShape<D>),
}

/// Wrapped-value shape: the single field's type plus the constructor
pub struct WrappedShape<D> {
    pub(crate) ty: FieldType,
    pub(crate) build: Box<dyn Fn(TypedValue) -> EvalResult<D> + Send + Sync>,
}

impl<D> WrappedShape<D> {
    pub fn new<T, F>(construct: F) -> Self
    where
        T: FieldValue,
        F: Fn(T) -> D + Send + Sync + 'static,
    {
        WrappedShape {
            ty: T::field_type(),
            build: Box::new(move |value| Ok(construct(T::from_typed(value)?))),
        }
    }
}

/// One named field in a record shape
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Accumulates record fields left to right
///
/// The evaluated values are threaded through nested pairs into the final
/// constructor, so the constructor is applied positionally in exactly the
/// order fields were declared.
pub struct RecordBuilder<A> {
    fields: Vec<FieldSpec>,
    extract: Extract<A>,
}

impl RecordBuilder<()> {
    pub fn new() -> Self {
        RecordBuilder {
            fields: Vec::new(),
            extract: Box::new(|_| Ok(())),
        }
    }
}

impl Default for RecordBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync + 'static> RecordBuilder<A> {
    /// Append a field. Optionality comes from the field type itself:
    /// `Option<T>` fields become optional dict entries.
    pub fn field<T: FieldValue>(self, name: &'static str) -> RecordBuilder<(A, T)> {
        let RecordBuilder {
            mut fields,
            extract,
        } = self;
        fields.push(FieldSpec {
            name,
            ty: T::field_type(),
        });
        let next: Extract<(A, T)> = Box::new(move |queue| {
            let acc = extract(queue)?;
            let value = match queue.next() {
                Some(Some(value)) => T::from_typed(value)?,
                Some(None) => T::absent().ok_or_else(|| {
                    EvalError::internal(format!("no value extracted for required field '{}'", name))
                })?,
                None => return Err(EvalError::internal("field value queue exhausted")),
            };
            Ok((acc, value))
        });
        RecordBuilder {
            fields,
            extract: next,
        }
    }

    /// Finish with the host constructor, applied to the accumulated field
    /// values
    pub fn construct<D, F>(self, construct: F) -> RecordShape<D>
    where
        F: Fn(A) -> D + Send + Sync + 'static,
    {
        let RecordBuilder { fields, extract } = self;
        RecordShape {
            fields,
            build: Box::new(move |queue| Ok(construct(extract(queue)?))),
        }
    }
}

/// Record shape: ordered named fields plus the constructor
pub struct RecordShape<D> {
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) build: Box<dyn Fn(&mut FieldQueue) -> EvalResult<D> + Send + Sync>,
}

impl<D> RecordShape<D> {
    /// Declared fields, in order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}
