//! Declaration and enum registries
//!
//! Registration happens once, during a single-threaded build phase: every
//! name is collected first (so declaration types may reference each other
//! regardless of registration order), duplicates are rejected, and then
//! each shape is synthesized into its schema/evaluator pair. The finished
//! registry is read-only; evaluating documents against it from multiple
//! threads needs no locking.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use crate::ast::{Declaration, ExprNode};
use crate::errors::{suggestion_help, EvalError, EvalResult, SynthResult, SynthesisError};
use crate::evaluator::Bindings;
use crate::kind::KnownTypes;
use crate::schema::SchemaBodyType;
use crate::shape::{DeclShape, EnumShape};
use crate::synth::decl_type_of;

/// Type-erased evaluated declaration value
pub type DeclValue = Box<dyn Any + Send + Sync>;

/// Derive a registry name from a host type name: first character lowered
pub fn decl_name_of(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

type EvalFn = Box<dyn Fn(&ExprNode, &Bindings, &DeclRegistry) -> EvalResult<DeclValue> + Send + Sync>;

/// A named, schema-backed declaration type: the synthesized schema
/// descriptor plus the matching evaluator
pub struct DeclType {
    name: String,
    host_type: &'static str,
    body_type: SchemaBodyType,
    eval: EvalFn,
}

impl DeclType {
    pub(crate) fn new(
        name: String,
        host_type: &'static str,
        body_type: SchemaBodyType,
        eval: impl Fn(&ExprNode, &Bindings, &DeclRegistry) -> EvalResult<DeclValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name,
            host_type,
            body_type,
            eval: Box::new(eval),
        }
    }

    /// Derived declaration name (`service`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host type name (`Service`)
    pub fn host_type(&self) -> &'static str {
        self.host_type
    }

    /// Schema descriptor for this declaration type
    pub fn body_type(&self) -> &SchemaBodyType {
        &self.body_type
    }

    /// Evaluate a declaration body against this type's schema
    pub fn evaluate(
        &self,
        expr: &ExprNode,
        bindings: &Bindings,
        registry: &DeclRegistry,
    ) -> EvalResult<DeclValue> {
        (self.eval)(expr, bindings, registry)
    }
}

impl fmt::Debug for DeclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclType")
            .field("name", &self.name)
            .field("host_type", &self.host_type)
            .field("body_type", &self.body_type)
            .finish_non_exhaustive()
    }
}

/// A named enum type: a finite label set
#[derive(Debug, Clone)]
pub struct EnumType {
    name: String,
    host_type: &'static str,
    labels: Vec<&'static str>,
}

impl EnumType {
    /// Derived enum name (`restartPolicy`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host type name (`RestartPolicy`)
    pub fn host_type(&self) -> &'static str {
        self.host_type
    }

    /// Allowed labels, in declaration order
    pub fn labels(&self) -> &[&'static str] {
        &self.labels
    }

    pub fn allows(&self, label: &str) -> bool {
        self.labels.iter().any(|l| *l == label)
    }
}

/// One evaluated top-level declaration
pub struct Decl {
    name: String,
    type_name: String,
    value: DeclValue,
}

impl Decl {
    /// Instance name (`api`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaration type name (`service`)
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Typed view of the evaluated value
    pub fn downcast<D: DeclShape>(&self) -> Option<&D> {
        self.value.downcast_ref::<D>()
    }
}

impl fmt::Debug for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decl")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

struct PendingDecl {
    name: String,
    host_type: &'static str,
    synthesize: Box<dyn FnOnce(&KnownTypes) -> SynthResult<DeclType>>,
}

/// Collects declarable shapes, then synthesizes them all at once
#[derive(Default)]
pub struct RegistryBuilder {
    decls: Vec<PendingDecl>,
    enums: Vec<EnumType>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration type
    pub fn decl<D: DeclShape>(mut self) -> Self {
        self.decls.push(PendingDecl {
            name: decl_name_of(D::TYPE_NAME),
            host_type: D::TYPE_NAME,
            synthesize: Box::new(|known| decl_type_of::<D>(known)),
        });
        self
    }

    /// Register an enum type
    pub fn enum_type<E: EnumShape>(mut self) -> Self {
        self.enums.push(EnumType {
            name: decl_name_of(E::TYPE_NAME),
            host_type: E::TYPE_NAME,
            labels: E::labels().to_vec(),
        });
        self
    }

    /// Check names, then synthesize every schema/evaluator pair
    ///
    /// Every malformed shape surfaces here, before any document is
    /// evaluated.
    pub fn finish(self) -> SynthResult<DeclRegistry> {
        let mut known = KnownTypes::new();

        let mut decl_names = std::collections::HashSet::new();
        for pending in &self.decls {
            if !decl_names.insert(pending.name.clone()) {
                return Err(SynthesisError::DuplicateDeclName {
                    name: pending.name.clone(),
                });
            }
            known.add_decl(pending.host_type, pending.name.clone());
        }

        let mut enum_names = std::collections::HashSet::new();
        for enum_type in &self.enums {
            if !enum_names.insert(enum_type.name.clone()) {
                return Err(SynthesisError::DuplicateEnumName {
                    name: enum_type.name.clone(),
                });
            }
            known.add_enum(enum_type.host_type, enum_type.name.clone());
        }

        let mut decls = IndexMap::new();
        for pending in self.decls {
            let decl_type = (pending.synthesize)(&known)?;
            decls.insert(pending.name, decl_type);
        }
        let enums = self
            .enums
            .into_iter()
            .map(|enum_type| (enum_type.name.clone(), enum_type))
            .collect();

        Ok(DeclRegistry { decls, enums })
    }
}

/// Read-only registry of declaration and enum types
pub struct DeclRegistry {
    decls: IndexMap<String, DeclType>,
    enums: IndexMap<String, EnumType>,
}

impl DeclRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup_decl(&self, name: &str) -> Option<&DeclType> {
        self.decls.get(name)
    }

    pub fn lookup_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Registered declaration types, in registration order
    pub fn decl_types(&self) -> impl Iterator<Item = &DeclType> {
        self.decls.values()
    }

    /// Registered enum types, in registration order
    pub fn enum_types(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    /// Evaluate every top-level declaration of one parsed document
    ///
    /// All sibling names are bound before any body is evaluated, so
    /// references are order-independent. One result per declaration; a
    /// failing declaration never aborts its siblings.
    pub fn evaluate_document(&self, declarations: &[Declaration]) -> Vec<EvalResult<Decl>> {
        let mut bindings = Bindings::new();
        let mut duplicates = Vec::new();
        for (index, declaration) in declarations.iter().enumerate() {
            if bindings.contains(&declaration.name) {
                duplicates.push(index);
            } else {
                bindings.bind(declaration.name.clone(), declaration.type_tag.clone());
            }
        }

        declarations
            .iter()
            .enumerate()
            .map(|(index, declaration)| {
                self.evaluate_declaration(declaration, &bindings, duplicates.contains(&index))
                    .map_err(|source| EvalError::InDeclaration {
                        name: declaration.name.clone(),
                        source: Box::new(source),
                    })
            })
            .collect()
    }

    fn evaluate_declaration(
        &self,
        declaration: &Declaration,
        bindings: &Bindings,
        duplicate: bool,
    ) -> EvalResult<Decl> {
        if duplicate {
            return Err(EvalError::DuplicateDeclaration {
                name: declaration.name.clone(),
                span: declaration.span.into(),
            });
        }
        let Some(decl_type) = self.lookup_decl(&declaration.type_tag) else {
            let type_names: Vec<String> = self.decls.keys().cloned().collect();
            return Err(EvalError::UnknownDeclType {
                type_tag: declaration.type_tag.clone(),
                span: declaration.span.into(),
                help: suggestion_help(
                    &declaration.type_tag,
                    &type_names,
                    "no declaration types are registered",
                ),
            });
        };
        let value = decl_type.evaluate(&declaration.body, bindings, self)?;
        Ok(Decl {
            name: declaration.name.clone(),
            type_name: decl_type.name().to_string(),
            value,
        })
    }
}

impl fmt::Debug for DeclRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclRegistry")
            .field("decls", &self.decls.keys().collect::<Vec<_>>())
            .field("enums", &self.enums.keys().collect::<Vec<_>>())
            .finish()
    }
}
