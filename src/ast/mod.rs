//! Expression-tree input for the Keel engine
//!
//! The parser (an upstream component) produces one [`ExprNode`] tree per
//! declaration body, plus the declared name and type tag for each top-level
//! declaration in a document. Every node carries a byte-offset span so
//! evaluation errors can point back into the original source.

use miette::SourceSpan;

/// Byte-offset span of a node in the original source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.offset, span.len).into()
    }
}

/// A parsed expression: the value side of a declaration
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// String literal
    String(String, Span),
    /// Integer literal (64-bit signed)
    Int(i64, Span),
    /// Float literal (64-bit)
    Double(f64, Span),
    /// Boolean literal
    Bool(bool, Span),
    /// List literal: `[a, b, c]`
    List(Vec<ExprNode>, Span),
    /// Dict literal: `{ key: value, ... }`
    Dict(Vec<DictField>, Span),
    /// Identifier: a reference to a sibling declaration or an enum label
    Identifier(String, Span),
    /// Quoted foreign block: `{=tag ... tag=}`
    Quoted {
        tag: String,
        text: String,
        span: Span,
    },
    /// External import: `import x from "path"` / `import { x } from "path"`
    Import {
        symbol: ImportSymbol,
        path: String,
        span: Span,
    },
}

/// A named entry inside a dict literal
#[derive(Debug, Clone, PartialEq)]
pub struct DictField {
    pub name: String,
    pub value: ExprNode,
    /// Span of the entry's key
    pub span: Span,
}

/// Which symbol an import expression binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSymbol {
    /// `import name from "path"` - the module's default export
    Default(String),
    /// `import { name } from "path"` - a named export
    Named(String),
}

impl ExprNode {
    /// Span of this node
    pub fn span(&self) -> Span {
        match self {
            ExprNode::String(_, span)
            | ExprNode::Int(_, span)
            | ExprNode::Double(_, span)
            | ExprNode::Bool(_, span)
            | ExprNode::List(_, span)
            | ExprNode::Dict(_, span)
            | ExprNode::Identifier(_, span) => *span,
            ExprNode::Quoted { span, .. } | ExprNode::Import { span, .. } => *span,
        }
    }

    /// Short description of the node's shape, for diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            ExprNode::String(..) => "a string literal",
            ExprNode::Int(..) => "an integer literal",
            ExprNode::Double(..) => "a float literal",
            ExprNode::Bool(..) => "a boolean literal",
            ExprNode::List(..) => "a list literal",
            ExprNode::Dict(..) => "a dict literal",
            ExprNode::Identifier(..) => "an identifier",
            ExprNode::Quoted { .. } => "a quoted block",
            ExprNode::Import { .. } => "an import expression",
        }
    }
}

/// A top-level parsed declaration: `service api { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Declared type tag (`service`)
    pub type_tag: String,
    /// Instance name (`api`)
    pub name: String,
    /// Body expression
    pub body: ExprNode,
    pub span: Span,
}
