//! Error types, diagnostics, and result aliases for the Keel engine.
//!
//! Errors fall into two strictly separated classes: build-time
//! [`SynthesisError`]s (a malformed host shape, fatal before any document is
//! evaluated) and per-document [`EvalError`]s (attributable to one
//! declaration and field path). Both render via `miette` diagnostics; the
//! engine only ever sees the AST, so errors carry spans but no source text -
//! callers attach it with `miette::Report::with_source_code`.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Result alias for build-time synthesis
pub type SynthResult<T> = Result<T, SynthesisError>;

/// Result alias for document evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // two-row DP over the edit matrix
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = if a_ch == b_ch { 0 } else { 1 };
            current[j + 1] = (prev[j + 1] + 1)
                .min(current[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b_chars.len()]
}

/// Find the best "did you mean?" suggestion from a list of candidates
pub fn find_similar(name: &str, candidates: &[String], max_distance: usize) -> Option<String> {
    let name_lower = name.to_lowercase();
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(&name_lower, &candidate.to_lowercase());
        if distance <= max_distance && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Generate a help message for an unresolved name with suggestions
pub fn suggestion_help(name: &str, candidates: &[String], empty_msg: &str) -> String {
    // longer names allow more typos
    let max_distance = (name.len() / 3).clamp(2, 3);

    if let Some(suggestion) = find_similar(name, candidates, max_distance) {
        format!("did you mean '{}'?", suggestion)
    } else if candidates.is_empty() {
        empty_msg.to_string()
    } else if candidates.len() <= 5 {
        format!("available: {}", candidates.join(", "))
    } else {
        "check the name for typos".to_string()
    }
}

/// Classification failure: no rule matched the structural description
#[derive(Error, Debug)]
#[error("{description}")]
pub struct ClassifyError {
    pub description: String,
}

/// Lowering failure: `Optional` surfaced where the schema cannot express it
#[derive(Error, Debug)]
#[error("optional is only valid directly on a record field")]
pub struct OptionalNotLowerable;

/// Build-time shape errors
///
/// Every variant is fatal to the build: a program must not start with a
/// declaration type whose schema or evaluator could not be synthesized.
#[derive(Error, Debug, Diagnostic)]
pub enum SynthesisError {
    #[error("declaration type '{decl}' has an unsupported shape in {context}: {description}")]
    #[diagnostic(
        code(E0101),
        help("usable field types are strings, integers, doubles, booleans, imports, quoted blocks, json blobs, lists, optionals, and references to registered declaration or enum types")
    )]
    UnsupportedShape {
        decl: String,
        context: String,
        description: String,
    },

    #[error("declaration type '{decl}': optional is invalid as the sole wrapped value")]
    #[diagnostic(
        code(E0102),
        help("wrap the optional in a record field instead: optional-ness belongs to dict entries")
    )]
    OptionalWrappedValue { decl: String },

    #[error("declaration type '{decl}': optional is misplaced in {context}")]
    #[diagnostic(
        code(E0103),
        help("optional may only appear directly on a record field, never nested inside a list or another optional")
    )]
    MisplacedOptional { decl: String, context: String },

    #[error("declaration type '{decl}' has a record shape with no fields")]
    #[diagnostic(code(E0104))]
    EmptyRecord { decl: String },

    #[error("declaration type '{decl}' declares field '{field}' more than once")]
    #[diagnostic(code(E0105))]
    DuplicateField { decl: String, field: String },

    #[error("two declaration types derive the same name '{name}'")]
    #[diagnostic(
        code(E0106),
        help("declaration names are host type names with the first character lowered; rename one of the host types")
    )]
    DuplicateDeclName { name: String },

    #[error("two enum types derive the same name '{name}'")]
    #[diagnostic(code(E0107))]
    DuplicateEnumName { name: String },
}

/// Evaluation-time errors
///
/// None of these are fatal to the process: each is attributable to one
/// declaration in one document and is surfaced to the document author.
#[derive(Error, Debug, Diagnostic)]
pub enum EvalError {
    #[error("type mismatch")]
    #[diagnostic(code(E0201))]
    KindMismatch {
        expected: String,
        found: &'static str,
        #[label("expected {expected}, found {found}")]
        span: SourceSpan,
    },

    #[error("missing required field")]
    #[diagnostic(
        code(E0202),
        help("add the missing field '{field}' to satisfy declaration type '{decl_type}'")
    )]
    MissingRequiredField {
        field: String,
        decl_type: String,
        #[label("declaration body is missing '{field}'")]
        span: SourceSpan,
    },

    #[error("unknown field")]
    #[diagnostic(code(E0203), help("{help}"))]
    UnknownDictField {
        field: String,
        decl_type: String,
        #[label("'{field}' is not a field of declaration type '{decl_type}'")]
        span: SourceSpan,
        help: String,
    },

    #[error("unresolved reference")]
    #[diagnostic(code(E0204), help("{help}"))]
    UnresolvedReference {
        name: String,
        #[label("'{name}' is not declared in this document")]
        span: SourceSpan,
        help: String,
    },

    #[error("reference type mismatch")]
    #[diagnostic(code(E0205))]
    ReferenceTypeMismatch {
        reference: String,
        expected: String,
        actual: String,
        #[label("'{reference}' is a {actual} declaration, expected a {expected}")]
        span: SourceSpan,
    },

    #[error("invalid enum label")]
    #[diagnostic(code(E0206), help("{help}"))]
    InvalidEnumLabel {
        label: String,
        enum_name: String,
        allowed: String,
        #[label("'{label}' is not one of: {allowed}")]
        span: SourceSpan,
        help: String,
    },

    #[error("quoted block tag mismatch")]
    #[diagnostic(code(E0207))]
    QuotedTagMismatch {
        expected: String,
        found: String,
        #[label("expected a {{={expected} ...=}} block, found tag '{found}'")]
        span: SourceSpan,
    },

    #[error("unknown declaration type")]
    #[diagnostic(code(E0208), help("{help}"))]
    UnknownDeclType {
        type_tag: String,
        #[label("'{type_tag}' is not a registered declaration type")]
        span: SourceSpan,
        help: String,
    },

    #[error("duplicate declaration")]
    #[diagnostic(
        code(E0209),
        help("a name may only be declared once per document; rename '{name}'")
    )]
    DuplicateDeclaration {
        name: String,
        #[label("'{name}' is already declared")]
        span: SourceSpan,
    },

    #[error("in field '{field}'")]
    #[diagnostic(code(E0210))]
    InField {
        field: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("at index {index}")]
    #[diagnostic(code(E0211))]
    InElement {
        index: usize,
        #[source]
        source: Box<EvalError>,
    },

    #[error("in declaration '{name}'")]
    #[diagnostic(code(E0212))]
    InDeclaration {
        name: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("internal evaluator error: {message}")]
    #[diagnostic(
        code(E0299),
        help("the synthesized schema and evaluator disagree; this is a bug in the engine")
    )]
    Internal { message: String },
}

impl EvalError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        EvalError::Internal {
            message: message.into(),
        }
    }

    /// Innermost error of a context chain
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::InField { source, .. }
            | EvalError::InElement { source, .. }
            | EvalError::InDeclaration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
