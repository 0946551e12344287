//! End-to-end tests: shape descriptors in, typed declarations out.

use pretty_assertions::assert_eq;

use keel::{
    enum_field_type, enum_from_typed, BodyShape, Bindings, Decl, DeclRegistry, DeclShape,
    Declaration, DictEntry, DictField, EnumShape, EvalError, EvalResult, ExprNode, ExtImport,
    FieldType, FieldValue, ImportSymbol, Json, RecordBuilder, Ref, SchemaBodyType, SchemaType,
    Span, SqlBlock, SynthesisError, TypedValue, WrappedShape,
};

// --- host types for a small manifest language ---

#[derive(Debug, PartialEq)]
struct Volume {
    size: String,
}

impl DeclShape for Volume {
    const TYPE_NAME: &'static str = "Volume";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<String>("size")
                .construct(|((), size)| Volume { size }),
        )
    }
}

#[derive(Debug, PartialEq)]
enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

impl EnumShape for RestartPolicy {
    const TYPE_NAME: &'static str = "RestartPolicy";

    fn labels() -> &'static [&'static str] {
        &["always", "onFailure", "never"]
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "always" => Some(RestartPolicy::Always),
            "onFailure" => Some(RestartPolicy::OnFailure),
            "never" => Some(RestartPolicy::Never),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "onFailure",
            RestartPolicy::Never => "never",
        }
    }
}

impl FieldValue for RestartPolicy {
    fn field_type() -> FieldType {
        enum_field_type::<Self>()
    }

    fn from_typed(value: TypedValue) -> EvalResult<Self> {
        enum_from_typed(value)
    }
}

#[derive(Debug, PartialEq)]
struct Service {
    image: String,
    replicas: i64,
    restart: RestartPolicy,
    data: Ref<Volume>,
    env: Vec<String>,
    public: Option<bool>,
}

impl DeclShape for Service {
    const TYPE_NAME: &'static str = "Service";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<String>("image")
                .field::<i64>("replicas")
                .field::<RestartPolicy>("restart")
                .field::<Ref<Volume>>("data")
                .field::<Vec<String>>("env")
                .field::<Option<bool>>("public")
                .construct(
                    |(((((((), image), replicas), restart), data), env), public)| Service {
                        image,
                        replicas,
                        restart,
                        data,
                        env,
                        public,
                    },
                ),
        )
    }
}

#[derive(Debug, PartialEq)]
struct Job {
    schedule: String,
    handler: ExtImport,
    timeout: Option<f64>,
    backup: Option<Ref<Volume>>,
}

impl DeclShape for Job {
    const TYPE_NAME: &'static str = "Job";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<String>("schedule")
                .field::<ExtImport>("handler")
                .field::<Option<f64>>("timeout")
                .field::<Option<Ref<Volume>>>("backup")
                .construct(|(((((), schedule), handler), timeout), backup)| Job {
                    schedule,
                    handler,
                    timeout,
                    backup,
                }),
        )
    }
}

#[derive(Debug, PartialEq)]
struct Migration {
    apply: SqlBlock,
}

impl DeclShape for Migration {
    const TYPE_NAME: &'static str = "Migration";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<SqlBlock>("apply")
                .construct(|((), apply)| Migration { apply }),
        )
    }
}

#[derive(Debug, PartialEq)]
struct Sidecar {
    config: Json,
}

impl DeclShape for Sidecar {
    const TYPE_NAME: &'static str = "Sidecar";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<Json>("config")
                .construct(|((), config)| Sidecar { config }),
        )
    }
}

#[derive(Debug, PartialEq)]
struct Semver(String);

impl DeclShape for Semver {
    const TYPE_NAME: &'static str = "Semver";

    fn shape() -> BodyShape<Self> {
        BodyShape::Wrapped(WrappedShape::new(Semver))
    }
}

#[derive(Debug, PartialEq)]
struct Pair {
    a: i64,
    b: i64,
}

impl DeclShape for Pair {
    const TYPE_NAME: &'static str = "Pair";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<i64>("a")
                .field::<i64>("b")
                .construct(|(((), a), b)| Pair { a, b }),
        )
    }
}

// --- expression helpers ---

fn sp() -> Span {
    Span::default()
}

fn s(value: &str) -> ExprNode {
    ExprNode::String(value.to_string(), sp())
}

fn int(value: i64) -> ExprNode {
    ExprNode::Int(value, sp())
}

fn boolean(value: bool) -> ExprNode {
    ExprNode::Bool(value, sp())
}

fn ident(name: &str) -> ExprNode {
    ExprNode::Identifier(name.to_string(), sp())
}

fn list(items: Vec<ExprNode>) -> ExprNode {
    ExprNode::List(items, sp())
}

fn dict(entries: Vec<(&str, ExprNode)>) -> ExprNode {
    ExprNode::Dict(
        entries
            .into_iter()
            .map(|(name, value)| DictField {
                name: name.to_string(),
                value,
                span: sp(),
            })
            .collect(),
        sp(),
    )
}

fn quoted(tag: &str, text: &str) -> ExprNode {
    ExprNode::Quoted {
        tag: tag.to_string(),
        text: text.to_string(),
        span: sp(),
    }
}

fn import_named(symbol: &str, path: &str) -> ExprNode {
    ExprNode::Import {
        symbol: ImportSymbol::Named(symbol.to_string()),
        path: path.to_string(),
        span: sp(),
    }
}

fn declaration(type_tag: &str, name: &str, body: ExprNode) -> Declaration {
    Declaration {
        type_tag: type_tag.to_string(),
        name: name.to_string(),
        body,
        span: sp(),
    }
}

fn registry() -> DeclRegistry {
    DeclRegistry::builder()
        .decl::<Volume>()
        .decl::<Service>()
        .decl::<Job>()
        .decl::<Migration>()
        .decl::<Sidecar>()
        .decl::<Semver>()
        .decl::<Pair>()
        .enum_type::<RestartPolicy>()
        .finish()
        .expect("registry builds")
}

fn cache_volume() -> Declaration {
    declaration("volume", "cache", dict(vec![("size", s("2Gi"))]))
}

fn single_ok(results: Vec<EvalResult<Decl>>) -> Decl {
    assert_eq!(results.len(), 1);
    results.into_iter().next().unwrap().expect("evaluates")
}

// --- schema side ---

#[test]
fn test_wrapped_schema_is_direct_value() {
    let registry = registry();
    let semver = registry.lookup_decl("semver").unwrap();
    assert_eq!(semver.host_type(), "Semver");
    assert_eq!(
        *semver.body_type(),
        SchemaBodyType::Value(SchemaType::String)
    );
}

#[test]
fn test_record_schema_preserves_order_and_optionality() {
    let registry = registry();
    let service = registry.lookup_decl("service").unwrap();
    let SchemaBodyType::Dict(entries) = service.body_type() else {
        panic!("expected a dict body");
    };
    assert_eq!(
        *entries,
        vec![
            DictEntry {
                name: "image",
                ty: SchemaType::String,
                required: true,
            },
            DictEntry {
                name: "replicas",
                ty: SchemaType::Int,
                required: true,
            },
            DictEntry {
                name: "restart",
                ty: SchemaType::EnumRef("restartPolicy".into()),
                required: true,
            },
            DictEntry {
                name: "data",
                ty: SchemaType::DeclRef("volume".into()),
                required: true,
            },
            DictEntry {
                name: "env",
                ty: SchemaType::List(Box::new(SchemaType::String)),
                required: true,
            },
            DictEntry {
                name: "public",
                ty: SchemaType::Bool,
                required: false,
            },
        ]
    );
}

// --- evaluation side ---

#[test]
fn test_wrapped_round_trip() {
    let registry = registry();
    let results =
        registry.evaluate_document(&[declaration("semver", "minVersion", s("1.4.0"))]);
    let decl = single_ok(results);
    assert_eq!(decl.name(), "minVersion");
    assert_eq!(decl.type_name(), "semver");
    assert_eq!(decl.downcast::<Semver>(), Some(&Semver("1.4.0".into())));
}

#[test]
fn test_service_document_evaluates() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        cache_volume(),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("registry.local/api:1.4")),
                ("replicas", int(3)),
                ("restart", ident("onFailure")),
                ("data", ident("cache")),
                ("env", list(vec![s("LOG=debug"), s("PORT=8080")])),
                ("public", boolean(true)),
            ]),
        ),
    ]);
    assert_eq!(results.len(), 2);
    let api = results[1].as_ref().expect("service evaluates");
    assert_eq!(
        api.downcast::<Service>(),
        Some(&Service {
            image: "registry.local/api:1.4".into(),
            replicas: 3,
            restart: RestartPolicy::OnFailure,
            data: Ref::new("cache"),
            env: vec!["LOG=debug".into(), "PORT=8080".into()],
            public: Some(true),
        })
    );
}

#[test]
fn test_fields_construct_in_declared_order() {
    // dict entries supplied out of order still construct (a, b), not (b, a)
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "pair",
        "p",
        dict(vec![("b", int(2)), ("a", int(1))]),
    )]);
    let decl = single_ok(results);
    assert_eq!(decl.downcast::<Pair>(), Some(&Pair { a: 1, b: 2 }));
}

#[test]
fn test_missing_required_field() {
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "volume",
        "cache",
        dict(vec![]),
    )]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::MissingRequiredField { field, decl_type, .. } => {
            assert_eq!(field, "size");
            assert_eq!(decl_type, "volume");
        }
        other => panic!("expected MissingRequiredField, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_suggestion() {
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "volume",
        "cache",
        dict(vec![("sise", s("2Gi"))]),
    )]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::UnknownDictField { field, help, .. } => {
            assert_eq!(field, "sise");
            assert_eq!(help, "did you mean 'size'?");
        }
        other => panic!("expected UnknownDictField, got {:?}", other),
    }
}

#[test]
fn test_absent_optional_never_invokes_inner_evaluator() {
    // `backup` is an optional reference; with no volumes declared, the
    // inner evaluator would fail if it ran at all
    let registry = registry();
    let job_body = dict(vec![
        ("schedule", s("0 3 * * *")),
        ("handler", import_named("nightly", "@src/jobs.ts")),
    ]);
    let results =
        registry.evaluate_document(&[declaration("job", "nightly", job_body.clone())]);
    let decl = single_ok(results);
    assert_eq!(
        decl.downcast::<Job>(),
        Some(&Job {
            schedule: "0 3 * * *".into(),
            handler: ExtImport {
                symbol: ImportSymbol::Named("nightly".into()),
                path: "@src/jobs.ts".into(),
            },
            timeout: None,
            backup: None,
        })
    );

    // the same field present but unresolved proves the inner evaluator
    // does run when a value is supplied
    let mut entries = match job_body {
        ExprNode::Dict(entries, _) => entries,
        _ => unreachable!(),
    };
    entries.push(DictField {
        name: "backup".into(),
        value: ident("missing"),
        span: sp(),
    });
    let results = registry.evaluate_document(&[declaration(
        "job",
        "nightly",
        ExprNode::Dict(entries, sp()),
    )]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        EvalError::UnresolvedReference { name, .. } if name == "missing"
    ));
}

#[test]
fn test_reference_type_mismatch() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        declaration(
            "job",
            "nightly",
            dict(vec![
                ("schedule", s("@daily")),
                ("handler", import_named("run", "@src/jobs.ts")),
            ]),
        ),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("always")),
                ("data", ident("nightly")),
                ("env", list(vec![])),
            ]),
        ),
    ]);
    assert!(results[0].is_ok());
    let err = results.into_iter().nth(1).unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::ReferenceTypeMismatch {
            reference,
            expected,
            actual,
            ..
        } => {
            assert_eq!(reference, "nightly");
            assert_eq!(expected, "volume");
            assert_eq!(actual, "job");
        }
        other => panic!("expected ReferenceTypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_enum_label_round_trips_exactly() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        cache_volume(),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("never")),
                ("data", ident("cache")),
                ("env", list(vec![])),
            ]),
        ),
    ]);
    let api = results[1].as_ref().expect("service evaluates");
    let service = api.downcast::<Service>().unwrap();
    assert_eq!(service.restart, RestartPolicy::Never);
    assert_eq!(service.restart.label(), "never");
}

#[test]
fn test_invalid_enum_label() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        cache_volume(),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("sometimes")),
                ("data", ident("cache")),
                ("env", list(vec![])),
            ]),
        ),
    ]);
    let err = results.into_iter().nth(1).unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::InvalidEnumLabel { label, allowed, .. } => {
            assert_eq!(label, "sometimes");
            assert_eq!(allowed, "always, onFailure, never");
        }
        other => panic!("expected InvalidEnumLabel, got {:?}", other),
    }
}

#[test]
fn test_list_elements_evaluate_in_order() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        cache_volume(),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("always")),
                ("data", ident("cache")),
                ("env", list(vec![s("A"), s("B"), s("C")])),
            ]),
        ),
    ]);
    let api = results[1].as_ref().expect("service evaluates");
    let service = api.downcast::<Service>().unwrap();
    assert_eq!(service.env, vec!["A", "B", "C"]);
}

#[test]
fn test_list_failure_attributes_element_index() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        cache_volume(),
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("always")),
                ("data", ident("cache")),
                ("env", list(vec![s("A"), int(7), s("C")])),
            ]),
        ),
    ]);
    let err = results.into_iter().nth(1).unwrap().unwrap_err();
    // in declaration 'api' -> in field 'env' -> at index 1 -> type mismatch
    let EvalError::InDeclaration { name, source } = err else {
        panic!("expected InDeclaration");
    };
    assert_eq!(name, "api");
    let EvalError::InField { field, source } = *source else {
        panic!("expected InField");
    };
    assert_eq!(field, "env");
    let EvalError::InElement { index, source } = *source else {
        panic!("expected InElement");
    };
    assert_eq!(index, 1);
    assert!(matches!(*source, EvalError::KindMismatch { .. }));
}

#[test]
fn test_quoted_block_and_tag_mismatch() {
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "migration",
        "init",
        dict(vec![("apply", quoted("sql", "CREATE TABLE users (id int);"))]),
    )]);
    let decl = single_ok(results);
    assert_eq!(
        decl.downcast::<Migration>(),
        Some(&Migration {
            apply: SqlBlock("CREATE TABLE users (id int);".into()),
        })
    );

    let results = registry.evaluate_document(&[declaration(
        "migration",
        "init",
        dict(vec![("apply", quoted("json", "{}"))]),
    )]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::QuotedTagMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, "sql");
            assert_eq!(found, "json");
        }
        other => panic!("expected QuotedTagMismatch, got {:?}", other),
    }
}

#[test]
fn test_json_blob_passes_through_unchanged() {
    let registry = registry();
    let raw = r#"{"retries": 3, "burst": [1, 2]}"#;
    let results = registry.evaluate_document(&[declaration(
        "sidecar",
        "proxy",
        dict(vec![("config", quoted("json", raw))]),
    )]);
    let decl = single_ok(results);
    assert_eq!(
        decl.downcast::<Sidecar>(),
        Some(&Sidecar {
            config: Json(raw.into()),
        })
    );
}

#[test]
fn test_integer_promotes_to_double_field() {
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "job",
        "nightly",
        dict(vec![
            ("schedule", s("@daily")),
            ("handler", import_named("run", "@src/jobs.ts")),
            ("timeout", int(30)),
        ]),
    )]);
    let decl = single_ok(results);
    assert_eq!(decl.downcast::<Job>().unwrap().timeout, Some(30.0));
}

#[test]
fn test_dict_body_required_for_record_types() {
    let registry = registry();
    let results =
        registry.evaluate_document(&[declaration("volume", "cache", s("2Gi"))]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        EvalError::KindMismatch { found, .. } if *found == "a string literal"
    ));
}

// --- document driver ---

#[test]
fn test_sibling_declarations_are_isolated() {
    let registry = registry();
    let results = registry.evaluate_document(&[
        declaration("volume", "broken", dict(vec![])),
        cache_volume(),
    ]);
    assert!(results[0].is_err());
    let cache = results[1].as_ref().expect("sibling still evaluates");
    assert_eq!(cache.downcast::<Volume>(), Some(&Volume { size: "2Gi".into() }));
}

#[test]
fn test_references_are_order_independent() {
    // the service appears before the volume it references
    let registry = registry();
    let results = registry.evaluate_document(&[
        declaration(
            "service",
            "api",
            dict(vec![
                ("image", s("api:1")),
                ("replicas", int(1)),
                ("restart", ident("always")),
                ("data", ident("cache")),
                ("env", list(vec![])),
            ]),
        ),
        cache_volume(),
    ]);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
}

#[test]
fn test_duplicate_declaration_names() {
    let registry = registry();
    let results = registry.evaluate_document(&[cache_volume(), cache_volume()]);
    assert!(results[0].is_ok());
    let err = results.into_iter().nth(1).unwrap().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        EvalError::DuplicateDeclaration { name, .. } if name == "cache"
    ));
}

#[test]
fn test_unknown_declaration_type() {
    let registry = registry();
    let results = registry.evaluate_document(&[declaration(
        "servce",
        "api",
        dict(vec![]),
    )]);
    let err = results.into_iter().next().unwrap().unwrap_err();
    match err.root_cause() {
        EvalError::UnknownDeclType { type_tag, help, .. } => {
            assert_eq!(type_tag, "servce");
            assert_eq!(help, "did you mean 'service'?");
        }
        other => panic!("expected UnknownDeclType, got {:?}", other),
    }
}

// --- build-time rejections ---

struct LegacyVolume {
    size: String,
}

impl DeclShape for LegacyVolume {
    const TYPE_NAME: &'static str = "Volume";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<String>("size")
                .construct(|((), size)| LegacyVolume { size }),
        )
    }
}

#[test]
fn test_duplicate_derived_names_fail_before_evaluation() {
    let err = DeclRegistry::builder()
        .decl::<Volume>()
        .decl::<LegacyVolume>()
        .finish()
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::DuplicateDeclName { name } if name == "volume"
    ));
}

struct Bare;

impl DeclShape for Bare {
    const TYPE_NAME: &'static str = "Bare";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(RecordBuilder::new().construct(|()| Bare))
    }
}

#[test]
fn test_empty_record_rejected() {
    let err = DeclRegistry::builder().decl::<Bare>().finish().unwrap_err();
    assert!(matches!(err, SynthesisError::EmptyRecord { decl } if decl == "Bare"));
}

// evaluation never runs for a registry that failed to build, so a typed
// reference into an unregistered declaration type must die at finish()
struct Orphaned {
    data: Ref<Volume>,
}

impl DeclShape for Orphaned {
    const TYPE_NAME: &'static str = "Orphaned";

    fn shape() -> BodyShape<Self> {
        BodyShape::Record(
            RecordBuilder::new()
                .field::<Ref<Volume>>("data")
                .construct(|((), data)| Orphaned { data }),
        )
    }
}

#[test]
fn test_reference_to_unregistered_type_fails_at_build() {
    let err = DeclRegistry::builder()
        .decl::<Orphaned>()
        .finish()
        .unwrap_err();
    assert!(matches!(err, SynthesisError::UnsupportedShape { .. }));
}

// --- bindings are plain data, usable directly with eval_kind ---

#[test]
fn test_direct_eval_kind_usage() {
    let registry = registry();
    let mut bindings = Bindings::new();
    bindings.bind("cache", "volume");
    let value = keel::eval_kind(
        &keel::Kind::DeclRef("volume".into()),
        &ident("cache"),
        &bindings,
        &registry,
    )
    .unwrap();
    assert_eq!(value, TypedValue::DeclRef("cache".into()));
}
