use std::future::Future;
use std::pin::Pin;

use sombra_procs::host::memory::{AccessMode, MemoryDb, MemoryModule};
use sombra_procs::host::{GraphRef, HostGraph};
use sombra_procs::registry::{AsyncGenerator, Coroutine, Generator};
use sombra_procs::types::ElementRef;
use sombra_procs::typing::{Any, Nullable};
use sombra_procs::{
    example, Annotation, Class, EdgeType, Graph, HostValue, ProcError, ProcedureBuilder, Record,
    SignatureReason, Value, Vertex,
};

fn example_module() -> (MemoryDb, MemoryModule) {
    let db = MemoryDb::new();
    let mut module = MemoryModule::new("example", db.clone());
    example::register(&mut module).unwrap();
    (db, module)
}

fn seed_vertex(db: &MemoryDb) -> sombra_procs::VertexId {
    let scope = db.begin_scope(AccessMode::ReadWrite);
    let id = scope.create_vertex().unwrap();
    scope.end();
    id
}

#[test]
fn hello_procedure_echoes_its_arguments() {
    let (_db, module) = example_module();

    let records = module
        .call("procedure", vec![HostValue::Int(1), HostValue::Int(2)])
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("args"),
        Some(&HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]))
    );
    assert_eq!(records[0].get("result"), Some(&HostValue::from("Hello World!")));

    let records = module.call("procedure", vec![HostValue::Int(1)]).unwrap();
    assert_eq!(
        records[0].get("args"),
        Some(&HostValue::List(vec![HostValue::Int(1), HostValue::Null]))
    );
}

#[test]
fn printed_signatures_follow_declarations() {
    let (_db, module) = example_module();
    assert_eq!(
        module.signature("procedure").unwrap(),
        "example.procedure(required_arg :: ANY, optional_arg = null :: ANY?) :: (args :: LIST OF ANY?, result :: STRING)"
    );
    assert_eq!(
        module.signature("walk").unwrap(),
        "example.walk(start :: NODE, hops = 3 :: INTEGER) :: (path :: PATH)"
    );
    assert!(module.signature("missing").is_none());
    assert_eq!(
        module.procedure_names().collect::<Vec<_>>(),
        vec!["procedure", "write_procedure", "walk"]
    );
    assert_eq!(
        module.transformation_names().collect::<Vec<_>>(),
        vec!["messages_to_queries"]
    );
}

#[test]
fn write_procedure_in_read_only_scope_is_immutable() {
    let (db, module) = example_module();
    let scope = db.begin_scope(AccessMode::ReadOnly);
    let graph: GraphRef = scope.clone();

    let err = module
        .invoke("write_procedure", graph, vec![HostValue::from("x")])
        .unwrap_err();
    assert!(matches!(err, ProcError::Immutable(_)), "got {err:?}");
    assert_eq!(err.code(), "ImmutableError");
    scope.end();
    assert_eq!(db.vertex_count(), 0);
}

#[test]
fn read_only_module_forces_immutable_scopes() {
    let db = MemoryDb::new();
    let mut module = MemoryModule::new("example", db.clone()).read_only(true);
    example::register(&mut module).unwrap();

    assert_eq!(module.access_mode("write_procedure").unwrap(), AccessMode::ReadOnly);
    let err = module
        .call("write_procedure", vec![HostValue::from("x")])
        .unwrap_err();
    assert!(matches!(err, ProcError::Immutable(_)));
    assert_eq!(db.vertex_count(), 0);
}

#[test]
fn write_procedure_stores_its_arguments() {
    let (db, module) = example_module();
    let scope = db.begin_scope(module.access_mode("write_procedure").unwrap());
    let graph: GraphRef = scope.clone();

    let records = module
        .invoke(
            "write_procedure",
            graph,
            vec![HostValue::from("x"), HostValue::from("y")],
        )
        .unwrap();
    let Some(HostValue::Vertex(id)) = records[0].get("result").cloned() else {
        panic!("expected a vertex, got {records:?}");
    };
    assert_eq!(
        scope.get_property(ElementRef::Vertex(id), "required_arg").unwrap(),
        HostValue::from("x")
    );
    assert_eq!(
        scope.get_property(ElementRef::Vertex(id), "optional_arg").unwrap(),
        HostValue::from("y")
    );
    scope.end();
    assert_eq!(db.vertex_count(), 1);
}

#[test]
fn deleting_a_connected_vertex_needs_detach() {
    let db = MemoryDb::new();
    let scope = db.begin_scope(AccessMode::ReadWrite);
    let graph = Graph::new(scope.clone());

    let a = graph.create_vertex().unwrap();
    let b = graph.create_vertex().unwrap();
    graph.create_edge(&a, &b, "KNOWS").unwrap();

    let err = graph.delete_vertex(&a).unwrap_err();
    assert!(matches!(err, ProcError::Logic(_)), "got {err:?}");
    assert!(graph.vertices().unwrap().contains(&a).unwrap());

    graph.detach_delete_vertex(&a).unwrap();
    let remaining: Vec<_> = graph
        .vertices()
        .unwrap()
        .iter()
        .unwrap()
        .map(|vertex| vertex.and_then(|vertex| vertex.id()))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(remaining, vec![b.id().unwrap()]);
    let vertices = graph.vertices().unwrap();
    assert!(!vertices.contains(&a).unwrap());
    assert!(vertices.contains(&b).unwrap());
    assert_eq!(b.in_edges().unwrap().count(), 0);
    assert_eq!(db.edge_count(), 0);
}

#[test]
fn unsupported_routine_shapes_are_rejected_before_registration() {
    let db = MemoryDb::new();
    let mut module = MemoryModule::new("shapes", db);

    let coroutine = ProcedureBuilder::read("later")
        .result::<String>("value")
        .body(|_ctx, _args| Coroutine::<Record>(Box::pin(async { Record::new() })))
        .build();
    let async_generator = ProcedureBuilder::read("stream")
        .body(|_ctx, _args| {
            AsyncGenerator(Box::new(
                || -> Pin<Box<dyn Future<Output = Option<Record>>>> { Box::pin(async { None }) },
            ))
        })
        .build();
    let generator = ProcedureBuilder::read("lazy")
        .body_without_context(|_args| Generator(Box::new(std::iter::empty::<Record>())))
        .build();

    let reasons: Vec<SignatureReason> = [coroutine.err(), async_generator.err(), generator.err()]
        .into_iter()
        .map(|err| match err {
            Some(ProcError::Signature { reason, .. }) => reason,
            other => panic!("expected a signature error, got {other:?}"),
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            SignatureReason::Coroutine,
            SignatureReason::AsyncGenerator,
            SignatureReason::Generator,
        ]
    );
    assert_eq!(
        SignatureReason::Generator.to_string(),
        "generator routines are not yet supported"
    );
    assert_eq!(module.procedure_names().count(), 0);

    ProcedureBuilder::read("now")
        .body(|_ctx, _args| Record::new())
        .build()
        .unwrap()
        .register(&mut module)
        .unwrap();
    assert_eq!(module.procedure_names().collect::<Vec<_>>(), vec!["now"]);
}

#[test]
fn unsupported_annotation_blocks_the_whole_declaration() {
    let db = MemoryDb::new();
    let module = MemoryModule::new("types", db);

    let err = ProcedureBuilder::read("takes_dict")
        .arg::<Any>("first")
        .arg_with("second", Annotation::Class(Class::Dict))
        .body(|_ctx, _args| Record::new())
        .build()
        .err()
        .unwrap();
    match err {
        ProcError::UnsupportedType { annotation } => assert_eq!(annotation, "dict"),
        other => panic!("expected unsupported type, got {other:?}"),
    }
    assert_eq!(module.procedure_names().count(), 0);

    let err = ProcedureBuilder::read("bad_default")
        .opt_arg::<i64>("limit", "ten")
        .body(|_ctx, _args| Record::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ProcError::Conversion(_)));

    let err = ProcedureBuilder::read("ordering")
        .opt_arg::<Nullable<i64>>("limit", Value::Null)
        .arg::<String>("name")
        .body(|_ctx, _args| Record::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ProcError::Signature {
            reason: SignatureReason::RequiredAfterOptional(_),
            ..
        }
    ));
}

#[test]
fn registering_twice_is_a_key_conflict() {
    let (_db, mut module) = example_module();
    let err = example::register(&mut module).unwrap_err();
    assert!(matches!(err, ProcError::KeyConflict(_)), "got {err:?}");
    assert_eq!(module.procedure_names().count(), 3);
}

#[test]
fn wrong_arity_and_wrong_types_are_rejected_by_the_host() {
    let (db, module) = example_module();
    let err = module.call("procedure", Vec::new()).unwrap_err();
    assert!(matches!(err, ProcError::InvalidArgument(_)));

    let err = module
        .call(
            "procedure",
            vec![HostValue::Int(1), HostValue::Int(2), HostValue::Int(3)],
        )
        .unwrap_err();
    assert!(matches!(err, ProcError::InvalidArgument(_)));

    let err = module.call("walk", vec![HostValue::from("start")]).unwrap_err();
    assert!(matches!(err, ProcError::Conversion(_)));

    let err = module.call("procedure", vec![HostValue::Null]).unwrap_err();
    assert!(matches!(err, ProcError::Conversion(_)));

    let err = module.call("nowhere", Vec::new()).unwrap_err();
    assert!(matches!(err, ProcError::InvalidArgument(_)));
    assert_eq!(db.vertex_count(), 0);
}

#[test]
fn walk_follows_out_edges() {
    let db = MemoryDb::new();
    let mut module = MemoryModule::new("example", db.clone());
    example::register(&mut module).unwrap();

    let setup = db.begin_scope(AccessMode::ReadWrite);
    let next = EdgeType::new("NEXT");
    let ids: Vec<_> = (0..4).map(|_| setup.create_vertex().unwrap()).collect();
    for pair in ids.windows(2) {
        setup.create_edge(pair[0], pair[1], &next).unwrap();
    }
    setup.end();

    let scope = db.begin_scope(AccessMode::ReadOnly);
    let graph: GraphRef = scope.clone();
    let records = module
        .invoke(
            "walk",
            graph,
            vec![HostValue::Vertex(ids[0]), HostValue::Int(2)],
        )
        .unwrap();
    let Some(HostValue::Path(path)) = records[0].get("path").cloned() else {
        panic!("expected a path, got {records:?}");
    };
    assert_eq!(scope.path_size(path).unwrap(), 2);
    assert_eq!(scope.path_vertex_at(path, 2).unwrap(), ids[2]);

    let graph: GraphRef = scope.clone();
    let records = module
        .invoke("walk", graph, vec![HostValue::Vertex(ids[0])])
        .unwrap();
    let Some(HostValue::Path(path)) = records[0].get("path").cloned() else {
        panic!("expected a path, got {records:?}");
    };
    assert_eq!(scope.path_size(path).unwrap(), 3);
    scope.end();
}

#[test]
fn abort_request_stops_the_routine() {
    let (db, module) = example_module();
    let start = seed_vertex(&db);

    let scope = db.begin_scope(AccessMode::ReadOnly);
    scope.abort_handle().request_abort();
    let graph: GraphRef = scope.clone();
    let err = module
        .invoke("walk", graph, vec![HostValue::Vertex(start)])
        .unwrap_err();
    assert!(matches!(err, ProcError::Abort));
    assert_eq!(err.code(), "AbortError");
    scope.end();
}

#[test]
fn concurrent_writers_conflict_and_may_retry() {
    let db = MemoryDb::new();
    let id = seed_vertex(&db);

    let first = db.begin_scope(AccessMode::ReadWrite);
    let second = db.begin_scope(AccessMode::ReadWrite);
    let first_graph = Graph::new(first.clone());
    let second_graph = Graph::new(second.clone());

    let mine = first_graph.get_vertex_by_id(id).unwrap();
    mine.properties().unwrap().set("owner", "first").unwrap();

    let theirs: Vertex = second_graph.get_vertex_by_id(id).unwrap();
    let err = theirs.properties().unwrap().set("owner", "second").unwrap_err();
    assert!(matches!(err, ProcError::Conflict(_)), "got {err:?}");
    assert!(err.is_retryable());

    first.end();
    theirs.properties().unwrap().set("owner", "second").unwrap();
    assert_eq!(
        theirs.properties().unwrap().get("owner").unwrap().as_str(),
        Some("second")
    );
    second.end();
}

#[test]
fn undeclared_result_fields_are_a_logic_error() {
    let db = MemoryDb::new();
    let mut module = MemoryModule::new("strict", db);
    ProcedureBuilder::read("leaky")
        .result::<i64>("count")
        .body_without_context(|_args| Record::new().with("count", 1i64).with("extra", true))
        .build()
        .unwrap()
        .register(&mut module)
        .unwrap();
    ProcedureBuilder::read("mistyped")
        .result::<i64>("count")
        .body_without_context(|_args| Record::new().with("count", "one"))
        .build()
        .unwrap()
        .register(&mut module)
        .unwrap();

    let err = module.call("leaky", Vec::new()).unwrap_err();
    assert!(matches!(err, ProcError::Logic(_)));
    let err = module.call("mistyped", Vec::new()).unwrap_err();
    assert!(matches!(err, ProcError::Conversion(_)));
}

#[test]
fn missing_vertex_lookup_is_a_range_error() {
    let db = MemoryDb::new();
    let scope = db.begin_scope(AccessMode::ReadOnly);
    let graph = Graph::new(scope.clone());
    let err = graph.get_vertex_by_id(sombra_procs::VertexId(42)).unwrap_err();
    assert!(matches!(err, ProcError::Range(_)));
    assert!(graph.find_vertex(sombra_procs::VertexId(42)).unwrap().is_none());
    scope.end();
}
