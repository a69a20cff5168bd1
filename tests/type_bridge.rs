use proptest::prelude::*;
use sombra_procs::typing::{Map, Number};
use sombra_procs::{
    bridge, bridge_text, Annotation, Class, CypherType, Edge, Path, ProcError, TypeDescriptor,
    Value, Vertex,
};

const CLASSES: [Class; 15] = [
    Class::Object,
    Class::TypingAny,
    Class::BareList,
    Class::Bool,
    Class::Str,
    Class::Int,
    Class::Float,
    Class::Dict,
    Class::Vertex,
    Class::Edge,
    Class::Path,
    Class::Date,
    Class::LocalTime,
    Class::LocalDateTime,
    Class::Duration,
];

fn leaf() -> impl Strategy<Value = Annotation> {
    prop_oneof![
        6 => prop::sample::select(CLASSES.to_vec()).prop_map(Annotation::Class),
        1 => prop::sample::select(vec!["set", "tuple", "bytes", "frozenset"])
            .prop_map(|name| Annotation::Other(name.to_owned())),
        1 => Just(Annotation::number()),
        1 => Just(Annotation::map()),
        1 => Just(Annotation::any()),
    ]
}

fn annotation() -> impl Strategy<Value = Annotation> {
    leaf().prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Annotation::list),
            inner.clone().prop_map(Annotation::optional),
            prop::collection::vec(inner, 2..4).prop_map(|members| Annotation::union(members)),
        ]
    })
}

fn is_unsupported(result: &Result<TypeDescriptor, ProcError>) -> bool {
    matches!(result, Err(ProcError::UnsupportedType { .. }))
}

proptest! {
    #[test]
    fn structured_and_textual_paths_agree(ann in annotation()) {
        let structured = bridge(&ann);
        let textual = bridge_text(&ann.printed());
        match (&structured, &textual) {
            (Ok(left), Ok(right)) => prop_assert_eq!(left, right),
            _ => {
                prop_assert!(is_unsupported(&structured), "structured: {:?}", structured);
                prop_assert!(is_unsupported(&textual), "textual: {:?}", textual);
            }
        }
    }

    #[test]
    fn bridging_is_deterministic(ann in annotation()) {
        let first = bridge(&ann).ok();
        let second = bridge(&ann).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn union_member_order_does_not_matter(members in prop::collection::vec(leaf(), 2..4)) {
        let forward = Annotation::union(members.clone());
        let backward = Annotation::union(members.into_iter().rev());
        prop_assert!(forward.same_type(&backward));
        prop_assert_eq!(bridge(&forward).ok(), bridge(&backward).ok());
    }
}

#[test]
fn composition_order_is_preserved() {
    let nullable_list = bridge(&Annotation::optional(Annotation::list(Annotation::Class(
        Class::Int,
    ))))
    .unwrap();
    let list_of_nullable = bridge(&Annotation::list(Annotation::optional(
        Annotation::Class(Class::Int),
    )))
    .unwrap();
    assert_eq!(
        nullable_list,
        TypeDescriptor::nullable(TypeDescriptor::list(TypeDescriptor::Int))
    );
    assert_eq!(
        list_of_nullable,
        TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::Int))
    );
    assert_ne!(nullable_list, list_of_nullable);
}

#[test]
fn unions_without_an_alias_are_rejected() {
    let three = Annotation::union([
        Annotation::Class(Class::Int),
        Annotation::Class(Class::Str),
        Annotation::Class(Class::Bool),
    ]);
    let err = bridge(&three).unwrap_err();
    assert!(matches!(err, ProcError::UnsupportedType { .. }));
    assert_eq!(err.code(), "UnsupportedTypeError");
    assert!(bridge_text(&three.printed()).is_err());
}

#[test]
fn rust_types_declare_the_expected_descriptors() {
    let cases = [
        (<i64 as CypherType>::annotation(), TypeDescriptor::Int),
        (<Vertex as CypherType>::annotation(), TypeDescriptor::Node),
        (<Edge as CypherType>::annotation(), TypeDescriptor::Relationship),
        (<Path as CypherType>::annotation(), TypeDescriptor::Path),
        (<Number as CypherType>::annotation(), TypeDescriptor::Number),
        (<Map as CypherType>::annotation(), TypeDescriptor::Map),
        (
            <Value as CypherType>::annotation(),
            TypeDescriptor::nullable(TypeDescriptor::Any),
        ),
        (
            <Option<Vec<String>> as CypherType>::annotation(),
            TypeDescriptor::nullable(TypeDescriptor::list(TypeDescriptor::String)),
        ),
        (
            <Vec<Option<f64>> as CypherType>::annotation(),
            TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::Float)),
        ),
    ];
    for (annotation, expected) in cases {
        assert_eq!(bridge(&annotation).unwrap(), expected, "{annotation}");
    }
}

#[test]
fn printed_forms_bridge_directly() {
    assert_eq!(
        bridge_text("typing.Union[typing.List[int], NoneType]").unwrap(),
        TypeDescriptor::nullable(TypeDescriptor::list(TypeDescriptor::Int))
    );
    assert_eq!(
        bridge_text("typing.Union[float, int]").unwrap(),
        TypeDescriptor::Number
    );
    assert_eq!(
        bridge_text("typing.List[typing.Union[mgp.Vertex, mgp.Edge, dict]]").unwrap(),
        TypeDescriptor::list(TypeDescriptor::Map)
    );
    assert!(bridge_text("<class 'set'>").is_err());
    assert!(bridge_text("typing.List[int").is_err());
}
