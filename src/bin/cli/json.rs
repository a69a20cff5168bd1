use serde_json::{json, Map, Value as JsonValue};
use sombra_procs::host::{HostError, HostGraph, HostIter};
use sombra_procs::types::ElementRef;
use sombra_procs::value::{HostRecord, HostValue};
use sombra_procs::{EdgeId, VertexId};

/// Converts a JSON argument. `{"vertex": N}` and `{"edge": N}` name graph
/// elements by id; every other object becomes a map.
pub fn to_host(value: JsonValue) -> HostValue {
    match value {
        JsonValue::Null => HostValue::Null,
        JsonValue::Bool(v) => HostValue::Bool(v),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => HostValue::Int(v),
            None => HostValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(v) => HostValue::String(v),
        JsonValue::Array(items) => HostValue::List(items.into_iter().map(to_host).collect()),
        JsonValue::Object(entries) => {
            if let Some(element) = element_ref(&entries) {
                return element;
            }
            HostValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, to_host(value)))
                    .collect(),
            )
        }
    }
}

fn element_ref(entries: &Map<String, JsonValue>) -> Option<HostValue> {
    if entries.len() != 1 {
        return None;
    }
    let (key, value) = entries.iter().next()?;
    let id = value.as_u64()?;
    match key.as_str() {
        "vertex" => Some(HostValue::Vertex(VertexId(id))),
        "edge" => Some(HostValue::Edge(EdgeId(id))),
        _ => None,
    }
}

/// Renders a result record. Graph elements are expanded while `graph` is
/// still in scope; without a graph they render as bare ids.
pub fn record_to_json(
    graph: Option<&dyn HostGraph>,
    record: &HostRecord,
) -> Result<JsonValue, HostError> {
    let mut object = Map::new();
    for (name, value) in record {
        object.insert(name.clone(), to_json(graph, value)?);
    }
    Ok(JsonValue::Object(object))
}

fn to_json(graph: Option<&dyn HostGraph>, value: &HostValue) -> Result<JsonValue, HostError> {
    Ok(match value {
        HostValue::Null => JsonValue::Null,
        HostValue::Bool(v) => json!(v),
        HostValue::Int(v) => json!(v),
        HostValue::Float(v) => json!(v),
        HostValue::String(v) => json!(v),
        HostValue::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| to_json(graph, item))
                .collect::<Result<_, _>>()?,
        ),
        HostValue::Map(entries) => {
            let mut object = Map::new();
            for (key, item) in entries {
                object.insert(key.clone(), to_json(graph, item)?);
            }
            JsonValue::Object(object)
        }
        HostValue::Vertex(id) => match graph {
            Some(graph) => vertex_json(graph, *id)?,
            None => json!({ "vertex": id.0 }),
        },
        HostValue::Edge(id) => match graph {
            Some(graph) => json!({
                "edge": id.0,
                "type": graph.edge_type(*id)?.name(),
                "from": graph.edge_from(*id)?.0,
                "to": graph.edge_to(*id)?.0,
            }),
            None => json!({ "edge": id.0 }),
        },
        HostValue::Path(id) => match graph {
            Some(graph) => {
                let size = graph.path_size(*id)?;
                let vertices = (0..=size)
                    .map(|index| graph.path_vertex_at(*id, index).map(|v| v.0))
                    .collect::<Result<Vec<_>, _>>()?;
                let edges = (0..size)
                    .map(|index| graph.path_edge_at(*id, index).map(|e| e.0))
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "vertices": vertices, "edges": edges })
            }
            None => json!({ "path": id.0 }),
        },
        HostValue::Date(v) => json!(v.to_string()),
        HostValue::LocalTime(v) => json!(v.to_string()),
        HostValue::LocalDateTime(v) => json!(v.to_string()),
        HostValue::Duration(v) => json!(v.to_string()),
    })
}

fn vertex_json(graph: &dyn HostGraph, id: VertexId) -> Result<JsonValue, HostError> {
    let labels = (0..graph.labels_count(id)?)
        .map(|index| graph.label_at(id, index).map(|label| label.name().to_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut properties = Map::new();
    let mut cursor = graph.iter_properties(ElementRef::Vertex(id))?;
    while let Some((name, value)) = cursor.next()? {
        properties.insert(name, to_json(Some(graph), &value)?);
    }
    Ok(json!({ "vertex": id.0, "labels": labels, "properties": properties }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_objects_become_references() {
        assert_eq!(to_host(json!({ "vertex": 3 })), HostValue::Vertex(VertexId(3)));
        assert_eq!(
            to_host(json!({ "vertex": 3, "extra": 1 })),
            HostValue::Map(
                [
                    ("extra".to_owned(), HostValue::Int(1)),
                    ("vertex".to_owned(), HostValue::Int(3)),
                ]
                .into_iter()
                .collect()
            )
        );
        assert_eq!(to_host(json!(1.5)), HostValue::Float(1.5));
    }

    #[test]
    fn paths_render_as_flat_id_lists() {
        let db = sombra_procs::host::memory::MemoryDb::new();
        let scope = db.begin_scope(sombra_procs::host::memory::AccessMode::ReadWrite);
        let first = scope.create_vertex().unwrap();
        let second = scope.create_vertex().unwrap();
        let edge = scope
            .create_edge(first, second, &sombra_procs::EdgeType::new("NEXT"))
            .unwrap();
        let path = scope.path_make_with_start(first).unwrap();
        scope.path_expand(path, edge).unwrap();

        let record: HostRecord = [("path".to_owned(), HostValue::Path(path))]
            .into_iter()
            .collect();
        let graph: &dyn HostGraph = &*scope;
        let rendered = record_to_json(Some(graph), &record).unwrap();
        assert_eq!(
            rendered,
            json!({ "path": { "vertices": [first.0, second.0], "edges": [edge.0] } })
        );
        scope.end();
    }

    #[test]
    fn records_render_without_a_graph() {
        let record: HostRecord = [
            ("args".to_owned(), HostValue::List(vec![HostValue::Int(1), HostValue::Null])),
            ("result".to_owned(), HostValue::from("Hello World!")),
        ]
        .into_iter()
        .collect();
        let rendered = record_to_json(None, &record).unwrap();
        assert_eq!(
            rendered,
            json!({ "args": [1, null], "result": "Hello World!" })
        );
    }
}
