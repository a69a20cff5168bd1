//! Example query module.
//!
//! Mirrors the procedures a new module usually starts from: a read-only
//! "hello world", a write procedure that creates a vertex, a path walk, and a
//! transformation turning stream messages into parameterized queries.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::host::HostModule;
use crate::proxy::{Messages, Path, ProcCtx, Vertex};
use crate::registry::{Args, ProcedureBuilder, TransformationBuilder};
use crate::typing::{Any, Nullable};
use crate::value::{Record, Value};

/// Query emitted for every message by `messages_to_queries`.
pub const MESSAGE_QUERY: &str =
    "CREATE (n:MESSAGE {timestamp: $timestamp, payload: $payload, topic: $topic})";

/// Registers every example routine with `module`.
pub fn register(module: &mut dyn HostModule) -> Result<()> {
    ProcedureBuilder::read("procedure")
        .arg::<Any>("required_arg")
        .opt_arg::<Nullable<Any>>("optional_arg", Value::Null)
        .result::<Vec<Value>>("args")
        .result::<String>("result")
        .body(hello)
        .build()?
        .register(module)?;

    ProcedureBuilder::write("write_procedure")
        .arg::<String>("required_arg")
        .opt_arg::<Nullable<String>>("optional_arg", Value::Null)
        .result::<Vertex>("result")
        .body(create_vertex)
        .build()?
        .register(module)?;

    ProcedureBuilder::read("walk")
        .arg::<Vertex>("start")
        .opt_arg::<i64>("hops", 3i64)
        .result::<Path>("path")
        .body(walk)
        .build()?
        .register(module)?;

    TransformationBuilder::new("messages_to_queries")
        .body_without_context(messages_to_queries)
        .build()?
        .register(module)?;

    Ok(())
}

fn hello(_ctx: ProcCtx, args: Args) -> Record {
    Record::new()
        .with("args", args.into_values())
        .with("result", "Hello World!")
}

fn create_vertex(ctx: ProcCtx, args: Args) -> Result<Record> {
    let vertex = ctx.graph()?.create_vertex()?;
    let properties = vertex.properties()?;
    properties.set("required_arg", args.get::<String>("required_arg")?)?;
    if let Some(optional) = args.get::<Option<String>>("optional_arg")? {
        properties.set("optional_arg", optional)?;
    }
    Ok(Record::new().with("result", vertex))
}

/// Follows the first outgoing edge of each vertex for up to `hops` steps.
fn walk(ctx: ProcCtx, args: Args) -> Result<Record> {
    let start = args.get::<Vertex>("start")?;
    let hops = args.get::<i64>("hops")?.max(0);
    let path = Path::make_with_start(&start)?;
    let mut current = start;
    for _ in 0..hops {
        ctx.check_must_abort()?;
        let Some(edge) = current.out_edges()?.next().transpose()? else {
            break;
        };
        path.expand(&edge)?;
        current = edge.to_vertex()?;
    }
    Ok(Record::new().with("path", path))
}

fn messages_to_queries(messages: Messages) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(messages.total_messages()?);
    for message in messages.iter()? {
        let message = message?;
        let payload = String::from_utf8_lossy(&message.payload()?).into_owned();
        let parameters = BTreeMap::from([
            ("timestamp".to_owned(), Value::from(message.timestamp()?)),
            ("payload".to_owned(), Value::from(payload)),
            ("topic".to_owned(), Value::from(message.topic_name()?)),
        ]);
        records.push(
            Record::new()
                .with("query", MESSAGE_QUERY)
                .with("parameters", parameters),
        );
    }
    Ok(records)
}
