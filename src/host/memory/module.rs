use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use super::{AccessMode, MemoryDb, MemoryMessages, MessageRecord};
use crate::error::{ProcError, Result};
use crate::host::{
    GraphRef, HostError, HostErrorCode, HostModule, HostResult, MessagesRef, ProcAdapter,
    ProcHandle, TransAdapter,
};
use crate::registry::{ParamDescriptor, ResultDescriptor, RoutineDescriptor};
use crate::typing::TypeDescriptor;
use crate::value::{HostRecord, HostValue};

struct RegisteredProc {
    name: String,
    write: bool,
    adapter: ProcAdapter,
    params: Vec<ParamDescriptor>,
    results: Vec<ResultDescriptor>,
}

/// Query module backed by a [`MemoryDb`].
///
/// Collects registrations and plays the query engine: it binds arguments
/// against the declared signature, runs the adapter inside a fresh scope and
/// checks the returned records against the declared result fields.
pub struct MemoryModule {
    name: String,
    db: MemoryDb,
    read_only: bool,
    procedures: Vec<RegisteredProc>,
    transformations: BTreeMap<String, TransAdapter>,
}

fn host_error(code: HostErrorCode, message: impl Into<String>) -> ProcError {
    HostError::new(code, message).into()
}

impl MemoryModule {
    /// Creates an empty module named `name`.
    pub fn new(name: impl Into<String>, db: MemoryDb) -> Self {
        Self {
            name: name.into(),
            db,
            read_only: false,
            procedures: Vec::new(),
            transformations: BTreeMap::new(),
        }
    }

    /// Forces every scope opened by the module to be immutable.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing graph.
    pub fn db(&self) -> &MemoryDb {
        &self.db
    }

    /// Names of registered procedures, in registration order.
    pub fn procedure_names(&self) -> impl Iterator<Item = &str> {
        self.procedures.iter().map(|proc| proc.name.as_str())
    }

    /// Names of registered transformations.
    pub fn transformation_names(&self) -> impl Iterator<Item = &str> {
        self.transformations.keys().map(String::as_str)
    }

    /// Declared signature of a procedure, qualified with the module name.
    pub fn descriptor(&self, name: &str) -> Option<RoutineDescriptor> {
        let proc = self.find(name)?;
        Some(RoutineDescriptor {
            name: format!("{}.{}", self.name, proc.name),
            params: proc.params.clone(),
            results: proc.results.clone(),
        })
    }

    /// Printed signature of a procedure.
    pub fn signature(&self, name: &str) -> Option<String> {
        self.descriptor(name).map(|descriptor| descriptor.to_string())
    }

    /// Mode of the scope [`MemoryModule::call`] opens for `name`.
    pub fn access_mode(&self, name: &str) -> Result<AccessMode> {
        let proc = self.lookup(name)?;
        Ok(if proc.write && !self.read_only {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        })
    }

    /// Runs a procedure in its own scope, ending the scope afterwards.
    pub fn call(&self, name: &str, args: Vec<HostValue>) -> Result<Vec<HostRecord>> {
        let scope = self.db.begin_scope(self.access_mode(name)?);
        let graph: GraphRef = scope.clone();
        let result = self.invoke(name, graph, args);
        scope.end();
        result
    }

    /// Runs a procedure against a caller-owned graph handle.
    pub fn invoke(
        &self,
        name: &str,
        graph: GraphRef,
        args: Vec<HostValue>,
    ) -> Result<Vec<HostRecord>> {
        let proc = self.lookup(name)?;
        let bound = bind(proc, args)?;
        debug!(module = %self.name, procedure = %proc.name, "invoking procedure");
        let records = (proc.adapter)(graph, bound)?;
        for record in &records {
            check_record(proc, record)?;
        }
        Ok(records)
    }

    /// Runs a transformation over a batch of messages.
    pub fn transform(&self, name: &str, messages: Vec<MessageRecord>) -> Result<Vec<HostRecord>> {
        let adapter = self.transformations.get(name).ok_or_else(|| {
            host_error(
                HostErrorCode::InvalidArgument,
                format!("unknown transformation '{name}'"),
            )
        })?;
        let scope = self.db.begin_scope(AccessMode::ReadOnly);
        let graph: GraphRef = scope.clone();
        let batch = Rc::new(MemoryMessages::new(messages));
        let handle: MessagesRef = batch.clone();
        debug!(module = %self.name, transformation = name, "running transformation");
        let result = adapter(graph, handle);
        batch.invalidate();
        scope.end();
        result
    }

    fn find(&self, name: &str) -> Option<&RegisteredProc> {
        self.procedures.iter().find(|proc| proc.name == name)
    }

    fn lookup(&self, name: &str) -> Result<&RegisteredProc> {
        self.find(name).ok_or_else(|| {
            host_error(
                HostErrorCode::InvalidArgument,
                format!("unknown procedure '{name}'"),
            )
        })
    }

    fn proc_mut(&mut self, handle: ProcHandle) -> HostResult<&mut RegisteredProc> {
        self.procedures.get_mut(handle.0).ok_or_else(|| {
            HostError::new(
                HostErrorCode::OutOfRange,
                format!("unknown procedure handle {}", handle.0),
            )
        })
    }

    fn add_procedure(&mut self, name: &str, adapter: ProcAdapter, write: bool) -> HostResult<ProcHandle> {
        if self.find(name).is_some() || self.transformations.contains_key(name) {
            return Err(HostError::new(
                HostErrorCode::KeyAlreadyExists,
                format!("'{name}' is already registered"),
            ));
        }
        self.procedures.push(RegisteredProc {
            name: name.to_owned(),
            write,
            adapter,
            params: Vec::new(),
            results: Vec::new(),
        });
        Ok(ProcHandle(self.procedures.len() - 1))
    }

    fn push_param(&mut self, handle: ProcHandle, param: ParamDescriptor) -> HostResult<()> {
        let proc = self.proc_mut(handle)?;
        if proc.params.iter().any(|existing| existing.name == param.name) {
            return Err(HostError::new(
                HostErrorCode::KeyAlreadyExists,
                format!("argument '{}' is already declared", param.name),
            ));
        }
        if param.default.is_none() && proc.params.iter().any(|p| p.default.is_some()) {
            return Err(HostError::new(
                HostErrorCode::LogicError,
                format!("required argument '{}' after an optional one", param.name),
            ));
        }
        proc.params.push(param);
        Ok(())
    }

    fn push_result(&mut self, handle: ProcHandle, result: ResultDescriptor) -> HostResult<()> {
        let proc = self.proc_mut(handle)?;
        if proc.results.iter().any(|existing| existing.name == result.name) {
            return Err(HostError::new(
                HostErrorCode::KeyAlreadyExists,
                format!("result '{}' is already declared", result.name),
            ));
        }
        proc.results.push(result);
        Ok(())
    }
}

fn bind(proc: &RegisteredProc, args: Vec<HostValue>) -> Result<Vec<HostValue>> {
    let required = proc
        .params
        .iter()
        .filter(|param| param.default.is_none())
        .count();
    if args.len() < required || args.len() > proc.params.len() {
        return Err(host_error(
            HostErrorCode::InvalidArgument,
            format!(
                "'{}' takes {} to {} arguments, got {}",
                proc.name,
                required,
                proc.params.len(),
                args.len()
            ),
        ));
    }
    let mut supplied = args.into_iter();
    let mut bound = Vec::with_capacity(proc.params.len());
    for param in &proc.params {
        let value = match (supplied.next(), &param.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.clone(),
            (None, None) => HostValue::Null,
        };
        if !param.ty.accepts(&value) {
            return Err(host_error(
                HostErrorCode::ValueConversion,
                format!(
                    "argument '{}' expects {}, got {}",
                    param.name,
                    param.ty,
                    value.kind_name()
                ),
            ));
        }
        bound.push(value);
    }
    Ok(bound)
}

fn check_record(proc: &RegisteredProc, record: &HostRecord) -> Result<()> {
    for (field, value) in record {
        let Some(declared) = proc.results.iter().find(|result| &result.name == field) else {
            return Err(host_error(
                HostErrorCode::LogicError,
                format!("'{}' has no result field '{field}'", proc.name),
            ));
        };
        if !declared.ty.accepts(value) {
            return Err(host_error(
                HostErrorCode::ValueConversion,
                format!(
                    "result '{field}' expects {}, got {}",
                    declared.ty,
                    value.kind_name()
                ),
            ));
        }
    }
    if let Some(missing) = proc
        .results
        .iter()
        .find(|result| !record.contains_key(&result.name))
    {
        return Err(host_error(
            HostErrorCode::LogicError,
            format!("result field '{}' was not set", missing.name),
        ));
    }
    Ok(())
}

impl HostModule for MemoryModule {
    fn add_read_procedure(&mut self, name: &str, adapter: ProcAdapter) -> HostResult<ProcHandle> {
        self.add_procedure(name, adapter, false)
    }

    fn add_write_procedure(&mut self, name: &str, adapter: ProcAdapter) -> HostResult<ProcHandle> {
        self.add_procedure(name, adapter, true)
    }

    fn add_transformation(&mut self, name: &str, adapter: TransAdapter) -> HostResult<()> {
        if self.find(name).is_some() || self.transformations.contains_key(name) {
            return Err(HostError::new(
                HostErrorCode::KeyAlreadyExists,
                format!("'{name}' is already registered"),
            ));
        }
        self.transformations.insert(name.to_owned(), adapter);
        Ok(())
    }

    fn add_argument(&mut self, proc: ProcHandle, name: &str, ty: &TypeDescriptor) -> HostResult<()> {
        self.push_param(
            proc,
            ParamDescriptor {
                name: name.to_owned(),
                ty: ty.clone(),
                default: None,
            },
        )
    }

    fn add_opt_argument(
        &mut self,
        proc: ProcHandle,
        name: &str,
        ty: &TypeDescriptor,
        default: HostValue,
    ) -> HostResult<()> {
        if !ty.accepts(&default) {
            return Err(HostError::new(
                HostErrorCode::ValueConversion,
                format!("default of '{name}' is not a {ty}"),
            ));
        }
        self.push_param(
            proc,
            ParamDescriptor {
                name: name.to_owned(),
                ty: ty.clone(),
                default: Some(default),
            },
        )
    }

    fn add_result(&mut self, proc: ProcHandle, name: &str, ty: &TypeDescriptor) -> HostResult<()> {
        self.push_result(
            proc,
            ResultDescriptor {
                name: name.to_owned(),
                ty: ty.clone(),
                deprecated: false,
            },
        )
    }

    fn add_deprecated_result(
        &mut self,
        proc: ProcHandle,
        name: &str,
        ty: &TypeDescriptor,
    ) -> HostResult<()> {
        self.push_result(
            proc,
            ResultDescriptor {
                name: name.to_owned(),
                ty: ty.clone(),
                deprecated: true,
            },
        )
    }
}

impl std::fmt::Debug for MemoryModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryModule")
            .field("name", &self.name)
            .field("procedures", &self.procedures.len())
            .field("transformations", &self.transformations.len())
            .finish()
    }
}
