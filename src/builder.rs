//! Incremental construction of a schema document.
//!
//! The builder enforces name uniqueness and dependency existence at each
//! `add_*` call, so a schema assembled through it (references always
//! pointing backwards) is acyclic by construction.  [SchemaBuilder::build]
//! still runs the full validation pass.

use crate::error::SchemaError;
use crate::schema::{check_name, Execution, Graph, ResourceKind, Schema, Script};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    schema: Schema,
    names: HashSet<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, name: &str) -> Result<(), SchemaError> {
        check_name(name)?;
        if !self.names.insert(name.to_owned()) {
            return Err(SchemaError::DuplicateName(name.to_owned()));
        }
        Ok(())
    }

    /// Add a resource and return its name for later references.
    pub fn add_resource(&mut self, resource: ResourceKind) -> Result<String, SchemaError> {
        self.declare(resource.name())?;
        let name = resource.name().to_owned();
        self.schema.resources.push(resource);
        Ok(name)
    }

    /// Add a script and return its name for later references.
    pub fn add_script(&mut self, script: Script) -> Result<String, SchemaError> {
        self.declare(&script.name)?;
        let name = script.name.clone();
        self.schema.scripts.push(script);
        Ok(name)
    }

    /// Add an execution and return its name for later references.
    ///
    /// Its script and every dependency must already have been added.
    pub fn add_execution(&mut self, execution: Execution) -> Result<String, SchemaError> {
        if !self.names.contains(&execution.script_name) {
            return Err(SchemaError::UndeclaredReference {
                referrer: execution.name.clone(),
                target: execution.script_name.clone(),
            });
        }
        for dep in &execution.dependencies {
            if !self.names.contains(&dep.ref_to) {
                return Err(SchemaError::UndeclaredReference {
                    referrer: execution.name.clone(),
                    target: dep.ref_to.clone(),
                });
            }
        }
        self.declare(&execution.name)?;
        let name = execution.name.clone();
        self.schema.executions.push(execution);
        Ok(name)
    }

    /// The document assembled so far.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate and finish.
    pub fn build(self) -> Result<Graph, SchemaError> {
        Graph::from_schema(self.schema)
    }
}
