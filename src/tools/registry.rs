//! Function registry with JSON schema validation
//!
//! Functions are registered before the first query. Names are unique and
//! registration order is kept for advertising. Each input schema is compiled
//! once at registration.

use crate::errors::{RagError, Result};
use crate::tools::function::FunctionDescriptor;
use crate::tools::types::FunctionSelection;
use crate::types::{FunctionCall, FunctionSpec};
use jsonschema::Validator;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct RegisteredFunction {
    descriptor: Arc<FunctionDescriptor>,
    validator: Validator,
}

#[derive(Default)]
pub struct FunctionRegistry {
    functions: Vec<RegisteredFunction>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; duplicate names and invalid schemas are rejected
    pub fn register(&mut self, descriptor: FunctionDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RagError::InvalidArguments(format!(
                "function '{}' is already registered",
                descriptor.name
            )));
        }

        let validator = jsonschema::validator_for(&descriptor.input_schema).map_err(|e| {
            RagError::InvalidArguments(format!(
                "input schema of '{}' is invalid: {}",
                descriptor.name, e
            ))
        })?;

        tracing::debug!(function = %descriptor.name, "function registered");
        self.index
            .insert(descriptor.name.clone(), self.functions.len());
        self.functions.push(RegisteredFunction {
            descriptor: Arc::new(descriptor),
            validator,
        });
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, descriptor: FunctionDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.functions[i].descriptor))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.functions
            .iter()
            .map(|f| f.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Specs to advertise for a selection
    pub fn specs(&self, selection: &FunctionSelection) -> Result<Vec<FunctionSpec>> {
        match selection {
            FunctionSelection::None => Ok(Vec::new()),
            FunctionSelection::All => Ok(self
                .functions
                .iter()
                .map(|f| f.descriptor.spec())
                .collect()),
            FunctionSelection::Named(names) => names
                .iter()
                .map(|name| {
                    self.get(name).map(|d| d.spec()).ok_or_else(|| {
                        RagError::InvalidArguments(format!("unknown function '{}'", name))
                    })
                })
                .collect(),
        }
    }

    /// Resolve a call and check its arguments against the input schema
    pub fn validate(&self, call: &FunctionCall) -> Result<Arc<FunctionDescriptor>> {
        let function = self
            .index
            .get(&call.name)
            .map(|&i| &self.functions[i])
            .ok_or_else(|| {
                RagError::InvalidArguments(format!("unknown function '{}'", call.name))
            })?;

        let errors: Vec<String> = function
            .validator
            .iter_errors(&call.arguments)
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(RagError::InvalidArguments(format!(
                "arguments for '{}' do not match its schema: {}",
                call.name,
                errors.join("; ")
            )));
        }

        Ok(Arc::clone(&function.descriptor))
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
