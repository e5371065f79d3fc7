//! Function descriptors
//!
//! A descriptor pairs a name, a description and JSON schemas with an async
//! handler taking and returning JSON. [`FunctionDescriptor::typed`] derives
//! both schemas from Rust types.

use crate::errors::{RagError, Result};
use crate::types::FunctionSpec;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Type-erased async handler
pub type FunctionHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    handler: FunctionHandler,
}

impl FunctionDescriptor {
    /// Descriptor over raw JSON
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }

    /// Descriptor whose schemas and (de)serialization come from `I` and `O`
    pub fn typed<I, O, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<Self>
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + JsonSchema + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let input_schema = schema_value(schemars::schema_for!(I))?;
        let output_schema = schema_value(schemars::schema_for!(O))?;
        let handler = Arc::new(handler);

        Ok(Self::new(
            name,
            description,
            input_schema,
            output_schema,
            move |args: Value| {
                let handler = Arc::clone(&handler);
                async move {
                    let input: I = serde_json::from_value(args)
                        .map_err(|e| RagError::InvalidArguments(e.to_string()))?;
                    let output = (*handler)(input).await?;
                    Ok(serde_json::to_value(output)?)
                }
            },
        ))
    }

    /// Start the handler; the returned future owns everything it needs
    pub fn call(&self, arguments: Value) -> BoxFuture<'static, Result<Value>> {
        (self.handler)(arguments)
    }

    /// What the model is told about this function
    pub fn spec(&self) -> FunctionSpec {
        FunctionSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

/// Schema as plain JSON, without the `$schema` meta key
fn schema_value(schema: schemars::Schema) -> Result<Value> {
    let mut value = serde_json::to_value(schema)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
    }
    Ok(value)
}
