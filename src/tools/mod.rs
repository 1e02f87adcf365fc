//! Named operations callable over `POST /api/tools/:name`.
//!
//! Each built-in is a [`TypedTool`] with a typed input and output; the blanket
//! impl turns it into a [`Tool`] that takes and returns raw JSON so the
//! registry can hold them side by side.

mod builtin;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::links::LinkError;
use crate::AppState;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: &'static str, message: String },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("Failed to encode tool output: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Object-safe tool interface stored in the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn call(&self, state: &AppState, args: Value) -> Result<Value, ToolError>;
}

/// A tool with typed arguments and output.
#[async_trait]
pub trait TypedTool: Send + Sync + 'static {
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// JSON schema describing `Input`, published by `GET /api/tools`.
    fn input_schema() -> Value;

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError>;
}

#[async_trait]
impl<T: TypedTool> Tool for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn description(&self) -> &'static str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        <T as TypedTool>::input_schema()
    }

    async fn call(&self, state: &AppState, args: Value) -> Result<Value, ToolError> {
        // A missing body means "no arguments".
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        let input: T::Input =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
                tool: T::NAME,
                message: e.to_string(),
            })?;
        let output = self.run(state, input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Add a tool, replacing any previous tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        if self.tools.insert(tool.name(), Box::new(tool)).is_some() {
            tracing::warn!("Replaced an already registered tool");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors sorted by name.
    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub async fn dispatch(&self, state: &AppState, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::debug!(tool = name, "Dispatching tool call");
        tool.call(state, args).await
    }
}
