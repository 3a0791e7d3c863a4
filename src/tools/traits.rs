//! Tool trait definitions.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{ToolClass, ToolError, ToolSpec};

/// An effectful function the reasoning collaborator may ask to run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn class(&self) -> ToolClass;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            self.name(),
            self.description(),
            self.input_schema(),
            self.class(),
        )
    }
}

/// Typed tool with its argument schema derived by schemars.
///
/// Blanket-implements [`Tool`]; arguments that do not deserialize into
/// `Input` fail with [`ToolError::InvalidInput`] before `handle` runs.
#[async_trait]
pub trait SchemaTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    type Output: Serialize + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const CLASS: ToolClass = ToolClass::Safe;

    async fn handle(&self, input: Self::Input) -> Result<Self::Output, ToolError>;

    fn input_schema() -> Value {
        let schema = schemars::schema_for!(Self::Input);
        let mut value =
            serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        // Function-calling APIs reject object schemas without `properties`.
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            obj.entry("properties")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }
        value
    }
}

#[async_trait]
impl<T: SchemaTool + 'static> Tool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        T::input_schema()
    }

    fn class(&self) -> ToolClass {
        T::CLASS
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input = serde_json::from_value::<T::Input>(args)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;
        let output = SchemaTool::handle(self, input).await?;
        serde_json::to_value(output).map_err(|e| ToolError::execution_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoInput {
        word: String,
    }

    struct EchoTool;

    #[async_trait]
    impl SchemaTool for EchoTool {
        type Input = EchoInput;
        type Output = String;
        const NAME: &'static str = "echo";
        const DESCRIPTION: &'static str = "Echo a word back";

        async fn handle(&self, input: EchoInput) -> Result<String, ToolError> {
            Ok(input.word)
        }
    }

    #[tokio::test]
    async fn test_schema_tool_execute() {
        let tool = EchoTool;
        let out = tool.execute(serde_json::json!({"word": "hi"})).await.unwrap();
        assert_eq!(out, serde_json::json!("hi"));
        assert_eq!(tool.class(), ToolClass::Safe);
    }

    #[tokio::test]
    async fn test_schema_tool_invalid_input() {
        let err = EchoTool
            .execute(serde_json::json!({"nope": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[test]
    fn test_spec_schema() {
        let spec = EchoTool.spec();
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.schema["type"], "object");
        assert!(spec.schema["properties"]["word"].is_object());
        assert!(spec.schema.get("$schema").is_none());
    }
}
