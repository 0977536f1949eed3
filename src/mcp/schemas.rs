//! JSON schema builders for MCP tools.

use serde_json::{Map, Value, json};

/// Build the schema describing the `index` tool input.
pub(crate) fn index_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "source_dir".into(),
        string_schema("Optional directory of PDFs; defaults to the configured SOURCE_DIR"),
    );

    finalize_object_schema(properties, &[])
}

/// Build the schema describing the `query` tool input.
pub(crate) fn query_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();

    let mut question_schema = Map::new();
    question_schema.insert("type".into(), Value::String("string".into()));
    question_schema.insert(
        "description".into(),
        Value::String("Natural language question about the indexed documents".into()),
    );
    question_schema.insert("minLength".into(), Value::Number(1.into()));
    properties.insert("question".into(), Value::Object(question_schema));

    let mut schema = finalize_object_schema(properties, &["question"]);
    schema.insert(
        "examples".into(),
        Value::Array(vec![
            json!({ "question": "What is multi-head attention?" }),
            json!({ "question": "How does CLIP align images and text?" }),
        ]),
    );
    schema
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
