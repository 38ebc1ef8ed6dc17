//! OpenAPI 3.1 document generation from described routes.

use serde_json::{Map, Value, json};

use crate::operation;

/// Top-level API info for the OpenAPI document.
pub struct Info {
    pub title: &'static str,
    pub version: &'static str,
}

/// Build an OpenAPI 3.1 JSON document from collected operation metadata.
pub fn generate(info: &Info, operations: &[operation::Meta]) -> Value {
    let mut paths: Map<String, Value> = Map::new();

    for op in operations {
        let mut operation_obj: Map<String, Value> = Map::new();

        if !op.summary.is_empty() {
            operation_obj.insert("summary".into(), Value::String(op.summary.clone()));
        }

        if !op.tag.is_empty() {
            operation_obj.insert("tags".into(), json!([op.tag]));
        }

        let parameters = path_parameters(&op.path);
        if !parameters.is_empty() {
            operation_obj.insert("parameters".into(), Value::Array(parameters));
        }

        let mut responses: Map<String, Value> = Map::new();
        responses.insert("200".into(), envelope_response("Successful response"));
        responses.insert("400".into(), envelope_response("Bad request"));
        responses.insert("401".into(), envelope_response("Unauthorized"));
        responses.insert("500".into(), envelope_response("Internal server error"));
        operation_obj.insert("responses".into(), Value::Object(responses));

        let path_item = paths
            .entry(op.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = path_item {
            map.insert(op.method.clone(), Value::Object(operation_obj));
        }
    }

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": info.title,
            "version": info.version,
        },
        "paths": paths,
        "components": {
            "schemas": {
                "Envelope": {
                    "type": "object",
                    "required": ["code", "message", "data"],
                    "properties": {
                        "code": { "type": "integer" },
                        "message": { "type": "string" },
                        "data": {}
                    }
                }
            }
        }
    })
}

fn envelope_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Envelope" }
            }
        }
    })
}

/// `{name}` segments of a matchit pattern as OpenAPI path parameters.
fn path_parameters(path: &str) -> Vec<Value> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .map(|name| {
            json!({
                "name": name.trim_start_matches('*'),
                "in": "path",
                "required": true,
                "schema": { "type": "string" }
            })
        })
        .collect()
}
