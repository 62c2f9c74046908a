//! OpenAPI document and Swagger UI page
//!
//! Component schemas are generated from the response types with schemars,
//! so the document cannot drift from what the handlers serialize.

use crate::error::{ErrorBody, Result};
use crate::server::{
    ExtractFieldsResponse, FieldPositionResponse, FormFieldResponse, HealthResponse,
};
use schemars::JsonSchema;
use serde_json::{json, Map, Value};

/// Path the JSON document is served from
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

const DEFS_PREFIX: &str = "#/$defs/";
const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Build the OpenAPI 3.1 document describing the HTTP interface.
pub fn openapi_document() -> Result<Value> {
    let mut schemas = Map::new();
    add_schema::<FormFieldResponse>(&mut schemas)?;
    add_schema::<FieldPositionResponse>(&mut schemas)?;
    add_schema::<ExtractFieldsResponse>(&mut schemas)?;
    add_schema::<ErrorBody>(&mut schemas)?;
    add_schema::<HealthResponse>(&mut schemas)?;

    Ok(json!({
        "openapi": "3.1.0",
        "info": {
            "title": "PDF Form Service API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Extract form fields from PDF documents and fill PDF forms with data.",
            "license": { "name": "Apache-2.0" }
        },
        "components": {
            "securitySchemes": {
                "ApiSecret": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "Authorization",
                    "description": "Shared secret configured through the API_SECRET environment variable"
                }
            },
            "schemas": schemas
        },
        "paths": {
            "/health": health_path(),
            "/api/pdf/extract-fields": extract_fields_path(),
            "/api/pdf/fill-form": fill_form_path()
        }
    }))
}

fn json_content(component: &str) -> Value {
    json!({
        "application/json": {
            "schema": { "$ref": format!("{}{}", COMPONENTS_PREFIX, component) }
        }
    })
}

fn error_response(description: &str) -> Value {
    json!({ "description": description, "content": json_content("ErrorBody") })
}

fn pdf_property() -> Value {
    json!({ "type": "string", "format": "binary", "description": "PDF file (max 10MB by default)" })
}

fn health_path() -> Value {
    json!({
        "get": {
            "summary": "Health check",
            "tags": ["Health"],
            "responses": {
                "200": { "description": "Service is running", "content": json_content("HealthResponse") }
            }
        }
    })
}

fn extract_fields_path() -> Value {
    let body = json!({
        "type": "object",
        "required": ["pdf"],
        "properties": { "pdf": pdf_property() }
    });

    json!({
        "post": {
            "summary": "Extract form fields from a PDF",
            "description": "Returns every form field with its type, current value, options and position, in reading order.",
            "tags": ["PDF"],
            "security": [{ "ApiSecret": [] }],
            "requestBody": {
                "required": true,
                "content": {
                    "multipart/form-data": {
                        "schema": body,
                        "encoding": { "pdf": { "contentType": "application/pdf" } }
                    }
                }
            },
            "responses": {
                "200": { "description": "Extracted fields", "content": json_content("ExtractFieldsResponse") },
                "400": error_response("Missing, oversized or non-PDF upload"),
                "401": error_response("Missing Authorization header"),
                "403": error_response("Invalid API secret"),
                "500": error_response("The document could not be processed")
            }
        }
    })
}

fn fill_form_path() -> Value {
    let body = json!({
        "type": "object",
        "required": ["pdf", "fields"],
        "properties": {
            "pdf": pdf_property(),
            "fields": {
                "type": "string",
                "description": "JSON object mapping field names to string, boolean or number values",
                "example": "{\"fullName\":\"Jane Smith\",\"agree\":true}"
            }
        }
    });
    let headers = json!({
        "Content-Disposition": {
            "schema": { "type": "string" },
            "description": "attachment; filename=\"<name>.filled.pdf\""
        },
        "X-Fields-Applied": { "schema": { "type": "integer" }, "description": "Number of fields written" },
        "X-Fields-Skipped": { "schema": { "type": "integer" }, "description": "Number of entries skipped" }
    });

    json!({
        "post": {
            "summary": "Fill form fields in a PDF",
            "description": "Applies a JSON object of field name to value and returns the filled PDF. Unknown names and values of the wrong type are skipped.",
            "tags": ["PDF"],
            "security": [{ "ApiSecret": [] }],
            "requestBody": {
                "required": true,
                "content": {
                    "multipart/form-data": {
                        "schema": body,
                        "encoding": {
                            "pdf": { "contentType": "application/pdf" },
                            "fields": { "contentType": "application/json, text/plain" }
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Filled PDF",
                    "headers": headers,
                    "content": { "application/pdf": { "schema": { "type": "string", "format": "binary" } } }
                },
                "400": error_response("Missing upload, missing or invalid fields JSON"),
                "401": error_response("Missing Authorization header"),
                "403": error_response("Invalid API secret"),
                "500": error_response("The document could not be processed")
            }
        }
    })
}

/// Add `T` and every definition it references to `schemas`.
fn add_schema<T: JsonSchema>(schemas: &mut Map<String, Value>) -> Result<()> {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))?;
    rewrite_refs(&mut schema);

    if let Value::Object(object) = &mut schema {
        object.remove("$schema");
        if let Some(Value::Object(defs)) = object.remove("$defs") {
            for (name, def) in defs {
                schemas.entry(name).or_insert(def);
            }
        }
    }

    schemas.insert(T::schema_name().into_owned(), schema);
    Ok(())
}

/// Point `$defs` references at `components/schemas`.
fn rewrite_refs(value: &mut Value) {
    match value {
        Value::Object(object) => {
            for (key, child) in object.iter_mut() {
                match child {
                    Value::String(target) if key == "$ref" => {
                        if let Some(name) = target.strip_prefix(DEFS_PREFIX) {
                            *target = format!("{}{}", COMPONENTS_PREFIX, name);
                        }
                    }
                    _ => rewrite_refs(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_refs),
        _ => {}
    }
}

/// Swagger UI page loading the document from [`OPENAPI_JSON_PATH`].
pub fn swagger_ui_html() -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>PDF Form Service API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
  <style>.swagger-ui .topbar {{ display: none }}</style>
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##,
        OPENAPI_JSON_PATH
    )
}
