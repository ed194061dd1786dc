//! API description and documentation UIs.
//!
//! All three routes sit behind the basic-auth gate. The UI pages are static
//! HTML that load their assets from a CDN and read `/openapi.json`.

use axum::Json;
use axum::response::Html;
use serde_json::{Value, json};

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>front_door - Swagger UI</title>
  <meta charset="utf-8"/>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

const REDOC_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>front_door - ReDoc</title>
  <meta charset="utf-8"/>
</head>
<body>
  <redoc spec-url="/openapi.json"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>
"#;

/// `GET /openapi.json`
pub async fn openapi_document() -> Json<Value> {
    Json(openapi_value())
}

/// `GET /docs`
pub async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

/// `GET /redoc`
pub async fn redoc() -> Html<&'static str> {
    Html(REDOC_HTML)
}

fn error_schema_ref() -> Value {
    json!({ "$ref": "#/components/schemas/ErrorResponse" })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": error_schema_ref() } }
    })
}

fn openapi_value() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "front_door",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness check",
                    "responses": {
                        "200": {
                            "description": "Service is up",
                            "content": { "application/json": { "schema": {
                                "$ref": "#/components/schemas/HealthResponse"
                            } } }
                        },
                        "429": error_response("Rate limit exceeded"),
                    }
                }
            },
            "/api/v1/users/me": {
                "get": {
                    "summary": "Current user",
                    "security": [{ "bearerAuth": [] }],
                    "responses": {
                        "200": {
                            "description": "The authenticated user",
                            "content": { "application/json": { "schema": {
                                "$ref": "#/components/schemas/UserResponse"
                            } } }
                        },
                        "401": error_response("Missing or invalid credentials"),
                        "429": error_response("Rate limit exceeded"),
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            },
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "required": ["detail"],
                    "properties": { "detail": { "type": "string" } }
                },
                "HealthResponse": {
                    "type": "object",
                    "properties": {
                        "status": { "type": "string" },
                        "version": { "type": "string" },
                        "timestamp": { "type": "string", "format": "date-time" },
                        "uptime_seconds": { "type": "integer" }
                    }
                },
                "UserResponse": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "username": { "type": "string" },
                        "email": { "type": "string", "nullable": true },
                        "full_name": { "type": "string", "nullable": true },
                        "is_active": { "type": "boolean" },
                        "created_at": { "type": "string", "format": "date-time" }
                    }
                }
            }
        }
    })
}
