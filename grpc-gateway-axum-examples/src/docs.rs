//! API documentation server.

use axum::Router;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;

/// OpenAPI document of the Discover service.
pub const SWAGGER_JSON: &str = include_str!("../openapi/discover.swagger.json");

const SWAGGER_UI: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Discover Service API</title>
<link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
<script>
  window.onload = function() {
    SwaggerUIBundle({
      url: '/swagger-ui/swagger.json',
      dom_id: '#swagger-ui',
      presets: [SwaggerUIBundle.presets.apis],
      layout: "BaseLayout"
    });
  };
</script>
</body>
</html>
"#;

/// `GET /swagger-ui/` and `GET /swagger-ui/swagger.json`.
pub fn routes() -> Router {
    Router::new()
        .route("/swagger-ui/", get(swagger_ui))
        .route("/swagger-ui/swagger.json", get(swagger_json))
}

async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

async fn swagger_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], SWAGGER_JSON)
}
