//! Documentation endpoints.
//!
//! `GET /swagger.json` serves an OpenAPI 2.0 description of every route
//! tagged `api`; `GET /documentation` serves an HTML page that renders it.
//! Both are mounted outside the response interceptor.

use apikit_core::{API_TAG, ApiInfo, NormalizedRoute, ServerError};
use axum::Router;
use axum::response::Html;
use axum::routing::get;
use serde_json::{Map, Value, json};

pub const DOCUMENTATION_PATH: &str = "/documentation";
pub const SWAGGER_PATH: &str = "/swagger.json";

/// OpenAPI 2.0 document describing `routes`.
///
/// Wildcard-method routes have no OpenAPI operation and are left out.
pub fn swagger_document(info: &ApiInfo, routes: &[NormalizedRoute]) -> Value {
    let mut paths = Map::new();
    let mut security_definitions = Map::new();

    for route in routes {
        if !route.config.tags.iter().any(|tag| tag == API_TAG) {
            continue;
        }
        let Some(method) = route.method.doc_name() else {
            continue;
        };

        let mut operation = Map::new();
        if let Some(description) = &route.config.description {
            operation.insert("summary".to_owned(), json!(description));
        }
        let tags: Vec<&str> = route
            .config
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| *tag != API_TAG)
            .collect();
        operation.insert("tags".to_owned(), json!(tags));

        let parameters = path_parameters(&route.path);
        if !parameters.is_empty() {
            operation.insert("parameters".to_owned(), Value::Array(parameters));
        }
        if let Some(strategy) = &route.config.auth {
            security_definitions.insert(strategy.clone(), json!({ "type": "basic" }));
            let mut requirement = Map::new();
            requirement.insert(strategy.clone(), json!([]));
            operation.insert("security".to_owned(), json!([requirement]));
        }
        operation.insert(
            "responses".to_owned(),
            json!({ "default": { "description": "Successful" } }),
        );

        if let Value::Object(entry) = paths
            .entry(route.path.clone())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            entry.insert(method, Value::Object(operation));
        }
    }

    let mut document = json!({
        "swagger": "2.0",
        "info": {
            "title": info.documentation_title(),
            "version": info.version,
        },
        "consumes": ["application/json"],
        "produces": ["application/json"],
        "paths": paths,
    });
    if !security_definitions.is_empty() {
        document["securityDefinitions"] = Value::Object(security_definitions);
    }
    document
}

fn path_parameters(path: &str) -> Vec<Value> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .map(|name| name.trim_start_matches('*'))
        .map(|name| json!({ "name": name, "in": "path", "required": true, "type": "string" }))
        .collect()
}

/// HTML page rendering the OpenAPI document with Swagger UI.
pub fn documentation_page(info: &ApiInfo) -> String {
    let title = escape_html(&info.documentation_title());
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{SWAGGER_PATH}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Router serving both documentation endpoints.
///
/// Fails when a configured route already uses one of their paths.
pub(crate) fn router(info: &ApiInfo, routes: &[NormalizedRoute]) -> Result<Router, ServerError> {
    if let Some(route) = routes
        .iter()
        .find(|route| route.path == DOCUMENTATION_PATH || route.path == SWAGGER_PATH)
    {
        return Err(ServerError::plugin_registration(format!(
            "route {} {} collides with the documentation endpoints",
            route.method, route.path
        )));
    }

    let document = swagger_document(info, routes);
    let page = documentation_page(info);

    tracing::debug!(
        routes = document["paths"].as_object().map_or(0, Map::len),
        "Registered documentation endpoints"
    );

    Ok(Router::new()
        .route(
            SWAGGER_PATH,
            get(move || {
                let document = document.clone();
                async move { axum::Json(document) }
            }),
        )
        .route(
            DOCUMENTATION_PATH,
            get(move || {
                let page = page.clone();
                async move { Html(page) }
            }),
        ))
}
