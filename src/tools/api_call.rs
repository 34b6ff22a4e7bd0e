//! Generic HTTP-call plug-in for API-backed tool definitions
//!
//! The concrete endpoint, method, headers, and auth come from the tool
//! definition at dispatch time; this plug-in only knows how to assemble and
//! fire the request. Registered under the `ExecutarAPI` dispatch key.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::catalog::{ApiAuthType, ApiToolConfig, ToolDefinition, ToolKind};
use crate::context::ExecutionContext;
use crate::error::Result;

use super::traits::{Tool, ToolParams, ToolResult};

/// Dispatch key for API-backed tool definitions
pub const API_TOOL_NAME: &str = "ExecutarAPI";

struct PreparedRequest {
    url: String,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

/// Generic executor for API-backed tools
pub struct ApiCallTool {
    client: Client,
}

impl ApiCallTool {
    pub fn new(client: Client) -> Self {
        ApiCallTool { client }
    }
}

/// Assemble URL, headers, query parameters, and body from the definition and
/// the call parameters. Order matters: path placeholders are filled first,
/// then body-template placeholders, then every declared parameter not yet
/// consumed becomes a query parameter, and finally the auth header.
fn prepare_request(
    config: &ApiToolConfig,
    params: &ToolParams,
    tool_def: &ToolDefinition,
) -> PreparedRequest {
    let mut url = config.base_url.clone();
    let mut headers = config.headers.clone();
    let mut used: Vec<String> = Vec::new();

    // 1. Path placeholders
    for (key, value) in params {
        let placeholder = format!("{{{}}}", key);
        if url.contains(&placeholder) {
            url = url.replace(&placeholder, &value_as_string(value));
            used.push(key.clone());
        }
    }

    // 2. Body-template placeholders ("{param}" string values)
    let body = config.body_template.as_ref().map(|template| {
        let mut body = template.clone();
        if let Some(object) = body.as_object_mut() {
            for (_, slot) in object.iter_mut() {
                let param_key = slot
                    .as_str()
                    .and_then(|t| t.strip_prefix('{'))
                    .and_then(|t| t.strip_suffix('}'))
                    .map(str::to_string);
                let Some(param_key) = param_key else { continue };
                if let Some(value) = params.get(&param_key) {
                    *slot = value.clone();
                    used.push(param_key);
                }
            }
        }
        body
    });

    // 3. Remaining declared parameters become query parameters
    let mut query = Vec::new();
    for spec in &tool_def.parameters {
        if used.iter().any(|u| u == &spec.name) {
            continue;
        }
        if let Some(value) = params.get(&spec.name) {
            query.push((spec.name.clone(), value_as_string(value)));
        }
    }

    // 4. Auth header
    if config.auth.auth_type == ApiAuthType::Bearer {
        if let Some(token) = &config.auth.token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
    }

    PreparedRequest {
        url,
        headers,
        query,
        body,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Tool for ApiCallTool {
    fn name(&self) -> &str {
        API_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ferramenta genérica para executar APIs configuradas no catálogo de definições."
    }

    async fn execute(
        &self,
        params: &ToolParams,
        _context: &ExecutionContext,
        tool_def: Option<&ToolDefinition>,
    ) -> Result<ToolResult> {
        let Some(tool_def) = tool_def else {
            return Ok(ToolResult::failure(
                "Ferramenta de API chamada sem definição.",
            ));
        };
        let ToolKind::Api(config) = &tool_def.kind else {
            return Ok(ToolResult::failure(format!(
                "A ferramenta '{}' não possui configuração de API.",
                tool_def.name
            )));
        };

        let prepared = prepare_request(config, params, tool_def);

        let method = config.method.to_uppercase();
        let method = method
            .parse::<reqwest::Method>()
            .unwrap_or(reqwest::Method::GET);

        let mut request = self
            .client
            .request(method, &prepared.url)
            .query(&prepared.query);
        for (key, value) in &prepared.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &prepared.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Erro de conexão ao chamar a API '{}': {}",
                    tool_def.name, e
                )));
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Ok(ToolResult::failure(format!(
                "Erro HTTP ao chamar a API '{}': {} - {}",
                tool_def.name,
                status.as_u16(),
                text
            )));
        }

        // JSON responses are pretty-printed for the observation; anything
        // else is passed through as raw text
        let output = match serde_json::from_str::<Value>(&text) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(text),
            Err(_) => text,
        };

        Ok(ToolResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ApiAuthConfig, ParameterSpec};
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_tool_def(base_url: &str, body_template: Option<Value>, token: Option<&str>) -> ToolDefinition {
        ToolDefinition {
            name: "lookupOrder".into(),
            description: "Order lookup".into(),
            parameters: vec![
                ParameterSpec {
                    name: "id".into(),
                    type_tag: "string".into(),
                    description: String::new(),
                    required: true,
                },
                ParameterSpec {
                    name: "verbose".into(),
                    type_tag: "string".into(),
                    description: String::new(),
                    required: false,
                },
            ],
            kind: ToolKind::Api(ApiToolConfig {
                method: if body_template.is_some() { "POST" } else { "GET" }.into(),
                base_url: base_url.into(),
                headers: HashMap::new(),
                body_template,
                auth: ApiAuthConfig {
                    auth_type: if token.is_some() {
                        ApiAuthType::Bearer
                    } else {
                        ApiAuthType::None
                    },
                    token: token.map(String::from),
                },
            }),
            active: true,
        }
    }

    fn params(entries: &[(&str, Value)]) -> ToolParams {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_path_placeholder_and_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/42"))
            .and(query_param("verbose", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "shipped"})))
            .mount(&server)
            .await;

        let tool_def = api_tool_def(&format!("{}/orders/{{id}}", server.uri()), None, None);
        let tool = ApiCallTool::new(Client::new());

        let result = tool
            .execute(
                &params(&[("id", json!("42")), ("verbose", json!("true"))]),
                &ExecutionContext::default(),
                Some(&tool_def),
            )
            .await
            .unwrap();

        assert!(result.success);
        let rendered = result.output.as_str().unwrap();
        assert!(rendered.contains("shipped"));
    }

    #[tokio::test]
    async fn test_body_template_substitution_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(bearer_token("sekrit"))
            .and(body_json(json!({"order_id": "42", "source": "conductor"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let tool_def = api_tool_def(
            &format!("{}/orders", server.uri()),
            Some(json!({"order_id": "{id}", "source": "conductor"})),
            Some("sekrit"),
        );
        let tool = ApiCallTool::new(Client::new());

        let result = tool
            .execute(
                &params(&[("id", json!("42"))]),
                &ExecutionContext::default(),
                Some(&tool_def),
            )
            .await
            .unwrap();

        assert!(result.success);
    }

    #[tokio::test]
    async fn test_http_error_body_is_captured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such order"))
            .mount(&server)
            .await;

        let tool_def = api_tool_def(&format!("{}/orders/{{id}}", server.uri()), None, None);
        let tool = ApiCallTool::new(Client::new());

        let result = tool
            .execute(
                &params(&[("id", json!("99"))]),
                &ExecutionContext::default(),
                Some(&tool_def),
            )
            .await
            .unwrap();

        assert!(!result.success);
        let message = result.output.as_str().unwrap();
        assert!(message.contains("404"));
        assert!(message.contains("no such order"));
    }

    #[test]
    fn test_prepare_request_param_precedence() {
        let tool_def = api_tool_def(
            "https://api.example.com/orders/{id}",
            Some(json!({"note": "{comment}"})),
            None,
        );
        let ToolKind::Api(config) = &tool_def.kind else {
            unreachable!()
        };

        let call_params = params(&[
            ("id", json!("42")),
            ("comment", json!("urgent")),
            ("verbose", json!("true")),
        ]);
        let prepared = prepare_request(config, &call_params, &tool_def);

        assert_eq!(prepared.url, "https://api.example.com/orders/42");
        assert_eq!(prepared.body, Some(json!({"note": "urgent"})));
        // id went to the path, comment to the body; only declared leftovers
        // become query parameters
        assert_eq!(prepared.query, vec![("verbose".to_string(), "true".to_string())]);
    }
}
