//! JSON-RPC binding of the search server
//!
//! Requests:
//! - `search {query, rootUris, options?}` returns the search id
//! - `cancel {searchId}` returns `null` (also accepted as a notification)
//!
//! Notifications sent back:
//! - `onResult {searchId, result}`
//! - `onDone {searchId, error?}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::handler::JsonRpcHandler;
use super::message::{JsonRpcNotification, JsonRpcPayload, JsonRpcRequest, JsonRpcResponse};
use crate::client::SearchClient;
use crate::error::RpcError;
use crate::search::SearchServer;
use crate::types::{SearchId, SearchOptions, SearchResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub root_uris: Vec<String>,
    #[serde(default)]
    pub options: Option<SearchOptions>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    pub search_id: SearchId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultParams<'a> {
    search_id: SearchId,
    result: &'a SearchResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DoneParams<'a> {
    search_id: SearchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

pub struct SearchRpcHandler {
    server: SearchServer,
}

impl SearchRpcHandler {
    pub fn new(server: SearchServer) -> Self {
        Self { server }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, RpcError> {
        match request.method.as_str() {
            "search" => {
                let params: SearchParams = parse_params(request.params)?;
                let search_id = self
                    .server
                    .search(&params.query, &params.root_uris, params.options)
                    .await;
                Ok(json!(search_id))
            }
            "cancel" => {
                let params: CancelParams = parse_params(request.params)?;
                self.server.cancel(params.search_id);
                Ok(Value::Null)
            }
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| RpcError::InvalidParams(e.to_string()))
}

#[async_trait]
impl JsonRpcHandler for SearchRpcHandler {
    async fn on_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;
        match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                log::warn!("Request {} failed: {}", id, e);
                JsonRpcResponse::failure(id, e.to_error_object())
            }
        }
    }

    async fn on_notification(&mut self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "cancel" => match parse_params::<CancelParams>(notification.params) {
                Ok(params) => self.server.cancel(params.search_id),
                Err(e) => log::warn!("Ignoring cancel notification: {}", e),
            },
            other => log::debug!("Ignoring notification {}", other),
        }
    }
}

/// `SearchClient` that turns callbacks into outgoing notifications.
#[derive(Debug, Clone)]
pub struct RpcSearchClient {
    sender: mpsc::UnboundedSender<JsonRpcPayload>,
}

impl RpcSearchClient {
    pub fn new(sender: mpsc::UnboundedSender<JsonRpcPayload>) -> Self {
        Self { sender }
    }

    fn notify(&self, method: &str, params: Result<Value, serde_json::Error>) {
        let params = match params {
            Ok(params) => params,
            Err(e) => {
                log::error!("Failed to serialize {} params: {}", method, e);
                return;
            }
        };
        let payload = JsonRpcPayload::Notification(JsonRpcNotification {
            method: method.to_string(),
            params: Some(params),
        });
        if self.sender.send(payload).is_err() {
            log::debug!("Output channel closed, dropping {}", method);
        }
    }
}

impl SearchClient for RpcSearchClient {
    fn on_result(&self, search_id: SearchId, result: SearchResult) {
        let params = serde_json::to_value(ResultParams {
            search_id,
            result: &result,
        });
        self.notify("onResult", params);
    }

    fn on_done(&self, search_id: SearchId, error: Option<String>) {
        let params = serde_json::to_value(DoneParams {
            search_id,
            error: error.as_deref(),
        });
        self.notify("onDone", params);
    }
}
