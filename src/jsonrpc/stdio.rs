//! LSPスタイルのContent-Lengthヘッダーを使ったメッセージフレーミング

use serde_json::{Map, Value};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::message::{
    JsonRpcError, JsonRpcNotification, JsonRpcPayload, JsonRpcRequest, JsonRpcResponse,
};
use crate::error::RpcError;

/// Read framed payloads from `reader` and forward them to `sender`.
///
/// Returns `Ok(())` on EOF or when the receiving side is gone. A broken
/// frame is fatal; a well-framed body that is not a JSON-RPC payload is
/// logged and skipped.
pub async fn read_loop<R>(
    mut reader: R,
    sender: mpsc::UnboundedSender<JsonRpcPayload>,
) -> Result<(), RpcError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(body) = read_frame(&mut reader).await? {
        let payload = match serde_json::from_slice::<Value>(&body)
            .map_err(RpcError::from)
            .and_then(parse_json_to_payload)
        {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Skipping invalid message: {}", e);
                continue;
            }
        };

        if sender.send(payload).is_err() {
            log::debug!("Receiver dropped, terminating read loop");
            break;
        }
    }
    Ok(())
}

/// Read one `Content-Length` framed body, `None` on a clean EOF.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, RpcError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            if content_length.is_some() {
                return Err(invalid_data("EOF inside message header"));
            }
            log::debug!("EOF reached, terminating read loop");
            return Ok(None);
        }

        let header = line.trim();
        if header.is_empty() {
            // ヘッダー終端
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if let Some(length) = header.strip_prefix("Content-Length:") {
            let length = length
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid_data("Invalid Content-Length"))?;
            content_length = Some(length);
        } else if header.starts_with("Content-Type:") {
            continue;
        } else {
            return Err(invalid_data(format!(
                "Expected Content-Length header, got: {}",
                header
            )));
        }
    }

    let length = content_length.unwrap_or_default();
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

fn invalid_data(message: impl Into<String>) -> RpcError {
    RpcError::Io(io::Error::new(io::ErrorKind::InvalidData, message.into()))
}

pub async fn write_payload<W>(writer: &mut W, payload: JsonRpcPayload) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    let json_str = serde_json::to_string(&payload_to_json(payload))?;
    let message = format!("Content-Length: {}\r\n\r\n{}", json_str.len(), json_str);

    writer.write_all(message.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Write every payload from `receiver` until all senders are dropped.
pub async fn write_loop<W>(
    mut writer: W,
    mut receiver: mpsc::UnboundedReceiver<JsonRpcPayload>,
) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = receiver.recv().await {
        write_payload(&mut writer, payload).await?;
    }
    Ok(())
}

pub fn parse_json_to_payload(json: Value) -> Result<JsonRpcPayload, RpcError> {
    let obj = json
        .as_object()
        .ok_or_else(|| invalid_data("JSON must be an object"))?;

    let params = obj.get("params").cloned();

    // リクエスト (idとmethodがある)
    if let (Some(id), Some(method)) = (obj.get("id"), obj.get("method")) {
        let id = id
            .as_u64()
            .ok_or_else(|| invalid_data("Request id must be a number"))?;
        let method = method
            .as_str()
            .ok_or_else(|| invalid_data("Request method must be a string"))?
            .to_string();
        return Ok(JsonRpcPayload::Request(JsonRpcRequest { id, method, params }));
    }

    // 通知 (methodのみ)
    if let Some(method) = obj.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| invalid_data("Notification method must be a string"))?
            .to_string();
        return Ok(JsonRpcPayload::Notification(JsonRpcNotification { method, params }));
    }

    // レスポンス (idとresultまたはerror)
    if let Some(id) = obj.get("id") {
        let id = id
            .as_u64()
            .ok_or_else(|| invalid_data("Response id must be a number"))?;
        let result = obj.get("result").cloned();
        let error = obj.get("error").and_then(|e| {
            let error_obj = e.as_object()?;
            Some(JsonRpcError {
                code: i32::try_from(error_obj.get("code")?.as_i64()?).ok()?,
                message: error_obj.get("message")?.as_str()?.to_string(),
                data: error_obj.get("data").cloned(),
            })
        });
        return Ok(JsonRpcPayload::Response(JsonRpcResponse { id, result, error }));
    }

    Err(invalid_data("Invalid JSON-RPC payload structure"))
}

pub fn payload_to_json(payload: JsonRpcPayload) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));

    match payload {
        JsonRpcPayload::Request(req) => {
            obj.insert("id".to_string(), Value::Number(req.id.into()));
            obj.insert("method".to_string(), Value::String(req.method));
            if let Some(params) = req.params {
                obj.insert("params".to_string(), params);
            }
        }
        JsonRpcPayload::Notification(notif) => {
            obj.insert("method".to_string(), Value::String(notif.method));
            if let Some(params) = notif.params {
                obj.insert("params".to_string(), params);
            }
        }
        JsonRpcPayload::Response(resp) => {
            obj.insert("id".to_string(), Value::Number(resp.id.into()));
            if let Some(error) = resp.error {
                let mut error_obj = Map::new();
                error_obj.insert("code".to_string(), Value::Number(error.code.into()));
                error_obj.insert("message".to_string(), Value::String(error.message));
                if let Some(data) = error.data {
                    error_obj.insert("data".to_string(), data);
                }
                obj.insert("error".to_string(), Value::Object(error_obj));
            } else {
                obj.insert("result".to_string(), resp.result.unwrap_or(Value::Null));
            }
        }
    }

    Value::Object(obj)
}
