use tokio::sync::{mpsc, oneshot};

use super::handler::JsonRpcHandler;
use super::message::{JsonRpcPayload, JsonRpcSendError};

pub struct JsonRpcEngine<H: JsonRpcHandler> {
    // stdinから届いたリクエスト・通知
    receiver: mpsc::UnboundedReceiver<JsonRpcPayload>,
    // stdoutへ書き出すレスポンス・通知
    sender: mpsc::UnboundedSender<JsonRpcPayload>,
    handler: H,
    shutdown_receiver: oneshot::Receiver<()>,
}

impl<H: JsonRpcHandler> JsonRpcEngine<H> {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<JsonRpcPayload>,
        sender: mpsc::UnboundedSender<JsonRpcPayload>,
        handler: H,
        shutdown_receiver: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            receiver,
            sender,
            handler,
            shutdown_receiver,
        }
    }

    pub fn send(&self, payload: JsonRpcPayload) -> Result<(), JsonRpcSendError> {
        self.sender
            .send(payload)
            .map_err(|_| JsonRpcSendError::ChannelClosed)
    }

    /// Process payloads until shutdown or until the input side is closed.
    pub async fn run_main_loop(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown_receiver => {
                    log::debug!("Shutdown requested, leaving main loop");
                    break;
                }
                payload = self.receiver.recv() => {
                    match payload {
                        Some(payload) => self.handle_received_payload(payload).await,
                        // 入力側が閉じられた
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_received_payload(&mut self, payload: JsonRpcPayload) {
        match payload {
            JsonRpcPayload::Request(request) => {
                log::debug!("Request {} {}", request.id, request.method);
                let response = self.handler.on_request(request).await;
                if self.send(JsonRpcPayload::Response(response)).is_err() {
                    log::warn!("Output channel closed, dropping response");
                }
            }
            JsonRpcPayload::Notification(notification) => {
                log::debug!("Notification {}", notification.method);
                self.handler.on_notification(notification).await;
            }
            JsonRpcPayload::Response(response) => {
                // このサーバーからはリクエストを送らない
                log::debug!("Ignoring unexpected response {}", response.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::message::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct EchoHandler {
        notifications: Arc<Mutex<Vec<JsonRpcNotification>>>,
    }

    #[async_trait]
    impl JsonRpcHandler for EchoHandler {
        async fn on_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
            JsonRpcResponse::success(request.id, json!({ "echo": request.method }))
        }

        async fn on_notification(&mut self, notification: JsonRpcNotification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    fn echo_handler() -> (EchoHandler, Arc<Mutex<Vec<JsonRpcNotification>>>) {
        let notifications = Arc::new(Mutex::new(Vec::new()));
        (
            EchoHandler {
                notifications: notifications.clone(),
            },
            notifications,
        )
    }

    #[tokio::test]
    async fn test_request_gets_response() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handler, _) = echo_handler();

        let engine = JsonRpcEngine::new(in_rx, out_tx, handler, shutdown_rx);
        let loop_handle = tokio::spawn(engine.run_main_loop());

        in_tx
            .send(JsonRpcPayload::Request(JsonRpcRequest {
                id: 42,
                method: "search".to_string(),
                params: None,
            }))
            .unwrap();

        let response = out_rx.recv().await.unwrap();
        assert_eq!(
            response,
            JsonRpcPayload::Response(JsonRpcResponse::success(42, json!({ "echo": "search" })))
        );

        drop(in_tx);
        tokio::time::timeout(Duration::from_millis(500), loop_handle)
            .await
            .expect("main loop should stop when the input closes")
            .unwrap();
    }

    #[tokio::test]
    async fn test_notification_reaches_handler_without_response() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handler, notifications) = echo_handler();

        let engine = JsonRpcEngine::new(in_rx, out_tx, handler, shutdown_rx);
        let loop_handle = tokio::spawn(engine.run_main_loop());

        in_tx
            .send(JsonRpcPayload::Notification(JsonRpcNotification {
                method: "cancel".to_string(),
                params: Some(json!({ "searchId": 1 })),
            }))
            .unwrap();
        drop(in_tx);
        loop_handle.await.unwrap();

        let notifications = notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].method, "cancel");
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_main_loop() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handler, _) = echo_handler();

        let engine = JsonRpcEngine::new(in_rx, out_tx, handler, shutdown_rx);
        let loop_handle = tokio::spawn(engine.run_main_loop());

        shutdown_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(500), loop_handle).await;
        assert!(result.is_ok(), "Main loop should have stopped after shutdown signal");
    }
}
