//! JSON-RPC 2.0 over stdio
//!
//! - [`stdio`]: Content-Length framing and payload conversion
//! - [`engine`]: main loop dispatching payloads to a [`JsonRpcHandler`]
//! - [`search`]: `search`/`cancel` methods and `onResult`/`onDone` notifications

pub mod engine;
pub mod handler;
pub mod message;
pub mod search;
pub mod stdio;

pub use engine::JsonRpcEngine;
pub use handler::JsonRpcHandler;
pub use message::{
    JsonRpcError, JsonRpcNotification, JsonRpcPayload, JsonRpcRequest, JsonRpcResponse,
};
pub use search::{RpcSearchClient, SearchRpcHandler};
