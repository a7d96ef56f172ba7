//! Result sinks for search sessions

use crate::types::{SearchId, SearchResult};
use tokio::sync::mpsc;

/// Receives results and completion notices from the search server.
///
/// Callbacks are invoked synchronously from the search's driver task, or
/// from the thread calling `cancel`, without any server lock held. They may
/// call back into the server, e.g. to cancel a search from `on_result`.
/// No `on_result` for a search follows its `on_done`.
pub trait SearchClient: Send + Sync {
    /// One completed file.
    fn on_result(&self, search_id: SearchId, result: SearchResult);

    /// Terminal notice, sent exactly once per search. `error` is set when the
    /// search ended abnormally.
    fn on_done(&self, search_id: SearchId, error: Option<String>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Result {
        search_id: SearchId,
        result: SearchResult,
    },
    Done {
        search_id: SearchId,
        error: Option<String>,
    },
}

/// `SearchClient` that forwards every callback into a channel.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    sender: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ClientEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Client channel closed, dropping event");
        }
    }
}

impl SearchClient for ChannelClient {
    fn on_result(&self, search_id: SearchId, result: SearchResult) {
        self.send(ClientEvent::Result { search_id, result });
    }

    fn on_done(&self, search_id: SearchId, error: Option<String>) {
        self.send(ClientEvent::Done { search_id, error });
    }
}
