//! workspace-search-server
//!
//! Serves ripgrep backed workspace searches over JSON-RPC on stdio.
//! Logs go to stderr and are controlled with `RUST_LOG`.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::{mpsc, oneshot};
use workspace_search::cli::Cli;
use workspace_search::jsonrpc::{stdio, JsonRpcEngine, RpcSearchClient, SearchRpcHandler};
use workspace_search::SearchServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Cli::parse().into_config();
    log::info!(
        "Starting workspace-search-server with ripgrep at {}",
        config.rg_path.display()
    );

    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = SearchServer::new(config);
    server.set_client(Some(Arc::new(RpcSearchClient::new(stdout_tx.clone()))));

    let writer = tokio::spawn(stdio::write_loop(tokio::io::stdout(), stdout_rx));
    let engine = JsonRpcEngine::new(
        stdin_rx,
        stdout_tx,
        SearchRpcHandler::new(server.clone()),
        shutdown_rx,
    );
    let engine = tokio::spawn(engine.run_main_loop());

    let read_result = stdio::read_loop(BufReader::new(tokio::io::stdin()), stdin_tx).await;
    if let Err(e) = &read_result {
        log::error!("Stdin read loop error: {}", e);
    }
    log::info!("Input closed, shutting down");

    // The engine may already be gone after EOF
    let _ = shutdown_tx.send(());
    engine.await.context("JSON-RPC engine task failed")?;

    // onDone for every remaining search is still written out
    server.dispose();
    server.set_client(None);
    drop(server);

    writer
        .await
        .context("stdout writer task failed")?
        .context("failed to write to stdout")?;

    read_result.context("failed to read from stdin")?;
    Ok(())
}
