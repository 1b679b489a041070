//! Cooperative executor. Every task runs on one thread inside a `LocalSet`;
//! a task only gives up the CPU at an `.await`.

use std::future::Future;

use anyhow::Context;
use log::info;
use tokio::{net::TcpListener, task::LocalSet};

use crate::{app::AppState, control_loop, listener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A client asked for a device reset.
    Restart,
    /// The platform asked the controller to stop.
    Interrupted,
}

/// Builds the single-threaded runtime and drives `future` to completion on it.
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    Ok(LocalSet::new().block_on(&runtime, future))
}

/// Runs the listener and control loop until a restart is requested or
/// `interrupt` resolves. Must be polled inside a `LocalSet`.
pub async fn run<I>(state: AppState, listener: TcpListener, interrupt: I) -> Shutdown
where
    I: Future<Output = ()>,
{
    let control = tokio::task::spawn_local(control_loop::run(state.clone()));
    let server = tokio::task::spawn_local(listener::run(state.clone(), listener));

    let shutdown = tokio::select! {
        _ = state.restart_requested() => Shutdown::Restart,
        _ = interrupt => Shutdown::Interrupted,
    };

    // Dropping the listener task drops its handlers and closes their sockets.
    control.abort();
    server.abort();
    let _ = control.await;
    let _ = server.await;

    info!("scheduler stopped: {shutdown:?}");
    shutdown
}
