use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use atticfan_common::HttpConfig;
use log::{info, warn};
use tokio::{
    net::{TcpListener, TcpSocket},
    task::JoinSet,
};

use crate::{app::AppState, connection};

pub fn bind(config: &HttpConfig) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.socket_addr()))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .context("failed to create listening socket")?;
    socket.set_reuseaddr(true)?;
    socket
        .bind(addr)
        .with_context(|| format!("failed to bind http server at {addr}"))?;
    let listener = socket.listen(config.backlog)?;

    info!("Listening on {addr}");
    Ok(listener)
}

/// Accept loop. Each pass waits at most `accept_poll_ms` for a client, then
/// sleeps `idle_poll_ms` so the other tasks keep running.
pub async fn run(state: AppState, listener: TcpListener) {
    let accept_poll = Duration::from_millis(state.config.http.accept_poll_ms);
    let idle_poll = Duration::from_millis(state.config.http.idle_poll_ms);
    let max_connections = state.config.http.max_connections;
    let mut handlers = JoinSet::new();

    loop {
        while handlers.len() >= max_connections {
            if let Some(Err(err)) = handlers.join_next().await {
                warn!("connection task failed: {err}");
            }
        }

        match tokio::time::timeout(accept_poll, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("Connection from: {peer}");
                handlers.spawn_local(connection::serve(state.clone(), stream));
                reclaim(&mut handlers);
            }
            Ok(Err(err)) => warn!("accept failed: {err}"),
            Err(_) => {}
        }

        tokio::time::sleep(idle_poll).await;
    }
}

/// Drops the bookkeeping of handlers that already finished.
fn reclaim<T: 'static>(handlers: &mut JoinSet<T>) {
    while let Some(result) = handlers.try_join_next() {
        if let Err(err) = result {
            warn!("connection task failed: {err}");
        }
    }
}
