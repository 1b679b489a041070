//! One short-lived task per accepted socket: read the request head, dispatch
//! the command, write a single response and close.

use std::time::Duration;

use atticfan_common::{Command, PendingRequest, RequestError, RequestHead, Response, StatusCode};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::app::AppState;

const MAX_LINE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    ReadingHeaders,
    Dispatching,
    WritingResponse,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Responded(StatusCode),
    /// 303 flushed; the device restarts next.
    Restart,
    Dropped(RequestError),
    IoFailed,
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("connection i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer stalled")]
    Timeout,
}

pub async fn serve<S>(state: AppState, stream: S) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut phase = ConnectionState::ReadingHeaders;

    let outcome = match exchange(&state, &mut stream, &mut phase).await {
        Ok(outcome) => outcome,
        Err(ConnectionError::Request(err)) => {
            debug!("dropping connection: {err}");
            Outcome::Dropped(err)
        }
        Err(err) => {
            debug!("connection closed in {phase:?}: {err}");
            Outcome::IoFailed
        }
    };

    if let Err(err) = stream.shutdown().await {
        debug!("socket shutdown: {err}");
    }
    phase = ConnectionState::Closed;
    debug!("connection {phase:?}");

    if outcome == Outcome::Restart {
        warn!("restarting device");
        state.request_restart();
    }
    outcome
}

async fn exchange<S>(
    state: &AppState,
    stream: &mut S,
    phase: &mut ConnectionState,
) -> Result<Outcome, ConnectionError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let read_timeout = Duration::from_millis(state.config.http.read_timeout_ms);
    let request = tokio::time::timeout(
        read_timeout,
        read_request(stream, state.config.http.max_header_lines),
    )
    .await
    .map_err(|_| ConnectionError::Timeout)??;
    debug!("request: {} {}", request.method, request.target);

    *phase = ConnectionState::Dispatching;
    let command = Command::route(&request.target);
    let response = dispatch(state, &command);

    *phase = ConnectionState::WritingResponse;
    tokio::time::timeout(read_timeout, async {
        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| ConnectionError::Timeout)??;

    Ok(if command == Command::Reset {
        Outcome::Restart
    } else {
        Outcome::Responded(response.status)
    })
}

async fn read_request<S>(stream: &mut S, max_lines: usize) -> Result<PendingRequest, ConnectionError>
where
    S: AsyncBufRead + Unpin,
{
    let mut head = RequestHead::new(max_lines);
    let mut line = Vec::new();

    while !head.is_complete() {
        line.clear();
        if read_line_capped(stream, &mut line).await? == 0 {
            head.end_of_stream();
            break;
        }
        head.push_line(&String::from_utf8_lossy(&line));
    }

    Ok(head.finish()?)
}

/// Reads one `\n`-terminated line, keeping at most `MAX_LINE_BYTES` of it.
/// The rest of an over-long line is consumed and dropped so it still counts
/// as a single line. Returns the number of bytes consumed.
async fn read_line_capped<S>(stream: &mut S, line: &mut Vec<u8>) -> std::io::Result<usize>
where
    S: AsyncBufRead + Unpin,
{
    let mut consumed = 0;
    loop {
        let buf = stream.fill_buf().await?;
        if buf.is_empty() {
            return Ok(consumed);
        }

        let (chunk, done) = match buf.iter().position(|b| *b == b'\n') {
            Some(end) => (&buf[..=end], true),
            None => (buf, false),
        };
        let room = MAX_LINE_BYTES.saturating_sub(line.len());
        line.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = chunk.len();
        stream.consume(used);
        consumed += used;
        if done {
            return Ok(consumed);
        }
    }
}

/// Applies the command to shared state. Runs without yielding, so every
/// mutation here is atomic with respect to the other tasks.
fn dispatch(state: &AppState, command: &Command) -> Response {
    match command {
        Command::Status => {
            info!("send page");
            Response::page(state.render_status())
        }
        Command::Reset => {
            info!("send redirect before reset");
            Response::redirect()
        }
        Command::ForceOn => {
            if let Err(err) = state.fan.borrow_mut().force_on() {
                error!("force on: {err}");
            }
            info!("send redirect");
            Response::redirect()
        }
        Command::ForceOff => {
            if let Err(err) = state.fan.borrow_mut().force_off() {
                error!("force off: {err}");
            }
            info!("send redirect");
            Response::redirect()
        }
        Command::SetThreshold(threshold) => {
            if state.fan.borrow_mut().set_threshold(*threshold) {
                info!("threshold set to {threshold}");
            }
            info!("send redirect");
            Response::redirect()
        }
        Command::NotFound(target) => {
            error!("URL error: {target:?}");
            Response::not_found()
        }
    }
}
