//! The device's HTTP surface: request-head parsing, command routing and
//! response encoding. Only `GET` is understood and every response closes the
//! connection.

use crate::error::RequestError;

/// Parsed request line of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub method: String,
    pub target: String,
}

impl PendingRequest {
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(_version), None) => Ok(Self {
                method: method.to_string(),
                target: target.to_string(),
            }),
            _ => Err(RequestError::MalformedRequest(line.to_string())),
        }
    }
}

/// Line-at-a-time accumulator for the request head.
#[derive(Debug)]
pub struct RequestHead {
    max_lines: usize,
    lines_seen: usize,
    request_line: Option<String>,
    complete: bool,
}

impl RequestHead {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            lines_seen: 0,
            request_line: None,
            complete: false,
        }
    }

    /// Feeds one raw line. Returns `true` once the head is complete: a blank
    /// line was seen or the line cap was reached.
    pub fn push_line(&mut self, raw: &str) -> bool {
        if self.complete {
            return true;
        }

        let line = raw.trim();
        if line.is_empty() {
            self.complete = true;
            return true;
        }

        if self.request_line.is_none() && line.starts_with("GET ") {
            self.request_line = Some(line.to_string());
        }

        self.lines_seen += 1;
        if self.lines_seen >= self.max_lines {
            self.complete = true;
        }
        self.complete
    }

    /// End of stream counts as the end of the head.
    pub fn end_of_stream(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn finish(self) -> Result<PendingRequest, RequestError> {
        let line = self.request_line.ok_or(RequestError::EmptyRequest)?;
        PendingRequest::parse(&line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Reset,
    ForceOn,
    ForceOff,
    SetThreshold(i32),
    NotFound(String),
}

impl Command {
    /// First match wins, in this order: exact `/`, `command=reset`,
    /// `force=on`, `force=off`, `temp=`.
    pub fn route(target: &str) -> Self {
        if target == "/" {
            Self::Status
        } else if target.contains("command=reset") {
            Self::Reset
        } else if target.contains("force=on") {
            Self::ForceOn
        } else if target.contains("force=off") {
            Self::ForceOff
        } else if let Some((_, value)) = target.split_once("temp=") {
            parse_threshold(value)
                .map(Self::SetThreshold)
                .unwrap_or_else(|| Self::NotFound(target.to_string()))
        } else {
            Self::NotFound(target.to_string())
        }
    }
}

fn parse_threshold(value: &str) -> Option<i32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    SeeOther,
    NotFound,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::SeeOther => 303,
            Self::NotFound => 404,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::SeeOther => "Response redirect",
            Self::NotFound => "Not found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    pub fn page(body: String) -> Self {
        Self {
            status: StatusCode::Ok,
            body,
        }
    }

    pub fn redirect() -> Self {
        Self::error_page(StatusCode::SeeOther)
    }

    pub fn not_found() -> Self {
        Self::error_page(StatusCode::NotFound)
    }

    fn error_page(status: StatusCode) -> Self {
        Self {
            status,
            body: crate::page::error_page(status.code(), status.reason()),
        }
    }

    pub fn header_block(&self) -> String {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status.code(), self.status.reason());
        if self.status == StatusCode::SeeOther {
            head.push_str("Location: /\r\n");
        }
        head.push_str("Content-Type: text/html\r\n");
        head.push_str("Connection: close\r\n");
        head.push_str("\r\n");
        head
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_block().into_bytes();
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}
