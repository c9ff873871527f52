//! HTTP adapter for the inode store.
//!
//! Every operation is `GET /api/<op>` with plain-text query parameters.
//! Handlers parse arguments, call into the store behind a per-request lock,
//! and render plain-text bodies; `read` replies with raw bytes and `write`
//! accepts its payload as base64, so the store only ever sees raw byte
//! sequences.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use tiny_http::{Header, Method, Request, Response, Server};

use tansu_store::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, InodeDb, StoreError};

use crate::constants::DEFAULT_READ_SIZE;

type Params = HashMap<String, String>;

/// HTTP front end owning the listener and the store it serves.
pub struct HttpServer {
    server: Server,
    store: Mutex<InodeDb>,
}

impl HttpServer {
    /// Bind a listener on `addr` for an already-open store.
    ///
    /// The store is initialized by opening it, so by construction no request
    /// can be served before initialization has happened.
    pub fn bind(addr: &str, store: InodeDb) -> anyhow::Result<Self> {
        let server =
            Server::http(addr).map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
        Ok(Self {
            server,
            store: Mutex::new(store),
        })
    }

    /// The socket address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve requests until the listener shuts down. One request at a time;
    /// the store lock is held for the duration of a single operation.
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            self.handle(request);
        }
    }

    fn handle(&self, request: Request) {
        let reply = self.dispatch(&request);
        tracing::debug!(
            "{} {} -> {}",
            request.method(),
            request.url(),
            reply.status
        );

        let outcome = match reply.body {
            ReplyBody::Text(text) => {
                request.respond(Response::from_string(text).with_status_code(reply.status))
            }
            ReplyBody::Bytes(bytes) => request.respond(
                Response::from_data(bytes)
                    .with_status_code(reply.status)
                    .with_header(octet_stream()),
            ),
        };
        if let Err(e) = outcome {
            tracing::error!("failed to send response: {e}");
        }
    }

    fn dispatch(&self, request: &Request) -> Reply {
        if request.method() != &Method::Get {
            return Reply::text(405, "error: method not allowed");
        }

        let (path, query) = split_url(request.url());
        let op = match path.strip_prefix("/api/") {
            Some(op) => op,
            None => return Reply::text(404, "error: not found"),
        };
        let params = parse_query(query);

        let result = match op {
            "list" => self.op_list(&params),
            "lookup" => self.op_lookup(&params),
            "create" => self.op_create(&params),
            "mkdir" => self.op_mkdir(&params),
            "read" => self.op_read(&params),
            "write" => self.op_write(&params),
            "unlink" => self.op_unlink(&params),
            "rmdir" => self.op_rmdir(&params),
            _ => Ok(Reply::text(400, "error: unknown method")),
        };
        result.unwrap_or_else(|msg| Reply::text(400, format!("error: {msg}")))
    }

    // =========================================================================
    // Operation handlers
    // =========================================================================

    fn op_list(&self, params: &Params) -> Result<Reply, String> {
        let parent_ino = req(params, "parent_ino")?;

        Ok(match self.store.lock().list(parent_ino) {
            Ok(entries) => {
                let mut body = String::new();
                for entry in entries {
                    body.push_str(&format!(
                        "{} {} {}\n",
                        entry.ino,
                        entry.name,
                        entry.kind.as_str()
                    ));
                }
                Reply::text(200, body)
            }
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_lookup(&self, params: &Params) -> Result<Reply, String> {
        let parent_ino = req(params, "parent_ino")?;
        let name = req_str(params, "name")?;

        Ok(match self.store.lock().lookup(parent_ino, name) {
            Ok(inode) => Reply::text(
                200,
                format!("{} {} {}", inode.ino, inode.kind.as_str(), inode.mode),
            ),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_create(&self, params: &Params) -> Result<Reply, String> {
        let parent_ino = req(params, "parent_ino")?;
        let name = req_str(params, "name")?;
        let mode = opt(params, "mode", DEFAULT_FILE_MODE)?;

        Ok(match self.store.lock().create(parent_ino, name, mode) {
            Ok(ino) => Reply::text(200, ino.to_string()),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_mkdir(&self, params: &Params) -> Result<Reply, String> {
        let parent_ino = req(params, "parent_ino")?;
        let name = req_str(params, "name")?;
        let mode = opt(params, "mode", DEFAULT_DIR_MODE)?;

        Ok(match self.store.lock().mkdir(parent_ino, name, mode) {
            Ok(ino) => Reply::text(200, ino.to_string()),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_read(&self, params: &Params) -> Result<Reply, String> {
        let ino = req(params, "ino")?;
        let offset = opt(params, "offset", 0u64)?;
        let size = opt(params, "size", DEFAULT_READ_SIZE)?;

        Ok(match self.store.lock().read(ino, offset, size) {
            Ok(data) => Reply::bytes(data),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_write(&self, params: &Params) -> Result<Reply, String> {
        let ino = req(params, "ino")?;
        let offset = opt(params, "offset", 0u64)?;
        let encoded = params.get("data").map(String::as_str).unwrap_or("");
        let data = match BASE64.decode(encoded) {
            Ok(data) => data,
            Err(_) => return Ok(Reply::text(400, "error: bad data encoding")),
        };

        Ok(match self.store.lock().write(ino, offset, &data) {
            Ok(()) => Reply::text(200, "ok"),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_unlink(&self, params: &Params) -> Result<Reply, String> {
        let ino = req(params, "ino")?;

        Ok(match self.store.lock().unlink(ino) {
            Ok(()) => Reply::text(200, "ok"),
            Err(err) => Reply::from_store_error(err),
        })
    }

    fn op_rmdir(&self, params: &Params) -> Result<Reply, String> {
        let ino = req(params, "ino")?;

        Ok(match self.store.lock().rmdir(ino) {
            Ok(()) => Reply::text(200, "ok"),
            Err(err) => Reply::from_store_error(err),
        })
    }
}

// =============================================================================
// Replies
// =============================================================================

/// Status code plus body, ready to render.
struct Reply {
    status: u16,
    body: ReplyBody,
}

enum ReplyBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(body.into()),
        }
    }

    fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body: ReplyBody::Bytes(body),
        }
    }

    /// Map store errors onto the wire taxonomy.
    fn from_store_error(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::text(404, "error: not found"),
            StoreError::NotEmpty(_) => Self::text(409, "error: directory not empty"),
            StoreError::AlreadyExists(_) => Self::text(409, "error: already exists"),
            StoreError::InvalidParent(_) => Self::text(400, "error: invalid parent"),
            StoreError::TooLarge(_) => Self::text(413, "error: file too large"),
            StoreError::Sqlite(e) => {
                tracing::error!("store failure: {e}");
                Self::text(500, "error: internal")
            }
        }
    }
}

fn octet_stream() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"application/octet-stream"[..])
        .expect("static header is valid")
}

// =============================================================================
// Query parsing
// =============================================================================

/// Split a request URL into path and raw query string.
fn split_url(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

/// Parse a query string into a key/value map, last occurrence winning.
/// Keys and values are percent-decoded.
fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        params.insert(percent_decode(key), percent_decode(value));
    }
    params
}

/// Decode percent escapes and `+`-as-space in a query component. Malformed
/// escapes pass through literally; decoded bytes are read as UTF-8, lossily.
fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Required parameter, parsed with `FromStr`.
fn req<T: FromStr>(params: &Params, key: &str) -> Result<T, String> {
    match params.get(key) {
        Some(raw) => raw.parse().map_err(|_| format!("bad parameter: {key}")),
        None => Err(format!("missing parameter: {key}")),
    }
}

/// Optional parameter with a default, parsed with `FromStr`.
fn opt<T: FromStr>(params: &Params, key: &str, default: T) -> Result<T, String> {
    match params.get(key) {
        Some(raw) => raw.parse().map_err(|_| format!("bad parameter: {key}")),
        None => Ok(default),
    }
}

/// Required string parameter, returned as-is.
fn req_str<'a>(params: &'a Params, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing parameter: {key}"))
}
