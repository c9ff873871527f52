//! End-to-end tests driving the HTTP adapter over a real listener.
//!
//! Each test boots its own server on an ephemeral port with a fresh
//! in-memory store and talks to it the way a remote client would.

use std::fmt::Write as _;
use std::thread;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tansu_server::HttpServer;
use tansu_store::InodeDb;
use ureq::Agent;

/// Start a server on an ephemeral port, returning its `/api` base URL.
fn start_server() -> String {
    let store = InodeDb::in_memory().expect("in-memory store");
    let server = HttpServer::bind("127.0.0.1:0", store).expect("bind listener");
    let addr = server.local_addr().expect("tcp listener has an address");
    thread::spawn(move || server.run());
    format!("http://{addr}/api")
}

/// Agent that hands 4xx/5xx responses back instead of erroring.
fn agent() -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent()
}

fn get_text(agent: &Agent, url: &str) -> (u16, String) {
    let response = agent.get(url).call().expect("request");
    let status = response.status().as_u16();
    let body = response.into_body().read_to_string().expect("text body");
    (status, body)
}

fn get_bytes(agent: &Agent, url: &str) -> (u16, Vec<u8>) {
    let response = agent.get(url).call().expect("request");
    let status = response.status().as_u16();
    let body = response.into_body().read_to_vec().expect("byte body");
    (status, body)
}

/// Percent-encode a query value (base64 payloads carry `+`, `/` and `=`).
fn encode_query_value(raw: &str) -> String {
    let mut out = String::new();
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn create_file(agent: &Agent, base: &str, parent_ino: i64, name: &str) -> i64 {
    let (status, body) = get_text(
        agent,
        &format!("{base}/create?parent_ino={parent_ino}&name={name}"),
    );
    assert_eq!(status, 200, "create failed: {body}");
    body.trim().parse().expect("create returns the new ino")
}

fn mkdir(agent: &Agent, base: &str, parent_ino: i64, name: &str) -> i64 {
    let (status, body) = get_text(
        agent,
        &format!("{base}/mkdir?parent_ino={parent_ino}&name={name}"),
    );
    assert_eq!(status, 200, "mkdir failed: {body}");
    body.trim().parse().expect("mkdir returns the new ino")
}

fn write_at(agent: &Agent, base: &str, ino: i64, offset: u64, data: &[u8]) {
    let encoded = encode_query_value(&BASE64.encode(data));
    let (status, body) = get_text(
        agent,
        &format!("{base}/write?ino={ino}&offset={offset}&data={encoded}"),
    );
    assert_eq!((status, body.as_str()), (200, "ok"));
}

#[test]
fn create_write_read_roundtrip() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "hello.txt");
    write_at(&agent, &base, ino, 0, b"hello over the wire");

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}"));
    assert_eq!(status, 200);
    assert_eq!(data, b"hello over the wire".to_vec());

    let (status, body) = get_text(
        &agent,
        &format!("{base}/lookup?parent_ino=0&name=hello.txt"),
    );
    assert_eq!(status, 200);
    assert_eq!(body, format!("{ino} file 438"));
}

#[test]
fn lookup_root_by_encoded_name() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/lookup?parent_ino=0&name=%2F"));
    assert_eq!(status, 200);
    assert_eq!(body, "0 dir 511");
}

#[test]
fn lookup_missing_is_404() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/lookup?parent_ino=0&name=ghost"));
    assert_eq!(status, 404);
    assert_eq!(body, "error: not found");
}

#[test]
fn list_shows_each_child_once() {
    let base = start_server();
    let agent = agent();

    let file = create_file(&agent, &base, 0, "hello.txt");
    let dir = mkdir(&agent, &base, 0, "docs");

    let (status, body) = get_text(&agent, &format!("{base}/list?parent_ino=0"));
    assert_eq!(status, 200);

    let lines: Vec<&str> = body.lines().collect();
    for expected in [
        "0 / dir".to_string(),
        format!("{file} hello.txt file"),
        format!("{dir} docs dir"),
    ] {
        assert_eq!(
            lines.iter().filter(|l| **l == expected).count(),
            1,
            "expected exactly one {expected:?} in {lines:?}"
        );
    }
}

#[test]
fn mkdir_default_mode_is_directory_default() {
    let base = start_server();
    let agent = agent();

    let dir = mkdir(&agent, &base, 0, "docs");
    let (status, body) = get_text(&agent, &format!("{base}/lookup?parent_ino=0&name=docs"));
    assert_eq!(status, 200);
    assert_eq!(body, format!("{dir} dir 511"));
}

#[test]
fn sparse_write_zero_fills_over_the_wire() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "sparse");
    write_at(&agent, &base, ino, 5, b"AB");

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}&offset=0&size=10"));
    assert_eq!(status, 200);
    assert_eq!(data, b"\x00\x00\x00\x00\x00AB".to_vec());
}

#[test]
fn overwrite_preserves_tail_over_the_wire() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "tail");
    write_at(&agent, &base, ino, 0, b"HELLOWORLD");
    write_at(&agent, &base, ino, 2, b"XY");

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}"));
    assert_eq!(status, 200);
    assert_eq!(data, b"HEXYOWORLD".to_vec());
}

#[test]
fn read_past_eof_is_empty_200() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "short");
    write_at(&agent, &base, ino, 0, b"12345");

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}&offset=99&size=10"));
    assert_eq!(status, 200);
    assert!(data.is_empty());
}

#[test]
fn read_missing_file_is_404() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/read?ino=4242"));
    assert_eq!(status, 404);
    assert_eq!(body, "error: not found");
}

#[test]
fn write_without_data_is_ok_and_changes_nothing() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "f");
    write_at(&agent, &base, ino, 0, b"abc");

    let (status, body) = get_text(&agent, &format!("{base}/write?ino={ino}"));
    assert_eq!((status, body.as_str()), (200, "ok"));

    let (_, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}"));
    assert_eq!(data, b"abc".to_vec());
}

#[test]
fn binary_payload_survives_base64_and_percent_encoding() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "blob");
    let payload: Vec<u8> = (0u8..=255).collect();
    write_at(&agent, &base, ino, 0, &payload);

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}&size=1024"));
    assert_eq!(status, 200);
    assert_eq!(data, payload);
}

#[test]
fn bad_base64_payload_is_400() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "f");
    let (status, body) = get_text(&agent, &format!("{base}/write?ino={ino}&data=!!"));
    assert_eq!(status, 400);
    assert_eq!(body, "error: bad data encoding");
}

#[test]
fn write_offset_overflow_is_413_and_server_keeps_serving() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "f");
    let (status, body) = get_text(
        &agent,
        &format!("{base}/write?ino={ino}&offset=18446744073709551615&data=QUI%3D"),
    );
    assert_eq!(status, 413);
    assert_eq!(body, "error: file too large");

    // The listener must answer the next request as if nothing happened.
    let (status, body) = get_text(&agent, &format!("{base}/list?parent_ino=0"));
    assert_eq!(status, 200);
    assert!(body.lines().any(|l| l.ends_with(" f file")));

    let (status, data) = get_bytes(&agent, &format!("{base}/read?ino={ino}"));
    assert_eq!(status, 200);
    assert!(data.is_empty(), "rejected write must not change content");
}

#[test]
fn unlink_is_idempotent_over_the_wire() {
    let base = start_server();
    let agent = agent();

    let ino = create_file(&agent, &base, 0, "gone");
    for _ in 0..2 {
        let (status, body) = get_text(&agent, &format!("{base}/unlink?ino={ino}"));
        assert_eq!((status, body.as_str()), (200, "ok"));
    }

    let (status, _) = get_text(&agent, &format!("{base}/read?ino={ino}"));
    assert_eq!(status, 404);
}

#[test]
fn rmdir_guard_then_success() {
    let base = start_server();
    let agent = agent();

    let dir = mkdir(&agent, &base, 0, "nest");
    let inner = create_file(&agent, &base, dir, "inner");

    let (status, body) = get_text(&agent, &format!("{base}/rmdir?ino={dir}"));
    assert_eq!(status, 409);
    assert_eq!(body, "error: directory not empty");

    let (status, _) = get_text(&agent, &format!("{base}/unlink?ino={inner}"));
    assert_eq!(status, 200);

    let (status, body) = get_text(&agent, &format!("{base}/rmdir?ino={dir}"));
    assert_eq!((status, body.as_str()), (200, "ok"));

    let (status, _) = get_text(&agent, &format!("{base}/lookup?parent_ino=0&name=nest"));
    assert_eq!(status, 404);
}

#[test]
fn duplicate_sibling_is_409() {
    let base = start_server();
    let agent = agent();

    create_file(&agent, &base, 0, "dup");
    let (status, body) = get_text(&agent, &format!("{base}/create?parent_ino=0&name=dup"));
    assert_eq!(status, 409);
    assert_eq!(body, "error: already exists");
}

#[test]
fn invalid_parent_is_400() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/create?parent_ino=9999&name=orphan"));
    assert_eq!(status, 400);
    assert_eq!(body, "error: invalid parent");
}

#[test]
fn missing_parameter_is_400() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/list"));
    assert_eq!(status, 400);
    assert_eq!(body, "error: missing parameter: parent_ino");
}

#[test]
fn unknown_method_is_400() {
    let base = start_server();
    let agent = agent();

    let (status, body) = get_text(&agent, &format!("{base}/chmod?ino=0&mode=0"));
    assert_eq!(status, 400);
    assert_eq!(body, "error: unknown method");
}

#[test]
fn non_api_path_is_404() {
    let base = start_server();
    let agent = agent();

    let root = base.trim_end_matches("/api").to_string();
    let (status, _) = get_text(&agent, &format!("{root}/health"));
    assert_eq!(status, 404);
}

#[test]
fn non_get_method_is_405() {
    let base = start_server();
    let agent = agent();

    let response = agent
        .post(&format!("{base}/unlink?ino=1"))
        .send("")
        .expect("post request");
    assert_eq!(response.status().as_u16(), 405);
}
