//! In-process fake of the risk backend.
//!
//! Each accepted connection gets one response and is closed. Routes are
//! matched on the request line prefix (`"GET /api/risk/current"`).

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub enum Reply {
    /// Status line tail (`"200 OK"`) and a JSON body.
    Json(&'static str, String),
    /// SSE body written in the given chunks with a short pause between them,
    /// then the connection is closed.
    Sse(Vec<String>),
    /// Like `Sse` but keeps the connection open for a few seconds afterwards.
    SseThenHang(Vec<String>),
}

pub struct FakeBackend {
    pub base: String,
}

pub fn spawn(routes: Vec<(&'static str, Reply)>) -> FakeBackend {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake backend");
    let base = format!("http://{}", listener.local_addr().unwrap());

    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(_) => continue,
            };
            let routes = routes.clone();
            thread::spawn(move || handle(stream, &routes));
        }
    });

    FakeBackend { base }
}

/// A base URL nothing listens on.
pub fn dead_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn envelope_ok(data: serde_json::Value) -> String {
    serde_json::json!({"code": 200, "message": "ok", "data": data}).to_string()
}

pub fn envelope_fail(code: i64, message: &str) -> String {
    serde_json::json!({"code": code, "message": message, "data": null}).to_string()
}

fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut have = buf.len() - head_end;
    while have < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        have += n;
    }
    head.lines().next().map(|l| l.to_string())
}

fn handle(mut stream: TcpStream, routes: &[(&'static str, Reply)]) {
    let request_line = match read_request(&mut stream) {
        Some(l) => l,
        None => return,
    };

    let reply = routes
        .iter()
        .find(|(prefix, _)| request_line.starts_with(prefix))
        .map(|(_, r)| r.clone());

    match reply {
        Some(Reply::Json(status, body)) => {
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Some(Reply::Sse(chunks)) => write_sse(&mut stream, &chunks),
        Some(Reply::SseThenHang(chunks)) => {
            write_sse(&mut stream, &chunks);
            thread::sleep(Duration::from_secs(5));
        }
        None => {
            let body = "Not Found";
            let response = format!(
                "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    }
    let _ = stream.flush();
}

fn write_sse(stream: &mut TcpStream, chunks: &[String]) {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for chunk in chunks {
        if stream.write_all(chunk.as_bytes()).is_err() {
            return;
        }
        let _ = stream.flush();
        thread::sleep(Duration::from_millis(15));
    }
}
