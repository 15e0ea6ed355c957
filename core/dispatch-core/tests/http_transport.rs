use dispatch_core::{
    ApiClient, ApiRequest, ClientConfig, DispatchError, HttpTransport, Transport,
};
use dispatch_protocol::UnitKind;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Serves exactly one HTTP exchange and hands back the raw request.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("Failed to accept");
        let request = read_http_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().ok();
        request
    });
    (base_url, handle)
}

fn read_http_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("Failed to read request");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buffer).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).to_string()
}

fn transport(base_url: &str, cookie: Option<&str>) -> HttpTransport {
    let config = ClientConfig {
        api_url: base_url.to_string(),
        session_cookie: cookie.map(str::to_string),
        ..ClientConfig::default()
    };
    HttpTransport::new(&config).unwrap()
}

#[test]
fn put_carries_headers_and_json_body() {
    let (base_url, server) = serve_once("200 OK", r#"{"id":"u1","statusId":"s-2"}"#);
    let client = ApiClient::new(transport(&base_url, Some("snaily-cad-session=abc")));

    let record = client
        .update_status(UnitKind::Leo, "u1", "s-2")
        .unwrap()
        .expect("updated record");
    assert_eq!(record["statusId"], "s-2");

    let raw = server.join().unwrap();
    let lower = raw.to_ascii_lowercase();
    assert!(raw.starts_with("PUT /v1/leo/u1/status HTTP/1.1"), "{}", raw);
    assert!(lower.contains("accept: application/json"));
    assert!(lower.contains("cookie: snaily-cad-session=abc"));
    let request_id = lower
        .lines()
        .find_map(|line| line.strip_prefix("x-request-id: "))
        .expect("request id header");
    assert_eq!(request_id.trim().len(), 26);
    assert!(raw.ends_with(r#"{"status":"s-2"}"#));
}

#[test]
fn error_status_comes_back_as_response() {
    let (base_url, server) = serve_once("404 Not Found", r#"{"error":"noActiveOfficer"}"#);
    let transport = transport(&base_url, None);

    let response = transport
        .execute(&ApiRequest::get("/leo/active-officer"))
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, json!({ "error": "noActiveOfficer" }));

    let raw = server.join().unwrap();
    assert!(raw.starts_with("GET /v1/leo/active-officer HTTP/1.1"));
    assert!(!raw.to_ascii_lowercase().contains("cookie:"));
}

#[test]
fn empty_body_is_null() {
    let (base_url, server) = serve_once("200 OK", "");
    let response = transport(&base_url, None)
        .execute(&ApiRequest::get("/911-calls"))
        .unwrap();
    assert_eq!(response.body, Value::Null);
    server.join().unwrap();
}

#[test]
fn refused_connection_is_transport_error() {
    let base_url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let err = transport(&base_url, None)
        .execute(&ApiRequest::get("/leo"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport { ref path, .. } if path == "/leo"));
}
