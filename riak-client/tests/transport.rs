//! The hyper transport against a local HTTP/1.1 server

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use riak_client::*;
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn handle(req: Request<Incoming>) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let color = req
        .headers()
        .get("x-riak-meta-color")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = req.into_body().collect().await?.to_bytes();

    let response = match (method, path.as_str()) {
        (hyper::Method::GET, "/ping") => Response::builder().status(200).body(Full::new(Bytes::from("OK"))),
        (hyper::Method::GET, "/riak/people/alice") => Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .header("x-riak-vclock", "vc-live")
            .header("link", "</riak/people>; rel=\"up\", </riak/people/bob>; riaktag=\"friend\"")
            .header("x-riak-meta-color", "blue")
            .body(Full::new(Bytes::from(r#"{"name":"alice"}"#))),
        (hyper::Method::PUT, "/riak/people/carol") => Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .header("x-riak-meta-color", color)
            .header("x-echo-query", query)
            .body(Full::new(body)),
        _ => Response::builder().status(404).body(Full::new(Bytes::from("not found\n"))),
    };
    Ok(response.unwrap())
}

/// Serve on a background thread with its own runtime; the transport under
/// test blocks on a runtime of its own
fn spawn_server() -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(handle))
                        .await;
                });
            }
        });
    });
    rx.recv().unwrap()
}

fn live_client() -> RiakClient {
    let addr = spawn_server();
    let config = ClientConfig::new("127.0.0.1", addr.port()).with_client_id("live-test");
    RiakClient::new(config).unwrap()
}

#[test]
fn test_ping_over_http() {
    assert!(live_client().is_alive());
}

#[test]
fn test_read_over_http() {
    let client = live_client();
    let object = client.bucket("people").get("alice", None).unwrap();

    assert!(object.exists());
    assert_eq!(object.data(), Some(&json!({"name": "alice"})));
    assert_eq!(object.vclock(), Some("vc-live"));
    assert_eq!(object.meta("color"), Some("blue"));
    assert_eq!(object.links(), [Link::new("people", "bob", Some("friend".to_string()))]);
}

#[test]
fn test_missing_over_http() {
    let client = live_client();
    let object = client.bucket("people").get("nobody", None).unwrap();
    assert!(!object.exists());
    assert_eq!(object.status(), Some(404));
}

#[test]
fn test_store_over_http() {
    let client = live_client();
    let mut object = client
        .bucket("people")
        .new_object(Some("carol"), json!({"name": "carol"}));
    object.set_meta("color", "green");
    object.store(None, None).unwrap();

    assert_eq!(object.data(), Some(&json!({"name": "carol"})));
    assert_eq!(object.meta("color"), Some("green"));
    assert_eq!(object.headers().get("x-echo-query"), Some("returnbody=true&w=2&dw=2"));
}

#[test]
fn test_unreachable_server() {
    let config = ClientConfig::new("127.0.0.1", 1);
    let client = RiakClient::new(config).unwrap();
    assert!(!client.is_alive());
    assert!(matches!(
        client.bucket("b").get("k", None),
        Err(RiakError::TransportUnavailable { .. })
    ));
}
