//! Live-server tests: a real `may_minihttp` listener driven with a
//! blocking HTTP client, covering the transport adapter and the client
//! invokers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slimapi::method::ApiMethod;
use slimapi::registry::{ApiMethodRegister, BasicApiMethodRegister};
use slimapi::response::ApiResponse;
use slimapi::runtime_config::RuntimeConfig;
use slimapi::server::{HttpServer, ServerHandle, SlimApiService};
use slimapi::slimapi::{new_slim_api_handler, SlimApiInvoker};
use slimapi::slimauth::{
    new_slim_auth_handler, SlimAuthInvoker, SlimAuthInvokerOptions,
};

#[derive(Debug, Serialize, Deserialize)]
struct PlusArgs {
    a: i64,
    b: i64,
}

fn start_slim_api_server(addr: &str) -> ServerHandle {
    RuntimeConfig::from_env().apply();

    let registry = BasicApiMethodRegister::new();
    registry.register(ApiMethod::new("Plus", "it", |v: PlusArgs| v.a + v.b));

    let handler = Arc::new(new_slim_api_handler("it", registry));
    let service = SlimApiService::new("/api", handler);
    let server = HttpServer(service).start(addr).expect("bind test server");
    server.wait_ready().expect("server ready");
    server
}

#[test]
fn test_get_over_the_wire() {
    let server = start_slim_api_server("127.0.0.1:19461");

    let body = reqwest::blocking::get("http://127.0.0.1:19461/api?~method=plus&a=1&b=2")
        .unwrap()
        .text()
        .unwrap();
    assert_eq!(body, r#"{"Code":0,"Message":"","Data":3}"#);

    // Unmatched routes answer outside the protocol envelope.
    let status = reqwest::blocking::get("http://127.0.0.1:19461/nope")
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 404);

    server.stop();
}

#[test]
fn test_invoker_round_trip() {
    let server = start_slim_api_server("127.0.0.1:19462");

    let invoker: SlimApiInvoker<PlusArgs, i64> =
        SlimApiInvoker::new("http://127.0.0.1:19462/api?~method=plus");
    let data = invoker.call(&PlusArgs { a: 20, b: 22 }).unwrap();
    assert_eq!(data, 42);

    let envelope: ApiResponse<i64> = invoker.call_raw(&PlusArgs { a: 1, b: 1 }).unwrap();
    assert_eq!((envelope.code, envelope.data), (0, 2));

    server.stop();
}

#[test]
fn test_signed_invoker_against_auth_server() {
    RuntimeConfig::from_env().apply();

    let registry = BasicApiMethodRegister::new();
    registry.register(ApiMethod::new("Plus", "it", |v: PlusArgs| v.a + v.b));

    let handler = Arc::new(new_slim_auth_handler("it-auth", registry, |key: &str| {
        if key == "ak" {
            Some("sk".to_string())
        } else {
            None
        }
    }));
    let service = SlimApiService::new("/api", handler);
    let server = HttpServer(service)
        .start("127.0.0.1:19463")
        .expect("bind test server");
    server.wait_ready().expect("server ready");

    let invoker: SlimAuthInvoker<PlusArgs, i64> = SlimAuthInvoker::new(SlimAuthInvokerOptions {
        uri: "http://127.0.0.1:19463/api?~method=plus".to_string(),
        key: "ak".to_string(),
        secret: "sk".to_string(),
        auth_scheme: String::new(),
    });
    let data = invoker.call(&PlusArgs { a: 3, b: 4 }).unwrap();
    assert_eq!(data, 7);

    // A wrong secret is rejected with a nonzero envelope code.
    let bad: SlimAuthInvoker<PlusArgs, Value> = SlimAuthInvoker::new(SlimAuthInvokerOptions {
        uri: "http://127.0.0.1:19463/api?~method=plus".to_string(),
        key: "ak".to_string(),
        secret: "wrong".to_string(),
        auth_scheme: String::new(),
    });
    let envelope = bad.call_raw(&PlusArgs { a: 1, b: 1 }).unwrap();
    assert_eq!(envelope.code, 400);
    assert_eq!(envelope.data, json!(null));

    server.stop();
}

#[test]
fn test_route_parameter_addressing_over_the_wire() {
    RuntimeConfig::from_env().apply();

    let registry = BasicApiMethodRegister::new();
    registry.register(ApiMethod::new("Plus", "it", |v: PlusArgs| v.a + v.b));

    let handler = Arc::new(new_slim_api_handler("it-route", registry));
    let service = SlimApiService::new("/api/{~method}", handler);
    let server = HttpServer(service)
        .start("127.0.0.1:19464")
        .expect("bind test server");
    server.wait_ready().expect("server ready");

    let body = reqwest::blocking::get("http://127.0.0.1:19464/api/plus?a=5&b=6")
        .unwrap()
        .text()
        .unwrap();
    assert_eq!(body, r#"{"Code":0,"Message":"","Data":11}"#);

    server.stop();
}
