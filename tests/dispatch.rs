//! End-to-end dispatch through the HTTP router, without a socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request as HttpRequest, StatusCode};
use serde_json::json;
use thiserror::Error;

use rest_dispatch::error::{HookResult, ServiceError, ServiceErrorKind};
use rest_dispatch::exception::ExceptionMapping;
use rest_dispatch::http::{HttpServer, Request, Response};
use rest_dispatch::pipeline::{HandlerWorkers, Pipeline};
use rest_dispatch::routing::{HandlerResult, RouteSpec, RouteTable};

mod common;

use common::{get, send, test_config};

#[derive(Debug, Error)]
#[error("item {0} is locked")]
struct Locked(u32);

#[derive(Debug, Error)]
#[error("storage failed")]
struct StorageFailed(#[source] Locked);

fn item(request: &mut Request, _: &mut Response) -> HandlerResult {
    let id = request.url_param("id").unwrap_or_default().to_string();
    Ok(Some(json!({ "id": id, "format": request.format() }).into()))
}

fn new_item(_: &mut Request, _: &mut Response) -> HandlerResult {
    Ok(Some(json!({ "new": true }).into()))
}

fn locked(_: &mut Request, _: &mut Response) -> HandlerResult {
    Err(Box::new(StorageFailed(Locked(7))))
}

fn secret(_: &mut Request, _: &mut Response) -> HandlerResult {
    Err("connection string postgres://admin:hunter2@db".into())
}

fn slow(_: &mut Request, _: &mut Response) -> HandlerResult {
    std::thread::sleep(Duration::from_millis(400));
    Ok(Some(json!({ "late": true }).into()))
}

fn items_router() -> axum::Router {
    let table = RouteTable::builder()
        .register(RouteSpec::new("/items/new", Method::GET, new_item))
        .register(RouteSpec::new("/items/{id}.{format}", Method::GET, item).name("item"))
        .register(RouteSpec::new("/items/{id}", Method::PUT, item))
        .register(RouteSpec::new("/locked", Method::GET, locked))
        .register(RouteSpec::new("/secret", Method::GET, secret))
        .register(RouteSpec::new("/json-only", Method::GET, new_item).supported_formats(["json"]))
        .build()
        .unwrap();
    let mapping = ExceptionMapping::new().map::<Locked>(ServiceErrorKind::Conflict);
    let pipeline = Pipeline::builder(table)
        .exception_mapping(mapping)
        .workers(HandlerWorkers::inline())
        .build();
    HttpServer::new(test_config(), pipeline).router()
}

#[tokio::test]
async fn test_echo_json() {
    let router = common::echo_router();
    let reply = get(&router, "/test?echo=hi").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-type"), Some("application/json; charset=UTF-8"));
    assert_eq!(reply.body, r#"{"action":"GET","msg":"Test URI - GET"}"#);
}

#[tokio::test]
async fn test_echo_xml_by_suffix_and_accept() {
    let router = common::echo_router();
    let expected = "<response><action>GET</action><msg>Test URI - GET</msg></response>";

    let reply = get(&router, "/test.xml").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("content-type"), Some("application/xml; charset=UTF-8"));
    assert_eq!(reply.body, expected);

    let request = HttpRequest::get("/test")
        .header(header::ACCEPT, "text/xml")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.header("content-type"), Some("text/xml; charset=UTF-8"));
    assert_eq!(reply.body, expected);

    let reply = get(&router, "/test?format=xml").await;
    assert_eq!(reply.body, expected);
}

#[tokio::test]
async fn test_suffix_beats_query_and_accept() {
    let router = common::echo_router();
    let request = HttpRequest::get("/test.json?format=xml")
        .header(header::ACCEPT, "application/xml")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.json()["action"], "GET");
}

#[tokio::test]
async fn test_echo_post() {
    let router = common::echo_router();
    let request = HttpRequest::post("/test")
        .header("echo", "there")
        .body(Body::from("ignored"))
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "action": "POST", "msg": "Test URI - POST" }));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let router = common::echo_router();
    let reply = get(&router, "/nowhere").await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(
        reply.json(),
        json!({ "code": 404, "status": "Not Found", "message": "Unresolvable URL: GET /nowhere" })
    );
}

#[tokio::test]
async fn test_wrong_method_lists_allowed() {
    let router = common::echo_router();
    let request = HttpRequest::delete("/test").body(Body::empty()).unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.header("allow"), Some("GET, POST"));
    assert_eq!(reply.json()["code"], 405);
}

#[tokio::test]
async fn test_unknown_format_is_not_acceptable() {
    let router = common::echo_router();
    let reply = get(&router, "/test.yaml").await;

    assert_eq!(reply.status, StatusCode::NOT_ACCEPTABLE);
    // Error bodies fall back to the default format.
    assert_eq!(reply.json()["code"], 406);
}

#[tokio::test]
async fn test_first_registration_wins() {
    let router = items_router();

    let reply = get(&router, "/items/new").await;
    assert_eq!(reply.json(), json!({ "new": true }));

    let reply = get(&router, "/items/42").await;
    assert_eq!(reply.json(), json!({ "id": "42", "format": null }));
}

#[tokio::test]
async fn test_parameters_are_decoded_and_suffix_split() {
    let router = items_router();

    let reply = get(&router, "/items/a%20b.json").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "id": "a b", "format": "json" }));

    let reply = get(&router, "/items/42.xml").await;
    assert_eq!(reply.body, "<response><format>xml</format><id>42</id></response>");
}

#[tokio::test]
async fn test_route_format_restriction() {
    let router = items_router();
    assert_eq!(get(&router, "/json-only").await.status, StatusCode::OK);
    assert_eq!(get(&router, "/json-only.xml").await.status, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_mapped_failure_in_source_chain() {
    let router = items_router();
    let reply = get(&router, "/locked").await;

    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["message"], "item 7 is locked");
}

#[tokio::test]
async fn test_unmapped_failure_is_opaque() {
    let router = items_router();
    let reply = get(&router, "/secret").await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["message"], "Internal Server Error");
    assert!(!reply.body.contains("hunter2"));
}

#[tokio::test]
async fn test_hooks_wrap_the_handler() {
    let finally_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finally_runs);

    let table = RouteTable::builder().register_all(rest_dispatch::echo::routes()).build().unwrap();
    let pipeline = Pipeline::builder(table)
        .preprocessor(|request: &mut Request| -> HookResult {
            if request.header("authorization").is_none() {
                return Err(ServiceError::new(ServiceErrorKind::Unauthorized, "missing credentials").into());
            }
            Ok(())
        })
        .postprocessor(|_: &Request, response: &mut Response| -> HookResult {
            response.set_header(header::CACHE_CONTROL, "no-store".parse()?);
            Ok(())
        })
        .finally(move |_: &Request, _: &mut Response| -> HookResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();
    let router = HttpServer::new(test_config(), pipeline).router();

    let reply = get(&router, "/test").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.header("cache-control"), None);

    let request = HttpRequest::get("/test")
        .header(header::AUTHORIZATION, "Bearer token")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header("cache-control"), Some("no-store"));

    assert_eq!(finally_runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_handler_timeout_is_service_unavailable() {
    let finally_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finally_runs);

    let table = RouteTable::builder()
        .register(RouteSpec::new("/slow", Method::GET, slow))
        .build()
        .unwrap();
    let pipeline = Pipeline::builder(table)
        .workers(HandlerWorkers::new(2, Some(Duration::from_millis(50))))
        .finally(move |_: &Request, _: &mut Response| -> HookResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();
    let router = HttpServer::new(test_config(), pipeline).router();

    let reply = get(&router, "/slow").await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.json()["code"], 503);
    assert_eq!(finally_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_requests_stay_isolated() {
    let router = items_router();

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let uri = if i % 2 == 0 { format!("/items/{}", i) } else { format!("/items/{}.json", i) };
                let reply = get(&router, &uri).await;
                (i, reply.status, reply.json())
            })
        })
        .collect();

    for task in tasks {
        let (i, status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], i.to_string());
        assert_eq!(body["format"].is_null(), i % 2 == 0);
    }
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let table = RouteTable::builder()
        .register(RouteSpec::new(
            "/id",
            Method::GET,
            |request: &mut Request, _: &mut Response| -> HandlerResult {
                Ok(Some(json!({ "id": request.id().as_str() }).into()))
            },
        ))
        .build()
        .unwrap();
    let router = HttpServer::new(test_config(), Pipeline::builder(table).build()).router();

    let request = HttpRequest::get("/id")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.json()["id"], "abc-123");
}
