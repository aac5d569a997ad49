//! Integration tests for HTTP transport

use breakwater_transport::{
    HttpRequest, HttpTransport, HttpTransportConfig, Transport, TransportError,
};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::Method;
use rstest::rstest;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_send_returns_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"id":1}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let response = transport
        .send_http(HttpRequest::new(Method::GET, url(&server, "/items")))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type().as_deref(), Some("application/json"));
    assert_eq!(response.text(), r#"{"id":1}"#);
}

#[tokio::test]
async fn test_send_forwards_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(vec![1, 2, 3]))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let request = HttpRequest::new(Method::POST, url(&server, "/upload"))
        .with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        )
        .with_body(vec![1u8, 2, 3]);

    let response = transport.send_http(request).await.unwrap();
    assert_eq!(response.status, 201);
}

#[rstest]
#[case(404)]
#[case(500)]
#[case(524)]
#[tokio::test]
async fn test_error_statuses_are_not_transport_errors(#[case] status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let response = transport
        .send_http(HttpRequest::new(Method::GET, url(&server, "/")))
        .await
        .unwrap();

    assert_eq!(response.status, status);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_request_timeout_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let request = HttpRequest::new(Method::GET, url(&server, "/slow"))
        .with_timeout(Duration::from_millis(50));

    let err = transport.send_http(request).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_refused_connection_maps_to_connection() {
    let config = HttpTransportConfig {
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let transport = HttpTransport::with_config(config).unwrap();

    let err = transport
        .send_http(HttpRequest::new(
            Method::GET,
            Url::parse("http://127.0.0.1:1/").unwrap(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
}
