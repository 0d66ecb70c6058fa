use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, LOCATION};
use http::{HeaderMap, HeaderValue, StatusCode};
use revcache::{Client, RedirectPolicy};
use revcache_client::{HttpRequest, HttpResponse, Result, Transport, error};

/// Redirects `/start` to `/end` and answers 200 elsewhere
#[derive(Default)]
struct Hops {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for Hops {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = request.url().path().to_string();
        self.seen.lock().unwrap().push(path.clone());
        Ok(if path == "/start" {
            HttpResponse::empty(StatusCode::FOUND).with_header(LOCATION, HeaderValue::from_static("/end"))
        } else {
            HttpResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"end"))
        })
    }
}

const SIGNATURE: HeaderName = HeaderName::from_static("x-signature");

#[test]
fn signer_sees_the_final_request() {
    let request = Client::new(Hops::default())
        .url("http://example.com/items?b=2")
        .unwrap()
        .query_param("a", "1")
        .sign(|request: &mut HttpRequest| -> Result<()> {
            let signature = format!("{} {}", request.method(), request.url());
            let value = HeaderValue::from_str(&signature).map_err(error::invalid_header)?;
            request.headers_mut().insert(SIGNATURE, value);
            Ok(())
        })
        .build()
        .unwrap();
    assert_eq!(
        request.headers()[SIGNATURE],
        "GET http://example.com/items?b=2&a=1"
    );
}

#[tokio::test]
async fn failing_signer_stops_the_request() {
    let hops = Arc::new(Hops::default());
    let err = Client::new(Arc::clone(&hops))
        .url("http://example.com/end")
        .unwrap()
        .sign(|_: &mut HttpRequest| -> Result<()> { Err(error::builder("no signing key")) })
        .get()
        .await
        .unwrap_err();
    assert!(err.is_builder());
    assert!(hops.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn redirects_are_followed_by_default() {
    let hops = Arc::new(Hops::default());
    let client = Client::new(Arc::clone(&hops));

    let response = client.url("http://example.com/start").unwrap().get().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*hops.seen.lock().unwrap(), ["/start", "/end"]);
}

#[tokio::test]
async fn follow_redirects_false_returns_the_redirect() {
    let hops = Arc::new(Hops::default());
    let client = Client::new(Arc::clone(&hops));

    let response = client
        .url("http://example.com/start")
        .unwrap()
        .follow_redirects(false)
        .get()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(hops.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn client_policy_and_request_flag() {
    let hops = Arc::new(Hops::default());
    let client = Client::new(Arc::clone(&hops)).redirect_policy(RedirectPolicy::none());

    let stopped = client.url("http://example.com/start").unwrap().get().await.unwrap();
    assert_eq!(stopped.status(), StatusCode::FOUND);

    let request = client
        .url("http://example.com/start")
        .unwrap()
        .follow_redirects(true)
        .build()
        .unwrap();
    assert_eq!(request.follow_redirects(), Some(true));
}
