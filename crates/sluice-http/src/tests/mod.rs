//! Test modules for sluice-http
//!
//! Multi-component scenarios: router dispatch into pipelines, pipeline cross-cutting
//! behaviour and JSON-RPC endpoints.


use bytes::Bytes;
use http::{Method, Request};
use http_body_util::BodyExt;

use crate::{Body, HttpResponse, body};

pub(crate) fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body::empty())
        .unwrap()
}

pub(crate) fn json_request(method: Method, uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body::full(Bytes::copy_from_slice(json.as_bytes())))
        .unwrap()
}

pub(crate) async fn body_string(response: HttpResponse) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
