//! Vat adapters driven through real pipelines and a JSON-RPC server


use bytes::Bytes;
use http::{Method, Request};
use http_body_util::BodyExt;
use sluice_http::{Body, HttpResponse, body};

pub(crate) fn request(method: Method, uri: &str) -> http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub(crate) fn with_json(builder: http::request::Builder, json: &str) -> Request<Body> {
    builder
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body::full(Bytes::copy_from_slice(json.as_bytes())))
        .unwrap()
}

pub(crate) fn without_body(builder: http::request::Builder) -> Request<Body> {
    builder.body(body::empty()).unwrap()
}

pub(crate) async fn body_string(response: HttpResponse) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
