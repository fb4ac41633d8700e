//! A small S3-compatible HTTP server backed by [`ObjectStoreForMemory`].
//!
//! Only what is needed to exercise uploads end to end is understood:
//! bucket creation, object writes and object reads, all path-style.

use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    response::{IntoResponse, Response},
    Router,
};
use http::{header, HeaderValue, Method, Request, StatusCode};
use nanoid::nanoid;
use std::{
    convert::Infallible,
    net::{SocketAddr, TcpListener},
};
use tokio::{sync::oneshot, task::JoinHandle};
use tower::service_fn;

use crate::{
    infras::memory::{ObjectStoreForMemory, StoreError},
    session::{Session, StaticCredentials},
};

pub struct Emulator {
    addr: SocketAddr,
    store: ObjectStoreForMemory,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), hyper::Error>>>,
}

impl Emulator {
    pub const REGION: &'static str = "ap-northeast-1";

    /// Starts on a free port on the loopback interface.
    pub async fn start() -> anyhow::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("fail bind emulator to {}", addr))?;
        let addr = listener.local_addr()?;
        let store = ObjectStoreForMemory::new();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = axum::Server::from_tcp(listener)?
            .serve(create_app(store.clone()).into_make_service())
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            });
        let handle = tokio::spawn(server);

        tracing::debug!("emulator listening on {}", addr);

        Ok(Self {
            addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn store(&self) -> &ObjectStoreForMemory {
        &self.store
    }

    /// Session pointing at this emulator with dummy credentials.
    pub fn session(&self) -> Session {
        Session {
            region: Some(Self::REGION.to_string()),
            endpoint_url: Some(self.endpoint_url()),
            credentials: Some(StaticCredentials::new("dummy", "dummy")),
            force_path_style: true,
        }
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        Ok(())
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
        }
    }
}

fn create_app(store: ObjectStoreForMemory) -> Router {
    Router::new().fallback(service_fn(move |req: Request<Body>| {
        let store = store.clone();
        async move { Ok::<_, Infallible>(dispatch(store, req).await) }
    }))
}

async fn dispatch(store: ObjectStoreForMemory, req: Request<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let Ok(path) = urlencoding::decode(&path) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidURI",
            "Couldn't parse the specified URI.",
            &path,
        );
    };
    let trimmed = path.trim_start_matches('/');
    let (bucket, key) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    tracing::debug!("emulator {} {}", method, path);

    match (method, bucket.is_empty(), key.is_empty()) {
        (Method::GET, true, _) => StatusCode::OK.into_response(),
        (Method::PUT, false, true) => create_bucket(&store, bucket),
        (Method::PUT, false, false) => match hyper::body::to_bytes(req.into_body()).await {
            Ok(body) => put_object(&store, bucket, key, body),
            Err(err) => error_response(
                StatusCode::BAD_REQUEST,
                "IncompleteBody",
                &err.to_string(),
                &path,
            ),
        },
        (Method::GET, false, false) => get_object(&store, bucket, key),
        _ => error_response(
            StatusCode::NOT_IMPLEMENTED,
            "NotImplemented",
            "A header you provided implies functionality that is not implemented.",
            &path,
        ),
    }
}

fn create_bucket(store: &ObjectStoreForMemory, bucket: &str) -> Response {
    match store.create_bucket(bucket) {
        Ok(()) => (
            StatusCode::OK,
            [(header::LOCATION, format!("/{}", bucket))],
        )
            .into_response(),
        Err(err) => store_error_response(err, bucket),
    }
}

fn put_object(store: &ObjectStoreForMemory, bucket: &str, key: &str, body: Bytes) -> Response {
    let etag = etag(&body);
    match store.put(bucket, key, body.to_vec()) {
        Ok(()) => (StatusCode::OK, [(header::ETAG, etag)]).into_response(),
        Err(err) => store_error_response(err, &format!("/{}/{}", bucket, key)),
    }
}

fn get_object(store: &ObjectStoreForMemory, bucket: &str, key: &str) -> Response {
    match store.get(bucket, key) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::ETAG, etag(&body)),
                (
                    header::CONTENT_TYPE,
                    mime::APPLICATION_OCTET_STREAM.to_string(),
                ),
            ],
            body,
        )
            .into_response(),
        Err(err) => store_error_response(err, &format!("/{}/{}", bucket, key)),
    }
}

fn etag(body: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(body))
}

fn store_error_response(err: StoreError, resource: &str) -> Response {
    let status = match err {
        StoreError::NoSuchBucket(_) | StoreError::NoSuchKey { .. } => StatusCode::NOT_FOUND,
        StoreError::BucketAlreadyOwnedByYou(_) => StatusCode::CONFLICT,
    };
    error_response(status, err.code(), &err.to_string(), resource)
}

fn error_response(status: StatusCode, code: &str, message: &str, resource: &str) -> Response {
    let request_id = nanoid!();
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{}</Code><Message>{}</Message><Resource>{}</Resource><RequestId>{}</RequestId></Error>"#,
        code,
        escape_xml(message),
        escape_xml(resource),
        request_id
    );
    let mut res = (
        status,
        [(header::CONTENT_TYPE, mime::TEXT_XML.to_string())],
        body,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert("x-amz-request-id", value);
    }
    res
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
