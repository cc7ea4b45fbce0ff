//! 路由组装：认证、访问日志、压缩与追踪层。

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{get, put};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::auth::{AuthConfig, auth_middleware};
use crate::http::{AccessLog, access_log, add_security_headers, resolve_client_ip};
use crate::storage::Storage;
use crate::{files, upload};

/// 构建完整的应用路由，所有路由（含回退）都经过认证中间件。
pub fn build_router(
    storage: Arc<Storage>,
    auth: Arc<AuthConfig>,
    access: Arc<AccessLog>,
) -> Router {
    Router::new()
        .route("/", get(files::browse_page))
        .route("/upload-ui", get(files::upload_page))
        .route("/api/directory-tree", get(files::directory_tree))
        .route(
            "/upload",
            put(upload::upload_missing_name).get(files::serve_upload_route_root),
        )
        .route(
            "/upload/",
            put(upload::upload_missing_name).get(files::serve_upload_route_root),
        )
        .route(
            "/upload/{*path}",
            put(upload::upload_file)
                .get(files::serve_upload_route_path)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/{*path}", get(files::serve_path))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(access_log))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(storage))
        .layer(Extension(auth))
        .layer(Extension(access))
}
