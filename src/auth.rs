//! Basic 认证中间件：每个请求独立校验共享凭据。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::middleware;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::http::resolve_client_ip;

/// 启动时确定的唯一凭据。
#[derive(Debug)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// 认证中间件：缺失、格式错误或不匹配的凭据一律返回 401。
pub async fn auth_middleware(
    Extension(auth): Extension<Arc<AuthConfig>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    // 解码失败与缺失同样视为未认证。
    if let Some(credentials) = req.headers().typed_get::<Authorization<Basic>>()
        && auth.verify(credentials.username(), credentials.password())
    {
        return Ok(next.run(req).await);
    }

    let connect_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = resolve_client_ip(req.headers(), connect_ip)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    warn!(
        client_ip,
        method = %req.method(),
        path = req.uri().path(),
        "rejected request without valid credentials"
    );
    Err(ApiError::Unauthorized)
}
