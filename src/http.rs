//! HTTP 辅助工具：客户端地址、访问日志与安全头。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, connect_info::ConnectInfo};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::{middleware, response::Response};
use chrono::{SecondsFormat, Utc};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 访问日志输出：总是写入 tracing，可选追加到文件。
#[derive(Debug, Default)]
pub struct AccessLog {
    file: Option<Mutex<File>>,
}

impl AccessLog {
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// 以追加模式打开日志文件（必要时创建父目录）。
    pub async fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    pub async fn write_line(&self, line: &str) {
        info!(target: "access", "{line}");
        let Some(file) = &self.file else {
            return;
        };
        let mut file = file.lock().await;
        let result = async {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, "failed to write access log");
        }
    }
}

/// 单行访问日志：`client,timestamp,method,url,status,ms`。
pub fn format_access_line(
    client: &str,
    timestamp: &str,
    method: &str,
    url: &str,
    status: u16,
    elapsed_ms: u128,
) -> String {
    format!(
        "{},{},{},{},{},{}",
        csv_field(client),
        timestamp,
        method,
        csv_field(url),
        status,
        elapsed_ms
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 访问日志中间件。
pub async fn access_log(
    Extension(log): Extension<Arc<AccessLog>>,
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    let started = Instant::now();
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let method = request.method().to_string();
    let url = request.uri().to_string();
    let connect_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = resolve_client_ip(request.headers(), connect_ip)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let line = format_access_line(
        &client,
        &timestamp,
        &method,
        &url,
        response.status().as_u16(),
        started.elapsed().as_millis(),
    );
    log.write_line(&line).await;
    response
}

/// 从 `x-forwarded-for` 解析客户端 IP。
pub fn extract_forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<IpAddr>().ok())
}

/// 综合转发头与连接信息计算客户端 IP。
pub fn resolve_client_ip(headers: &HeaderMap, connect_ip: Option<IpAddr>) -> Option<IpAddr> {
    extract_forwarded_ip(headers).or(connect_ip)
}

/// 添加基础安全响应头。
pub async fn add_security_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}
