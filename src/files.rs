//! 浏览页、目录树 API 与原始文件服务处理器。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path as RoutePath, Query};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{Html, IntoResponse, Json as JsonResponse, Response};
use httpdate::fmt_http_date;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::frontend::{render_browse_page, render_listing_page, render_upload_page};
use crate::storage::{Storage, StorageError};
use crate::tree::{DirectoryNode, build_tree_blocking};

#[derive(Deserialize)]
pub(crate) struct OptionalPathQuery {
    path: Option<String>,
}

#[derive(Serialize)]
pub struct TreeResponse {
    root: String,
    tree: Vec<DirectoryNode>,
}

/// `GET /`：带完整目录树的浏览页，目录树生成失败时显示空列表。
pub async fn browse_page(Extension(storage): Extension<Arc<Storage>>) -> Html<String> {
    let nodes = match build_tree_blocking(
        storage.root_path().to_path_buf(),
        String::new(),
        storage.max_tree_depth(),
    )
    .await
    {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!(error = %err, "share root listing unavailable");
            Vec::new()
        }
    };
    Html(render_browse_page(&nodes))
}

/// `GET /upload-ui`
pub async fn upload_page() -> Html<String> {
    Html(render_upload_page())
}

/// `GET /api/directory-tree`：返回指定目录（默认共享根目录）的递归树。
pub async fn directory_tree(
    Query(query): Query<OptionalPathQuery>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<TreeResponse>, ApiError> {
    let target = match query.path.as_deref() {
        Some(path) => storage.resolve(path)?,
        None => storage.root_path().to_path_buf(),
    };
    let root = storage.relative_of(&target)?;
    let tree = build_tree_blocking(target, root.clone(), storage.max_tree_depth())
        .await
        .map_err(|err| {
            warn!(root, error = %err, "directory tree unavailable");
            ApiError::ListingUnavailable(err.to_string())
        })?;
    info!(root, count = tree.len(), "directory tree");
    Ok(JsonResponse(TreeResponse { root, tree }))
}

/// `GET /{*path}`：文件以流返回，目录返回索引页。
pub async fn serve_path(
    RoutePath(path): RoutePath<String>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    let target = storage.resolve(&path)?;
    let metadata = fs::metadata(&target).await.map_err(StorageError::from)?;

    if metadata.is_dir() {
        let relative = storage.relative_of(&target)?;
        let entries = storage.list_dir(&target).await?;
        debug!(path = %relative, count = entries.len(), "serve directory index");
        return Ok(Html(render_listing_page(&relative, &entries)).into_response());
    }

    let mime = mime_guess::from_path(&target).first_or_octet_stream();
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    response_headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::Internal("failed to build headers".into()))?,
    );
    if let Ok(modified) = metadata.modified() {
        response_headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&fmt_http_date(modified))
                .map_err(|_| ApiError::Internal("failed to build headers".into()))?,
        );
    }

    let file = File::open(&target).await.map_err(StorageError::from)?;
    debug!(path, size = metadata.len(), "serve file");
    Ok((response_headers, AxumBody::from_stream(ReaderStream::new(file))).into_response())
}

/// `GET /upload/{*path}`：与上传路由同前缀的普通读取请求。
pub async fn serve_upload_route_path(
    RoutePath(path): RoutePath<String>,
    storage: Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    serve_path(RoutePath(format!("upload/{path}")), storage).await
}

/// `GET /upload` 与 `GET /upload/`
pub async fn serve_upload_route_root(
    storage: Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    serve_path(RoutePath("upload".into()), storage).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tempfile::tempdir;

    fn make_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("share");
        std::fs::create_dir_all(&root).expect("create share root");
        (temp, Arc::new(Storage::new(root)))
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn tree_api_on_empty_root() {
        let (_temp, storage) = make_storage();
        let JsonResponse(response) = directory_tree(
            Query(OptionalPathQuery { path: None }),
            Extension(storage),
        )
        .await
        .expect("tree");
        assert_eq!(response.root, "");
        assert!(response.tree.is_empty());
    }

    #[tokio::test]
    async fn tree_api_for_missing_dir_is_json_error() {
        let (_temp, storage) = make_storage();
        let result = directory_tree(
            Query(OptionalPathQuery {
                path: Some("nope".into()),
            }),
            Extension(storage),
        )
        .await;
        assert!(matches!(result, Err(ApiError::ListingUnavailable(_))));
    }

    #[tokio::test]
    async fn serve_path_streams_file() {
        let (_temp, storage) = make_storage();
        std::fs::write(storage.root_path().join("note.txt"), b"hi there").expect("write");
        let response = serve_path(RoutePath("note.txt".into()), Extension(storage))
            .await
            .expect("serve");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "8");
        assert_eq!(body_string(response).await, "hi there");
    }

    #[tokio::test]
    async fn serve_path_renders_directory_index() {
        let (_temp, storage) = make_storage();
        std::fs::create_dir_all(storage.root_path().join("docs/inner")).expect("mkdir");
        std::fs::write(storage.root_path().join("docs/readme.md"), b"x").expect("write");
        let response = serve_path(RoutePath("docs".into()), Extension(storage))
            .await
            .expect("serve");
        let html = body_string(response).await;
        assert!(html.contains("Index of /docs"));
        assert!(html.contains("href=\"/docs/inner\""));
        assert!(html.contains("href=\"/docs/readme.md\""));
    }

    #[tokio::test]
    async fn serve_path_missing_is_not_found() {
        let (_temp, storage) = make_storage();
        let result = serve_path(RoutePath("missing.txt".into()), Extension(storage)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn serve_path_cannot_escape_root() {
        let (temp, storage) = make_storage();
        std::fs::write(temp.path().join("secret.txt"), b"secret").expect("write");
        let result = serve_path(RoutePath("../secret.txt".into()), Extension(storage)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
