//! 上传处理：将请求体流式写入上传目录。

use axum::Error as AxumError;
use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path as RoutePath};
use axum::http::StatusCode;
use futures_util::stream::StreamExt;
use http_body_util::BodyExt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::atomic::AtomicFile;
use crate::config::UPLOAD_SUCCESS_MESSAGE;
use crate::error::ApiError;
use crate::storage::Storage;

/// 已解析的上传目标。
#[derive(Debug, Clone)]
pub struct UploadTarget {
    /// 相对上传目录的路径。
    pub relative: String,
    pub absolute: PathBuf,
}

impl UploadTarget {
    pub fn resolve(storage: &Storage, requested: &str) -> Result<Self, ApiError> {
        let absolute = storage.resolve_upload(requested)?;
        let relative = absolute
            .strip_prefix(storage.uploads_dir())
            .map_err(|_| ApiError::BadRequest("invalid path".into()))?
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        Ok(Self { relative, absolute })
    }
}

#[derive(Debug)]
pub enum IngestError {
    DirectoryCreateFailed(io::Error),
    WriteFailed(String),
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::DirectoryCreateFailed(err) => {
                ApiError::Internal(format!("failed to create directory: {err}"))
            }
            IngestError::WriteFailed(msg) => ApiError::Internal(format!("failed to write file: {msg}")),
        }
    }
}

/// `PUT /upload/{*path}`：覆盖写入，成功返回 201。
pub async fn upload_file(
    RoutePath(requested): RoutePath<String>,
    Extension(storage): Extension<Arc<Storage>>,
    body: AxumBody,
) -> Result<(StatusCode, &'static str), ApiError> {
    let target = UploadTarget::resolve(&storage, &requested)?;
    let bytes = ingest(&target, body).await.inspect_err(|err| {
        warn!(path = %target.relative, error = ?err, "upload failed");
    })?;
    info!(path = %target.relative, bytes, "file uploaded");
    Ok((StatusCode::CREATED, UPLOAD_SUCCESS_MESSAGE))
}

/// `PUT /upload` 与 `PUT /upload/`：缺少文件名。
pub async fn upload_missing_name() -> ApiError {
    warn!("upload without file name");
    ApiError::BadRequest("invalid path".into())
}

/// 将请求体写入临时文件，完成后原子替换目标，返回写入字节数。
pub async fn ingest(target: &UploadTarget, body: AxumBody) -> Result<u64, IngestError> {
    if let Some(parent) = target.absolute.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(IngestError::DirectoryCreateFailed)?;
    }

    let mut atomic = AtomicFile::new(&target.absolute)
        .await
        .map_err(|err| IngestError::WriteFailed(err.to_string()))?;
    let write_result: Result<u64, IngestError> = async {
        let mut data_stream = BodyExt::into_data_stream(body);
        let mut total_written: u64 = 0;
        while let Some(chunk) = data_stream.next().await {
            let chunk =
                chunk.map_err(|err: AxumError| IngestError::WriteFailed(err.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            atomic
                .file_mut()
                .map_err(|err| IngestError::WriteFailed(err.to_string()))?
                .write_all(&chunk)
                .await
                .map_err(|err| IngestError::WriteFailed(err.to_string()))?;
            total_written += chunk.len() as u64;
        }
        Ok(total_written)
    }
    .await;

    let total_written = match write_result {
        Ok(total) => total,
        Err(err) => {
            atomic.cleanup().await;
            return Err(err);
        }
    };
    atomic
        .finalize()
        .await
        .map_err(|err| IngestError::WriteFailed(err.to_string()))?;
    debug!(path = %target.relative, bytes = total_written, "upload stream finished");
    Ok(total_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use futures_util::stream;
    use tempfile::tempdir;

    fn make_storage() -> (tempfile::TempDir, Storage) {
        let temp = tempdir().expect("tempdir");
        let storage = Storage::new(temp.path().join("share"));
        std::fs::create_dir_all(storage.uploads_dir()).expect("create uploads");
        (temp, storage)
    }

    #[tokio::test]
    async fn round_trips_bodies_of_various_sizes() {
        let (_temp, storage) = make_storage();
        let sizes = [0usize, 1, 4096, 3 * 1024 * 1024 + 17];
        for size in sizes {
            let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let target = UploadTarget::resolve(&storage, &format!("blob-{size}.bin")).expect("target");
            let written = ingest(&target, AxumBody::from(content.clone()))
                .await
                .expect("ingest");
            assert_eq!(written, size as u64);
            let saved = std::fs::read(storage.uploads_dir().join(format!("blob-{size}.bin")))
                .expect("read");
            assert_eq!(saved, content);
        }
    }

    #[tokio::test]
    async fn creates_intermediate_directories_and_overwrites() {
        let (_temp, storage) = make_storage();
        let target = UploadTarget::resolve(&storage, "a/b/c.txt").expect("target");
        assert_eq!(target.relative, "a/b/c.txt");
        ingest(&target, AxumBody::from("first")).await.expect("first");
        ingest(&target, AxumBody::from("second")).await.expect("second");
        let saved = std::fs::read_to_string(storage.uploads_dir().join("a/b/c.txt")).expect("read");
        assert_eq!(saved, "second");
    }

    #[tokio::test]
    async fn traversal_stays_inside_upload_dir() {
        let (_temp, storage) = make_storage();
        let target = UploadTarget::resolve(&storage, "../../../escape.txt").expect("target");
        assert_eq!(target.absolute, storage.uploads_dir().join("escape.txt"));
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_file() {
        let (_temp, storage) = make_storage();
        let target = UploadTarget::resolve(&storage, "broken.bin").expect("target");
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ];
        let body = AxumBody::from_stream(stream::iter(chunks));

        let result = ingest(&target, body).await;
        assert!(matches!(result, Err(IngestError::WriteFailed(_))));
        let leftovers: Vec<_> = std::fs::read_dir(storage.uploads_dir())
            .expect("read dir")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn directory_creation_failure_is_reported() {
        let (_temp, storage) = make_storage();
        std::fs::write(storage.uploads_dir().join("file"), b"x").expect("seed");
        let target = UploadTarget::resolve(&storage, "file/nested.txt").expect("target");
        let result = ingest(&target, AxumBody::from("data")).await;
        assert!(matches!(result, Err(IngestError::DirectoryCreateFailed(_))));
    }
}
