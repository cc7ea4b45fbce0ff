use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;

use crate::config::{DEFAULT_MAX_TREE_DEPTH, UPLOAD_DIR};

/// 共享根目录，启动时确定，进程内只读。
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
    max_tree_depth: usize,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    pub fn max_tree_depth(&self) -> usize {
        self.max_tree_depth
    }

    /// 创建共享根目录；上传目录在首次上传时创建。
    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOAD_DIR)
    }

    /// 将客户端路径解析到共享根目录下。
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        resolve_relative(&self.root, relative)
    }

    /// 将客户端路径解析到上传目录下，结果必须指向一个文件名。
    pub fn resolve_upload(&self, relative: &str) -> Result<PathBuf, StorageError> {
        // 以分隔符、`.` 或 `..` 结尾的路径指向目录，不能作为上传目标。
        let last = relative.rsplit(['/', '\\']).next().unwrap_or("");
        if matches!(last, "" | "." | "..") {
            return Err(StorageError::InvalidPath);
        }
        let uploads = self.uploads_dir();
        let target = resolve_relative(&uploads, relative)?;
        if target == uploads {
            return Err(StorageError::InvalidPath);
        }
        Ok(target)
    }

    /// 相对共享根目录的 `/` 分隔路径。
    pub fn relative_of(&self, target: &Path) -> Result<String, StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        Ok(relative
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/"))
    }

    /// 列出单层目录内容（目录在前，按名称排序）。
    pub async fn list_dir(&self, target: &Path) -> Result<Vec<FileEntry>, StorageError> {
        let mut dir = fs::read_dir(target).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            // 跟随符号链接；无法读取的条目直接跳过。
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skip unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if is_upload_temp(&name) {
                continue;
            }
            let modified = metadata
                .modified()
                .ok()
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .map(format_timestamp);

            entries.push(FileEntry {
                name,
                path: self.relative_of(&path)?,
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        Ok(entries)
    }
}

pub const UPLOAD_TEMP_MARKER: &str = ".localweb-upload.";

/// 上传过程中使用的临时文件名（`.<name>.localweb-upload.<uuid>`）。
pub fn is_upload_temp(name: &str) -> bool {
    name.starts_with('.') && name.contains(UPLOAD_TEMP_MARKER)
}

/// 词法规范化客户端路径并拼接到 `base`。
///
/// 开头多余的 `..` 会被丢弃而不是报错；拼接后仍会校验前缀，
/// 校验失败时不做任何文件系统操作。
pub fn resolve_relative(base: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    if relative.contains('\0') {
        return Err(StorageError::InvalidPath);
    }
    let unified = relative.replace('\\', "/");
    let trimmed = unified.trim_start_matches('/');

    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(segment) => segments.push(segment),
            Component::CurDir => continue,
            Component::ParentDir => {
                segments.pop();
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath);
            }
        }
    }

    let mut target = base.to_path_buf();
    for segment in segments {
        target.push(segment);
    }

    if !target.starts_with(base) {
        return Err(StorageError::InvalidPath);
    }
    Ok(target)
}

fn format_timestamp(duration: Duration) -> String {
    let timestamp = UNIX_EPOCH + duration;
    let datetime: DateTime<Utc> = timestamp.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[derive(Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<String>,
}
