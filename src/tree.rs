//! 目录树生成：JSON 树（上传页目录选择）与 HTML 树（浏览页）。

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::EMPTY_LISTING_MESSAGE;
use crate::frontend::escape_html;
use crate::storage::is_upload_temp;

/// URL 路径段中需要转义的字符。
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// 文件树中的单个条目。
#[derive(Clone, Debug, Serialize)]
pub struct DirectoryNode {
    pub name: String,
    /// 相对共享根目录的路径，`/` 分隔。
    pub path: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DirectoryNode>>,
    /// 超过深度限制未展开，`children` 为空。
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl DirectoryNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// 以 `/` 开头、逐段百分号编码的链接。
    pub fn href(&self) -> String {
        encode_path(&self.path)
    }
}

/// 将 `/` 分隔的相对路径编码为绝对 URL 路径。
pub fn encode_path(relative: &str) -> String {
    let mut href = String::from("/");
    let encoded = relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    href.push_str(&encoded);
    href
}

struct RawEntry {
    name: String,
    path: String,
    is_dir: bool,
}

struct Pending {
    dir: PathBuf,
    relative: String,
    depth: usize,
}

/// 在阻塞线程池中生成目录树。
pub async fn build_tree_blocking(
    dir: PathBuf,
    prefix: String,
    max_depth: usize,
) -> io::Result<Vec<DirectoryNode>> {
    tokio::task::spawn_blocking(move || build_tree(&dir, &prefix, max_depth))
        .await
        .map_err(|err| io::Error::other(err.to_string()))?
}

/// 迭代遍历 `dir`，返回完整的递归树。
///
/// 符号链接会被跟随，但同一个规范化目录只展开一次；超过 `max_depth`
/// 的目录只列出自身并标记为 `truncated`。只有根目录本身不可读时才返回错误。
pub fn build_tree(dir: &Path, prefix: &str, max_depth: usize) -> io::Result<Vec<DirectoryNode>> {
    let prefix = prefix.trim_matches('/').to_string();
    let mut listings: HashMap<String, Vec<RawEntry>> = HashMap::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut truncated: HashSet<String> = HashSet::new();

    visited.insert(std::fs::canonicalize(dir)?);
    let root_entries = read_entries(dir, &prefix)?;
    let mut stack: Vec<Pending> = Vec::new();
    queue_children(
        &root_entries,
        dir,
        1,
        max_depth,
        &mut visited,
        &mut truncated,
        &mut stack,
    );
    listings.insert(prefix.clone(), root_entries);

    while let Some(pending) = stack.pop() {
        let entries = match read_entries(&pending.dir, &pending.relative) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path = %pending.dir.display(), error = %err, "skip unreadable directory");
                continue;
            }
        };
        queue_children(
            &entries,
            &pending.dir,
            pending.depth + 1,
            max_depth,
            &mut visited,
            &mut truncated,
            &mut stack,
        );
        listings.insert(pending.relative, entries);
    }

    Ok(assemble(&prefix, &mut listings, &truncated))
}

fn queue_children(
    entries: &[RawEntry],
    parent: &Path,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<PathBuf>,
    truncated: &mut HashSet<String>,
    stack: &mut Vec<Pending>,
) {
    if depth > max_depth {
        truncated.extend(
            entries
                .iter()
                .filter(|entry| entry.is_dir)
                .map(|entry| entry.path.clone()),
        );
        return;
    }
    for entry in entries.iter().filter(|entry| entry.is_dir) {
        let dir = parent.join(&entry.name);
        let canonical = match std::fs::canonicalize(&dir) {
            Ok(canonical) => canonical,
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "skip unresolvable directory");
                continue;
            }
        };
        if !visited.insert(canonical) {
            debug!(path = %dir.display(), "skip already visited directory");
            continue;
        }
        stack.push(Pending {
            dir,
            relative: entry.path.clone(),
            depth,
        });
    }
}

fn read_entries(dir: &Path, relative: &str) -> io::Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "skip unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if is_upload_temp(&name) {
            continue;
        }
        let is_dir = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata.is_dir(),
            Err(err) => {
                debug!(path = %entry.path().display(), error = %err, "skip unreadable entry");
                continue;
            }
        };
        let path = if relative.is_empty() {
            name.clone()
        } else {
            format!("{relative}/{name}")
        };
        entries.push(RawEntry { name, path, is_dir });
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

fn assemble(
    relative: &str,
    listings: &mut HashMap<String, Vec<RawEntry>>,
    truncated: &HashSet<String>,
) -> Vec<DirectoryNode> {
    let Some(entries) = listings.remove(relative) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .map(|entry| {
            let is_truncated = truncated.contains(&entry.path);
            let children = (entry.is_dir && !is_truncated)
                .then(|| assemble(&entry.path, listings, truncated));
            DirectoryNode {
                name: entry.name,
                path: entry.path,
                kind: if entry.is_dir {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
                children,
                truncated: is_truncated,
            }
        })
        .collect()
}

/// 将目录树渲染为带制表符连接线的嵌套链接列表。
pub fn render_tree_html(nodes: &[DirectoryNode]) -> String {
    if nodes.is_empty() {
        return format!("<p class=\"empty\">{EMPTY_LISTING_MESSAGE}</p>");
    }
    let mut html = String::from("<ul class=\"tree\">\n");
    render_level(nodes, "", &mut html);
    html.push_str("</ul>\n");
    html
}

fn render_level(nodes: &[DirectoryNode], indent: &str, html: &mut String) {
    for (index, node) in nodes.iter().enumerate() {
        let last = index + 1 == nodes.len();
        let connector = if last { "└── " } else { "├── " };
        let label = if node.is_dir() {
            format!("{}/", escape_html(&node.name))
        } else {
            escape_html(&node.name)
        };
        let marker = if node.truncated {
            " <span class=\"truncated\">…</span>"
        } else {
            ""
        };
        let _ = writeln!(
            html,
            "<li><span class=\"branch\">{indent}{connector}</span><a href=\"{}\">{label}</a>{marker}</li>",
            escape_html(&node.href()),
        );
        if let Some(children) = node.children.as_deref() {
            let next_indent = format!("{indent}{}", if last { "    " } else { "│   " });
            render_level(children, &next_indent, html);
        }
    }
}
