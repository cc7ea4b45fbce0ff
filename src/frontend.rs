//! 浏览页、上传页与目录索引页的 HTML 模板。

use std::fmt::Write as _;

use crate::config::{EMPTY_LISTING_MESSAGE, UPLOAD_DIR};
use crate::storage::FileEntry;
use crate::tree::{DirectoryNode, encode_path, render_tree_html};

const STYLE: &str = r#"<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
a { color: #0b5cad; text-decoration: none; }
a:hover { text-decoration: underline; }
ul.tree { list-style: none; padding: 0; font-family: ui-monospace, monospace; }
ul.tree .branch { white-space: pre; color: #999; }
table.listing td { padding: 0.15rem 1rem 0.15rem 0; }
.empty { color: #777; }
nav a { margin-right: 1rem; }
</style>"#;

/// 转义 HTML 文本与属性值。
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n{STYLE}\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

/// 浏览页：嵌入完整目录树。
pub fn render_browse_page(nodes: &[DirectoryNode]) -> String {
    let body = format!(
        "<h1>LocalWeb</h1>\n<nav><a href=\"/upload-ui\">Upload files</a></nav>\n{}",
        render_tree_html(nodes)
    );
    page("LocalWeb", &body)
}

/// 上传页：目录选择器与逐文件 PUT 上传脚本。
pub fn render_upload_page() -> String {
    let body = format!(
        r#"<h1>Upload File</h1>
<nav><a href="/">Browse</a></nav>
<form id="upload-form">
<p><label>Destination folder
<select id="folder"><option value="">{UPLOAD_DIR}/</option></select></label></p>
<p><input type="file" id="files" multiple></p>
<p><button type="submit">Upload</button></p>
</form>
<p id="status"></p>
<script>
const uploadRoot = "{UPLOAD_DIR}";
function addFolders(select, nodes, rootPath, depth) {{
  for (const node of nodes) {{
    if (node.kind !== "directory") continue;
    const option = document.createElement("option");
    option.value = rootPath ? node.path.slice(rootPath.length + 1) : node.path;
    option.textContent = "  ".repeat(depth) + node.name + "/";
    select.appendChild(option);
    addFolders(select, node.children || [], rootPath, depth + 1);
  }}
}}
async function loadTree() {{
  const res = await fetch("/api/directory-tree?path=" + encodeURIComponent(uploadRoot));
  if (!res.ok) return;
  const data = await res.json();
  addFolders(document.getElementById("folder"), data.tree, data.root, 1);
}}
function targetUrl(folder, name) {{
  const parts = folder ? folder.split("/") : [];
  parts.push(name);
  return "/upload/" + parts.map(encodeURIComponent).join("/");
}}
document.getElementById("upload-form").addEventListener("submit", async (event) => {{
  event.preventDefault();
  const folder = document.getElementById("folder").value;
  const files = document.getElementById("files").files;
  const status = document.getElementById("status");
  let ok = 0;
  let failed = 0;
  for (const file of files) {{
    status.textContent = "Uploading " + file.name + "...";
    try {{
      const res = await fetch(targetUrl(folder, file.name), {{ method: "PUT", body: file }});
      if (res.status === 201) ok++; else failed++;
    }} catch (err) {{
      failed++;
    }}
  }}
  status.textContent = ok + " uploaded, " + failed + " failed";
  document.getElementById("folder").length = 1;
  loadTree();
}});
loadTree();
</script>
"#
    );
    page("Upload File", &body)
}

/// 原始目录请求的索引页。
pub fn render_listing_page(relative: &str, entries: &[FileEntry]) -> String {
    let display = format!("/{}", relative.trim_matches('/'));
    let mut body = format!(
        "<h1>Index of {}</h1>\n<nav><a href=\"/\">Home</a><a href=\"/upload-ui\">Upload files</a></nav>\n",
        escape_html(&display)
    );

    if entries.is_empty() {
        let _ = writeln!(body, "<p class=\"empty\">{EMPTY_LISTING_MESSAGE}</p>");
    }

    body.push_str("<table class=\"listing\">\n");
    let trimmed = relative.trim_matches('/');
    if !trimmed.is_empty() {
        let parent = trimmed.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        let _ = writeln!(
            body,
            "<tr><td>📁 <a href=\"{}\">..</a></td><td></td><td></td></tr>",
            escape_html(&encode_path(parent))
        );
    }
    for entry in entries {
        let (icon, label, size) = if entry.is_dir {
            ("📁", format!("{}/", entry.name), String::new())
        } else {
            ("📄", entry.name.clone(), format_size(entry.size))
        };
        let _ = writeln!(
            body,
            "<tr><td>{icon} <a href=\"{}\">{}</a></td><td>{size}</td><td>{}</td></tr>",
            escape_html(&encode_path(&entry.path)),
            escape_html(&label),
            escape_html(entry.modified.as_deref().unwrap_or("")),
        );
    }
    body.push_str("</table>\n");

    page(&format!("Index of {display}"), &body)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
