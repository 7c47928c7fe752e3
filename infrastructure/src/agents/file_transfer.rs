//! File manager agent
//!
//! Downloads URLs found in the task, or inspects local paths. Downloads go
//! to a fresh directory per invocation so concurrent runs never collide.

use super::backend_failure;
use async_trait::async_trait;
use cedar_application::{Agent, AgentError, CompletionRequest, LlmGateway};
use cedar_domain::{AgentKind, AgentResult, ConversationContext, PromptTemplate, prefix, truncate};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PREVIEW_BYTES: usize = 500;
const DETAIL_PREVIEW_CHARS: usize = 200;
const MAX_GLOB_MATCHES: usize = 20;
const DESCRIPTION_MAX_TOKENS: u32 = 100;
const USER_AGENT: &str = concat!("cedar/", env!("CARGO_PKG_VERSION"), " (File Manager)");

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\x22'`]+").expect("valid regex"));

static LOCAL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)((?:~|\.)?/[^\s\x22'`]+)").expect("valid regex")
});

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("valid regex"));

/// What happened to one URL or path
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum FileRecord {
    Downloaded {
        url: String,
        path: PathBuf,
        filename: String,
        size: u64,
        mime_type: &'static str,
        preview: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Analyzed {
        path: PathBuf,
        filename: String,
        size: u64,
        mime_type: &'static str,
        preview: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Error {
        target: String,
        error: String,
    },
}

impl FileRecord {
    fn is_error(&self) -> bool {
        matches!(self, FileRecord::Error { .. })
    }

    fn answer_line(&self) -> String {
        match self {
            FileRecord::Downloaded {
                filename,
                size,
                path,
                ..
            } => format!(
                "✓ Downloaded {} ({} bytes) to {}",
                filename,
                size,
                path.display()
            ),
            FileRecord::Analyzed { filename, size, .. } => {
                format!("✓ Analyzed {} ({} bytes)", filename, size)
            }
            FileRecord::Error { target, error } => format!("✗ Error ({}): {}", target, error),
        }
    }
}

pub struct FileTransferAgent {
    client: reqwest::Client,
    gateway: Option<Arc<dyn LlmGateway>>,
    download_dir: PathBuf,
    max_bytes: u64,
    timeout: Duration,
}

impl FileTransferAgent {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway: None,
            download_dir,
            max_bytes: 25 * 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_gateway(mut self, gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots)
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn nothing_found() -> AgentResult {
        AgentResult::new(
            AgentKind::FileTransfer,
            "Answer: No files or URLs detected in your request\n\n\
             Why: To use the File Manager, please provide either:\n\
             - A URL to download (e.g., https://example.com/file.pdf)\n\
             - A file path to analyze (e.g., /home/you/document.txt)\n\n\
             Suggested Next Steps: Include a specific URL or file path in your request",
            0.3,
            "No files detected",
        )
        .with_explanation("Awaiting file information")
    }

    async fn download_all(&self, urls: &[String]) -> Vec<FileRecord> {
        // One directory per invocation; names inside it only need to be
        // unique among this invocation's URLs
        let target_dir = self.download_dir.join(Uuid::new_v4().to_string());
        if let Err(e) = tokio::fs::create_dir_all(&target_dir).await {
            return urls
                .iter()
                .map(|url| FileRecord::Error {
                    target: url.clone(),
                    error: format!("Cannot create download directory: {}", e),
                })
                .collect();
        }

        let mut records = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let record = match self.download(url, &target_dir, index).await {
                Ok(record) => record,
                Err(error) => {
                    warn!(url = %url, error = %error, "Download failed");
                    FileRecord::Error {
                        target: url.clone(),
                        error,
                    }
                }
            };
            records.push(record);
        }
        records
    }

    async fn download(&self, url: &str, dir: &Path, index: usize) -> Result<FileRecord, String> {
        info!(url, "Downloading");
        let mut response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch URL: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }
        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(format!(
                "File too large: {} bytes (max: {} bytes)",
                length, self.max_bytes
            ));
        }

        let filename = format!("{}_{}", index + 1, filename_from_url(url));
        let path = dir.join(&filename);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| format!("Cannot create {}: {}", path.display(), e))?;

        let streamed = self.stream_body(&mut response, &mut file, &path).await;
        drop(file);
        let (size, head) = match streamed {
            Ok(streamed) => streamed,
            Err(error) => {
                // No partial files are left behind
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %e, "Could not remove partial download");
                }
                return Err(error);
            }
        };

        let mime_type = guess_mime(&filename);
        let preview = text_preview(&head);
        let description = self.describe(&filename, &preview).await;
        debug!(path = %path.display(), size, "Download complete");

        Ok(FileRecord::Downloaded {
            url: url.to_string(),
            path,
            filename,
            size,
            mime_type,
            preview,
            description,
        })
    }

    /// Copy the response body into `file` under the byte cap. Returns the
    /// size and the first [`PREVIEW_BYTES`] bytes.
    async fn stream_body<W>(
        &self,
        response: &mut reqwest::Response,
        file: &mut W,
        path: &Path,
    ) -> Result<(u64, Vec<u8>), String>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut size: u64 = 0;
        let mut head = Vec::with_capacity(PREVIEW_BYTES);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?
        {
            size += chunk.len() as u64;
            if size > self.max_bytes {
                return Err(format!("File exceeds {} bytes", self.max_bytes));
            }
            if head.len() < PREVIEW_BYTES {
                let take = (PREVIEW_BYTES - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        }
        file.flush()
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok((size, head))
    }

    async fn inspect_all(&self, paths: &[String]) -> Vec<FileRecord> {
        let mut records = Vec::new();
        for raw in paths {
            let expanded = crate::config::expand_home(Path::new(raw));
            let pattern = expanded.to_string_lossy().into_owned();
            if pattern.contains('*') || pattern.contains('?') {
                match expand_glob(pattern).await {
                    Ok(found) => {
                        if found.is_empty() {
                            records.push(FileRecord::Error {
                                target: raw.clone(),
                                error: "No files match the pattern".to_string(),
                            });
                        }
                        for path in found {
                            records.push(self.inspect(&path).await);
                        }
                    }
                    Err(error) => records.push(FileRecord::Error {
                        target: raw.clone(),
                        error,
                    }),
                }
            } else {
                records.push(self.inspect(&expanded).await);
            }
        }
        records
    }

    async fn inspect(&self, path: &Path) -> FileRecord {
        let target = path.display().to_string();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return FileRecord::Error {
                    target,
                    error: "File not found".to_string(),
                };
            }
            Err(e) => {
                return FileRecord::Error {
                    target,
                    error: e.to_string(),
                };
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.clone());

        if metadata.is_dir() {
            let entries = count_entries(path).await.unwrap_or(0);
            return FileRecord::Analyzed {
                path: path.to_path_buf(),
                filename,
                size: metadata.len(),
                mime_type: "inode/directory",
                preview: format!("Directory with {} entries", entries),
                description: None,
            };
        }

        let head = match read_head(path).await {
            Ok(head) => head,
            Err(e) => {
                return FileRecord::Error {
                    target,
                    error: e.to_string(),
                };
            }
        };
        let preview = text_preview(&head);
        let description = self.describe(&filename, &preview).await;

        FileRecord::Analyzed {
            path: path.to_path_buf(),
            mime_type: guess_mime(&filename),
            filename,
            size: metadata.len(),
            preview,
            description,
        }
    }

    /// Short backend description of a text file, when a backend is available.
    async fn describe(&self, filename: &str, preview: &str) -> Option<String> {
        let gateway = self.gateway.as_ref()?;
        if preview.len() <= 10 || preview == BINARY_PREVIEW {
            return None;
        }
        let request = CompletionRequest::new(
            PromptTemplate::file_description_system(),
            format!("File: {}\nContent preview: {}", filename, preview),
        )
        .with_max_tokens(DESCRIPTION_MAX_TOKENS);
        match gateway.complete(request).await {
            Ok(description) => Some(description.trim().to_string()),
            Err(e) => {
                debug!(error = %e, "File description failed");
                None
            }
        }
    }
}

const BINARY_PREVIEW: &str = "[Binary file]";

/// Matches for a glob pattern, walked off the async workers.
async fn expand_glob(pattern: String) -> Result<Vec<PathBuf>, String> {
    tokio::task::spawn_blocking(move || {
        glob::glob(&pattern)
            .map(|matches| matches.flatten().take(MAX_GLOB_MATCHES).collect())
            .map_err(|e| format!("Invalid pattern: {}", e))
    })
    .await
    .map_err(|e| format!("Pattern expansion failed: {}", e))?
}

async fn count_entries(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while entries.next_entry().await?.is_some() {
        count += 1;
    }
    Ok(count)
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(PREVIEW_BYTES);
    file.take(PREVIEW_BYTES as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// First bytes as text, or a marker for binary content.
fn text_preview(head: &[u8]) -> String {
    if head.contains(&0) {
        return BINARY_PREVIEW.to_string();
    }
    let text = String::from_utf8_lossy(head);
    prefix(&text, DETAIL_PREVIEW_CHARS).to_string()
}

/// Last path segment of the URL, made safe for the filesystem.
fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let name = after_scheme
        .split_once('/')
        .and_then(|(_, rest)| rest.rsplit('/').find(|s| !s.is_empty()))
        .unwrap_or("download");
    UNSAFE_FILENAME_CHARS.replace_all(name, "_").into_owned()
}

fn guess_mime(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "toml" => "application/toml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

fn find_urls(task: &str) -> Vec<String> {
    URL.find_iter(task)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ')', ';', ':'])
                .to_string()
        })
        .collect()
}

fn find_paths(task: &str) -> Vec<String> {
    LOCAL_PATH
        .captures_iter(task)
        .map(|caps| caps[1].trim_end_matches(['.', ',', ')', ';', ':']).to_string())
        .filter(|p| p.len() > 1)
        .collect()
}

#[async_trait]
impl Agent for FileTransferAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::FileTransfer
    }

    async fn process(
        &self,
        task: &str,
        _context: Option<&ConversationContext>,
    ) -> Result<AgentResult, AgentError> {
        info!(task = %truncate(task, 100), "File manager started");

        // URLs take precedence; paths inside a URL are not local paths
        let urls = find_urls(task);
        let records = if !urls.is_empty() {
            self.download_all(&urls).await
        } else {
            let paths = find_paths(task);
            if paths.is_empty() {
                return Ok(Self::nothing_found());
            }
            self.inspect_all(&paths).await
        };

        let details = match serde_json::to_string_pretty(&records) {
            Ok(details) => details,
            Err(e) => return Ok(backend_failure(AgentKind::FileTransfer, "File report", e)),
        };
        let lines: Vec<String> = records.iter().map(FileRecord::answer_line).collect();
        let all_ok = records.iter().all(|r| !r.is_error());

        Ok(AgentResult::new(
            AgentKind::FileTransfer,
            format!(
                "Answer: {}\n\nWhy: Files have been processed and saved with metadata\n\n\
                 File Details:\n{}\n\n\
                 Suggested Next Steps: Files are ready for further processing or analysis",
                lines.join("\n"),
                details
            ),
            if all_ok { 0.9 } else { 0.6 },
            "File download and analysis",
        )
        .with_explanation(format!("Processed {} file(s)", records.len()))
        .with_summary(lines.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls_and_paths() {
        assert_eq!(
            find_urls("grab https://example.com/a/report.pdf?x=1, please"),
            vec!["https://example.com/a/report.pdf?x=1"]
        );
        assert_eq!(
            find_paths("look at /tmp/data.csv and ./notes.md."),
            vec!["/tmp/data.csv", "./notes.md"]
        );
        assert!(find_paths("and/or this").is_empty());
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://example.com/a/report.pdf?x=1"), "report.pdf");
        assert_eq!(filename_from_url("https://example.com/"), "download");
        assert_eq!(filename_from_url("https://example.com/my file(1).txt"), "my_file_1_.txt");
    }

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview(b"hello"), "hello");
        assert_eq!(text_preview(&[0x89, 0x50, 0x00, 0x01]), BINARY_PREVIEW);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let agent = FileTransferAgent::new(temp_dir.path().to_path_buf());
        let result = agent.process("organize my life", None).await.unwrap();
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.key_finding(100), "No files or URLs detected in your request");
    }

    #[tokio::test]
    async fn test_inspects_local_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("notes.txt");
        std::fs::write(&file, "first line\nsecond line\n").unwrap();

        let agent = FileTransferAgent::new(temp_dir.path().join("downloads"));
        let result = agent
            .process(&format!("what is in {}", file.display()), None)
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.method, "File download and analysis");
        assert!(result.result.contains("✓ Analyzed notes.txt (23 bytes)"));
        assert!(result.result.contains("\"action\": \"analyzed\""));
        assert!(result.result.contains("\"mime_type\": \"text/plain\""));
    }

    #[tokio::test]
    async fn test_missing_file_lowers_confidence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let present = temp_dir.path().join("a.txt");
        std::fs::write(&present, "a").unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let agent = FileTransferAgent::new(temp_dir.path().join("downloads"));
        let result = agent
            .process(
                &format!("compare {} with {}", present.display(), missing.display()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.6);
        assert!(result.result.contains("File not found"));
    }

    #[tokio::test]
    async fn test_glob_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["a.log", "b.log", "c.txt"] {
            std::fs::write(temp_dir.path().join(name), name).unwrap();
        }
        let agent = FileTransferAgent::new(temp_dir.path().join("downloads"));
        let result = agent
            .process(&format!("inspect {}/*.log", temp_dir.path().display()), None)
            .await
            .unwrap();

        assert!(result.result.contains("a.log"));
        assert!(result.result.contains("b.log"));
        assert!(!result.result.contains("c.txt"));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_error_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let agent = FileTransferAgent::new(temp_dir.path().to_path_buf())
            .with_timeout(Duration::from_secs(2));
        let result = agent
            .process("download http://127.0.0.1:9/file.txt", None)
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.6);
        assert!(result.result.contains("\"action\": \"error\""));
    }

    #[tokio::test]
    async fn test_directory_entry_count() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("box");
        std::fs::create_dir(&dir).unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.join(name), name).unwrap();
        }
        let agent = FileTransferAgent::new(temp_dir.path().join("downloads"));
        let result = agent
            .process(&format!("what is in {}", dir.display()), None)
            .await
            .unwrap();
        assert!(result.result.contains("Directory with 3 entries"));
    }

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(response: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn direct_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(files_under(&path));
            } else {
                files.push(path);
            }
        }
        files
    }

    #[tokio::test]
    async fn test_download_from_local_server() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world"
                .to_vec(),
        )
        .await;
        let temp_dir = tempfile::tempdir().unwrap();
        let agent =
            FileTransferAgent::new(temp_dir.path().to_path_buf()).with_client(direct_client());
        let result = agent
            .process(&format!("download {}/greeting.txt", base), None)
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.9);
        assert!(result.result.contains("✓ Downloaded 1_greeting.txt (11 bytes)"));
        let files = files_under(temp_dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_oversized_body_leaves_no_partial_file() {
        // No Content-Length, so the cap is only hit while streaming
        let mut response = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_vec();
        response.extend(std::iter::repeat_n(b'x', 8192));
        let base = serve_once(response).await;

        let temp_dir = tempfile::tempdir().unwrap();
        let agent = FileTransferAgent::new(temp_dir.path().to_path_buf())
            .with_client(direct_client())
            .with_max_bytes(1024);
        let result = agent
            .process(&format!("download {}/big.bin", base), None)
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.6);
        assert!(result.result.contains("File exceeds 1024 bytes"));
        assert!(files_under(temp_dir.path()).is_empty());
    }

    struct FailingWriter;

    impl tokio::io::AsyncWrite for FailingWriter {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello".to_vec(),
        )
        .await;
        let agent = FileTransferAgent::new(PathBuf::from("/unused"));
        let mut response = direct_client()
            .get(format!("{}/a.txt", base))
            .send()
            .await
            .unwrap();

        let error = agent
            .stream_body(&mut response, &mut FailingWriter, Path::new("a.txt"))
            .await
            .unwrap_err();
        assert!(error.contains("Failed to write a.txt: disk full"));
    }
}
