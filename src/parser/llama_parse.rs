//! Remote table-aware parser.
//!
//! Uploads PDFs to a LlamaParse-compatible job API and polls until the
//! Markdown result is ready. Non-PDF inputs are read locally.

use super::local::{is_pdf, LocalParser};
use super::{DocumentParser, TextFormat};
use crate::config::ParsingSettings;
use crate::document::Document;
use crate::error::{ProspektError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Separator the service places between pages of a Markdown result.
const PAGE_SEPARATOR: &str = "\n---\n";

/// Remote Markdown parser.
pub struct LlamaParseParser {
    http: reqwest::Client,
    api_base: Url,
    api_key: String,
    language: String,
    instructions: String,
    poll_interval: Duration,
    timeout: Duration,
    local: LocalParser,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: JobStatus,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum JobStatus {
    Pending,
    /// Partial results still carry the pages that were parsed.
    #[serde(alias = "PARTIAL_SUCCESS")]
    Success,
    Error,
    #[serde(alias = "CANCELLED")]
    Canceled,
    /// Any status this client does not know yet; polled like `Pending`.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MarkdownResult {
    markdown: String,
}

impl LlamaParseParser {
    /// Create a parser from settings, the service key and the parsing instructions.
    pub fn new(settings: &ParsingSettings, api_key: String, instructions: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: base_url(&settings.api_base)?,
            api_key,
            language: settings.language.clone(),
            instructions,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            local: LocalParser::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| ProspektError::Config(format!("Invalid parsing endpoint {}: {}", path, e)))
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("file", part)
            .text("language", self.language.clone())
            .text("parsing_instruction", self.instructions.clone());

        let response: UploadResponse = self
            .http
            .post(self.endpoint("upload")?)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Upload accepted as job {}", response.id);
        Ok(response.id)
    }

    async fn wait_for(&self, job_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let url = self.endpoint(&format!("job/{}", job_id))?;

        loop {
            let job: JobResponse = self
                .http
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match job.status {
                JobStatus::Success => return Ok(()),
                JobStatus::Error | JobStatus::Canceled => {
                    return Err(ProspektError::Parsing(format!(
                        "Parsing job {} failed: {}",
                        job_id,
                        job.error_message.unwrap_or_else(|| format!("{:?}", job.status))
                    )));
                }
                JobStatus::Pending => {}
                JobStatus::Unknown => debug!("Job {} reported an unrecognized status, still waiting", job_id),
            }

            if Instant::now() >= deadline {
                return Err(ProspektError::Parsing(format!(
                    "Parsing job {} did not finish within {}s",
                    job_id,
                    self.timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_markdown(&self, job_id: &str) -> Result<String> {
        let result: MarkdownResult = self
            .http
            .get(self.endpoint(&format!("job/{}/result/markdown", job_id))?)
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(result.markdown)
    }
}

#[async_trait]
impl DocumentParser for LlamaParseParser {
    fn output_format(&self) -> TextFormat {
        TextFormat::Markdown
    }

    fn name(&self) -> &'static str {
        "llama-parse"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        if !is_pdf(path) {
            return self.local.parse(path).await;
        }

        info!("Uploading {:?} for Markdown extraction", path.file_name().unwrap_or_default());
        let job_id = self.upload(path).await?;
        self.wait_for(&job_id).await?;
        let markdown = self.fetch_markdown(&job_id).await?;

        let documents = split_markdown_pages(path, &markdown);
        if documents.is_empty() {
            warn!("Parsing job {} returned no text for {:?}", job_id, path);
        }
        Ok(documents)
    }
}

/// Parse the base URL, forcing a trailing slash so relative joins append.
fn base_url(api_base: &str) -> Result<Url> {
    let normalized = if api_base.ends_with('/') {
        api_base.to_string()
    } else {
        format!("{}/", api_base)
    };
    Url::parse(&normalized)
        .map_err(|e| ProspektError::Config(format!("Invalid parsing api_base {}: {}", api_base, e)))
}

/// One document per non-empty Markdown page.
fn split_markdown_pages(path: &Path, markdown: &str) -> Vec<Document> {
    markdown
        .split(PAGE_SEPARATOR)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Document::from_file(path, Some(i + 1), page.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PAGE_LABEL;

    #[test]
    fn test_base_url_joins_below_base_path() {
        let base = base_url("https://api.cloud.llamaindex.ai/api/parsing").unwrap();
        assert_eq!(
            base.join("job/abc/result/markdown").unwrap().as_str(),
            "https://api.cloud.llamaindex.ai/api/parsing/job/abc/result/markdown"
        );
        assert!(base_url("not a url").is_err());
    }

    #[test]
    fn test_split_markdown_pages() {
        let md = "# ALDI\n| Butter | 169 |\n---\n\n---\n# Seite 3";
        let docs = split_markdown_pages(Path::new("/data/aldi.pdf"), md);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "# ALDI\n| Butter | 169 |");
        assert_eq!(docs[1].metadata.get(PAGE_LABEL).map(String::as_str), Some("3"));
    }

    #[test]
    fn test_job_status_deserialization() {
        let job: JobResponse = serde_json::from_str(r#"{"status":"SUCCESS"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Success);

        let job: JobResponse =
            serde_json::from_str(r#"{"status":"ERROR","error_message":"bad pdf"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_message.as_deref(), Some("bad pdf"));
    }

    #[test]
    fn test_unlisted_job_statuses_do_not_fail_decoding() {
        let job: JobResponse = serde_json::from_str(r#"{"status":"PARTIAL_SUCCESS"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Success);

        let job: JobResponse = serde_json::from_str(r#"{"status":"QUEUED_FOR_OCR"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
    }

    #[tokio::test]
    async fn test_non_pdf_is_parsed_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewe.md");
        std::fs::write(&path, "# REWE\nKäse 199").unwrap();

        let parser =
            LlamaParseParser::new(&ParsingSettings::default(), "key".to_string(), String::new())
                .unwrap();
        let docs = parser.parse(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(parser.output_format(), TextFormat::Markdown);
    }
}
