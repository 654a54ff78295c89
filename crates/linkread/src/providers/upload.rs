//! Document analysis through an OpenAI-compatible Files API.
//!
//! The flow has three phases. The document is submitted as a multipart upload,
//! the file status is polled at a fixed interval while the backend reports
//! `processing`, and finally a chat call references the file as
//! `fileid://<id>`. The payload is spooled to a scratch file for the upload;
//! the file is a [`NamedTempFile`] so it is removed on every exit path.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;
use tokio_util::io::ReaderStream;

use super::base::{Completion, DocumentInput, Instructions};
use super::openai::OpenAiCompatibleProvider;
use crate::errors::ProviderError;

const FILE_PURPOSE: &str = "file-extract";

#[derive(Debug, Deserialize)]
struct FileObject {
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum FileStatus {
    Processing,
    Failed(String),
    Ready,
}

impl FileStatus {
    fn parse(status: Option<&str>) -> Self {
        match status {
            Some("processing") => FileStatus::Processing,
            Some(s @ ("error" | "failed")) => FileStatus::Failed(s.to_string()),
            _ => FileStatus::Ready,
        }
    }
}

#[derive(Debug)]
enum UploadPhase {
    Submit,
    Poll {
        file_id: String,
        status: FileStatus,
        polls: u32,
    },
    Analyze {
        file_id: String,
    },
}

impl OpenAiCompatibleProvider {
    pub(super) async fn upload_and_analyze(
        &self,
        document: DocumentInput<'_>,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        let id = self.config.id;
        let policy = self.policy.upload.clone();
        let scratch = self.spool(&document).await?;

        let mut phase = UploadPhase::Submit;
        loop {
            phase = match phase {
                UploadPhase::Submit => {
                    let (file_id, status) = self.submit(&scratch, &document).await?;
                    tracing::info!(provider = %id, %file_id, ?status, "document uploaded");
                    UploadPhase::Poll {
                        file_id,
                        status,
                        polls: 0,
                    }
                }
                UploadPhase::Poll {
                    file_id,
                    status: FileStatus::Failed(status),
                    ..
                } => {
                    return Err(ProviderError::Upload {
                        provider: id,
                        message: format!("file {file_id} was rejected with status {status}"),
                    });
                }
                UploadPhase::Poll {
                    file_id,
                    status: FileStatus::Processing,
                    polls,
                } if polls < policy.max_polls => {
                    tokio::time::sleep(policy.poll_interval).await;
                    let status = match self.retrieve(&file_id).await {
                        Ok(status) => status,
                        Err(e) => {
                            tracing::warn!(provider = %id, %file_id, error = %e, "status check failed");
                            FileStatus::Processing
                        }
                    };
                    UploadPhase::Poll {
                        file_id,
                        status,
                        polls: polls + 1,
                    }
                }
                UploadPhase::Poll {
                    file_id, status, ..
                } => {
                    if status == FileStatus::Processing {
                        tracing::warn!(
                            provider = %id,
                            %file_id,
                            "file still processing after {} checks, analysing anyway",
                            policy.max_polls
                        );
                    }
                    UploadPhase::Analyze { file_id }
                }
                UploadPhase::Analyze { file_id } => {
                    return self.analyze_file(&file_id, instructions).await;
                }
            };
        }
    }

    async fn spool(&self, document: &DocumentInput<'_>) -> Result<NamedTempFile, ProviderError> {
        let upload_error = |e: std::io::Error| ProviderError::Upload {
            provider: self.config.id,
            message: format!("could not write scratch file: {e}"),
        };

        let file = tempfile::Builder::new()
            .prefix("linkread-")
            .suffix(&format!(".{}", document.extension))
            .tempfile_in(&self.policy.scratch_dir)
            .map_err(upload_error)?;
        tokio::fs::write(file.path(), document.bytes)
            .await
            .map_err(upload_error)?;
        Ok(file)
    }

    async fn submit(
        &self,
        scratch: &NamedTempFile,
        document: &DocumentInput<'_>,
    ) -> Result<(String, FileStatus), ProviderError> {
        let id = self.config.id;
        let file = tokio::fs::File::open(scratch.path())
            .await
            .map_err(|e| ProviderError::Upload {
                provider: id,
                message: format!("could not reopen scratch file: {e}"),
            })?;

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, document.bytes.len() as u64)
            .file_name(format!("document.{}", document.extension))
            .mime_str("application/octet-stream")
            .map_err(|e| ProviderError::Upload {
                provider: id,
                message: e.to_string(),
            })?;
        let form = Form::new().text("purpose", FILE_PURPOSE).part("file", part);

        let request = self.client.post(self.url("files")).multipart(form);
        let value = self
            .send_json(request, "upload", self.policy.upload.submit_timeout)
            .await?;
        let object: FileObject =
            serde_json::from_value(value).map_err(|e| ProviderError::Upload {
                provider: id,
                message: e.to_string(),
            })?;

        match object.id {
            Some(file_id) if !file_id.is_empty() => {
                Ok((file_id, FileStatus::parse(object.status.as_deref())))
            }
            _ => Err(ProviderError::Upload {
                provider: id,
                message: "upload response carried no file id".to_string(),
            }),
        }
    }

    async fn retrieve(&self, file_id: &str) -> Result<FileStatus, ProviderError> {
        let request = self.client.get(self.url(&format!("files/{file_id}")));
        let value = self
            .send_json(request, "status check", self.policy.upload.status_timeout)
            .await?;
        Ok(FileStatus::parse(value.get("status").and_then(|s| s.as_str())))
    }

    async fn analyze_file(
        &self,
        file_id: &str,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        let messages = vec![
            json!({"role": "system", "content": instructions.system}),
            json!({"role": "system", "content": format!("fileid://{file_id}")}),
            json!({"role": "user", "content": instructions.prompt}),
        ];
        self.chat(
            messages,
            instructions.max_tokens,
            "document analysis",
            self.policy.upload.analyze_timeout,
        )
        .await
    }
}
