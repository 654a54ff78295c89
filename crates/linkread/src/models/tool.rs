use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;

use super::content::Content;

/// Name under which the link reader is advertised to MCP clients.
pub const READ_LINK_TOOL: &str = "read_link";

/// A tool that a client can invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// The descriptor of the `read_link` tool.
    pub fn read_link() -> Self {
        Tool::new(
            READ_LINK_TOOL,
            "Read a link and return an AI analysis of its content. Supports web pages, \
             images, PDF, Word and Excel documents, videos, short-video share links and \
             inline data: URLs.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The link to read: an http(s) URL or a data: URL"
                    },
                    "prompt": {
                        "type": "string",
                        "description": "Optional instruction describing what to extract or analyse"
                    }
                },
                "required": ["url"]
            }),
        )
    }
}

/// A tool invocation received from a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of a `read_link` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadLinkArgs {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// The result of a tool call in MCP wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    pub fn error<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
        }
    }

    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
