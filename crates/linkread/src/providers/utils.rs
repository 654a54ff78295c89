use base64::Engine;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Completion, ImageInput, ProviderId, Usage};
use crate::errors::ProviderError;

/// Longest slice of an error body quoted back to the caller.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Convert an image into an OpenAI `image_url` content part carrying a data URL
pub fn image_to_openai_spec(image: &ImageInput<'_>) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(image.bytes);
    json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:{};base64,{}", image.mime_type, data)
        }
    })
}

pub fn get_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Pull the assistant text out of a chat completion response
pub fn openai_response_to_completion(
    provider: ProviderId,
    model: &str,
    response: &Value,
) -> Result<Completion, ProviderError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::MalformedResponse { provider, message });
    }

    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider,
            message: "no message content in choices[0]".to_string(),
        })?;

    Ok(Completion {
        provider,
        model: response
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string(),
        content: content.to_string(),
        usage: get_usage(response),
    })
}

/// Map a non-success status into a readable error.
pub fn map_http_status(
    provider: ProviderId,
    model: &str,
    status: StatusCode,
    body: &str,
) -> ProviderError {
    let detail = error_detail(body);
    let code = status.as_u16();
    let message = match code {
        400 => format!("Bad request (400): the request parameters were rejected. {detail}"),
        401 => format!(
            "Authentication failed (401): the API key for {provider} is invalid or expired"
        ),
        403 => format!("Permission denied (403): the API key has no access to model {model}"),
        404 => format!("Model not found (404): check that model {model} exists"),
        429 => "Rate limited (429): too many requests, try again later".to_string(),
        500 => format!("Server error (500): {provider} is temporarily unavailable"),
        _ => format!("HTTP error {code}: {detail}"),
    };
    ProviderError::Http {
        provider,
        status: code,
        message: message.trim_end().to_string(),
    }
}

/// Prefer the `error.message` of a JSON error body, fall back to the raw text.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value["error"]["message"]
                .as_str()
                .or_else(|| value["message"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
