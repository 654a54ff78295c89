use crate::classifier::ContentCategory;
use crate::providers::base::{Capability, Instructions};

const DOCUMENT_TOKENS: u32 = 4000;
const SHORT_TOKENS: u32 = 2000;

const DOCUMENT_SYSTEM: &str = "You are a professional document analysis assistant. You extract \
     and organise information from documents accurately, keeping their original structure.";

fn system_prompt(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::Image => {
            "You are an expert image analyst. You describe images precisely and transcribe \
             any text they contain."
        }
        ContentCategory::Video | ContentCategory::ShortVideoLink => {
            "You are a video content analyst. You reason about videos from their metadata \
             and page information."
        }
        ContentCategory::Webpage => {
            "You are a web content assistant. You summarise web pages faithfully."
        }
        _ => DOCUMENT_SYSTEM,
    }
}

fn default_prompt(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::Image => {
            "Describe this image in detail and extract all text it contains."
        }
        ContentCategory::Pdf | ContentCategory::Word => {
            "Extract and organise all of the text in this document, keeping its structure \
             and formatting."
        }
        ContentCategory::Spreadsheet => {
            "Analyse this spreadsheet: describe its structure, the key figures and any \
             notable patterns."
        }
        ContentCategory::Video => "Analyse this video file.",
        ContentCategory::ShortVideoLink => {
            "Analyse this short video. Cover: 1. the topic of the content 2. the likely \
             audience 3. the value of the content 4. whether it is worth watching."
        }
        ContentCategory::Webpage | ContentCategory::Unsupported => {
            "Summarise this content."
        }
    }
}

/// Prompts and token budget for one provider call
pub fn instructions(
    category: ContentCategory,
    capability: Capability,
    custom_prompt: Option<&str>,
    quick: bool,
) -> Instructions {
    let request = custom_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| default_prompt(category));

    let prompt = match capability {
        Capability::Text if quick => format!(
            "{request}\n\nOnly the beginning of this {category} document is included below; \
             analyse what is there and say that the analysis is partial."
        ),
        Capability::Text => format!(
            "{request}\n\nThe following content was extracted from a {category} source:"
        ),
        Capability::Image | Capability::Upload => request.to_string(),
    };

    let max_tokens = match (category, capability) {
        (_, Capability::Image) => SHORT_TOKENS,
        _ if quick => SHORT_TOKENS,
        (ContentCategory::Pdf | ContentCategory::Word | ContentCategory::Spreadsheet, _) => {
            DOCUMENT_TOKENS
        }
        _ => SHORT_TOKENS,
    };

    Instructions {
        system: system_prompt(category).to_string(),
        prompt,
        max_tokens,
    }
}
