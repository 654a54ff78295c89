//! Decide what kind of content a link points at.
//!
//! Classification is a pure function of the link text and the content type the
//! server declared (or the media type of an inline `data:` URL). The precedence
//! is: short-video host, inline media type, path suffix, declared content type.

use serde::Serialize;
use strum_macros::{Display, EnumIter};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum ContentCategory {
    #[strum(to_string = "webpage")]
    Webpage,
    #[strum(to_string = "image")]
    Image,
    #[strum(to_string = "PDF")]
    Pdf,
    #[strum(to_string = "Word")]
    Word,
    #[strum(to_string = "spreadsheet")]
    Spreadsheet,
    #[strum(to_string = "video")]
    Video,
    #[strum(to_string = "short video")]
    ShortVideoLink,
    #[strum(to_string = "unsupported")]
    Unsupported,
}

/// Hosts of the short-video platform whose share pages get a dedicated reader.
pub const SHORT_VIDEO_HOSTS: &[&str] = &["douyin.com", "iesdouyin.com"];

/// Display name of the short-video platform, used to skip generic page titles.
pub const SHORT_VIDEO_PLATFORM: &str = "抖音";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tiff", "ico",
];

pub fn classify(target: &str, declared_content_type: &str) -> ContentCategory {
    let declared = declared_content_type.trim().to_ascii_lowercase();

    if target.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return inline_category(&declared).unwrap_or(ContentCategory::Unsupported);
    }

    let Ok(url) = Url::parse(target) else {
        return ContentCategory::Unsupported;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return ContentCategory::Unsupported;
    }
    if is_short_video_link(&url) {
        return ContentCategory::ShortVideoLink;
    }

    if let Some(category) = path_extension(&url).and_then(|ext| extension_category(&ext)) {
        return category;
    }

    declared_category(&declared)
}

/// Category of an inline payload from its media type. `None` means unrecognised.
pub fn inline_category(media_type: &str) -> Option<ContentCategory> {
    let media_type = media_type.to_ascii_lowercase();
    let category = if media_type.starts_with("image/") {
        ContentCategory::Image
    } else if media_type == "application/pdf" {
        ContentCategory::Pdf
    } else if media_type.contains("msword") || media_type.contains("wordprocessingml") {
        ContentCategory::Word
    } else if media_type.contains("spreadsheetml") || media_type.contains("vnd.ms-excel") {
        ContentCategory::Spreadsheet
    } else if media_type.starts_with("video/") {
        ContentCategory::Video
    } else if media_type == "text/plain" || media_type == "text/html" {
        ContentCategory::Webpage
    } else {
        return None;
    };
    Some(category)
}

pub fn is_short_video_link(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        SHORT_VIDEO_HOSTS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    })
}

/// Image search result pages carry the real image in a `mediaurl` parameter.
pub fn unwrap_image_search(url: &Url) -> Option<Url> {
    let host = url.host_str()?.to_ascii_lowercase();
    if !(host == "bing.com" || host.ends_with(".bing.com")) {
        return None;
    }
    if !url.path().starts_with("/images/search") {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "mediaurl")
        .and_then(|(_, value)| Url::parse(&value).ok())
}

/// Lowercased extension of the last path segment, if any
pub fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn extension_category(ext: &str) -> Option<ContentCategory> {
    let category = match ext {
        "pdf" => ContentCategory::Pdf,
        "doc" | "docx" => ContentCategory::Word,
        "xls" | "xlsx" => ContentCategory::Spreadsheet,
        "mp4" | "avi" | "mov" | "mkv" => ContentCategory::Video,
        "htm" | "html" | "txt" => ContentCategory::Webpage,
        ext if IMAGE_EXTENSIONS.contains(&ext) => ContentCategory::Image,
        _ => return None,
    };
    Some(category)
}

fn declared_category(declared: &str) -> ContentCategory {
    if declared.starts_with("image/") {
        ContentCategory::Image
    } else if declared.contains("pdf") {
        ContentCategory::Pdf
    } else if declared.contains("msword") || declared.contains("wordprocessingml") {
        ContentCategory::Word
    } else if declared.contains("spreadsheetml") || declared.contains("excel") {
        ContentCategory::Spreadsheet
    } else if declared.starts_with("video/") {
        ContentCategory::Video
    } else if declared.is_empty()
        || declared.starts_with("text/")
        || declared.contains("html")
        || declared.contains("xml")
        || declared.contains("json")
    {
        ContentCategory::Webpage
    } else {
        ContentCategory::Unsupported
    }
}
