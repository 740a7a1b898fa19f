use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An absolute http(s) URL pointing at a candidate image.
///
/// Construction goes through [`ImageUrl::parse`], so holding one means the
/// string is a well-formed URL with an `http` or `https` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        let parsed = url::Url::parse(trimmed).map_err(|e| ModelError::MalformedUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            _ => return Err(ModelError::UnsupportedScheme(trimmed.to_string())),
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ModelError::MalformedUrl {
                url: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }
        // Keep the caller's spelling; the search engine hands out exact strings
        // and dedup is by string equality.
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ImageUrl {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageUrl> for String {
    fn from(url: ImageUrl) -> Self {
        url.0
    }
}

/// File extensions the pipeline writes and recognizes as images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
    Webp,
}

impl ImageExtension {
    pub const ALL: [ImageExtension; 4] = [Self::Jpg, Self::Jpeg, Self::Png, Self::Webp];

    /// Choose an extension from a response's declared `Content-Type`.
    ///
    /// Only png, jpeg and webp are recognized. Anything else, including a
    /// missing header, maps to `jpg`.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(ct) = content_type else {
            return Self::Jpg;
        };
        let ct = ct.to_ascii_lowercase();
        if ct.contains("image/png") {
            Self::Png
        } else if ct.contains("image/jpeg") {
            Self::Jpeg
        } else if ct.contains("image/webp") {
            Self::Webp
        } else {
            Self::Jpg
        }
    }

    /// Recognize an extension from a file path (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|e| e.as_str() == ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image whose bytes were fully written to `file_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedImage {
    pub source_url: ImageUrl,
    pub file_path: PathBuf,
    pub extension: ImageExtension,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_http_and_https() {
        assert!(ImageUrl::parse("https://example.com/a.jpg").is_ok());
        assert!(ImageUrl::parse("http://example.com/a.png").is_ok());
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            ImageUrl::parse("data:image/png;base64,AAAA"),
            Err(ModelError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            ImageUrl::parse("ftp://example.com/a.jpg"),
            Err(ModelError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ImageUrl::parse("not a url"),
            Err(ModelError::MalformedUrl { .. })
        ));
        assert!(ImageUrl::parse("").is_err());
    }

    #[test]
    fn test_parse_preserves_spelling() {
        let url = ImageUrl::parse(" https://Example.com/A.JPG?x=1 ").unwrap();
        assert_eq!(url.as_str(), "https://Example.com/A.JPG?x=1");
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(ImageExtension::from_content_type(Some("image/png")), ImageExtension::Png);
        assert_eq!(
            ImageExtension::from_content_type(Some("image/jpeg; charset=binary")),
            ImageExtension::Jpeg
        );
        assert_eq!(ImageExtension::from_content_type(Some("IMAGE/WEBP")), ImageExtension::Webp);
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(ImageExtension::from_content_type(None), ImageExtension::Jpg);
        assert_eq!(ImageExtension::from_content_type(Some("image/gif")), ImageExtension::Jpg);
        assert_eq!(ImageExtension::from_content_type(Some("text/html")), ImageExtension::Jpg);
    }

    #[test]
    fn test_extension_from_path() {
        assert_eq!(ImageExtension::from_path(Path::new("a/b.PNG")), Some(ImageExtension::Png));
        assert_eq!(ImageExtension::from_path(Path::new("b.jpeg")), Some(ImageExtension::Jpeg));
        assert_eq!(ImageExtension::from_path(Path::new("notes.txt")), None);
        assert_eq!(ImageExtension::from_path(Path::new("README")), None);
    }
}
