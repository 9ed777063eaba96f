//! Request body decoding: JSON, url-encoded forms and multipart forms.

use crate::error::HttpError;
use http::StatusCode;
use std::fmt;

pub const MIME_JSON: &str = "application/json";
pub const MIME_FORM: &str = "application/x-www-form-urlencoded";
pub const MIME_MULTIPART: &str = "multipart/form-data";

/// Why a request could not be bound to a value.
#[derive(Debug)]
pub enum BindError {
    /// No decoder for this content type.
    UnsupportedContentType(String),
    Json(serde_json::Error),
    Form(serde_urlencoded::de::Error),
    /// Malformed multipart body.
    Multipart(String),
    /// Body larger than `max_multipart_bytes`.
    TooLarge { limit: usize },
    /// No file part with this field name.
    MissingFile(String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::UnsupportedContentType(ct) if ct.is_empty() => {
                write!(f, "request has no content type")
            }
            BindError::UnsupportedContentType(ct) => write!(f, "unsupported content type '{ct}'"),
            BindError::Json(err) => write!(f, "invalid JSON body: {err}"),
            BindError::Form(err) => write!(f, "invalid form body: {err}"),
            BindError::Multipart(reason) => write!(f, "invalid multipart body: {reason}"),
            BindError::TooLarge { limit } => {
                write!(f, "multipart body exceeds the {limit} byte limit")
            }
            BindError::MissingFile(field) => write!(f, "no file uploaded in field '{field}'"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BindError::Json(err) => Some(err),
            BindError::Form(err) => Some(err),
            _ => None,
        }
    }
}

impl BindError {
    /// Response status for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            BindError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<BindError> for HttpError {
    fn from(err: BindError) -> Self {
        HttpError::new(err.status(), err.to_string())
    }
}

/// One uploaded file from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A parsed `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub values: Vec<(String, String)>,
    pub files: Vec<FormFile>,
}

impl MultipartForm {
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.field == name)
    }
}

/// `key=value&...` pairs, percent-decoded.
pub(crate) fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

/// Split a header value on `;`, leaving separators inside quotes alone.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Value of the `boundary` parameter of a multipart content type.
fn boundary(content_type: &str) -> Option<&str> {
    split_params(content_type).into_iter().skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = unquote(value);
        (!value.is_empty()).then_some(value)
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

pub(crate) fn parse_multipart(
    body: &[u8],
    content_type: &str,
    limit: usize,
) -> Result<MultipartForm, BindError> {
    if body.len() > limit {
        return Err(BindError::TooLarge { limit });
    }
    let boundary = boundary(content_type)
        .ok_or_else(|| BindError::Multipart("missing boundary parameter".to_string()))?;
    let delimiter = format!("--{boundary}").into_bytes();
    let separator = format!("\r\n--{boundary}").into_bytes();

    let start = find(body, &delimiter, 0)
        .ok_or_else(|| BindError::Multipart("opening boundary not found".to_string()))?;
    let mut cursor = start + delimiter.len();
    let mut form = MultipartForm::default();

    loop {
        match body.get(cursor..cursor + 2) {
            Some(b"--") => return Ok(form),
            Some(b"\r\n") => cursor += 2,
            _ => return Err(BindError::Multipart("malformed boundary line".to_string())),
        }
        let end = find(body, &separator, cursor)
            .ok_or_else(|| BindError::Multipart("unterminated part".to_string()))?;
        parse_part(&body[cursor..end], &mut form)?;
        cursor = end + separator.len();
    }
}

fn parse_part(part: &[u8], form: &mut MultipartForm) -> Result<(), BindError> {
    let split = find(part, b"\r\n\r\n", 0)
        .ok_or_else(|| BindError::Multipart("part without header block".to_string()))?;
    let head = std::str::from_utf8(&part[..split])
        .map_err(|_| BindError::Multipart("part headers are not UTF-8".to_string()))?;
    let data = &part[split + 4..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in split_params(value).into_iter().skip(1) {
                if let Some((k, v)) = param.trim().split_once('=') {
                    let v = unquote(v).to_string();
                    match k.trim() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let field = name.ok_or_else(|| BindError::Multipart("part without a name".to_string()))?;
    match filename {
        Some(filename) => form.files.push(FormFile {
            field,
            filename,
            content_type,
            data: data.to_vec(),
        }),
        None => form
            .values
            .push((field, String::from_utf8_lossy(data).into_owned())),
    }
    Ok(())
}
