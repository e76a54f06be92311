//! Outbound request bodies.
//!
//! # Responsibilities
//! - Hold an inbound body either as opaque bytes, parsed JSON, or form fields
//!   plus uploaded files
//! - Serialize it again for the upstream request, choosing the encoding from
//!   the declared content type
//!
//! # Design Decisions
//! - JSON and url-encoded bodies keep the bytes they arrived with and send
//!   them unchanged until the parsed structure is edited
//! - Multipart is used whenever files are present or the inbound request was
//!   multipart; each encoding gets a fresh boundary token
//! - Nested fields flatten with bracket notation (`pic[avatar][]`)
//! - Uploaded file content is read from disk at encode time, not at capture

use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::error::ProxyResult;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM: &str = "multipart/form-data";
const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// A form field value; lists and maps nest.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    List(Vec<FormValue>),
    Map(Vec<(String, FormValue)>),
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

/// A file taking part in a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Client-visible file name.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Where the content currently lives on disk.
    pub path: PathBuf,
    /// Size reported by the client, if any.
    pub size: Option<u64>,
}

impl UploadedFile {
    /// Describe a local file using its basename.
    pub fn local(path: impl AsRef<Path>, content_type: Option<&str>) -> Self {
        let path = path.as_ref();
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: content_type.unwrap_or(DEFAULT_FILE_TYPE).to_string(),
            path: path.to_path_buf(),
            size: None,
        }
    }
}

/// Structured form data with optional file parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormBody {
    pub fields: Vec<(String, FormValue)>,
    pub files: Vec<(String, UploadedFile)>,
    /// The inbound request declared `multipart/form-data`.
    pub multipart: bool,
    /// Url-encoded bytes as received.
    pub raw: Option<Bytes>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn add_file(&mut self, input: impl Into<String>, file: UploadedFile) -> &mut Self {
        self.files.push((input.into(), file));
        self
    }

    pub fn add_local_file(
        &mut self,
        input: impl Into<String>,
        path: impl AsRef<Path>,
        content_type: Option<&str>,
    ) -> &mut Self {
        self.add_file(input, UploadedFile::local(path, content_type))
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart || !self.files.is_empty()
    }

    /// Scalar fields as `(flattened-name, value)` pairs.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.fields {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    pub fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.flatten())
            .finish()
    }

    /// Encode as multipart using `boundary`. File content is read from disk.
    pub async fn to_multipart(&self, boundary: &str) -> ProxyResult<Bytes> {
        let mut buf = BytesMut::new();
        for (name, value) in self.flatten() {
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    quote_param(&name)
                )
                .as_bytes(),
            );
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        for (input, file) in &self.files {
            let content = tokio::fs::read(&file.path).await?;
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    quote_param(input),
                    quote_param(&file.name)
                )
                .as_bytes(),
            );
            let content_type: String = file
                .content_type
                .chars()
                .filter(|c| !matches!(c, '\r' | '\n'))
                .collect();
            buf.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            buf.put_slice(&content);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(buf.freeze())
    }

    /// The received bytes, while the fields still decode from them.
    fn unchanged_raw(&self) -> Option<&Bytes> {
        self.raw
            .as_ref()
            .filter(|raw| self.files.is_empty() && parse_urlencoded(raw) == self.fields)
    }
}

/// Escape a `Content-Disposition` parameter the way browsers do for form
/// submissions.
fn quote_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn parse_urlencoded(raw: &[u8]) -> Vec<(String, FormValue)> {
    url::form_urlencoded::parse(raw)
        .into_owned()
        .map(|(k, v)| (k, FormValue::Text(v)))
        .collect()
}

fn flatten_into(key: String, value: &FormValue, out: &mut Vec<(String, String)>) {
    match value {
        FormValue::Text(text) => out.push((key, text.clone())),
        FormValue::List(items) => {
            for item in items {
                flatten_into(format!("{key}[]"), item, out);
            }
        }
        FormValue::Map(entries) => {
            for (sub, item) in entries {
                flatten_into(format!("{key}[{sub}]"), item, out);
            }
        }
    }
}

/// Fresh boundary token; unique per call.
pub fn new_boundary() -> String {
    format!("----RequestProxy{}", uuid::Uuid::new_v4().simple())
}

/// A request body as carried through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Opaque bytes, forwarded unchanged.
    Raw(Bytes),
    /// A JSON document as received plus its parsed value. `raw` is sent
    /// while it still parses to `value`; otherwise `value` is serialized
    /// compactly.
    Json { raw: Bytes, value: Value },
    /// Form fields and files.
    Form(FormBody),
}

/// Serialized body plus the content type it must travel with, when the
/// encoding dictates one.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl RequestBody {
    /// JSON body built from a value; serialized at encode time.
    pub fn json(value: Value) -> Self {
        RequestBody::Json {
            raw: Bytes::new(),
            value,
        }
    }

    /// Build from opaque bytes, parsing structure the declared content type
    /// allows. Multipart bytes stay opaque; parsed multipart fields must be
    /// supplied by the caller as a [`FormBody`].
    pub fn from_content(content_type: &str, raw: Bytes) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("json") {
            if let Ok(value) = serde_json::from_slice::<Value>(&raw) {
                return RequestBody::Json { raw, value };
            }
        } else if ct.contains(FORM_URLENCODED) {
            return RequestBody::Form(FormBody {
                fields: parse_urlencoded(&raw),
                files: Vec::new(),
                multipart: false,
                raw: Some(raw),
            });
        }
        RequestBody::Raw(raw)
    }

    /// Serialize for sending.
    ///
    /// `declared` is the request's current `Content-Type`; it chooses between
    /// url-encoded and multipart for form bodies.
    pub async fn encode(&self, declared: Option<&str>) -> ProxyResult<EncodedBody> {
        match self {
            RequestBody::Raw(bytes) => Ok(EncodedBody {
                bytes: bytes.clone(),
                content_type: None,
            }),
            RequestBody::Json { raw, value } => {
                let unchanged = serde_json::from_slice::<Value>(raw).is_ok_and(|parsed| parsed == *value);
                let bytes = if unchanged {
                    raw.clone()
                } else {
                    Bytes::from(serde_json::to_vec(value)?)
                };
                Ok(EncodedBody {
                    bytes,
                    content_type: None,
                })
            }
            RequestBody::Form(form) => {
                let declared_multipart = declared
                    .map(|ct| ct.to_ascii_lowercase().contains(MULTIPART_FORM))
                    .unwrap_or(false);
                if form.is_multipart() || declared_multipart {
                    let boundary = new_boundary();
                    let bytes = form.to_multipart(&boundary).await?;
                    Ok(EncodedBody {
                        bytes,
                        content_type: Some(format!("{MULTIPART_FORM}; boundary={boundary}")),
                    })
                } else {
                    let bytes = match form.unchanged_raw() {
                        Some(raw) => raw.clone(),
                        None => Bytes::from(form.to_urlencoded()),
                    };
                    Ok(EncodedBody {
                        bytes,
                        content_type: Some(FORM_URLENCODED.to_string()),
                    })
                }
            }
        }
    }
}
