//! Lookup and resolution responses
//!
//! [`CatalogLookup`] is the answer to a catalog-only query: found or not,
//! plus the catalog URI when found. [`ResourceResponse`] is the answer to
//! a full resolution: the resolved URI, the local URI actually opened, and
//! (when requested) a readable stream with its transport metadata.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use url::Url;

use crate::request::ResourceRequest;

/// Response to a catalog query. Never carries a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLookup {
    /// True if and only if a matching catalog entry was found
    pub found: bool,
    /// The URI found in the catalog
    pub uri: Option<Url>,
}

impl CatalogLookup {
    /// A miss.
    pub fn not_found() -> Self {
        Self {
            found: false,
            uri: None,
        }
    }

    /// A hit on `uri`.
    pub fn found(uri: Url) -> Self {
        Self {
            found: true,
            uri: Some(uri),
        }
    }
}

/// Response to a resource resolution.
pub struct ResourceResponse {
    /// The request this response answers
    pub request: ResourceRequest,
    /// The resolved URI; `None` when resolution failed
    pub resolved_uri: Option<Url>,
    /// The URI actually opened. Usually equals `resolved_uri`, but with
    /// jar-masking enabled it is the underlying `jar:`/`classpath:` URI
    /// while `resolved_uri` shows the request's absolute URI
    pub local_uri: Option<Url>,
    /// A readable stream over the resource, when one was requested
    pub stream: Option<Box<dyn Read + Send>>,
    /// The content type, when the transport reported one
    pub content_type: Option<String>,
    /// The content encoding, when the transport reported one
    pub encoding: Option<String>,
    /// The response status code (synthesized as 200 for non-HTTP schemes)
    pub status_code: Option<u16>,
    /// Transport headers
    pub headers: HashMap<String, Vec<String>>,
}

impl ResourceResponse {
    /// An unresolved response for `request`.
    pub fn unresolved(request: ResourceRequest) -> Self {
        Self {
            request,
            resolved_uri: None,
            local_uri: None,
            stream: None,
            content_type: None,
            encoding: None,
            status_code: None,
            headers: HashMap::new(),
        }
    }

    /// Did the resolution succeed?
    pub fn is_resolved(&self) -> bool {
        self.resolved_uri.is_some()
    }

    /// The first header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// The resource encoding: the reported encoding if any, otherwise the
    /// `charset` parameter of the content-type header.
    pub fn encoding(&self) -> Option<String> {
        if let Some(enc) = &self.encoding {
            return Some(enc.clone());
        }
        let ctype = self.content_type.clone().or_else(|| {
            self.header("content-type").map(str::to_string)
        })?;
        charset_of(&ctype)
    }

    /// The content type: the reported value if any, otherwise the
    /// content-type header.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.header("content-type"))
    }
}

impl fmt::Debug for ResourceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceResponse")
            .field("request", &self.request)
            .field("resolved_uri", &self.resolved_uri)
            .field("local_uri", &self.local_uri)
            .field("stream", &self.stream.as_ref().map(|_| "<stream>"))
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Extract the `charset` parameter from a content-type value.
pub(crate) fn charset_of(content_type: &str) -> Option<String> {
    for param in content_type.split(';').skip(1) {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                return Some(value.trim().trim_matches('"').to_string());
            }
        }
    }
    None
}
