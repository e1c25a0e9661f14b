//! Resource requests
//!
//! A [`ResourceRequest`] encapsulates everything a caller knows about the
//! resource it wants: a URI (synonymous with the system identifier), an
//! optional base URI, an optional entity name and public identifier, and
//! the RDDL nature/purpose describing what the resource will be used for.
//!
//! Requests whose nature is [`nature::EXTERNAL_ENTITY`](crate::nature) or
//! [`nature::DTD`](crate::nature) are resolved as external identifiers;
//! everything else is resolved as a URI.

use url::Url;

use crate::error::{Error, Result};
use crate::uri;
use crate::nature;

/// A request for a resource.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// The request URI (also the system identifier)
    pub uri: Option<String>,
    /// The base URI the request URI is relative to
    pub base_uri: Option<String>,
    /// The entity name, for entity and doctype requests
    pub entity_name: Option<String>,
    /// The public identifier
    pub public_id: Option<String>,
    /// The preferred encoding for protocols that can request one
    pub encoding: Option<String>,
    /// The RDDL nature of the requested resource
    pub nature: Option<String>,
    /// The RDDL purpose of the requested resource
    pub purpose: Option<String>,
    /// Follow redirects when fetching (default true)
    pub follow_redirects: bool,
    /// Open and return a readable stream (default true)
    pub open_stream: bool,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ResourceRequest {
    /// Create a request with the given nature and purpose.
    pub fn new(nature: Option<&str>, purpose: Option<&str>) -> Self {
        Self {
            uri: None,
            base_uri: None,
            entity_name: None,
            public_id: None,
            encoding: None,
            nature: nature.map(str::to_string),
            purpose: purpose.map(str::to_string),
            follow_redirects: true,
            open_stream: true,
        }
    }

    /// Set the request URI, repairing Windows paths when asked to.
    pub fn set_uri(&mut self, uri: &str, fix_windows: bool) {
        self.uri = Some(if fix_windows {
            uri::windows_path_uri(uri)
        } else {
            uri.to_string()
        });
    }

    /// Set the base URI, repairing Windows paths when asked to.
    pub fn set_base_uri(&mut self, base_uri: &str, fix_windows: bool) {
        self.base_uri = Some(if fix_windows {
            uri::windows_path_uri(base_uri)
        } else {
            base_uri.to_string()
        });
    }

    /// The system identifier of the request (synonymous with the URI).
    pub fn system_id(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Is this request resolved on the external-identifier track?
    pub fn is_entity_request(&self) -> bool {
        matches!(
            self.nature.as_deref(),
            Some(nature::EXTERNAL_ENTITY) | Some(nature::DTD)
        )
    }

    /// Combine the URI and base URI into an absolute URI.
    ///
    /// If the base URI is absolute, the request URI is resolved against it
    /// (an empty request URI yields the base itself). Otherwise the
    /// request URI is returned if it is already absolute. Returns
    /// `Ok(None)` when no absolute URI can be formed, and an error only
    /// when the combination is syntactically impossible.
    pub fn absolute_uri(&self) -> Result<Option<Url>> {
        if let Some(base) = self.base_uri.as_deref() {
            if let Ok(abs) = Url::parse(base) {
                return match self.uri.as_deref() {
                    None | Some("") => Ok(Some(abs)),
                    Some(u) => abs
                        .join(u)
                        .map(Some)
                        .map_err(|_| Error::MalformedUri(format!("{} against {}", u, base))),
                };
            }
        }

        if let Some(u) = self.uri.as_deref() {
            if let Ok(abs) = Url::parse(u) {
                return Ok(Some(abs));
            }
        }

        Ok(None)
    }
}
