//! Resource fetching
//!
//! Opens a byte stream for a resolved URI. Each scheme has its own
//! backend: `data:` is decoded in place, `classpath:` (and `jar:`) go
//! through the configured [`ResourceLoader`], `file:` opens the
//! filesystem, and `http(s):` uses a blocking HTTP client with redirects
//! followed manually so the hop limit and loop detection live here.
//!
//! Scheme allow-lists are enforced before anything is opened, and again on
//! every redirect hop.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use log::{debug, warn};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::response::charset_of;
use crate::uri;

/// Which scheme allow-list governs a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTrack {
    /// External-identifier resolution (`access_external_entity`)
    Entity,
    /// URI resolution (`access_external_document`)
    Document,
}

/// An opened resource stream plus transport metadata.
pub struct Fetched {
    /// The URI the stream was actually opened from, after redirects
    pub uri: Url,
    /// The readable stream
    pub stream: Box<dyn Read + Send>,
    /// The content type, when the transport reported or guessed one
    pub content_type: Option<String>,
    /// The content encoding, when known
    pub encoding: Option<String>,
    /// The status code; non-HTTP schemes synthesize 200
    pub status_code: Option<u16>,
    /// Transport headers (HTTP only)
    pub headers: HashMap<String, Vec<String>>,
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("uri", &self.uri)
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .finish()
    }
}

/// A resource opened by a [`ResourceLoader`].
pub struct LoadedResource {
    /// The readable stream
    pub stream: Box<dyn Read + Send>,
    /// The concrete URL backing the resource, when known
    pub location: Option<Url>,
}

/// Opens abstract resource paths for `classpath:` (and, optionally,
/// `jar:`) URIs.
///
/// This is the seam between resolution and whatever storage backs those
/// paths: the built-in [`DirectoryLoader`] serves them from root
/// directories on disk; embedders with archive- or memory-backed
/// resources supply their own implementation.
pub trait ResourceLoader: Send + Sync {
    /// Open a resource by path.
    fn open(&self, path: &str) -> Result<LoadedResource>;

    /// Open an archive-backed `jar:` URI. The default implementation
    /// reports the scheme as unsupported.
    fn open_jar(&self, uri: &Url) -> Result<LoadedResource> {
        Err(Error::Unsupported(uri.to_string()))
    }
}

/// Serves resource paths from an ordered list of root directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    roots: Vec<PathBuf>,
}

impl DirectoryLoader {
    /// Create a loader over the given root directories.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Append a root directory.
    pub fn push_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }
}

impl ResourceLoader for DirectoryLoader {
    fn open(&self, path: &str) -> Result<LoadedResource> {
        for root in &self.roots {
            let candidate = root.join(path);
            if candidate.is_file() {
                let stream = File::open(&candidate)?;
                let location = Url::from_file_path(&candidate).ok();
                return Ok(LoadedResource {
                    stream: Box::new(stream),
                    location,
                });
            }
        }
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("resource not found: {}", path),
        )))
    }
}

/// Open `uri`, enforcing the allow-list for `track`.
pub fn open(
    config: &ResolverConfig,
    uri: &Url,
    track: AccessTrack,
    follow_redirects: bool,
) -> Result<Fetched> {
    let allowed = match track {
        AccessTrack::Entity => &config.access_external_entity,
        AccessTrack::Document => &config.access_external_document,
    };
    open_with_allowed(config, uri, Some(allowed), follow_redirects)
}

/// Open `uri` without allow-list enforcement. Catalog documents are
/// configuration, not request payloads, so their retrieval is not subject
/// to the request allow-lists.
pub(crate) fn open_unrestricted(
    config: &ResolverConfig,
    uri: &Url,
    follow_redirects: bool,
) -> Result<Fetched> {
    open_with_allowed(config, uri, None, follow_redirects)
}

fn open_with_allowed(
    config: &ResolverConfig,
    uri: &Url,
    allowed: Option<&[String]>,
    follow_redirects: bool,
) -> Result<Fetched> {
    if let Some(allowed) = allowed {
        if uri::forbid_access(allowed, uri.as_str(), config.merge_https) {
            warn!("access denied: {}", uri);
            return Err(Error::AccessDenied(uri.to_string()));
        }
    }

    match uri.scheme() {
        "data" => open_data(uri),
        "classpath" => open_classpath(config, uri),
        "file" => open_file(uri),
        "jar" => {
            let resource = config.resource_loader.open_jar(uri)?;
            let location = resource.location.unwrap_or_else(|| uri.clone());
            Ok(Fetched {
                uri: location,
                stream: resource.stream,
                content_type: None,
                encoding: None,
                status_code: Some(200),
                headers: HashMap::new(),
            })
        }
        "http" | "https" => open_http(config, uri, allowed, follow_redirects),
        other => Err(Error::Unsupported(other.to_string())),
    }
}

/// Decode a `data:` URI (RFC 2397).
///
/// The raw URI string is split by hand; generic URI accessors percent
/// decode the body prematurely.
fn open_data(uri: &Url) -> Result<Fetched> {
    let raw = uri.as_str();
    let spec = &raw["data:".len()..];
    let comma = spec.find(',').ok_or_else(|| {
        Error::MalformedUri(format!("data URI without comma separator: {}", raw))
    })?;
    let mediatype = &spec[..comma];
    let body = &spec[comma + 1..];

    let (bytes, content_type) = if let Some(mediatype) = mediatype.strip_suffix(";base64") {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| Error::MalformedUri(format!("bad base64 data: {}", e)))?;
        (decoded, mediatype)
    } else {
        let decoded: Vec<u8> = percent_decode_str(body).collect();
        let text = match charset_of(mediatype) {
            Some(cs) if !cs.eq_ignore_ascii_case("utf-8") => {
                let enc = encoding_rs::Encoding::for_label(cs.as_bytes())
                    .ok_or_else(|| Error::Unsupported(format!("charset {}", cs)))?;
                let (text, _, _) = enc.decode(&decoded);
                text.into_owned()
            }
            _ => String::from_utf8_lossy(&decoded).into_owned(),
        };
        (text.into_bytes(), mediatype)
    };

    Ok(Fetched {
        uri: uri.clone(),
        stream: Box::new(Cursor::new(bytes)),
        content_type: if content_type.is_empty() {
            None
        } else {
            Some(content_type.to_string())
        },
        encoding: None,
        status_code: Some(200),
        headers: HashMap::new(),
    })
}

fn open_classpath(config: &ResolverConfig, uri: &Url) -> Result<Fetched> {
    let raw = uri.as_str();
    let mut path = &raw["classpath:".len()..];
    if let Some(stripped) = path.strip_prefix('/') {
        path = stripped;
    }
    let resource = config.resource_loader.open(path)?;
    let location = resource.location.unwrap_or_else(|| uri.clone());
    Ok(Fetched {
        uri: location,
        stream: resource.stream,
        content_type: guess_content_type(path),
        encoding: None,
        status_code: Some(200),
        headers: HashMap::new(),
    })
}

fn open_file(uri: &Url) -> Result<Fetched> {
    let path = uri
        .to_file_path()
        .map_err(|_| Error::MalformedUri(uri.to_string()))?;
    let stream = File::open(&path)?;
    Ok(Fetched {
        uri: uri.clone(),
        stream: Box::new(stream),
        content_type: guess_content_type(&path.to_string_lossy()),
        encoding: None,
        status_code: Some(200),
        headers: HashMap::new(),
    })
}

static SHARED_CLIENT: Lazy<Option<Client>> =
    Lazy::new(|| Client::builder().redirect(Policy::none()).build().ok());

fn http_client(timeout: Option<Duration>) -> Result<Client> {
    match (timeout, SHARED_CLIENT.as_ref()) {
        (None, Some(client)) => Ok(client.clone()),
        _ => {
            let mut builder = Client::builder().redirect(Policy::none());
            if let Some(t) = timeout {
                builder = builder.timeout(t);
            }
            Ok(builder.build()?)
        }
    }
}

fn open_http(
    config: &ResolverConfig,
    uri: &Url,
    allowed: Option<&[String]>,
    follow_redirects: bool,
) -> Result<Fetched> {
    let client = http_client(config.timeout)?;
    let mut seen: HashSet<Url> = HashSet::new();
    let mut current = uri.clone();
    let mut hops = config.limits.max_redirects;

    loop {
        if let Some(allowed) = allowed {
            if uri::forbid_access(allowed, current.as_str(), config.merge_https) {
                warn!("access denied: {}", current);
                return Err(Error::AccessDenied(current.to_string()));
            }
        }
        if !seen.insert(current.clone()) {
            return Err(Error::RedirectLoop(current.to_string()));
        }
        if hops == 0 {
            return Err(Error::TooManyRedirects(current.to_string()));
        }
        hops -= 1;

        let response = client.get(current.clone()).send()?;
        let status = response.status();

        if status.is_redirection() && follow_redirects {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("redirect without location from {}", current),
                    ))
                })?;
            debug!("redirect {} -> {}", current, location);
            current = current
                .join(location)
                .map_err(|_| Error::MalformedUri(location.to_string()))?;
            continue;
        }

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(v.to_string());
            }
        }
        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, v)| v.first())
            .cloned();
        let encoding = content_type.as_deref().and_then(charset_of);
        let final_uri = response.url().clone();

        return Ok(Fetched {
            uri: final_uri,
            status_code: Some(status.as_u16()),
            stream: Box::new(response),
            content_type,
            encoding,
            headers,
        });
    }
}

/// Drain a fetched stream into memory, erroring past `max` bytes.
pub(crate) fn read_to_vec(fetched: Fetched, max: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut limited = fetched.stream.take(max as u64 + 1);
    limited.read_to_end(&mut buf)?;
    if buf.len() > max {
        return Err(Error::LimitExceeded(format!(
            "document at {} exceeds {} bytes",
            fetched.uri, max
        )));
    }
    Ok(buf)
}

/// Retrieve the bytes of a catalog document.
pub(crate) fn read_catalog_bytes(config: &ResolverConfig, uri: &Url) -> Result<Vec<u8>> {
    let fetched = open_unrestricted(config, uri, true)?;
    read_to_vec(fetched, config.limits.max_catalog_size)
}

/// Guess a content type from a path's extension, for schemes that have no
/// transport metadata.
pub(crate) fn guess_content_type(path: &str) -> Option<String> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    let ctype = match ext.as_str() {
        "html" | "htm" => "text/html",
        "xml" | "xsd" | "rng" | "xsl" | "xslt" => "application/xml",
        "dtd" | "ent" | "mod" => "application/xml-dtd",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => return None,
    };
    Some(ctype.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_all(mut fetched: Fetched) -> Vec<u8> {
        let mut buf = Vec::new();
        fetched.stream.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_data_uri_base64() {
        let config = ResolverConfig::default();
        let uri = Url::parse(
            "data:application/xml;base64,PGRvYz5JIHdhcyBhIGRhdGEgVVJJPC9kb2M+Cg==",
        )
        .unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(fetched.status_code, Some(200));
        assert_eq!(fetched.content_type.as_deref(), Some("application/xml"));
        assert_eq!(read_all(fetched), b"<doc>I was a data URI</doc>\n");
    }

    #[test]
    fn test_data_uri_percent_encoded() {
        let config = ResolverConfig::default();
        let uri = Url::parse("data:text/plain,Hello%2C%20World%21").unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(fetched.content_type.as_deref(), Some("text/plain"));
        assert_eq!(read_all(fetched), b"Hello, World!");
    }

    #[test]
    fn test_data_uri_charset() {
        let config = ResolverConfig::default();
        // %E9 is é in ISO-8859-1; the stream is re-encoded as UTF-8
        let uri = Url::parse("data:text/plain;charset=iso-8859-1,caf%E9").unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(read_all(fetched), "café".as_bytes());
    }

    #[test]
    fn test_data_uri_empty_mediatype() {
        let config = ResolverConfig::default();
        let uri = Url::parse("data:,plain").unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(fetched.content_type, None);
        assert_eq!(read_all(fetched), b"plain");
    }

    #[test]
    fn test_data_uri_missing_comma() {
        let config = ResolverConfig::default();
        let uri = Url::parse("data:application/xml").unwrap();
        assert!(matches!(
            open(&config, &uri, AccessTrack::Document, true),
            Err(Error::MalformedUri(_))
        ));
    }

    #[test]
    fn test_file_fetch_guesses_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.html");
        let mut f = File::create(&path).unwrap();
        write!(f, "<html/>").unwrap();

        let config = ResolverConfig::default();
        let uri = Url::from_file_path(&path).unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(fetched.status_code, Some(200));
        assert_eq!(fetched.content_type.as_deref(), Some("text/html"));
        assert_eq!(read_all(fetched), b"<html/>");
    }

    #[test]
    fn test_classpath_fetch() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("schemas")).unwrap();
        std::fs::write(dir.path().join("schemas/x.xsd"), b"<schema/>").unwrap();

        let mut config = ResolverConfig::default();
        config.resource_loader = Arc::new(DirectoryLoader::new(vec![dir.path().to_path_buf()]));

        // with and without the leading slash
        for raw in ["classpath:schemas/x.xsd", "classpath:/schemas/x.xsd"] {
            let uri = Url::parse(raw).unwrap();
            let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
            assert_eq!(fetched.uri.scheme(), "file");
            assert_eq!(fetched.content_type.as_deref(), Some("application/xml"));
            assert_eq!(read_all(fetched), b"<schema/>");
        }
    }

    #[test]
    fn test_classpath_not_found() {
        let config = ResolverConfig::default();
        let uri = Url::parse("classpath:absent.xsd").unwrap();
        assert!(matches!(
            open(&config, &uri, AccessTrack::Document, true),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_access_denied() {
        let mut config = ResolverConfig::default();
        config.access_external_document = vec!["file".to_string()];
        let uri = Url::parse("http://example.com/x").unwrap();
        assert!(matches!(
            open(&config, &uri, AccessTrack::Document, true),
            Err(Error::AccessDenied(_))
        ));

        // the entity list is separate
        config.access_external_entity = vec!["all".to_string()];
        let uri = Url::parse("data:,x").unwrap();
        assert!(open(&config, &uri, AccessTrack::Entity, true).is_ok());
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = ResolverConfig::default();
        let uri = Url::parse("gopher://example.com/x").unwrap();
        assert!(matches!(
            open(&config, &uri, AccessTrack::Document, true),
            Err(Error::Unsupported(_))
        ));

        // jar: has no built-in backend
        let uri = Url::parse("jar:file:///x.jar!/y.xml").unwrap();
        assert!(matches!(
            open(&config, &uri, AccessTrack::Document, true),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a/b.html").as_deref(), Some("text/html"));
        assert_eq!(
            guess_content_type("x.DTD").as_deref(),
            Some("application/xml-dtd")
        );
        assert_eq!(guess_content_type("noext"), None);
    }

    #[test]
    fn test_read_to_vec_limit() {
        let config = ResolverConfig::default();
        let uri = Url::parse("data:,0123456789").unwrap();
        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert!(matches!(
            read_to_vec(fetched, 5),
            Err(Error::LimitExceeded(_))
        ));

        let fetched = open(&config, &uri, AccessTrack::Document, true).unwrap();
        assert_eq!(read_to_vec(fetched, 10).unwrap(), b"0123456789");
    }
}
