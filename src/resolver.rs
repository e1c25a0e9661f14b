//! Resource resolution
//!
//! [`Resolver`] ties the pieces together: it builds requests, looks them
//! up in the catalogs, and retrieves the resolved resource. Namespace
//! requests with a nature and purpose optionally go through a RDDL
//! post-pass: the resolved document is fetched, scanned for a matching
//! `rddl:resource`, and the extracted href — itself catalog-resolved — is
//! used instead.
//!
//! A catalog miss never raises. With `always_resolve` the request's
//! absolute URI is fetched directly; otherwise an unresolved response is
//! returned. I/O and URI errors degrade to unresolved responses unless
//! `throw_uri_exceptions` is set; access denials always degrade.

use std::sync::Arc;

use log::{debug, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::fetch::{self, AccessTrack};
use crate::manager::CatalogManager;
use crate::nature;
use crate::rddl;
use crate::request::ResourceRequest;
use crate::response::{CatalogLookup, ResourceResponse};
use crate::uri;

/// The main entry point: catalog lookup plus resource retrieval.
pub struct Resolver {
    config: Arc<ResolverConfig>,
    manager: Arc<CatalogManager>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl Resolver {
    /// Create a resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Self {
        let config = Arc::new(config);
        Self {
            manager: Arc::new(CatalogManager::new(config.clone())),
            config,
        }
    }

    /// The resolver's configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The underlying catalog manager.
    pub fn manager(&self) -> &CatalogManager {
        &self.manager
    }

    fn fix_windows(&self) -> bool {
        uri::is_windows() && self.config.fix_windows_system_identifiers
    }

    /// Create a request for a URI.
    pub fn request(&self, request_uri: &str) -> ResourceRequest {
        let mut req = ResourceRequest::new(None, None);
        req.set_uri(request_uri, self.fix_windows());
        req
    }

    /// Create a request for a URI with a base URI.
    pub fn request_with_base(&self, request_uri: &str, base_uri: Option<&str>) -> ResourceRequest {
        let mut req = self.request(request_uri);
        if let Some(base) = base_uri {
            req.set_base_uri(base, self.fix_windows());
        }
        req
    }

    /// Create a namespace request with a nature and purpose.
    pub fn namespace_request(
        &self,
        request_uri: &str,
        base_uri: Option<&str>,
        nature: Option<&str>,
        purpose: Option<&str>,
    ) -> ResourceRequest {
        let mut req = ResourceRequest::new(nature, purpose);
        req.set_uri(request_uri, self.fix_windows());
        if let Some(base) = base_uri {
            req.set_base_uri(base, self.fix_windows());
        }
        req
    }

    /// Create an external-identifier request.
    pub fn entity_request(
        &self,
        name: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_uri: Option<&str>,
    ) -> ResourceRequest {
        let mut req = ResourceRequest::new(Some(nature::EXTERNAL_ENTITY), None);
        req.entity_name = name.map(str::to_string);
        req.public_id = public_id.map(str::to_string);
        if let Some(system) = system_id {
            req.set_uri(system, self.fix_windows());
        }
        if let Some(base) = base_uri {
            req.set_base_uri(base, self.fix_windows());
        }
        req
    }

    /// Look a request up in the catalogs. No resource is fetched.
    ///
    /// Errors are only returned when `throw_uri_exceptions` is set;
    /// otherwise unusable URIs simply produce a miss.
    pub fn lookup(&self, request: &ResourceRequest) -> Result<CatalogLookup> {
        let name = request.entity_name.as_deref();
        let public = request.public_id.as_deref();
        let system = request.uri.as_deref();
        let entity_track = request.is_entity_request();

        if name.is_none() && public.is_none() && system.is_none() && request.base_uri.is_none() {
            debug!("lookup: empty request");
            return Ok(CatalogLookup::not_found());
        }

        // doctype requests carry a name and nothing else
        if request.nature.as_deref() == Some(nature::DTD)
            && public.is_none()
            && system.is_none()
        {
            if let Some(name) = name {
                debug!("lookup doctype: {}", name);
                return Ok(match self.manager.lookup_doctype(name) {
                    Some(u) => CatalogLookup::found(u),
                    None => CatalogLookup::not_found(),
                });
            }
        }

        let mut system_uri: Option<Url> = None;
        if let Some(system) = system {
            if let Ok(u) = Url::parse(system) {
                let allowed = if entity_track {
                    &self.config.access_external_entity
                } else {
                    &self.config.access_external_document
                };
                if uri::forbid_access(allowed, system, self.config.merge_https) {
                    warn!("lookup (access denied): {}", system);
                    return Ok(CatalogLookup::not_found());
                }
                system_uri = Some(u);
            }
        }

        debug!(
            "lookup: {:?} (base: {:?}, public: {:?}, entity track: {})",
            system, request.base_uri, public, entity_track
        );

        let resolved = if entity_track {
            let mut r = self.manager.lookup_entity(name, system, public);
            if r.is_none() && self.config.uri_for_system {
                if let Some(system) = system {
                    r = self.manager.lookup_uri(system);
                }
            }
            r
        } else {
            match system {
                None => return Ok(CatalogLookup::not_found()),
                Some(u) => self.manager.lookup_namespace(
                    u,
                    request.nature.as_deref(),
                    request.purpose.as_deref(),
                ),
            }
        };
        if let Some(u) = resolved {
            return Ok(CatalogLookup::found(u));
        }

        // retry with the request URI absolutized against the base URI
        let absolute = match system_uri {
            Some(u) => Some(u),
            None => match request.absolute_uri() {
                Ok(a) => a,
                Err(e) => {
                    if self.config.throw_uri_exceptions {
                        return Err(e);
                    }
                    warn!("cannot absolutize request URI: {}", e);
                    None
                }
            },
        };
        if let Some(abs) = absolute {
            let abs_str = abs.as_str();
            if Some(abs_str) != system {
                let resolved = if entity_track {
                    let mut r = self.manager.lookup_entity(name, Some(abs_str), public);
                    if r.is_none() && self.config.uri_for_system {
                        r = self.manager.lookup_uri(abs_str);
                    }
                    r
                } else {
                    self.manager.lookup_namespace(
                        abs_str,
                        request.nature.as_deref(),
                        request.purpose.as_deref(),
                    )
                };
                if let Some(u) = resolved {
                    return Ok(CatalogLookup::found(u));
                }
            }
        }

        Ok(CatalogLookup::not_found())
    }

    /// Resolve a request: look it up, then retrieve the resource.
    pub fn resolve(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        let mut lookup = self.lookup(request)?;

        if self.config.parse_rddl && request.nature.is_some() && request.purpose.is_some() {
            let target = if lookup.found {
                lookup.uri.clone()
            } else {
                request.absolute_uri().unwrap_or_default()
            };
            if let Some(target) = target {
                if let Some(better) = self.rddl_lookup(request, &target) {
                    lookup = better;
                }
            }
        }

        if !lookup.found {
            if self.config.always_resolve {
                return match request.absolute_uri() {
                    Ok(Some(abs)) => self.open_resource(request, abs),
                    Ok(None) => Ok(ResourceResponse::unresolved(request.clone())),
                    Err(e) => {
                        if self.config.throw_uri_exceptions {
                            return Err(e);
                        }
                        warn!("resolution failed: {}", e);
                        Ok(ResourceResponse::unresolved(request.clone()))
                    }
                };
            }
            return Ok(ResourceResponse::unresolved(request.clone()));
        }

        match lookup.uri {
            Some(target) => self.open_resource(request, target),
            None => Ok(ResourceResponse::unresolved(request.clone())),
        }
    }

    fn open_resource(&self, request: &ResourceRequest, target: Url) -> Result<ResourceResponse> {
        let track = if request.is_entity_request() {
            AccessTrack::Entity
        } else {
            AccessTrack::Document
        };
        let masked = self.config.mask_jar_uris && matches!(target.scheme(), "jar" | "classpath");

        if !request.open_stream {
            let mut resp = ResourceResponse::unresolved(request.clone());
            let shown = if masked {
                self.masked_uri(request).unwrap_or_else(|| target.clone())
            } else {
                target.clone()
            };
            resp.resolved_uri = Some(shown);
            resp.local_uri = Some(target);
            return Ok(resp);
        }

        match fetch::open(&self.config, &target, track, request.follow_redirects) {
            Ok(fetched) => {
                let mut resp = ResourceResponse::unresolved(request.clone());
                if masked {
                    resp.resolved_uri =
                        Some(self.masked_uri(request).unwrap_or_else(|| target.clone()));
                    resp.local_uri = Some(target);
                } else {
                    resp.resolved_uri = Some(fetched.uri.clone());
                    resp.local_uri = Some(fetched.uri);
                }
                resp.content_type = fetched.content_type;
                resp.encoding = fetched.encoding.or_else(|| request.encoding.clone());
                resp.status_code = fetched.status_code;
                resp.headers = fetched.headers;
                resp.stream = Some(fetched.stream);
                Ok(resp)
            }
            Err(Error::AccessDenied(denied)) => {
                warn!("access denied: {}", denied);
                Ok(ResourceResponse::unresolved(request.clone()))
            }
            Err(e) => {
                if self.config.throw_uri_exceptions {
                    return Err(e);
                }
                warn!("failed to open {}: {}", target, e);
                Ok(ResourceResponse::unresolved(request.clone()))
            }
        }
    }

    /// The URI a masked response should show: the request's absolute URI.
    fn masked_uri(&self, request: &ResourceRequest) -> Option<Url> {
        request.absolute_uri().ok().flatten()
    }

    /// Run the RDDL post-pass against a resolved document. Returns a
    /// replacement lookup when a matching resource is found.
    fn rddl_lookup(&self, request: &ResourceRequest, resolved: &Url) -> Option<CatalogLookup> {
        let nature = request.nature.as_deref()?;
        let purpose = request.purpose.as_deref()?;

        let href = self.check_rddl(resolved, nature, purpose)?;

        // the extracted href is itself subject to catalog resolution
        let mut rddl_request = ResourceRequest::new(None, None);
        rddl_request.uri = Some(href.to_string());
        rddl_request.base_uri = Some(resolved.to_string());
        match self.lookup(&rddl_request) {
            Ok(resp) if resp.found => {
                debug!("RDDL {}: {:?}", resolved, resp.uri);
                Some(resp)
            }
            _ => {
                debug!("RDDL {}: {}", resolved, href);
                Some(CatalogLookup::found(href))
            }
        }
    }

    /// Fetch `target` and, if it is an HTML document, scan it for a RDDL
    /// resource. Failures are non-fatal.
    fn check_rddl(&self, target: &Url, nature: &str, purpose: &str) -> Option<Url> {
        let result = (|| -> Result<Option<Url>> {
            let fetched = fetch::open(&self.config, target, AccessTrack::Document, true)?;
            let content_type = fetched.content_type.clone().unwrap_or_default();
            if !(content_type.starts_with("text/html")
                || content_type.starts_with("application/html+xml"))
            {
                return Ok(None);
            }
            let doc_uri = fetched.uri.clone();
            let bytes = fetch::read_to_vec(fetched, self.config.limits.max_document_size)?;
            rddl::find_resource(&bytes, &doc_uri, nature, purpose)
        })();

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!("RDDL scan failed: {}: {}", target, e);
                None
            }
        }
    }
}
