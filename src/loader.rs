//! Catalog loading
//!
//! Parses OASIS XML Catalog documents (plus the TR9401 extension
//! vocabulary) into [`Catalog`] entry lists. Parsing is streaming: a
//! [`CatalogBuilder`] consumes start/end element events and maintains the
//! `xml:base` and enclosing-`prefer` stacks, so callers with their own XML
//! event source can drive the same state machine that the file-backed
//! [`CatalogLoader`] uses.
//!
//! The tolerant loader (the default) drops malformed entries with a
//! warning and ignores foreign elements entirely. The strict loader
//! rejects the document on the first structural violation.

use std::fs;
use std::path::Path;

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use url::Url;

use crate::entry::{Catalog, Entry, EntryData, Prefer};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::uri;
use crate::{CATALOG_NAMESPACE, TR9401_NAMESPACE};

/// Streaming catalog parser state machine.
///
/// Feed it `start_element`/`end_element` events; attribute names are the
/// document names (`systemId`, `rewritePrefix`, …) with `xml:base` and
/// `id` passed through under those names. Every start must be balanced by
/// an end. Call [`CatalogBuilder::finish`] to obtain the catalog.
#[derive(Debug)]
pub struct CatalogBuilder {
    strict: bool,
    base_stack: Vec<Url>,
    prefer_stack: Vec<Prefer>,
    in_catalog: bool,
    depth: usize,
    catalog: Catalog,
}

fn attr_value<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn required<'a>(attrs: &'a [(String, String)], name: &str, element: &str) -> Result<&'a str> {
    attr_value(attrs, name).ok_or_else(|| {
        Error::CatalogParse(format!(
            "<{}> missing required attribute {:?}",
            element, name
        ))
    })
}

impl CatalogBuilder {
    /// Create a builder for a catalog with the given base URI and default
    /// `prefer` setting.
    pub fn new(base_uri: Url, prefer: Prefer, strict: bool) -> Self {
        let catalog = Catalog::new(base_uri.clone(), prefer);
        Self {
            strict,
            base_stack: vec![base_uri],
            prefer_stack: vec![prefer],
            in_catalog: false,
            depth: 0,
            catalog,
        }
    }

    fn current_base(&self) -> Url {
        self.base_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.catalog.base_uri.clone())
    }

    /// Process a start-element event.
    ///
    /// `namespace` is the element's namespace URI and `local` its local
    /// name. In strict mode the first violation is returned as
    /// [`Error::CatalogParse`]; the tolerant builder only fails on events
    /// it cannot recover from.
    pub fn start_element(
        &mut self,
        namespace: Option<&str>,
        local: &str,
        attrs: &[(String, String)],
    ) -> Result<()> {
        self.depth += 1;

        let mut base = self.current_base();
        if let Some(xb) = attr_value(attrs, "xml:base") {
            match uri::resolve(&base, xb) {
                Ok(b) => base = b,
                Err(e) => {
                    if self.strict {
                        return Err(e);
                    }
                    warn!("ignoring unresolvable xml:base {:?}: {}", xb, e);
                }
            }
        }
        self.base_stack.push(base.clone());

        let in_catalog_ns = namespace == Some(CATALOG_NAMESPACE);
        let is_container = in_catalog_ns && (local == "catalog" || local == "group");

        let mut prefer = *self.prefer_stack.last().unwrap_or(&self.catalog.prefer);
        if is_container {
            if let Some(p) = attr_value(attrs, "prefer") {
                match Prefer::from_attr(p) {
                    Some(v) => prefer = v,
                    None => {
                        if self.strict {
                            return Err(Error::CatalogParse(format!(
                                "invalid prefer value {:?}",
                                p
                            )));
                        }
                        warn!("ignoring invalid prefer value {:?}", p);
                    }
                }
            }
        }
        self.prefer_stack.push(prefer);

        if self.depth == 1 {
            if in_catalog_ns && local == "catalog" {
                self.in_catalog = true;
                self.catalog.prefer = prefer;
            } else if self.strict {
                return Err(Error::CatalogParse(format!(
                    "root element <{}> is not an OASIS catalog",
                    local
                )));
            }
            return Ok(());
        }

        if !self.in_catalog {
            return Ok(());
        }

        if is_container {
            if local == "catalog" && self.strict {
                return Err(Error::CatalogParse("nested <catalog> element".to_string()));
            }
            return Ok(());
        }

        let built = if in_catalog_ns {
            build_catalog_entry(local, attrs, &base, prefer)
        } else if namespace == Some(TR9401_NAMESPACE) {
            build_tr9401_entry(local, attrs, &base)
        } else {
            // foreign element, never meaningful
            return Ok(());
        };

        match built {
            Ok(Some(data)) => {
                self.catalog.push(Entry {
                    id: attr_value(attrs, "id").map(str::to_string),
                    base_uri: base,
                    data,
                });
            }
            Ok(None) => {
                if self.strict {
                    return Err(Error::CatalogParse(format!(
                        "unknown catalog element <{}>",
                        local
                    )));
                }
            }
            Err(e) => {
                if self.strict {
                    return Err(e);
                }
                warn!("dropping malformed catalog entry <{}>: {}", local, e);
            }
        }

        Ok(())
    }

    /// Process an end-element event.
    pub fn end_element(&mut self) -> Result<()> {
        if self.depth > 0 {
            self.depth -= 1;
        }
        if self.base_stack.len() > 1 {
            self.base_stack.pop();
        }
        if self.prefer_stack.len() > 1 {
            self.prefer_stack.pop();
        }
        Ok(())
    }

    /// Consume the builder and return the catalog.
    pub fn finish(self) -> Result<Catalog> {
        if self.strict && !self.in_catalog {
            return Err(Error::CatalogParse(
                "document contains no catalog element".to_string(),
            ));
        }
        Ok(self.catalog)
    }
}

fn build_catalog_entry(
    local: &str,
    attrs: &[(String, String)],
    base: &Url,
    prefer: Prefer,
) -> Result<Option<EntryData>> {
    let data = match local {
        "public" => EntryData::Public {
            public_id: required(attrs, "publicId", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
            prefer_public: prefer == Prefer::Public,
        },
        "system" => EntryData::System {
            system_id: required(attrs, "systemId", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "uri" => EntryData::Uri {
            name: uri::normalize_classpath(required(attrs, "name", local)?),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
            nature: attr_value(attrs, "nature").map(str::to_string),
            purpose: attr_value(attrs, "purpose").map(str::to_string),
        },
        "rewriteSystem" => EntryData::RewriteSystem {
            system_id_start: uri::normalize_classpath(required(
                attrs,
                "systemIdStartString",
                local,
            )?),
            rewrite_prefix: uri::resolve(base, required(attrs, "rewritePrefix", local)?)?,
        },
        "rewriteURI" => EntryData::RewriteUri {
            uri_start: uri::normalize_classpath(required(attrs, "uriStartString", local)?),
            rewrite_prefix: uri::resolve(base, required(attrs, "rewritePrefix", local)?)?,
        },
        "systemSuffix" => EntryData::SystemSuffix {
            system_id_suffix: required(attrs, "systemIdSuffix", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "uriSuffix" => EntryData::UriSuffix {
            uri_suffix: required(attrs, "uriSuffix", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "delegatePublic" => EntryData::DelegatePublic {
            public_id_start: required(attrs, "publicIdStartString", local)?.to_string(),
            catalog: uri::resolve(base, required(attrs, "catalog", local)?)?,
            prefer_public: prefer == Prefer::Public,
        },
        "delegateSystem" => EntryData::DelegateSystem {
            system_id_start: uri::normalize_classpath(required(
                attrs,
                "systemIdStartString",
                local,
            )?),
            catalog: uri::resolve(base, required(attrs, "catalog", local)?)?,
        },
        "delegateURI" => EntryData::DelegateUri {
            uri_start: uri::normalize_classpath(required(attrs, "uriStartString", local)?),
            catalog: uri::resolve(base, required(attrs, "catalog", local)?)?,
        },
        "nextCatalog" => EntryData::NextCatalog {
            catalog: uri::resolve(base, required(attrs, "catalog", local)?)?,
        },
        _ => return Ok(None),
    };
    Ok(Some(data))
}

fn build_tr9401_entry(
    local: &str,
    attrs: &[(String, String)],
    base: &Url,
) -> Result<Option<EntryData>> {
    let data = match local {
        "doctype" => EntryData::Doctype {
            name: required(attrs, "name", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "document" => EntryData::Document {
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "dtddecl" => EntryData::DtdDecl {
            public_id: required(attrs, "publicId", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "entity" => EntryData::Entity {
            name: required(attrs, "name", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "linktype" => EntryData::LinkType {
            name: required(attrs, "name", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "notation" => EntryData::Notation {
            name: required(attrs, "name", local)?.to_string(),
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        "sgmldecl" => EntryData::SgmlDecl {
            uri: uri::resolve(base, required(attrs, "uri", local)?)?,
        },
        _ => return Ok(None),
    };
    Ok(Some(data))
}

/// Parses catalog documents into [`Catalog`] values.
#[derive(Debug, Clone, Default)]
pub struct CatalogLoader {
    strict: bool,
    prefer: Prefer,
    limits: Limits,
}

impl CatalogLoader {
    /// Create a tolerant loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict (validating) mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the default `prefer` value for catalogs that don't declare one.
    pub fn with_prefer(mut self, prefer: Prefer) -> Self {
        self.prefer = prefer;
        self
    }

    /// Set the resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Parse a catalog document. Entry URIs resolve against `base_uri`
    /// (as overridden by `xml:base` attributes in the document).
    pub fn parse(&self, xml: &[u8], base_uri: &Url) -> Result<Catalog> {
        self.limits.check_catalog_size(xml.len())?;

        let mut reader = NsReader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut builder = CatalogBuilder::new(base_uri.clone(), self.prefer, self.strict);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let (namespace, local, attrs) = decode_element(&reader, &e)?;
                    builder.start_element(namespace.as_deref(), &local, &attrs)?;
                }
                Ok(Event::Empty(e)) => {
                    let (namespace, local, attrs) = decode_element(&reader, &e)?;
                    builder.start_element(namespace.as_deref(), &local, &attrs)?;
                    builder.end_element()?;
                }
                Ok(Event::End(_)) => builder.end_element()?,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::CatalogParse(format!(
                        "error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
            buf.clear();
        }

        builder.finish()
    }

    /// Load and parse a catalog from a file path.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Catalog> {
        let path = path.as_ref();
        let base = Url::from_file_path(path)
            .map_err(|_| Error::MalformedUri(format!("{}", path.display())))?;
        let bytes = fs::read(path)?;
        self.parse(&bytes, &base)
    }
}

fn decode_element<R>(
    reader: &NsReader<R>,
    e: &BytesStart<'_>,
) -> Result<(Option<String>, String, Vec<(String, String)>)> {
    let (ns, local) = reader.resolve(e.name(), false);
    let namespace = match ns {
        ResolveResult::Bound(n) => Some(String::from_utf8_lossy(n.as_ref()).into_owned()),
        _ => None,
    };
    let local = String::from_utf8_lossy(local.as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::CatalogParse(format!("bad attribute: {}", err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::CatalogParse(format!("bad attribute value: {}", err)))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok((namespace, local, attrs))
}
