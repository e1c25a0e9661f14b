//! # xmlcatalog
//!
//! A Rust implementation of OASIS XML Catalogs 1.1 resolution.
//!
//! XML catalogs redirect abstract names — public identifiers, system
//! identifiers, entity names, and namespace URIs — to concrete, loadable
//! resources: local mirrors, trusted copies, stable versions. This crate
//! implements the catalog entry model, a tolerant (or strict) streaming
//! loader, the XML Catalogs 1.1 matching algorithm with `prefer`,
//! longest-match, suffix, rewrite, and delegate semantics, and a resolver
//! that retrieves the resolved resource over `data:`, `classpath:`,
//! `file:`, and `http(s):` URIs. Namespace requests can be refined with a
//! RDDL post-pass that selects a resource by nature and purpose from the
//! namespace document itself.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xmlcatalog::{Resolver, ResolverConfig};
//!
//! let mut config = ResolverConfig::default();
//! config.catalog_files = vec!["/etc/xml/catalog.xml".to_string()];
//! let resolver = Resolver::new(config);
//!
//! let request = resolver.entity_request(
//!     None,
//!     Some("-//OASIS//DTD DocBook XML V4.5//EN"),
//!     Some("http://www.oasis-open.org/docbook/xml/4.5/docbookx.dtd"),
//!     None,
//! );
//! let response = resolver.resolve(&request)?;
//! if let Some(uri) = &response.resolved_uri {
//!     println!("resolved to {}", uri);
//! }
//! # Ok::<(), xmlcatalog::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod uri;

// Catalog model and loading
pub mod entry;
pub mod loader;

// Matching and management
pub mod manager;
pub mod query;

// Requests, responses, retrieval
pub mod config;
pub mod fetch;
pub mod rddl;
pub mod request;
pub mod resolver;
pub mod response;

// Re-exports for convenience
pub use config::{EnvProvider, ResolverConfig, SystemEnvProvider};
pub use entry::{Catalog, Entry, EntryData, EntryKind, Prefer};
pub use error::{Error, Result};
pub use fetch::{AccessTrack, DirectoryLoader, Fetched, LoadedResource, ResourceLoader};
pub use limits::Limits;
pub use loader::{CatalogBuilder, CatalogLoader};
pub use manager::CatalogManager;
pub use request::ResourceRequest;
pub use resolver::Resolver;
pub use response::{CatalogLookup, ResourceResponse};

/// Version of the xmlcatalog library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The OASIS XML Catalogs namespace
pub const CATALOG_NAMESPACE: &str = "urn:oasis:names:tc:entity:xmlns:xml:catalog";

/// The TR9401 extension catalog namespace
pub const TR9401_NAMESPACE: &str = "urn:oasis:names:tc:entity:xmlns:tr9401:catalog";

/// The RDDL namespace
pub const RDDL_NAMESPACE: &str = "http://www.rddl.org/";

/// The XLink namespace
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// The XHTML namespace
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// The XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Well-known RDDL natures.
///
/// A request's nature selects its resolution track: external entities and
/// DTDs resolve as external identifiers, everything else as URIs. A
/// request without a nature matches any entry.
pub mod nature {
    /// An external parsed entity
    pub const EXTERNAL_ENTITY: &str = "https://xmlresolver.org/nature/external-entity";
    /// A document type definition
    pub const DTD: &str = "https://xmlresolver.org/nature/dtd";
    /// An arbitrary XML document
    pub const XML: &str = "https://xmlresolver.org/nature/xml";
    /// An XML Schema (XSD 1.0) document
    pub const XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";
    /// An XML Schema 1.1 document
    pub const XML_SCHEMA_11: &str = "http://www.w3.org/2009/XMLSchema";
    /// A RELAX NG grammar
    pub const RELAX_NG: &str = "http://relaxng.org/ns/structure/1.0";
}

/// Well-known RDDL purposes.
pub mod purpose {
    /// DTD validation
    pub const VALIDATION: &str = "http://www.rddl.org/purposes#validation";
    /// Schema validation
    pub const SCHEMA_VALIDATION: &str = "http://www.rddl.org/purposes#schema-validation";
    /// Transformation
    pub const TRANSFORMATION: &str = "http://www.rddl.org/purposes#transformation";
}
