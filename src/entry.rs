//! Catalog entry model
//!
//! The typed representation of a loaded catalog: one [`Entry`] per catalog
//! element, flattened into a [`Catalog`] in document order. Group structure
//! is dissolved at load time — each entry carries its effective base URI,
//! and `public`/`delegatePublic` entries capture the `prefer` setting of
//! their innermost enclosing `group` or `catalog` element.
//!
//! All URI-valued fields are absolute, resolved at load time.

use std::collections::HashMap;

use url::Url;

/// The `prefer` attribute of a `catalog` or `group` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefer {
    /// Public identifiers may satisfy a request that also has a system
    /// identifier (the default)
    #[default]
    Public,
    /// Public identifiers are only consulted when no system identifier is
    /// present
    System,
}

impl Prefer {
    /// Parse a `prefer` attribute value.
    pub fn from_attr(value: &str) -> Option<Prefer> {
        match value {
            "public" => Some(Prefer::Public),
            "system" => Some(Prefer::System),
            _ => None,
        }
    }
}

/// Discriminant for entry variants, used for per-kind iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// `<public>`
    Public,
    /// `<system>`
    System,
    /// `<uri>`
    Uri,
    /// `<rewriteSystem>`
    RewriteSystem,
    /// `<rewriteURI>`
    RewriteUri,
    /// `<systemSuffix>`
    SystemSuffix,
    /// `<uriSuffix>`
    UriSuffix,
    /// `<delegatePublic>`
    DelegatePublic,
    /// `<delegateSystem>`
    DelegateSystem,
    /// `<delegateURI>`
    DelegateUri,
    /// `<nextCatalog>`
    NextCatalog,
    /// TR9401 `<doctype>`
    Doctype,
    /// TR9401 `<document>`
    Document,
    /// TR9401 `<dtddecl>`
    DtdDecl,
    /// TR9401 `<entity>`
    Entity,
    /// TR9401 `<linktype>`
    LinkType,
    /// TR9401 `<notation>`
    Notation,
    /// TR9401 `<sgmldecl>`
    SgmlDecl,
}

/// Variant-specific payload of a catalog entry
#[derive(Debug, Clone)]
pub enum EntryData {
    /// Maps a public identifier to a URI
    Public {
        /// The public identifier to match
        public_id: String,
        /// The replacement URI
        uri: Url,
        /// Effective `prefer` of the innermost enclosing group
        prefer_public: bool,
    },
    /// Maps a system identifier to a URI
    System {
        /// The system identifier to match
        system_id: String,
        /// The replacement URI
        uri: Url,
    },
    /// Maps a URI (by name) to another URI
    Uri {
        /// The URI to match
        name: String,
        /// The replacement URI
        uri: Url,
        /// RDDL nature constraint, if any
        nature: Option<String>,
        /// RDDL purpose constraint, if any
        purpose: Option<String>,
    },
    /// Rewrites a system identifier prefix
    RewriteSystem {
        /// The prefix to match
        system_id_start: String,
        /// The replacement prefix
        rewrite_prefix: Url,
    },
    /// Rewrites a URI prefix
    RewriteUri {
        /// The prefix to match
        uri_start: String,
        /// The replacement prefix
        rewrite_prefix: Url,
    },
    /// Maps a system identifier suffix to a URI
    SystemSuffix {
        /// The suffix to match
        system_id_suffix: String,
        /// The replacement URI
        uri: Url,
    },
    /// Maps a URI suffix to a URI
    UriSuffix {
        /// The suffix to match
        uri_suffix: String,
        /// The replacement URI
        uri: Url,
    },
    /// Delegates public identifiers with a prefix to another catalog
    DelegatePublic {
        /// The public identifier prefix
        public_id_start: String,
        /// The delegate catalog
        catalog: Url,
        /// Effective `prefer` of the innermost enclosing group
        prefer_public: bool,
    },
    /// Delegates system identifiers with a prefix to another catalog
    DelegateSystem {
        /// The system identifier prefix
        system_id_start: String,
        /// The delegate catalog
        catalog: Url,
    },
    /// Delegates URIs with a prefix to another catalog
    DelegateUri {
        /// The URI prefix
        uri_start: String,
        /// The delegate catalog
        catalog: Url,
    },
    /// Chains to another catalog when nothing in this one matches
    NextCatalog {
        /// The next catalog
        catalog: Url,
    },
    /// TR9401: maps a doctype name to a URI
    Doctype {
        /// The doctype (root element) name
        name: String,
        /// The replacement URI
        uri: Url,
    },
    /// TR9401: the default document
    Document {
        /// The document URI
        uri: Url,
    },
    /// TR9401: maps a DTD declaration public identifier to a URI
    DtdDecl {
        /// The public identifier
        public_id: String,
        /// The replacement URI
        uri: Url,
    },
    /// TR9401: maps an entity name to a URI
    Entity {
        /// The entity name
        name: String,
        /// The replacement URI
        uri: Url,
    },
    /// TR9401: maps a link type name to a URI
    LinkType {
        /// The link type name
        name: String,
        /// The replacement URI
        uri: Url,
    },
    /// TR9401: maps a notation name to a URI
    Notation {
        /// The notation name
        name: String,
        /// The replacement URI
        uri: Url,
    },
    /// TR9401: the SGML declaration
    SgmlDecl {
        /// The declaration URI
        uri: Url,
    },
}

impl EntryData {
    /// The kind discriminant of this entry.
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryData::Public { .. } => EntryKind::Public,
            EntryData::System { .. } => EntryKind::System,
            EntryData::Uri { .. } => EntryKind::Uri,
            EntryData::RewriteSystem { .. } => EntryKind::RewriteSystem,
            EntryData::RewriteUri { .. } => EntryKind::RewriteUri,
            EntryData::SystemSuffix { .. } => EntryKind::SystemSuffix,
            EntryData::UriSuffix { .. } => EntryKind::UriSuffix,
            EntryData::DelegatePublic { .. } => EntryKind::DelegatePublic,
            EntryData::DelegateSystem { .. } => EntryKind::DelegateSystem,
            EntryData::DelegateUri { .. } => EntryKind::DelegateUri,
            EntryData::NextCatalog { .. } => EntryKind::NextCatalog,
            EntryData::Doctype { .. } => EntryKind::Doctype,
            EntryData::Document { .. } => EntryKind::Document,
            EntryData::DtdDecl { .. } => EntryKind::DtdDecl,
            EntryData::Entity { .. } => EntryKind::Entity,
            EntryData::LinkType { .. } => EntryKind::LinkType,
            EntryData::Notation { .. } => EntryKind::Notation,
            EntryData::SgmlDecl { .. } => EntryKind::SgmlDecl,
        }
    }
}

/// A single catalog entry
#[derive(Debug, Clone)]
pub struct Entry {
    /// The entry's `id` attribute, if any
    pub id: Option<String>,
    /// The base URI in effect where the entry appeared
    pub base_uri: Url,
    /// The variant payload
    pub data: EntryData,
}

impl Entry {
    /// The kind discriminant of this entry.
    pub fn kind(&self) -> EntryKind {
        self.data.kind()
    }
}

/// A loaded catalog: entries in document order plus a per-kind index
#[derive(Debug, Clone)]
pub struct Catalog {
    /// The catalog document's base URI
    pub base_uri: Url,
    /// The root `prefer` setting
    pub prefer: Prefer,
    entries: Vec<Entry>,
    by_kind: HashMap<EntryKind, Vec<usize>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new(base_uri: Url, prefer: Prefer) -> Self {
        Self {
            base_uri,
            prefer,
            entries: Vec::new(),
            by_kind: HashMap::new(),
        }
    }

    /// Append an entry, preserving document order.
    pub fn push(&mut self, entry: Entry) {
        let kind = entry.kind();
        self.by_kind.entry(kind).or_default().push(self.entries.len());
        self.entries.push(entry);
    }

    /// All entries in document order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries of one kind, in document order.
    pub fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &Entry> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    /// Does the catalog contain no entries?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
