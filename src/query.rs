//! Catalog matching
//!
//! Evaluates a single query against a single loaded catalog, implementing
//! the XML Catalogs 1.1 matching rules: exact match first, then longest
//! suffix, then longest rewrite prefix, then delegation. Delegation does
//! not resolve here — the outcome names the delegate catalogs (ordered
//! longest-prefix first) and the reduced query to run against them; the
//! manager owns catalog loading and traversal.

use log::warn;
use url::Url;

use crate::entry::{Catalog, EntryData, EntryKind};
use crate::uri;

/// A single catalog query.
#[derive(Debug, Clone)]
pub enum Query<'a> {
    /// External identifier resolution (system and/or public identifier,
    /// optionally an entity name for TR9401 `entity` entries)
    Entity {
        /// Entity name
        name: Option<&'a str>,
        /// System identifier
        system: Option<&'a str>,
        /// Public identifier
        public: Option<&'a str>,
    },
    /// URI resolution, optionally constrained by RDDL nature and purpose
    Uri {
        /// The URI to resolve
        uri: &'a str,
        /// Requested nature
        nature: Option<&'a str>,
        /// Requested purpose
        purpose: Option<&'a str>,
    },
    /// TR9401 doctype resolution by root element name
    Doctype {
        /// The doctype name
        name: &'a str,
    },
    /// TR9401 notation resolution
    Notation {
        /// The notation name
        name: Option<&'a str>,
        /// System identifier
        system: Option<&'a str>,
        /// Public identifier
        public: Option<&'a str>,
    },
    /// TR9401 default document
    Document,
}

/// Result of evaluating a query against one catalog.
#[derive(Debug)]
pub enum QueryOutcome<'a> {
    /// A matching entry supplied this URI
    Found(Url),
    /// Matching delegate entries; the search continues only in these
    /// catalogs, with the reduced query, and its result is final
    Delegated {
        /// Delegate catalogs, longest matched prefix first
        catalogs: Vec<Url>,
        /// The query to run against them
        query: Query<'a>,
    },
    /// Nothing in this catalog matched
    NotFound,
}

/// Evaluate `query` against `catalog`.
pub fn query_catalog<'a>(
    catalog: &Catalog,
    query: &Query<'a>,
    merge_https: bool,
) -> QueryOutcome<'a> {
    match *query {
        Query::Entity {
            name,
            system,
            public,
        } => external_id_query(catalog, name, system, public, EntryKind::Entity, merge_https),
        Query::Uri {
            uri,
            nature,
            purpose,
        } => uri_query(catalog, uri, nature, purpose, merge_https),
        Query::Doctype { name } => name_query(catalog, name, EntryKind::Doctype),
        Query::Notation {
            name,
            system,
            public,
        } => external_id_query(catalog, name, system, public, EntryKind::Notation, merge_https),
        Query::Document => document_query(catalog),
    }
}

/// External-identifier matching, shared by the entity and notation tracks.
/// `name_kind` selects which TR9401 entry kind the entity name matches.
fn external_id_query<'a>(
    catalog: &Catalog,
    name: Option<&'a str>,
    system: Option<&'a str>,
    public: Option<&'a str>,
    name_kind: EntryKind,
    merge_https: bool,
) -> QueryOutcome<'a> {
    let norm = |s: &str| uri::normalized_for_comparison(s, merge_https);

    if let Some(system) = system {
        let cs = norm(system);

        for e in catalog.of_kind(EntryKind::System) {
            if let EntryData::System { system_id, uri } = &e.data {
                if norm(system_id) == cs {
                    return QueryOutcome::Found(uri.clone());
                }
            }
        }

        let mut suffix: Option<(&Url, usize)> = None;
        for e in catalog.of_kind(EntryKind::SystemSuffix) {
            if let EntryData::SystemSuffix {
                system_id_suffix,
                uri,
            } = &e.data
            {
                let suf = norm(system_id_suffix);
                if cs.ends_with(&suf) && suffix.map_or(true, |(_, len)| suf.len() > len) {
                    suffix = Some((uri, suf.len()));
                }
            }
        }
        if let Some((uri, _)) = suffix {
            return QueryOutcome::Found(uri.clone());
        }

        let mut rewrite: Option<(&Url, usize)> = None;
        for e in catalog.of_kind(EntryKind::RewriteSystem) {
            if let EntryData::RewriteSystem {
                system_id_start,
                rewrite_prefix,
            } = &e.data
            {
                let start = norm(system_id_start);
                if cs.starts_with(&start) && rewrite.map_or(true, |(_, len)| start.len() > len) {
                    rewrite = Some((rewrite_prefix, start.len()));
                }
            }
        }
        if let Some((prefix, len)) = rewrite {
            match rewrite_remainder(prefix, &cs[len..]) {
                Some(u) => return QueryOutcome::Found(u),
                None => {
                    warn!("rewritten system identifier for {:?} is not a valid URI", cs);
                }
            }
        }

        let mut delegated: Vec<(usize, Url)> = Vec::new();
        for e in catalog.of_kind(EntryKind::DelegateSystem) {
            if let EntryData::DelegateSystem {
                system_id_start,
                catalog,
            } = &e.data
            {
                let start = norm(system_id_start);
                if cs.starts_with(&start) {
                    delegated.push((start.len(), catalog.clone()));
                }
            }
        }
        if !delegated.is_empty() {
            return QueryOutcome::Delegated {
                catalogs: longest_first(delegated),
                query: Query::Entity {
                    name: None,
                    system: Some(system),
                    public: None,
                },
            };
        }
    }

    if let Some(public) = public {
        let cp = norm(public);

        for e in catalog.of_kind(EntryKind::Public) {
            if let EntryData::Public {
                public_id,
                uri,
                prefer_public,
            } = &e.data
            {
                if (system.is_none() || *prefer_public) && norm(public_id) == cp {
                    return QueryOutcome::Found(uri.clone());
                }
            }
        }

        let mut delegated: Vec<(usize, Url)> = Vec::new();
        for e in catalog.of_kind(EntryKind::DelegatePublic) {
            if let EntryData::DelegatePublic {
                public_id_start,
                catalog,
                prefer_public,
            } = &e.data
            {
                let start = norm(public_id_start);
                if (system.is_none() || *prefer_public) && cp.starts_with(&start) {
                    delegated.push((start.len(), catalog.clone()));
                }
            }
        }
        if !delegated.is_empty() {
            return QueryOutcome::Delegated {
                catalogs: longest_first(delegated),
                query: Query::Entity {
                    name: None,
                    system: None,
                    public: Some(public),
                },
            };
        }
    }

    if let Some(name) = name {
        for e in catalog.of_kind(name_kind) {
            let (entry_name, uri) = match &e.data {
                EntryData::Entity { name, uri } => (name, uri),
                EntryData::Notation { name, uri } => (name, uri),
                _ => continue,
            };
            if entry_name == name {
                return QueryOutcome::Found(uri.clone());
            }
        }
    }

    QueryOutcome::NotFound
}

fn uri_query<'a>(
    catalog: &Catalog,
    request_uri: &'a str,
    nature: Option<&'a str>,
    purpose: Option<&'a str>,
    merge_https: bool,
) -> QueryOutcome<'a> {
    let norm = |s: &str| uri::normalized_for_comparison(s, merge_https);
    let cu = norm(request_uri);

    for e in catalog.of_kind(EntryKind::Uri) {
        if let EntryData::Uri {
            name,
            uri,
            nature: entry_nature,
            purpose: entry_purpose,
        } = &e.data
        {
            // entry-side nature/purpose constrain only when both sides
            // carry a value
            let nature_ok = match (entry_nature.as_deref(), nature) {
                (Some(en), Some(n)) => norm(en) == norm(n),
                _ => true,
            };
            let purpose_ok = match (entry_purpose.as_deref(), purpose) {
                (Some(ep), Some(p)) => norm(ep) == norm(p),
                _ => true,
            };
            if nature_ok && purpose_ok && norm(name) == cu {
                return QueryOutcome::Found(uri.clone());
            }
        }
    }

    let mut suffix: Option<(&Url, usize)> = None;
    for e in catalog.of_kind(EntryKind::UriSuffix) {
        if let EntryData::UriSuffix { uri_suffix, uri } = &e.data {
            let suf = norm(uri_suffix);
            if cu.ends_with(&suf) && suffix.map_or(true, |(_, len)| suf.len() > len) {
                suffix = Some((uri, suf.len()));
            }
        }
    }
    if let Some((uri, _)) = suffix {
        return QueryOutcome::Found(uri.clone());
    }

    let mut rewrite: Option<(&Url, usize)> = None;
    for e in catalog.of_kind(EntryKind::RewriteUri) {
        if let EntryData::RewriteUri {
            uri_start,
            rewrite_prefix,
        } = &e.data
        {
            let start = norm(uri_start);
            if cu.starts_with(&start) && rewrite.map_or(true, |(_, len)| start.len() > len) {
                rewrite = Some((rewrite_prefix, start.len()));
            }
        }
    }
    if let Some((prefix, len)) = rewrite {
        match rewrite_remainder(prefix, &cu[len..]) {
            Some(u) => return QueryOutcome::Found(u),
            None => {
                warn!("rewritten URI for {:?} is not a valid URI", cu);
            }
        }
    }

    let mut delegated: Vec<(usize, Url)> = Vec::new();
    for e in catalog.of_kind(EntryKind::DelegateUri) {
        if let EntryData::DelegateUri { uri_start, catalog } = &e.data {
            let start = norm(uri_start);
            if cu.starts_with(&start) {
                delegated.push((start.len(), catalog.clone()));
            }
        }
    }
    if !delegated.is_empty() {
        return QueryOutcome::Delegated {
            catalogs: longest_first(delegated),
            query: Query::Uri {
                uri: request_uri,
                nature,
                purpose,
            },
        };
    }

    QueryOutcome::NotFound
}

fn name_query<'a>(catalog: &Catalog, name: &str, kind: EntryKind) -> QueryOutcome<'a> {
    for e in catalog.of_kind(kind) {
        let (entry_name, uri) = match &e.data {
            EntryData::Doctype { name, uri } => (name, uri),
            EntryData::LinkType { name, uri } => (name, uri),
            _ => continue,
        };
        if entry_name == name {
            return QueryOutcome::Found(uri.clone());
        }
    }
    QueryOutcome::NotFound
}

fn document_query<'a>(catalog: &Catalog) -> QueryOutcome<'a> {
    for e in catalog.of_kind(EntryKind::Document) {
        if let EntryData::Document { uri } = &e.data {
            return QueryOutcome::Found(uri.clone());
        }
    }
    QueryOutcome::NotFound
}

/// Append the unmatched remainder to a rewrite prefix.
fn rewrite_remainder(prefix: &Url, remainder: &str) -> Option<Url> {
    Url::parse(&format!("{}{}", prefix, remainder)).ok()
}

/// Order delegate catalogs by longest matched prefix; stable sort keeps
/// document order for equal lengths.
fn longest_first(mut delegated: Vec<(usize, Url)>) -> Vec<Url> {
    delegated.sort_by(|a, b| b.0.cmp(&a.0));
    delegated.into_iter().map(|(_, url)| url).collect()
}
