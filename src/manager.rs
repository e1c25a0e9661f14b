//! Catalog management
//!
//! [`CatalogManager`] owns the ordered list of root catalogs and a shared
//! cache of loaded catalog documents. Lookups traverse the roots in
//! order; a catalog that matches nothing chains through its `nextCatalog`
//! entries (depth-first, before the next root), and a catalog with
//! matching delegate entries hands the search over to the delegate
//! catalogs exclusively — the delegated result, hit or miss, is final.
//!
//! Catalogs load lazily on first reference and are cached by absolute URI
//! for the lifetime of the manager. Failed loads are cached too, so a bad
//! catalog is reported once rather than refetched on every lookup. A
//! per-lookup visited set keeps cyclic catalog graphs from looping.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use log::{debug, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::entry::{Catalog, EntryData, EntryKind};
use crate::error::Result;
use crate::fetch;
use crate::loader::CatalogLoader;
use crate::query::{self, Query, QueryOutcome};
use crate::uri;

#[derive(Clone)]
enum CachedCatalog {
    Loaded(Arc<Catalog>),
    Failed,
}

/// Thread-safe catalog list with a lazy, memoized load cache.
pub struct CatalogManager {
    config: Arc<ResolverConfig>,
    loader: CatalogLoader,
    cache: RwLock<HashMap<Url, CachedCatalog>>,
}

impl CatalogManager {
    /// Create a manager over the catalogs named in `config`.
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        let loader = CatalogLoader::new()
            .with_strict(config.strict_catalogs)
            .with_prefer(config.prefer)
            .with_limits(config.limits.clone());
        Self {
            config,
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The root catalog URIs, in search order: `catalog_files` then
    /// `catalog_additions`, resolved against the current directory.
    pub fn catalogs(&self) -> Vec<Url> {
        let base = uri::cwd();
        self.config
            .catalog_files
            .iter()
            .chain(self.config.catalog_additions.iter())
            .filter_map(|s| match uri::resolve(&base, s) {
                Ok(u) => Some(u),
                Err(e) => {
                    warn!("ignoring unusable catalog URI {:?}: {}", s, e);
                    None
                }
            })
            .collect()
    }

    /// Load a catalog, consulting and populating the shared cache.
    ///
    /// Returns `None` for catalogs that fail to load; the failure is
    /// cached so the load is not retried. Concurrent first loads of the
    /// same URI may race; the first insert wins and later loads are
    /// discarded.
    pub fn load_catalog(&self, url: &Url) -> Option<Arc<Catalog>> {
        {
            let cache = match self.cache.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(cached) = cache.get(url) {
                return match cached {
                    CachedCatalog::Loaded(c) => Some(c.clone()),
                    CachedCatalog::Failed => None,
                };
            }
        }

        // load outside the lock
        let value = match self.load_uncached(url) {
            Ok(catalog) => {
                debug!("loaded catalog {} ({} entries)", url, catalog.len());
                CachedCatalog::Loaded(Arc::new(catalog))
            }
            Err(e) => {
                warn!("failed to load catalog {}: {}", url, e);
                CachedCatalog::Failed
            }
        };

        let mut cache = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = cache.entry(url.clone()).or_insert(value);
        match entry {
            CachedCatalog::Loaded(c) => Some(c.clone()),
            CachedCatalog::Failed => None,
        }
    }

    fn load_uncached(&self, url: &Url) -> Result<Catalog> {
        let bytes = fetch::read_catalog_bytes(&self.config, url)?;
        self.loader.parse(&bytes, url)
    }

    /// Discard every cached catalog. In-flight lookups finish against the
    /// map they started with.
    pub fn reload(&self) {
        let mut cache = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cache = HashMap::new();
    }

    /// Resolve an external identifier.
    pub fn lookup_entity(
        &self,
        name: Option<&str>,
        system: Option<&str>,
        public: Option<&str>,
    ) -> Option<Url> {
        if name.is_none() && system.is_none() && public.is_none() {
            return None;
        }
        self.run(Query::Entity {
            name,
            system,
            public,
        })
    }

    /// Resolve a URI.
    pub fn lookup_uri(&self, request_uri: &str) -> Option<Url> {
        self.lookup_namespace(request_uri, None, None)
    }

    /// Resolve a namespace URI, optionally constrained by RDDL nature and
    /// purpose.
    pub fn lookup_namespace(
        &self,
        request_uri: &str,
        nature: Option<&str>,
        purpose: Option<&str>,
    ) -> Option<Url> {
        self.run(Query::Uri {
            uri: request_uri,
            nature,
            purpose,
        })
    }

    /// Resolve a doctype by root element name.
    pub fn lookup_doctype(&self, name: &str) -> Option<Url> {
        self.run(Query::Doctype { name })
    }

    /// Resolve a notation.
    pub fn lookup_notation(
        &self,
        name: Option<&str>,
        system: Option<&str>,
        public: Option<&str>,
    ) -> Option<Url> {
        if name.is_none() && system.is_none() && public.is_none() {
            return None;
        }
        self.run(Query::Notation {
            name,
            system,
            public,
        })
    }

    /// Resolve the default document.
    pub fn lookup_document(&self) -> Option<Url> {
        self.run(Query::Document)
    }

    fn run(&self, query: Query<'_>) -> Option<Url> {
        let mut visited = HashSet::new();
        self.search(self.catalogs(), &mut visited, &query)
    }

    fn search(
        &self,
        roots: Vec<Url>,
        visited: &mut HashSet<Url>,
        query: &Query<'_>,
    ) -> Option<Url> {
        let mut queue: VecDeque<Url> = roots.into();

        while let Some(url) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }
            let catalog = match self.load_catalog(&url) {
                Some(c) => c,
                None => continue,
            };

            match query::query_catalog(&catalog, query, self.config.merge_https) {
                QueryOutcome::Found(found) => {
                    debug!("catalog {} resolved {:?} to {}", url, query, found);
                    return Some(found);
                }
                QueryOutcome::Delegated {
                    catalogs,
                    query: delegated,
                } => {
                    // delegation isolates: only the delegate catalogs are
                    // searched and their answer is final
                    let fresh: Vec<Url> = catalogs
                        .into_iter()
                        .filter(|c| !visited.contains(c))
                        .collect();
                    debug!("catalog {} delegated {:?}", url, delegated);
                    return self.search(fresh, visited, &delegated);
                }
                QueryOutcome::NotFound => {
                    // nextCatalog chains are searched before the next root
                    let next: Vec<Url> = catalog
                        .of_kind(EntryKind::NextCatalog)
                        .filter_map(|e| match &e.data {
                            EntryData::NextCatalog { catalog } => Some(catalog.clone()),
                            _ => None,
                        })
                        .collect();
                    for nc in next.into_iter().rev() {
                        queue.push_front(nc);
                    }
                }
            }
        }

        None
    }
}
