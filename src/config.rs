//! Resolver configuration
//!
//! [`ResolverConfig`] is an explicit, immutable configuration object; every
//! component receives the configuration it should use rather than
//! consulting process-wide state. A configuration can be assembled in code
//! (set the fields, then share it), or loaded from the environment and an
//! optional TOML property file with [`ResolverConfig::from_env`].
//!
//! When both the environment and the property file define an option, the
//! environment wins unless `prefer_property_file` is set. Environment
//! access goes through the [`EnvProvider`] trait so tests can inject
//! variables.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::entry::Prefer;
use crate::error::{Error, Result};
use crate::fetch::{DirectoryLoader, ResourceLoader};
use crate::limits::Limits;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    /// Get the value of an environment variable.
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Resolver configuration.
#[derive(Clone)]
pub struct ResolverConfig {
    /// Ordered list of root catalogs
    pub catalog_files: Vec<String>,
    /// Catalogs appended after `catalog_files`
    pub catalog_additions: Vec<String>,
    /// Default `prefer` for catalogs that don't declare one
    pub prefer: Prefer,
    /// When both environment and property file set an option, let the
    /// property file win
    pub prefer_property_file: bool,
    /// On a catalog miss, resolve the request's absolute URI directly
    pub always_resolve: bool,
    /// Enable the RDDL post-pass for namespace requests
    pub parse_rddl: bool,
    /// On a system-identifier miss, retry the lookup on the URI track
    pub uri_for_system: bool,
    /// Treat `http` and `https` as equivalent in comparisons and
    /// allow-lists
    pub merge_https: bool,
    /// Report the request's URI instead of `jar:`/`classpath:` URIs in
    /// responses
    pub mask_jar_uris: bool,
    /// Scheme allow-list for external-identifier requests
    pub access_external_entity: Vec<String>,
    /// Scheme allow-list for URI requests
    pub access_external_document: Vec<String>,
    /// Repair backslashes and bare drive letters in system identifiers
    pub fix_windows_system_identifiers: bool,
    /// Surface URI and I/O errors instead of returning unresolved
    /// responses
    pub throw_uri_exceptions: bool,
    /// Reject catalogs with structural violations instead of dropping the
    /// offending entries
    pub strict_catalogs: bool,
    /// Deadline applied to each fetch
    pub timeout: Option<Duration>,
    /// Resource limits
    pub limits: Limits,
    /// Backend for `classpath:` (and `jar:`) resources
    pub resource_loader: Arc<dyn ResourceLoader>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            catalog_files: vec!["./catalog.xml".to_string()],
            catalog_additions: Vec::new(),
            prefer: Prefer::Public,
            prefer_property_file: false,
            always_resolve: true,
            parse_rddl: false,
            uri_for_system: true,
            merge_https: true,
            mask_jar_uris: true,
            access_external_entity: vec!["all".to_string()],
            access_external_document: vec!["all".to_string()],
            fix_windows_system_identifiers: false,
            throw_uri_exceptions: false,
            strict_catalogs: false,
            timeout: None,
            limits: Limits::default(),
            resource_loader: Arc::new(DirectoryLoader::default()),
        }
    }
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("catalog_files", &self.catalog_files)
            .field("catalog_additions", &self.catalog_additions)
            .field("prefer", &self.prefer)
            .field("prefer_property_file", &self.prefer_property_file)
            .field("always_resolve", &self.always_resolve)
            .field("parse_rddl", &self.parse_rddl)
            .field("uri_for_system", &self.uri_for_system)
            .field("merge_https", &self.merge_https)
            .field("mask_jar_uris", &self.mask_jar_uris)
            .field("access_external_entity", &self.access_external_entity)
            .field("access_external_document", &self.access_external_document)
            .field(
                "fix_windows_system_identifiers",
                &self.fix_windows_system_identifiers,
            )
            .field("throw_uri_exceptions", &self.throw_uri_exceptions)
            .field("strict_catalogs", &self.strict_catalogs)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .finish()
    }
}

/// The TOML property file (`xmlcatalog.toml`), all keys optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PropertyFile {
    catalog_files: Option<Vec<String>>,
    catalog_additions: Option<Vec<String>>,
    prefer: Option<String>,
    prefer_property_file: Option<bool>,
    always_resolve: Option<bool>,
    parse_rddl: Option<bool>,
    uri_for_system: Option<bool>,
    merge_https: Option<bool>,
    mask_jar_uris: Option<bool>,
    access_external_entity: Option<Vec<String>>,
    access_external_document: Option<Vec<String>>,
    fix_windows_system_identifiers: Option<bool>,
    throw_uri_exceptions: Option<bool>,
    strict_catalogs: Option<bool>,
    timeout_seconds: Option<u64>,
    classpath_roots: Option<Vec<String>>,
}

impl ResolverConfig {
    /// Load configuration from the process environment and the property
    /// file, if one exists.
    ///
    /// The property file path comes from `XML_CATALOG_PROPERTIES`, falling
    /// back to `./xmlcatalog.toml`.
    pub fn from_env() -> Result<Self> {
        Self::load_with(&SystemEnvProvider)
    }

    /// Load configuration with a custom environment provider.
    pub fn load_with<E: EnvProvider>(env: &E) -> Result<Self> {
        let mut config = Self::default();
        let file = Self::find_property_file(env)?;

        // the meta-option itself: environment first, then the file
        let prefer_file = match env.get("XML_CATALOG_PREFER_PROPERTY_FILE") {
            Some(v) => parse_bool("XML_CATALOG_PREFER_PROPERTY_FILE", &v)?,
            None => file
                .as_ref()
                .and_then(|f| f.prefer_property_file)
                .unwrap_or(false),
        };
        config.prefer_property_file = prefer_file;

        if prefer_file {
            config.apply_env(env)?;
            if let Some(file) = &file {
                config.apply_file(file)?;
            }
        } else {
            if let Some(file) = &file {
                config.apply_file(file)?;
            }
            config.apply_env(env)?;
        }

        Ok(config)
    }

    fn find_property_file<E: EnvProvider>(env: &E) -> Result<Option<PropertyFile>> {
        let path = match env.get("XML_CATALOG_PROPERTIES") {
            Some(p) => PathBuf::from(p),
            None => {
                let p = PathBuf::from("xmlcatalog.toml");
                if !p.exists() {
                    return Ok(None);
                }
                p
            }
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "cannot read property file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let file = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "cannot parse property file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(file))
    }

    fn apply_file(&mut self, file: &PropertyFile) -> Result<()> {
        if let Some(v) = &file.catalog_files {
            self.catalog_files = v.clone();
        }
        if let Some(v) = &file.catalog_additions {
            self.catalog_additions = v.clone();
        }
        if let Some(v) = &file.prefer {
            self.prefer = Prefer::from_attr(v)
                .ok_or_else(|| Error::Config(format!("invalid prefer value: {}", v)))?;
        }
        if let Some(v) = file.always_resolve {
            self.always_resolve = v;
        }
        if let Some(v) = file.parse_rddl {
            self.parse_rddl = v;
        }
        if let Some(v) = file.uri_for_system {
            self.uri_for_system = v;
        }
        if let Some(v) = file.merge_https {
            self.merge_https = v;
        }
        if let Some(v) = file.mask_jar_uris {
            self.mask_jar_uris = v;
        }
        if let Some(v) = &file.access_external_entity {
            self.access_external_entity = v.clone();
        }
        if let Some(v) = &file.access_external_document {
            self.access_external_document = v.clone();
        }
        if let Some(v) = file.fix_windows_system_identifiers {
            self.fix_windows_system_identifiers = v;
        }
        if let Some(v) = file.throw_uri_exceptions {
            self.throw_uri_exceptions = v;
        }
        if let Some(v) = file.strict_catalogs {
            self.strict_catalogs = v;
        }
        if let Some(secs) = file.timeout_seconds {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(roots) = &file.classpath_roots {
            self.resource_loader = Arc::new(DirectoryLoader::new(
                roots.iter().map(PathBuf::from).collect(),
            ));
        }
        Ok(())
    }

    fn apply_env<E: EnvProvider>(&mut self, env: &E) -> Result<()> {
        if let Some(v) = env.get("XML_CATALOG_FILES") {
            self.catalog_files = split_list(&v);
        }
        if let Some(v) = env.get("XML_CATALOG_ADDITIONS") {
            self.catalog_additions = split_list(&v);
        }
        if let Some(v) = env.get("XML_CATALOG_PREFER") {
            self.prefer = Prefer::from_attr(&v)
                .ok_or_else(|| Error::Config(format!("invalid XML_CATALOG_PREFER value: {}", v)))?;
        }
        env_bool(env, "XML_CATALOG_ALWAYS_RESOLVE", &mut self.always_resolve)?;
        env_bool(env, "XML_CATALOG_PARSE_RDDL", &mut self.parse_rddl)?;
        env_bool(env, "XML_CATALOG_URI_FOR_SYSTEM", &mut self.uri_for_system)?;
        env_bool(env, "XML_CATALOG_MERGE_HTTPS", &mut self.merge_https)?;
        env_bool(env, "XML_CATALOG_MASK_JAR_URIS", &mut self.mask_jar_uris)?;
        if let Some(v) = env.get("XML_CATALOG_ACCESS_EXTERNAL_ENTITY") {
            self.access_external_entity = split_list(&v);
        }
        if let Some(v) = env.get("XML_CATALOG_ACCESS_EXTERNAL_DOCUMENT") {
            self.access_external_document = split_list(&v);
        }
        env_bool(
            env,
            "XML_CATALOG_FIX_WINDOWS_SYSTEM_IDENTIFIERS",
            &mut self.fix_windows_system_identifiers,
        )?;
        env_bool(
            env,
            "XML_CATALOG_THROW_URI_EXCEPTIONS",
            &mut self.throw_uri_exceptions,
        )?;
        env_bool(env, "XML_CATALOG_STRICT", &mut self.strict_catalogs)?;
        if let Some(v) = env.get("XML_CATALOG_TIMEOUT") {
            let secs: u64 = v.parse().map_err(|_| {
                Error::Config(format!("invalid XML_CATALOG_TIMEOUT value: {}", v))
            })?;
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(v) = env.get("XML_CATALOG_CLASSPATH_ROOTS") {
            self.resource_loader = Arc::new(DirectoryLoader::new(
                split_list(&v).into_iter().map(PathBuf::from).collect(),
            ));
        }
        Ok(())
    }
}

fn env_bool<E: EnvProvider>(env: &E, key: &str, target: &mut bool) -> Result<()> {
    if let Some(v) = env.get(key) {
        *target = parse_bool(key, &v)?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::Config(format!(
            "invalid boolean for {}: {}",
            key, value
        ))),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ';' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
