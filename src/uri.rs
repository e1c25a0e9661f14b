//! URI utilities
//!
//! Helpers shared by the loader, the query engine, and the fetch layer:
//! base-URI resolution, the comparison normalization applied before catalog
//! matching, `classpath:` and Windows path quirks, and scheme allow-list
//! enforcement.

use crate::error::{Error, Result};
use url::Url;

/// Return the current working directory as a `file:` URL with a trailing
/// slash, suitable as a base for resolving relative catalog paths.
pub fn cwd() -> Url {
    std::env::current_dir()
        .ok()
        .and_then(|d| Url::from_directory_path(d).ok())
        .unwrap_or_else(|| Url::parse("file:///").expect("file:/// is a valid URL"))
}

/// Resolve a reference against a base URI.
///
/// An already-absolute reference is returned as-is (after `classpath:`
/// normalization); a relative reference is joined onto the base.
pub fn resolve(base: &Url, reference: &str) -> Result<Url> {
    let reference = normalize_classpath(reference);
    if let Ok(abs) = Url::parse(&reference) {
        return Ok(abs);
    }
    base.join(&reference)
        .map_err(|_| Error::MalformedUri(format!("{} against {}", reference, base)))
}

/// Normalize `classpath:/path` to `classpath:path`.
///
/// The two spellings name the same resource; a single leading slash is
/// stripped so that comparisons and loader lookups see one form.
pub fn normalize_classpath(uri: &str) -> String {
    match uri.strip_prefix("classpath:/") {
        Some(rest) => format!("classpath:{}", rest),
        None => uri.to_string(),
    }
}

/// True when running on Windows.
pub fn is_windows() -> bool {
    cfg!(windows)
}

/// Repair a Windows path used as a system identifier.
///
/// Backslashes become slashes and a bare drive-letter path (`C:/...`)
/// becomes a `file:///C:/...` URL.
pub fn windows_path_uri(uri: &str) -> String {
    let fixed = uri.replace('\\', "/");
    let bytes = fixed.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        format!("file:///{}", fixed)
    } else {
        fixed
    }
}

/// Extract the scheme of a URI reference, lowercased.
///
/// Returns `None` for relative references.
pub fn scheme_of(uri: &str) -> Option<String> {
    let colon = uri.find(':')?;
    if colon == 0 {
        return None;
    }
    let s = &uri[..colon];
    let mut chars = s.chars();
    if !chars.next()?.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(s.to_ascii_lowercase())
}

/// Is access to `uri` forbidden by the scheme allow-list?
///
/// The allow-list is a list of scheme names; the special entry `all`
/// permits every scheme. Relative references are never restricted. When
/// `merge_https` is set, `http` and `https` are treated as one scheme.
pub fn forbid_access(allowed: &[String], uri: &str, merge_https: bool) -> bool {
    let scheme = match scheme_of(uri) {
        Some(s) => s,
        None => return false,
    };
    for allow in allowed {
        let allow = allow.trim().to_ascii_lowercase();
        if allow.is_empty() {
            continue;
        }
        if allow == "all" || allow == scheme {
            return false;
        }
        if merge_https
            && ((allow == "http" && scheme == "https") || (allow == "https" && scheme == "http"))
        {
            return false;
        }
    }
    true
}

/// Normalize a URI string for catalog comparison.
///
/// Lowercases the scheme and the host, rewrites `classpath:/` to
/// `classpath:`, and when `merge_https` is set folds `https://` into
/// `http://`. Path case is left intact. Both request strings and catalog
/// match strings pass through this before any comparison, and prefix
/// subtraction for rewrite entries happens on the normalized forms.
pub fn normalized_for_comparison(uri: &str, merge_https: bool) -> String {
    let mut s = match scheme_of(uri) {
        Some(scheme) => {
            let rest = &uri[scheme.len()..];
            format!("{}{}", scheme, rest)
        }
        None => uri.to_string(),
    };

    if let Some(rest) = s.strip_prefix("classpath:/") {
        return format!("classpath:{}", rest);
    }

    if let Some(auth_start) = s.find("://").map(|i| i + 3) {
        let auth_end = s[auth_start..]
            .find(|c| matches!(c, '/' | '?' | '#'))
            .map(|i| auth_start + i)
            .unwrap_or(s.len());
        let host_start = s[auth_start..auth_end]
            .rfind('@')
            .map(|i| auth_start + i + 1)
            .unwrap_or(auth_start);
        // [::1] style hosts contain colons; the port separator is the one
        // after the closing bracket.
        let host_end = if s[host_start..auth_end].starts_with('[') {
            s[host_start..auth_end]
                .find(']')
                .map(|i| host_start + i + 1)
                .unwrap_or(auth_end)
        } else {
            s[host_start..auth_end]
                .find(':')
                .map(|i| host_start + i)
                .unwrap_or(auth_end)
        };
        let host = s[host_start..host_end].to_ascii_lowercase();
        s.replace_range(host_start..host_end, &host);
    }

    if merge_https {
        if let Some(rest) = s.strip_prefix("https://") {
            s = format!("http://{}", rest);
        }
    }

    s
}
