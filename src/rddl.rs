//! RDDL scanning
//!
//! A linear, namespace-aware pass over a RDDL (HTML) namespace document.
//! The scanner tracks the base URI through `xml:base` attributes (and the
//! HTML `base` attribute on elements in the XHTML namespace) and extracts
//! the first `rddl:resource` whose `xlink:role` and `xlink:arcrole` match
//! the requested nature and purpose. The rest of the document is still
//! scanned, but the first match is kept.
//!
//! No DOM is built.

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use url::Url;

use crate::error::{Error, Result};
use crate::{HTML_NAMESPACE, RDDL_NAMESPACE, XLINK_NAMESPACE, XML_NAMESPACE};

/// Scan `doc` (fetched from `doc_uri`) for a resource with the given
/// nature and purpose. Returns the resource's absolutized `xlink:href`.
pub fn find_resource(
    doc: &[u8],
    doc_uri: &Url,
    nature: &str,
    purpose: &str,
) -> Result<Option<Url>> {
    let mut reader = NsReader::from_reader(doc);
    let mut base_stack: Vec<Url> = vec![doc_uri.clone()];
    let mut found: Option<Url> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let current = base_stack.last().cloned().unwrap_or_else(|| doc_uri.clone());
                let base = element_base(&reader, &e, &current);
                check_resource(&reader, &e, &base, nature, purpose, &mut found);
                base_stack.push(base);
            }
            Ok(Event::Empty(e)) => {
                let current = base_stack.last().cloned().unwrap_or_else(|| doc_uri.clone());
                let base = element_base(&reader, &e, &current);
                check_resource(&reader, &e, &base, nature, purpose, &mut found);
            }
            Ok(Event::End(_)) => {
                if base_stack.len() > 1 {
                    base_stack.pop();
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Rddl(format!(
                    "parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
        buf.clear();
    }

    Ok(found)
}

fn element_ns<R>(reader: &NsReader<R>, e: &BytesStart<'_>) -> Option<Vec<u8>> {
    let (ns, _) = reader.resolve(e.name(), false);
    match ns {
        ResolveResult::Bound(n) => Some(n.as_ref().to_vec()),
        _ => None,
    }
}

/// The base URI in effect for an element: the HTML `base` attribute wins
/// over `xml:base`, both resolved against the enclosing base.
fn element_base<R>(reader: &NsReader<R>, e: &BytesStart<'_>, current: &Url) -> Url {
    let in_html = element_ns(reader, e).as_deref() == Some(HTML_NAMESPACE.as_bytes());
    let mut html_base: Option<String> = None;
    let mut xml_base: Option<String> = None;

    for attr in e.attributes().flatten() {
        let (ares, local) = reader.resolve(attr.key, true);
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match ares {
            ResolveResult::Unbound if in_html && local.as_ref() == b"base" => {
                html_base = Some(value)
            }
            ResolveResult::Bound(n)
                if n.as_ref() == XML_NAMESPACE.as_bytes() && local.as_ref() == b"base" =>
            {
                xml_base = Some(value)
            }
            _ => {}
        }
    }

    match html_base.or(xml_base) {
        Some(reference) => match current.join(&reference) {
            Ok(b) => b,
            Err(err) => {
                warn!("ignoring unresolvable base {:?}: {}", reference, err);
                current.clone()
            }
        },
        None => current.clone(),
    }
}

fn check_resource<R>(
    reader: &NsReader<R>,
    e: &BytesStart<'_>,
    base: &Url,
    nature: &str,
    purpose: &str,
    found: &mut Option<Url>,
) {
    if found.is_some() {
        return;
    }
    if element_ns(reader, e).as_deref() != Some(RDDL_NAMESPACE.as_bytes())
        || e.local_name().as_ref() != b"resource"
    {
        return;
    }

    let mut role: Option<String> = None;
    let mut arcrole: Option<String> = None;
    let mut href: Option<String> = None;

    for attr in e.attributes().flatten() {
        let (ares, local) = reader.resolve(attr.key, true);
        match ares {
            ResolveResult::Bound(n) if n.as_ref() == XLINK_NAMESPACE.as_bytes() => {}
            _ => continue,
        }
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match local.as_ref() {
            b"role" => role = Some(value),
            b"arcrole" => arcrole = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }

    if role.as_deref() == Some(nature) && arcrole.as_deref() == Some(purpose) {
        if let Some(h) = href {
            match base.join(&h) {
                Ok(abs) => *found = Some(abs),
                Err(err) => warn!("ignoring unresolvable RDDL href {:?}: {}", h, err),
            }
        }
    }
}
