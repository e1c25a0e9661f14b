//! End-to-end resolution tests
//!
//! These tests exercise the public API over real catalog files and
//! documents on disk: catalog lookup, resource retrieval, RDDL
//! post-processing, and jar/classpath masking.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use url::Url;
use xmlcatalog::{nature, purpose, DirectoryLoader, Resolver, ResolverConfig, ResourceRequest};

fn write_catalog(path: &Path, body: &str) {
    let content = format!(
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
{}
</catalog>"#,
        body
    );
    fs::write(path, content).unwrap();
}

fn resolver_with(dir: &TempDir, catalog_body: &str) -> Resolver {
    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(&catalog_path, catalog_body);
    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    Resolver::new(config)
}

fn body_of(mut resp: xmlcatalog::ResourceResponse) -> Vec<u8> {
    let mut buf = Vec::new();
    resp.stream.take().unwrap().read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn data_uri_resolution() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(
        &dir,
        r#"<uri name="http://example.com/example.xml"
       uri="data:application/xml;base64,PGRvYz5JIHdhcyBhIGRhdGEgVVJJPC9kb2M+Cg=="/>"#,
    );

    let req = resolver.request("http://example.com/example.xml");
    let resp = resolver.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    assert_eq!(resp.status_code, Some(200));
    assert_eq!(resp.content_type(), Some("application/xml"));
    assert_eq!(body_of(resp), b"<doc>I was a data URI</doc>\n");
}

#[test]
fn system_identifier_resolution() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(
        &dir,
        r#"<system systemId="-//OASIS//DTD DocBook XML V4.5//EN" uri="file:///cat/docbook.dtd"/>"#,
    );

    let req = resolver.entity_request(
        None,
        None,
        Some("-//OASIS//DTD DocBook XML V4.5//EN"),
        None,
    );
    let lookup = resolver.lookup(&req).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///cat/docbook.dtd");
}

#[test]
fn rewrite_uri_resolution() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(
        &dir,
        r#"<rewriteURI uriStartString="https://w3.org/" rewritePrefix="file:///mirror/w3/"/>"#,
    );

    let req = resolver.request("https://w3.org/XML/1998/namespace");
    let lookup = resolver.lookup(&req).unwrap();
    assert!(lookup.found);
    assert_eq!(
        lookup.uri.unwrap().as_str(),
        "file:///mirror/w3/XML/1998/namespace"
    );
}

#[test]
fn next_catalog_with_back_edge_terminates() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root.xml");
    let b = dir.path().join("b.xml");
    write_catalog(&root, r#"<nextCatalog catalog="b.xml"/>"#);
    write_catalog(
        &b,
        r#"<uri name="X" uri="file:///u"/>
  <nextCatalog catalog="root.xml"/>"#,
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![root.to_string_lossy().to_string()];
    config.always_resolve = false;
    let resolver = Resolver::new(config);

    let lookup = resolver.lookup(&resolver.request("X")).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///u");

    // a miss also terminates despite the cycle
    let lookup = resolver.lookup(&resolver.request("Y")).unwrap();
    assert!(!lookup.found);
}

#[test]
fn delegation_isolates() {
    let dir = TempDir::new().unwrap();
    let d = dir.path().join("d.xml");
    write_catalog(&d, r#"<uri name="http://ex/foo" uri="file:///f"/>"#);
    let resolver = resolver_with(
        &dir,
        r#"<delegateURI uriStartString="http://ex/" catalog="d.xml"/>"#,
    );

    let lookup = resolver
        .lookup(&resolver.request("http://ex/foo"))
        .unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///f");

    let lookup = resolver
        .lookup(&resolver.request("http://ex/bar"))
        .unwrap();
    assert!(!lookup.found);
}

#[test]
fn absolute_uri_outside_catalogs() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("doc.xml");
    fs::write(&doc, "<doc/>").unwrap();
    let doc_url = Url::from_file_path(&doc).unwrap();

    // not in any catalog, always_resolve off: unresolved
    let resolver = resolver_with(&dir, "");
    let resp = resolver.resolve(&resolver.request(doc_url.as_str())).unwrap();
    assert!(!resp.is_resolved());

    // always_resolve on: fetched directly
    let catalog_path = dir.path().join("catalog.xml");
    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = true;
    let resolver = Resolver::new(config);
    let resp = resolver.resolve(&resolver.request(doc_url.as_str())).unwrap();
    assert!(resp.is_resolved());
    assert_eq!(resp.status_code, Some(200));
    assert_eq!(body_of(resp), b"<doc/>");
}

#[test]
fn rddl_selects_resource_by_nature_and_purpose() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();

    // the namespace document, served from disk with an http xml:base
    let html = r#"<html xmlns="http://www.w3.org/1999/xhtml"
      xmlns:rddl="http://www.rddl.org/"
      xmlns:xlink="http://www.w3.org/1999/xlink">
<body xml:base="http://ns.example/docs/">
  <rddl:resource xlink:role="http://www.w3.org/2001/XMLSchema"
                 xlink:arcrole="http://www.rddl.org/purposes#schema-validation"
                 xlink:href="sample.xsd"/>
</body>
</html>"#;
    fs::write(dir.path().join("sample.html"), html).unwrap();
    fs::write(docs.join("sample.xsd"), "<xs:schema/>").unwrap();

    let sample_html = Url::from_file_path(dir.path().join("sample.html")).unwrap();
    let sample_xsd = Url::from_file_path(docs.join("sample.xsd")).unwrap();

    // the RDDL href resolves to http://ns.example/docs/sample.xsd, which
    // the catalog maps onto the local file
    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(
        &catalog_path,
        &format!(
            r#"<uri name="http://ns.example/sample" uri="{}"/>
  <uri name="http://ns.example/docs/sample.xsd" uri="{}"/>"#,
            sample_html, sample_xsd
        ),
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    config.parse_rddl = true;
    let resolver = Resolver::new(config);

    let req = resolver.namespace_request(
        "http://ns.example/sample",
        None,
        Some(nature::XML_SCHEMA),
        Some(purpose::SCHEMA_VALIDATION),
    );
    let resp = resolver.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    assert_eq!(resp.resolved_uri.as_ref().unwrap(), &sample_xsd);
    assert_eq!(body_of(resp), b"<xs:schema/>");
}

#[test]
fn rddl_href_used_directly_when_not_in_catalog() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("sample.xsd"), "<xs:schema/>").unwrap();

    let docs_url = Url::from_directory_path(&docs).unwrap();
    let html = format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"
      xmlns:rddl="http://www.rddl.org/"
      xmlns:xlink="http://www.w3.org/1999/xlink">
<body xml:base="{}">
  <rddl:resource xlink:role="http://www.w3.org/2001/XMLSchema"
                 xlink:arcrole="http://www.rddl.org/purposes#schema-validation"
                 xlink:href="sample.xsd"/>
</body>
</html>"#,
        docs_url
    );
    fs::write(dir.path().join("sample.html"), html).unwrap();
    let sample_html = Url::from_file_path(dir.path().join("sample.html")).unwrap();

    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(
        &catalog_path,
        &format!(
            r#"<uri name="http://ns.example/sample" uri="{}"/>"#,
            sample_html
        ),
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    config.parse_rddl = true;
    let resolver = Resolver::new(config);

    let req = resolver.namespace_request(
        "http://ns.example/sample",
        None,
        Some(nature::XML_SCHEMA),
        Some(purpose::SCHEMA_VALIDATION),
    );
    let resp = resolver.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    let resolved = resp.resolved_uri.clone().unwrap();
    assert!(resolved.as_str().ends_with("/sample.xsd"));
    assert_eq!(body_of(resp), b"<xs:schema/>");
}

#[test]
fn rddl_disabled_returns_namespace_document() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sample.html"), "<html/>").unwrap();
    let sample_html = Url::from_file_path(dir.path().join("sample.html")).unwrap();

    let resolver = resolver_with(
        &dir,
        &format!(
            r#"<uri name="http://ns.example/sample" uri="{}"/>"#,
            sample_html
        ),
    );

    let req = resolver.namespace_request(
        "http://ns.example/sample",
        None,
        Some(nature::XML_SCHEMA),
        Some(purpose::SCHEMA_VALIDATION),
    );
    let resp = resolver.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    assert_eq!(resp.resolved_uri.as_ref().unwrap(), &sample_html);
    assert_eq!(resp.content_type(), Some("text/html"));
}

#[test]
fn rddl_failure_falls_back_to_catalog_result() {
    let dir = TempDir::new().unwrap();
    // served as text/html but not well-formed XML
    fs::write(dir.path().join("broken.html"), "<html><p></div></html>").unwrap();
    let broken = Url::from_file_path(dir.path().join("broken.html")).unwrap();

    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(
        &catalog_path,
        &format!(r#"<uri name="http://ns.example/sample" uri="{}"/>"#, broken),
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    config.parse_rddl = true;
    let resolver = Resolver::new(config);

    let req = resolver.namespace_request(
        "http://ns.example/sample",
        None,
        Some(nature::XML_SCHEMA),
        Some(purpose::SCHEMA_VALIDATION),
    );
    let resp = resolver.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    assert_eq!(resp.resolved_uri.as_ref().unwrap(), &broken);
}

#[test]
fn classpath_masking() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("res");
    fs::create_dir_all(&res).unwrap();
    fs::write(res.join("thing.xml"), "<thing/>").unwrap();

    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(
        &catalog_path,
        r#"<uri name="urn:thing" uri="classpath:res/thing.xml"/>"#,
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    config.resource_loader = Arc::new(DirectoryLoader::new(vec![dir.path().to_path_buf()]));
    let masked = Resolver::new(config.clone());

    let req = masked.request("urn:thing");
    let resp = masked.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    // the requester sees its own URI; the classpath URI is the local one
    assert_eq!(resp.resolved_uri.as_ref().unwrap().as_str(), "urn:thing");
    assert_eq!(
        resp.local_uri.as_ref().unwrap().as_str(),
        "classpath:res/thing.xml"
    );
    assert_eq!(body_of(resp), b"<thing/>");

    config.mask_jar_uris = false;
    let unmasked = Resolver::new(config);
    let resp = unmasked.resolve(&req).unwrap();
    assert!(resp.is_resolved());
    let resolved = resp.resolved_uri.clone().unwrap();
    assert_eq!(resolved.scheme(), "file");
    assert_eq!(resp.local_uri.as_ref().unwrap(), &resolved);
    assert_eq!(body_of(resp), b"<thing/>");
}

#[test]
fn prefer_system_in_group_scopes_public_entries() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(
        &dir,
        r#"<group prefer="system">
    <public publicId="-//Scoped//EN" uri="file:///scoped.dtd"/>
  </group>
  <public publicId="-//Open//EN" uri="file:///open.dtd"/>"#,
    );

    // inside the prefer="system" group: blocked when a system id is given
    let req = resolver.entity_request(None, Some("-//Scoped//EN"), Some("urn:nomatch"), None);
    assert!(!resolver.lookup(&req).unwrap().found);

    // outside the group the catalog default (public) applies
    let req = resolver.entity_request(None, Some("-//Open//EN"), Some("urn:nomatch"), None);
    let lookup = resolver.lookup(&req).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///open.dtd");

    // without a system id the scoped entry still matches
    let req = resolver.entity_request(None, Some("-//Scoped//EN"), None, None);
    assert!(resolver.lookup(&req).unwrap().found);
}

#[test]
fn catalog_additions_follow_primary() {
    let dir = TempDir::new().unwrap();
    let primary = dir.path().join("primary.xml");
    let addition = dir.path().join("addition.xml");
    write_catalog(&primary, r#"<uri name="urn:p" uri="file:///primary"/>"#);
    write_catalog(
        &addition,
        r#"<uri name="urn:p" uri="file:///shadowed"/>
  <uri name="urn:a" uri="file:///addition"/>"#,
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![primary.to_string_lossy().to_string()];
    config.catalog_additions = vec![addition.to_string_lossy().to_string()];
    config.always_resolve = false;
    let resolver = Resolver::new(config);

    let lookup = resolver.lookup(&resolver.request("urn:p")).unwrap();
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///primary");
    let lookup = resolver.lookup(&resolver.request("urn:a")).unwrap();
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///addition");
}

#[test]
fn strict_loader_rejects_what_tolerant_accepts() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.xml");
    write_catalog(
        &catalog_path,
        r#"<system uri="file:///missing-system-id.dtd"/>
  <uri name="urn:ok" uri="file:///ok"/>"#,
    );

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    let tolerant = Resolver::new(config.clone());
    assert!(tolerant.lookup(&tolerant.request("urn:ok")).unwrap().found);

    config.strict_catalogs = true;
    let strict = Resolver::new(config);
    // the whole catalog is rejected, so nothing resolves
    assert!(!strict.lookup(&strict.request("urn:ok")).unwrap().found);
}

#[test]
fn entity_name_lookup() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.xml");
    let content = r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog"
         xmlns:tr="urn:oasis:names:tc:entity:xmlns:tr9401:catalog">
  <tr:entity name="chap1" uri="file:///cat/chap1.xml"/>
</catalog>"#;
    fs::write(&catalog_path, content).unwrap();

    let mut config = ResolverConfig::default();
    config.catalog_files = vec![catalog_path.to_string_lossy().to_string()];
    config.always_resolve = false;
    let resolver = Resolver::new(config);

    let req = resolver.entity_request(Some("chap1"), None, None, None);
    let lookup = resolver.lookup(&req).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///cat/chap1.xml");
}

#[test]
fn lookup_never_opens_a_stream() {
    let dir = TempDir::new().unwrap();
    // the mapped target does not exist; lookup must still succeed
    let resolver = resolver_with(
        &dir,
        r#"<uri name="urn:ghost" uri="file:///nowhere/ghost.xml"/>"#,
    );
    let lookup = resolver.lookup(&resolver.request("urn:ghost")).unwrap();
    assert!(lookup.found);
    assert_eq!(lookup.uri.unwrap().as_str(), "file:///nowhere/ghost.xml");
}

#[test]
fn empty_request_is_a_miss() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(&dir, r#"<uri name="urn:x" uri="file:///x"/>"#);
    let req = ResourceRequest::new(None, None);
    assert!(!resolver.lookup(&req).unwrap().found);
}
