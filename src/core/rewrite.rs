//! Local link discovery and rewriting for staged HTML pages.
//!
//! Links into the shared library (`../../PIE/`) and the shared assets
//! (`/assets/`) are redirected into the dependency bundle. Links to a local
//! copy of the rendering library are reported back so the caller can patch
//! that copy in place.
//!
//! Rewriting works on the raw bytes of each `src`/`href` attribute value,
//! quoted or not, so pages in legacy encodings pass through unchanged apart
//! from the links. The rewritten page is then parsed again and any
//! dependency link that survived is an error.

use std::borrow::Cow;
use std::ops::Range;

use scraper::{Html, Selector};
use thiserror::Error;

use crate::domain::item::ZIPCONTENT_PREFIX;
use crate::domain::DependencyBundle;

/// How pages reference the shared library
pub const SHARED_LIB_REF: &str = "../../PIE/";

/// How pages reference the shared assets
pub const SHARED_ASSETS_REF: &str = "/assets/";

/// Known file names of the rendering library (compared lowercase).
///
/// Only a link whose final path segment equals one of these counts; names
/// that merely contain them (`three.js.map`, `my-three.js`) do not.
pub const RENDERING_LIB_NAMES: [&str; 2] = ["three.js", "three.min.js"];

const LINK_ATTRIBUTES: [&str; 2] = ["src", "href"];
const NON_LOCAL_PREFIXES: [&str; 6] = ["//", "data:", "javascript:", "mailto:", "tel:", "#"];
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Invalid link selector: {0}")]
    Selector(String),

    #[error("Dependency link could not be rewritten: {0}")]
    Unrewritten(String),
}

/// What to do with one local link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Redirect into the dependency bundle
    Redirect { from: String, to: String },
    /// Patch the local rendering library copy this link points at
    PatchRenderingLib(String),
    Keep,
}

/// Result of rewriting one page
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub html: Vec<u8>,
    pub changed: bool,
    /// Set only when at least one link was redirected into the bundle
    pub needs_dependency_bundle: bool,
    /// Local links (relative to the page) naming the rendering library
    pub rendering_libs: Vec<String>,
}

/// True when a file name is one of the rendering library variants
pub fn is_rendering_lib(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    RENDERING_LIB_NAMES.contains(&lower.as_str())
}

/// Link without query string or fragment
pub fn link_path(link: &str) -> &str {
    let end = link.find(['?', '#']).unwrap_or(link.len());
    &link[..end]
}

fn is_local(link: &str) -> bool {
    let lower = link.trim().to_lowercase();
    !lower.is_empty()
        && !lower.contains("://")
        && !NON_LOCAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Collect every local `src`/`href` value in document order, without duplicates
pub fn local_links(html: &str) -> Result<Vec<String>, RewriteError> {
    let selector =
        Selector::parse("[src], [href]").map_err(|e| RewriteError::Selector(e.to_string()))?;
    let document = Html::parse_document(html);

    let mut links: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        for attr in LINK_ATTRIBUTES {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if is_local(value) && !links.iter().any(|l| l == value) {
                    links.push(value.to_string());
                }
            }
        }
    }
    Ok(links)
}

/// Bundle location for a raw link value, if it points at shared content
fn redirect_target(value: &[u8], bundle: &DependencyBundle) -> Option<Vec<u8>> {
    // Already points into an archive
    if find(value, ZIPCONTENT_PREFIX.as_bytes(), 0).is_some() {
        return None;
    }

    for (reference, base) in [
        (SHARED_LIB_REF, bundle.shared_lib_url()),
        (SHARED_ASSETS_REF, bundle.assets_url()),
    ] {
        if let Some(pos) = find(value, reference.as_bytes(), 0) {
            let mut target = base.into_bytes();
            target.extend_from_slice(&value[pos + reference.len()..]);
            return Some(target);
        }
    }
    None
}

/// Decide what to do with one local link
pub fn classify_link(link: &str, bundle: &DependencyBundle) -> LinkAction {
    if link.contains(ZIPCONTENT_PREFIX) {
        return LinkAction::Keep;
    }

    if let Some(target) = redirect_target(link.as_bytes(), bundle) {
        return LinkAction::Redirect {
            from: link.to_string(),
            to: String::from_utf8_lossy(&target).into_owned(),
        };
    }

    let file_name = link_path(link).rsplit('/').next().unwrap_or_default();
    if is_rendering_lib(file_name) {
        return LinkAction::PatchRenderingLib(link_path(link).to_string());
    }

    LinkAction::Keep
}

/// Rewrite the links of one page
pub fn rewrite_html(
    source: &[u8],
    bundle: &DependencyBundle,
) -> Result<RewriteOutcome, RewriteError> {
    let mut outcome = RewriteOutcome::default();
    let mut html = Vec::with_capacity(source.len());
    let mut copied = 0;

    for span in attribute_spans(source) {
        let value = trim_ascii(&source[span.clone()]);
        let text = String::from_utf8_lossy(value);
        let decoded = decode_entities(&text);
        if !is_local(&decoded) {
            continue;
        }

        match redirect_target(value, bundle) {
            Some(target) => {
                html.extend_from_slice(&source[copied..span.start]);
                html.extend_from_slice(&target);
                copied = span.end;
                outcome.changed = true;
                outcome.needs_dependency_bundle = true;
            }
            None => {
                if let LinkAction::PatchRenderingLib(path) = classify_link(&decoded, bundle) {
                    if !outcome.rendering_libs.contains(&path) {
                        outcome.rendering_libs.push(path);
                    }
                }
            }
        }
    }

    html.extend_from_slice(&source[copied..]);
    ensure_rewritten(&html, bundle)?;
    outcome.html = html;
    Ok(outcome)
}

/// Fail if the parsed page still links into the shared library or assets
fn ensure_rewritten(html: &[u8], bundle: &DependencyBundle) -> Result<(), RewriteError> {
    for link in local_links(&String::from_utf8_lossy(html))? {
        if let LinkAction::Redirect { from, .. } = classify_link(&link, bundle) {
            return Err(RewriteError::Unrewritten(from));
        }
    }
    Ok(())
}

/// Byte ranges of every raw `src`/`href` value inside start tags
fn attribute_spans(html: &[u8]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < html.len() {
        if html[i] != b'<' {
            i += 1;
            continue;
        }
        if html[i..].starts_with(b"<!--") {
            i = find(html, b"-->", i + 4).map_or(html.len(), |end| end + 3);
            continue;
        }
        if !html.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let (name, next) = scan_tag(html, i + 1, &mut spans);
        i = next;

        // Script and style bodies are not markup
        if let Some(raw) = RAW_TEXT_ELEMENTS
            .iter()
            .find(|e| name.eq_ignore_ascii_case(e.as_bytes()))
        {
            let close = format!("</{}", raw);
            i = find_ignore_case(html, close.as_bytes(), i).unwrap_or(html.len());
        }
    }

    spans
}

/// Scan one start tag from just after `<`; returns its name and the index past it
fn scan_tag<'a>(html: &'a [u8], mut i: usize, spans: &mut Vec<Range<usize>>) -> (&'a [u8], usize) {
    let name_start = i;
    while i < html.len() && !is_space(html[i]) && !matches!(html[i], b'>' | b'/') {
        i += 1;
    }
    let name = &html[name_start..i];

    loop {
        while i < html.len() && (is_space(html[i]) || html[i] == b'/') {
            i += 1;
        }
        match html.get(i) {
            None => return (name, i),
            Some(b'>') => return (name, i + 1),
            Some(_) => {}
        }

        let attr_start = i;
        while i < html.len() && !is_space(html[i]) && !matches!(html[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let attr = &html[attr_start..i];

        while i < html.len() && is_space(html[i]) {
            i += 1;
        }
        if html.get(i) != Some(&b'=') {
            continue;
        }
        i += 1;
        while i < html.len() && is_space(html[i]) {
            i += 1;
        }

        let (value, next) = match html.get(i) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let start = i + 1;
                let end = find(html, &[quote], start).unwrap_or(html.len());
                (start..end, (end + 1).min(html.len()))
            }
            _ => {
                let start = i;
                while i < html.len() && !is_space(html[i]) && html[i] != b'>' {
                    i += 1;
                }
                (start..i, i)
            }
        };

        if LINK_ATTRIBUTES
            .iter()
            .any(|a| attr.eq_ignore_ascii_case(a.as_bytes()))
        {
            spans.push(value);
        }
        i = next;
    }
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !is_space(*b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_space(*b)).map_or(start, |p| p + 1);
    &bytes[start..end]
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

/// Decode the character references that show up in attribute values
fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArchiveRef;
    use std::path::PathBuf;

    fn bundle() -> DependencyBundle {
        DependencyBundle::new(ArchiveRef {
            hash: "deadbeef".to_string(),
            path: PathBuf::from("/cache/zips/deadbeef.zip"),
        })
    }

    fn rewrite_str(page: &str) -> (RewriteOutcome, String) {
        let outcome = rewrite_html(page.as_bytes(), &bundle()).unwrap();
        let html = String::from_utf8(outcome.html.clone()).unwrap();
        (outcome, html)
    }

    const PAGE: &str = r##"<html><head>
<script src="../../PIE/pie.js"></script>
<link rel="stylesheet" href='../../assets/css/site.css'>
<script src="lib/Three.min.js?v=2"></script>
<script src="https://cdn.example.com/jquery.js"></script>
</head><body><a href="#top">top</a><img src="img/a.png"></body></html>"##;

    #[test]
    fn test_local_links() {
        let links = local_links(PAGE).unwrap();
        assert_eq!(
            links,
            vec![
                "../../PIE/pie.js",
                "../../assets/css/site.css",
                "lib/Three.min.js?v=2",
                "img/a.png",
            ]
        );
    }

    #[test]
    fn test_rewrites_dependency_links() {
        let (outcome, html) = rewrite_str(PAGE);

        assert!(outcome.changed);
        assert!(outcome.needs_dependency_bundle);
        assert!(html.contains(r#"src="/zipcontent/deadbeef.zip/PIE/pie.js""#));
        assert!(html.contains(r#"href='/zipcontent/deadbeef.zip/assets/css/site.css'"#));
        assert!(html.contains(r#"src="img/a.png""#));
        assert!(html.contains("https://cdn.example.com/jquery.js"));
        assert!(html.contains(r##"href="#top""##));
        assert_eq!(outcome.rendering_libs, vec!["lib/Three.min.js"]);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let first = rewrite_html(PAGE.as_bytes(), &bundle()).unwrap();
        let second = rewrite_html(&first.html, &bundle()).unwrap();

        assert!(!second.changed);
        assert!(!second.needs_dependency_bundle);
        assert_eq!(second.html, first.html);
    }

    #[test]
    fn test_unquoted_attribute_is_rewritten() {
        let (outcome, html) = rewrite_str("<script src=../../PIE/pie.js></script>");

        assert!(outcome.changed);
        assert!(outcome.needs_dependency_bundle);
        assert_eq!(
            html,
            "<script src=/zipcontent/deadbeef.zip/PIE/pie.js></script>"
        );
    }

    #[test]
    fn test_entities_in_value_are_kept() {
        let (outcome, html) =
            rewrite_str(r#"<link rel="stylesheet" href="/assets/x.css?a=1&amp;b=2">"#);

        assert!(outcome.needs_dependency_bundle);
        assert_eq!(
            html,
            r#"<link rel="stylesheet" href="/zipcontent/deadbeef.zip/assets/x.css?a=1&amp;b=2">"#
        );
    }

    #[test]
    fn test_padded_value_is_rewritten() {
        let (outcome, html) = rewrite_str("<script src=\" ../../PIE/pie.js \"></script>");

        assert!(outcome.needs_dependency_bundle);
        assert_eq!(
            html,
            r#"<script src="/zipcontent/deadbeef.zip/PIE/pie.js"></script>"#
        );
    }

    #[test]
    fn test_attribute_name_case_and_spacing() {
        let (_, html) = rewrite_str("<IMG SRC = '../../PIE/a.png'>");
        assert_eq!(html, "<IMG SRC = '/zipcontent/deadbeef.zip/PIE/a.png'>");
    }

    #[test]
    fn test_encoded_reference_is_an_error() {
        let page = r#"<script src="&#46;&#46;/&#46;&#46;/PIE/pie.js"></script>"#;
        assert!(matches!(
            rewrite_html(page.as_bytes(), &bundle()),
            Err(RewriteError::Unrewritten(_))
        ));
    }

    #[test]
    fn test_comments_and_script_bodies_untouched() {
        let page = concat!(
            "<!-- <script src=\"../../PIE/old.js\"></script> -->",
            "<script>if (a<b) { s = '\"'; }</script>",
            "<img src=\"../../PIE/a.png\">"
        );
        let (outcome, html) = rewrite_str(page);

        assert!(html.starts_with("<!-- <script src=\"../../PIE/old.js\"></script> -->"));
        assert!(html.contains("if (a<b) { s = '\"'; }"));
        assert!(html.ends_with("<img src=\"/zipcontent/deadbeef.zip/PIE/a.png\">"));
        assert!(outcome.needs_dependency_bundle);
    }

    #[test]
    fn test_page_without_shared_links() {
        let page = br#"<html><body><script src="main.js"></script></body></html>"#;
        let outcome = rewrite_html(page, &bundle()).unwrap();

        assert!(!outcome.changed);
        assert!(!outcome.needs_dependency_bundle);
        assert_eq!(outcome.html, page.to_vec());
    }

    #[test]
    fn test_non_utf8_bytes_survive() {
        let mut page = b"<html><body>\xe9t\xe9 <script src=\"../../PIE/a.js\"></script>".to_vec();
        page.extend_from_slice(b"</body></html>");

        let outcome = rewrite_html(&page, &bundle()).unwrap();
        assert!(outcome.html.starts_with(b"<html><body>\xe9t\xe9 "));
        assert!(outcome
            .html
            .windows(7)
            .any(|w| w == b"/zipcon"));
    }

    #[test]
    fn test_rendering_lib_names() {
        assert!(is_rendering_lib("Three.js"));
        assert!(is_rendering_lib("THREE.MIN.JS"));
        assert!(!is_rendering_lib("three.json"));
        assert!(!is_rendering_lib("my-three.js"));
        assert!(!is_rendering_lib("OrbitControls.js"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&amp;b&#47;c&#x2F;d"), "a&b/c/d");
        assert_eq!(decode_entities("a & b"), "a & b");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_shared_lib_rendering_copy_is_redirected_not_patched() {
        assert_eq!(
            classify_link("../../PIE/three.js", &bundle()),
            LinkAction::Redirect {
                from: "../../PIE/three.js".to_string(),
                to: "/zipcontent/deadbeef.zip/PIE/three.js".to_string(),
            }
        );
    }
}
