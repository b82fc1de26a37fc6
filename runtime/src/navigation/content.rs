// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page snapshot types and the in-page scripts that produce them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything captured from a rendered page in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    pub title: String,
    pub url: String,
    pub html: String,
    /// Visible text, whitespace-collapsed.
    pub text: String,
    pub links: Vec<LinkInfo>,
    pub images: Vec<ImageInfo>,
    pub forms: Vec<FormInfo>,
    /// External script sources.
    pub scripts: Vec<String>,
    /// Meta name/property → content, plus `title` and `canonical`.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormInfo {
    #[serde(default)]
    pub action: String,
    pub method: String,
    /// `"name (type)"` for each named input.
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// Element summary returned by visibility and diagnostic probes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub text: String,
}

/// Raw shape returned by [`SNAPSHOT_SCRIPT`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<LinkInfo>,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
    #[serde(default)]
    pub forms: Vec<FormInfo>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub canonical: Option<String>,
}

impl PageContent {
    pub fn from_snapshot(title: String, url: String, html: String, snap: PageSnapshot) -> Self {
        let mut metadata = snap.meta;
        metadata.insert("title".to_string(), title.clone());
        if let Some(canonical) = snap.canonical.filter(|c| !c.is_empty()) {
            metadata.insert("canonical".to_string(), canonical);
        }
        Self {
            title,
            url,
            html,
            text: snap.text,
            links: snap.links,
            images: snap.images,
            forms: snap.forms,
            scripts: snap.scripts,
            metadata,
        }
    }
}

pub const READY_STATE_SCRIPT: &str = "document.readyState";

/// Collects text, links, images, forms, scripts and meta tags.
///
/// Text nodes under hidden elements and under SCRIPT/STYLE/NOSCRIPT are
/// skipped.
pub const SNAPSHOT_SCRIPT: &str = r#"(() => {
  const visibleText = () => {
    if (!document.body) return '';
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT, {
      acceptNode(node) {
        const parent = node.parentElement;
        if (!parent) return NodeFilter.FILTER_REJECT;
        if (['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(parent.tagName)) return NodeFilter.FILTER_REJECT;
        const style = window.getComputedStyle(parent);
        if (style.display === 'none' || style.visibility === 'hidden') return NodeFilter.FILTER_REJECT;
        return NodeFilter.FILTER_ACCEPT;
      }
    });
    let text = '';
    let node;
    while ((node = walker.nextNode())) text += node.textContent + ' ';
    return text.trim().replace(/\s+/g, ' ');
  };
  const attr = (el, name) => el.getAttribute(name) || '';
  const links = Array.from(document.querySelectorAll('a'))
    .filter(a => a.href)
    .map(a => ({ url: a.href, text: (a.innerText || '').trim(), title: attr(a, 'title') }));
  const images = Array.from(document.querySelectorAll('img'))
    .filter(i => i.src)
    .map(i => ({ src: i.src, alt: attr(i, 'alt'), title: attr(i, 'title') }));
  const forms = Array.from(document.querySelectorAll('form')).map(f => ({
    action: attr(f, 'action'),
    method: (attr(f, 'method') || 'GET').toUpperCase(),
    inputs: Array.from(f.querySelectorAll('input'))
      .filter(i => i.name)
      .map(i => `${i.name} (${i.getAttribute('type') || 'text'})`)
  }));
  const scripts = Array.from(document.querySelectorAll('script[src]')).map(s => s.src);
  const meta = {};
  document.querySelectorAll('meta').forEach(m => {
    const name = m.getAttribute('name') || m.getAttribute('property');
    const content = m.getAttribute('content');
    if (name && content) meta[name] = content;
  });
  const canonical = document.querySelector("link[rel='canonical']");
  return {
    text: visibleText(),
    links, images, forms, scripts, meta,
    canonical: canonical ? canonical.href : null
  };
})()"#;

/// Elements whose id or class mentions "root", for timeout diagnostics.
pub const ROOT_CANDIDATES_SCRIPT: &str = r#"Array.from(document.querySelectorAll('[id*="root"], [class*="root"]'))
  .slice(0, 25)
  .map(el => ({ tag: el.tagName, id: el.id || '', class: (typeof el.className === 'string' ? el.className : ''), text: '' }))"#;

/// Marker embedded in visibility probes so scripted sessions can route them.
pub const VISIBLE_PROBE_MARKER: &str = "__pricewatch_visible";

/// Script returning an [`ElementInfo`] when `selector` matches a visible
/// element, otherwise `null`.
pub fn visible_element_script(selector: &str) -> String {
    // JSON-encode the selector so quotes inside it cannot break the script.
    let encoded = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        r#"(function {VISIBLE_PROBE_MARKER}(sel) {{
  let el;
  try {{ el = document.querySelector(sel); }} catch (e) {{ return null; }}
  if (!el) return null;
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  if (style.display === 'none' || style.visibility === 'hidden' || (rect.width === 0 && rect.height === 0)) return null;
  return {{ tag: el.tagName, id: el.id || '', class: (typeof el.className === 'string' ? el.className : ''), text: (el.innerText || '').slice(0, 200) }};
}})({encoded})"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_script_escapes_selector() {
        let script = visible_element_script(r#"div[data-x="a"]"#);
        assert!(script.contains(VISIBLE_PROBE_MARKER));
        assert!(script.contains(r#"("div[data-x=\"a\"]")"#));
    }

    #[test]
    fn test_from_snapshot_adds_title_and_canonical() {
        let snap: PageSnapshot = serde_json::from_value(serde_json::json!({
            "text": "Hello world",
            "links": [{"url": "https://a.example/x", "text": "x", "title": ""}],
            "forms": [{"action": "/search", "method": "GET", "inputs": ["q (text)"]}],
            "meta": {"og:title": "Shop"},
            "canonical": "https://a.example/"
        }))
        .unwrap();
        let content = PageContent::from_snapshot(
            "Shop".to_string(),
            "https://a.example/".to_string(),
            "<html></html>".to_string(),
            snap,
        );
        assert_eq!(content.metadata.get("title").map(String::as_str), Some("Shop"));
        assert_eq!(
            content.metadata.get("canonical").map(String::as_str),
            Some("https://a.example/")
        );
        assert_eq!(content.metadata.get("og:title").map(String::as_str), Some("Shop"));
        assert_eq!(content.links.len(), 1);
        assert_eq!(content.forms[0].inputs, vec!["q (text)".to_string()]);
    }
}
