// src/ingest/xml.rs
//! Two-step feed decode: XML text -> loose element tree -> raw entries.
//!
//! The tree keeps local element names (namespace prefixes dropped), attributes,
//! and concatenated text. Entity references (XML and HTML) are decoded; CDATA
//! is kept verbatim. Shape detection on the tree never fails.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{BriefError, Result};
use crate::ingest::types::{RawItem, RawLink};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text of the first child called `name`, if it has any.
    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.clone())
    }
}

fn decode_entities(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&s).into_owned()
}

fn open_node(e: &BytesStart<'_>) -> XmlNode {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let attrs = e
        .attributes()
        .flatten()
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned(),
                decode_entities(&a.value),
            )
        })
        .collect();
    XmlNode {
        name,
        attrs,
        ..Default::default()
    }
}

/// Parse a document into its root element.
pub fn parse_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let ev = reader.read_event().map_err(|e| {
            BriefError::Parse(format!(
                "xml error at byte {}: {e}",
                reader.error_position()
            ))
        })?;
        match ev {
            Event::Start(e) => stack.push(open_node(&e)),
            Event::Empty(e) => {
                let node = open_node(&e);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Event::End(_) => {
                let Some(node) = stack.pop() else {
                    return Err(BriefError::Parse("unbalanced end tag".into()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Event::Text(t) => {
                if let Some(cur) = stack.last_mut() {
                    cur.text.push_str(&decode_entities(&t.into_inner()));
                }
            }
            Event::CData(c) => {
                if let Some(cur) = stack.last_mut() {
                    cur.text
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(BriefError::Parse("unexpected end of document".into()));
    }
    root.ok_or_else(|| BriefError::Parse("document has no root element".into()))
}

/// Pick the entry list out of an RSS (`rss > channel > item`) or Atom
/// (`feed > entry`) tree. Any other shape yields no entries.
pub fn raw_items(root: &XmlNode) -> Vec<RawItem> {
    let entries: Vec<&XmlNode> = match root.name.as_str() {
        "rss" => root
            .child("channel")
            .map(|ch| ch.children_named("item").collect())
            .unwrap_or_default(),
        "feed" => root.children_named("entry").collect(),
        _ => Vec::new(),
    };
    entries.into_iter().map(raw_item_from_node).collect()
}

fn raw_item_from_node(node: &XmlNode) -> RawItem {
    let link = node.child("link").map(|l| {
        if l.text.trim().is_empty() {
            RawLink::Object {
                href: l.attr("href").map(str::to_string),
            }
        } else {
            RawLink::Url(l.text.clone())
        }
    });

    // Atom entries carry dates and summaries under other names.
    let pub_date = node
        .child_text("pubDate")
        .or_else(|| node.child_text("published"))
        .or_else(|| node.child_text("updated"));
    let description = node
        .child_text("description")
        .or_else(|| node.child_text("summary"))
        .or_else(|| node.child_text("content"));

    RawItem {
        title: node.child_text("title"),
        link,
        pub_date,
        description,
    }
}

/// Convenience: text to raw entries in one go.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>> {
    let root = parse_tree(xml)?;
    Ok(raw_items(&root))
}
