//! Generic labelled rule-tree node.
//!
//! Response and outcome processing trees arrive already parsed from the
//! assessment documents. The interpreter only ever reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One element of a processing tree: tag name, attributes, ordered children
/// and optional text content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The normalised tag used for registry lookups.
    pub fn tag(&self) -> String {
        normalize_tag(&self.name)
    }

    /// Look up an attribute ignoring case and dashes, so `base-type`,
    /// `baseType` and `BASE-TYPE` all match.
    pub fn attr(&self, name: &str) -> Option<&str> {
        let wanted = normalize_attr(name);
        self.attributes
            .iter()
            .find(|(key, _)| normalize_attr(key) == wanted)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, treating empty or whitespace-only values as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.trim().is_empty())
    }

    /// The `identifier` attribute, or an empty string.
    pub fn identifier(&self) -> &str {
        self.attr("identifier").unwrap_or_default()
    }

    /// Text content with any CDATA markers removed.
    pub fn text_value(&self) -> String {
        let raw = self.text.as_deref().unwrap_or_default();
        if raw.contains("<![CDATA[") {
            raw.replace("<![CDATA[", "").replace("]]>", "")
        } else {
            raw.to_string()
        }
    }

    /// Depth-first iterator over this node and all its descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Normalise a tag so QTI 2 (`responseCondition`) and QTI 3
/// (`qti-response-condition`) spellings compare equal.
pub fn normalize_tag(tag: &str) -> String {
    let local = tag.rsplit(':').next().unwrap_or(tag);
    let lower = local.to_ascii_lowercase();
    let without_prefix = lower.strip_prefix("qti-").unwrap_or(&lower);
    without_prefix.chars().filter(|c| *c != '-').collect()
}

fn normalize_attr(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
