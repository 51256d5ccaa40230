// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The decoded document tree.

use std::fmt;

/// Attribute name with an optional namespace prefix, rendered as `prefix:local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeName {
    prefix: Option<String>,
    local: String,
}

impl AttributeName {
    pub fn new(prefix: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Compare against a rendered `prefix:local` (or bare `local`) name.
    #[must_use]
    pub fn matches(&self, qualified: &str) -> bool {
        match (&self.prefix, qualified.split_once(':')) {
            (Some(prefix), Some((p, local))) => prefix == p && self.local == local,
            (None, None) => self.local == qualified,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Attributes of an element in document order. Duplicate names are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(AttributeName, String)>);

impl Attributes {
    pub(super) fn push(&mut self, name: AttributeName, value: String) {
        self.0.push((name, value));
    }

    /// Value of the first attribute named `qualified` (e.g. `android:name`).
    #[must_use]
    pub fn get(&self, qualified: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name.matches(qualified))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeName, &str)> {
        self.0.iter().map(|(name, value)| (name, value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A manifest element: tag, ordered attributes, ordered children and optional character data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Attributes,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    pub(super) fn new(tag: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            children: Vec::new(),
            text: None,
        }
    }

    pub(super) fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub(super) fn push_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Shorthand for `attributes().get(qualified)`.
    #[must_use]
    pub fn attribute(&self, qualified: &str) -> Option<&str> {
        self.attributes.get(qualified)
    }

    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Direct children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// First direct child with the given tag.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}
