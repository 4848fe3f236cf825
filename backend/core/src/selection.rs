//! `scraper`-backed implementation of [`Node`].

use std::collections::HashSet;
use std::ops::Deref;

use scraper::{ElementRef, Html, Selector};

use crate::error::SelectorError;
use crate::node::Node;

/// Name reported by `tag_name` for the document node.
pub const DOCUMENT_NODE_NAME: &str = "#document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position<'a> {
    Document,
    Element(ElementRef<'a>),
}

/// A working set of positions inside one parsed [`Html`] document.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    doc: &'a Html,
    positions: Vec<Position<'a>>,
}

impl<'a> Selection<'a> {
    /// The document node of `doc`.
    pub fn document(doc: &'a Html) -> Self {
        Self {
            doc,
            positions: vec![Position::Document],
        }
    }

    /// Builds a selection from matched elements, dropping repeats while
    /// keeping first-seen order.
    fn from_elements(doc: &'a Html, elements: impl IntoIterator<Item = ElementRef<'a>>) -> Self {
        let mut seen = HashSet::new();
        let positions = elements
            .into_iter()
            .filter(|el| seen.insert(Deref::deref(el).id()))
            .map(Position::Element)
            .collect();
        Self { doc, positions }
    }

    fn first(&self) -> Option<Position<'a>> {
        self.positions.first().copied()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'a>> + '_ {
        self.positions.iter().filter_map(|pos| match pos {
            Position::Element(el) => Some(*el),
            Position::Document => None,
        })
    }
}

impl<'a> Node for Selection<'a> {
    fn narrow(&self, selector: &str) -> Result<Self, SelectorError> {
        let compiled =
            Selector::parse(selector).map_err(|e| SelectorError::new(selector, e.to_string()))?;

        let mut matches = Vec::new();
        for pos in &self.positions {
            match pos {
                Position::Document => matches.extend(self.doc.select(&compiled)),
                Position::Element(el) => matches.extend(el.select(&compiled)),
            }
        }
        Ok(Self::from_elements(self.doc, matches))
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn split(&self) -> Vec<Self> {
        self.positions
            .iter()
            .map(|pos| Self {
                doc: self.doc,
                positions: vec![*pos],
            })
            .collect()
    }

    fn inner_markup(&self) -> Option<String> {
        match self.first()? {
            Position::Document => Some(self.doc.html()),
            Position::Element(el) => Some(el.inner_html()),
        }
    }

    fn outer_markup(&self) -> Option<String> {
        // The document node has no markup of its own; render its children.
        match self.first()? {
            Position::Document => Some(self.doc.html()),
            Position::Element(el) => Some(el.html()),
        }
    }

    fn text(&self) -> Option<String> {
        match self.first()? {
            Position::Document => Some(self.doc.root_element().text().collect()),
            Position::Element(el) => Some(el.text().collect()),
        }
    }

    fn tag_name(&self) -> Option<String> {
        match self.first()? {
            Position::Document => Some(DOCUMENT_NODE_NAME.to_string()),
            Position::Element(el) => Some(el.value().name().to_string()),
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match self.first()? {
            Position::Document => None,
            Position::Element(el) => el.value().attr(name).map(str::to_string),
        }
    }

    fn next_sibling(&self) -> Self {
        let siblings = self
            .elements()
            .filter_map(|el| el.next_siblings().find_map(ElementRef::wrap));
        Self::from_elements(self.doc, siblings)
    }

    fn next_siblings(&self) -> Self {
        let siblings = self
            .elements()
            .flat_map(|el| el.next_siblings().filter_map(ElementRef::wrap));
        Self::from_elements(self.doc, siblings)
    }
}
