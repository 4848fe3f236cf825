//! Node capability set.
//!
//! A `Node` is an immutable handle onto a working set of zero, one or many
//! positions in a parsed document. Every operation returns a new value; none
//! of them touch the underlying tree.

use crate::error::SelectorError;

/// What any addressable point in a document tree can do.
///
/// Extraction methods (`inner_markup`, `outer_markup`, `text`, `tag_name`,
/// `attribute`) look at the *first* position of the working set only and
/// return `None` when the working set is empty. Navigation methods
/// (`narrow`, `next_sibling`, `next_siblings`) act on *every* position.
pub trait Node: Clone + Sized {
    /// Replace the working set with the descendant matches of `selector`
    /// below every current position. Never ascends or moves sideways.
    fn narrow(&self, selector: &str) -> Result<Self, SelectorError>;

    /// Number of positions in the working set.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One independent single-position node per working set entry, in
    /// document order.
    fn split(&self) -> Vec<Self>;

    /// Serialized markup of the first position's children.
    fn inner_markup(&self) -> Option<String>;

    /// Serialized markup of the first position itself.
    fn outer_markup(&self) -> Option<String>;

    /// Concatenated text below the first position.
    fn text(&self) -> Option<String>;

    /// Tag name of the first position.
    fn tag_name(&self) -> Option<String>;

    /// Value of attribute `name` on the first position.
    fn attribute(&self, name: &str) -> Option<String>;

    /// All descendant matches of `selector`, each as its own node.
    fn descendants(&self, selector: &str) -> Result<Vec<Self>, SelectorError> {
        Ok(self.narrow(selector)?.split())
    }

    /// The element immediately following each position.
    fn next_sibling(&self) -> Self;

    /// Every element following each position, in traversal order.
    fn next_siblings(&self) -> Self;
}
