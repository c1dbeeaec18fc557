//! Tag block rules compiled into a trie
//!
//! A user hides posts by listing block rules. Each rule is a conjunction of tag
//! conditions: a plain tag must be present on the post, a tag prefixed with `-`
//! must be absent. A post is blocked when any one rule is fully satisfied.
//!
//! Rules are compiled once into a [`BlockTree`] whose paths are the rules'
//! condition sequences; rules sharing a prefix share nodes. Evaluation walks
//! only the branches whose condition holds for the post's tags and stops at the
//! first rule end it reaches.
//!
//! # Example
//!
//! ```
//! use moderation::block_tree::BlockTree;
//! use std::collections::HashSet;
//!
//! let tree = BlockTree::build([vec!["female", "-anthro"]]);
//!
//! let tags: HashSet<&str> = ["female"].into_iter().collect();
//! assert!(tree.is_blocked(&tags));
//!
//! let tags: HashSet<&str> = ["female", "anthro"].into_iter().collect();
//! assert!(!tree.is_blocked(&tags));
//! ```

use serde::Serialize;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Leading character that turns a raw tag into an exclusion
pub const NEGATION_MARKER: char = '-';

/// Leading character of identity tags
pub const IDENTITY_PREFIX: char = '@';

/// Synthetic tag standing for a post's uploader
///
/// Identity tags share the namespace of content tags, so a rule can block a
/// user (`["@handle"]`) or combine a user with content tags.
pub fn identity_tag(handle: &str) -> String {
    format!("{}{}", IDENTITY_PREFIX, handle)
}

/// A single condition of a block rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagCondition {
    /// Bare tag name
    pub tag: String,
    /// `true` if the tag must be present, `false` if it must be absent
    pub required: bool,
}

impl TagCondition {
    /// Condition satisfied when `tag` is present
    pub fn required(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), required: true }
    }

    /// Condition satisfied when `tag` is absent
    pub fn excluded(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), required: false }
    }

    /// Parse a raw tag, stripping one negation marker if present
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(NEGATION_MARKER) {
            Some(tag) => Self::excluded(tag),
            None => Self::required(raw),
        }
    }
}

/// An ordered conjunction of tag conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRule {
    conditions: Vec<TagCondition>,
}

impl BlockRule {
    /// Create a rule from parsed conditions
    pub fn new(conditions: Vec<TagCondition>) -> Self {
        Self { conditions }
    }

    /// Parse a rule from raw tag strings
    pub fn parse<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter().map(|tag| TagCondition::parse(tag.as_ref())).collect()
    }

    /// The rule's conditions, in order
    pub fn conditions(&self) -> &[TagCondition] {
        &self.conditions
    }

    /// Whether the rule has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl FromIterator<TagCondition> for BlockRule {
    fn from_iter<I: IntoIterator<Item = TagCondition>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct BlockNode {
    // every leaf is a rule end; inner nodes are ends when one rule is a prefix of another
    #[serde(skip_serializing_if = "is_false")]
    end: bool,
    #[serde(rename = "match", skip_serializing_if = "HashMap::is_empty")]
    required: HashMap<String, BlockNode>,
    #[serde(rename = "nomatch", skip_serializing_if = "HashMap::is_empty")]
    excluded: HashMap<String, BlockNode>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl BlockNode {
    fn is_leaf(&self) -> bool {
        self.required.is_empty() && self.excluded.is_empty()
    }

    fn child_mut(&mut self, condition: &TagCondition) -> &mut BlockNode {
        let branch = if condition.required { &mut self.required } else { &mut self.excluded };
        branch.entry(condition.tag.clone()).or_default()
    }

    fn matches<S>(&self, tags: &HashSet<S>) -> bool
    where
        S: Borrow<str> + Eq + Hash,
    {
        if self.end || self.is_leaf() {
            return true;
        }

        self.required
            .iter()
            .any(|(tag, child)| tags.contains(tag.as_str()) && child.matches(tags))
            || self
                .excluded
                .iter()
                .any(|(tag, child)| !tags.contains(tag.as_str()) && child.matches(tags))
    }

    fn rule_count(&self) -> usize {
        let children: usize =
            self.required.values().chain(self.excluded.values()).map(BlockNode::rule_count).sum();
        children + usize::from(self.end)
    }
}

/// Compiled block rules of one user
///
/// Immutable once shared: rules are only added through `&mut self`, and
/// evaluation takes `&self`, so a finished tree can be read from many tasks.
///
/// Serializes to the nested debug form used by the web client:
/// `{"match": {"tag": {...}}, "nomatch": {"tag": {...}}}`, with `"end": true`
/// on nodes where a rule ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlockTree {
    root: BlockNode,
}

impl BlockTree {
    /// Create an empty tree that blocks nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile raw rules, each a list of tags where `-tag` means "must be absent"
    pub fn build<R, T, S>(rules: R) -> Self
    where
        R: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        tree.populate(rules);
        tree
    }

    /// Compile parsed rules
    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = BlockRule>,
    {
        rules.into_iter().collect()
    }

    /// Add raw rules to the tree
    pub fn populate<R, T, S>(&mut self, rules: R)
    where
        R: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for rule in rules {
            self.insert(&BlockRule::parse(rule));
        }
    }

    /// Add one rule to the tree. Empty rules are ignored.
    pub fn insert(&mut self, rule: &BlockRule) {
        if rule.is_empty() {
            return;
        }

        let node = rule
            .conditions()
            .iter()
            .fold(&mut self.root, |node, condition| node.child_mut(condition));
        node.end = true;
    }

    /// Whether the tree holds no rules
    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Number of distinct rules in the tree
    pub fn len(&self) -> usize {
        self.root.rule_count()
    }

    /// Whether any rule is fully satisfied by `tags`
    pub fn is_blocked<S>(&self, tags: &HashSet<S>) -> bool
    where
        S: Borrow<str> + Eq + Hash,
    {
        if self.is_empty() {
            return false;
        }

        self.root.matches(tags)
    }
}

impl FromIterator<BlockRule> for BlockTree {
    fn from_iter<I: IntoIterator<Item = BlockRule>>(iter: I) -> Self {
        let mut tree = Self::new();
        for rule in iter {
            tree.insert(&rule);
        }
        tree
    }
}
