//! User blocking configuration
//!
//! The subset of a user's stored configuration that drives post blocking:
//! the raw tag rules, the blocked user ids, and how blocked posts are shown.

use crate::block_tree::BlockTree;
use serde::{Deserialize, Serialize};

/// How blocked posts are presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingBehavior {
    /// Return the post flagged as blocked so the client can cover it
    #[default]
    Hide,
    /// Leave the post out of results entirely
    Omit,
}

/// What to do with a post after blocking is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostVisibility {
    /// Show the post normally
    #[default]
    Visible,
    /// Return the post marked as blocked
    Hidden,
    /// Drop the post from results
    Omitted,
}

impl PostVisibility {
    /// Visibility of a post given its blocked state and the user's preference
    pub fn resolve(blocked: bool, behavior: BlockingBehavior) -> Self {
        match (blocked, behavior) {
            (false, _) => PostVisibility::Visible,
            (true, BlockingBehavior::Hide) => PostVisibility::Hidden,
            (true, BlockingBehavior::Omit) => PostVisibility::Omitted,
        }
    }

    /// Whether the post appears in results at all
    pub fn is_included(&self) -> bool {
        !matches!(self, PostVisibility::Omitted)
    }
}

/// Stored user configuration
///
/// Every field is optional; a missing field behaves like an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// How blocked posts are presented
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_behavior: Option<BlockingBehavior>,
    /// Block rules, each a list of tags where `-tag` means "must be absent"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_tags: Option<Vec<Vec<String>>>,
    /// Ids of users whose posts are always blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_users: Option<Vec<u64>>,
}

impl UserConfig {
    /// Compile the tag rules
    pub fn block_tree(&self) -> BlockTree {
        BlockTree::build(self.blocked_tags.iter().flatten())
    }

    /// Whether posts by `user_id` are blocked outright
    pub fn blocks_user(&self, user_id: u64) -> bool {
        self.blocked_users.as_ref().is_some_and(|users| users.contains(&user_id))
    }

    /// Effective blocking behavior
    pub fn behavior(&self) -> BlockingBehavior {
        self.blocking_behavior.unwrap_or_default()
    }
}
