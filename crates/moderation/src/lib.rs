//! Content moderation for fuzz.ly
//!
//! This crate decides which posts a user has blocked, from the tag rules and
//! blocked users stored in their configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block_tree;
pub mod blocking;
pub mod config;
pub mod remote;

pub use block_tree::{identity_tag, BlockRule, BlockTree, TagCondition};
pub use blocking::{BlockError, PostBlocker, Uploader, UserBlockRules, UserConfigSource};
pub use config::{BlockingBehavior, PostVisibility, UserConfig};
pub use remote::ConfigGateway;
