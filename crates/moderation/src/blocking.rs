//! Post blocking for a viewer
//!
//! This module decides whether a post is hidden from the user viewing it.
//!
//! # Overview
//!
//! Blocking combines two checks, in order:
//!
//! - **Blocked users**: posts uploaded by a user id on the viewer's blocked list
//!   are always blocked.
//! - **Tag rules**: the viewer's [`BlockTree`] is evaluated against the post's
//!   tags plus the uploader's identity tag (`@handle`).
//!
//! [`PostBlocker`] fetches each viewer's [`UserConfig`] from a
//! [`UserConfigSource`], compiles it once and keeps the result for a short
//! time so that a page of posts only costs one lookup.
//!
//! # Example
//!
//! ```rust,no_run
//! use fuzzly_client::{ClientConfig, Environment, GatewayClient, ServiceHosts};
//! use moderation::blocking::{PostBlocker, Uploader};
//! use moderation::remote::ConfigGateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hosts = ServiceHosts::for_environment(Environment::from_env()?);
//!     let client = GatewayClient::new(ClientConfig::new(hosts))?;
//!     let blocker = PostBlocker::new(ConfigGateway::new(client));
//!
//!     let uploader = Uploader::new(42, "someartist");
//!     let blocked = blocker.is_post_blocked(Some(7), &uploader, ["female", "landscape"]).await?;
//!     println!("blocked: {}", blocked);
//!
//!     Ok(())
//! }
//! ```

use crate::block_tree::{identity_tag, BlockTree};
use crate::config::{PostVisibility, UserConfig};
use async_trait::async_trait;
use fuzzly_client::GatewayError;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Errors that can occur while loading a viewer's block rules
#[derive(Debug, Error)]
pub enum BlockError {
    /// The config service returned an error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Any other failure of a config source
    #[error("Config source error: {0}")]
    Source(String),
}

/// Result type for block operations
pub type Result<T> = std::result::Result<T, BlockError>;

/// How long compiled rules are reused before the config is fetched again
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// How many viewers' compiled rules are kept by default
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Source of stored user configurations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserConfigSource: Send + Sync {
    /// Fetch a user's configuration; `None` if the user has none stored
    async fn user_config(&self, user_id: u64) -> Result<Option<UserConfig>>;
}

/// The user who uploaded a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    /// Uploader's user id
    pub user_id: u64,
    /// Uploader's handle, without the `@`
    pub handle: String,
}

impl Uploader {
    /// Create an uploader
    pub fn new(user_id: u64, handle: impl Into<String>) -> Self {
        Self { user_id, handle: handle.into() }
    }

    /// The uploader's identity tag
    pub fn identity_tag(&self) -> String {
        identity_tag(&self.handle)
    }
}

/// A viewer's compiled block rules alongside the config they came from
#[derive(Debug, Clone, Default)]
pub struct UserBlockRules {
    tree: BlockTree,
    config: UserConfig,
}

impl UserBlockRules {
    /// Compile a user's config
    pub fn new(config: UserConfig) -> Self {
        Self { tree: config.block_tree(), config }
    }

    /// Compiled tag rules
    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    /// Config the rules were compiled from
    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Whether a post by `uploader` carrying `tags` is blocked
    pub fn is_post_blocked<I, S>(&self, uploader: &Uploader, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.config.blocks_user(uploader.user_id) {
            return true;
        }

        if self.tree.is_empty() {
            return false;
        }

        let mut tagset: HashSet<String> = tags.into_iter().map(Into::into).collect();
        tagset.insert(uploader.identity_tag());

        self.tree.is_blocked(&tagset)
    }

    /// How a post by `uploader` carrying `tags` should be presented
    pub fn post_visibility<I, S>(&self, uploader: &Uploader, tags: I) -> PostVisibility
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let blocked = self.is_post_blocked(uploader, tags);
        PostVisibility::resolve(blocked, self.config.behavior())
    }
}

struct CachedRules {
    rules: Arc<UserBlockRules>,
    fetched_at: Instant,
}

impl CachedRules {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Per-viewer block rule cache in front of a [`UserConfigSource`]
///
/// Holds at most `capacity` viewers; the least recently used one is evicted
/// when a new viewer is added to a full cache.
pub struct PostBlocker<S> {
    source: S,
    ttl: Duration,
    cache: Mutex<LruCache<u64, CachedRules>>,
}

impl<S: UserConfigSource> PostBlocker<S> {
    /// Create a blocker with the default TTL and capacity
    pub fn new(source: S) -> Self {
        Self { source, ttl: DEFAULT_TTL, cache: Mutex::new(LruCache::new(DEFAULT_CAPACITY)) }
    }

    /// Set how long compiled rules are reused
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set how many viewers' rules are kept
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache = Mutex::new(LruCache::new(capacity));
        self
    }

    /// Block rules for a viewer
    ///
    /// Anonymous viewers (`None`) get empty rules without a lookup. A viewer
    /// with no stored config also gets empty rules.
    pub async fn block_rules(&self, viewer: Option<u64>) -> Result<Arc<UserBlockRules>> {
        let Some(user_id) = viewer else {
            return Ok(Arc::new(UserBlockRules::default()));
        };

        {
            let mut cache = self.cache.lock().await;
            match cache.get(&user_id) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    tracing::debug!(user_id, "block rules cache hit");
                    return Ok(Arc::clone(&entry.rules));
                }
                Some(_) => {
                    cache.pop(&user_id);
                }
                None => {}
            }
        }

        // the lock is not held across the fetch
        let config = self.source.user_config(user_id).await?.unwrap_or_default();
        let rules = Arc::new(UserBlockRules::new(config));
        tracing::debug!(user_id, rules = rules.tree().len(), "compiled block rules");

        let entry = CachedRules { rules: Arc::clone(&rules), fetched_at: Instant::now() };
        if let Some((evicted, _)) = self.cache.lock().await.push(user_id, entry) {
            if evicted != user_id {
                tracing::debug!(user_id = evicted, "evicted block rules");
            }
        }

        Ok(rules)
    }

    /// Whether a post is blocked for a viewer
    pub async fn is_post_blocked<I, T>(
        &self,
        viewer: Option<u64>,
        uploader: &Uploader,
        tags: I,
    ) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let rules = self.block_rules(viewer).await?;
        Ok(rules.is_post_blocked(uploader, tags))
    }

    /// How a post should be presented to a viewer
    pub async fn post_visibility<I, T>(
        &self,
        viewer: Option<u64>,
        uploader: &Uploader,
        tags: I,
    ) -> Result<PostVisibility>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let rules = self.block_rules(viewer).await?;
        Ok(rules.post_visibility(uploader, tags))
    }

    /// Drop a viewer's cached rules, e.g. after they edit their config
    pub async fn invalidate(&self, user_id: u64) {
        self.cache.lock().await.pop(&user_id);
    }

    /// Drop all cached rules
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of viewers with cached rules
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockingBehavior;
    use mockall::predicate::eq;

    fn config(tags: &[&[&str]], users: &[u64]) -> UserConfig {
        UserConfig {
            blocking_behavior: None,
            blocked_tags: Some(
                tags.iter().map(|rule| rule.iter().map(|t| t.to_string()).collect()).collect(),
            ),
            blocked_users: Some(users.to_vec()),
        }
    }

    fn source_returning(user_id: u64, config: UserConfig, times: usize) -> MockUserConfigSource {
        let mut source = MockUserConfigSource::new();
        source
            .expect_user_config()
            .with(eq(user_id))
            .times(times)
            .returning(move |_| Ok(Some(config.clone())));
        source
    }

    // =========================================================================
    // UserBlockRules
    // =========================================================================

    #[test]
    fn test_blocked_user_blocks_regardless_of_tags() {
        let rules = UserBlockRules::new(config(&[], &[42]));
        assert!(rules.is_post_blocked(&Uploader::new(42, "someone"), Vec::<String>::new()));
        assert!(!rules.is_post_blocked(&Uploader::new(43, "other"), ["anything"]));
    }

    #[test]
    fn test_uploader_identity_tag_is_added() {
        let rules = UserBlockRules::new(config(&[&["@badartist"]], &[]));
        assert!(rules.is_post_blocked(&Uploader::new(1, "badartist"), ["landscape"]));
        assert!(!rules.is_post_blocked(&Uploader::new(2, "goodartist"), ["landscape"]));
    }

    #[test]
    fn test_identity_combined_with_tags() {
        let rules = UserBlockRules::new(config(&[&["@artist", "-sfw"]], &[]));
        let artist = Uploader::new(1, "artist");
        assert!(rules.is_post_blocked(&artist, ["nsfw"]));
        assert!(!rules.is_post_blocked(&artist, ["sfw"]));
    }

    #[test]
    fn test_tag_rules_apply() {
        let rules = UserBlockRules::new(config(&[&["female", "-anthro"]], &[]));
        let uploader = Uploader::new(1, "artist");
        assert!(rules.is_post_blocked(&uploader, ["female"]));
        assert!(!rules.is_post_blocked(&uploader, ["female", "anthro"]));
    }

    #[test]
    fn test_default_rules_block_nothing() {
        let rules = UserBlockRules::default();
        assert!(rules.tree().is_empty());
        assert!(!rules.is_post_blocked(&Uploader::new(1, "a"), ["b"]));
    }

    #[test]
    fn test_post_visibility_follows_behavior() {
        let mut omit = config(&[&["gore"]], &[]);
        omit.blocking_behavior = Some(BlockingBehavior::Omit);
        let rules = UserBlockRules::new(omit);
        let uploader = Uploader::new(1, "artist");

        assert_eq!(rules.post_visibility(&uploader, ["gore"]), PostVisibility::Omitted);
        assert_eq!(rules.post_visibility(&uploader, ["safe"]), PostVisibility::Visible);

        let rules = UserBlockRules::new(config(&[&["gore"]], &[]));
        assert_eq!(rules.post_visibility(&uploader, ["gore"]), PostVisibility::Hidden);
    }

    // =========================================================================
    // PostBlocker
    // =========================================================================

    #[tokio::test]
    async fn test_anonymous_viewer_skips_source() {
        let mut source = MockUserConfigSource::new();
        source.expect_user_config().times(0);

        let blocker = PostBlocker::new(source);
        let blocked = blocker.is_post_blocked(None, &Uploader::new(1, "a"), ["gore"]).await.unwrap();

        assert!(!blocked);
        assert_eq!(blocker.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_config_blocks_nothing() {
        let mut source = MockUserConfigSource::new();
        source.expect_user_config().with(eq(7)).times(1).returning(|_| Ok(None));

        let blocker = PostBlocker::new(source);
        let rules = blocker.block_rules(Some(7)).await.unwrap();

        assert!(rules.tree().is_empty());
        assert_eq!(rules.config(), &UserConfig::default());
    }

    #[tokio::test]
    async fn test_rules_are_reused_within_ttl() {
        let source = source_returning(7, config(&[&["gore"]], &[]), 1);
        let blocker = PostBlocker::new(source);
        let uploader = Uploader::new(1, "artist");

        assert!(blocker.is_post_blocked(Some(7), &uploader, ["gore"]).await.unwrap());
        assert!(!blocker.is_post_blocked(Some(7), &uploader, ["safe"]).await.unwrap());
        assert_eq!(blocker.cached_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rules_are_refetched_after_ttl() {
        let source = source_returning(7, config(&[&["gore"]], &[]), 2);
        let blocker = PostBlocker::new(source).with_ttl(Duration::from_secs(30));

        blocker.block_rules(Some(7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        blocker.block_rules(Some(7)).await.unwrap();

        tokio::time::advance(Duration::from_secs(21)).await;
        blocker.block_rules(Some(7)).await.unwrap();
    }

    #[tokio::test]
    async fn test_least_recently_used_viewer_is_evicted() {
        let mut source = MockUserConfigSource::new();
        source.expect_user_config().with(eq(1)).times(2).returning(|_| Ok(None));
        source.expect_user_config().with(eq(2)).times(1).returning(|_| Ok(None));
        source.expect_user_config().with(eq(3)).times(1).returning(|_| Ok(None));

        let capacity = NonZeroUsize::new(2).unwrap();
        let blocker = PostBlocker::new(source).with_capacity(capacity);

        blocker.block_rules(Some(1)).await.unwrap();
        blocker.block_rules(Some(2)).await.unwrap();
        // touch 2 so that 1 is the least recently used
        blocker.block_rules(Some(2)).await.unwrap();
        blocker.block_rules(Some(3)).await.unwrap();
        assert_eq!(blocker.cached_len().await, 2);

        // 2 and 3 are still cached, 1 has to be fetched again
        blocker.block_rules(Some(2)).await.unwrap();
        blocker.block_rules(Some(3)).await.unwrap();
        blocker.block_rules(Some(1)).await.unwrap();
        assert_eq!(blocker.cached_len().await, 2);
    }

    #[tokio::test]
    async fn test_many_viewers_stay_within_capacity() {
        let mut source = MockUserConfigSource::new();
        source.expect_user_config().times(500).returning(|_| Ok(None));

        let blocker = PostBlocker::new(source).with_capacity(NonZeroUsize::new(64).unwrap());
        for user_id in 0..500 {
            blocker.block_rules(Some(user_id)).await.unwrap();
        }

        assert_eq!(blocker.cached_len().await, 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_replaced() {
        let mut source = MockUserConfigSource::new();
        let mut calls = 0;
        source.expect_user_config().with(eq(7)).times(2).returning(move |_| {
            calls += 1;
            let tags = if calls == 1 { vec![] } else { vec![vec!["gore".to_string()]] };
            Ok(Some(UserConfig { blocked_tags: Some(tags), ..Default::default() }))
        });

        let blocker = PostBlocker::new(source);
        let uploader = Uploader::new(1, "artist");

        assert!(!blocker.is_post_blocked(Some(7), &uploader, ["gore"]).await.unwrap());
        tokio::time::advance(DEFAULT_TTL).await;
        assert!(blocker.is_post_blocked(Some(7), &uploader, ["gore"]).await.unwrap());
        assert_eq!(blocker.cached_len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = source_returning(7, config(&[], &[]), 2);
        let blocker = PostBlocker::new(source);

        blocker.block_rules(Some(7)).await.unwrap();
        blocker.invalidate(7).await;
        assert_eq!(blocker.cached_len().await, 0);
        blocker.block_rules(Some(7)).await.unwrap();
    }

    #[tokio::test]
    async fn test_viewers_are_cached_separately() {
        let mut source = MockUserConfigSource::new();
        source
            .expect_user_config()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(Some(config(&[&["gore"]], &[]))));
        source
            .expect_user_config()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(Some(config(&[], &[99]))));

        let blocker = PostBlocker::new(source);
        let artist = Uploader::new(99, "artist");

        assert!(blocker.is_post_blocked(Some(1), &artist, ["gore"]).await.unwrap());
        assert!(blocker.is_post_blocked(Some(2), &artist, ["safe"]).await.unwrap());
        assert!(!blocker.is_post_blocked(Some(1), &artist, ["safe"]).await.unwrap());
        assert_eq!(blocker.cached_len().await, 2);

        blocker.clear().await;
        assert_eq!(blocker.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_source_errors_are_not_cached() {
        let mut source = MockUserConfigSource::new();
        source
            .expect_user_config()
            .times(2)
            .returning(|_| Err(BlockError::Source("unavailable".to_string())));

        let blocker = PostBlocker::new(source);
        let uploader = Uploader::new(1, "artist");

        let err = blocker.is_post_blocked(Some(7), &uploader, ["gore"]).await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
        assert!(blocker.post_visibility(Some(7), &uploader, ["gore"]).await.is_err());
        assert_eq!(blocker.cached_len().await, 0);
    }

    #[tokio::test]
    async fn test_post_visibility_through_blocker() {
        let mut omit = config(&[&["gore"]], &[]);
        omit.blocking_behavior = Some(BlockingBehavior::Omit);
        let blocker = PostBlocker::new(source_returning(3, omit, 1));

        let visibility = blocker
            .post_visibility(Some(3), &Uploader::new(1, "artist"), ["gore"])
            .await
            .unwrap();
        assert_eq!(visibility, PostVisibility::Omitted);
    }
}
