//! fuzz.ly SDK
//!
//! Re-exports the gateway client and the moderation crate under one name.

#![warn(missing_docs)]

pub use fuzzly_client as client;
pub use moderation;

pub use fuzzly_client::{ClientConfig, Environment, GatewayClient, Service, ServiceHosts};
pub use moderation::{
    BlockTree, BlockingBehavior, ConfigGateway, PostBlocker, PostVisibility, Uploader, UserConfig,
};
