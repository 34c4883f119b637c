#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod cache;
pub mod error;
pub mod feed;
#[cfg(feature = "fruits")]
pub mod fruits;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Default upstream stock feed.
pub const DEFAULT_FEED_ENDPOINT: &str = "wss://ws.growagardenpro.com/";
