#![allow(clippy::cargo_common_metadata)]

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod player;
pub mod query;
pub mod queue;
pub mod remote;

#[cfg(feature = "test-utils")]
pub mod test_utils;
