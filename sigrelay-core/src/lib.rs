#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod actions;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod payload;
pub mod processors;
pub mod remote;
pub mod rules;
pub mod store;
pub mod utils;
