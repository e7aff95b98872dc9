//! `etherscan-plugin` — Etherscan-family block explorer adapter.
//!
//! # Layout
//! - [`networks`] — known ecosystems, networks, explorer hosts and API keys.
//! - [`config`] — TOML configuration ([`config::load_config`]).
//! - [`client`] — throttled HTTP clients for the explorer's REST API.
//! - [`explorer`] — URLs, contract types and manifests for one network.
//! - [`verify`] — source bundling and contract verification.
//! - [`dependency`] — verified contracts as cached project dependencies.
//! - [`query`] — account transaction and contract creation queries.
//! - [`license`] — SPDX header detection and explorer license codes.
//! - [`report`] — terminal rendering used by the CLI.

pub mod client;
pub mod config;
pub mod dependency;
pub mod detector;
pub mod error;
pub mod explorer;
pub mod license;
pub mod models;
pub mod networks;
pub mod query;
pub mod report;
pub mod verify;

pub use error::{EtherscanError, Result};
pub use explorer::Etherscan;
