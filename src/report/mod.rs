//! Terminal renderers for explorer data.
//!
//! - [`terminal`] — colored tables for networks, transactions and contract types.

pub mod terminal;
