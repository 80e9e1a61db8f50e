//! Tile API service library.
//!
//! Exposes the internal modules for testing purposes.

pub mod cache;
pub mod compositor;
pub mod fetch;
pub mod handlers;
pub mod state;
pub mod warp;
