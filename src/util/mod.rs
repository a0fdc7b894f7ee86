//! Internal utilities.

mod arena;

pub use arena::{Arena, ArenaIndex};
