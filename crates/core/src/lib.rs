//! Core data types for the inventory tracker.

pub mod item;
pub mod price;
pub mod steamid;

pub use item::*;
pub use price::*;
pub use steamid::*;
