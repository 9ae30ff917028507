//! Virtual account book and order arithmetic
//!
//! The account owns cash, positions and the equity high-water mark. All
//! mutation goes through [`AccountBook::execute`], which applies slippage
//! to the fill price and charges the fee on trade value, so the engine's
//! writer lock is the only synchronization needed on top.

pub mod account;
pub mod order;

pub use account::*;
pub use order::*;
