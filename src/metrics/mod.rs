// Offer cache metrics
pub mod collector;

pub use collector::*;
