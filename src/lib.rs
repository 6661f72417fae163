//! Bounded, deduplicating cache of resource offers.
//!
//! A cluster resource manager issues short-lived offers which may be
//! rescinded before anyone uses them. [`OfferCache`] keeps at most
//! `capacity` of them, deduplicated by [`OfferId`], and hands them out
//! oldest first to scheduling workers that wait in [`OfferCache::pop`].

pub mod offer;
pub mod cache;
pub mod metrics;
pub mod config;
pub mod logging;
pub mod cli;
pub mod simulation;

pub use offer::{Offer, OfferId};
pub use cache::{CacheError, OfferCache, PushOutcome};
pub use metrics::collector::{CacheMetrics, MetricsSnapshot};
