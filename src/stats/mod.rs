// Player stats: the upstream provider and the freshness-windowed cache.

pub mod cache;
pub mod provider;
