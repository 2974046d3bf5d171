// Rating engine: pick scoring, matchup ranks, and band labeling.

pub mod engine;
pub mod matchups;
pub mod pick;
