//! Gold dataset: predictions joined with ranked, human-readable attributions.

mod builder;
mod reasons;

pub use builder::{
    AlignmentError, DEFAULT_TOP_K, GoldBuilder, GoldError, GoldRecord, RankedAttribution,
    RiskSegment,
};
pub use reasons::{
    MagnitudeTier, NO_DRIVERS_REASON, ReasonCatalog, TierThresholds, UnmappedFeatureError,
};
