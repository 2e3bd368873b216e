//! Run supervision
//!
//! Tracks packages that cannot be acted on so the run can report one
//! deduplicated line per rule and package type.

mod tracker;

pub use tracker::{
    derive_unsupported_reason, should_track_unsupported, Tracker, UnsupportedRuleInfo,
    UnsupportedTracker,
};
