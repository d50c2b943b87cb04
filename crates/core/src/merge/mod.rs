//! Merge mode: compatibility checking, concat manifests and merge plans.
//!
//! Waiting items whose streams are parameter-identical can be joined with the
//! concat demuxer into a single output instead of being converted one by one.

mod compat;
mod manifest;
mod planner;

pub use compat::{CompatibilityEvaluator, CompatibilityResult, ItemRef, Resolution};
pub use manifest::{parse_manifest, render_manifest, write_manifest, ManifestError};
pub use planner::{MergePlan, MergePlanner};
