//! Trust-weighted fusion of DOM and VLM chart observations.
//!
//! The DOM scrape is machine-read and authoritative for numbers; the VLM
//! free-text is advisory and authoritative for visual patterns. Both are
//! reduced to per-dimension claims, fused with fixed trust weights, and
//! rendered into two deterministic briefs for prompt injection. Identical
//! inputs always produce byte-identical output.

mod brief;
mod claims;
mod dom;
mod reconcile;
mod vlm;

pub use claims::{
    ClaimSource, ClaimValue, ConflictRecord, ConflictSeverity, Dimension, PerceptionClaim,
};
pub use reconcile::{PerceptionReconciler, ReconciliationReport};
