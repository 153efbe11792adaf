//! Market-analysis pipeline wiring.
//!
//! The engine constructs one `MarketContext` capability bundle and hands it
//! to the dispatcher; no component ever holds a reference back to the
//! engine. Within a cycle the order is strict: resolve, per-timeframe
//! observe/reconcile/synthesize/persist, aggregate, probabilities, gate,
//! verdict. There are no retries anywhere in the pipeline: a failing
//! external call surfaces immediately.

mod context;
mod dispatcher;
mod pipeline;
mod query;

pub use context::MarketContext;
pub use dispatcher::{detect_timeframe_mode, DispatchOutcome, Dispatcher};
pub use pipeline::{run_market_analysis, run_reasoning_only, MarketReport, SlotAnalyzer};
pub use query::{handle_last_analysis_query, handle_trend_change_query};

/// Install the global tracing subscriber. Called once by the shell.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
