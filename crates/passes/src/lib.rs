//! Heap-allocation profiling passes.
//!
//! Two independent pipelines over the memheat IR:
//!
//! - **Instrumentation** ([`MemProfilerPass`], [`ModuleMemProfilerPass`]):
//!   rewrite memory accesses to bump shadow-memory counters (or call into
//!   the runtime) so a later run records per-location access counts.
//! - **Profile consumption** ([`MemProfUsePass`]): read a captured
//!   allocation profile, match its call-stack contexts onto the current
//!   call sites through debug-location fingerprints, and attach hot/cold
//!   classification metadata for downstream optimizations.

pub mod access;
pub mod callgraph;
pub mod config;
pub mod fingerprint;
mod inst_helpers;
pub mod instrument;
pub mod matcher;
pub mod report;
pub mod scaffold;
pub mod shadow;
pub mod trie;
pub mod undrift;

pub use access::{classify_access, MemoryAccess};
pub use config::{InstrumentConfig, MemProfUseConfig};
pub use instrument::MemProfilerPass;
pub use matcher::MemProfUsePass;
pub use report::{
    AllocMatchInfo, InstrumentationStats, MatchDiagnostic, MatchDiagnosticKind, MatchReport,
    MatchStats,
};
pub use scaffold::ModuleMemProfilerPass;
pub use shadow::ShadowMapping;
pub use trie::{CallStackTrie, TrieOutcome};
