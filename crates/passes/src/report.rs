//! Per-invocation statistics and match reports.
//!
//! Every pass invocation returns its own report object; callers aggregate
//! across functions or modules as they see fit.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use memheat_profile::AllocationType;

/// Counters produced by instrumenting one function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentationStats {
    pub instrumented_reads: u64,
    pub instrumented_writes: u64,
    pub skipped_stack_reads: u64,
    pub skipped_stack_writes: u64,
    /// The function was changed in any way.
    pub modified: bool,
}

impl InstrumentationStats {
    pub fn merge(&mut self, other: &InstrumentationStats) {
        self.instrumented_reads += other.instrumented_reads;
        self.instrumented_writes += other.instrumented_writes;
        self.skipped_stack_reads += other.skipped_stack_reads;
        self.skipped_stack_writes += other.skipped_stack_writes;
        self.modified |= other.modified;
    }
}

/// Counters produced by matching one module against a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Functions without a memory profile record.
    pub missing: u64,
    /// Functions whose memory profile hash mismatched.
    pub mismatched: u64,
    /// Functions with a valid memory profile record.
    pub matched_funcs: u64,
    /// Allocation contexts seen in the profile.
    pub alloc_context_profiles: u64,
    /// Call sites seen in the profile.
    pub callsite_profiles: u64,
    /// Matched allocation contexts.
    pub matched_alloc_contexts: u64,
    /// Allocation instructions with at least one matched context.
    pub matched_allocs: u64,
    /// Matched call sites.
    pub matched_callsites: u64,
}

/// How one profiled allocation context matched, for opt-in reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocMatchInfo {
    pub total_size: u64,
    pub num_frames_matched: usize,
    pub alloc_type: AllocationType,
    pub matched: bool,
}

/// A per-function profile-lookup failure that was not suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDiagnostic {
    pub function: String,
    pub fingerprint: u64,
    pub kind: MatchDiagnosticKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDiagnosticKind {
    MissingProfile,
    HashMismatch,
}

impl fmt::Display for MatchDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let what = match self.kind {
            MatchDiagnosticKind::MissingProfile => "no profile data available for function",
            MatchDiagnosticKind::HashMismatch => "function hash mismatch for function",
        };
        write!(f, "{what} {} Hash = {}", self.function, self.fingerprint)
    }
}

/// The result of running the profile-consumption pass over a module.
#[derive(Debug, Default)]
pub struct MatchReport {
    pub stats: MatchStats,
    /// Keyed by full-stack fingerprint; populated when match-info printing
    /// is enabled.
    pub alloc_match_info: BTreeMap<u64, AllocMatchInfo>,
    /// Matched call sites, each an inlined call stack of stack ids.
    pub matched_callsites: BTreeSet<Vec<u64>>,
    pub diagnostics: Vec<MatchDiagnostic>,
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (id, info) in &self.alloc_match_info {
            writeln!(
                f,
                "memheat {} context with id {} has total profiled size {}{} matched with {} frames",
                info.alloc_type,
                id,
                info.total_size,
                if info.matched { " is" } else { " not" },
                info.num_frames_matched,
            )?;
        }

        for call_stack in &self.matched_callsites {
            write!(f, "memheat callsite match for inline call stack")?;
            for stack_id in call_stack {
                write!(f, " {stack_id}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
