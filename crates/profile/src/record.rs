//! Profile record model.
//!
//! All call stacks are ordered leaf-first: element 0 is the innermost frame
//! (the allocation or call site itself), later elements walk outward through
//! the callers recorded at profiling time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A source location within a function, line relative to the function
/// declaration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct LineLocation {
    pub line_offset: u32,
    pub column: u32,
}

impl LineLocation {
    pub fn new(line_offset: u32, column: u32) -> Self {
        Self {
            line_offset,
            column,
        }
    }
}

impl fmt::Display for LineLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line_offset, self.column)
    }
}

/// One frame of a recorded call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Fingerprint of the function this frame is in.
    pub function: u64,
    /// Source line relative to the function declaration.
    pub line_offset: u32,
    pub column: u32,
}

impl Frame {
    pub fn new(function: u64, line_offset: u32, column: u32) -> Self {
        Self {
            function,
            line_offset,
            column,
        }
    }

    pub fn location(&self) -> LineLocation {
        LineLocation::new(self.line_offset, self.column)
    }
}

/// Aggregated runtime counters for one allocation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileCounters {
    pub total_size: u64,
    pub alloc_count: u64,
    pub total_lifetime: u64,
    /// Total lifetime access density, pre-aggregated by the profiler runtime.
    pub access_density: u64,
}

/// One profiled allocation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocSite {
    /// Leaf-first call stack of the allocation.
    pub call_stack: Vec<Frame>,
    pub info: ProfileCounters,
}

/// One profiled interior call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteRecord {
    /// Leaf-first frames of the call site's inline sequence.
    pub frames: Vec<Frame>,
}

/// Everything the profile recorded for one function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemProfRecord {
    pub alloc_sites: Vec<AllocSite>,
    pub call_sites: Vec<CallSiteRecord>,
}

/// Classification of an allocation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationType {
    None,
    NotCold,
    Cold,
    Hot,
}

impl AllocationType {
    /// Bit representation, used for set membership in the call-stack trie.
    pub fn as_bit(self) -> u8 {
        match self {
            Self::None => 0b0001,
            Self::NotCold => 0b0010,
            Self::Cold => 0b0100,
            Self::Hot => 0b1000,
        }
    }

    pub fn as_attr_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NotCold => "notcold",
            Self::Cold => "cold",
            Self::Hot => "hot",
        }
    }
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_attr_str())
    }
}
