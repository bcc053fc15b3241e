//! Per-instruction profiling metadata attachments.
//!
//! Allocation classifications are carried as strings ("cold", "notcold",
//! "hot"), keeping this crate independent of where the verdicts come from.

/// Total profiled bytes for one full allocation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextTotalSize {
    pub full_stack_id: u64,
    pub total_size: u64,
}

/// One memory-info-block context attached to an allocation call.
///
/// `stack_ids` descends leaf-first, trimmed to the shortest prefix that
/// discriminates this context's classification from its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MibEntry {
    pub stack_ids: Vec<u64>,
    pub alloc_type: &'static str,
    pub context_sizes: Vec<ContextTotalSize>,
}

/// A single allocation-classification attribute on a call instruction,
/// used when structured per-context metadata is unnecessary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemProfAttr {
    pub alloc_type: &'static str,
    /// Why a single attribute sufficed: "all" when every matched context
    /// agrees, "dominant" for the cold-byte-percentage short-circuit.
    pub descriptor: &'static str,
}
