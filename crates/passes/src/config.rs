//! Configuration surface of the two pass families.

/// Size of memory mapped to a single shadow location.
pub const DEFAULT_MEM_GRANULARITY: u64 = 64;

/// Size of memory mapped to a single histogram bucket.
pub const HISTOGRAM_GRANULARITY: u64 = 8;

/// Scale from granularity down to shadow size.
pub const DEFAULT_SHADOW_SCALE: u32 = 3;

/// Options of the instrumentation pass.
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    /// Instrument read instructions.
    pub instrument_reads: bool,
    /// Instrument write instructions.
    pub instrument_writes: bool,
    /// Instrument atomic instructions (rmw, cmpxchg).
    pub instrument_atomics: bool,
    /// Instrument accesses into stack slots.
    pub instrument_stack: bool,

    /// Use callbacks instead of inline instrumentation sequences.
    pub use_callbacks: bool,
    /// Prefix for memory access callbacks.
    pub callback_prefix: String,

    /// Scale of the shadow mapping.
    pub mapping_scale: u32,
    /// Granularity of the shadow mapping.
    pub mapping_granularity: u64,
    /// Collect access count histograms (8-bit saturating counters).
    pub histogram: bool,

    /// Guard against compiler/runtime version mismatch.
    pub insert_version_check: bool,
    /// Default options baked into the runtime options global.
    pub runtime_default_options: String,

    // Debug filters for bisection.
    /// Skip the function with this exact name.
    pub debug_func: Option<String>,
    /// Only instrument operation indices >= this, when set together with
    /// `debug_max`.
    pub debug_min: Option<usize>,
    pub debug_max: Option<usize>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            instrument_reads: true,
            instrument_writes: true,
            instrument_atomics: true,
            instrument_stack: false,
            use_callbacks: false,
            callback_prefix: "__memheat_".to_string(),
            mapping_scale: DEFAULT_SHADOW_SCALE,
            mapping_granularity: DEFAULT_MEM_GRANULARITY,
            histogram: false,
            insert_version_check: true,
            runtime_default_options: String::new(),
            debug_func: None,
            debug_min: None,
            debug_max: None,
        }
    }
}

/// Options of the profile-consumption pass.
#[derive(Debug, Clone)]
pub struct MemProfUseConfig {
    /// Match allocation profiles onto allocator calls that already carry an
    /// explicit hot/cold hint.
    pub match_hot_cold_new: bool,
    /// Realign a stale profile's source locations before matching.
    pub salvage_stale_profile: bool,

    /// Min percent of cold bytes on a matched allocation to hint it cold
    /// without context sensitivity. 100 disables the short-circuit.
    pub matched_cold_byte_percent: u64,

    /// Record per-context total sizes in the attached metadata.
    pub report_hinted_sizes: bool,
    /// Min percent of cold bytes for a context to be worth cloning for;
    /// values below 100 also force context-size recording.
    pub cloned_cold_byte_percent: u64,
    /// Callsite flavor of the above.
    pub callsite_cold_byte_percent: u64,

    /// Collect per-context match info in the report.
    pub print_match_info: bool,

    /// Warn about functions missing from the profile.
    pub warn_missing: bool,
    /// Warn about functions whose profile hash mismatches.
    pub warn_mismatch: bool,
    /// Warn about hash mismatches even for COMDAT/preemptible functions,
    /// where statically merged bodies make mismatches expected.
    pub warn_mismatch_comdat_weak: bool,
}

impl Default for MemProfUseConfig {
    fn default() -> Self {
        Self {
            match_hot_cold_new: false,
            salvage_stale_profile: false,
            matched_cold_byte_percent: 100,
            report_hinted_sizes: false,
            cloned_cold_byte_percent: 100,
            callsite_cold_byte_percent: 100,
            print_match_info: false,
            warn_missing: true,
            warn_mismatch: true,
            warn_mismatch_comdat_weak: false,
        }
    }
}

impl MemProfUseConfig {
    /// Context size info is needed in the trie whenever hinted sizes are
    /// reported or either cold-byte percentage is in play.
    pub fn record_context_size_info(&self) -> bool {
        self.report_hinted_sizes
            || self.cloned_cold_byte_percent < 100
            || self.callsite_cold_byte_percent < 100
    }
}
