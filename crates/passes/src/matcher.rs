//! The profile-consumption pass: matches recorded allocation contexts onto
//! call instructions via debug-location fingerprints and attaches hot/cold
//! metadata.

use std::path::PathBuf;

use memheat_ir::{
    ContextTotalSize, FuncRef, Function, InstId, Linkage, MemProfAttr, Module, Signature,
};
use memheat_profile::{
    AllocTypeOracle, AllocationType, FileSystem, Frame, IndexedProfileReader, MemProfRecord,
    ProfileError, RealFileSystem, RecordLookupError,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{
    callgraph::{is_hintable_alloc, line_offset},
    config::MemProfUseConfig,
    fingerprint::{full_stack_id, function_fingerprint, stack_id, stack_id_of_frame},
    report::{AllocMatchInfo, MatchDiagnostic, MatchDiagnosticKind, MatchReport},
    trie::{CallStackTrie, TrieOutcome},
    undrift::{compute_undrift_map, undrift_record, LocToLocMap},
};

/// Compares the inlined call stack computed from an instruction's debug
/// chain against profile frames: a match requires the chain to be a literal
/// leaf-first prefix of the recorded stack.
fn stack_includes_inlined_call_stack(profile_frames: &[Frame], inlined: &[u64]) -> bool {
    profile_frames.len() >= inlined.len()
        && profile_frames
            .iter()
            .zip(inlined)
            .all(|(frame, &sid)| stack_id_of_frame(frame) == sid)
}

pub struct MemProfUsePass {
    config: MemProfUseConfig,
    profile_path: PathBuf,
    fs: Box<dyn FileSystem>,
    oracle: Box<dyn AllocTypeOracle>,
}

impl MemProfUsePass {
    pub fn new(profile_path: impl Into<PathBuf>, oracle: Box<dyn AllocTypeOracle>) -> Self {
        Self {
            config: MemProfUseConfig::default(),
            profile_path: profile_path.into(),
            fs: Box::new(RealFileSystem),
            oracle,
        }
    }

    pub fn with_file_system(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_config(mut self, config: MemProfUseConfig) -> Self {
        self.config = config;
        self
    }

    /// Matches the profile onto `module`. Profile-file problems are
    /// recoverable at module granularity: a diagnostic is logged, the module
    /// is left unannotated, and the error is returned for the caller to
    /// tally; all other transformations may proceed.
    pub fn run(&self, module: &mut Module) -> Result<MatchReport, ProfileError> {
        let mut report = MatchReport::default();

        if module.funcs.len() == 0 {
            return Ok(report);
        }

        let reader = match IndexedProfileReader::from_file(&self.profile_path, self.fs.as_ref()) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("{err}");
                return Err(err);
            }
        };

        if !reader.has_memory_profile() {
            let err = ProfileError::NoMemorySection {
                path: self.profile_path.clone(),
            };
            warn!("{err}");
            return Err(err);
        }

        let undrift_maps = self
            .config
            .salvage_stale_profile
            .then(|| compute_undrift_map(module, &reader, self.config.match_hot_cold_new));

        let func_refs: Vec<FuncRef> = module.iter_functions().collect();
        for func_ref in func_refs {
            if module.is_external(func_ref) {
                continue;
            }
            self.read_memprof(module, func_ref, &reader, undrift_maps.as_ref(), &mut report);
        }

        Ok(report)
    }

    fn read_memprof(
        &self,
        module: &mut Module,
        func_ref: FuncRef,
        reader: &IndexedProfileReader,
        undrift_maps: Option<&FxHashMap<u64, LocToLocMap>>,
        report: &mut MatchReport,
    ) {
        let sig = &module.funcs[func_ref].sig;
        let func_fp = function_fingerprint(sig.name());

        let mut record = match reader.get_record(func_fp, sig.profile_hash) {
            Ok(record) => record,
            Err(err) => {
                self.report_lookup_failure(sig, func_fp, err, report);
                return;
            }
        };

        report.stats.matched_funcs += 1;

        // If requested, undrift the record so its source locations match the
        // current IR before any fingerprint comparison.
        if let Some(maps) = undrift_maps {
            undrift_record(maps, &mut record);
        }

        // Take the function out of the module so annotation can mutate it
        // while scopes and callee signatures stay readable.
        let mut func = std::mem::replace(
            &mut module.funcs[func_ref],
            Function::new(Signature::default()),
        );
        self.match_function(module, &mut func, func_ref, func_fp, &record, report);
        module.funcs[func_ref] = func;
    }

    fn report_lookup_failure(
        &self,
        sig: &Signature,
        func_fp: u64,
        err: RecordLookupError,
        report: &mut MatchReport,
    ) {
        let (kind, skip_warning) = match err {
            RecordLookupError::UnknownFunction => {
                report.stats.missing += 1;
                (MatchDiagnosticKind::MissingProfile, !self.config.warn_missing)
            }
            RecordLookupError::HashMismatch => {
                report.stats.mismatched += 1;
                // Statically merged COMDAT and import-only bodies routinely
                // mismatch; warning about them is opt-in.
                let merged_body =
                    sig.comdat || sig.linkage() == Linkage::AvailableExternally;
                let skip = !self.config.warn_mismatch
                    || (!self.config.warn_mismatch_comdat_weak && merged_body);
                (MatchDiagnosticKind::HashMismatch, skip)
            }
        };

        debug!(func = sig.name(), ?err, "error reading memory profile");
        if skip_warning {
            return;
        }

        let diagnostic = MatchDiagnostic {
            function: sig.name().to_string(),
            fingerprint: func_fp,
            kind,
        };
        warn!("{diagnostic}");
        report.diagnostics.push(diagnostic);
    }

    fn match_function(
        &self,
        module: &Module,
        func: &mut Function,
        func_ref: FuncRef,
        func_fp: u64,
        record: &MemProfRecord,
        report: &mut MatchReport,
    ) {
        // Detect whether the profile recorded any non-zero column for this
        // function. The profiled binary might have been built with column
        // numbers disabled; in that case match with columns forced to 0 on
        // the IR side too.
        let mut profile_has_columns = false;

        // Index allocation contexts by the fingerprint of their leaf frame;
        // matching accepts any recorded stack the instruction's inline
        // sequence is a prefix of.
        let mut loc_hash_to_alloc: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
        for (idx, alloc) in record.alloc_sites.iter().enumerate() {
            report.stats.alloc_context_profiles += 1;
            let leaf = &alloc.call_stack[0];
            loc_hash_to_alloc
                .entry(stack_id_of_frame(leaf))
                .or_default()
                .push(idx);
            profile_has_columns |= leaf.column != 0;
        }

        // Call sites index every frame from the leaf up to and including
        // this function, as any of these may or may not have been inlined.
        // Values are (record index, first-frame index) suffix slices.
        let mut loc_hash_to_callsites: FxHashMap<u64, Vec<(usize, usize)>> = FxHashMap::default();
        for (cs_idx, call_site) in record.call_sites.iter().enumerate() {
            report.stats.callsite_profiles += 1;
            for (frame_idx, frame) in call_site.frames.iter().enumerate() {
                loc_hash_to_callsites
                    .entry(stack_id_of_frame(frame))
                    .or_default()
                    .push((cs_idx, frame_idx));
                profile_has_columns |= frame.column != 0;
                if frame.function == func_fp {
                    break;
                }
            }
        }

        let insts: Vec<InstId> = func
            .layout
            .iter_block()
            .flat_map(|block| func.layout.iter_inst(block))
            .collect();

        for inst in insts {
            // Only calls are interesting: allocations or interior
            // call-stack context calls. Memory intrinsics are dedicated
            // opcodes and never reach here.
            if !func.dfg.inst(inst).is_call() {
                continue;
            }
            let callee = func.dfg.inst(inst).callee();

            // Reconstruct the inlined chain bottom-up. The first level
            // found in either index is the recognized leaf; the profile
            // may have missed debug frames at the leaf, so keep probing
            // outward until one hits.
            let mut inlined_call_stack: SmallVec<[u64; 8]> = SmallVec::new();
            let mut leaf_found = false;
            let mut alloc_hit: Option<&Vec<usize>> = None;
            let mut callsite_hit: Option<&Vec<(usize, usize)>> = None;
            for loc in func.dfg.debug_loc_chain(inst) {
                let scope = module.scope(loc.scope);
                let frame_fp = function_fingerprint(&scope.linkage_name);
                let column = if profile_has_columns { loc.column } else { 0 };
                let sid = stack_id(frame_fp, line_offset(loc.line, scope.decl_line), column);

                if !leaf_found {
                    alloc_hit = loc_hash_to_alloc.get(&sid);
                    callsite_hit = loc_hash_to_callsites.get(&sid);
                    if alloc_hit.is_some() || callsite_hit.is_some() {
                        leaf_found = true;
                    }
                }
                if leaf_found {
                    inlined_call_stack.push(sid);
                }
            }

            // Leaf in neither index: skip the instruction.
            if !leaf_found {
                continue;
            }

            let callee_hintable = callee.is_some_and(|callee| {
                let kind = if callee == func_ref {
                    func.sig.alloc_kind
                } else {
                    module.funcs[callee].sig.alloc_kind
                };
                is_hintable_alloc(kind, self.config.match_hot_cold_new)
            });

            if let (Some(alloc_indices), true) = (alloc_hit, callee_hintable) {
                self.match_allocation(
                    func,
                    inst,
                    record,
                    alloc_indices,
                    &inlined_call_stack,
                    report,
                );
                continue;
            }

            let Some(callsite_list) = callsite_hit else {
                continue;
            };
            // Accept the first candidate whose frames are a literal
            // prefix match; at most one annotation per instruction.
            for &(cs_idx, frame_idx) in callsite_list {
                let frames = &record.call_sites[cs_idx].frames[frame_idx..];
                if stack_includes_inlined_call_stack(frames, &inlined_call_stack) {
                    report.stats.matched_callsites += 1;
                    func.dfg
                        .set_callsite_metadata(inst, inlined_call_stack.to_vec());
                    if self.config.print_match_info {
                        report.matched_callsites.insert(inlined_call_stack.to_vec());
                    }
                    break;
                }
            }
        }
    }

    fn match_allocation(
        &self,
        func: &mut Function,
        inst: InstId,
        record: &MemProfRecord,
        alloc_indices: &[usize],
        inlined_call_stack: &[u64],
        report: &mut MatchReport,
    ) {
        // The instruction's location list can match multiple recorded
        // contexts; the trie trims them to the minimum needed to
        // disambiguate contexts with unique behavior.
        let mut trie = CallStackTrie::new();
        let mut total_size = 0u64;
        let mut total_cold_size = 0u64;

        for &alloc_idx in alloc_indices {
            let alloc = &record.alloc_sites[alloc_idx];
            if !stack_includes_inlined_call_stack(&alloc.call_stack, inlined_call_stack) {
                continue;
            }

            report.stats.matched_alloc_contexts += 1;

            let record_sizes = self.config.record_context_size_info();
            let mut full_id = 0u64;
            if self.config.print_match_info || record_sizes {
                full_id = full_stack_id(&alloc.call_stack);
            }

            let alloc_type = self.oracle.classify(&alloc.info);
            let stack_ids: Vec<u64> = alloc.call_stack.iter().map(stack_id_of_frame).collect();
            let mut context_sizes = Vec::new();
            if record_sizes {
                debug_assert!(full_id != 0);
                context_sizes.push(ContextTotalSize {
                    full_stack_id: full_id,
                    total_size: alloc.info.total_size,
                });
            }
            trie.add_call_stack(alloc_type, &stack_ids, context_sizes);

            total_size += alloc.info.total_size;
            if alloc_type == AllocationType::Cold {
                total_cold_size += alloc.info.total_size;
            }

            if self.config.print_match_info {
                report.alloc_match_info.insert(
                    full_id,
                    AllocMatchInfo {
                        total_size: alloc.info.total_size,
                        num_frames_matched: inlined_call_stack.len(),
                        alloc_type,
                        matched: true,
                    },
                );
            }
        }

        // If the cold-byte threshold is under 100% and not all bytes are
        // cold, the allocation may still be hinted cold without context
        // sensitivity. Per-context metadata is skipped entirely then, even
        // when some sub-contexts are unambiguously not cold.
        let threshold = self.config.matched_cold_byte_percent;
        if total_cold_size < total_size
            && threshold < 100
            && total_cold_size * 100 >= threshold * total_size
        {
            func.dfg.set_memprof_attr(
                inst,
                MemProfAttr {
                    alloc_type: AllocationType::Cold.as_attr_str(),
                    descriptor: "dominant",
                },
            );
            return;
        }

        // We might not have matched anything onto the full inlined call
        // stack. If we did, attach metadata, or a single attribute when all
        // contexts behave identically.
        if trie.is_empty() {
            return;
        }
        report.stats.matched_allocs += 1;
        match trie
            .build_metadata()
            .expect("non-empty trie yields metadata")
        {
            TrieOutcome::SingleType(ty) => {
                func.dfg.set_memprof_attr(
                    inst,
                    MemProfAttr {
                        alloc_type: ty.as_attr_str(),
                        descriptor: "all",
                    },
                );
            }
            TrieOutcome::Contexts(entries) => {
                func.dfg.set_mib_metadata(inst, entries);
                // Companion callsite metadata for the instruction's own
                // location list, so later inlining can tell which part of
                // the attached contexts belongs to this instruction.
                func.dfg
                    .set_callsite_metadata(inst, inlined_call_stack.to_vec());
            }
        }
    }
}
