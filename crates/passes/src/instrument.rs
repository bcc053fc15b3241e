//! The function instrumentation pass.
//!
//! Memory accesses are instrumented to increment the access count held in a
//! shadow memory location, or alternatively to call into the runtime. Memory
//! intrinsics (`mem_copy`, `mem_move`, `mem_set`) are changed to call the
//! profiling runtime version instead.

use memheat_ir::{
    BinaryOp, CastOp, Function, GlobalVariable, GlobalVariableData, InsnData, InstId, Linkage,
    MaskLane, Module, Signature, Type, Value, ValueId,
};
use smallvec::smallvec;
use tracing::debug;

use crate::{
    access::{classify_access, MemoryAccess},
    config::InstrumentConfig,
    inst_helpers::{emit, emit_no_result, split_block_and_insert_if_then},
    report::InstrumentationStats,
    scaffold::{INIT_NAME, RUNTIME_NAME_PREFIX, SHADOW_DYN_ADDR_NAME},
    shadow::ShadowMapping,
};

/// Runtime symbols the instrumented code calls into, declared once per
/// module.
struct RuntimeEnv {
    shadow_global: GlobalVariable,
    /// Indexed by `is_write`.
    access_callback: [memheat_ir::FuncRef; 2],
    memcpy: memheat_ir::FuncRef,
    memmove: memheat_ir::FuncRef,
    memset: memheat_ir::FuncRef,
    init: memheat_ir::FuncRef,
}

/// Instrument the code in a function to profile memory accesses.
pub struct MemProfilerPass {
    config: InstrumentConfig,
    mapping: ShadowMapping,
}

impl MemProfilerPass {
    /// Panics on degenerate configuration (histogram mode with a non-default
    /// granularity).
    pub fn new(config: InstrumentConfig) -> Self {
        let mapping = ShadowMapping::new(&config);
        Self { config, mapping }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn run(&self, module: &mut Module, func_ref: memheat_ir::FuncRef) -> InstrumentationStats {
        let stats = InstrumentationStats::default();

        {
            let func = &module.funcs[func_ref];
            if module.is_external(func_ref)
                || func.sig.linkage() == Linkage::AvailableExternally
            {
                return stats;
            }
            if self.config.debug_func.as_deref() == Some(func.sig.name()) {
                return stats;
            }
            if func.sig.name().starts_with(RUNTIME_NAME_PREFIX) {
                return stats;
            }
        }

        let env = self.initialize_callbacks(module);

        // Take the function out of the module so instrumentation can mutate
        // it while still consulting module-level state (globals, target).
        let mut func = std::mem::replace(
            &mut module.funcs[func_ref],
            Function::new(Signature::default()),
        );

        let mut instrumentor = FunctionInstrumentor {
            config: &self.config,
            mapping: self.mapping,
            env: &env,
            intptr_ty: module.target.pointer_ty(),
            dynamic_shadow: None,
            stats,
        };
        let stats = instrumentor.run(module, &mut func);

        module.funcs[func_ref] = func;
        stats
    }

    fn initialize_callbacks(&self, module: &mut Module) -> RuntimeEnv {
        let intptr_ty = module.target.pointer_ty();
        let ptr_ty = Type::ptr();
        let prefix = &self.config.callback_prefix;
        let hist_prefix = if self.config.histogram { "hist_" } else { "" };

        let callback = |module: &mut Module, name: String, args: &[Type], ret_ty: Type| {
            module.get_or_insert_function(Signature::new(&name, Linkage::External, args, ret_ty))
        };

        let access_callback = [
            callback(
                module,
                format!("{prefix}{hist_prefix}load"),
                &[intptr_ty],
                Type::Unit,
            ),
            callback(
                module,
                format!("{prefix}{hist_prefix}store"),
                &[intptr_ty],
                Type::Unit,
            ),
        ];
        let memmove = callback(
            module,
            format!("{prefix}memmove"),
            &[ptr_ty, ptr_ty, intptr_ty],
            ptr_ty,
        );
        let memcpy = callback(
            module,
            format!("{prefix}memcpy"),
            &[ptr_ty, ptr_ty, intptr_ty],
            ptr_ty,
        );
        let memset = callback(
            module,
            format!("{prefix}memset"),
            &[ptr_ty, Type::I32, intptr_ty],
            ptr_ty,
        );
        let init = callback(module, INIT_NAME.to_string(), &[], Type::Unit);

        let shadow_global = match module.gv_store.gv_by_symbol(SHADOW_DYN_ADDR_NAME) {
            Some(gv) => gv,
            None => module.gv_store.make_gv(GlobalVariableData::new(
                SHADOW_DYN_ADDR_NAME,
                intptr_ty,
                Linkage::External,
            )),
        };

        RuntimeEnv {
            shadow_global,
            access_callback,
            memcpy,
            memmove,
            memset,
            init,
        }
    }
}

struct FunctionInstrumentor<'a> {
    config: &'a InstrumentConfig,
    mapping: ShadowMapping,
    env: &'a RuntimeEnv,
    intptr_ty: Type,
    /// The per-function load of the shadow base, and its result.
    dynamic_shadow: Option<(InstId, ValueId)>,
    stats: InstrumentationStats,
}

impl FunctionInstrumentor<'_> {
    fn run(&mut self, module: &Module, func: &mut Function) -> InstrumentationStats {
        // Pre-constructor entry points may run before global constructors;
        // the runtime must be initialized first even when nothing else in
        // the body is instrumented.
        if self.maybe_insert_init_at_entry(func) {
            self.stats.modified = true;
        }

        debug!(func = func.sig.name(), "memheat instrumenting");

        // Fill the set of memory operations to instrument.
        let mut to_instrument = Vec::new();
        for block in func.layout.iter_block() {
            for inst in func.layout.iter_inst(block) {
                if classify_access(module, func, self.config, None, inst).is_some()
                    || func.dfg.inst(inst).is_mem_intrinsic()
                {
                    to_instrument.push(inst);
                }
            }
        }

        if to_instrument.is_empty() {
            debug!(
                func = func.sig.name(),
                modified = self.stats.modified,
                "memheat done instrumenting"
            );
            return self.stats;
        }

        self.insert_dynamic_shadow_at_entry(func);
        self.stats.modified = true;

        for (idx, inst) in to_instrument.into_iter().enumerate() {
            if let (Some(min), Some(max)) = (self.config.debug_min, self.config.debug_max) {
                if idx < min || idx > max {
                    continue;
                }
            }

            let shadow_load = self.dynamic_shadow.map(|(inst, _)| inst);
            match classify_access(module, func, self.config, shadow_load, inst) {
                Some(access) => self.instrument_mop(func, inst, access),
                None => self.instrument_mem_intrinsic(func, inst),
            }
        }

        debug!(
            func = func.sig.name(),
            modified = self.stats.modified,
            "memheat done instrumenting"
        );
        self.stats
    }

    fn maybe_insert_init_at_entry(&mut self, func: &mut Function) -> bool {
        if !func.sig.pre_ctor {
            return false;
        }
        let Some(entry) = func.layout.entry_block() else {
            return false;
        };

        let call = func.dfg.make_inst(InsnData::call(self.env.init, &[]));
        func.layout.prepend_inst(call, entry);
        true
    }

    /// Each instrumented function loads the shadow base once at entry and
    /// reuses it for every access.
    fn insert_dynamic_shadow_at_entry(&mut self, func: &mut Function) {
        let entry = func
            .layout
            .entry_block()
            .expect("instrumented function has no entry block");

        let gv_value = func.dfg.make_global_value(self.env.shadow_global);
        let load = func.dfg.make_inst(InsnData::load(gv_value, self.intptr_ty));
        func.layout.prepend_inst(load, entry);
        let offset = func
            .dfg
            .make_result(load)
            .expect("shadow base load has a result");
        self.dynamic_shadow = Some((load, offset));
    }

    fn instrument_mop(&mut self, func: &mut Function, inst: InstId, access: MemoryAccess) {
        // Skip instrumentation of stack accesses unless requested.
        if !self.config.instrument_stack && func.dfg.is_stack_addr(access.addr) {
            if access.is_write {
                self.stats.skipped_stack_writes += 1;
            } else {
                self.stats.skipped_stack_reads += 1;
            }
            return;
        }

        if access.is_write {
            self.stats.instrumented_writes += 1;
        } else {
            self.stats.instrumented_reads += 1;
        }

        match access.mask {
            Some(mask) => {
                self.instrument_masked(func, inst, access.addr, access.access_ty, mask, access.is_write)
            }
            // The access counts accumulate across the whole allocation, so
            // updating the shadow count for the first location suffices;
            // alignment and type size don't matter.
            None => self.instrument_address(func, inst, access.addr, access.is_write),
        }
    }

    /// Expand a masked vector access per lane. Constant-false lanes emit
    /// nothing; constant-true (or undef) lanes are instrumented
    /// unconditionally; dynamic lanes are guarded by a per-lane branch.
    fn instrument_masked(
        &mut self,
        func: &mut Function,
        inst: InstId,
        addr: ValueId,
        access_ty: Type,
        mask: ValueId,
        is_write: bool,
    ) {
        let vec_ty = access_ty
            .as_vec()
            .expect("masked access requires a vector type");

        let const_lanes = match func.dfg.value(mask) {
            Value::MaskConst { lanes, .. } => Some(lanes.clone()),
            _ => None,
        };

        for idx in 0..vec_ty.lanes as usize {
            if let Some(lanes) = &const_lanes {
                if lanes[idx] == MaskLane::False {
                    // Mask is constant false, so no instrumentation needed.
                    continue;
                }
            }

            let mut insert_before = inst;
            if const_lanes.is_none() {
                let idx_imm = func.dfg.make_imm_value(idx as i64);
                let mask_elem = emit(
                    func,
                    inst,
                    InsnData::ExtractElement {
                        args: [mask, idx_imm],
                    },
                );
                insert_before = split_block_and_insert_if_then(func, mask_elem, inst);
            }

            let zero = func.dfg.make_imm_value(0i64);
            let idx_imm = func.dfg.make_imm_value(idx as i64);
            let lane_addr = emit(
                func,
                insert_before,
                InsnData::Gep {
                    args: smallvec![addr, zero, idx_imm],
                },
            );
            self.instrument_address(func, insert_before, lane_addr, is_write);
        }
    }

    fn instrument_address(
        &mut self,
        func: &mut Function,
        insert_before: InstId,
        addr: ValueId,
        is_write: bool,
    ) {
        let addr_long = emit(
            func,
            insert_before,
            InsnData::cast(CastOp::PtrToInt, addr, self.intptr_ty),
        );

        if self.config.use_callbacks {
            emit_no_result(
                func,
                insert_before,
                InsnData::call(self.env.access_callback[is_write as usize], &[addr_long]),
            );
            return;
        }

        let shadow_ty = if self.config.histogram {
            Type::I8
        } else {
            Type::I64
        };

        // shadow = ((addr & mask) >> scale) + dynamic_offset
        let mask_imm = func.dfg.make_imm_value(self.mapping.mask as i64);
        let masked = emit(func, insert_before, InsnData::binary(BinaryOp::And, addr_long, mask_imm));
        let scale_imm = func.dfg.make_imm_value(self.mapping.scale as i64);
        let shifted = emit(func, insert_before, InsnData::binary(BinaryOp::Lshr, masked, scale_imm));
        let dynamic_offset = self
            .dynamic_shadow
            .expect("shadow base is loaded before instrumenting accesses")
            .1;
        let shadow = emit(func, insert_before, InsnData::binary(BinaryOp::Add, shifted, dynamic_offset));
        let shadow_ptr = emit(
            func,
            insert_before,
            InsnData::cast(CastOp::IntToPtr, shadow, Type::ptr()),
        );

        let counter = emit(func, insert_before, InsnData::load(shadow_ptr, shadow_ty));

        // With histograms the 8-bit counter saturates: no increment once the
        // count reaches 255.
        let mut insert_before = insert_before;
        if self.config.histogram {
            let max = func.dfg.make_imm_value(u8::MAX as i8);
            let cmp = emit(func, insert_before, InsnData::binary(BinaryOp::Lt, counter, max));
            insert_before = split_block_and_insert_if_then(func, cmp, insert_before);
        }

        // The counter update is intentionally unsynchronized; racing program
        // threads lose counts rather than paying for atomics.
        let one = if self.config.histogram {
            func.dfg.make_imm_value(1i8)
        } else {
            func.dfg.make_imm_value(1i64)
        };
        let incremented = emit(func, insert_before, InsnData::binary(BinaryOp::Add, counter, one));
        emit_no_result(func, insert_before, InsnData::store(incremented, shadow_ptr));
    }

    /// Replace `mem_copy`/`mem_move`/`mem_set` wholesale with a call to the
    /// profiling runtime equivalent, the length cast to pointer width.
    fn instrument_mem_intrinsic(&mut self, func: &mut Function, inst: InstId) {
        let data = func.dfg.inst(inst).clone();
        let call = match data {
            InsnData::MemCopy { args: [dst, src, len] } => {
                let len = self.cast_to(func, inst, len, self.intptr_ty);
                InsnData::Call {
                    callee: self.env.memcpy,
                    args: smallvec![dst, src, len],
                }
            }
            InsnData::MemMove { args: [dst, src, len] } => {
                let len = self.cast_to(func, inst, len, self.intptr_ty);
                InsnData::Call {
                    callee: self.env.memmove,
                    args: smallvec![dst, src, len],
                }
            }
            InsnData::MemSet { args: [dst, val, len] } => {
                let val = self.cast_to(func, inst, val, Type::I32);
                let len = self.cast_to(func, inst, len, self.intptr_ty);
                InsnData::Call {
                    callee: self.env.memset,
                    args: smallvec![dst, val, len],
                }
            }
            _ => unreachable!("not a memory intrinsic"),
        };

        func.dfg.replace_inst(inst, call);
    }

    fn cast_to(&self, func: &mut Function, before: InstId, value: ValueId, ty: Type) -> ValueId {
        if func.dfg.value_ty(value) == ty {
            return value;
        }
        emit(func, before, InsnData::cast(CastOp::Zext, value, ty))
    }
}
