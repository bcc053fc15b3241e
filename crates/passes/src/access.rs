//! Classification of instructions into interesting memory accesses.

use memheat_ir::{Function, InsnData, InstId, Module, Type, Value, ValueId};

use crate::config::InstrumentConfig;

/// One memory operation worth instrumenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub addr: ValueId,
    pub is_write: bool,
    pub access_ty: Type,
    /// Lane mask of a masked vector access.
    pub mask: Option<ValueId>,
}

/// If `inst` is an interesting memory access, returns information about the
/// access. The load fetching the dynamic shadow address is never interesting.
pub fn classify_access(
    module: &Module,
    func: &Function,
    config: &InstrumentConfig,
    dynamic_shadow_load: Option<InstId>,
    inst_id: InstId,
) -> Option<MemoryAccess> {
    if dynamic_shadow_load == Some(inst_id) {
        return None;
    }

    let access = match func.dfg.inst(inst_id) {
        InsnData::Load { args, ty } => {
            if !config.instrument_reads {
                return None;
            }
            MemoryAccess {
                addr: args[0],
                is_write: false,
                access_ty: *ty,
                mask: None,
            }
        }
        InsnData::Store { args } => {
            if !config.instrument_writes {
                return None;
            }
            MemoryAccess {
                addr: args[1],
                is_write: true,
                access_ty: func.dfg.value_ty(args[0]),
                mask: None,
            }
        }
        InsnData::AtomicRmw { args, ty, .. } => {
            if !config.instrument_atomics {
                return None;
            }
            MemoryAccess {
                addr: args[1],
                is_write: true,
                access_ty: *ty,
                mask: None,
            }
        }
        InsnData::AtomicCmpXchg { args, ty } => {
            if !config.instrument_atomics {
                return None;
            }
            MemoryAccess {
                addr: args[0],
                is_write: true,
                access_ty: *ty,
                mask: None,
            }
        }
        InsnData::MaskedLoad { args, ty } => {
            if !config.instrument_reads {
                return None;
            }
            MemoryAccess {
                addr: args[0],
                is_write: false,
                access_ty: *ty,
                mask: Some(args[1]),
            }
        }
        InsnData::MaskedStore { args, ty } => {
            if !config.instrument_writes {
                return None;
            }
            MemoryAccess {
                addr: args[1],
                is_write: true,
                access_ty: *ty,
                mask: Some(args[2]),
            }
        }
        _ => return None,
    };

    // Do not instrument accesses from different address spaces; we cannot
    // deal with them.
    if func.dfg.value_ty(access.addr).addr_space() != Some(0) {
        return None;
    }

    // Language-reserved error slots are promoted out of memory by
    // instruction selection; tracking them as memory makes no sense.
    if func.dfg.is_err_slot(access.addr) {
        return None;
    }

    // Peel offset computations and casts.
    let obj = func.dfg.underlying_object(access.addr);
    if let Value::Global { gv, .. } = func.dfg.value(obj) {
        let gv_data = module.gv_store.gv_data(*gv);

        // Do not instrument profiling counter updates.
        if gv_data
            .section
            .as_deref()
            .is_some_and(|section| section.ends_with(module.target.counters_section()))
        {
            return None;
        }

        // Do not instrument accesses to the runtime's own variables.
        if gv_data.symbol.starts_with("__memheat") {
            return None;
        }
    }

    Some(access)
}

#[cfg(test)]
mod tests {
    use memheat_ir::{
        builder::test_util::*, FunctionBuilder, GlobalVariableData, InsnData, Linkage, Type,
    };

    use super::*;

    #[test]
    fn load_store_gated_by_toggles() {
        let mut module = test_module();
        let func_ref = module.declare_function(test_func_sig("f", &[Type::ptr()], Type::Unit));
        let mut builder = FunctionBuilder::new(&mut module, func_ref);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let addr = builder.args()[0];
        let loaded = builder.insert_inst(InsnData::load(addr, Type::I64));
        builder.insert_inst_no_result(InsnData::store(loaded, addr));
        builder.insert_inst_no_result(InsnData::Return { args: Default::default() });

        let func = &module.funcs[func_ref];
        let insts: Vec<_> = func
            .layout
            .iter_block()
            .flat_map(|b| func.layout.iter_inst(b))
            .collect();

        let config = InstrumentConfig::default();
        let load_access = classify_access(&module, func, &config, None, insts[0]).unwrap();
        assert!(!load_access.is_write);
        let store_access = classify_access(&module, func, &config, None, insts[1]).unwrap();
        assert!(store_access.is_write);

        let no_reads = InstrumentConfig {
            instrument_reads: false,
            ..InstrumentConfig::default()
        };
        assert!(classify_access(&module, func, &no_reads, None, insts[0]).is_none());
        assert!(classify_access(&module, func, &no_reads, None, insts[1]).is_some());
    }

    #[test]
    fn atomics_gated_by_their_own_toggle() {
        let mut module = test_module();
        let func_ref = module.declare_function(test_func_sig("f", &[Type::ptr()], Type::Unit));
        let mut builder = FunctionBuilder::new(&mut module, func_ref);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let addr = builder.args()[0];
        let one = builder.make_imm_value(1i64);
        builder.insert_inst(InsnData::AtomicRmw {
            code: memheat_ir::RmwOp::Add,
            args: [one, addr],
            ty: Type::I64,
        });
        builder.insert_inst(InsnData::AtomicCmpXchg {
            args: [addr, one, one],
            ty: Type::I64,
        });
        builder.insert_inst_no_result(InsnData::Return { args: Default::default() });

        let func = &module.funcs[func_ref];
        let insts: Vec<_> = func
            .layout
            .iter_block()
            .flat_map(|b| func.layout.iter_inst(b))
            .collect();

        let config = InstrumentConfig::default();
        assert!(classify_access(&module, func, &config, None, insts[0]).is_some_and(|a| a.is_write));
        assert!(classify_access(&module, func, &config, None, insts[1]).is_some_and(|a| a.is_write));

        let no_atomics = InstrumentConfig {
            instrument_atomics: false,
            ..InstrumentConfig::default()
        };
        assert!(classify_access(&module, func, &no_atomics, None, insts[0]).is_none());
        assert!(classify_access(&module, func, &no_atomics, None, insts[1]).is_none());
    }

    #[test]
    fn skips_non_default_address_space_and_counter_globals() {
        let mut module = test_module();
        let section = module.target.counters_section().to_string();
        let counter_gv = module.gv_store.make_gv(GlobalVariableData {
            section: Some(section),
            ..GlobalVariableData::new("counters", Type::I64, Linkage::Private)
        });

        let func_ref = module.declare_function(test_func_sig(
            "f",
            &[Type::Ptr(1), Type::ptr()],
            Type::Unit,
        ));
        let mut builder = FunctionBuilder::new(&mut module, func_ref);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let other_space = builder.args()[0];
        builder.insert_inst(InsnData::load(other_space, Type::I64));
        let gv_addr = builder.func_mut().dfg.make_global_value(counter_gv);
        builder.insert_inst(InsnData::load(gv_addr, Type::I64));
        builder.insert_inst_no_result(InsnData::Return { args: Default::default() });

        let func = &module.funcs[func_ref];
        let insts: Vec<_> = func
            .layout
            .iter_block()
            .flat_map(|b| func.layout.iter_inst(b))
            .collect();

        let config = InstrumentConfig::default();
        assert!(classify_access(&module, func, &config, None, insts[0]).is_none());
        assert!(classify_access(&module, func, &config, None, insts[1]).is_none());
    }
}
