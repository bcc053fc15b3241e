mod common;

use common::*;
use memheat_ir::{
    ir_writer::FuncWriter, ElemTy, FuncRef, FunctionBuilder, InsnData, Linkage, MaskLane, Module,
    Signature, Type, VecTy,
};
use memheat_passes::{InstrumentConfig, MemProfilerPass};

fn build_single_load_func(module: &mut Module) -> FuncRef {
    let func_ref = module.declare_function(Signature::new(
        "read_one",
        Linkage::Public,
        &[Type::ptr()],
        Type::I64,
    ));
    let mut builder = FunctionBuilder::new(module, func_ref);
    let block = builder.append_block();
    builder.switch_to_block(block);
    let addr = builder.args()[0];
    let loaded = builder.insert_inst(InsnData::load(addr, Type::I64));
    builder.insert_inst_no_result(ret(&[loaded]));
    func_ref
}

#[test]
fn single_load_gets_one_inline_shadow_update() {
    let mut module = host_module();
    let func_ref = build_single_load_func(&mut module);

    let pass = MemProfilerPass::new(InstrumentConfig::default());
    let stats = pass.run(&mut module, func_ref);

    assert!(stats.modified);
    assert_eq!(stats.instrumented_reads, 1);
    assert_eq!(stats.instrumented_writes, 0);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    // Shadow base loaded once at entry.
    assert!(dump.contains("load $__memheat_shadow_memory_dynamic_address"));
    // One shadow-address computation: (addr & mask) >> scale + offset.
    assert_eq!(dump.matches("= and ").count(), 1);
    assert_eq!(dump.matches("= lshr ").count(), 1);
    assert_eq!(dump.matches("= ptr_to_int ").count(), 1);
    assert_eq!(dump.matches("= int_to_ptr ").count(), 1);
    // Shadow add + counter increment.
    assert_eq!(dump.matches("= add ").count(), 2);
    // Counter load + shadow base load + the original load, which is intact.
    assert_eq!(dump.matches("= load ").count(), 3);
    assert!(dump.contains("load v0"));
    // Counter store only; 64-bit counters are unconditional, no branching.
    assert_eq!(dump.matches("store ").count(), 1);
    assert!(!dump.contains("br "));
}

#[test]
fn histogram_counter_saturates_behind_a_branch() {
    let mut module = host_module();
    let func_ref = build_single_load_func(&mut module);

    let config = InstrumentConfig {
        histogram: true,
        ..InstrumentConfig::default()
    };
    let pass = MemProfilerPass::new(config);
    pass.run(&mut module, func_ref);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    // 8-bit counter compared against the saturation ceiling, increment
    // guarded by the branch.
    assert!(dump.contains(".i8 = load "));
    assert_eq!(dump.matches("= lt ").count(), 1);
    assert_eq!(dump.matches("br ").count(), 1);
    // Entry split into head / increment / tail blocks.
    assert_eq!(dump.matches("    block").count(), 3);
}

#[test]
fn callback_mode_emits_runtime_calls_instead_of_shadow_code() {
    let mut module = host_module();
    let func_ref = build_single_load_func(&mut module);

    let config = InstrumentConfig {
        use_callbacks: true,
        ..InstrumentConfig::default()
    };
    MemProfilerPass::new(config).run(&mut module, func_ref);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    assert!(dump.contains("call %__memheat_load"));
    assert!(!dump.contains("= and "));
    assert!(!dump.contains("= lshr "));
}

#[test]
fn constant_mask_lanes_expand_individually() {
    let mut module = host_module();
    let vec_ty = Type::Vec(VecTy::new(ElemTy::I64, 4));
    let mask_ty = Type::Vec(VecTy::new(ElemTy::I1, 4));
    let func_ref = module.declare_function(Signature::new(
        "masked_read",
        Linkage::Public,
        &[Type::ptr()],
        Type::Unit,
    ));
    let mut builder = FunctionBuilder::new(&mut module, func_ref);
    let block = builder.append_block();
    builder.switch_to_block(block);
    let addr = builder.args()[0];
    let mask = builder.func_mut().dfg.make_mask_value(
        &[MaskLane::True, MaskLane::False, MaskLane::Undef, MaskLane::True],
        mask_ty,
    );
    builder.insert_inst(InsnData::MaskedLoad {
        args: [addr, mask],
        ty: vec_ty,
    });
    builder.insert_inst_no_result(ret(&[]));

    let stats = MemProfilerPass::new(InstrumentConfig::default()).run(&mut module, func_ref);
    assert_eq!(stats.instrumented_reads, 1);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    // The constant-false lane is skipped entirely: three per-lane addresses,
    // three unconditional counter updates, no guards.
    assert_eq!(dump.matches("= gep ").count(), 3);
    assert_eq!(dump.matches("store ").count(), 3);
    assert!(!dump.contains("br "));
    assert!(!dump.contains("extract_element"));
}

#[test]
fn dynamic_mask_lanes_are_guarded_per_lane() {
    let mut module = host_module();
    let vec_ty = Type::Vec(VecTy::new(ElemTy::I64, 2));
    let mask_ty = Type::Vec(VecTy::new(ElemTy::I1, 2));
    let func_ref = module.declare_function(Signature::new(
        "masked_write",
        Linkage::Public,
        &[Type::ptr(), mask_ty],
        Type::Unit,
    ));
    let mut builder = FunctionBuilder::new(&mut module, func_ref);
    let block = builder.append_block();
    builder.switch_to_block(block);
    let addr = builder.args()[0];
    let mask = builder.args()[1];
    let value = builder.insert_inst(InsnData::load(addr, vec_ty));
    builder.insert_inst_no_result(InsnData::MaskedStore {
        args: [value, addr, mask],
        ty: vec_ty,
    });
    builder.insert_inst_no_result(ret(&[]));

    let stats = MemProfilerPass::new(InstrumentConfig::default()).run(&mut module, func_ref);
    assert_eq!(stats.instrumented_reads, 1);
    assert_eq!(stats.instrumented_writes, 1);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    // Two dynamic lanes, each guarded: extract + branch per lane.
    assert_eq!(dump.matches("extract_element").count(), 2);
    assert_eq!(dump.matches("br ").count(), 2);
    assert_eq!(dump.matches("= gep ").count(), 2);
}

#[test]
fn mem_intrinsics_become_runtime_calls() {
    let mut module = host_module();
    let func_ref = module.declare_function(Signature::new(
        "copy_and_fill",
        Linkage::Public,
        &[Type::ptr(), Type::ptr()],
        Type::Unit,
    ));
    let mut builder = FunctionBuilder::new(&mut module, func_ref);
    let block = builder.append_block();
    builder.switch_to_block(block);
    let dst = builder.args()[0];
    let src = builder.args()[1];
    let len = builder.make_imm_value(32i32);
    let fill = builder.make_imm_value(0i8);
    builder.insert_inst_no_result(InsnData::MemCopy {
        args: [dst, src, len],
    });
    builder.insert_inst_no_result(InsnData::MemSet {
        args: [dst, fill, len],
    });
    builder.insert_inst_no_result(ret(&[]));

    MemProfilerPass::new(InstrumentConfig::default()).run(&mut module, func_ref);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    assert!(dump.contains("call %__memheat_memcpy"));
    assert!(dump.contains("call %__memheat_memset"));
    assert!(!dump.contains("mem_copy"));
    assert!(!dump.contains("mem_set"));
    // Lengths (and the memset fill byte) are cast to pointer width.
    assert!(dump.matches("= zext ").count() >= 2);
}

#[test]
fn stack_accesses_are_skipped_by_default_but_configurable() {
    let build = |module: &mut Module, name: &str| {
        let func_ref =
            module.declare_function(Signature::new(name, Linkage::Public, &[], Type::I64));
        let mut builder = FunctionBuilder::new(module, func_ref);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let slot = builder.insert_inst(InsnData::Alloca { ty: Type::I64 });
        let loaded = builder.insert_inst(InsnData::load(slot, Type::I64));
        builder.insert_inst_no_result(ret(&[loaded]));
        func_ref
    };

    let mut module = host_module();
    let func_ref = build(&mut module, "stack_read");
    let stats = MemProfilerPass::new(InstrumentConfig::default()).run(&mut module, func_ref);
    assert_eq!(stats.skipped_stack_reads, 1);
    assert_eq!(stats.instrumented_reads, 0);

    let mut module = host_module();
    let func_ref = build(&mut module, "stack_read");
    let config = InstrumentConfig {
        instrument_stack: true,
        ..InstrumentConfig::default()
    };
    let stats = MemProfilerPass::new(config).run(&mut module, func_ref);
    assert_eq!(stats.skipped_stack_reads, 0);
    assert_eq!(stats.instrumented_reads, 1);
}

#[test]
fn pre_ctor_functions_get_runtime_init_first() {
    let mut module = host_module();
    let mut sig = Signature::new("early_entry", Linkage::Public, &[], Type::Unit);
    sig.pre_ctor = true;
    let func_ref = module.declare_function(sig);
    let mut builder = FunctionBuilder::new(&mut module, func_ref);
    let block = builder.append_block();
    builder.switch_to_block(block);
    builder.insert_inst_no_result(ret(&[]));

    let stats = MemProfilerPass::new(InstrumentConfig::default()).run(&mut module, func_ref);
    assert!(stats.modified);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    assert!(dump.contains("call %__memheat_init"));
}

#[test]
fn runtime_and_filtered_functions_are_left_alone() {
    let mut module = host_module();
    let func_ref = build_single_load_func(&mut module);

    let config = InstrumentConfig {
        debug_func: Some("read_one".to_string()),
        ..InstrumentConfig::default()
    };
    let stats = MemProfilerPass::new(config).run(&mut module, func_ref);
    assert!(!stats.modified);

    let dump = FuncWriter::new(&module, func_ref).dump_string();
    assert!(!dump.contains("__memheat_shadow_memory_dynamic_address"));
}
