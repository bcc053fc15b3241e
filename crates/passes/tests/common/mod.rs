//! Shared fixtures for the pass integration tests.
#![allow(dead_code)]

use memheat_ir::{
    AllocKind, FuncRef, Function, InsnData, InstId, Linkage, Module, Signature, TargetSpec, Type,
};
use memheat_profile::{
    AllocSite, AllocTypeOracle, AllocationType, Frame, FunctionRecord, MemProfRecord,
    MemProfSection, MemoryFileSystem, ProfileCounters, ProfileDocument, PROFILE_VERSION,
};

pub fn host_module() -> Module {
    Module::new(TargetSpec::host())
}

/// Declares an external allocator eligible for hot/cold hinting.
pub fn declare_alloc_fn(module: &mut Module, name: &str) -> FuncRef {
    let mut sig = Signature::new(name, Linkage::External, &[Type::I64], Type::ptr());
    sig.alloc_kind = AllocKind::NewUnhinted;
    module.declare_function(sig)
}

/// All instructions of a function in layout order.
pub fn all_insts(func: &Function) -> Vec<InstId> {
    func.layout
        .iter_block()
        .flat_map(|block| func.layout.iter_inst(block))
        .collect()
}

/// The first direct call to `callee` in the function.
pub fn find_call_to(func: &Function, callee: FuncRef) -> InstId {
    all_insts(func)
        .into_iter()
        .find(|&inst| func.dfg.inst(inst).callee() == Some(callee))
        .expect("function contains no call to the callee")
}

/// Classifies by lifetime: long-lived contexts are cold, heavily accessed
/// ones hot, the rest not cold.
pub struct LifetimeOracle;

impl AllocTypeOracle for LifetimeOracle {
    fn classify(&self, info: &ProfileCounters) -> AllocationType {
        if info.access_density >= 100 {
            AllocationType::Hot
        } else if info.total_lifetime >= 1_000 {
            AllocationType::Cold
        } else {
            AllocationType::NotCold
        }
    }
}

pub fn cold_counters(total_size: u64) -> ProfileCounters {
    ProfileCounters {
        total_size,
        alloc_count: 1,
        total_lifetime: 5_000,
        access_density: 0,
    }
}

pub fn not_cold_counters(total_size: u64) -> ProfileCounters {
    ProfileCounters {
        total_size,
        alloc_count: 1,
        total_lifetime: 10,
        access_density: 5,
    }
}

pub fn alloc_site(call_stack: Vec<Frame>, info: ProfileCounters) -> AllocSite {
    AllocSite { call_stack, info }
}

/// Serializes a single-function profile document into an in-memory
/// filesystem under `path`.
pub fn profile_fs(path: &str, records: Vec<FunctionRecord>) -> MemoryFileSystem {
    let document = ProfileDocument {
        version: PROFILE_VERSION,
        memprof: Some(MemProfSection { records }),
    };
    let mut fs = MemoryFileSystem::new();
    fs.add_file(path, serde_json::to_string(&document).unwrap());
    fs
}

pub fn function_record(function: u64, record: MemProfRecord) -> FunctionRecord {
    FunctionRecord {
        function,
        hash: 0,
        record,
    }
}

pub fn ret(args: &[memheat_ir::ValueId]) -> InsnData {
    InsnData::Return { args: args.into() }
}
