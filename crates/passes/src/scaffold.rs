//! Module-level scaffolding: the runtime-init constructor and the globals
//! the runtime reads its configuration from. Thin glue over the IR.

use memheat_ir::{
    FuncRef, GlobalVariableData, GvInitializer, Immediate, InsnData, Linkage, Module, ObjectFormat,
    Signature, Type,
};

use crate::config::InstrumentConfig;

pub const MEMPROFILER_VERSION: u32 = 1;

/// Prefix of every runtime symbol; functions carrying it are never
/// instrumented.
pub const RUNTIME_NAME_PREFIX: &str = "__memheat_";

pub const MODULE_CTOR_NAME: &str = "memheat.module_ctor";
pub const INIT_NAME: &str = "__memheat_init";
pub const VERSION_CHECK_NAME_PREFIX: &str = "__memheat_version_mismatch_check_v";
pub const SHADOW_DYN_ADDR_NAME: &str = "__memheat_shadow_memory_dynamic_address";
pub const FILENAME_VAR_NAME: &str = "__memheat_profile_filename";
pub const HISTOGRAM_FLAG_VAR_NAME: &str = "__memheat_histogram";
pub const DEFAULT_OPTIONS_VAR_NAME: &str = "__memheat_default_options_str";

/// Module flag under which frontends record the requested profile output
/// filename.
pub const FILENAME_MODULE_FLAG: &str = "memheat-profile-filename";

const CTOR_PRIORITY: u64 = 1;
/// Wasm toolchains need more than one priority for constructors.
const WASM_CTOR_PRIORITY: u64 = 50;

fn ctor_priority(module: &Module) -> u64 {
    match module.target.format {
        ObjectFormat::Wasm => WASM_CTOR_PRIORITY,
        _ => CTOR_PRIORITY,
    }
}

/// Instrument the module: register the runtime-init constructor and emit the
/// configuration globals.
pub struct ModuleMemProfilerPass {
    config: InstrumentConfig,
}

impl ModuleMemProfilerPass {
    pub fn new(config: InstrumentConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, module: &mut Module) -> bool {
        self.create_module_ctor(module);
        create_profile_filename_var(module);
        self.create_histogram_flag_var(module);
        self.create_default_options_var(module);
        true
    }

    fn create_module_ctor(&self, module: &mut Module) {
        let init = module.get_or_insert_function(Signature::new(
            INIT_NAME,
            Linkage::External,
            &[],
            Type::Unit,
        ));
        let version_check = self.config.insert_version_check.then(|| {
            let name = format!("{VERSION_CHECK_NAME_PREFIX}{MEMPROFILER_VERSION}");
            module.get_or_insert_function(Signature::new(
                &name,
                Linkage::External,
                &[],
                Type::Unit,
            ))
        });

        let ctor = module.declare_function(Signature::new(
            MODULE_CTOR_NAME,
            Linkage::Private,
            &[],
            Type::Unit,
        ));
        build_ctor_body(module, ctor, init, version_check);

        let priority = ctor_priority(module);
        module.register_ctor(ctor, priority);
    }

    /// The histogram flag is a global so the runtime can see which shadow
    /// counter behavior this module was compiled for.
    fn create_histogram_flag_var(&self, module: &mut Module) {
        let mut data = GlobalVariableData::constant(
            HISTOGRAM_FLAG_VAR_NAME,
            Type::I1,
            Linkage::WeakAny,
            GvInitializer::Immediate(Immediate::I1(self.config.histogram)),
        );
        apply_comdat(module, &mut data);
        let gv = module.gv_store.make_gv(data);
        module.compiler_used.push(gv);
    }

    fn create_default_options_var(&self, module: &mut Module) {
        let mut data = GlobalVariableData::constant(
            DEFAULT_OPTIONS_VAR_NAME,
            Type::ptr(),
            Linkage::WeakAny,
            GvInitializer::Str(self.config.runtime_default_options.clone()),
        );
        apply_comdat(module, &mut data);
        module.gv_store.make_gv(data);
    }
}

fn build_ctor_body(
    module: &mut Module,
    ctor: FuncRef,
    init: FuncRef,
    version_check: Option<FuncRef>,
) {
    let func = &mut module.funcs[ctor];
    let entry = func.dfg.make_block();
    func.layout.append_block(entry);

    let call_init = func.dfg.make_inst(InsnData::call(init, &[]));
    func.layout.append_inst(call_init, entry);
    if let Some(version_check) = version_check {
        let call_check = func.dfg.make_inst(InsnData::call(version_check, &[]));
        func.layout.append_inst(call_check, entry);
    }
    let ret = func.dfg.make_inst(InsnData::Return {
        args: Default::default(),
    });
    func.layout.append_inst(ret, entry);
}

/// Emit the variable carrying the profile output filename, when the
/// frontend requested one via module flag.
fn create_profile_filename_var(module: &mut Module) {
    let Some(filename) = module.flags.get(FILENAME_MODULE_FLAG).cloned() else {
        return;
    };
    debug_assert!(
        !filename.is_empty(),
        "unexpected empty profile filename module flag"
    );

    let mut data = GlobalVariableData::constant(
        FILENAME_VAR_NAME,
        Type::ptr(),
        Linkage::WeakAny,
        GvInitializer::Str(filename),
    );
    apply_comdat(module, &mut data);
    module.gv_store.make_gv(data);
}

/// Weak definitions are deduplicated through COMDAT where the target
/// supports it, keeping one definition per linked image.
fn apply_comdat(module: &Module, data: &mut GlobalVariableData) {
    if module.target.supports_comdat() {
        data.linkage = Linkage::Public;
        data.comdat = Some(data.symbol.clone());
    }
}

#[cfg(test)]
mod tests {
    use memheat_ir::{builder::test_util::test_module, TargetSpec};

    use super::*;

    #[test]
    fn registers_ctor_and_globals() {
        let mut module = test_module();
        module
            .flags
            .insert(FILENAME_MODULE_FLAG.to_string(), "prof.json".to_string());

        let pass = ModuleMemProfilerPass::new(InstrumentConfig::default());
        assert!(pass.run(&mut module));

        assert_eq!(module.ctors.len(), 1);
        assert_eq!(module.ctors[0].priority, 1);
        let ctor = &module.funcs[module.ctors[0].func];
        assert_eq!(ctor.sig.name(), MODULE_CTOR_NAME);

        for symbol in [
            FILENAME_VAR_NAME,
            HISTOGRAM_FLAG_VAR_NAME,
            DEFAULT_OPTIONS_VAR_NAME,
        ] {
            let gv = module
                .gv_store
                .gv_by_symbol(symbol)
                .unwrap_or_else(|| panic!("missing global `{symbol}`"));
            // Host target supports COMDAT, so the weak definitions were
            // upgraded and grouped.
            assert!(module.gv_store.gv_data(gv).comdat.is_some());
        }

        assert!(module.func_by_symbol(INIT_NAME).is_some());
    }

    #[test]
    fn macho_keeps_weak_linkage_and_no_comdat() {
        let mut module = memheat_ir::Module::new(TargetSpec::new(
            64,
            memheat_ir::ObjectFormat::MachO,
        ));
        let pass = ModuleMemProfilerPass::new(InstrumentConfig::default());
        pass.run(&mut module);

        let gv = module.gv_store.gv_by_symbol(HISTOGRAM_FLAG_VAR_NAME).unwrap();
        let data = module.gv_store.gv_data(gv);
        assert_eq!(data.linkage, Linkage::WeakAny);
        assert!(data.comdat.is_none());
    }

    #[test]
    fn wasm_uses_late_ctor_priority() {
        let mut module =
            memheat_ir::Module::new(TargetSpec::new(32, memheat_ir::ObjectFormat::Wasm));
        ModuleMemProfilerPass::new(InstrumentConfig::default()).run(&mut module);
        assert_eq!(module.ctors[0].priority, 50);
    }
}
