use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{
    debug_info::{ScopeRef, Subprogram},
    global_variable::GlobalVariableStore,
    target::TargetSpec,
    Function, Linkage, Signature,
};

/// An opaque reference to a [`Function`] in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(pub u32);
cranelift_entity::entity_impl!(FuncRef);

/// A module-constructor registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtorEntry {
    pub func: FuncRef,
    pub priority: u64,
}

pub struct Module {
    /// Target description of the module.
    pub target: TargetSpec,

    /// Holds all functions declared in the module.
    pub funcs: PrimaryMap<FuncRef, Function>,
    symbols: FxHashMap<String, FuncRef>,

    pub gv_store: GlobalVariableStore,

    /// Debug-info subprogram scopes referenced by debug locations.
    pub scopes: PrimaryMap<ScopeRef, Subprogram>,

    /// Functions to run at program start, lowest priority first.
    pub ctors: Vec<CtorEntry>,

    /// Globals kept alive for the toolchain even when otherwise unreferenced.
    pub compiler_used: Vec<crate::global_variable::GlobalVariable>,

    /// Module-level string flags (e.g. the profile output filename the
    /// frontend requested).
    pub flags: FxHashMap<String, String>,
}

impl Module {
    pub fn new(target: TargetSpec) -> Self {
        Self {
            target,
            funcs: PrimaryMap::default(),
            symbols: FxHashMap::default(),
            gv_store: GlobalVariableStore::default(),
            scopes: PrimaryMap::default(),
            ctors: Vec::new(),
            compiler_used: Vec::new(),
            flags: FxHashMap::default(),
        }
    }

    pub fn declare_function(&mut self, sig: Signature) -> FuncRef {
        debug_assert!(
            !self.symbols.contains_key(sig.name()),
            "duplicate function symbol `{}`",
            sig.name()
        );
        let name = sig.name().to_string();
        let func_ref = self.funcs.push(Function::new(sig));
        self.symbols.insert(name, func_ref);
        func_ref
    }

    /// Returns the function with the given symbol, declaring it as an
    /// external function when absent.
    pub fn get_or_insert_function(&mut self, sig: Signature) -> FuncRef {
        if let Some(&func_ref) = self.symbols.get(sig.name()) {
            return func_ref;
        }
        self.declare_function(sig)
    }

    pub fn func_by_symbol(&self, symbol: &str) -> Option<FuncRef> {
        self.symbols.get(symbol).copied()
    }

    /// Returns all `func_ref`s in the module.
    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    /// Returns `true` if the function has no body in this module.
    pub fn is_external(&self, func_ref: FuncRef) -> bool {
        self.funcs[func_ref].sig.linkage() == Linkage::External
    }

    pub fn make_scope(&mut self, subprogram: Subprogram) -> ScopeRef {
        self.scopes.push(subprogram)
    }

    pub fn scope(&self, scope: ScopeRef) -> &Subprogram {
        &self.scopes[scope]
    }

    pub fn register_ctor(&mut self, func: FuncRef, priority: u64) {
        self.ctors.push(CtorEntry { func, priority });
    }
}
