use smallvec::SmallVec;

use crate::{DataFlowGraph, Layout, Linkage, Type, ValueId};

pub struct Function {
    pub sig: Signature,
    pub arg_values: SmallVec<[ValueId; 8]>,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
}

impl Function {
    pub fn new(sig: Signature) -> Self {
        let mut dfg = DataFlowGraph::new();
        let arg_values = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, arg_ty)| {
                let value = dfg.make_arg_value(*arg_ty, idx);
                dfg.make_value(value)
            })
            .collect();

        Self {
            sig,
            arg_values,
            dfg,
            layout: Layout::default(),
        }
    }
}

/// The heap-allocation nature of a callee, as declared by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocKind {
    #[default]
    NotAlloc,
    /// A heap allocator with a hot/cold variant available for rewriting.
    NewUnhinted,
    /// A heap allocator already carrying an explicit hot/cold hint.
    NewHinted,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Name of the function. Doubles as the linkage name used for
    /// profile-fingerprint computation.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    args: SmallVec<[Type; 8]>,
    ret_ty: Type,

    /// The function participates in a COMDAT group.
    pub comdat: bool,

    /// The function is a platform pre-constructor entry point and may run
    /// before global constructors.
    pub pre_ctor: bool,

    /// Heap-allocation nature when used as a callee.
    pub alloc_kind: AllocKind,

    /// Structural hash recorded by the profiling build; 0 when unknown.
    pub profile_hash: u64,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, args: &[Type], ret_ty: Type) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            args: args.into(),
            ret_ty,
            comdat: false,
            pre_ctor: false,
            alloc_kind: AllocKind::NotAlloc,
            profile_hash: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn update_linkage(&mut self, linkage: Linkage) {
        self.linkage = linkage;
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }
}
