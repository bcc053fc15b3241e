pub mod builder;
pub mod debug_info;
pub mod dfg;
pub mod func_cursor;
pub mod function;
pub mod global_variable;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod metadata;
pub mod module;
pub mod target;
pub mod types;
pub mod value;

pub use builder::FunctionBuilder;
pub use dfg::{Block, BlockId, DataFlowGraph};
pub use debug_info::{DebugLoc, DebugLocId, ScopeRef, Subprogram};
pub use function::{AllocKind, Function, Signature};
pub use global_variable::{GlobalVariable, GlobalVariableData, GvInitializer};
pub use inst::{BinaryOp, CastOp, InsnData, InstId, RmwOp};
pub use layout::Layout;
pub use linkage::Linkage;
pub use metadata::{ContextTotalSize, MemProfAttr, MibEntry};
pub use module::{FuncRef, Module};
pub use target::{ObjectFormat, TargetSpec};
pub use types::{ElemTy, Type, VecTy};
pub use value::{Immediate, MaskLane, Value, ValueId};
