pub mod error;
pub mod fs;
pub mod oracle;
pub mod reader;
pub mod record;

pub use error::{ProfileError, RecordLookupError};
pub use fs::{FileSystem, MemoryFileSystem, RealFileSystem};
pub use oracle::AllocTypeOracle;
pub use reader::{
    CallEdge, FunctionRecord, IndexedProfileReader, MemProfSection, ProfileDocument,
    PROFILE_VERSION,
};
pub use record::{
    AllocSite, AllocationType, CallSiteRecord, Frame, LineLocation, MemProfRecord, ProfileCounters,
};
