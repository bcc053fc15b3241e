//! The indexed profile reader.
//!
//! Exposes exactly the two operations the matching pipeline needs: record
//! lookup by function fingerprint and caller→callee edge enumeration.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProfileError, RecordLookupError},
    fs::FileSystem,
    record::{LineLocation, MemProfRecord},
};

pub const PROFILE_VERSION: u32 = 1;

/// On-disk profile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub version: u32,
    /// Absent when the profile carries no memory section.
    pub memprof: Option<MemProfSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemProfSection {
    pub records: Vec<FunctionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Fingerprint of the function's linkage name.
    pub function: u64,
    /// Structural hash of the function in the profiled build; 0 when the
    /// profiler did not record one.
    pub hash: u64,
    pub record: MemProfRecord,
}

/// A caller→callee edge: the call's source location within the caller and
/// the callee's fingerprint (0 for anonymized allocation leaves).
pub type CallEdge = (LineLocation, u64);

struct FunctionEntry {
    hash: u64,
    record: MemProfRecord,
}

pub struct IndexedProfileReader {
    records: FxHashMap<u64, FunctionEntry>,
    has_memory_profile: bool,
}

impl IndexedProfileReader {
    pub fn from_file(path: &Path, fs: &dyn FileSystem) -> Result<Self, ProfileError> {
        let contents = fs.read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let document: ProfileDocument =
            serde_json::from_str(&contents).map_err(|err| ProfileError::Malformed {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        if document.version != PROFILE_VERSION {
            return Err(ProfileError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: document.version,
                expected: PROFILE_VERSION,
            });
        }

        Ok(Self::from_document(document))
    }

    pub fn from_document(document: ProfileDocument) -> Self {
        let has_memory_profile = document.memprof.is_some();
        let mut records = FxHashMap::default();
        for entry in document.memprof.into_iter().flat_map(|s| s.records) {
            records.insert(
                entry.function,
                FunctionEntry {
                    hash: entry.hash,
                    record: entry.record,
                },
            );
        }

        Self {
            records,
            has_memory_profile,
        }
    }

    pub fn has_memory_profile(&self) -> bool {
        self.has_memory_profile
    }

    /// Returns `true` if the profile has any record for `function`.
    pub fn contains(&self, function: u64) -> bool {
        self.records.contains_key(&function)
    }

    /// Looks up the record for `function`. `ir_hash` is the structural hash
    /// of the current IR function; a recorded hash that disagrees with a
    /// non-zero `ir_hash` is reported as a mismatch.
    pub fn get_record(
        &self,
        function: u64,
        ir_hash: u64,
    ) -> Result<MemProfRecord, RecordLookupError> {
        let entry = self
            .records
            .get(&function)
            .ok_or(RecordLookupError::UnknownFunction)?;

        if entry.hash != 0 && ir_hash != 0 && entry.hash != ir_hash {
            return Err(RecordLookupError::HashMismatch);
        }

        Ok(entry.record.clone())
    }

    /// Enumerates the caller→callee edges recorded in the profile, keyed by
    /// caller fingerprint and sorted/deduplicated per caller. The innermost
    /// frame of every stack contributes an anonymized edge with callee 0,
    /// matching the profiler's leaf convention.
    pub fn caller_callee_pairs(&self) -> FxHashMap<u64, Vec<CallEdge>> {
        let mut calls: FxHashMap<u64, Vec<CallEdge>> = FxHashMap::default();

        let mut add_stack = |frames: &[crate::record::Frame]| {
            for (idx, frame) in frames.iter().enumerate() {
                let callee = if idx == 0 {
                    0
                } else {
                    frames[idx - 1].function
                };
                calls
                    .entry(frame.function)
                    .or_default()
                    .push((frame.location(), callee));
            }
        };

        for entry in self.records.values() {
            for alloc in &entry.record.alloc_sites {
                add_stack(&alloc.call_stack);
            }
            for call_site in &entry.record.call_sites {
                add_stack(&call_site.frames);
            }
        }

        for call_list in calls.values_mut() {
            call_list.sort_unstable();
            call_list.dedup();
        }

        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AllocSite, Frame, ProfileCounters};

    fn doc_with_one_stack(frames: Vec<Frame>) -> ProfileDocument {
        ProfileDocument {
            version: PROFILE_VERSION,
            memprof: Some(MemProfSection {
                records: vec![FunctionRecord {
                    function: frames[0].function,
                    hash: 0,
                    record: MemProfRecord {
                        alloc_sites: vec![AllocSite {
                            call_stack: frames,
                            info: ProfileCounters::default(),
                        }],
                        call_sites: vec![],
                    },
                }],
            }),
        }
    }

    #[test]
    fn lookup_discriminates_unknown_and_mismatch() {
        let frames = vec![Frame::new(7, 1, 0)];
        let mut doc = doc_with_one_stack(frames);
        doc.memprof.as_mut().unwrap().records[0].hash = 42;
        let reader = IndexedProfileReader::from_document(doc);

        assert!(matches!(
            reader.get_record(8, 0),
            Err(RecordLookupError::UnknownFunction)
        ));
        assert!(matches!(
            reader.get_record(7, 43),
            Err(RecordLookupError::HashMismatch)
        ));
        assert!(reader.get_record(7, 42).is_ok());
        // An unrecorded IR hash is not a mismatch.
        assert!(reader.get_record(7, 0).is_ok());
    }

    #[test]
    fn caller_callee_pairs_anonymize_leaf_and_dedup() {
        let frames = vec![
            Frame::new(10, 2, 0),
            Frame::new(20, 5, 1),
            Frame::new(30, 9, 0),
        ];
        let reader = IndexedProfileReader::from_document(doc_with_one_stack(frames));

        let pairs = reader.caller_callee_pairs();
        assert_eq!(pairs[&10], vec![(LineLocation::new(2, 0), 0)]);
        assert_eq!(pairs[&20], vec![(LineLocation::new(5, 1), 10)]);
        assert_eq!(pairs[&30], vec![(LineLocation::new(9, 0), 20)]);
    }
}
