//! Stale-profile realignment ("undrift").
//!
//! When a profile was collected against older sources, call-site line
//! offsets drift. Matching the profile-recorded edge list against the
//! IR-extracted edge list with a longest common subsequence recovers an
//! order-preserving location remap, applied to the profile before matching.

use memheat_ir::Module;
use memheat_profile::{CallEdge, IndexedProfileReader, LineLocation, MemProfRecord};
use rustc_hash::FxHashMap;

use crate::callgraph::extract_calls_from_ir;

/// Per-caller location remap: recorded location → current location.
pub type LocToLocMap = FxHashMap<LineLocation, LineLocation>;

/// Computes the longest common subsequence of two anchor lists, comparing
/// elements by callee fingerprint. `on_match` receives the paired locations
/// in sequence order. Unmatched anchors simply stay unreported.
pub fn longest_common_sequence<F>(a: &[CallEdge], b: &[CallEdge], mut on_match: F)
where
    F: FnMut(LineLocation, LineLocation),
{
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return;
    }

    // Standard O(n*m) DP table of prefix LCS lengths.
    let mut table = vec![0u32; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;
    for i in 1..=n {
        for j in 1..=m {
            table[idx(i, j)] = if a[i - 1].1 == b[j - 1].1 {
                table[idx(i - 1, j - 1)] + 1
            } else {
                table[idx(i - 1, j)].max(table[idx(i, j - 1)])
            };
        }
    }

    // Backtrack, then report matches leaf-to-end in sequence order.
    let mut matches = Vec::with_capacity(table[idx(n, m)] as usize);
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if a[i - 1].1 == b[j - 1].1 && table[idx(i, j)] == table[idx(i - 1, j - 1)] + 1 {
            matches.push((a[i - 1].0, b[j - 1].0));
            i -= 1;
            j -= 1;
        } else if table[idx(i - 1, j)] >= table[idx(i, j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    for (loc_a, loc_b) in matches.into_iter().rev() {
        on_match(loc_a, loc_b);
    }
}

/// Builds the per-function undrift maps by aligning the profile's edge
/// lists with the IR's.
pub fn compute_undrift_map(
    module: &Module,
    reader: &IndexedProfileReader,
    match_hot_cold_new: bool,
) -> FxHashMap<u64, LocToLocMap> {
    let calls_from_profile = reader.caller_callee_pairs();
    let calls_from_ir = extract_calls_from_ir(module, match_hot_cold_new, |fp| {
        calls_from_profile.contains_key(&fp)
    });

    let mut undrift_maps: FxHashMap<u64, LocToLocMap> = FxHashMap::default();
    for (caller_fp, ir_anchors) in &calls_from_ir {
        let Some(profile_anchors) = calls_from_profile.get(caller_fp) else {
            continue;
        };

        let mut matchings = LocToLocMap::default();
        longest_common_sequence(profile_anchors, ir_anchors, |profile_loc, ir_loc| {
            matchings.entry(profile_loc).or_insert(ir_loc);
        });

        // Each caller is visited exactly once.
        let inserted = undrift_maps.insert(*caller_fp, matchings).is_none();
        debug_assert!(inserted);
    }

    undrift_maps
}

/// Undrifts all source locations in `record` in place. Frames without a
/// remap entry are left as-is; partial alignment is acceptable.
pub fn undrift_record(undrift_maps: &FxHashMap<u64, LocToLocMap>, record: &mut MemProfRecord) {
    let undrift_call_stack = |call_stack: &mut Vec<memheat_profile::Frame>| {
        for frame in call_stack {
            let Some(matchings) = undrift_maps.get(&frame.function) else {
                continue;
            };
            let Some(new_loc) = matchings.get(&frame.location()) else {
                continue;
            };
            frame.line_offset = new_loc.line_offset;
            frame.column = new_loc.column;
        }
    };

    for alloc in &mut record.alloc_sites {
        undrift_call_stack(&mut alloc.call_stack);
    }
    for call_site in &mut record.call_sites {
        undrift_call_stack(&mut call_site.frames);
    }
}

#[cfg(test)]
mod tests {
    use memheat_profile::{AllocSite, Frame, ProfileCounters};

    use super::*;

    fn edge(line_offset: u32, callee: u64) -> CallEdge {
        (LineLocation::new(line_offset, 0), callee)
    }

    #[test]
    fn recovers_alignment_across_insertions_and_deletions() {
        // Profile saw callees [1, 2, 3, 4]; the current IR dropped 2 and
        // gained 5, shifting lines.
        let profile = [edge(1, 1), edge(2, 2), edge(3, 3), edge(4, 4)];
        let ir = [edge(2, 1), edge(3, 5), edge(4, 3), edge(6, 4)];

        let mut pairs = Vec::new();
        longest_common_sequence(&profile, &ir, |a, b| pairs.push((a, b)));

        assert_eq!(
            pairs,
            vec![
                (LineLocation::new(1, 0), LineLocation::new(2, 0)),
                (LineLocation::new(3, 0), LineLocation::new(4, 0)),
                (LineLocation::new(4, 0), LineLocation::new(6, 0)),
            ]
        );
    }

    #[test]
    fn preserves_order_over_greedy_matches() {
        // A greedy matcher would pair the leading 7 with the trailing 7 and
        // lose the longer ordered subsequence.
        let profile = [edge(1, 7), edge(2, 8), edge(3, 9)];
        let ir = [edge(5, 8), edge(6, 9), edge(7, 7)];

        let mut pairs = Vec::new();
        longest_common_sequence(&profile, &ir, |a, b| pairs.push((a, b)));
        assert_eq!(
            pairs,
            vec![
                (LineLocation::new(2, 0), LineLocation::new(5, 0)),
                (LineLocation::new(3, 0), LineLocation::new(6, 0)),
            ]
        );
    }

    #[test]
    fn undrift_rewrites_only_mapped_frames() {
        let mut maps: FxHashMap<u64, LocToLocMap> = FxHashMap::default();
        let mut matchings = LocToLocMap::default();
        matchings.insert(LineLocation::new(2, 0), LineLocation::new(9, 1));
        maps.insert(100, matchings);

        let mut record = MemProfRecord {
            alloc_sites: vec![AllocSite {
                call_stack: vec![
                    Frame::new(100, 2, 0),
                    Frame::new(100, 3, 0),
                    Frame::new(200, 2, 0),
                ],
                info: ProfileCounters::default(),
            }],
            call_sites: vec![],
        };

        undrift_record(&maps, &mut record);

        let stack = &record.alloc_sites[0].call_stack;
        assert_eq!(stack[0], Frame::new(100, 9, 1));
        // Unmapped location in a mapped function: untouched.
        assert_eq!(stack[1], Frame::new(100, 3, 0));
        // Unmapped function: untouched.
        assert_eq!(stack[2], Frame::new(200, 2, 0));
    }
}
