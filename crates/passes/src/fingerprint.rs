//! Content-addressed fingerprints for frames and call stacks.
//!
//! 64-bit truncations of BLAKE3 over the little-endian field encoding.
//! These are equality oracles, not adversarially hardened; collisions are
//! accepted as negligible risk.

use memheat_profile::Frame;

fn finish_u64(hasher: blake3::Hasher) -> u64 {
    let hash = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(out)
}

/// Fingerprint of a function, computed from its linkage name.
pub fn function_fingerprint(linkage_name: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(linkage_name.as_bytes());
    finish_u64(hasher)
}

/// Fingerprint of one (function, line offset, column) frame.
pub fn stack_id(function: u64, line_offset: u32, column: u32) -> u64 {
    let mut hasher = blake3::Hasher::new();
    add_frame(&mut hasher, function, line_offset, column);
    finish_u64(hasher)
}

pub fn stack_id_of_frame(frame: &Frame) -> u64 {
    stack_id(frame.function, frame.line_offset, frame.column)
}

/// A single id for a whole call stack, used for match statistics and
/// context-size reporting; uniquable across modules.
pub fn full_stack_id(call_stack: &[Frame]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for frame in call_stack {
        add_frame(&mut hasher, frame.function, frame.line_offset, frame.column);
    }
    finish_u64(hasher)
}

fn add_frame(hasher: &mut blake3::Hasher, function: u64, line_offset: u32, column: u32) {
    hasher.update(&function.to_le_bytes());
    hasher.update(&line_offset.to_le_bytes());
    hasher.update(&column.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_id_is_deterministic_and_field_sensitive() {
        let base = stack_id(1, 2, 3);
        assert_eq!(base, stack_id(1, 2, 3));
        assert_ne!(base, stack_id(2, 2, 3));
        assert_ne!(base, stack_id(1, 3, 3));
        assert_ne!(base, stack_id(1, 2, 4));
    }

    #[test]
    fn full_stack_id_is_order_sensitive() {
        let x = Frame::new(1, 2, 3);
        let y = Frame::new(4, 5, 6);
        assert_ne!(full_stack_id(&[x, y]), full_stack_id(&[y, x]));
        assert_eq!(full_stack_id(&[x, y]), full_stack_id(&[x, y]));
    }

    #[test]
    fn single_frame_stack_matches_frame_id() {
        let frame = Frame::new(7, 8, 9);
        assert_eq!(full_stack_id(&[frame]), stack_id_of_frame(&frame));
    }
}
