//! Verification scheduling
//!
//! Blocks are grouped in segments of `max_blocks_to_verify / 2`. A sweep is
//! attempted on the last block of each segment when it is proposed, and on the
//! middle block of each segment when it is proved, so both event streams trigger
//! catch-up sweeps every segment.

/// Decide whether a verification sweep should run after `block_id` was proposed
/// (`is_block_proposed`) or proved.
///
/// `max_blocks_to_verify == 0` disables verification entirely.
pub fn should_verify_blocks(max_blocks_to_verify: u64, block_id: u64, is_block_proposed: bool) -> bool {
    if max_blocks_to_verify == 0 {
        return false;
    }

    let segment = max_blocks_to_verify / 2;
    if segment <= 1 {
        return true;
    }

    let target = if is_block_proposed {
        segment - 1
    } else {
        segment / 2 - 1
    };

    block_id % segment == target
}
