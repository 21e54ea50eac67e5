//! Run-length encoding of missing (NaN) samples.
//!
//! Astronomical images routinely contain blanked pixels stored as NaN.
//! Instead of transmitting a full validity mask, the wire format carries a
//! list of alternating run lengths over the flattened sample buffer. The
//! first run always counts *valid* samples and may be zero; runs then
//! alternate valid/NaN. The run lengths always sum to the total sample
//! count.
//!
//! The lossy compressor cannot represent NaN, so before compression the
//! encoder also overwrites NaN slots with a finite fill value. The decoder
//! uses the run lengths to restore NaN positions exactly.

/// Encode the NaN layout of `samples` as alternating run lengths.
///
/// Read-only; use [`encode_and_fill`] when the buffer is about to be
/// compressed.
pub fn encode(samples: &[f32]) -> Vec<i32> {
    let mut runs = Vec::new();
    let mut prev_nan = false;
    let mut run_start = 0usize;

    for (i, v) in samples.iter().enumerate() {
        let current_nan = v.is_nan();
        if current_nan != prev_nan {
            runs.push((i - run_start) as i32);
            run_start = i;
            prev_nan = current_nan;
        }
    }
    runs.push((samples.len() - run_start) as i32);
    runs
}

/// Encode the NaN layout and replace NaN samples with finite fill values.
///
/// Fill values are the average of each 4x4 block (the block granularity the
/// downstream compressor operates on), limited to the image edges. Blocks
/// that are entirely NaN are left untouched, since a uniform block costs the
/// compressor nothing. Buffers with no NaNs, or nothing but NaNs, skip the
/// fill pass.
pub fn encode_and_fill(samples: &mut [f32], width: usize, height: usize) -> Vec<i32> {
    debug_assert_eq!(samples.len(), width * height);
    let runs = encode(samples);

    if runs.len() > 1 {
        for bx in (0..width).step_by(4) {
            for by in (0..height).step_by(4) {
                let block_w = 4.min(width - bx);
                let block_h = 4.min(height - by);

                let mut valid_count = 0usize;
                let mut sum = 0.0f32;
                for dy in 0..block_h {
                    for dx in 0..block_w {
                        let v = samples[(by + dy) * width + bx + dx];
                        if !v.is_nan() {
                            valid_count += 1;
                            sum += v;
                        }
                    }
                }

                // Only mixed blocks need filling
                if valid_count > 0 && valid_count != block_w * block_h {
                    let average = sum / valid_count as f32;
                    for dy in 0..block_h {
                        for dx in 0..block_w {
                            let slot = &mut samples[(by + dy) * width + bx + dx];
                            if slot.is_nan() {
                                *slot = average;
                            }
                        }
                    }
                }
            }
        }
    }

    runs
}

/// Restore NaN positions in `samples` from alternating run lengths.
///
/// Runs at even index (0-based) are valid samples and are left alone; runs
/// at odd index are rewritten to NaN.
pub fn decode(runs: &[i32], samples: &mut [f32]) {
    let mut index = 0usize;
    let mut is_nan_run = false;

    for &run in runs {
        let run = run.max(0) as usize;
        if is_nan_run {
            for slot in samples.iter_mut().skip(index).take(run) {
                *slot = f32::NAN;
            }
        }
        index += run;
        is_nan_run = !is_nan_run;
    }
}

/// Check that run lengths account for exactly `total` samples.
pub fn runs_are_consistent(runs: &[i32], total: usize) -> bool {
    let sum: i64 = runs.iter().map(|&r| r as i64).sum();
    sum == total as i64
}
