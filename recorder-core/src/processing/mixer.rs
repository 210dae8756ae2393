//! Two-source block merging for the combined recording mode.

use crate::models::block::PcmBlock;

/// Weight applied to each source when merging, leaving headroom so two
/// full-scale sources only just clip.
pub const MIX_WEIGHT: f32 = 0.7;

/// Merge two time-aligned blocks sample by sample.
///
/// The output is truncated to the shorter input and carries `a`'s channel
/// count and sample rate — in merged mode the system block is passed first
/// and drives the output format. Pairing is by arrival order; drift
/// between the two sources is tolerated, not corrected.
pub fn mix(a: &PcmBlock, b: &PcmBlock) -> PcmBlock {
    let len = a.samples.len().min(b.samples.len());
    let mut samples = Vec::with_capacity(len);
    for i in 0..len {
        let sum = f32::from(a.samples[i]) * MIX_WEIGHT + f32::from(b.samples[i]) * MIX_WEIGHT;
        samples.push(sum.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16);
    }
    PcmBlock::new(samples, a.channels, a.sample_rate)
}
