//! Mid/side stereo widening

use super::MasteringStage;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Scales the side component of a stereo signal
///
/// `mid = (L+R)/2`, `side = (L-R)/2 * width`, then `L = mid+side`,
/// `R = mid-side`. A width of 1.0 is the identity; mono buffers are left
/// untouched.
#[derive(Debug, Clone)]
pub struct StereoWidener {
    width: f32,
}

impl StereoWidener {
    pub fn new(width: f32) -> Self {
        Self {
            width: width.clamp(0.0, 2.0),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }
}

impl MasteringStage for StereoWidener {
    fn name(&self) -> &'static str {
        "stereo_widen"
    }

    fn process(&self, buffer: &mut AudioBuffer) -> Result<()> {
        if buffer.num_channels() != 2 {
            return Ok(());
        }

        let (left, right) = buffer.samples.split_at_mut(1);
        for (l, r) in left[0].iter_mut().zip(right[0].iter_mut()) {
            let mid = (*l + *r) * 0.5;
            let side = (*l - *r) * 0.5 * self.width;
            *l = mid + side;
            *r = mid - side;
        }

        Ok(())
    }
}
