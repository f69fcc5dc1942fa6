// src/aa/mod.rs

pub mod eedi2;
pub mod shift;

use crate::engine::Engine;
use crate::error::{AdaptError, Result};
use crate::frame::VideoClip;
use log::{debug, info};

pub use eedi2::Eedi2;
pub use shift::{Kernel, Shifter};

/// A field-interpolating filter bound to an engine plugin.
pub trait Interpolator: Sized {
    /// Phase offset, in source pixels, introduced by each doubling.
    const SHIFT: f64;

    fn field(&self) -> u8;

    fn with_field(&self, field: u8) -> Self;

    fn shifter(&self) -> &Shifter;

    /// Doubles the height, or keeps it when `double_y` is false.
    fn interpolate(&self, engine: &dyn Engine, clip: &VideoClip, double_y: bool) -> Result<VideoClip>;

    fn full_interpolate_enabled(&self, _x: bool, _y: bool) -> bool {
        false
    }

    fn full_interpolate(
        &self,
        _engine: &dyn Engine,
        _clip: &VideoClip,
        _double_y: bool,
        _double_x: bool,
    ) -> Result<VideoClip> {
        Err(AdaptError::Plugin("full interpolation is not supported".to_string()))
    }
}

/// How an interpolator is applied to a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Upscale to `width` x `height` by repeated doubling and a final resample.
    SuperSampler { width: u32, height: u32 },
    /// One non-doubling pass per requested axis.
    SingleRater { y: bool, x: bool },
    /// Single rate with both field parities, averaged.
    DoubleRater { y: bool, x: bool },
    /// Single rate on both axes.
    Antialiaser,
}

impl Strategy {
    pub fn apply<I: Interpolator>(&self, aa: &I, engine: &dyn Engine, clip: &VideoClip) -> Result<VideoClip> {
        clip.constant_format("Strategy")?;
        info!("Applying {:?} to {}x{} clip", self, clip.width(), clip.height());
        match *self {
            Strategy::SuperSampler { width, height } => supersample(aa, engine, clip, width, height),
            Strategy::SingleRater { y, x } => single_rate(aa, engine, clip, y, x),
            Strategy::DoubleRater { y, x } => {
                let first = single_rate(&aa.with_field(0), engine, clip, y, x)?;
                let second = single_rate(&aa.with_field(1), engine, clip, y, x)?;
                first.merge(&second)
            }
            Strategy::Antialiaser => single_rate(aa, engine, clip, true, true),
        }
    }
}

fn single_rate<I: Interpolator>(aa: &I, engine: &dyn Engine, clip: &VideoClip, y: bool, x: bool) -> Result<VideoClip> {
    let mut out = clip.clone();
    if y {
        out = aa.interpolate(engine, &out, false)?;
    }
    if x {
        out = aa.interpolate(engine, &out.transpose()?, false)?.transpose()?;
    }
    Ok(out)
}

/// Smallest number of doublings for which `from * 2^steps >= to`.
fn doublings(from: u32, to: u32) -> u32 {
    to.div_ceil(from).max(1).next_power_of_two().ilog2()
}

fn supersample<I: Interpolator>(
    aa: &I,
    engine: &dyn Engine,
    clip: &VideoClip,
    width: u32,
    height: u32,
) -> Result<VideoClip> {
    if width == 0 || height == 0 {
        return Err(AdaptError::Input("Supersampling target must be non-zero".to_string()));
    }
    clip.constant_format("SuperSampler")?;
    let steps_y = doublings(clip.height(), height);
    let steps_x = doublings(clip.width(), width);
    debug!("Supersampling: {} vertical and {} horizontal doublings", steps_y, steps_x);

    let mut upscaled = clip.clone();
    let (mut top, mut left) = (0.0, 0.0);
    for step in 0..steps_y.max(steps_x) {
        let (y, x) = (step < steps_y, step < steps_x);
        if aa.full_interpolate_enabled(x, y) {
            upscaled = aa.full_interpolate(engine, &upscaled, y, x)?;
        } else {
            if y {
                upscaled = aa.interpolate(engine, &upscaled, true)?;
            }
            if x {
                upscaled = aa.interpolate(engine, &upscaled.transpose()?, true)?.transpose()?;
            }
        }
        if y {
            top = top * 2.0 + I::SHIFT;
        }
        if x {
            left = left * 2.0 + I::SHIFT;
        }
    }

    aa.shifter().scale(engine, &upscaled, width, height, (top, left))
}
