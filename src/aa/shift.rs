// src/aa/shift.rs

use crate::engine::{Engine, PluginArgs};
use crate::error::Result;
use crate::frame::VideoClip;
use log::debug;

/// Resampling kernel exposed by the engine's `resize` plugin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Point,
    Bilinear,
    Bicubic { b: f64, c: f64 },
    Spline36,
    Lanczos { taps: u32 },
}

impl Kernel {
    /// Bicubic with b=0, c=0.5.
    pub const CATROM: Kernel = Kernel::Bicubic { b: 0.0, c: 0.5 };

    pub fn function_name(&self) -> &'static str {
        match self {
            Kernel::Point => "Point",
            Kernel::Bilinear => "Bilinear",
            Kernel::Bicubic { .. } => "Bicubic",
            Kernel::Spline36 => "Spline36",
            Kernel::Lanczos { .. } => "Lanczos",
        }
    }

    fn params(&self) -> PluginArgs {
        match *self {
            Kernel::Bicubic { b, c } => PluginArgs::new().with("filter_param_a", b).with("filter_param_b", c),
            Kernel::Lanczos { taps } => PluginArgs::new().with("filter_param_a", taps),
            _ => PluginArgs::new(),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::CATROM
    }
}

/// Sub-pixel shifts and resizes through the engine resizer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shifter {
    pub kernel: Kernel,
}

impl Shifter {
    pub fn new(kernel: Kernel) -> Self {
        Shifter { kernel }
    }

    /// Moves the image by `(top, left)` source pixels, keeping dimensions.
    pub fn shift(&self, engine: &dyn Engine, clip: &VideoClip, shift: (f64, f64)) -> Result<VideoClip> {
        if shift == (0.0, 0.0) {
            return Ok(clip.clone());
        }
        self.scale(engine, clip, clip.width(), clip.height(), shift)
    }

    pub fn scale(
        &self,
        engine: &dyn Engine,
        clip: &VideoClip,
        width: u32,
        height: u32,
        (top, left): (f64, f64),
    ) -> Result<VideoClip> {
        let args = PluginArgs::new()
            .with("clip", clip.clone())
            .with("width", width)
            .with("height", height)
            .with("src_top", top)
            .with("src_left", left)
            .merged(self.kernel.params());
        debug!("resize.{}({})", self.kernel.function_name(), args);
        engine.invoke("resize", self.kernel.function_name(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ArgValue;
    use crate::frame::VideoFormat;
    use crate::testing::MockEngine;

    #[test]
    fn zero_shift_skips_the_resizer() {
        let engine = MockEngine::with_plugins(&["resize"]);
        let clip = VideoClip::blank(VideoFormat::gray(8).unwrap(), 4, 4, &[0.0]).unwrap();
        Shifter::default().shift(&engine, &clip, (0.0, 0.0)).unwrap();
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn shift_passes_kernel_parameters() {
        let engine = MockEngine::with_plugins(&["resize"]);
        let clip = VideoClip::blank(VideoFormat::gray(8).unwrap(), 4, 4, &[0.0]).unwrap();
        Shifter::default().shift(&engine, &clip, (-0.5, 0.0)).unwrap();
        let call = &engine.calls_to("resize", "Bicubic")[0];
        assert_eq!(call.args.get("src_top").and_then(ArgValue::as_float), Some(-0.5));
        assert_eq!(call.args.get("filter_param_b").and_then(ArgValue::as_float), Some(0.5));
        assert_eq!(call.args.get("width").and_then(ArgValue::as_int), Some(4));
    }
}
