// src/funcs.rs

use crate::engine::{ArgValue, Engine, PluginArgs};
use crate::error::{AdaptError, Result};
use crate::frame::{ColorFamily, SampleType, VideoClip, VideoFormat, expr};
use crate::planes::{Planes, PlanesArg, normalize_planes, normalize_seq};
use log::debug;

/// Applies `function` to `base` `count` times.
pub fn iterate<T, F>(base: T, count: i64, mut function: F) -> T
where
    F: FnMut(T) -> T,
{
    let mut result = base;
    for _ in 0..count.max(0) {
        result = function(result);
    }
    result
}

/// First present value among `value` and `fallbacks`.
pub fn fallback<T>(value: Option<T>, fallbacks: impl IntoIterator<Item = Option<T>>) -> Result<T> {
    value
        .or_else(|| fallbacks.into_iter().flatten().next())
        .ok_or(AdaptError::MissingFallback)
}

pub fn fallback_or<T>(value: Option<T>, fallbacks: impl IntoIterator<Item = Option<T>>, default: T) -> T {
    fallback(value, fallbacks).unwrap_or(default)
}

/// Like [`fallback_or`], with `args[key]` tried right after `value`.
pub fn kwargs_fallback<T, F>(
    value: Option<T>,
    args: &PluginArgs,
    key: &str,
    extract: F,
    fallbacks: impl IntoIterator<Item = Option<T>>,
    default: T,
) -> T
where
    F: Fn(&ArgValue) -> Option<T>,
{
    let from_args = args.get(key).and_then(extract);
    fallback_or(value, std::iter::once(from_args).chain(fallbacks), default)
}

// Forward/inverse matrices for the plugin path, row-major with a bias column.
#[rustfmt::skip]
const RGB_TO_YUV_COEF: [f64; 12] = [
    1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 0.0,
    1.0 / 2.0, 0.0, -1.0 / 2.0, 0.0,
    1.0 / 4.0, -1.0 / 2.0, 1.0 / 4.0, 0.0,
];
#[rustfmt::skip]
const YUV_TO_RGB_COEF: [f64; 12] = [
    1.0, 1.0, 2.0 / 3.0, 0.0,
    1.0, 0.0, -4.0 / 3.0, 0.0,
    1.0, -1.0, 2.0 / 3.0, 0.0,
];

/// Plane selection plus the normalized views a per-plane filter works on.
///
/// Everything is computed in [`PlaneContextBuilder::build`]; `restore` undoes
/// exactly what was done there.
#[derive(Debug, Clone)]
pub struct PlaneContext {
    func: String,
    clip: VideoClip,
    clip_format: VideoFormat,
    planes: Planes,
    allowed: Option<Vec<ColorFamily>>,
    bitdepth: Option<u8>,
    strict: bool,
    cfamily_converted: bool,
    norm_clip: VideoClip,
    work_clip: VideoClip,
    chroma_planes: Vec<VideoClip>,
}

#[derive(Debug, Clone)]
pub struct PlaneContextBuilder {
    clip: VideoClip,
    func: String,
    planes: PlanesArg,
    color_family: Option<Vec<ColorFamily>>,
    bitdepth: Option<u8>,
    strict: bool,
}

impl PlaneContextBuilder {
    pub fn planes(mut self, planes: impl Into<PlanesArg>) -> Self {
        self.planes = planes.into();
        self
    }

    pub fn color_family(mut self, families: impl IntoIterator<Item = ColorFamily>) -> Self {
        self.color_family = Some(families.into_iter().collect());
        self
    }

    pub fn bitdepth(mut self, bits: u8) -> Self {
        self.bitdepth = Some(bits);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self, engine: &dyn Engine) -> Result<PlaneContext> {
        let clip_format = self.clip.constant_format(&self.func)?;

        if let Some(allowed) = &self.color_family {
            if self.strict && !allowed.contains(&clip_format.color_family) {
                return Err(AdaptError::InvalidColorFamily {
                    func: self.func,
                    found: clip_format.color_family.to_string(),
                    allowed: allowed.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", "),
                });
            }
        }

        let (norm_clip, cfamily_converted) = normalize_clip(
            engine,
            &self.clip,
            &clip_format,
            self.color_family.as_deref(),
            self.bitdepth,
        )?;
        let norm_format = norm_clip.constant_format(&self.func)?;
        let planes = normalize_planes(&norm_format, &self.planes);

        let work_clip = if planes.luma_only() { norm_clip.plane(0)? } else { norm_clip.clone() };
        let chroma_planes = if planes.luma_only() && norm_format.num_planes() > 1 {
            vec![norm_clip.plane(1)?, norm_clip.plane(2)?]
        } else {
            Vec::new()
        };

        debug!(
            "{}: planes {:?}, {} -> {} (converted: {})",
            self.func, planes, clip_format, norm_format, cfamily_converted
        );

        Ok(PlaneContext {
            func: self.func,
            clip: self.clip,
            clip_format,
            planes,
            allowed: self.color_family,
            bitdepth: self.bitdepth,
            strict: self.strict,
            cfamily_converted,
            norm_clip,
            work_clip,
            chroma_planes,
        })
    }
}

fn normalize_clip(
    engine: &dyn Engine,
    clip: &VideoClip,
    format: &VideoFormat,
    allowed: Option<&[ColorFamily]>,
    bitdepth: Option<u8>,
) -> Result<(VideoClip, bool)> {
    let mut norm = match bitdepth {
        Some(bits) => clip.convert_depth(bits)?,
        None => clip.clone(),
    };
    let mut converted = false;

    let family = format.color_family;
    if let Some(allowed) = allowed.filter(|a| !a.is_empty() && !a.contains(&family)) {
        if family == ColorFamily::Rgb {
            norm = rgb_to_yuv(engine, &norm)?;
            converted = true;
        }
        if family == ColorFamily::Yuv && allowed.contains(&ColorFamily::Gray) {
            norm = norm.plane(0)?;
        }
    }

    Ok((norm, converted))
}

fn rgb_to_yuv(engine: &dyn Engine, clip: &VideoClip) -> Result<VideoClip> {
    if engine.has_plugin("fmtc") {
        let args = PluginArgs::new()
            .with("clip", clip.clone())
            .with("fulls", true)
            .with("fulld", true)
            .with("col_fam", ColorFamily::Yuv.to_string())
            .with("coef", RGB_TO_YUV_COEF.to_vec());
        return engine.invoke("fmtc", "matrix", args);
    }

    let format = clip.constant_format("rgb_to_yuv")?;
    let n = format.neutral();
    let (r, g, b) = (clip.plane_ref(0)?, clip.plane_ref(1)?, clip.plane_ref(2)?);

    let y = expr(&format, &[r, g, b], |s| (s[0] + s[1] + s[2]) * (1.0 / 3.0));
    let u = expr(&format, &[r, b], |s| (s[0] - s[1]) * (1.0 / 2.0) + n);
    let v = expr(&format, &[r, g, b], |s| (s[0] + s[2]) * (1.0 / 4.0) - s[1] * (1.0 / 2.0) + n);

    VideoClip::from_planes(format.with_color_family(ColorFamily::Yuv), clip.width(), clip.height(), vec![y, u, v])
}

fn yuv_to_rgb(engine: &dyn Engine, clip: &VideoClip) -> Result<VideoClip> {
    if engine.has_plugin("fmtc") {
        let args = PluginArgs::new()
            .with("clip", clip.clone())
            .with("fulls", true)
            .with("fulld", true)
            .with("col_fam", ColorFamily::Rgb.to_string())
            .with("coef", YUV_TO_RGB_COEF.to_vec());
        return engine.invoke("fmtc", "matrix", args);
    }

    let format = clip.constant_format("yuv_to_rgb")?;
    let n = format.neutral();
    let (y, u, v) = (clip.plane_ref(0)?, clip.plane_ref(1)?, clip.plane_ref(2)?);

    let r = expr(&format, &[y, u, v], |s| s[0] + (s[1] - n) + (s[2] - n) * (2.0 / 3.0));
    let g = expr(&format, &[y, v], |s| s[0] - (s[1] - n) * (4.0 / 3.0));
    let b = expr(&format, &[y, u, v], |s| s[0] + (s[2] - n) * (2.0 / 3.0) - (s[1] - n));

    VideoClip::from_planes(format.with_color_family(ColorFamily::Rgb), clip.width(), clip.height(), vec![r, g, b])
}

impl PlaneContext {
    pub fn builder(clip: &VideoClip, func: &str) -> PlaneContextBuilder {
        PlaneContextBuilder {
            clip: clip.clone(),
            func: func.to_string(),
            planes: PlanesArg::All,
            color_family: None,
            bitdepth: None,
            strict: true,
        }
    }

    pub fn func(&self) -> &str {
        &self.func
    }

    pub fn clip(&self) -> &VideoClip {
        &self.clip
    }

    pub fn norm_clip(&self) -> &VideoClip {
        &self.norm_clip
    }

    pub fn work_clip(&self) -> &VideoClip {
        &self.work_clip
    }

    pub fn chroma_planes(&self) -> &[VideoClip] {
        &self.chroma_planes
    }

    pub fn planes(&self) -> Planes {
        self.planes
    }

    pub fn allowed_color_families(&self) -> Option<&[ColorFamily]> {
        self.allowed.as_deref()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn cfamily_converted(&self) -> bool {
        self.cfamily_converted
    }

    /// Plane count of the input clip.
    pub fn num_planes(&self) -> usize {
        self.clip_format.num_planes()
    }

    pub fn is_float(&self) -> bool {
        self.norm_format().sample_type == SampleType::Float
    }

    pub fn is_integer(&self) -> bool {
        self.norm_format().sample_type == SampleType::Integer
    }

    pub fn luma(&self) -> bool {
        self.planes.luma()
    }

    pub fn luma_only(&self) -> bool {
        self.planes.luma_only()
    }

    pub fn chroma(&self) -> bool {
        self.planes.chroma()
    }

    pub fn chroma_only(&self) -> bool {
        self.planes.chroma_only()
    }

    fn norm_format(&self) -> VideoFormat {
        // norm_clip is validated as constant during build.
        self.norm_clip.format().unwrap_or(self.clip_format)
    }

    /// Undoes the normalization on a processed working clip.
    pub fn restore(&self, engine: &dyn Engine, processed: &VideoClip) -> Result<VideoClip> {
        processed.constant_format(&self.func)?;

        let mut processed = if self.chroma_planes.is_empty() {
            processed.clone()
        } else {
            let family = self.norm_format().color_family;
            let mut planes = Vec::with_capacity(3);
            planes.push(processed.clone());
            planes.extend(self.chroma_planes.iter().cloned());
            VideoClip::join(&planes, family)?
        };

        if self.cfamily_converted {
            processed = yuv_to_rgb(engine, &processed)?;
        }

        if self.bitdepth.is_some() {
            processed = processed.convert_depth_like(&self.clip_format)?;
        }

        Ok(processed)
    }

    /// One value per plane of the input clip, `fill` where the plane is not selected.
    pub fn norm_seq<T: Clone>(&self, values: &[T], fill: T) -> Result<Vec<T>> {
        Ok(normalize_seq(values, self.num_planes())?
            .into_iter()
            .enumerate()
            .map(|(i, value)| if self.planes.contains(i) { value } else { fill.clone() })
            .collect())
    }
}
