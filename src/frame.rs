// src/frame.rs

use crate::error::{AdaptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sample storage for one plane. Shared between clips that reference the same plane.
pub type Plane = Arc<[f32]>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorFamily {
    Gray,
    Rgb,
    Yuv,
}

impl ColorFamily {
    pub fn num_planes(self) -> usize {
        match self {
            ColorFamily::Gray => 1,
            ColorFamily::Rgb | ColorFamily::Yuv => 3,
        }
    }
}

impl fmt::Display for ColorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorFamily::Gray => "GRAY",
            ColorFamily::Rgb => "RGB",
            ColorFamily::Yuv => "YUV",
        };
        f.write_str(name)
    }
}

impl From<VideoFormat> for ColorFamily {
    fn from(format: VideoFormat) -> Self {
        format.color_family
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoFormat {
    pub color_family: ColorFamily,
    pub sample_type: SampleType,
    pub bits_per_sample: u8,
    pub subsampling_w: u8,
    pub subsampling_h: u8,
}

impl VideoFormat {
    /// Builds a format, picking the sample type from the bit depth (32 is float).
    pub fn new(color_family: ColorFamily, bits_per_sample: u8) -> Result<Self> {
        let sample_type = sample_type_for_depth(bits_per_sample)?;
        Ok(VideoFormat {
            color_family,
            sample_type,
            bits_per_sample,
            subsampling_w: 0,
            subsampling_h: 0,
        })
    }

    pub fn gray(bits_per_sample: u8) -> Result<Self> {
        Self::new(ColorFamily::Gray, bits_per_sample)
    }

    pub fn rgb(bits_per_sample: u8) -> Result<Self> {
        Self::new(ColorFamily::Rgb, bits_per_sample)
    }

    pub fn yuv(bits_per_sample: u8, subsampling_w: u8, subsampling_h: u8) -> Result<Self> {
        let mut format = Self::new(ColorFamily::Yuv, bits_per_sample)?;
        format.subsampling_w = subsampling_w;
        format.subsampling_h = subsampling_h;
        Ok(format)
    }

    pub fn num_planes(&self) -> usize {
        self.color_family.num_planes()
    }

    /// Same sample layout, different family. Only YUV keeps chroma subsampling.
    pub fn with_color_family(self, color_family: ColorFamily) -> Self {
        let (subsampling_w, subsampling_h) = if color_family == ColorFamily::Yuv {
            (self.subsampling_w, self.subsampling_h)
        } else {
            (0, 0)
        };
        VideoFormat { color_family, subsampling_w, subsampling_h, ..self }
    }

    pub fn with_depth(self, bits_per_sample: u8) -> Result<Self> {
        Ok(VideoFormat {
            sample_type: sample_type_for_depth(bits_per_sample)?,
            bits_per_sample,
            ..self
        })
    }

    pub fn is_float(&self) -> bool {
        self.sample_type == SampleType::Float
    }

    /// Largest legal sample value.
    pub fn peak(&self) -> f32 {
        match self.sample_type {
            SampleType::Integer => ((1u32 << self.bits_per_sample) - 1) as f32,
            SampleType::Float => 1.0,
        }
    }

    /// Zero-point of a chroma plane.
    pub fn neutral(&self) -> f32 {
        match self.sample_type {
            SampleType::Integer => (1u32 << (self.bits_per_sample - 1)) as f32,
            SampleType::Float => 0.0,
        }
    }

    /// Whether plane `index` carries chroma (centered on `neutral`).
    pub fn is_chroma_plane(&self, index: usize) -> bool {
        self.color_family == ColorFamily::Yuv && index > 0
    }

    /// Dimensions of plane `index` for a frame of `width` x `height`.
    pub fn plane_dimensions(&self, index: usize, width: u32, height: u32) -> (u32, u32) {
        if self.is_chroma_plane(index) {
            (width >> self.subsampling_w, height >> self.subsampling_h)
        } else {
            (width, height)
        }
    }

    /// Engine-style name such as `YUV420P8`, `RGBS` or `GRAY16`.
    pub fn name(&self) -> String {
        let depth = if self.is_float() { "S".to_string() } else { self.bits_per_sample.to_string() };
        match self.color_family {
            ColorFamily::Gray => format!("GRAY{}", depth),
            ColorFamily::Rgb if self.is_float() => "RGBS".to_string(),
            ColorFamily::Rgb => format!("RGB{}", self.bits_per_sample as u32 * 3),
            ColorFamily::Yuv => {
                let layout = match (self.subsampling_w, self.subsampling_h) {
                    (0, 0) => "444".to_string(),
                    (1, 0) => "422".to_string(),
                    (1, 1) => "420".to_string(),
                    (2, 0) => "411".to_string(),
                    (2, 2) => "410".to_string(),
                    (w, h) => format!("{}{}", w, h),
                };
                format!("YUV{}P{}", layout, depth)
            }
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn sample_type_for_depth(bits_per_sample: u8) -> Result<SampleType> {
    match bits_per_sample {
        32 => Ok(SampleType::Float),
        1..=16 => Ok(SampleType::Integer),
        other => Err(AdaptError::Input(format!("Unsupported bit depth: {}", other))),
    }
}

/// A frame handed over by the engine.
///
/// A clip with no format, or with zero width/height, is variable: the engine
/// has not fixed its layout and no planes are attached.
#[derive(Debug, Clone)]
pub struct VideoClip {
    format: Option<VideoFormat>,
    width: u32,
    height: u32,
    planes: Vec<Plane>,
}

impl VideoClip {
    pub fn new(format: VideoFormat, width: u32, height: u32, planes: Vec<Vec<f32>>) -> Result<Self> {
        Self::from_planes(format, width, height, planes.into_iter().map(Plane::from).collect())
    }

    /// Builds a clip whose planes are all filled with one value per plane.
    pub fn blank(format: VideoFormat, width: u32, height: u32, values: &[f32]) -> Result<Self> {
        if values.len() != format.num_planes() {
            return Err(AdaptError::Input(format!(
                "{} needs {} fill values, got {}",
                format,
                format.num_planes(),
                values.len()
            )));
        }
        let planes = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let (w, h) = format.plane_dimensions(i, width, height);
                vec![value; (w * h) as usize]
            })
            .collect();
        Self::new(format, width, height, planes)
    }

    /// A clip whose format and dimensions are not fixed.
    pub fn variable(format: Option<VideoFormat>, width: u32, height: u32) -> Self {
        VideoClip { format, width, height, planes: Vec::new() }
    }

    pub fn from_planes(format: VideoFormat, width: u32, height: u32, planes: Vec<Plane>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AdaptError::Input("Constant clips need non-zero dimensions".to_string()));
        }
        if planes.len() != format.num_planes() {
            return Err(AdaptError::Input(format!(
                "{} expects {} planes, got {}",
                format,
                format.num_planes(),
                planes.len()
            )));
        }
        for (i, plane) in planes.iter().enumerate() {
            let (w, h) = format.plane_dimensions(i, width, height);
            if plane.len() != (w * h) as usize {
                return Err(AdaptError::Input(format!(
                    "Plane {} of a {}x{} {} clip must hold {} samples, got {}",
                    i,
                    width,
                    height,
                    format,
                    w * h,
                    plane.len()
                )));
            }
        }
        Ok(VideoClip { format: Some(format), width, height, planes })
    }

    pub fn format(&self) -> Option<VideoFormat> {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn is_constant(&self) -> bool {
        self.format
            .is_some_and(|f| self.width > 0 && self.height > 0 && self.planes.len() == f.num_planes())
    }

    /// Returns the format, failing when the clip is variable.
    pub fn constant_format(&self, func: &str) -> Result<VideoFormat> {
        let format = self.format.ok_or_else(|| AdaptError::InvalidFrame {
            func: func.to_string(),
            reason: "variable format clips are not supported".to_string(),
        })?;
        if self.width == 0 || self.height == 0 {
            return Err(AdaptError::InvalidFrame {
                func: func.to_string(),
                reason: "variable resolution clips are not supported".to_string(),
            });
        }
        if self.planes.len() != format.num_planes() {
            return Err(AdaptError::InvalidFrame {
                func: func.to_string(),
                reason: format!("{} expects {} planes, {} attached", format, format.num_planes(), self.planes.len()),
            });
        }
        Ok(format)
    }

    pub fn plane_data(&self, index: usize) -> Result<&[f32]> {
        self.planes
            .get(index)
            .map(|plane| &plane[..])
            .ok_or_else(|| AdaptError::Input(format!("Plane {} does not exist", index)))
    }

    /// Shared handle to a plane's samples.
    pub fn plane_ref(&self, index: usize) -> Result<&Plane> {
        self.planes
            .get(index)
            .ok_or_else(|| AdaptError::Input(format!("Plane {} does not exist", index)))
    }

    /// True when both clips reference the same sample memory for the given planes.
    pub fn shares_plane(&self, index: usize, other: &VideoClip, other_index: usize) -> bool {
        match (self.planes.get(index), other.planes.get(other_index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn require_format(&self) -> Result<VideoFormat> {
        self.constant_format("VideoClip")
    }

    /// Extracts one plane as a GRAY clip sharing the plane's samples.
    pub fn plane(&self, index: usize) -> Result<VideoClip> {
        let format = self.require_format()?;
        if format.num_planes() == 1 && index == 0 {
            return Ok(self.clone());
        }
        let plane = self
            .planes
            .get(index)
            .cloned()
            .ok_or_else(|| AdaptError::Input(format!("{} has no plane {}", format, index)))?;
        let (w, h) = format.plane_dimensions(index, self.width, self.height);
        Self::from_planes(format.with_color_family(ColorFamily::Gray), w, h, vec![plane])
    }

    pub fn split(&self) -> Result<Vec<VideoClip>> {
        let format = self.require_format()?;
        (0..format.num_planes()).map(|i| self.plane(i)).collect()
    }

    /// Combines the first plane of each clip into one clip of `family`.
    pub fn join(clips: &[VideoClip], family: ColorFamily) -> Result<VideoClip> {
        if clips.len() != family.num_planes() {
            return Err(AdaptError::Input(format!(
                "Joining into {} needs {} clips, got {}",
                family,
                family.num_planes(),
                clips.len()
            )));
        }
        let first = &clips[0];
        let base = first.require_format()?;
        for clip in &clips[1..] {
            let format = clip.require_format()?;
            if format.sample_type != base.sample_type || format.bits_per_sample != base.bits_per_sample {
                return Err(AdaptError::Input(format!(
                    "Cannot join planes of different sample formats ({} and {})",
                    base, format
                )));
            }
        }

        let (subsampling_w, subsampling_h) = if family == ColorFamily::Yuv {
            let chroma = &clips[1];
            if clips[2].width != chroma.width || clips[2].height != chroma.height {
                return Err(AdaptError::Input("Chroma planes must share dimensions".to_string()));
            }
            (
                subsampling_factor(first.width, chroma.width)?,
                subsampling_factor(first.height, chroma.height)?,
            )
        } else {
            (0, 0)
        };

        let format = VideoFormat {
            color_family: family,
            subsampling_w,
            subsampling_h,
            ..base
        };
        let planes = clips
            .iter()
            .map(|clip| clip.plane_ref(0).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::from_planes(format, first.width, first.height, planes)
    }

    /// Converts to another bit depth (32 means float), keeping full range.
    pub fn convert_depth(&self, bits_per_sample: u8) -> Result<VideoClip> {
        let src = self.require_format()?;
        let dst = src.with_depth(bits_per_sample)?;
        if src == dst {
            return Ok(self.clone());
        }
        let planes = self
            .planes
            .iter()
            .enumerate()
            .map(|(i, plane)| {
                let chroma = src.is_chroma_plane(i);
                Plane::from(plane.iter().map(|&v| convert_sample(v, &src, &dst, chroma)).collect::<Vec<_>>())
            })
            .collect();
        Self::from_planes(dst, self.width, self.height, planes)
    }

    /// Converts to the sample type and depth of `reference`.
    pub fn convert_depth_like(&self, reference: &VideoFormat) -> Result<VideoClip> {
        self.convert_depth(reference.bits_per_sample)
    }

    pub fn transpose(&self) -> Result<VideoClip> {
        let format = self.require_format()?;
        let planes = self
            .planes
            .iter()
            .enumerate()
            .map(|(i, plane)| {
                let (w, h) = format.plane_dimensions(i, self.width, self.height);
                let (w, h) = (w as usize, h as usize);
                let mut out = vec![0.0; w * h];
                for y in 0..h {
                    for x in 0..w {
                        out[x * h + y] = plane[y * w + x];
                    }
                }
                Plane::from(out)
            })
            .collect();
        let transposed = VideoFormat {
            subsampling_w: format.subsampling_h,
            subsampling_h: format.subsampling_w,
            ..format
        };
        Self::from_planes(transposed, self.height, self.width, planes)
    }

    /// Separates the frame into fields and keeps the first one in temporal order.
    pub fn first_field(&self, top_field_first: bool) -> Result<VideoClip> {
        let format = self.require_format()?;
        let chroma_rows = self.height >> format.subsampling_h;
        if self.height % 2 != 0 || chroma_rows % 2 != 0 {
            return Err(AdaptError::Input(format!(
                "Cannot separate fields of a clip with height {}",
                self.height
            )));
        }
        let offset = if top_field_first { 0 } else { 1 };
        let planes = self
            .planes
            .iter()
            .enumerate()
            .map(|(i, plane)| {
                let (w, h) = format.plane_dimensions(i, self.width, self.height);
                let rows = plane.chunks(w as usize).take(h as usize).skip(offset).step_by(2);
                Plane::from(rows.flatten().copied().collect::<Vec<_>>())
            })
            .collect();
        Self::from_planes(format, self.width, self.height / 2, planes)
    }

    /// Averages two clips of identical layout.
    pub fn merge(&self, other: &VideoClip) -> Result<VideoClip> {
        let format = self.require_format()?;
        if other.format != self.format || other.width != self.width || other.height != self.height {
            return Err(AdaptError::Input(format!(
                "Cannot merge {}x{} {} with {}x{} {:?}",
                self.width,
                self.height,
                format,
                other.width,
                other.height,
                other.format.map(|f| f.name())
            )));
        }
        let planes = self
            .planes
            .iter()
            .zip(&other.planes)
            .map(|(a, b)| expr(&format, &[a, b], |s| (s[0] + s[1]) / 2.0))
            .collect();
        Self::from_planes(format, self.width, self.height, planes)
    }
}

fn subsampling_factor(full: u32, sub: u32) -> Result<u8> {
    (0..=2u8)
        .find(|&shift| full >> shift == sub)
        .ok_or_else(|| AdaptError::Input(format!("Unsupported plane size ratio {}:{}", full, sub)))
}

fn convert_sample(value: f32, src: &VideoFormat, dst: &VideoFormat, chroma: bool) -> f32 {
    match (src.sample_type, dst.sample_type) {
        (SampleType::Integer, SampleType::Integer) => {
            if dst.bits_per_sample >= src.bits_per_sample {
                value * (1u32 << (dst.bits_per_sample - src.bits_per_sample)) as f32
            } else {
                let scale = (1u32 << (src.bits_per_sample - dst.bits_per_sample)) as f32;
                (value / scale).round().clamp(0.0, dst.peak())
            }
        }
        (SampleType::Integer, SampleType::Float) => {
            let centered = if chroma { value - src.neutral() } else { value };
            centered / src.peak()
        }
        (SampleType::Float, SampleType::Integer) => {
            let offset = if chroma { dst.neutral() } else { 0.0 };
            (value * dst.peak() + offset).round().clamp(0.0, dst.peak())
        }
        (SampleType::Float, SampleType::Float) => value,
    }
}

/// Evaluates a per-sample expression over planes of equal size.
///
/// Integer formats round to nearest and clamp to the legal range, floats are
/// stored as computed.
pub(crate) fn expr<F>(format: &VideoFormat, inputs: &[&Plane], f: F) -> Plane
where
    F: Fn(&[f32]) -> f32,
{
    let len = inputs.iter().map(|plane| plane.len()).min().unwrap_or(0);
    let peak = format.peak();
    let integer = format.sample_type == SampleType::Integer;
    let mut samples = Vec::with_capacity(inputs.len());
    (0..len)
        .map(|i| {
            samples.clear();
            samples.extend(inputs.iter().map(|plane| plane[i]));
            let value = f(&samples);
            if integer { value.round().clamp(0.0, peak) } else { value }
        })
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray8(width: u32, height: u32) -> VideoClip {
        let samples = (0..width * height).map(|v| (v % 256) as f32).collect();
        VideoClip::new(VideoFormat::gray(8).unwrap(), width, height, vec![samples]).unwrap()
    }

    #[test]
    fn format_names_follow_engine_conventions() {
        assert_eq!(VideoFormat::yuv(8, 1, 1).unwrap().name(), "YUV420P8");
        assert_eq!(VideoFormat::yuv(32, 0, 0).unwrap().name(), "YUV444PS");
        assert_eq!(VideoFormat::rgb(8).unwrap().name(), "RGB24");
        assert_eq!(VideoFormat::rgb(32).unwrap().name(), "RGBS");
        assert_eq!(VideoFormat::gray(16).unwrap().name(), "GRAY16");
        assert!(VideoFormat::gray(24).is_err());
    }

    #[test]
    fn neutral_and_peak() {
        let f8 = VideoFormat::gray(8).unwrap();
        assert_eq!(f8.peak(), 255.0);
        assert_eq!(f8.neutral(), 128.0);
        let fs = VideoFormat::gray(32).unwrap();
        assert_eq!(fs.peak(), 1.0);
        assert_eq!(fs.neutral(), 0.0);
    }

    #[test]
    fn plane_extraction_shares_memory() {
        let clip = VideoClip::blank(VideoFormat::yuv(8, 1, 1).unwrap(), 8, 4, &[16.0, 128.0, 128.0]).unwrap();
        let u = clip.plane(1).unwrap();
        assert_eq!((u.width(), u.height()), (4, 2));
        assert_eq!(u.format().unwrap().color_family, ColorFamily::Gray);
        assert!(u.shares_plane(0, &clip, 1));
    }

    #[test]
    fn split_then_join_restores_layout() {
        let clip = VideoClip::blank(VideoFormat::yuv(10, 1, 0).unwrap(), 8, 4, &[64.0, 512.0, 500.0]).unwrap();
        let planes = clip.split().unwrap();
        let joined = VideoClip::join(&planes, ColorFamily::Yuv).unwrap();
        assert_eq!(joined.format(), clip.format());
        for i in 0..3 {
            assert!(joined.shares_plane(i, &clip, i));
        }
    }

    #[test]
    fn join_rejects_mixed_depths() {
        let a = VideoClip::blank(VideoFormat::gray(8).unwrap(), 4, 4, &[0.0]).unwrap();
        let b = VideoClip::blank(VideoFormat::gray(16).unwrap(), 4, 4, &[0.0]).unwrap();
        assert!(VideoClip::join(&[a.clone(), b, a], ColorFamily::Rgb).is_err());
    }

    #[test]
    fn integer_depth_round_trip_is_exact() {
        let clip = gray8(16, 4);
        let deep = clip.convert_depth(16).unwrap();
        assert_eq!(deep.plane_data(0).unwrap()[3], 3.0 * 256.0);
        let back = deep.convert_depth(8).unwrap();
        assert_eq!(back.plane_data(0).unwrap(), clip.plane_data(0).unwrap());
    }

    #[test]
    fn float_depth_round_trip_keeps_chroma_centered() {
        let clip = VideoClip::blank(VideoFormat::yuv(8, 0, 0).unwrap(), 2, 2, &[255.0, 128.0, 0.0]).unwrap();
        let float = clip.convert_depth(32).unwrap();
        assert_eq!(float.plane_data(0).unwrap()[0], 1.0);
        assert_eq!(float.plane_data(1).unwrap()[0], 0.0);
        assert!(float.plane_data(2).unwrap()[0] < 0.0);
        let back = float.convert_depth(8).unwrap();
        assert_eq!(back.plane_data(2).unwrap(), clip.plane_data(2).unwrap());
    }

    #[test]
    fn transpose_twice_is_identity() {
        let clip = gray8(5, 3);
        let t = clip.transpose().unwrap();
        assert_eq!((t.width(), t.height()), (3, 5));
        assert_eq!(t.plane_data(0).unwrap()[1], 5.0);
        let back = t.transpose().unwrap();
        assert_eq!(back.plane_data(0).unwrap(), clip.plane_data(0).unwrap());
    }

    #[test]
    fn first_field_picks_rows_by_parity() {
        let clip = gray8(2, 4);
        let top = clip.first_field(true).unwrap();
        assert_eq!(top.plane_data(0).unwrap(), &[0.0, 1.0, 4.0, 5.0]);
        let bottom = clip.first_field(false).unwrap();
        assert_eq!(bottom.plane_data(0).unwrap(), &[2.0, 3.0, 6.0, 7.0]);
        assert!(gray8(2, 3).first_field(true).is_err());
    }

    #[test]
    fn merge_rounds_integer_average() {
        let a = VideoClip::blank(VideoFormat::gray(8).unwrap(), 2, 2, &[10.0]).unwrap();
        let b = VideoClip::blank(VideoFormat::gray(8).unwrap(), 2, 2, &[13.0]).unwrap();
        let merged = a.merge(&b).unwrap();
        assert!(merged.plane_data(0).unwrap().iter().all(|&v| v == 12.0));
    }

    #[test]
    fn variable_clip_is_rejected() {
        let clip = VideoClip::variable(None, 640, 480);
        assert!(matches!(clip.constant_format("test"), Err(AdaptError::InvalidFrame { .. })));
        let clip = VideoClip::variable(Some(VideoFormat::gray(8).unwrap()), 0, 0);
        assert!(clip.constant_format("test").is_err());
    }

    #[test]
    fn format_without_planes_is_not_constant() {
        let clip = VideoClip::variable(Some(VideoFormat::gray(8).unwrap()), 8, 4);
        assert!(!clip.is_constant());
        assert!(matches!(clip.constant_format("test"), Err(AdaptError::InvalidFrame { .. })));

        let luma = gray8(8, 4);
        let err = VideoClip::join(&[luma.clone(), clip.clone(), clip], ColorFamily::Yuv).unwrap_err();
        assert!(matches!(err, AdaptError::InvalidFrame { .. }));
    }
}
