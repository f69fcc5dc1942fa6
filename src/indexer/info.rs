// src/indexer/info.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A video file referenced by an index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexedVideo {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Byte offset of this file within the concatenated stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct D2vHeader {
    pub version: u32,
    pub stream_type: Option<i64>,
    pub mpeg_type: Option<i64>,
    pub idct_algorithm: Option<i64>,
    pub yuvrgb_scale: Option<i64>,
    pub luminance_filter: Vec<i64>,
    pub clipping: Vec<i64>,
    pub aspect_ratio: Option<String>,
    pub picture_size: Option<(u32, u32)>,
    pub field_operation: Option<i64>,
    /// Frames per second as a rational.
    pub frame_rate: Option<(u64, u64)>,
    pub location: Vec<String>,
    /// Settings this crate does not interpret, keyed by upper-case name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DgiHeader {
    /// Magic token, e.g. `DGAVCIndexFileNV16`.
    pub kind: String,
    pub tool: Option<String>,
    pub depth: Option<u32>,
    pub aspect: Option<(u32, u32)>,
    pub fps: Option<(u64, u64)>,
    pub coded_frames: Option<u64>,
    pub playback_frames: Option<u64>,
    pub film_percentage: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum IndexHeader {
    D2v(D2vHeader),
    Dgi(DgiHeader),
}

/// One data row of a D2V index: a GOP and the flags of its frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct D2vFrameData {
    pub info: u32,
    pub matrix: u32,
    pub file: usize,
    pub position: u64,
    pub skip: u64,
    pub vob: u32,
    pub cell: u32,
    pub flags: Vec<u8>,
}

/// One data row of a DGI index, kept as its whitespace-separated fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DgiFrameData {
    /// Byte position in the concatenated stream.
    pub position: u64,
    /// Referenced file whose byte range holds `position`.
    pub file: usize,
    pub fields: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum IndexFrame {
    D2v(D2vFrameData),
    Dgi(DgiFrameData),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexFileInfo {
    pub path: PathBuf,
    pub file_idx: i64,
    pub videos: Vec<IndexedVideo>,
    pub header: IndexHeader,
    pub frames: Vec<IndexFrame>,
}

impl IndexFileInfo {
    /// Frames across all GOP rows, for formats that record per-frame flags.
    pub fn frame_count(&self) -> Option<usize> {
        match &self.header {
            IndexHeader::D2v(_) => Some(
                self.frames
                    .iter()
                    .map(|frame| match frame {
                        IndexFrame::D2v(data) => data.flags.len(),
                        IndexFrame::Dgi(_) => 0,
                    })
                    .sum(),
            ),
            IndexHeader::Dgi(header) => header.playback_frames.map(|n| n as usize),
        }
    }
}
