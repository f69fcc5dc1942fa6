// src/indexer/d2v.rs

// D2V project files written by DGIndex/D2VWitch:
//
//   DGIndexProjectFile16
//   <number of files>
//   <one path per file>
//
//   Key=Value settings
//
//   info matrix file position skip vob cell flags...
//   FINISHED ...

use super::info::{D2vFrameData, D2vHeader, IndexFileInfo, IndexFrame, IndexHeader, IndexedVideo};
use super::split_header_and_body;
use crate::error::{AdaptError, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MAGIC: &str = "DGIndexProjectFile";

/// Flag byte marking the end of the stream in the last data row.
const END_OF_STREAM: u8 = 0xff;

static FRAME_RATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<rate>\d+)\s*(?:\(\s*(?P<num>\d+)\s*/\s*(?P<den>\d+)\s*\))?\s*$")
        .expect("Invalid frame rate regex")
});

static PICTURE_SIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<w>\d+)\s*x\s*(?P<h>\d+)\s*$").expect("Invalid picture size regex"));

pub fn is_valid(first_line: &str) -> bool {
    first_line.starts_with(MAGIC)
}

pub fn build_command(bin: &Path, files: &[PathBuf], output: &Path) -> Vec<String> {
    let mut cmd = vec![
        bin.to_string_lossy().into_owned(),
        "--output".to_string(),
        output.to_string_lossy().into_owned(),
    ];
    cmd.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
    cmd
}

fn file_list<'a>(head: &'a [&'a str]) -> Result<&'a [&'a str]> {
    let count: usize = head
        .get(1)
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| AdaptError::MalformedIndex("D2V: missing file count".to_string()))?;
    head.get(2..2 + count).ok_or_else(|| {
        AdaptError::MalformedIndex(format!("D2V: expected {} file paths, found {}", count, head.len().saturating_sub(2)))
    })
}

pub fn parse(path: &Path, lines: &[&str], file_idx: i64) -> Result<IndexFileInfo> {
    let (head, rest) = split_header_and_body(lines)?;
    let version = head
        .first()
        .and_then(|line| line.strip_prefix(MAGIC))
        .ok_or_else(|| AdaptError::MalformedIndex(format!("D2V: missing {} line", MAGIC)))
        .and_then(|version| number("version", version))?;

    let videos = file_list(head)?
        .iter()
        .map(|p| IndexedVideo { path: PathBuf::from(p.trim()), size: None, offset: None })
        .collect::<Vec<_>>();

    let (raw_settings, data) = split_header_and_body(rest)?;
    let header = parse_settings(version, raw_settings)?;

    let mut frames = Vec::new();
    if file_idx >= 0 {
        for line in data {
            let line = line.trim();
            if line.is_empty() || line.starts_with("FINISHED") {
                break;
            }
            let row = parse_row(line)?;
            if row.file as i64 == file_idx {
                frames.push(IndexFrame::D2v(row));
            }
        }
    }

    debug!("D2V {}: {} files, {} data rows for file {}", path.display(), videos.len(), frames.len(), file_idx);

    Ok(IndexFileInfo {
        path: path.to_path_buf(),
        file_idx,
        videos,
        header: IndexHeader::D2v(header),
        frames,
    })
}

fn number<T: FromStr>(what: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AdaptError::MalformedIndex(format!("D2V: invalid {} '{}'", what, value)))
}

fn int_list(values: &str) -> Result<Vec<i64>> {
    values
        .split(',')
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| AdaptError::MalformedIndex(format!("D2V: invalid integer '{}'", v)))
        })
        .collect()
}

fn first_int(key: &str, values: &str) -> Result<i64> {
    int_list(values)?
        .first()
        .copied()
        .ok_or_else(|| AdaptError::MalformedIndex(format!("D2V: empty value for {}", key)))
}

fn parse_settings(version: u32, lines: &[&str]) -> Result<D2vHeader> {
    let mut header = D2vHeader { version, ..D2vHeader::default() };

    for line in lines {
        let Some((key, values)) = line.trim_end().split_once('=') else {
            continue;
        };
        let key = key.trim().to_uppercase();
        match key.as_str() {
            "STREAM_TYPE" => header.stream_type = Some(first_int(&key, values)?),
            "MPEG_TYPE" => header.mpeg_type = Some(first_int(&key, values)?),
            "IDCT_ALGORITHM" => header.idct_algorithm = Some(first_int(&key, values)?),
            "YUVRGB_SCALE" => header.yuvrgb_scale = Some(first_int(&key, values)?),
            "LUMINANCE_FILTER" => header.luminance_filter = int_list(values)?,
            "CLIPPING" => header.clipping = int_list(values)?,
            "ASPECT_RATIO" => header.aspect_ratio = Some(values.trim().to_string()),
            "PICTURE_SIZE" => {
                let caps = PICTURE_SIZE_REGEX
                    .captures(values)
                    .ok_or_else(|| AdaptError::MalformedIndex(format!("D2V: invalid Picture_Size '{}'", values)))?;
                header.picture_size = Some((number("Picture_Size", &caps["w"])?, number("Picture_Size", &caps["h"])?));
            }
            "FIELD_OPERATION" => header.field_operation = Some(first_int(&key, values)?),
            "FRAME_RATE" => {
                let caps = FRAME_RATE_REGEX
                    .captures(values)
                    .ok_or_else(|| AdaptError::MalformedIndex(format!("D2V: invalid Frame_Rate '{}'", values)))?;
                header.frame_rate = match (caps.name("num"), caps.name("den")) {
                    (Some(num), Some(den)) => {
                        Some((number("Frame_Rate", num.as_str())?, number("Frame_Rate", den.as_str())?))
                    }
                    // Bare rate is in thousandths of a frame per second
                    _ => Some((number("Frame_Rate", &caps["rate"])?, 1000)),
                };
            }
            "LOCATION" => header.location = values.split(',').map(|v| v.trim().to_string()).collect(),
            _ => {
                warn!("D2V: unknown setting {}", key);
                header.other.insert(key, values.trim().to_string());
            }
        }
    }

    Ok(header)
}

fn parse_row(line: &str) -> Result<D2vFrameData> {
    let malformed = || AdaptError::MalformedIndex(format!("D2V: invalid data row '{}'", line));
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(malformed());
    }
    let dec = |i: usize| fields[i].parse::<u64>().map_err(|_| malformed());

    let flags = fields[7..]
        .iter()
        .map(|f| u8::from_str_radix(f, 16).map_err(|_| malformed()))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|&flag| flag != END_OF_STREAM)
        .collect();

    Ok(D2vFrameData {
        info: u32::from_str_radix(fields[0], 16).map_err(|_| malformed())?,
        matrix: dec(1)? as u32,
        file: dec(2)? as usize,
        position: dec(3)?,
        skip: dec(4)?,
        vob: dec(5)? as u32,
        cell: dec(6)? as u32,
        flags,
    })
}

/// Replaces the file list, keeping everything else byte for byte.
pub fn rewrite_paths(lines: &mut [String], new_paths: &[PathBuf]) -> Result<()> {
    let count: usize = lines
        .get(1)
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| AdaptError::MalformedIndex("D2V: missing file count".to_string()))?;
    if count != new_paths.len() {
        return Err(AdaptError::Input(format!(
            "Index references {} files but {} new paths were given",
            count,
            new_paths.len()
        )));
    }
    let slots = lines
        .get_mut(2..2 + count)
        .ok_or_else(|| AdaptError::MalformedIndex("D2V: truncated file list".to_string()))?;
    for (slot, path) in slots.iter_mut().zip(new_paths) {
        *slot = path.to_string_lossy().into_owned();
    }
    Ok(())
}
