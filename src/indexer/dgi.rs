// src/indexer/dgi.rs

// DGI index files written by DGIndexNV. The first header line carries the
// magic token and the tool version, then one `path size` line per file.
// After a blank line come `KEY values` settings, the per-frame data and a
// footer with FPS, CODED/PLAYBACK frame counts and the FILM percentage.

use super::info::{DgiFrameData, DgiHeader, IndexFileInfo, IndexFrame, IndexHeader, IndexedVideo};
use super::split_header_and_body;
use crate::error::{AdaptError, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const MAGIC: &str = "IndexFileNV";

static FPS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FPS\s+(?P<num>\d+)\s*/\s*(?P<den>\d+)").expect("Invalid FPS regex"));

static FILM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<pct>\d+(?:\.\d+)?)%\s+FILM").expect("Invalid FILM regex"));

pub fn is_valid(first_line: &str) -> bool {
    first_line
        .split_whitespace()
        .next()
        .is_some_and(|token| token.contains(MAGIC))
}

pub fn build_command(bin: &Path, files: &[PathBuf], output: &Path) -> Vec<String> {
    let joined = files
        .iter()
        .map(|f| f.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(",");
    vec![
        bin.to_string_lossy().into_owned(),
        "-i".to_string(),
        joined,
        "-h".to_string(),
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        "-e".to_string(),
    ]
}

/// Splits a `path size` line. Paths may contain spaces, the size never does.
fn split_video_line(line: &str) -> (&str, Option<u64>) {
    let line = line.trim_end();
    match line.rsplit_once(char::is_whitespace) {
        Some((path, size)) => match size.parse() {
            Ok(size) => (path.trim_end(), Some(size)),
            Err(_) => (line, None),
        },
        None => (line, None),
    }
}

fn parse_videos(lines: &[&str]) -> Vec<IndexedVideo> {
    let mut offset = Some(0u64);
    lines
        .iter()
        .map(|line| {
            let (path, size) = split_video_line(line);
            let video = IndexedVideo { path: PathBuf::from(path), size, offset };
            offset = offset.zip(size).map(|(o, s)| o + s);
            video
        })
        .collect()
}

fn parse_pair(values: &str) -> Option<(u32, u32)> {
    let mut it = values.split_whitespace().map(str::parse::<u32>);
    match (it.next(), it.next()) {
        (Some(Ok(a)), Some(Ok(b))) => Some((a, b)),
        _ => None,
    }
}

pub fn parse(path: &Path, lines: &[&str], file_idx: i64) -> Result<IndexFileInfo> {
    let (head, rest) = split_header_and_body(lines)?;

    let magic = head
        .first()
        .ok_or_else(|| AdaptError::MalformedIndex("DGI: empty header".to_string()))?;
    let mut tokens = magic.splitn(2, char::is_whitespace);
    let mut header = DgiHeader {
        kind: tokens.next().unwrap_or_default().to_string(),
        tool: tokens.next().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        ..DgiHeader::default()
    };
    let videos = parse_videos(&head[1..]);

    let (settings, body) = split_header_and_body(rest)?;
    for line in settings {
        let (key, values) = line.trim().split_once(char::is_whitespace).unwrap_or((line.trim(), ""));
        let values = values.trim();
        match key {
            "DEPTH" => header.depth = values.parse().ok(),
            "ASPECT" => header.aspect = parse_pair(values),
            _ => {}
        }
        header.settings.insert(key.to_string(), values.to_string());
    }

    let ranges_known = videos.len() == 1 || videos.iter().all(|v| v.size.is_some());
    if file_idx >= 0 && !ranges_known {
        return Err(AdaptError::MalformedIndex(
            "DGI: file sizes are missing, data rows cannot be assigned to files".to_string(),
        ));
    }

    let mut frames = Vec::new();
    for line in body.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if let Some(caps) = FPS_REGEX.captures(line) {
            let num = caps["num"].parse().map_err(|_| malformed(line))?;
            let den = caps["den"].parse().map_err(|_| malformed(line))?;
            header.fps = Some((num, den));
        } else if let Some(count) = line.strip_prefix("CODED") {
            header.coded_frames = Some(count.trim().parse().map_err(|_| malformed(line))?);
        } else if let Some(count) = line.strip_prefix("PLAYBACK") {
            header.playback_frames = Some(count.trim().parse().map_err(|_| malformed(line))?);
        } else if let Some(caps) = FILM_REGEX.captures(line) {
            header.film_percentage = caps["pct"].parse().ok();
        } else if line.starts_with("ORDER") {
            header.settings.insert("ORDER".to_string(), line["ORDER".len()..].trim().to_string());
        } else if file_idx >= 0 {
            let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            let position = fields
                .iter()
                .find_map(|f| f.parse::<u64>().ok())
                .ok_or_else(|| malformed(line))?;
            match file_of(&videos, position) {
                Some(file) if file as i64 == file_idx => {
                    frames.push(IndexFrame::Dgi(DgiFrameData { position, file, fields }));
                }
                Some(_) => {}
                None => debug!("DGI: row at byte {} is outside every referenced file", position),
            }
        }
    }

    debug!("DGI {}: {} files, {} data rows", path.display(), videos.len(), frames.len());

    Ok(IndexFileInfo {
        path: path.to_path_buf(),
        file_idx,
        videos,
        header: IndexHeader::Dgi(header),
        frames,
    })
}

/// Index of the referenced file whose byte range holds `position`.
fn file_of(videos: &[IndexedVideo], position: u64) -> Option<usize> {
    if videos.len() == 1 {
        return Some(0);
    }
    videos.iter().position(|v| match (v.offset, v.size) {
        (Some(start), Some(size)) => position >= start && position - start < size,
        _ => false,
    })
}

fn malformed(line: &str) -> AdaptError {
    AdaptError::MalformedIndex(format!("DGI: invalid line '{}'", line))
}

/// Replaces the file paths of the header, keeping the recorded sizes.
pub fn rewrite_paths(lines: &mut [String], new_paths: &[PathBuf]) -> Result<()> {
    let end = lines
        .iter()
        .position(|l| l.is_empty())
        .filter(|&end| end > 0)
        .ok_or_else(|| AdaptError::MalformedIndex("DGI: no header before the first blank line".to_string()))?;
    let count = end - 1;
    if count != new_paths.len() {
        return Err(AdaptError::Input(format!(
            "Index references {} files but {} new paths were given",
            count,
            new_paths.len()
        )));
    }

    for (slot, path) in lines[1..end].iter_mut().zip(new_paths) {
        let new_path = path.to_string_lossy();
        *slot = match split_video_line(slot).1 {
            Some(size) => format!("{} {}", new_path, size),
            None => new_path.into_owned(),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "DGAVCIndexFileNV16 DGIndexNV 2053.0.0.0
/media/disc one/00001.m2ts 1000
/media/disc one/00002.m2ts 250

DEVICE 0
DECODE_MODES 0,0,0,0,0
STREAM 0 1
DEPTH 8
ASPECT 16 9
COLORIMETRY 1 1 1

SEQ 0 1 2 3
512 0 1 0 3
1024 0 2 0 3

FPS 30000 / 1001 29.970030
CODED 240
PLAYBACK 241
12.50% FILM
ORDER 0
";

    fn lines() -> Vec<&'static str> {
        SAMPLE.lines().collect()
    }

    #[test]
    fn magic_token() {
        assert!(is_valid("DGAVCIndexFileNV16 DGIndexNV"));
        assert!(is_valid("DGHEVCIndexFileNV16"));
        assert!(!is_valid("DGIndexProjectFile16"));
        assert!(!is_valid(""));
    }

    #[test]
    fn parses_header_and_footer() {
        let info = parse(Path::new("movie.dgi"), &lines(), 0).unwrap();
        assert_eq!(info.videos.len(), 2);
        assert_eq!(info.videos[0].path, PathBuf::from("/media/disc one/00001.m2ts"));
        assert_eq!(info.videos[1].size, Some(250));
        assert_eq!(info.videos[1].offset, Some(1000));

        let IndexHeader::Dgi(header) = &info.header else { panic!("wrong header") };
        assert_eq!(header.kind, "DGAVCIndexFileNV16");
        assert_eq!(header.tool.as_deref(), Some("DGIndexNV 2053.0.0.0"));
        assert_eq!(header.depth, Some(8));
        assert_eq!(header.aspect, Some((16, 9)));
        assert_eq!(header.fps, Some((30000, 1001)));
        assert_eq!(header.coded_frames, Some(240));
        assert_eq!(header.playback_frames, Some(241));
        assert_eq!(header.film_percentage, Some(12.5));
        assert_eq!(header.settings.get("ORDER").map(String::as_str), Some("0"));
        assert_eq!(info.frames.len(), 2);
        assert_eq!(info.frame_count(), Some(241));
    }

    #[test]
    fn negative_file_index_skips_rows() {
        let info = parse(Path::new("movie.dgi"), &lines(), -1).unwrap();
        assert!(info.frames.is_empty());
        let IndexHeader::Dgi(header) = &info.header else { panic!("wrong header") };
        assert_eq!(header.playback_frames, Some(241));
    }

    #[test]
    fn rows_are_assigned_by_byte_range() {
        let info = parse(Path::new("movie.dgi"), &lines(), 1).unwrap();
        assert_eq!(info.frames.len(), 1);
        let IndexFrame::Dgi(row) = &info.frames[0] else { panic!("wrong row") };
        assert_eq!((row.position, row.file), (1024, 1));
        assert_eq!(row.fields[0], "1024");

        let first = parse(Path::new("movie.dgi"), &lines(), 0).unwrap();
        assert!(first.frames.iter().all(|f| matches!(f, IndexFrame::Dgi(r) if r.file == 0)));

        let beyond = parse(Path::new("movie.dgi"), &lines(), 2).unwrap();
        assert!(beyond.frames.is_empty());
    }

    #[test]
    fn rows_without_file_sizes_are_ambiguous() {
        let lines = ["DGAVCIndexFileNV16", "/a.m2ts", "/b.m2ts", "", "DEPTH 8", "", "0 0 1", ""];
        let err = parse(Path::new("x.dgi"), &lines, 1).unwrap_err();
        assert!(matches!(err, AdaptError::MalformedIndex(_)));
        assert!(parse(Path::new("x.dgi"), &lines, -1).is_ok());
    }

    #[test]
    fn build_command_joins_inputs() {
        let cmd = build_command(
            Path::new("DGIndexNV"),
            &[PathBuf::from("a.m2ts"), PathBuf::from("b.m2ts")],
            Path::new("out.dgi"),
        );
        assert_eq!(cmd, vec!["DGIndexNV", "-i", "a.m2ts,b.m2ts", "-h", "-o", "out.dgi", "-e"]);
    }

    #[test]
    fn rewrite_keeps_sizes() {
        let mut lines: Vec<String> = SAMPLE.lines().map(str::to_string).collect();
        rewrite_paths(&mut lines, &[PathBuf::from("/new/a.m2ts"), PathBuf::from("/new/b.m2ts")]).unwrap();
        assert_eq!(lines[1], "/new/a.m2ts 1000");
        assert_eq!(lines[2], "/new/b.m2ts 250");
        assert_eq!(lines[0], "DGAVCIndexFileNV16 DGIndexNV 2053.0.0.0");

        let err = rewrite_paths(&mut lines, &[PathBuf::from("/new/a.m2ts")]).unwrap_err();
        assert!(matches!(err, AdaptError::Input(_)));
    }
}
