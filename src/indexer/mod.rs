// src/indexer/mod.rs

pub mod d2v;
pub mod dgi;
pub mod info;
pub mod process;

use crate::engine::{ArgValue, Engine, PluginArgs, require_plugin};
use crate::error::{AdaptError, Result};
use crate::frame::VideoClip;
use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use info::IndexFileInfo;
pub use process::{CommandRunner, ProcessOutput, SystemRunner};

/// Settings for one indexing session.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub bin_path: PathBuf,
    /// Extension of the produced index file, without the dot.
    pub ext: String,
    /// Delete corrupted index files instead of failing outright.
    pub force: bool,
    /// Extra arguments for the engine's source filter.
    pub source_args: PluginArgs,
}

impl IndexerConfig {
    pub fn new(bin_path: impl Into<PathBuf>, ext: &str) -> Self {
        IndexerConfig {
            bin_path: bin_path.into(),
            ext: ext.to_string(),
            force: true,
            source_args: PluginArgs::new(),
        }
    }

    pub fn with_bin_path(mut self, bin_path: impl Into<PathBuf>) -> Self {
        self.bin_path = bin_path.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_source_arg(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.source_args.set(key, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IndexerKind {
    #[default]
    #[value(name = "d2vwitch")]
    D2vWitch,
    #[value(name = "dgindexnv")]
    DgIndexNv,
}

/// An external indexing tool together with its session settings.
#[derive(Debug, Clone)]
pub enum Indexer {
    D2vWitch(IndexerConfig),
    DgIndexNv(IndexerConfig),
}

impl Indexer {
    pub fn d2vwitch() -> Self {
        Indexer::D2vWitch(IndexerConfig::new("d2vwitch", "d2v"))
    }

    pub fn dgindexnv() -> Self {
        Indexer::DgIndexNv(IndexerConfig::new("DGIndexNV", "dgi"))
    }

    pub fn new(kind: IndexerKind) -> Self {
        match kind {
            IndexerKind::D2vWitch => Self::d2vwitch(),
            IndexerKind::DgIndexNv => Self::dgindexnv(),
        }
    }

    /// Picks the tool that writes files with the extension of `index_path`.
    pub fn for_index_path(index_path: &Path) -> Result<Self> {
        let ext = index_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "d2v" => Ok(Self::d2vwitch()),
            "dgi" => Ok(Self::dgindexnv()),
            _ => Err(AdaptError::Input(format!(
                "Cannot tell the indexer of {} from its extension",
                index_path.display()
            ))),
        }
    }

    pub fn kind(&self) -> IndexerKind {
        match self {
            Indexer::D2vWitch(_) => IndexerKind::D2vWitch,
            Indexer::DgIndexNv(_) => IndexerKind::DgIndexNv,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        match self {
            Indexer::D2vWitch(config) | Indexer::DgIndexNv(config) => config,
        }
    }

    /// Replaces the session settings, keeping the tool.
    pub fn with_config(self, config: IndexerConfig) -> Self {
        match self {
            Indexer::D2vWitch(_) => Indexer::D2vWitch(config),
            Indexer::DgIndexNv(_) => Indexer::DgIndexNv(config),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Indexer::D2vWitch(_) => "D2VWitch",
            Indexer::DgIndexNv(_) => "DGIndexNV",
        }
    }

    pub fn build_command(&self, files: &[PathBuf], output: &Path) -> Vec<String> {
        let bin = &self.config().bin_path;
        match self {
            Indexer::D2vWitch(_) => d2v::build_command(bin, files, output),
            Indexer::DgIndexNv(_) => dgi::build_command(bin, files, output),
        }
    }

    pub fn resolve_binary(&self) -> Result<PathBuf> {
        let bin = &self.config().bin_path;
        process::find_executable(bin).ok_or_else(|| {
            error!("{}: `{}` was not found", self.name(), bin.display());
            AdaptError::BinaryNotFound(bin.clone())
        })
    }

    /// Runs the indexer on `files`, writing `output`. Blocks until the tool exits.
    pub fn run_index(
        &self,
        runner: &dyn CommandRunner,
        files: &[PathBuf],
        output: &Path,
        extra_args: &[String],
    ) -> Result<()> {
        let first = files
            .first()
            .ok_or_else(|| AdaptError::Input("No input files to index".to_string()))?;
        let bin = self.resolve_binary()?;

        let mut args = self.build_command(files, output).split_off(1);
        args.extend(extra_args.iter().cloned());

        let cwd = first
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        info!("Indexing {} file(s) with {} into {}", files.len(), self.name(), output.display());
        let start_time = Instant::now();
        let result = runner.run(&bin, &args, cwd)?;

        if !result.status.success() {
            error!("{} failed with status: {}", self.name(), result.status);
            if !result.stderr.is_empty() {
                error!("{} stderr: {}", self.name(), result.stderr);
            }
            return Err(AdaptError::Command {
                tool: self.name().to_string(),
                status: result.status,
            });
        }

        info!("{} finished in {:.2}s", self.name(), start_time.elapsed().as_secs_f64());
        Ok(())
    }

    pub fn derive_index_path(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.config().ext)
    }

    /// Deletes a corrupted index when `force` is set, otherwise fails.
    pub fn handle_corrupted_index(&self, index_path: &Path) -> Result<()> {
        if !self.config().force {
            error!("Index file {} is corrupted", index_path.display());
            return Err(AdaptError::CorruptedIndex { path: index_path.to_path_buf(), removed: false });
        }

        warn!("Index file {} is corrupted, deleting it", index_path.display());
        fs::remove_file(index_path).map_err(|e| {
            error!("Failed to delete {}: {}", index_path.display(), e);
            AdaptError::CorruptedIndexDeleteFailed { path: index_path.to_path_buf() }
        })
    }

    fn corrupted(&self, index_path: &Path) -> Result<IndexFileInfo> {
        self.handle_corrupted_index(index_path)?;
        Err(AdaptError::CorruptedIndex { path: index_path.to_path_buf(), removed: true })
    }

    pub fn parse_index_info(&self, index_path: &Path, file_idx: i64) -> Result<IndexFileInfo> {
        let content = match fs::read_to_string(index_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::InvalidData => return self.corrupted(index_path),
            Err(e) => return Err(e.into()),
        };
        let lines: Vec<&str> = content.lines().collect();

        let valid = lines.first().is_some_and(|first| match self {
            Indexer::D2vWitch(_) => d2v::is_valid(first),
            Indexer::DgIndexNv(_) => dgi::is_valid(first),
        });
        if !valid {
            return self.corrupted(index_path);
        }

        info!("Parsing {} index {}", self.name(), index_path.display());
        match self {
            Indexer::D2vWitch(_) => d2v::parse(index_path, &lines, file_idx),
            Indexer::DgIndexNv(_) => dgi::parse(index_path, &lines, file_idx),
        }
    }

    /// Points the index at `new_paths`, one per referenced file, in order.
    pub fn rewrite_referenced_paths(&self, index_path: &Path, new_paths: &[PathBuf]) -> Result<()> {
        let content = fs::read_to_string(index_path)?;
        let rewritten = rewrite_lines(&content, |lines| match self {
            Indexer::D2vWitch(_) => d2v::rewrite_paths(lines, new_paths),
            Indexer::DgIndexNv(_) => dgi::rewrite_paths(lines, new_paths),
        })?;
        fs::write(index_path, rewritten)?;
        info!("Rewrote {} video path(s) in {}", new_paths.len(), index_path.display());
        Ok(())
    }

    /// Opens `index_path` with the engine's source filter for this tool.
    pub fn source(&self, engine: &dyn Engine, index_path: &Path) -> Result<VideoClip> {
        let (namespace, function, key) = match self {
            Indexer::D2vWitch(_) => ("d2v", "Source", "input"),
            Indexer::DgIndexNv(_) => ("dgdecodenv", "DGSource", "source"),
        };
        require_plugin(engine, namespace)?;
        let args = PluginArgs::new()
            .with(key, index_path.to_string_lossy().into_owned())
            .merged(self.config().source_args.clone());
        debug!("{}.{}({})", namespace, function, args);
        engine.invoke(namespace, function, args)
    }

    /// Indexes `files` unless an index already sits next to the first one,
    /// then loads it. A corrupted index deleted under `force` is rebuilt once.
    pub fn index_or_reuse(
        &self,
        runner: &dyn CommandRunner,
        engine: &dyn Engine,
        files: &[PathBuf],
    ) -> Result<VideoClip> {
        let first = files
            .first()
            .ok_or_else(|| AdaptError::Input("No input files to index".to_string()))?;
        let index_path = self.derive_index_path(first);

        if index_path.exists() {
            info!("Reusing index {}", index_path.display());
        } else {
            self.run_index(runner, files, &index_path, &[])?;
        }

        match self.parse_index_info(&index_path, 0) {
            Ok(_) => {}
            Err(e) if e.is_retriable_corruption() => {
                warn!("{}", e);
                self.run_index(runner, files, &index_path, &[])?;
                self.parse_index_info(&index_path, 0)?;
            }
            Err(e) => return Err(e),
        }

        self.source(engine, &index_path)
    }
}

/// Splits index lines at the first empty line, which is dropped.
pub fn split_header_and_body<S: AsRef<str>>(lines: &[S]) -> Result<(&[S], &[S])> {
    let cut = lines
        .iter()
        .position(|line| line.as_ref().is_empty())
        .ok_or_else(|| AdaptError::MalformedIndex("no blank line between header and body".to_string()))?;
    Ok((&lines[..cut], &lines[cut + 1..]))
}

/// Applies `edit` to the lines of `content`, keeping its line endings and
/// trailing newline.
pub(crate) fn rewrite_lines<F>(content: &str, edit: F) -> Result<String>
where
    F: FnOnce(&mut [String]) -> Result<()>,
{
    let ending = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    edit(lines.as_mut_slice())?;
    let mut out = lines.join(ending);
    if content.ends_with('\n') {
        out.push_str(ending);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_first_blank_line() {
        let text = "A\nB\n\nC\nD\n";
        let lines: Vec<&str> = text.lines().collect();
        let (head, body) = split_header_and_body(&lines).unwrap();
        assert_eq!(head, ["A", "B"]);
        assert_eq!(body, ["C", "D"]);

        let mut rebuilt = head.join("\n");
        rebuilt.push_str("\n\n");
        rebuilt.push_str(&body.join("\n"));
        rebuilt.push('\n');
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn whitespace_line_is_not_a_separator() {
        let lines = ["A", "  ", "B", "", "C"];
        let (head, body) = split_header_and_body(&lines).unwrap();
        assert_eq!(head, ["A", "  ", "B"]);
        assert_eq!(body, ["C"]);

        assert!(split_header_and_body(&["A", " ", "B"]).is_err());
    }

    #[test]
    fn split_without_blank_line_fails() {
        let err = split_header_and_body(&["A", "B"]).unwrap_err();
        assert!(matches!(err, AdaptError::MalformedIndex(_)));
    }

    #[test]
    fn derive_index_path_is_idempotent() {
        let indexer = Indexer::d2vwitch();
        let once = indexer.derive_index_path(Path::new("/dvd/VTS_01_1.VOB"));
        assert_eq!(once, PathBuf::from("/dvd/VTS_01_1.d2v"));
        assert_eq!(indexer.derive_index_path(&once), once);
        assert_eq!(
            Indexer::dgindexnv().derive_index_path(Path::new("movie.m2ts")),
            PathBuf::from("movie.dgi")
        );
    }

    #[test]
    fn d2vwitch_command_layout() {
        let indexer = Indexer::D2vWitch(IndexerConfig::new("/opt/d2vwitch", "d2v"));
        let cmd = indexer.build_command(
            &[PathBuf::from("a.vob"), PathBuf::from("b.vob")],
            Path::new("out.d2v"),
        );
        assert_eq!(cmd, vec!["/opt/d2vwitch", "--output", "out.d2v", "a.vob", "b.vob"]);
    }

    #[test]
    fn indexer_from_extension() {
        assert_eq!(Indexer::for_index_path(Path::new("x.D2V")).unwrap().kind(), IndexerKind::D2vWitch);
        assert_eq!(Indexer::for_index_path(Path::new("x.dgi")).unwrap().kind(), IndexerKind::DgIndexNv);
        assert!(Indexer::for_index_path(Path::new("x.txt")).is_err());
    }

    #[test]
    fn missing_binary_is_a_configuration_error() {
        let indexer = Indexer::d2vwitch().with_config(IndexerConfig::new("/nonexistent/d2vwitch", "d2v"));
        assert!(matches!(indexer.resolve_binary(), Err(AdaptError::BinaryNotFound(_))));
    }

    #[test]
    fn corrupted_index_is_deleted_under_force() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("movie.d2v");
        fs::write(&index, "garbage\n").unwrap();

        let err = Indexer::d2vwitch().parse_index_info(&index, 0).unwrap_err();
        assert!(err.is_retriable_corruption());
        assert!(!index.exists());
    }

    #[test]
    fn corrupted_index_is_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("movie.dgi");
        fs::write(&index, "DGIndexProjectFile16\n").unwrap();

        let indexer = Indexer::dgindexnv();
        let indexer = indexer.clone().with_config(indexer.config().clone().with_force(false));
        let err = indexer.parse_index_info(&index, 0).unwrap_err();
        assert!(matches!(err, AdaptError::CorruptedIndex { removed: false, .. }));
        assert!(index.exists());
    }

    #[test]
    fn failed_deletion_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Indexer::d2vwitch()
            .handle_corrupted_index(&dir.path().join("missing.d2v"))
            .unwrap_err();
        assert!(matches!(err, AdaptError::CorruptedIndexDeleteFailed { .. }));
        assert!(Indexer::d2vwitch().handle_corrupted_index(dir.path()).is_err());
    }

    #[test]
    fn rewrite_keeps_line_endings() {
        let content = "DGIndexProjectFile16\r\n1\r\nold.vob\r\n\r\nStream_Type=1\r\n";
        let out = rewrite_lines(content, |lines| d2v::rewrite_paths(lines, &[PathBuf::from("new.vob")])).unwrap();
        assert_eq!(out, "DGIndexProjectFile16\r\n1\r\nnew.vob\r\n\r\nStream_Type=1\r\n");

        let out = rewrite_lines("a\nb", |lines| {
            lines[1] = "c".to_string();
            Ok(())
        })
        .unwrap();
        assert_eq!(out, "a\nc");
    }

    #[test]
    fn source_args_reach_the_source_filter() {
        let engine = crate::testing::MockEngine::with_plugins(&["d2v"]);
        let indexer = Indexer::d2vwitch();
        let indexer = indexer
            .clone()
            .with_config(indexer.config().clone().with_source_arg("rff", true));
        indexer.source(&engine, Path::new("/dvd/movie.d2v")).unwrap();

        let call = &engine.calls_to("d2v", "Source")[0];
        assert_eq!(call.args.get("input").and_then(ArgValue::as_str), Some("/dvd/movie.d2v"));
        assert!(call.args.contains_key("rff"));
        assert!(Indexer::dgindexnv().source(&engine, Path::new("x.dgi")).is_err());
    }
}
