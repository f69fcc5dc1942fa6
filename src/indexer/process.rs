// src/indexer/process.rs

use crate::error::{AdaptError, Result};
use log::{debug, error, info};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns external tools. Swapped for a recording double in tests.
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<ProcessOutput>;
}

/// Runs commands with `std::process`, blocking until the child exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<ProcessOutput> {
        info!("Running {} {} (in {})", program.display(), args.join(" "), cwd.display());

        let mut command = Command::new(program);
        command.args(args);
        command.current_dir(cwd);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let start_time = Instant::now();
        let output = command.output().map_err(|e| {
            error!("Failed to spawn {}: {}", program.display(), e);
            AdaptError::Io(e)
        })?;
        let duration = start_time.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("{} stdout ({}ms): {}", program.display(), duration.as_millis(), stdout);
        if !stderr.is_empty() {
            debug!("{} stderr: {}", program.display(), stderr);
        }

        Ok(ProcessOutput { status: output.status, stdout, stderr })
    }
}

/// Looks `bin` up the way a shell would: paths with a directory part are
/// checked directly, bare names are searched on `PATH`.
pub fn find_executable(bin: &Path) -> Option<PathBuf> {
    if bin.as_os_str().is_empty() {
        return None;
    }
    if bin.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        return is_executable(bin).then(|| bin.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .flat_map(|dir| candidates(&dir, bin))
        .find(|candidate| is_executable(candidate))
}

fn candidates(dir: &Path, bin: &Path) -> Vec<PathBuf> {
    let plain = dir.join(bin);
    if cfg!(windows) && bin.extension().is_none() {
        vec![plain.with_extension("exe"), plain]
    } else {
        vec![plain]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
