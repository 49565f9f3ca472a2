use crate::logging::RunLogger;
use crate::types::{PipelineError, PipelineResult};
use std::path::Path;

/// Suffixes of files a pipeline reads
pub const INPUT_FILE_SUFFIXES: &[&str] = &["zip", "tif"];

/// Suffixes that mark an argument as a file rather than a directory
pub const FILE_SUFFIXES: &[&str] = &["zip", "tif", "nc"];

/// How a path argument of an entry point is treated by the guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// Must exist before the run starts
    SourceFile,
    /// A file the guards leave alone
    OtherFile,
    /// Created if absent
    Directory,
}

fn has_suffix(path: &Path, suffixes: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| suffixes.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

pub fn classify_path(path: &Path) -> PathRole {
    if has_suffix(path, INPUT_FILE_SUFFIXES) {
        PathRole::SourceFile
    } else if has_suffix(path, FILE_SUFFIXES) {
        PathRole::OtherFile
    } else {
        PathRole::Directory
    }
}

/// Every source-file argument must exist
pub fn ensure_inputs_exist(args: &[&Path]) -> PipelineResult<()> {
    for path in args {
        if classify_path(path) == PathRole::SourceFile && !path.exists() {
            return Err(PipelineError::InputNotFound(path.to_path_buf()));
        }
    }
    Ok(())
}

/// Every directory argument is created if absent
pub fn ensure_output_dirs(log: &RunLogger, args: &[&Path]) -> PipelineResult<()> {
    for path in args {
        if classify_path(path) == PathRole::Directory && !path.is_dir() {
            std::fs::create_dir_all(path)?;
            log.debug(format_args!("Created directory: {}", path.display()));
        }
    }
    Ok(())
}

/// Pre-flight checks for a pipeline entry point: inputs first, then directories.
pub fn validate_entry(log: &RunLogger, args: &[&Path]) -> PipelineResult<()> {
    ensure_inputs_exist(args)?;
    ensure_output_dirs(log, args)
}
