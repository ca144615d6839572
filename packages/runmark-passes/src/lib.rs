//! Independent-run marker insertion.
//!
//! Every block is split into maximal runs of instructions that neither depend on each other
//! through registers nor may alias through memory. A marker carrying the length of the run is
//! inserted right before the first instruction of each run.

pub mod config;
pub mod hazard;
pub mod insert_markers;
pub mod marker;
pub mod state;
pub mod stats;
pub mod transform;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use runmark_diagnostics::span::{FileId, FileIdMap};
use runmark_diagnostics::Diagnostics;
use runmark_ir::block::Module;
use runmark_ir::parser::{parse_module, ParseError};
use runmark_ir::visitor::VisitorMut;
use thiserror::Error;

use self::config::PassConfig;
use self::insert_markers::{InsertRunMarkers, PassStats};
use self::marker::{MarkerFactory, Noopn};

/// Name the pass logs under.
pub const PASS_NAME: &str = "insert-run-markers";

/// File extensions accepted for assembly input.
const ASM_EXTENSIONS: [&str; 3] = ["s", "S", "asm"];

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}.")]
    Io(#[from] std::io::Error),
    #[error("File `{0}` has wrong file extension. Assembly files should end with `.s`, `.S` or `.asm`.")]
    BadFileExtension(PathBuf),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// A file that has been parsed.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    /// The name of the file without the extension.
    pub name: String,
    /// Where the source was registered. Spans in diagnostics point into it.
    pub file_id: FileId,
    pub module: Module,
}

/// Reads and parses the assembly file at `path`.
///
/// The source is registered in `map` before parsing, so any report added to `diagnostics` can be
/// rendered from the map afterwards.
pub fn parse_file(
    path: &Path,
    map: &mut FileIdMap,
    diagnostics: Diagnostics,
) -> Result<ParsedFile, CompileError> {
    let extension = path.extension().map(|s| s.to_string_lossy().to_string());
    if !extension.map_or(false, |ext| ASM_EXTENSIONS.contains(&ext.as_str())) {
        return Err(CompileError::BadFileExtension(path.into()));
    }
    let source = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let file_id = map.insert_file(path, &source);
    let module = parse_module(file_id, &source, diagnostics)?;
    Ok(ParsedFile {
        path: path.to_path_buf(),
        name,
        file_id,
        module,
    })
}

/// Insert run markers into every block of `module` using the `noopn` marker.
pub fn run_passes(module: &mut Module, config: &PassConfig) -> PassStats {
    run_passes_with(module, config, &Noopn)
}

/// Like [`run_passes`], with a custom marker.
pub fn run_passes_with(
    module: &mut Module,
    config: &PassConfig,
    factory: &dyn MarkerFactory,
) -> PassStats {
    let _span = tracing::info_span!("pass", name = PASS_NAME).entered();
    let mut pass = InsertRunMarkers::new(config, factory);
    pass.visit_module(module);
    tracing::info!(
        functions = pass.stats.functions,
        blocks = pass.stats.blocks,
        markers = pass.stats.markers,
        "done"
    );
    pass.stats
}
