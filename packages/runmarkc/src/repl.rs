//! Interactive prompt for runmark.
//!
//! Lines are collected until an empty line, then parsed, annotated and printed.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use runmark_diagnostics::span::FileIdMap;
use runmark_diagnostics::Diagnostics;
use runmark_ir::parser::parse_module;
use runmark_ir::print::print_module;
use runmark_passes::config::PassConfig;
use runmark_passes::run_passes;

const HISTORY_SIZE: usize = 1000;

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("runmark").join("history.txt"))
}

pub fn start_repl(config: &PassConfig, show_stats: bool) -> Result<(), Box<dyn Error>> {
    let mut line_editor = Reedline::create();
    if let Some(path) = history_path() {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let history = FileBackedHistory::with_file(HISTORY_SIZE, path)?;
        line_editor = line_editor.with_history(Box::new(history));
    }
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("runmark".to_string()),
        DefaultPromptSegment::Empty,
    );

    let mut map = FileIdMap::new();
    let mut buffer = String::new();
    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(line) => match line.trim() {
                ".quit" | ".q" => break,
                "" if buffer.is_empty() => continue,
                "" => {
                    let source = std::mem::take(&mut buffer);
                    annotate(&mut map, source, config, show_stats)?;
                }
                _ => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
            },
            Signal::CtrlC => buffer.clear(),
            Signal::CtrlD => break,
        }
    }

    Ok(())
}

fn annotate(
    map: &mut FileIdMap,
    source: String,
    config: &PassConfig,
    show_stats: bool,
) -> io::Result<()> {
    let diagnostics = Diagnostics::default();
    let repl_id = map.create_virtual_file("<repl>", source.clone());
    let module = parse_module(repl_id, &source, diagnostics.clone());
    if !diagnostics.eprint(map) {
        return Ok(());
    }
    let mut module = match module {
        Ok(module) => module,
        Err(err) => {
            eprintln!("Error: {err}");
            return Ok(());
        }
    };

    let stats = run_passes(&mut module, config);
    print_module(&module, &mut io::stdout().lock())?;
    if show_stats {
        crate::eprint_stats(&module, &stats);
    }
    Ok(())
}
