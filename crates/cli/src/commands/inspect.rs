//! Debug views of the analysis pipeline: tokens, chunks, parsed value.
//!
//! Ranges are printed in zero-based editor coordinates.

use std::path::Path;
use std::process;

use thrd_core::chunk::{Chunk, ChunkKind};
use thrd_core::{parse_document, ParsedDocument};

use super::{format_diagnostic, format_range};
use crate::{read_source, OutputFormat};

fn parse_file(file: &Path, output: OutputFormat, quiet: bool) -> ParsedDocument {
    parse_document(&read_source(file, output, quiet))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", json);
}

pub(crate) fn cmd_dump(file: &Path, output: OutputFormat, quiet: bool) {
    let doc = parse_file(file, output, quiet);
    let Some(data) = &doc.data else {
        if !quiet {
            let name = file.display().to_string();
            for d in doc.diagnostics.diagnostics() {
                eprintln!("{}", format_diagnostic(&name, d));
            }
        }
        process::exit(1);
    };
    print_json(&data.strip());
}

fn describe(chunk: &Chunk) -> (&'static str, String) {
    match &chunk.kind {
        ChunkKind::Block(block) => ("block", block.kind.name().to_owned()),
        ChunkKind::Enum { tag, block, .. } => (
            "enum",
            match block {
                Some(block) => format!("#{} {}", tag, block.kind.name()),
                None => format!("#{}", tag),
            },
        ),
        ChunkKind::Key { name, .. } => ("key", name.clone()),
        ChunkKind::Value(scalar) => (
            "value",
            serde_json::to_string(scalar).unwrap_or_else(|_| format!("{:?}", scalar)),
        ),
        ChunkKind::Separator { weak } => (
            "separator",
            if *weak { "weak" } else { "strong" }.to_owned(),
        ),
    }
}

pub(crate) fn cmd_chunks(file: &Path, output: OutputFormat, quiet: bool) {
    let doc = parse_file(file, output, quiet);
    let chunks = doc.chunks.all_chunks();
    match output {
        OutputFormat::Text => {
            for chunk in chunks {
                let (kind, detail) = describe(chunk);
                println!("{:<14} {:<9} {}", format_range(chunk.range), kind, detail);
            }
        }
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = chunks
                .into_iter()
                .map(|chunk| {
                    let (kind, detail) = describe(chunk);
                    serde_json::json!({ "range": chunk.range, "kind": kind, "detail": detail })
                })
                .collect();
            print_json(&rows);
        }
    }
}

pub(crate) fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let doc = parse_file(file, output, quiet);
    match output {
        OutputFormat::Text => {
            for token in &doc.tokens {
                println!(
                    "{:<14} {:<40} {:?}",
                    format_range(token.range),
                    format!("{:?}", token.data),
                    token.text
                );
            }
        }
        OutputFormat::Json => print_json(&doc.tokens),
    }
}
