use std::path::{Path, PathBuf};
use std::process;

use thrd_core::{analyze, FileSystemProvider, Severity, SourceProvider};

use super::format_diagnostic;
use crate::{load_project, read_source, report_error, OutputFormat};

pub(crate) fn cmd_check(root: &Path, files: &[PathBuf], output: OutputFormat, quiet: bool) {
    let project = load_project(root, output, quiet);

    let files = if files.is_empty() {
        match FileSystemProvider.list_sources(&project.root) {
            Ok(found) => found,
            Err(e) => {
                let msg = format!("error listing '{}': {}", project.root.display(), e);
                report_error(&msg, output, quiet);
                process::exit(1);
            }
        }
    } else {
        files.to_vec()
    };

    let mut errors = 0usize;
    let mut warnings = 0usize;
    let mut reports = Vec::new();

    for file in &files {
        let text = read_source(file, output, quiet);
        let name = file.display().to_string();
        let analysis = analyze(&name, &text, &project.index, &project.settings);

        for d in &analysis.diagnostics {
            match d.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Information | Severity::Hint => {}
            }
        }

        match output {
            OutputFormat::Text => {
                for d in &analysis.diagnostics {
                    println!("{}", format_diagnostic(&name, d));
                }
            }
            OutputFormat::Json => reports.push(serde_json::json!({
                "file": name,
                "diagnostics": analysis.diagnostics,
            })),
        }
    }

    match output {
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "{} file(s) checked: {} error(s), {} warning(s)",
                    files.len(),
                    errors,
                    warnings
                );
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
    }

    if errors > 0 {
        process::exit(1);
    }
}
