use std::path::Path;
use std::process;

use thrd_core::{analyze, apply_edits};

use crate::{load_project, read_source, report_error, OutputFormat};

/// Apply one round of fix-all edits.
///
/// Without `--write` the fixed text goes to stdout so it can be piped.
pub(crate) fn cmd_fix(root: &Path, file: &Path, write: bool, output: OutputFormat, quiet: bool) {
    let project = load_project(root, output, quiet);
    let text = read_source(file, output, quiet);
    let analysis = analyze(
        &file.display().to_string(),
        &text,
        &project.index,
        &project.settings,
    );
    let edits = analysis.fix_all();
    let fixed = apply_edits(&text, &edits);

    if !write {
        print!("{}", fixed);
        return;
    }

    if fixed != text {
        if let Err(e) = std::fs::write(file, &fixed) {
            let msg = format!("error writing file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
    if !quiet {
        match output {
            OutputFormat::Text => {
                println!("fixed {} issue(s) in {}", edits.len(), file.display())
            }
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "file": file.display().to_string(), "fixed": edits.len() })
            ),
        }
    }
}
