//! THRD Language Server Protocol implementation for editor integration.
//!
//! Keeps one [`workspace::Workspace`] per root folder, revalidates the
//! edited document on every change and refreshes the rest of the workspace
//! through a debounced [`scheduler::RefreshScheduler`]. Serves diagnostics,
//! completion, hover and the `source.fixAll` code action over stdio via the
//! `thrd lsp` CLI subcommand.

pub mod convert;
pub mod scheduler;
pub mod server;
pub mod uri;
pub mod workspace;

pub use scheduler::RefreshScheduler;
pub use workspace::{Workspace, Workspaces};

/// Run the LSP server over stdio. This is the public entry point
/// called by `thrd lsp`.
pub fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    server::run()
}
