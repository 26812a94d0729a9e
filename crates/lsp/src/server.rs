//! LSP server main loop with request/notification dispatch.
//!
//! Uses `lsp-server` (synchronous, crossbeam-based) for the transport.
//! The loop blocks on the connection until the earliest refresh deadline of
//! any workspace, so scheduled refreshes run on the same thread as requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lsp_server::{Connection, ErrorCode, Message, Notification, Request, Response};
use lsp_types::notification::{
    DidChangeConfiguration, DidChangeTextDocument, DidChangeWatchedFiles,
    DidChangeWorkspaceFolders, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument,
    Notification as _, PublishDiagnostics,
};
use lsp_types::request::{CodeActionRequest, Completion, HoverRequest, Request as _};
use lsp_types::{
    CodeActionKind, CodeActionOptions, CodeActionProviderCapability, CompletionOptions,
    CompletionResponse, FileChangeType, HoverProviderCapability, OneOf, PublishDiagnosticsParams,
    ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions, Uri, WorkspaceFoldersServerCapabilities,
    WorkspaceServerCapabilities,
};
use serde::de::DeserializeOwned;
use thrd_core::source::is_tracked;
use thrd_core::{Diagnostic, FileSystemProvider, Settings};
use tracing::{debug, warn};

use crate::convert;
use crate::uri::{path_to_uri, uri_to_path};
use crate::workspace::{Workspace, Workspaces};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Run the LSP server over stdio until shutdown.
pub fn run() -> Result<()> {
    let (connection, io_threads) = Connection::stdio();
    serve(&connection)?;
    drop(connection);
    io_threads.join()?;
    Ok(())
}

/// Run the handshake and main loop on an established connection.
pub fn serve(connection: &Connection) -> Result<()> {
    // ── Initialize handshake ──────────────────────────────────────────
    let init_json = serde_json::to_value(build_capabilities())?;
    let init_params: lsp_types::InitializeParams =
        serde_json::from_value(connection.initialize(init_json)?)?;

    let mut server = Server::new(connection);
    for root in extract_workspace_roots(&init_params) {
        server.add_workspace(root)?;
    }

    // ── Main loop ─────────────────────────────────────────────────────
    loop {
        let msg = match server.workspaces.next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match connection.receiver.recv_timeout(wait) {
                    Ok(msg) => Some(msg),
                    Err(e) if e.is_timeout() => None,
                    Err(_) => break,
                }
            }
            None => match connection.receiver.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        match msg {
            Some(Message::Request(req)) => {
                if connection.handle_shutdown(&req)? {
                    break;
                }
                server.handle_request(req)?;
            }
            Some(Message::Notification(not)) => server.handle_notification(not)?,
            // We send no requests to the client.
            Some(Message::Response(_)) | None => {}
        }

        let published = server.workspaces.poll(Instant::now());
        if !published.is_empty() {
            debug!(documents = published.len(), "scheduled refresh");
        }
        for (path, diagnostics) in published {
            server.publish(&path, &diagnostics)?;
        }
    }
    Ok(())
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                ..Default::default()
            },
        )),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![":".into(), " ".into(), "#".into()]),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![
                CodeActionKind::SOURCE_FIX_ALL,
                CodeActionKind::from(convert::FIX_ALL_THRD_KIND.to_owned()),
            ]),
            ..Default::default()
        })),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}

/// Every workspace root named in InitializeParams.
#[allow(deprecated)] // root_path/root_uri are deprecated but still sent by older clients
fn extract_workspace_roots(params: &lsp_types::InitializeParams) -> Vec<PathBuf> {
    if let Some(folders) = &params.workspace_folders {
        if !folders.is_empty() {
            return folders.iter().map(|f| uri_to_path(&f.uri)).collect();
        }
    }
    if let Some(root_uri) = &params.root_uri {
        return vec![uri_to_path(root_uri)];
    }
    match &params.root_path {
        Some(root_path) if !root_path.is_empty() => vec![PathBuf::from(root_path)],
        _ => Vec::new(),
    }
}

/// Infer a workspace root by walking up from a file looking for project markers.
fn infer_workspace_root(file_path: &Path) -> Option<PathBuf> {
    let start = file_path.parent()?;
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(thrd_core::settings::FILE_NAME).exists() || dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    Some(start.to_path_buf())
}

fn load_settings(root: &Path) -> Settings {
    Settings::load(root).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring malformed settings");
        Settings::default()
    })
}

fn parse_params<P: DeserializeOwned>(method: &str, params: serde_json::Value) -> Option<P> {
    match serde_json::from_value(params) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(method, error = %e, "malformed notification");
            None
        }
    }
}

struct Server<'a> {
    connection: &'a Connection,
    workspaces: Workspaces,
    /// Settings pushed by the editor; they override `thrd.toml`.
    editor_settings: Option<Settings>,
    /// URIs as the editor spelled them, for publishing.
    uris: HashMap<PathBuf, Uri>,
}

impl<'a> Server<'a> {
    fn new(connection: &'a Connection) -> Self {
        Server {
            connection,
            workspaces: Workspaces::new(),
            editor_settings: None,
            uris: HashMap::new(),
        }
    }

    fn add_workspace(&mut self, root: PathBuf) -> Result<()> {
        let settings = self
            .editor_settings
            .clone()
            .unwrap_or_else(|| load_settings(&root));
        let mut workspace = match Workspace::load(root, &FileSystemProvider, settings) {
            Ok(workspace) => workspace,
            Err(e) => {
                warn!(error = %e, "cannot load workspace");
                return Ok(());
            }
        };
        let published = workspace.validate_all();
        self.workspaces.add(workspace);
        for (path, diagnostics) in published {
            self.publish(&path, &diagnostics)?;
        }
        Ok(())
    }

    /// The workspace owning `path`, creating one around it if none does.
    fn workspace_for(&mut self, path: &Path) -> Option<&mut Workspace> {
        if self.workspaces.containing(path).is_none() {
            let root = infer_workspace_root(path)?;
            let settings = self
                .editor_settings
                .clone()
                .unwrap_or_else(|| load_settings(&root));
            let workspace = Workspace::load(root.clone(), &FileSystemProvider, settings)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "cannot read inferred workspace");
                    Workspace::new(root, Settings::default())
                });
            self.workspaces.add(workspace);
        }
        self.workspaces.containing(path)
    }

    fn uri_for(&self, path: &Path) -> Option<Uri> {
        self.uris.get(path).cloned().or_else(|| path_to_uri(path))
    }

    fn send(&self, msg: Message) -> Result<()> {
        self.connection.sender.send(msg)?;
        Ok(())
    }

    /// Send `textDocument/publishDiagnostics` notification to the client.
    fn publish(&self, path: &Path, diagnostics: &[Diagnostic]) -> Result<()> {
        let Some(uri) = self.uri_for(path) else {
            warn!(path = %path.display(), "no uri for document");
            return Ok(());
        };
        let params = PublishDiagnosticsParams {
            diagnostics: convert::diagnostics(diagnostics, &uri),
            uri,
            version: None,
        };
        let not = Notification::new(PublishDiagnostics::METHOD.to_string(), params);
        self.send(Message::Notification(not))
    }

    // ── Requests ─────────────────────────────────────────────────────

    fn handle_request(&mut self, req: Request) -> Result<()> {
        let method = req.method.clone();
        let result = match method.as_str() {
            m if m == Completion::METHOD => {
                self.request::<lsp_types::CompletionParams, _>(req, |server, params| {
                    let doc = params.text_document_position;
                    let path = uri_to_path(&doc.text_document.uri);
                    let pos = convert::from_position(doc.position);
                    let items = server
                        .workspaces
                        .containing(&path)
                        .map(|w| w.completions_at(&path, pos))
                        .unwrap_or_default();
                    Some(CompletionResponse::Array(
                        items.iter().map(convert::completion_item).collect(),
                    ))
                })
            }
            m if m == HoverRequest::METHOD => {
                self.request::<lsp_types::HoverParams, _>(req, |server, params| {
                    let doc = params.text_document_position_params;
                    let path = uri_to_path(&doc.text_document.uri);
                    let pos = convert::from_position(doc.position);
                    let hover = server.workspaces.containing(&path)?.hover_at(&path, pos)?;
                    Some(convert::hover(&hover))
                })
            }
            m if m == CodeActionRequest::METHOD => {
                self.request::<lsp_types::CodeActionParams, _>(req, |server, params| {
                    if !convert::wants_fix_all(params.context.only.as_deref()) {
                        return Some(Vec::new());
                    }
                    let uri = params.text_document.uri;
                    let path = uri_to_path(&uri);
                    let edits = server
                        .workspaces
                        .containing(&path)
                        .and_then(|w| w.fix_all(&path))
                        .unwrap_or_default();
                    Some(vec![convert::fix_all_action(&uri, &edits)])
                })
            }
            _ => Err(Response::new_err(
                req.id,
                ErrorCode::MethodNotFound as i32,
                format!("method not found: {method}"),
            )),
        };
        let resp = match result {
            Ok(resp) | Err(resp) => resp,
        };
        self.send(Message::Response(resp))
    }

    /// Decode params, run `handler`, and wrap its result in a response.
    fn request<P, R>(
        &mut self,
        req: Request,
        handler: impl FnOnce(&mut Self, P) -> Option<R>,
    ) -> std::result::Result<Response, Response>
    where
        P: DeserializeOwned,
        R: serde::Serialize,
    {
        let params: P = serde_json::from_value(req.params).map_err(|e| {
            Response::new_err(
                req.id.clone(),
                ErrorCode::InvalidParams as i32,
                e.to_string(),
            )
        })?;
        Ok(Response::new_ok(req.id, handler(self, params)))
    }

    // ── Notifications ────────────────────────────────────────────────

    fn handle_notification(&mut self, not: Notification) -> Result<()> {
        let now = Instant::now();
        match not.method.as_str() {
            m if m == DidOpenTextDocument::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidOpenTextDocumentParams>(m, not.params)
                else {
                    return Ok(());
                };
                let uri = params.text_document.uri;
                let path = uri_to_path(&uri);
                self.uris.insert(path.clone(), uri);
                let diagnostics = match self.workspace_for(&path) {
                    Some(w) => w.open_in_editor(&path, params.text_document.text, now),
                    None => return Ok(()),
                };
                self.publish(&path, &diagnostics)?;
            }
            m if m == DidChangeTextDocument::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidChangeTextDocumentParams>(m, not.params)
                else {
                    return Ok(());
                };
                let path = uri_to_path(&params.text_document.uri);
                // FULL sync: last content change has the entire document
                let Some(change) = params.content_changes.into_iter().last() else {
                    return Ok(());
                };
                let diagnostics = match self.workspace_for(&path) {
                    Some(w) => w.edit_in_editor(&path, change.text, now),
                    None => return Ok(()),
                };
                self.publish(&path, &diagnostics)?;
            }
            m if m == DidSaveTextDocument::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidSaveTextDocumentParams>(m, not.params)
                else {
                    return Ok(());
                };
                let path = uri_to_path(&params.text_document.uri);
                self.reload_from_disk(&path, now);
            }
            m if m == DidCloseTextDocument::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidCloseTextDocumentParams>(m, not.params)
                else {
                    return Ok(());
                };
                let path = uri_to_path(&params.text_document.uri);
                let remaining = self.workspaces.containing(&path).and_then(|w| {
                    w.close_in_editor(&path, now);
                    w.validate(&path)
                });
                // A forgotten document gets its diagnostics cleared.
                self.publish(&path, &remaining.unwrap_or_default())?;
                self.uris.remove(&path);
            }
            m if m == DidChangeConfiguration::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidChangeConfigurationParams>(m, not.params)
                else {
                    return Ok(());
                };
                match Settings::from_editor_json(&params.settings) {
                    Ok(settings) => {
                        debug!(?settings, "editor settings changed");
                        for workspace in self.workspaces.iter_mut() {
                            workspace.set_settings(settings.clone(), now);
                        }
                        self.editor_settings = Some(settings);
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed editor settings"),
                }
            }
            m if m == DidChangeWatchedFiles::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidChangeWatchedFilesParams>(m, not.params)
                else {
                    return Ok(());
                };
                for event in params.changes {
                    let path = uri_to_path(&event.uri);
                    if !is_tracked(&path) {
                        continue;
                    }
                    if event.typ == FileChangeType::DELETED {
                        let removed = self
                            .workspaces
                            .containing(&path)
                            .is_some_and(|w| w.remove_source(&path, now));
                        if removed && !self.uris.contains_key(&path) {
                            self.publish(&path, &[])?;
                        }
                    } else {
                        self.reload_from_disk(&path, now);
                    }
                }
            }
            m if m == DidChangeWorkspaceFolders::METHOD => {
                let Some(params) =
                    parse_params::<lsp_types::DidChangeWorkspaceFoldersParams>(m, not.params)
                else {
                    return Ok(());
                };
                for folder in params.event.removed {
                    let root = uri_to_path(&folder.uri);
                    if let Some(workspace) = self.workspaces.remove(&root) {
                        for path in workspace.documents() {
                            self.publish(path, &[])?;
                        }
                    }
                }
                for folder in params.event.added {
                    self.add_workspace(uri_to_path(&folder.uri))?;
                }
            }
            _ => {
                // Unknown notification -- ignore
            }
        }
        Ok(())
    }

    /// Feed the disk text of `path` to its workspace.
    fn reload_from_disk(&mut self, path: &Path, now: Instant) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable source");
                return;
            }
        };
        if let Some(workspace) = self.workspaces.containing(path) {
            workspace.add_source(path, text, now);
        }
    }
}
