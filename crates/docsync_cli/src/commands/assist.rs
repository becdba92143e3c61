//! Assist command implementation.

use super::{finish, loopback, CliError, CliResult};
use docsync_engine::{AssistParams, EditorContext, Proposal};
use docsync_server::ServerConfig;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Options of the assist command.
#[derive(Debug, Clone, Default)]
pub struct AssistOptions {
    /// Caret offset in the file as stored.
    pub offset: usize,
    /// Text typed at the caret before asking for proposals.
    pub insert: Option<String>,
    /// Keywords replacing the server defaults.
    pub keywords: Vec<String>,
    /// Send the full text instead of a delta.
    pub full_text: bool,
}

/// Assist result.
#[derive(Debug, Serialize)]
pub struct AssistResult {
    /// Resource id.
    pub resource: String,
    /// Caret offset the proposals were computed for.
    pub caret: usize,
    /// Server state after the request.
    pub state_id: Option<String>,
    /// Proposals.
    pub proposals: Vec<Proposal>,
}

/// Loads the document, applies the typed text and asks for proposals.
pub fn execute(path: &Path, options: &AssistOptions) -> CliResult<AssistResult> {
    let mut server_config = ServerConfig::default();
    if !options.keywords.is_empty() {
        server_config = server_config.with_keywords(options.keywords.iter().cloned());
    }
    let workspace = loopback::open(path, server_config, options.full_text)?;
    finish(workspace.session.load(None))?;

    let text = workspace.ctx.text();
    if options.offset > text.len() || !text.is_char_boundary(options.offset) {
        return Err(CliError::InvalidOffset {
            offset: options.offset,
            len: text.len(),
        });
    }

    let mut caret = options.offset;
    if let Some(ref insert) = options.insert {
        let mut edited = String::with_capacity(text.len() + insert.len());
        edited.push_str(&text[..caret]);
        edited.push_str(insert);
        edited.push_str(&text[caret..]);
        workspace.ctx.edit(&edited);
        caret += insert.len();
        debug!(inserted = insert.len(), caret, "applied edit");
    }

    let proposals = finish(workspace.session.content_assist(AssistParams::at(caret)))?;
    Ok(AssistResult {
        resource: workspace.resource,
        caret,
        state_id: workspace
            .ctx
            .server_state()
            .state_id
            .map(|id| id.as_str().to_string()),
        proposals,
    })
}

/// Runs the assist command.
pub fn run(path: &Path, options: &AssistOptions, format: &str) -> CliResult<()> {
    let result = execute(path, options)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &AssistResult) {
    println!(
        "{} @ {} (state {})",
        result.resource,
        result.caret,
        result.state_id.as_deref().unwrap_or("-")
    );
    if result.proposals.is_empty() {
        println!("  no proposals");
        return;
    }
    for proposal in &result.proposals {
        println!(
            "  {:<24} {}",
            proposal.proposal,
            proposal.description.as_deref().unwrap_or("")
        );
    }
}
