//! Load command implementation.

use super::{finish, loopback, CliResult};
use docsync_server::ServerConfig;
use serde::Serialize;
use std::path::Path;

/// Load result.
#[derive(Debug, Serialize)]
pub struct LoadResult {
    /// Resource id.
    pub resource: String,
    /// State id issued by the server.
    pub state_id: Option<String>,
    /// Document length in bytes.
    pub length: usize,
    /// Number of lines.
    pub lines: usize,
    /// Whether the server reported unsaved changes.
    pub dirty: bool,
}

/// Loads the document and describes it.
pub fn execute(path: &Path) -> CliResult<LoadResult> {
    let workspace = loopback::open(path, ServerConfig::default(), false)?;
    let response = finish(workspace.session.load(None))?;
    Ok(LoadResult {
        resource: workspace.resource,
        state_id: response.state_id.map(|id| id.as_str().to_string()),
        length: response.full_text.len(),
        lines: response.full_text.lines().count(),
        dirty: response.dirty,
    })
}

/// Runs the load command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let result = execute(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Resource: {}", result.resource);
            println!("State:    {}", result.state_id.as_deref().unwrap_or("-"));
            println!("Length:   {} bytes, {} lines", result.length, result.lines);
            println!("Dirty:    {}", result.dirty);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_describes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.sm");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "state idle").unwrap();
        writeln!(file, "end").unwrap();

        let result = execute(&path).unwrap();
        assert_eq!(result.resource, "machine.sm");
        assert_eq!(result.length, 15);
        assert_eq!(result.lines, 2);
        assert!(!result.dirty);
        assert!(result.state_id.is_some());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            execute(&dir.path().join("absent.sm")),
            Err(super::super::CliError::Io(_))
        ));
    }
}
