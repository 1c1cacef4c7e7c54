//! File capabilities confined to a workspace directory.
//!
//! Paths are relative to the workspace root. Absolute paths and `..`
//! components are rejected before touching the filesystem.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{
    Arguments, Capability, CapabilityRegistry, FailureCategory, FailureDescriptor, ParamSpec,
    ParamType,
};

/// Sandbox root shared by the file capabilities.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a relative path into the workspace.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FailureDescriptor> {
        let relative = Path::new(path.trim());
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FailureDescriptor::new(
                        FailureCategory::InvalidArguments,
                        format!("path '{path}' escapes the workspace"),
                    ));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

fn io_failure(action: &str, path: &str, err: std::io::Error) -> FailureDescriptor {
    let category = if err.kind() == ErrorKind::NotFound {
        FailureCategory::NotFound
    } else {
        FailureCategory::Io
    };
    FailureDescriptor::new(category, format!("{action} '{path}': {err}"))
}

fn string_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, FailureDescriptor> {
    args.get(name).and_then(Value::as_str).ok_or_else(|| {
        FailureDescriptor::new(
            FailureCategory::InvalidArguments,
            format!("argument '{name}' must be a string"),
        )
    })
}

const PATH_ONLY: &[ParamSpec] = &[ParamSpec::new(
    "path",
    ParamType::String,
    "Path relative to the workspace.",
)];

const PATH_AND_CONTENT: &[ParamSpec] = &[
    ParamSpec::new("path", ParamType::String, "Path relative to the workspace."),
    ParamSpec::new("content", ParamType::String, "Text to write."),
];

/// Read a UTF-8 text file.
#[derive(Debug, Clone)]
pub struct ReadFile {
    workspace: Workspace,
}

impl Capability for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file from the workspace and returns its contents."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PATH_ONLY
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let path = string_arg(args, "path")?;
        let resolved = self.workspace.resolve(path)?;
        fs::read_to_string(&resolved).map_err(|err| io_failure("read", path, err))
    }
}

/// Create or truncate a file.
#[derive(Debug, Clone)]
pub struct WriteFile {
    workspace: Workspace,
}

impl Capability for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes text to a file in the workspace, replacing any existing content."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PATH_AND_CONTENT
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let path = string_arg(args, "path")?;
        let content = string_arg(args, "content")?;
        let resolved = self.workspace.resolve(path)?;
        ensure_parent(&resolved, path)?;
        fs::write(&resolved, content).map_err(|err| io_failure("write", path, err))?;
        debug!(path = %resolved.display(), bytes = content.len(), "wrote file");
        Ok(format!("Wrote {} bytes to {path}", content.len()))
    }
}

/// Append to a file, creating it if needed.
#[derive(Debug, Clone)]
pub struct AppendFile {
    workspace: Workspace,
}

impl Capability for AppendFile {
    fn name(&self) -> &str {
        "append_file"
    }

    fn description(&self) -> &str {
        "Appends text to a file in the workspace, creating the file if it does not exist."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PATH_AND_CONTENT
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let path = string_arg(args, "path")?;
        let content = string_arg(args, "content")?;
        let resolved = self.workspace.resolve(path)?;
        ensure_parent(&resolved, path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .map_err(|err| io_failure("open", path, err))?;
        file.write_all(content.as_bytes())
            .map_err(|err| io_failure("append", path, err))?;
        Ok(format!("Appended {} bytes to {path}", content.len()))
    }
}

/// List directory entries, sorted, with a trailing `/` on directories.
#[derive(Debug, Clone)]
pub struct ListFiles {
    workspace: Workspace,
}

impl Capability for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Lists the entries of a workspace directory. Use \".\" for the workspace root."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PATH_ONLY
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let path = string_arg(args, "path")?;
        let resolved = self.workspace.resolve(path)?;
        let entries = fs::read_dir(&resolved).map_err(|err| io_failure("list", path, err))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_failure("list", path, err))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        if names.is_empty() {
            return Ok(format!("{path} is empty"));
        }
        Ok(names.join("\n"))
    }
}

fn ensure_parent(resolved: &Path, path: &str) -> Result<(), FailureDescriptor> {
    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).map_err(|err| io_failure("create directory for", path, err))?;
    }
    Ok(())
}

/// Register the four file capabilities rooted at `root`.
pub fn register_all(registry: &mut CapabilityRegistry, root: &Path) {
    let workspace = Workspace::new(root);
    registry.register(ReadFile {
        workspace: workspace.clone(),
    });
    registry.register(WriteFile {
        workspace: workspace.clone(),
    });
    registry.register(AppendFile {
        workspace: workspace.clone(),
    });
    registry.register(ListFiles { workspace });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(root: &Path) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        register_all(&mut registry, root);
        registry
    }

    fn call(registry: &CapabilityRegistry, name: &str, args: Value) -> Result<String, FailureDescriptor> {
        registry
            .get(name)
            .expect("capability")
            .invoke(args.as_object().expect("object"))
    }

    #[test]
    fn write_append_read_and_list() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = registry(temp.path());

        call(&registry, "write_file", json!({"path": "notes/a.txt", "content": "hello"}))
            .expect("write");
        call(&registry, "append_file", json!({"path": "notes/a.txt", "content": " world"}))
            .expect("append");

        let body = call(&registry, "read_file", json!({"path": "notes/a.txt"})).expect("read");
        assert_eq!(body, "hello world");

        fs::create_dir_all(temp.path().join("notes/sub")).expect("mkdir");
        let listing = call(&registry, "list_files", json!({"path": "notes"})).expect("list");
        assert_eq!(listing, "a.txt\nsub/");
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = call(&registry(temp.path()), "read_file", json!({"path": "nope.txt"}))
            .unwrap_err();
        assert_eq!(err.category, FailureCategory::NotFound);
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = registry(temp.path());
        for path in ["../secret", "/etc/passwd", "a/../../b"] {
            let err = call(&registry, "read_file", json!({ "path": path })).unwrap_err();
            assert_eq!(err.category, FailureCategory::InvalidArguments, "{path}");
        }
    }
}
