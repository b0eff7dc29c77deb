//! Deployment target resolution.
//!
//! A target is the supervisor process name plus the checkout it runs from.
//! It is resolved once, before the orchestrator starts, and never changes.

use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTarget {
    pub name: String,
    pub root: PathBuf,
}

impl DeployTarget {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Derive the target from the deployment root: the process name is the
    /// directory's own name as given, so a symlinked root keeps the link's name.
    /// Only `root` is canonicalized.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let root = canonical_root(dir)?;
        let name = match logical_name(dir) {
            Some(name) => name,
            None => dir_name(&root)?,
        };
        Ok(Self { name, root })
    }

    /// Resolve with an explicit name taking precedence over the directory name.
    pub fn resolve(root: &Path, name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::validation_invalid_argument(
                        "name",
                        "Target name must not be empty",
                        None,
                    ));
                }
                Ok(Self::new(name, canonical_root(root)?))
            }
            None => Self::from_dir(root),
        }
    }
}

/// The directory the operator is in, as their shell sees it.
///
/// `current_dir()` is the physical path; `$PWD` keeps symlinks, so it wins
/// whenever it names the same directory.
pub fn working_dir() -> Result<PathBuf> {
    let physical = std::env::current_dir().map_err(|e| {
        Error::internal_io(e.to_string(), Some("read current directory".to_string()))
    })?;
    Ok(logical_working_dir(
        std::env::var_os("PWD").as_deref(),
        physical,
    ))
}

fn logical_working_dir(pwd: Option<&OsStr>, physical: PathBuf) -> PathBuf {
    let Some(pwd) = pwd.map(Path::new).filter(|p| p.is_absolute()) else {
        return physical;
    };

    match (pwd.canonicalize(), physical.canonicalize()) {
        (Ok(logical), Ok(actual)) if logical == actual => pwd.to_path_buf(),
        _ => physical,
    }
}

/// Last directory name after lexically resolving `.` and `..`.
fn logical_name(dir: &Path) -> Option<String> {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in dir.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => parts.clear(),
        }
    }

    parts
        .last()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("resolve {}", root.display())))
    })?;

    if !root.is_dir() {
        return Err(Error::validation_invalid_argument(
            "dir",
            "Deployment root is not a directory",
            Some(root.display().to_string()),
        ));
    }

    Ok(root)
}

fn dir_name(root: &Path) -> Result<String> {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Error::validation_invalid_argument(
                "dir",
                "Cannot derive a process name from this directory; pass --name",
                Some(root.display().to_string()),
            )
        })
}
