//! Repository identity: root, repository identifier, upstream branch, and
//! repository-relative paths.
//!
//! Everything here is derived from git state through a [`VcsPort`]; no
//! network I/O happens in this module.

use std::path::{Component, Path, PathBuf};

use crate::config::GitConfig;
use crate::error::{Error, Result};
use crate::output::Console;
use crate::vcs::VcsPort;

/// Repository context for one invocation.
pub struct RepoContext<'a> {
    vcs: &'a dyn VcsPort,
    git: GitConfig,
    cwd: PathBuf,
    console: &'a Console,
}

impl<'a> RepoContext<'a> {
    pub fn new(vcs: &'a dyn VcsPort, git: GitConfig, cwd: PathBuf, console: &'a Console) -> Self {
        let cwd = cwd.canonicalize().unwrap_or(cwd);
        Self {
            vcs,
            git,
            cwd,
            console,
        }
    }

    pub fn vcs(&self) -> &'a dyn VcsPort {
        self.vcs
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Root of the repository containing the working directory.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        self.vcs.discover_root(&self.cwd)
    }

    /// Root of the repository containing `path` (a file or a directory,
    /// existing or not).
    pub fn resolve_root_from_path(&self, path: &Path) -> Result<PathBuf> {
        let mut directory = path;
        while !directory.is_dir() {
            directory = match directory.parent() {
                Some(parent) => parent,
                None => break,
            };
        }

        let root = self.vcs.discover_root(directory)?;
        self.console
            .note(format!("Found git repository {}", root.display()));
        Ok(root)
    }

    /// Repository identifier derived from the configured remote's URL.
    pub fn repository_identifier(&self, root: &Path) -> Result<String> {
        let url = self.vcs.remote_url(root, &self.git.remote)?;
        let identifier = parse_repository_identifier(&url, &self.git.ssh_host)?;
        self.console.note(format!("found root {identifier}"));
        Ok(identifier)
    }

    /// Upstream branch of HEAD with the remote prefix stripped.
    pub fn upstream_branch(&self, root: &Path) -> Result<String> {
        let local_branch = self
            .vcs
            .current_branch(root)?
            .ok_or_else(|| Error::DetachedHead(root.to_path_buf()))?;

        let upstream = self.vcs.upstream_of(root, &local_branch)?;
        let prefix = format!("{}/", self.git.remote);
        let branch = upstream
            .as_deref()
            .and_then(|upstream| upstream.strip_prefix(&prefix))
            .filter(|branch| !branch.is_empty())
            .ok_or_else(|| Error::NoUpstream {
                repo: root.to_path_buf(),
                local_branch: local_branch.clone(),
            })?;

        self.console.note(format!("found branch: {branch}"));
        Ok(branch.to_string())
    }

    /// Configured `user.name`, required to take a lock.
    pub fn full_name(&self, root: &Path) -> Result<String> {
        let name = self
            .vcs
            .user_name(root)?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::MissingIdentity(root.to_path_buf()))?;
        self.console.note(format!("found user.name: {name}"));
        Ok(name)
    }

    /// Lock-enforced subset of `files`.
    pub fn lockable_files(&self, root: &Path, files: &[String]) -> Result<Vec<String>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        self.vcs.lockable(root, files)
    }

    /// Resolve CLI path arguments to absolute file paths.
    ///
    /// Paths that are not files are retried relative to the repository
    /// root, directories are skipped, and with `verify_presence` a missing
    /// file is an error.
    pub fn clean_paths(&self, inputs: &[String], verify_presence: bool) -> Result<Vec<PathBuf>> {
        let mut root: Option<PathBuf> = None;
        let mut cleaned = Vec::with_capacity(inputs.len());

        for input in inputs {
            let raw = Path::new(input);
            let mut path = resolve(&self.cwd.join(raw));

            if !path.is_file() && raw.is_relative() {
                if root.is_none() {
                    root = self.resolve_root().ok();
                }
                if let Some(root) = &root {
                    let joined = resolve(&root.join(raw));
                    if joined.is_file() {
                        path = joined;
                    }
                }
            }

            if path.is_dir() {
                self.console
                    .note(format!("Ignoring directory {}", path.display()));
                continue;
            }

            if verify_presence {
                if !path.is_file() {
                    return Err(Error::FileNotFound(path));
                }
                path = actual_filename(&path);
            }

            cleaned.push(path);
        }

        Ok(cleaned)
    }
}

/// Extract the repository identifier from a remote URL.
///
/// `https://host/group/project.git` and `git@<ssh_host>:group/project.git`
/// both yield `group/project.git`.
pub fn parse_repository_identifier(url: &str, ssh_host: &str) -> Result<String> {
    let url = url.trim();

    if let Some(rest) = url.strip_prefix("https://") {
        let path = match rest.find('/') {
            Some(index) => &rest[index..],
            None => "",
        };
        // Query and fragment are not part of the path.
        let path = path.split(['?', '#']).next().unwrap_or_default();
        return Ok(path.trim_start_matches('/').to_string());
    }

    let ssh_prefix = format!("git@{ssh_host}:");
    if let Some(path) = url.strip_prefix(&ssh_prefix) {
        return Ok(path.to_string());
    }

    Err(Error::UnrecognizedRemote(url.to_string()))
}

/// Path of `path` relative to `root`, with forward slashes.
///
/// Fails with [`Error::PathOutsideRepository`] when the result would start
/// with a parent traversal.
pub fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let relative = relative_to(path, root);
    let relative = to_system_independent(&relative);
    if relative == ".." || relative.starts_with("../") {
        return Err(Error::PathOutsideRepository(path.to_path_buf()));
    }
    Ok(relative)
}

/// Lexical relative path from `base` to `path` (like `os.path.relpath`).
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);

    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}

/// Render a path with `/` separators regardless of platform.
pub fn to_system_independent(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir => Some(".".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonicalize when the path exists, otherwise normalize lexically.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// On case-insensitive filesystems, recover the on-disk spelling of the
/// file name so lock keys match what git tracks.
#[cfg(windows)]
fn actual_filename(path: &Path) -> PathBuf {
    let name = path.to_string_lossy();
    let Some(last) = name.chars().last() else {
        return path.to_path_buf();
    };
    let head = &name[..name.len() - last.len_utf8()];
    let pattern = format!("{}[{}]", glob::Pattern::escape(head), last);

    glob::glob(&pattern)
        .ok()
        .and_then(|mut matches| matches.next())
        .and_then(|found| found.ok())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(not(windows))]
fn actual_filename(path: &Path) -> PathBuf {
    path.to_path_buf()
}
