#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use git2::{BranchType, IndexAddOption, Oid, Repository, Signature};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const REMOTE_URL: &str = "git@gitlab.com:studio/game.git";
pub const REPOSITORY: &str = "studio/game.git";

pub struct TestRepo {
    dir: TempDir,
    home: TempDir,
    repo: Repository,
}

impl TestRepo {
    /// Repository with an identity, an `origin` remote, `*.uasset` marked
    /// lockable, and one commit.
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let home = tempfile::tempdir()?;
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        repo.remote("origin", REMOTE_URL)?;

        let test_repo = Self { dir, home, repo };
        test_repo.write_file(".gitattributes", "*.uasset lockable\n*.umap lockable\n")?;
        test_repo.write_file("README.md", "game\n")?;
        test_repo.commit_all("initial")?;
        Ok(test_repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("Test Artist", "artist@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());

        match parent {
            Some(parent) => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]),
            None => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[]),
        }
    }

    pub fn stage_path(&self, rel_path: &str) -> Result<(), git2::Error> {
        let mut index = self.repo.index()?;
        index.add_path(Path::new(rel_path))?;
        index.write()?;
        Ok(())
    }

    pub fn head_oid(&self) -> Result<Oid, git2::Error> {
        self.repo.head()?.peel_to_commit().map(|commit| commit.id())
    }

    pub fn current_branch(&self) -> Result<String, git2::Error> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("master").to_string())
    }

    /// Point the current branch at `origin/<branch>`.
    pub fn track_origin(&self) -> Result<String, git2::Error> {
        let branch = self.current_branch()?;
        let oid = self.head_oid()?;
        self.repo.reference(
            &format!("refs/remotes/origin/{branch}"),
            oid,
            true,
            "test upstream",
        )?;
        let mut local = self.repo.find_branch(&branch, BranchType::Local)?;
        local.set_upstream(Some(&format!("origin/{branch}")))?;
        Ok(branch)
    }

    pub fn detach_head(&self) -> Result<(), git2::Error> {
        let oid = self.head_oid()?;
        self.repo.set_head_detached(oid)
    }

    /// Mark an interactive rebase as in progress.
    pub fn start_rebase(&self) -> Result<(), Box<dyn std::error::Error>> {
        let oid = self.head_oid()?;
        fs::write(self.repo.path().join("REBASE_HEAD"), format!("{oid}\n"))?;
        Ok(())
    }

    /// Route the client to a local lock authority over plain HTTP.
    pub fn use_authority(&self, authority: &FakeAuthority) -> std::io::Result<PathBuf> {
        self.write_file(
            ".softlock.toml",
            &format!(
                "[server]\nhost = \"127.0.0.1\"\nport = {}\nuse_https = false\ntimeout_secs = 5\n",
                authority.port()
            ),
        )
    }

    /// Cache a long-lived session so no SSH handshake is needed.
    pub fn save_session(&self, username: &str) -> std::io::Result<()> {
        let record = json!({
            "zsl-authorization": "zsl-test-token",
            "exp": 4_000_000_000_i64,
            "gitlab-username": username,
        });
        fs::write(self.home.path().join("user-data"), record.to_string())
    }

    /// `softlock` running inside the repository with an isolated token home.
    pub fn softlock(&self) -> Command {
        let mut cmd = Command::cargo_bin("softlock").expect("binary");
        cmd.current_dir(self.path())
            .env("SOFTLOCK_HOME", self.home.path())
            .env("NO_PROXY", "127.0.0.1")
            .env_remove("SOFTLOCK_REPO")
            .env_remove("ZURU_PIPELINE_SECRET")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "Test Artist")?;
    cfg.set_str("user.email", "artist@example.com")?;
    Ok(())
}

/// One request received by [`FakeAuthority`].
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Minimal HTTP lock authority answering scripted JSON per route.
pub struct FakeAuthority {
    port: u16,
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeAuthority {
    pub fn start(routes: &[(&str, u16, Value)]) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let received = Arc::new(Mutex::new(Vec::new()));

        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
            .collect();
        let log = Arc::clone(&received);

        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                if let Some(request) = read_request(&stream) {
                    let (status, body) = routes
                        .get(&request.path)
                        .cloned()
                        .unwrap_or((404, "not found".to_string()));
                    log.lock().expect("request log").push(request);
                    let _ = write_response(stream, status, &body);
                }
            }
        });

        Ok(Self { port, received })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().expect("request log").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.received().into_iter().map(|r| r.path).collect()
    }
}

fn read_request(stream: &TcpStream) -> Option<Received> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().ok()?,
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    Some(Received {
        path,
        authorization,
        body,
    })
}

fn write_response(mut stream: TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        _ => "Error",
    };
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}
