//! Session token lifecycle.
//!
//! ```text
//! Unset ──load──▶ CachedValid ───────────────────────────▶ authorized
//!                 CachedExpired / probe 401 ──▶ Refreshing ──▶ CachedValid
//! ```
//!
//! The cached record lives in `~/.zuru-soft-lock/user-data`. A record is
//! reused only while it is more than [`EXPIRY_MARGIN_SECS`] away from
//! expiring and the `/get-me` probe accepts it. Otherwise the SSH handshake
//! produces an LFS authorization, `/authenticate` exchanges it for a new
//! record, and the file is replaced wholesale.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::client::LockServiceClient;
use crate::error::{Error, Result};
use crate::lock::TokenFileGuard;
use crate::output::Console;
use crate::signing::SigningPort;

/// Tokens this close to expiry are treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Wait for a concurrent refresh (SSH handshake plus one request) to finish
pub const REFRESH_WAIT: Duration = Duration::from_secs(45);

/// Environment override for the token directory
pub const HOME_ENV: &str = "SOFTLOCK_HOME";

const APP_DIR: &str = ".zuru-soft-lock";
const USER_DATA_FILE: &str = "user-data";

/// Token record issued by `/authenticate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "zsl-authorization")]
    pub authorization: String,

    /// Expiry as a unix timestamp (seconds)
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub exp: i64,

    #[serde(rename = "gitlab-username")]
    pub username: String,

    /// Fields the client does not interpret, kept so the file round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    /// Whether the token is still usable at `now` (unix seconds).
    pub fn is_fresh(&self, now: i64) -> bool {
        now <= self.exp.saturating_sub(EXPIRY_MARGIN_SECS)
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Int(value) => Ok(value),
        Timestamp::Float(value) => Ok(value as i64),
        Timestamp::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// An authorized session. Only [`SessionManager::find_authorization`]
/// creates one, so the username is always backed by a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    authorization: String,
    username: String,
}

impl Session {
    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Lock authority username of the session owner.
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// On-disk location of the session record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$SOFTLOCK_HOME`, or `~/.zuru-soft-lock`.
    pub fn default_location() -> Result<Self> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(dir));
        }

        let dirs = directories::BaseDirs::new().ok_or_else(|| {
            Error::OperationFailed("cannot determine the home directory".to_string())
        })?;
        Ok(Self::new(dirs.home_dir().join(APP_DIR)))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(USER_DATA_FILE)
    }

    /// Exclusive access to the token file for one load/refresh/save cycle.
    pub fn lock(&self, wait: Duration) -> Result<TokenFileGuard> {
        TokenFileGuard::acquire(&self.path(), wait)
    }

    /// Load the cached record. Unreadable or malformed records count as
    /// absent and will be replaced.
    pub fn load(&self) -> Result<Option<SessionRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding malformed session record");
                Ok(None)
            }
        }
    }

    /// Replace the cached record.
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let guard = self.lock(REFRESH_WAIT)?;
        Self::save_locked(&guard, record)
    }

    fn save_locked(guard: &TokenFileGuard, record: &SessionRecord) -> Result<()> {
        guard.replace(&serde_json::to_string_pretty(record)?)
    }
}

/// Resolves an authorized [`Session`], refreshing the cached token when
/// needed.
pub struct SessionManager<'a> {
    store: TokenStore,
    client: &'a LockServiceClient<'a>,
    signer: &'a dyn SigningPort,
    console: &'a Console,
    clock: fn() -> i64,
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

impl<'a> SessionManager<'a> {
    pub fn new(
        store: TokenStore,
        client: &'a LockServiceClient<'a>,
        signer: &'a dyn SigningPort,
        console: &'a Console,
    ) -> Self {
        Self {
            store,
            client,
            signer,
            console,
            clock: unix_now,
        }
    }

    /// Replace the wall clock (unix seconds).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Return an authorized session for `repository`, reusing the cached
    /// token when it is fresh and accepted, otherwise running exactly one
    /// handshake and persisting the new record.
    pub fn find_authorization(&self, repository: &str) -> Result<Session> {
        let guard = self.store.lock(REFRESH_WAIT)?;

        self.console
            .note(format!("Loading {}", self.store.path().display()));
        if let Some(record) = self.store.load()? {
            if let Some(session) = self.validate(&record)? {
                return Ok(session);
            }
        }

        let lfs_authorization = self.signer.lfs_authorization(repository)?;
        let envelope = self
            .client
            .post("/authenticate", &json!({}), &lfs_authorization, false)?;
        let record: SessionRecord = serde_json::from_value(envelope.into_value())
            .map_err(|err| Error::Handshake(format!("unexpected /authenticate reply: {err}")))?;
        TokenStore::save_locked(&guard, &record)?;

        Ok(Session {
            authorization: lfs_authorization,
            username: record.username,
        })
    }

    fn validate(&self, record: &SessionRecord) -> Result<Option<Session>> {
        if !record.is_fresh((self.clock)()) {
            self.console.note("Token is expired");
            return Ok(None);
        }

        match self
            .client
            .post("/get-me", &json!({}), &record.authorization, false)
        {
            Ok(_) => {
                self.console.note("Token is valid");
                Ok(Some(Session {
                    authorization: record.authorization.clone(),
                    username: record.username.clone(),
                }))
            }
            Err(Error::NotAuthorized) => {
                self.console.note("Token is NOT valid");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
