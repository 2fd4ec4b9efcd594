//! Server configuration resolved from defaults, then environment variables, then
//! command-line flags. A value that fails to parse is ignored and the next layer down
//! applies.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 7979;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DB_FOLDER: &str = "dbs";
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;

pub const ENV_HTTP_PORT: &str = "COHORTDB_HTTP_PORT";
pub const ENV_HOST: &str = "COHORTDB_HOST";
pub const ENV_DB_FOLDER: &str = "COHORTDB_DB_FOLDER";
pub const ENV_SESSION_SECRET: &str = "COHORTDB_SESSION_SECRET";
pub const ENV_STORE_TIMEOUT_MS: &str = "COHORTDB_STORE_TIMEOUT_MS";

#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub host: String,
    /// Snapshot root. `None` keeps everything in memory.
    pub db_root: Option<PathBuf>,
    /// HMAC key for session tokens. `None` draws a random key at startup.
    pub session_secret: Option<String>,
    pub store_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            host: DEFAULT_HOST.to_string(),
            db_root: Some(PathBuf::from(DEFAULT_DB_FOLDER)),
            session_secret: None,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

// The secret is never printed.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_port", &self.http_port)
            .field("host", &self.host)
            .field("db_root", &self.db_root)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<set>"))
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl ServerConfig {
    /// Resolve from the process environment and `std::env::args()`.
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(|name| std::env::var(name).ok(), &args)
    }

    pub fn from_sources(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Self {
        let d = ServerConfig::default();

        let env_http = env(ENV_HTTP_PORT).and_then(|v| v.trim().parse::<u16>().ok());
        let arg_http = arg_value(args, "--http-port").and_then(|v| v.parse::<u16>().ok());
        let http_port = arg_http.or(env_http).unwrap_or(d.http_port);

        let env_host = non_empty(env(ENV_HOST));
        let arg_host = non_empty(arg_value(args, "--host").map(str::to_string));
        let host = arg_host.or(env_host).unwrap_or(d.host);

        let db_root = if has_flag(args, "--in-memory") {
            None
        } else {
            let env_root = non_empty(env(ENV_DB_FOLDER));
            let arg_root = non_empty(arg_value(args, "--db-folder").map(str::to_string));
            arg_root.or(env_root).map(PathBuf::from).or(d.db_root)
        };

        let env_timeout = env(ENV_STORE_TIMEOUT_MS).and_then(|v| v.trim().parse::<u64>().ok());
        let arg_timeout = arg_value(args, "--store-timeout-ms").and_then(|v| v.parse::<u64>().ok());
        let store_timeout = arg_timeout
            .or(env_timeout)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(d.store_timeout);

        Self { http_port, host, db_root, session_secret: non_empty(env(ENV_SESSION_SECRET)), store_timeout }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.http_port);
        addr.parse::<SocketAddr>().map_err(|e| anyhow::anyhow!("invalid bind address '{addr}': {e}"))
    }

    pub fn usage() -> String {
        format!(
            "cohortdb server\n\nUSAGE:\n  cohortdb_server [--http-port N] [--host H] [--db-folder PATH | --in-memory] [--store-timeout-ms N]\n\nOPTIONS:\n  --http-port N           HTTP port (env: {ENV_HTTP_PORT}, default {DEFAULT_HTTP_PORT})\n  --host H                Bind address (env: {ENV_HOST}, default {DEFAULT_HOST})\n  --db-folder PATH        Snapshot folder (env: {ENV_DB_FOLDER}, default {DEFAULT_DB_FOLDER})\n  --in-memory             Keep all data in memory, no snapshots\n  --store-timeout-ms N    Per store call timeout (env: {ENV_STORE_TIMEOUT_MS}, default {DEFAULT_STORE_TIMEOUT_MS})\n\nENVIRONMENT:\n  {ENV_SESSION_SECRET}  Session signing secret; a random key is used when unset\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("cohortdb_server").chain(v.iter().copied()).map(String::from).collect()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = ServerConfig::from_sources(env_of(&[]), &args(&[]));
        assert_eq!(c, ServerConfig::default());
        assert_eq!(c.bind_addr().unwrap().port(), 7979);
    }

    #[test]
    fn args_override_env_override_defaults() {
        let env = env_of(&[(ENV_HTTP_PORT, "8000"), (ENV_DB_FOLDER, "/env/db"), (ENV_STORE_TIMEOUT_MS, "250")]);
        let c = ServerConfig::from_sources(&env, &args(&[]));
        assert_eq!(c.http_port, 8000);
        assert_eq!(c.db_root, Some(PathBuf::from("/env/db")));
        assert_eq!(c.store_timeout, Duration::from_millis(250));

        let c = ServerConfig::from_sources(&env, &args(&["--http-port", "9000", "--db-folder", "/arg/db"]));
        assert_eq!(c.http_port, 9000);
        assert_eq!(c.db_root, Some(PathBuf::from("/arg/db")));
    }

    #[test]
    fn bad_values_fall_through() {
        let env = env_of(&[(ENV_HTTP_PORT, "not-a-port"), (ENV_STORE_TIMEOUT_MS, "0")]);
        let c = ServerConfig::from_sources(&env, &args(&["--http-port", "99999"]));
        assert_eq!(c.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(c.store_timeout, Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));
    }

    #[test]
    fn in_memory_and_secret() {
        let env = env_of(&[(ENV_DB_FOLDER, "/env/db"), (ENV_SESSION_SECRET, "s3cret")]);
        let c = ServerConfig::from_sources(&env, &args(&["--in-memory"]));
        assert_eq!(c.db_root, None);
        assert_eq!(c.session_secret.as_deref(), Some("s3cret"));
        assert!(!format!("{c:?}").contains("s3cret"));
    }

    #[test]
    fn bad_host_is_an_error() {
        let c = ServerConfig::from_sources(env_of(&[]), &args(&["--host", "not a host"]));
        assert!(c.bind_addr().is_err());
    }
}
