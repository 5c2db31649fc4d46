use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

/// Minimum length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 << 20;
const DEFAULT_JAMENDO_API_URL: &str = "https://api.jamendo.com/v3.0/tracks/";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub jamendo_client_id: Option<String>,
    pub jamendo_api_url: String,
    pub max_upload_bytes: usize,
    pub search_timeout: Duration,
    pub request_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Harmony music player backend")]
pub struct Args {
    /// Host to bind to (overrides HARMONY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides HARMONY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides HARMONY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where uploaded audio is stored (overrides HARMONY_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Secret used to sign session tokens (overrides HARMONY_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Jamendo API client id (overrides HARMONY_JAMENDO_CLIENT_ID)
    #[arg(long)]
    pub jamendo_client_id: Option<String>,

    /// Jamendo tracks endpoint (overrides HARMONY_JAMENDO_API_URL)
    #[arg(long)]
    pub jamendo_api_url: Option<String>,

    /// Maximum accepted upload body size in bytes (overrides HARMONY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values produced by `lookup` (normally the
    /// process environment) over built-in defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let read = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };

        let env_host = read("HARMONY_HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var::<u16>(read("HARMONY_PORT")?, "HARMONY_PORT")?.unwrap_or(8080);
        let env_db = read("HARMONY_DATABASE_URL")?
            .unwrap_or_else(|| "sqlite://./data/harmony.db".into());
        let env_uploads = read("HARMONY_UPLOAD_DIR")?.unwrap_or_else(|| "./uploads".into());
        let env_secret = read("HARMONY_JWT_SECRET")?;
        let env_client_id = read("HARMONY_JAMENDO_CLIENT_ID")?;
        let env_api_url =
            read("HARMONY_JAMENDO_API_URL")?.unwrap_or_else(|| DEFAULT_JAMENDO_API_URL.into());
        let env_max_upload = parse_var::<usize>(
            read("HARMONY_MAX_UPLOAD_BYTES")?,
            "HARMONY_MAX_UPLOAD_BYTES",
        )?
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let search_timeout_secs = parse_var::<u64>(
            read("HARMONY_SEARCH_TIMEOUT_SECS")?,
            "HARMONY_SEARCH_TIMEOUT_SECS",
        )?
        .unwrap_or(15);
        let request_timeout_secs = parse_var::<u64>(
            read("HARMONY_REQUEST_TIMEOUT_SECS")?,
            "HARMONY_REQUEST_TIMEOUT_SECS",
        )?
        .unwrap_or(30);

        let jwt_secret = match args.jwt_secret.or(env_secret) {
            Some(secret) => secret,
            None => bail!("a signing secret is required (--jwt-secret or HARMONY_JWT_SECRET)"),
        };
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!(
                "signing secret must be at least {} bytes long",
                MIN_JWT_SECRET_LEN
            );
        }

        let jamendo_client_id = args
            .jamendo_client_id
            .or(env_client_id)
            .filter(|id| !id.trim().is_empty());

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            upload_dir: args.upload_dir.unwrap_or_else(|| PathBuf::from(env_uploads)),
            jwt_secret,
            jamendo_client_id,
            jamendo_api_url: args.jamendo_api_url.unwrap_or(env_api_url),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            search_timeout: Duration::from_secs(search_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keeps the signing secret and client id out of startup logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("upload_dir", &self.upload_dir)
            .field("jwt_secret", &"<redacted>")
            .field(
                "jamendo_client_id",
                &self.jamendo_client_id.as_ref().map(|_| "<set>"),
            )
            .field("jamendo_api_url", &self.jamendo_api_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("search_timeout", &self.search_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn parse_var<T>(value: Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", key, raw))
        })
        .transpose()
}
