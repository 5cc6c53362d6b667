//! R2 credentials and the layered settings loader.
//!
//! Each setting is resolved independently, first match wins:
//!
//! 1. an explicit override on the [`CredentialsLoader`];
//! 2. the process environment;
//! 3. the `.env` settings file;
//! 4. the built-in default.

use std::collections::BTreeMap;
use std::env::VarError;
use std::path::{Path, PathBuf};

use start_sdk_r2_models::{
    ACCESS_KEY_ID_VAR, ACCOUNT_ID_VAR, DEFAULT_ACCESS_KEY_ID, DEFAULT_ACCOUNT_ID,
    DEFAULT_ENV_FILE, DEFAULT_REGION, DEFAULT_SECRET_ACCESS_KEY, ENDPOINT_DOMAIN, REGION_VAR,
    SECRET_ACCESS_KEY_VAR,
};

use crate::{BucketRef, R2Client, R2Error};

/// Account id, location hint and API token pair for one Cloudflare account.
///
/// Fields are validated on construction and never change afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Credentials {
    account_id: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
}

impl R2Credentials {
    /// Builds credentials from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::InvalidConfig`] if any value is empty or contains
    /// whitespace, or if the account id is not a valid DNS label.
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, R2Error> {
        Ok(Self {
            account_id: validate_account_id(account_id.into())?,
            region: validate_value("region", region.into())?,
            access_key_id: validate_value("access key id", access_key_id.into())?,
            secret_access_key: validate_value("secret access key", secret_access_key.into())?,
        })
    }

    /// Loads credentials from the process environment, falling back to a
    /// `.env` file in the working directory and then to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::EnvFile`] if `.env` exists but cannot be parsed,
    /// or [`R2Error::InvalidConfig`] if a resolved value is invalid.
    pub fn from_env() -> Result<Self, R2Error> {
        CredentialsLoader::new().load()
    }

    /// Cloudflare account id.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// R2 location hint, also used as the signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Access key id of the R2 API token.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key of the R2 API token.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// `https://{account_id}.r2.cloudflarestorage.com`
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.{ENDPOINT_DOMAIN}", self.account_id)
    }

    /// Builds a client for this account. No request is sent until the first
    /// transfer.
    #[must_use]
    pub fn client(&self) -> R2Client {
        R2Client::new(self)
    }

    /// Raw `aws-sdk-s3` client configured for this account, for operations
    /// this crate does not wrap.
    #[must_use]
    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        crate::client::build_s3_client(self)
    }

    /// Resolves `name` to a bucket reference on a fresh client. The bucket
    /// is not checked for existence.
    #[must_use]
    pub fn resolve_bucket(&self, name: impl Into<String>) -> BucketRef {
        self.client().resolve_bucket(name)
    }
}

impl Default for R2Credentials {
    fn default() -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            region: DEFAULT_REGION.to_string(),
            access_key_id: DEFAULT_ACCESS_KEY_ID.to_string(),
            secret_access_key: DEFAULT_SECRET_ACCESS_KEY.to_string(),
        }
    }
}

// Only the region is safe to print.
impl std::fmt::Debug for R2Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Credentials")
            .field("account_id", &"<redacted>")
            .field("region", &self.region)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Result<String, VarError> + Send + Sync>;

/// Resolves [`R2Credentials`] from overrides, environment, settings file and
/// defaults.
///
/// ```no_run
/// use start_sdk_r2::CredentialsLoader;
///
/// let credentials = CredentialsLoader::new()
///     .env_file("config/r2.env")
///     .region("weur")
///     .load()?;
/// # Ok::<(), start_sdk_r2::R2Error>(())
/// ```
pub struct CredentialsLoader {
    env_file: Option<PathBuf>,
    lookup: EnvLookup,
    account_id: Option<String>,
    region: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

impl CredentialsLoader {
    /// Loader reading the process environment and `.env`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            lookup: Box::new(|name| std::env::var(name)),
            account_id: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Reads fallback values from `path` instead of `.env`. A missing file
    /// is treated as empty.
    #[must_use]
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Skips the settings file entirely.
    #[must_use]
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Replaces the process environment with `lookup`.
    #[must_use]
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Box::new(move |name| lookup(name).ok_or(VarError::NotPresent));
        self
    }

    /// Overrides the account id.
    #[must_use]
    pub fn account_id(mut self, value: impl Into<String>) -> Self {
        self.account_id = Some(value.into());
        self
    }

    /// Overrides the location hint.
    #[must_use]
    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    /// Overrides the access key id.
    #[must_use]
    pub fn access_key_id(mut self, value: impl Into<String>) -> Self {
        self.access_key_id = Some(value.into());
        self
    }

    /// Overrides the secret access key.
    #[must_use]
    pub fn secret_access_key(mut self, value: impl Into<String>) -> Self {
        self.secret_access_key = Some(value.into());
        self
    }

    /// Resolves every setting and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::EnvFile`] if the settings file exists but cannot be
    /// parsed, or [`R2Error::InvalidConfig`] if a resolved value is invalid
    /// or an environment variable that is consulted is not valid UTF-8.
    pub fn load(self) -> Result<R2Credentials, R2Error> {
        let file = match &self.env_file {
            Some(path) => read_env_file(path)?,
            None => BTreeMap::new(),
        };

        let resolve = |explicit: Option<String>,
                       field: &'static str,
                       var: &str,
                       default: &str|
         -> Result<String, R2Error> {
            if let Some(value) = explicit {
                return Ok(value);
            }
            match (self.lookup)(var) {
                Ok(value) => return Ok(value),
                // Unreadable values must not fall through to the file or default.
                Err(VarError::NotUnicode(_)) => {
                    return Err(R2Error::InvalidConfig {
                        field,
                        reason: format!("{var} is not valid UTF-8"),
                    });
                }
                Err(VarError::NotPresent) => {}
            }
            Ok(file
                .get(var)
                .cloned()
                .unwrap_or_else(|| default.to_string()))
        };

        let account_id = resolve(
            self.account_id.clone(),
            "account id",
            ACCOUNT_ID_VAR,
            DEFAULT_ACCOUNT_ID,
        )?;
        let region = resolve(self.region.clone(), "region", REGION_VAR, DEFAULT_REGION)?;
        let access_key_id = resolve(
            self.access_key_id.clone(),
            "access key id",
            ACCESS_KEY_ID_VAR,
            DEFAULT_ACCESS_KEY_ID,
        )?;
        let secret_access_key = resolve(
            self.secret_access_key.clone(),
            "secret access key",
            SECRET_ACCESS_KEY_VAR,
            DEFAULT_SECRET_ACCESS_KEY,
        )?;

        let credentials = R2Credentials::new(account_id, region, access_key_id, secret_access_key)?;
        log::debug!("Loaded R2 credentials: {credentials:?}");
        Ok(credentials)
    }
}

impl Default for CredentialsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialsLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsLoader")
            .field("env_file", &self.env_file)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Parses a `.env` file into a map without touching the process
/// environment. A missing file yields an empty map.
fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, R2Error> {
    let to_error = |source| R2Error::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            log::debug!("No settings file at {}", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(to_error(e)),
    };

    iter.map(|item| item.map_err(to_error)).collect()
}

fn validate_value(field: &'static str, value: String) -> Result<String, R2Error> {
    if value.is_empty() {
        return Err(R2Error::InvalidConfig {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(R2Error::InvalidConfig {
            field,
            reason: "must not contain whitespace".to_string(),
        });
    }
    Ok(value)
}

/// The account id becomes the first label of the endpoint host name.
fn validate_account_id(value: String) -> Result<String, R2Error> {
    let value = validate_value("account id", value)?;
    let valid_label = value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value.len() <= 63;
    if !valid_label {
        return Err(R2Error::InvalidConfig {
            field: "account id",
            reason: format!("{value:?} is not a valid host name label"),
        });
    }
    Ok(value)
}
