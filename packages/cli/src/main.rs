#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for Cloudflare R2 buckets.
//!
//! Without a subcommand, prompts interactively for the transfer to run (see
//! [`r2::run`]). Credentials come from the flags, then the environment, then
//! the settings file (`.env` unless `--env-file` says otherwise).
//!
//! Uses `indicatif-log-bridge` (via [`start_sdk_cli_utils::init_logger`])
//! so log lines and transfer spinners never fight for the terminal.

mod r2;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use start_sdk_cli_utils::{MultiProgress, transfer_spinner};
use start_sdk_r2::{CredentialsLoader, R2Bucket, R2Credentials, TransferResult, UploadOptions};

#[derive(Parser)]
#[command(
    name = "start_sdk",
    about = "Upload and download files in Cloudflare R2 buckets",
    version
)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Credential overrides, applied on top of the environment and settings file.
#[derive(Args)]
struct SettingsArgs {
    /// Settings file to read fallback values from
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
    /// Cloudflare account ID (overrides `CF_R2_ACCT_ID`)
    #[arg(long, global = true)]
    account_id: Option<String>,
    /// R2 location hint (overrides `CF_R2_REGION`)
    #[arg(long, global = true)]
    region: Option<String>,
    /// Access key ID of the R2 API token (overrides `AWS_ACCESS_KEY_ID`)
    #[arg(long, global = true)]
    access_key_id: Option<String>,
    /// Secret of the R2 API token (overrides `AWS_SECRET_ACCESS_KEY`)
    #[arg(long, global = true)]
    secret_access_key: Option<String>,
}

impl SettingsArgs {
    fn load(&self) -> Result<R2Credentials, start_sdk_r2::R2Error> {
        let mut loader = CredentialsLoader::new().env_file(&self.env_file);
        if let Some(value) = &self.account_id {
            loader = loader.account_id(value);
        }
        if let Some(value) = &self.region {
            loader = loader.region(value);
        }
        if let Some(value) = &self.access_key_id {
            loader = loader.access_key_id(value);
        }
        if let Some(value) = &self.secret_access_key {
            loader = loader.secret_access_key(value);
        }
        loader.load()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the R2 endpoint URL for the configured account
    Endpoint,
    /// Print the resolved settings (secrets redacted)
    Config,
    /// Upload a local file to a bucket
    Upload {
        /// Local file to upload
        local: PathBuf,
        /// Object key inside the bucket
        remote: String,
        /// Bucket name
        #[arg(long)]
        bucket: String,
        #[command(flatten)]
        options: UploadArgs,
        /// Print the transfer result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download an object from a bucket to a local file
    Download {
        /// Object key inside the bucket
        remote: String,
        /// Where to write the downloaded file
        local: PathBuf,
        /// Bucket name
        #[arg(long)]
        bucket: String,
        /// Print the transfer result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Per-upload options, passed through to R2 unchanged.
#[derive(Args, Default)]
struct UploadArgs {
    /// `Content-Type` of the object
    #[arg(long)]
    content_type: Option<String>,
    /// `Cache-Control` of the object
    #[arg(long)]
    cache_control: Option<String>,
    /// `Content-Disposition` of the object
    #[arg(long)]
    content_disposition: Option<String>,
    /// `Content-Encoding` of the object
    #[arg(long)]
    content_encoding: Option<String>,
    /// `Content-Language` of the object
    #[arg(long)]
    content_language: Option<String>,
    /// Storage class (`STANDARD` or `STANDARD_IA`)
    #[arg(long)]
    storage_class: Option<String>,
    /// User metadata entry as `key=value` (repeatable)
    #[arg(long = "metadata", value_parser = parse_key_val)]
    metadata: Vec<(String, String)>,
}

impl From<UploadArgs> for UploadOptions {
    fn from(args: UploadArgs) -> Self {
        Self {
            content_type: args.content_type,
            cache_control: args.cache_control,
            content_disposition: args.content_disposition,
            content_encoding: args.content_encoding,
            content_language: args.content_language,
            storage_class: args.storage_class,
            metadata: args.metadata.into_iter().collect(),
        }
    }
}

/// Parses a `key=value` pair. The value may itself contain `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = start_sdk_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return r2::run(&multi, &cli.settings).await;
    };

    match command {
        Commands::Endpoint => {
            println!("{}", cli.settings.load()?.endpoint_url());
        }
        Commands::Config => {
            println!("{:#?}", cli.settings.load()?);
        }
        Commands::Upload {
            local,
            remote,
            bucket,
            options,
            json,
        } => {
            let bucket = R2Bucket::new(cli.settings.load()?, bucket)?;
            let options = UploadOptions::from(options);
            let result = transfer(&multi, &format!("Uploading {}", local.display()), async {
                bucket.upload(&local, &remote, &options).await
            })
            .await?;
            print_result(&result, json)?;
        }
        Commands::Download {
            remote,
            local,
            bucket,
            json,
        } => {
            let bucket = R2Bucket::new(cli.settings.load()?, bucket)?;
            let result = transfer(&multi, &format!("Downloading {remote}"), async {
                bucket.download(&remote, &local).await
            })
            .await?;
            print_result(&result, json)?;
        }
    }

    Ok(())
}

/// Runs one transfer behind a spinner.
async fn transfer<F>(
    multi: &MultiProgress,
    message: &str,
    fut: F,
) -> Result<TransferResult, start_sdk_r2::R2Error>
where
    F: std::future::Future<Output = Result<TransferResult, start_sdk_r2::R2Error>>,
{
    let spinner = transfer_spinner(multi, message);
    let result = fut.await;
    match &result {
        Ok(_) => spinner.finish_and_clear(),
        Err(e) => spinner.abandon_with_message(format!("{message}: failed ({e})")),
    }
    result
}

fn print_result(result: &TransferResult, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{result}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_key_val("owner=data-team").unwrap(),
            ("owner".to_string(), "data-team".to_string())
        );
        assert_eq!(
            parse_key_val("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("no-separator").is_err());
        assert!(parse_key_val("=value").is_err());
    }

    #[test]
    fn upload_flags_become_options() {
        let cli = Cli::try_parse_from([
            "start_sdk",
            "upload",
            "report.pdf",
            "2024/report.pdf",
            "--bucket",
            "reports",
            "--content-type",
            "application/pdf",
            "--metadata",
            "owner=ops",
            "--metadata",
            "rev=3",
        ])
        .unwrap();

        let Some(Commands::Upload {
            bucket, options, ..
        }) = cli.command
        else {
            panic!("expected upload command");
        };
        assert_eq!(bucket, "reports");

        let options = UploadOptions::from(options);
        assert_eq!(options.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(options.metadata.len(), 2);
        assert_eq!(options.metadata["rev"], "3");
        assert!(options.cache_control.is_none());
    }

    #[test]
    fn settings_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "start_sdk",
            "--env-file",
            "/nonexistent/start_sdk.env",
            "--account-id",
            "cli-account",
            "--region",
            "weur",
            "endpoint",
        ])
        .unwrap();

        let credentials = cli.settings.load().unwrap();
        assert_eq!(credentials.account_id(), "cli-account");
        assert_eq!(credentials.region(), "weur");
        assert_eq!(
            credentials.endpoint_url(),
            "https://cli-account.r2.cloudflarestorage.com"
        );
    }
}
