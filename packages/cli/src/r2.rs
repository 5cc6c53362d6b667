//! Interactive menu for one-off R2 transfers.
//!
//! Prompts for direction, bucket and paths, then runs a single upload or
//! download with the credentials resolved from flags, environment and
//! settings file.

use std::path::PathBuf;
use std::time::Instant;

use dialoguer::{Input, Select};
use start_sdk_cli_utils::MultiProgress;
use start_sdk_r2::{R2Bucket, UploadOptions};

use crate::SettingsArgs;

/// Which way the file moves.
enum Direction {
    Upload,
    Download,
}

impl Direction {
    const ALL: &[Self] = &[Self::Upload, Self::Download];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Upload => "Upload to R2 (push)",
            Self::Download => "Download from R2 (pull)",
        }
    }
}

/// Runs the interactive transfer menu.
///
/// Handles invalid R2 settings gracefully by logging what is wrong and
/// returning without a transfer.
///
/// # Errors
///
/// Returns an error if a prompt fails or the transfer fails.
pub async fn run(
    multi: &MultiProgress,
    settings: &SettingsArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = match settings.load() {
        Ok(credentials) => credentials,
        Err(e) => {
            log::error!("R2 not configured: {e}");
            log::error!(
                "Settings: CF_R2_ACCT_ID, CF_R2_REGION, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY"
            );
            return Ok(());
        }
    };

    println!("R2 endpoint: {}", credentials.endpoint_url());
    println!();

    let labels: Vec<&str> = Direction::ALL.iter().map(Direction::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let direction = &Direction::ALL[idx];

    let bucket_name: String = Input::new().with_prompt("Bucket").interact_text()?;
    let bucket = R2Bucket::new(credentials, bucket_name)?;

    let start = Instant::now();
    let result = match direction {
        Direction::Upload => {
            let local: String = Input::new().with_prompt("Local file").interact_text()?;
            let local = PathBuf::from(local);
            let default_key = local
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let remote: String = Input::new()
                .with_prompt("Object key")
                .default(default_key)
                .interact_text()?;
            let content_type: String = Input::new()
                .with_prompt("Content-Type (blank for none)")
                .allow_empty(true)
                .interact_text()?;

            let mut options = UploadOptions::default();
            if !content_type.is_empty() {
                options = options.with_content_type(content_type);
            }

            let message = format!("Uploading {}", local.display());
            crate::transfer(multi, &message, bucket.upload(&local, &remote, &options)).await?
        }
        Direction::Download => {
            let remote: String = Input::new().with_prompt("Object key").interact_text()?;
            let default_local = remote.rsplit('/').next().unwrap_or(&remote).to_string();
            let local: String = Input::new()
                .with_prompt("Save as")
                .default(default_local)
                .interact_text()?;

            let message = format!("Downloading {remote}");
            crate::transfer(multi, &message, bucket.download(&remote, &local)).await?
        }
    };

    log::info!(
        "Transfer complete: {result} in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
