//! Asking before doing something destructive.
//!
//! Commands never prompt directly; they receive a [`Confirm`] so automation
//! (and tests) can answer without a terminal.

use erreur::{Context, Result, UserAborted};
use std::{fs, path::Path};

pub trait Confirm {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Ask on the terminal, defaulting to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct Interactive;

impl Confirm for Interactive {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("read confirmation from terminal")
    }
}

/// Answer "yes" to everything, for `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        log::info!("{} yes (assumed)", prompt.trim_end());
        Ok(true)
    }
}

/// Answer "no" to everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysNo;

impl Confirm for AlwaysNo {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        log::info!("{} no", prompt.trim_end());
        Ok(false)
    }
}

/// Fail with [`UserAborted`] unless the answer is yes.
pub fn ensure_confirmed(confirm: &dyn Confirm, prompt: &str) -> Result<()> {
    if confirm.confirm(prompt)? {
        Ok(())
    } else {
        Err(UserAborted::new(prompt).into())
    }
}

/// Remove `path` recursively after confirmation. Nothing is asked when the
/// path does not exist.
pub fn remove_dir_confirmed(confirm: &dyn Confirm, path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    ensure_confirmed(confirm, &format!("Deleting {}. OK?", path.display()))?;
    fs::remove_dir_all(path).with_context(|| format!("remove `{}`", path.display()))?;
    log::debug!("removed `{}`", path.display());
    Ok(())
}
