//! OpenStack-Ansible release numbers.

use crate::{config::Config, yaml};
use erreur::{bail, ensure, Context, Result};
use std::path::{Path, PathBuf};

/// Files that may carry `openstack_release`, newest layout first.
const RELEASE_VARS_FILES: &[&str] = &[
    "group_vars/all/all.yml",
    "playbooks/inventory/group_vars/all.yml",
];

/// Increment the last component: `16.0.9` → `16.0.10`.
///
/// `None` when the last component is not a number (`master`, `16.0.0rc1`).
pub fn next_patch_version(current: &str) -> Option<String> {
    let (head, last) = match current.rfind('.') {
        Some(idx) => (&current[..=idx], &current[idx + 1..]),
        None => ("", current),
    };
    let next = last.parse::<u64>().ok()?.checked_add(1)?;
    Some(format!("{}{}", head, next))
}

/// A version checked against the series it is released for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    pub version: String,
    pub major: u64,
    pub pre_release: bool,
}

impl ReleaseVersion {
    /// Accept `version` for `codename` when its major number is the series'.
    ///
    /// Pre-releases (`16.0.0.0rc1`) only need a numeric first component; full
    /// releases must be valid semver.
    pub fn validate(version: &str, codename: &str, config: &Config) -> Result<Self> {
        let expected = match config.major_for(codename) {
            Some(major) => major,
            None => bail!("Invalid branch name {}", codename),
        };

        let pre_release = config
            .pre_release_suffixes
            .iter()
            .any(|suffix| version.ends_with(suffix.as_str()));

        let major = if pre_release {
            let first = version.split('.').next().unwrap_or_default();
            first
                .parse::<u64>()
                .with_context(|| format!("`{}` does not start with a major number", version))?
        } else {
            semver::Version::parse(version)
                .with_context(|| format!("`{}` is not a semantic version", version))?
                .major
        };

        ensure!(
            major == expected,
            "Not a valid number for this series: {} is {}, `{}` is {}",
            codename,
            expected,
            version,
            major
        );

        Ok(ReleaseVersion {
            version: version.to_string(),
            major,
            pre_release,
        })
    }
}

/// Locate the file defining `openstack_release` and read the value.
///
/// Returns the path relative to `oa_folder` together with the version.
pub fn find_release_version(oa_folder: &Path) -> Result<(PathBuf, String)> {
    for relative in RELEASE_VARS_FILES {
        let path = oa_folder.join(relative);
        if !path.exists() {
            continue;
        }

        let (data, _) = yaml::load(&path)?;
        let version = match &data["openstack_release"] {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)?.trim().to_string(),
        };
        return Ok((PathBuf::from(relative), version));
    }

    bail!(
        "no `openstack_release` found in any of {:?} under `{}`",
        RELEASE_VARS_FILES,
        oa_folder.display()
    )
}
