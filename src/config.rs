//! Settings shared by the release chores.
//!
//! Everything has a built-in default matching the upstream OpenStack
//! infrastructure; a YAML file can override any subset of it.

use crate::refs::{PatchOrdering, Resolver};
use erreur::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL all OpenStack hosted repositories live under
    pub openstack_repos: String,
    /// Defaults to `<openstack_repos>-infra/project-config`
    pub project_config_repo: Option<String>,
    /// Defaults to `<openstack_repos>/releases.git`
    pub releases_repo: Option<String>,
    pub pypi_url: String,
    pub launchpad_api: String,
    pub launchpad_project: String,
    /// Series codename to major release number
    pub codenames: BTreeMap<String, u64>,
    pub pre_release_suffixes: Vec<String>,
    /// Relative to the work directory
    pub role_requirements: String,
    pub deprecated_roles: Vec<RetiredRole>,
    /// File names in `repo_packages` left alone on stable branches
    pub stable_branch_skips: Vec<String>,
    pub patch_ordering: PatchOrdering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredRole {
    pub name: String,
    pub created_during: String,
    pub retired_during: String,
}

impl Default for Config {
    fn default() -> Self {
        let codenames = [("queens", 17), ("pike", 16), ("ocata", 15), ("newton", 14)]
            .iter()
            .map(|(name, major)| (name.to_string(), *major))
            .collect();

        Config {
            openstack_repos: "https://git.openstack.org/openstack".into(),
            project_config_repo: None,
            releases_repo: None,
            pypi_url: "https://pypi.org/pypi".into(),
            launchpad_api: "https://api.launchpad.net/devel".into(),
            launchpad_project: "openstack-ansible".into(),
            codenames,
            pre_release_suffixes: ["0b1", "0b2", "0b3", "0rc1", "0rc2", "0rc3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            role_requirements: "openstack-ansible/ansible-role-requirements.yml".into(),
            deprecated_roles: vec![
                RetiredRole {
                    name: "openstack-ansible-security".into(),
                    created_during: "liberty".into(),
                    retired_during: "pike".into(),
                },
                RetiredRole {
                    name: "pip_lock_down".into(),
                    created_during: "liberty".into(),
                    retired_during: "newton".into(),
                },
            ],
            stable_branch_skips: vec!["openstack_testing.yml".into(), "nova_consoles.yml".into()],
            patch_ordering: PatchOrdering::default(),
        }
    }
}

impl Config {
    /// Read overrides from `path`, or return the defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => return Ok(Config::default()),
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file `{}`", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse config file `{}`", path.display()))?;
        log::debug!("loaded config from `{}`", path.display());
        Ok(config)
    }

    pub fn openstack_repo(&self, name: &str) -> String {
        format!("{}/{}", self.openstack_repos.trim_end_matches('/'), name)
    }

    pub fn is_openstack_hosted(&self, src: &str) -> bool {
        src.starts_with(&format!("{}/", self.openstack_repos.trim_end_matches('/')))
    }

    pub fn project_config_url(&self) -> String {
        self.project_config_repo.clone().unwrap_or_else(|| {
            format!("{}-infra/project-config", self.openstack_repos.trim_end_matches('/'))
        })
    }

    pub fn releases_url(&self) -> String {
        self.releases_repo
            .clone()
            .unwrap_or_else(|| self.openstack_repo("releases.git"))
    }

    pub fn major_for(&self, codename: &str) -> Option<u64> {
        self.codenames.get(codename).copied()
    }

    pub fn resolver(&self, guess: bool) -> Resolver {
        Resolver::new(guess, self.patch_ordering)
    }
}
