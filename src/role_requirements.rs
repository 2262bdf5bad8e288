//! Freezing `ansible-role-requirements.yml` to exact commits.

use crate::{
    config::Config,
    confirm::{ensure_confirmed, Confirm},
    git, yaml,
};
use erreur::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// One pinned role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<String>,
    pub src: String,
    #[serde(deserialize_with = "yaml::deserialize_scalar_string")]
    pub version: String,
    /// Keys we don't interpret, written back untouched
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

pub fn load_role_requirements(path: &Path) -> Result<(Vec<RoleRequirement>, yaml::YamlStyle)> {
    yaml::load_as(path).with_context(|| format!("load role requirements `{}`", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOptions {
    /// Also re-pin roles hosted outside OpenStack, by remote ref resolution
    pub external_roles: bool,
    /// Copy the release notes of cloned roles into openstack-ansible
    pub release_notes: bool,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        FreezeOptions {
            external_roles: false,
            release_notes: true,
        }
    }
}

/// Pin every role to the current head of the branch openstack-ansible
/// tracks, rewriting the role requirements file in its original style.
pub fn freeze_role_requirements(
    config: &Config,
    workdir: &Path,
    options: FreezeOptions,
    confirm: &dyn Confirm,
) -> Result<Vec<RoleRequirement>> {
    let oa_folder = workdir.join("openstack-ansible");
    let branch = git::tracking_branch_name(&oa_folder)?;
    log::info!("freezing roles for `{}`", branch);

    let arr_path = workdir.join(&config.role_requirements);
    let (mut roles, style) = load_role_requirements(&arr_path)?;

    ensure_confirmed(
        confirm,
        &format!(
            "Deleting all the role folders in workspace {}\nAre you sure?",
            workdir.display()
        ),
    )?;

    let resolver = config.resolver(true);
    for role in roles.iter_mut() {
        log::info!("Updating {}", role.name);
        let role_path = workdir.join(&role.name);

        if config.is_openstack_hosted(&role.src) {
            if role_path.exists() {
                fs::remove_dir_all(&role_path)
                    .with_context(|| format!("remove `{}`", role_path.display()))?;
            }
            // a full clone, not a remote listing, so release notes can be copied
            let repo = git::clone_branch(&role.src, &role_path, &branch)?;
            role.version = git::head_commit(&repo)?;

            if options.release_notes {
                let copied = copy_release_notes(&role_path, &oa_folder)?;
                log::debug!("copied {} release notes from `{}`", copied, role.name);
            }
        } else if options.external_roles {
            role.version = git::find_latest_remote_ref(&role.src, &role.version, &resolver)
                .with_context(|| format!("pin external role `{}`", role.name))?;
        }
    }

    yaml::dump(&arr_path, &roles, style)?;
    log::info!("Ansible Role Requirements file patched!");
    Ok(roles)
}

/// Copy `releasenotes/notes/*.yaml` of a role into openstack-ansible.
pub fn copy_release_notes(role_path: &Path, oa_folder: &Path) -> Result<usize> {
    let source = role_path.join("releasenotes/notes");
    if !source.is_dir() {
        return Ok(0);
    }
    let target = oa_folder.join("releasenotes/notes");
    fs::create_dir_all(&target).with_context(|| format!("mkdir `{}`", target.display()))?;

    let notes: Vec<PathBuf> = WalkDir::new(&source)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "yaml"))
        .collect();

    for note in &notes {
        let file_name = note.file_name().context("note without file name")?;
        fs::copy(note, target.join(file_name))
            .with_context(|| format!("copy `{}`", note.display()))?;
    }
    Ok(notes.len())
}
