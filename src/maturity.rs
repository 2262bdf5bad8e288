//! The role maturity matrix published in the contributor guide.

use crate::{
    config::{Config, RetiredRole},
    git,
    role_requirements::load_role_requirements,
    yaml,
};
use erreur::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

const TEMPLATE: &str = include_str!("../templates/maturity_table.html.tera");

/// Where the rendered matrix lives inside openstack-ansible.
pub const MATRIX_PATH: &str = "doc/source/contributor/role-maturity-matrix.html";

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleMaturity {
    pub name: String,
    pub maturity_level: String,
    pub created_during: String,
    pub retired_during: String,
    /// Listed in `ansible-role-requirements.yml`
    pub in_arr: bool,
    pub ubuntu: bool,
    pub ubuntu_versions: Vec<String>,
    pub centos: bool,
    pub centos_versions: Vec<String>,
    pub opensuse: bool,
    pub opensuse_versions: Vec<String>,
}

impl From<&RetiredRole> for RoleMaturity {
    fn from(role: &RetiredRole) -> Self {
        RoleMaturity {
            name: role.name.clone(),
            maturity_level: "retired".into(),
            created_during: role.created_during.clone(),
            retired_during: role.retired_during.clone(),
            ..RoleMaturity::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GerritProject {
    project: String,
}

#[derive(Debug, Deserialize)]
struct GalaxyMeta {
    galaxy_info: GalaxyInfo,
}

#[derive(Debug, Deserialize)]
struct GalaxyInfo {
    #[serde(default)]
    platforms: Vec<Platform>,
}

#[derive(Debug, Deserialize)]
struct Platform {
    name: String,
    #[serde(default)]
    versions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OsaMeta {
    maturity_info: MaturityInfo,
}

#[derive(Debug, Deserialize)]
struct MaturityInfo {
    status: String,
    created_during: String,
    #[serde(default)]
    retired_during: Option<String>,
}

/// Repository name and role short name for a gerrit project, if it is a role.
pub fn role_names(project: &str) -> Option<(String, String)> {
    if let Some(short) = project.strip_prefix("openstack/openstack-ansible-") {
        let full = project.rsplit('/').next().unwrap_or(project);
        return Some((full.to_string(), short.to_string()));
    }
    if project == "openstack/ansible-hardening" {
        return Some(("ansible-hardening".into(), "ansible-hardening".into()));
    }
    None
}

/// Read a checked-out role's metadata.
///
/// `None` when the repository has no `meta/main.yml`, like the ops repo.
pub fn read_role(
    role_path: &Path,
    name: &str,
    pinned_roles: &[String],
) -> Result<Option<RoleMaturity>> {
    let galaxy_path = role_path.join("meta/main.yml");
    if !galaxy_path.exists() {
        log::debug!("`{}` has no galaxy metadata, not a role", role_path.display());
        return Ok(None);
    }
    let (galaxy, _): (GalaxyMeta, _) = yaml::load_as(&galaxy_path)?;

    let mut role = RoleMaturity {
        name: name.to_string(),
        in_arr: pinned_roles.iter().any(|pinned| pinned == name),
        ..RoleMaturity::default()
    };

    for platform in &galaxy.galaxy_info.platforms {
        let versions: Vec<String> = platform.versions.iter().filter_map(yaml::scalar_string).collect();
        let lower = platform.name.to_lowercase();
        if lower == "opensuse" {
            role.opensuse = true;
            role.opensuse_versions = versions;
        } else if lower == "ubuntu" {
            role.ubuntu = true;
            role.ubuntu_versions = versions;
        } else if lower == "centos" || platform.name.to_uppercase() == "EL" {
            role.centos = true;
            role.centos_versions = versions;
        }
    }

    let osa_meta_path = role_path.join("meta/openstack-ansible.yml");
    if osa_meta_path.exists() {
        let (meta, _): (OsaMeta, _) = yaml::load_as(&osa_meta_path)?;
        let info = meta.maturity_info;
        role.maturity_level = info.status.to_lowercase();
        role.created_during = info.created_during.to_lowercase();
        role.retired_during = info
            .retired_during
            .map(|r| r.to_lowercase())
            .unwrap_or_else(|| UNKNOWN.into());
    } else {
        role.maturity_level = UNKNOWN.into();
        role.created_during = UNKNOWN.into();
        role.retired_during = UNKNOWN.into();
    }

    Ok(Some(role))
}

pub fn render_html(roles: &[RoleMaturity]) -> Result<String> {
    let mut context = tera::Context::new();
    context.insert("roles", roles);
    tera::Tera::one_off(TEMPLATE, &context, true).context("render maturity matrix")
}

/// Refresh every role checkout under `workdir` and rewrite the matrix in
/// openstack-ansible. Returns the written file.
pub fn update_role_maturity_matrix(config: &Config, workdir: &Path, commit: bool) -> Result<PathBuf> {
    log::info!("Workspace folder is {}", workdir.display());

    let project_config_path = workdir.join("project-config");
    git::open_or_clone(&config.project_config_url(), &project_config_path, "master")?;

    let oa_folder = workdir.join("openstack-ansible");
    let oa_repo = git::open_or_clone(&config.openstack_repo("openstack-ansible"), &oa_folder, "master")?;

    let (pins, _) = load_role_requirements(&oa_folder.join("ansible-role-requirements.yml"))?;
    let pinned_roles: Vec<String> = pins.into_iter().map(|pin| pin.name).collect();

    let (projects, _): (Vec<GerritProject>, _) =
        yaml::load_as(project_config_path.join("gerrit/projects.yaml"))?;

    let mut matrix = Vec::new();
    for project in &projects {
        let (full, short) = match role_names(&project.project) {
            Some(names) => names,
            None => continue,
        };
        log::info!("Loading metadata for {}", short);

        let role_path = workdir.join(&full);
        git::open_or_clone(&config.openstack_repo(&full), &role_path, "master")?;
        if let Some(role) = read_role(&role_path, &short, &pinned_roles)
            .with_context(|| format!("read metadata of `{}`", full))?
        {
            matrix.push(role);
        }
    }
    matrix.extend(config.deprecated_roles.iter().map(RoleMaturity::from));

    log::info!("Patching OpenStack-Ansible");
    let html = render_html(&matrix)?;
    let target = oa_folder.join(MATRIX_PATH);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("mkdir `{}`", parent.display()))?;
    }
    fs::write(&target, html).with_context(|| format!("write `{}`", target.display()))?;

    if commit {
        let message = format!(
            "Updating roles maturity\n\nUpdate for the {}\n",
            chrono::Local::now().format("%d.%m.%Y")
        );
        git::commit_paths(&oa_repo, &[Path::new(MATRIX_PATH)], &message)?;
    }

    Ok(target)
}
