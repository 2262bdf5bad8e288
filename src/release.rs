//! Release chores on openstack-ansible and the openstack/releases repo.

use crate::{
    config::Config,
    confirm::{ensure_confirmed, remove_dir_confirmed, Confirm},
    git,
    role_requirements::load_role_requirements,
    version::{find_release_version, next_patch_version, ReleaseVersion},
    yaml,
};
use erreur::{bail, ensure, Context, Result};
use serde_yaml::{Mapping, Value};
use std::{
    convert::Infallible,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use url::Url;

/// `--version auto` or an explicit version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Auto,
    Explicit(String),
}

impl Default for VersionRequest {
    fn default() -> Self {
        VersionRequest::Auto
    }
}

impl FromStr for VersionRequest {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Infallible> {
        Ok(match s {
            "auto" => VersionRequest::Auto,
            version => VersionRequest::Explicit(version.to_string()),
        })
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VersionRequest::Auto => write!(f, "auto"),
            VersionRequest::Explicit(version) => write!(f, "{}", version),
        }
    }
}

/// Set `openstack_release` in openstack-ansible to the next (or given)
/// version. Returns the new version.
pub fn bump_release_number(
    workdir: &Path,
    request: &VersionRequest,
    commit: bool,
    confirm: &dyn Confirm,
) -> Result<String> {
    let oa_folder = workdir.join("openstack-ansible");
    let (relative, current) = find_release_version(&oa_folder)?;
    log::info!("Current version {} in {}", current, relative.display());

    if current == "master" {
        ensure_confirmed(confirm, "Master should only changed when necessary. Sure?")?;
    }

    let new = match request {
        VersionRequest::Explicit(version) => version.clone(),
        VersionRequest::Auto => {
            log::info!("Guessing next version");
            next_patch_version(&current).with_context(|| {
                format!("Cannot up the version `{}`, pass one with --version", current)
            })?
        }
    };

    let path = oa_folder.join(&relative);
    let text = fs::read_to_string(&path).with_context(|| format!("read `{}`", path.display()))?;
    let patched = text.replace(
        &format!("openstack_release: {}", current),
        &format!("openstack_release: {}", new),
    );
    ensure!(
        patched != text,
        "`openstack_release: {}` not found verbatim in `{}`",
        current,
        path.display()
    );
    fs::write(&path, patched).with_context(|| format!("write `{}`", path.display()))?;
    log::info!("Updated the version in repo to {}", new);

    if commit {
        let repo = git2::Repository::open(&oa_folder)
            .with_context(|| format!("open repo `{}`", oa_folder.display()))?;
        git::commit_paths(
            &repo,
            &[relative.as_path()],
            &format!("Set OpenStack-Ansible release to {}\n\n", new),
        )?;
    }

    Ok(new)
}

/// Repository name as the releases repo spells it: the URL path.
fn release_repo_name(src: &str) -> Result<String> {
    let url = Url::parse(src).with_context(|| format!("invalid role source `{}`", src))?;
    Ok(url.path().trim_start_matches('/').to_string())
}

fn project_entry(repo: &str, hash: &str) -> Value {
    let mut entry = Mapping::new();
    entry.insert("repo".into(), repo.into());
    entry.insert("hash".into(), hash.into());
    Value::Mapping(entry)
}

/// Add a release of openstack-ansible for series `codename` to the releases
/// repo, listing the current openstack-ansible head and every pinned
/// OpenStack role. Returns the patched deliverable file.
pub fn update_os_release_file(
    config: &Config,
    workdir: &Path,
    codename: &str,
    request: &VersionRequest,
    commit: bool,
    confirm: &dyn Confirm,
) -> Result<PathBuf> {
    log::info!("Doing pre-flight checks");
    let version = match request {
        VersionRequest::Explicit(version) => version,
        VersionRequest::Auto => bail!("automatic versions are not supported here, pass --version"),
    };
    let release = ReleaseVersion::validate(version, codename, config)?;

    let oa_folder = workdir.join("openstack-ansible");
    ensure_confirmed(
        confirm,
        &format!(
            "Are your sure your {} folder is properly checked out at the right version?",
            oa_folder.display()
        ),
    )?;

    let oa = git2::Repository::open(&oa_folder)
        .with_context(|| format!("open repo `{}`", oa_folder.display()))?;
    let head = git::head_commit(&oa)?;
    log::info!("Found OpenStack-Ansible version {}", head);

    let releases_folder = workdir.join("releases");
    remove_dir_confirmed(confirm, &releases_folder)?;
    let releases_repo = git::clone_branch(&config.releases_url(), &releases_folder, "master")?;

    log::info!("Reading ansible-role-requirements");
    let (roles, _) = load_role_requirements(&workdir.join(&config.role_requirements))?;

    log::info!("Reading releases deliverable for the given branch");
    let relative = PathBuf::from(format!("deliverables/{}/openstack-ansible.yaml", codename));
    let deliverable_path = releases_folder.join(&relative);
    let (mut deliverable, mut style) = yaml::load(&deliverable_path)?;
    style.explicit_start = true;

    let mut projects = vec![project_entry("openstack/openstack-ansible", &head)];
    for role in roles.iter().filter(|role| config.is_openstack_hosted(&role.src)) {
        projects.push(project_entry(&release_repo_name(&role.src)?, &role.version));
    }

    let mut entry = Mapping::new();
    entry.insert("version".into(), release.version.as_str().into());
    entry.insert("projects".into(), Value::Sequence(projects));

    let document = deliverable
        .as_mapping_mut()
        .with_context(|| format!("`{}` is not a mapping", deliverable_path.display()))?;
    let releases = document
        .entry("releases".into())
        .or_insert(Value::Sequence(vec![]));
    if releases.is_null() {
        // start of the cycle, `releases:` is still empty
        *releases = Value::Sequence(vec![]);
    }
    releases
        .as_sequence_mut()
        .context("`releases` is not a list")?
        .push(Value::Mapping(entry));

    yaml::dump(&deliverable_path, &deliverable, style)?;
    log::info!("Patched!");

    if commit {
        let message = format!("Release OpenStack-Ansible {}/{}\n\n", codename, release.version);
        git::commit_paths(&releases_repo, &[relative.as_path()], &message)?;
    }

    Ok(deliverable_path)
}

/// What to use when committing freshly bumped SHAs.
pub fn suggested_commit_message(new_version: &str, release_change_id: &str) -> String {
    format!(
        "Here is a commit message you could use:\n\
         Update all SHAs for {}\n\n\
         This patch updates all the roles to the latest available stable\n\
         SHA's, copies the release notes from the updated roles into the\n\
         integrated repo, updates all the OpenStack Service SHA's, and\n\
         updates the appropriate python requirements pins.\n\n\
         Depends-On: {}",
        new_version, release_change_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        confirm::{AlwaysNo, AssumeYes},
        test_helpers::*,
    };

    const PINS: &str = "\
- name: os_nova
  scm: git
  src: https://git.openstack.org/openstack/openstack-ansible-os_nova
  version: 0123456789abcdef0123456789abcdef01234567
- name: etcd
  scm: git
  src: https://github.com/logan2211/ansible-etcd
  version: 1.3.2
";

    fn osa_checkout(work: &Path, vars: &str) -> Result<git2::Repository> {
        let upstream = work.join("upstream-osa");
        repo_with_files(
            &upstream,
            &[("group_vars/all/all.yml", vars), ("ansible-role-requirements.yml", PINS)],
        )?;
        clone_with_identity(&upstream, &work.join("openstack-ansible"), "master")
    }

    #[test]
    fn version_request_from_str() {
        assert_eq!("auto".parse::<VersionRequest>(), Ok(VersionRequest::Auto));
        assert_eq!(
            "16.0.3".parse::<VersionRequest>(),
            Ok(VersionRequest::Explicit("16.0.3".into()))
        );
    }

    #[test]
    fn auto_bump_increments_patch_and_commits() -> Result<()> {
        let work = tempdir()?;
        let repo = osa_checkout(work.path(), "---\nopenstack_release: 16.0.9\nfoo: bar\n")?;

        let new = bump_release_number(work.path(), &VersionRequest::Auto, true, &AlwaysNo)?;
        assert_eq!(new, "16.0.10");
        assert_eq!(
            fs::read_to_string(work.path().join("openstack-ansible/group_vars/all/all.yml"))?,
            "---\nopenstack_release: 16.0.10\nfoo: bar\n"
        );

        let head = repo.head()?.peel_to_commit()?;
        assert_eq!(head.message(), Some("Set OpenStack-Ansible release to 16.0.10\n\n"));
        Ok(())
    }

    #[test]
    fn master_needs_confirmation() -> Result<()> {
        let work = tempdir()?;
        osa_checkout(work.path(), "openstack_release: master\n")?;

        let err = bump_release_number(
            work.path(),
            &VersionRequest::Explicit("17.0.0".into()),
            false,
            &AlwaysNo,
        )
        .unwrap_err();
        assert!(erreur::is_user_aborted(&err));

        let new = bump_release_number(
            work.path(),
            &VersionRequest::Explicit("17.0.0".into()),
            false,
            &AssumeYes,
        )?;
        assert_eq!(new, "17.0.0");
        Ok(())
    }

    #[test]
    fn auto_bump_of_master_is_an_error() -> Result<()> {
        let work = tempdir()?;
        osa_checkout(work.path(), "openstack_release: master\n")?;
        assert!(bump_release_number(work.path(), &VersionRequest::Auto, false, &AssumeYes).is_err());
        Ok(())
    }

    #[test]
    fn release_file_gets_a_new_release() -> Result<()> {
        logger();
        let work = tempdir()?;
        let osa = osa_checkout(work.path(), "openstack_release: 16.0.2\n")?;
        let osa_head = osa.head()?.peel_to_commit()?.id().to_string();

        let releases_upstream = work.path().join("upstream-releases");
        repo_with_files(
            &releases_upstream,
            &[(
                "deliverables/pike/openstack-ansible.yaml",
                "---\nlaunchpad: openstack-ansible\nreleases:\n    - version: 16.0.1\n      projects:\n          - repo: openstack/openstack-ansible\n            hash: ffffffffffffffffffffffffffffffffffffffff\n",
            )],
        )?;

        let config = Config {
            releases_repo: Some(file_url(&releases_upstream)),
            ..Config::default()
        };
        let path = update_os_release_file(
            &config,
            work.path(),
            "pike",
            &VersionRequest::Explicit("16.0.2".into()),
            false,
            &AssumeYes,
        )?;

        let expected = format!(
            "---\nlaunchpad: openstack-ansible\nreleases:\n    - version: 16.0.1\n      projects:\n          - repo: openstack/openstack-ansible\n            hash: ffffffffffffffffffffffffffffffffffffffff\n    \
             - version: 16.0.2\n      projects:\n          - repo: openstack/openstack-ansible\n            hash: {}\n          \
             - repo: openstack/openstack-ansible-os_nova\n            hash: 0123456789abcdef0123456789abcdef01234567\n",
            osa_head
        );
        assert_eq!(fs::read_to_string(path)?, expected);
        Ok(())
    }

    #[test]
    fn empty_releases_start_a_list() -> Result<()> {
        let work = tempdir()?;
        osa_checkout(work.path(), "openstack_release: 17.0.0.0b1\n")?;
        let releases_upstream = work.path().join("upstream-releases");
        repo_with_files(
            &releases_upstream,
            &[("deliverables/queens/openstack-ansible.yaml", "launchpad: openstack-ansible\nreleases:\n")],
        )?;

        let config = Config {
            releases_repo: Some(file_url(&releases_upstream)),
            ..Config::default()
        };
        let path = update_os_release_file(
            &config,
            work.path(),
            "queens",
            &VersionRequest::Explicit("17.0.0.0b1".into()),
            false,
            &AssumeYes,
        )?;

        let (written, _) = yaml::load(path)?;
        assert_eq!(written["releases"][0]["version"].as_str(), Some("17.0.0.0b1"));
        assert_eq!(
            written["releases"][0]["projects"].as_sequence().map(|p| p.len()),
            Some(2)
        );
        Ok(())
    }

    #[test]
    fn wrong_series_is_rejected_before_cloning() -> Result<()> {
        let work = tempdir()?;
        let err = update_os_release_file(
            &Config::default(),
            work.path(),
            "pike",
            &VersionRequest::Explicit("17.0.0".into()),
            false,
            &AssumeYes,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Not a valid number for this series"));
        assert!(!work.path().join("releases").exists());
        Ok(())
    }

    #[test]
    fn commit_message_mentions_version_and_change() {
        let msg = suggested_commit_message("16.0.3", "I0123abcd");
        assert!(msg.contains("Update all SHAs for 16.0.3\n"));
        assert!(msg.ends_with("Depends-On: I0123abcd"));
    }
}
