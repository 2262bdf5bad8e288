//! Bumping the OpenStack service SHAs pinned in `repo_packages`.
//!
//! Each service is declared by a pair of lines:
//!
//! ```yaml
//! nova_git_repo: https://git.openstack.org/openstack/nova
//! nova_git_install_branch: 0143d0c2c9fc67380a4ae8e505a9a3fb55c0e888 # HEAD of "stable/pike" as of 11.09.2017
//! ```
//!
//! The branch line is rewritten with the current head of the named branch.

use crate::{config::Config, git, refs::Resolver};
use erreur::{ensure, Context, Result};
use lazy_regex::regex_captures;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub const REPO_PACKAGES: &str = "playbooks/defaults/repo_packages";

/// A `<project>_git_repo: <remote>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLine {
    pub project: String,
    pub remote: String,
}

impl RepoLine {
    pub fn parse(line: &str) -> Option<RepoLine> {
        let (_, project, remote) = regex_captures!(r"^(.*)_git_repo: (.*)$", line)?;
        Some(RepoLine {
            project: project.to_string(),
            remote: remote.to_string(),
        })
    }
}

/// Rewrite `line` when it is a pinned branch line, asking `latest_sha` for
/// the head of `(remote, branch)`. Other lines come back unchanged.
pub fn bump_project_line(
    line: &str,
    previous: Option<&RepoLine>,
    latest_sha: &mut dyn FnMut(&str, &str) -> Result<String>,
    date: &str,
) -> Result<String> {
    let (project, branch) = match regex_captures!(
        r#"^(.*)_git_install_branch: [0-9a-f]{40} # HEAD of "(.*)" as of .*$"#,
        line
    ) {
        Some((_, project, branch)) => (project, branch),
        None => return Ok(line.to_string()),
    };

    let repo = previous.with_context(|| format!("no `{}_git_repo` before its branch line", project))?;
    ensure!(
        repo.project == project,
        "branch line of `{}` follows the repo line of `{}`",
        project,
        repo.project
    );

    let sha = latest_sha(&repo.remote, branch)?;
    Ok(format!(
        "{}_git_install_branch: {} # HEAD of \"{}\" as of {}",
        project, sha, branch, date
    ))
}

/// Bump every branch line of the file at `path` in place. Returns how many
/// lines changed.
pub fn bump_file(
    path: &Path,
    latest_sha: &mut dyn FnMut(&str, &str) -> Result<String>,
    date: &str,
) -> Result<usize> {
    let text = fs::read_to_string(path).with_context(|| format!("read `{}`", path.display()))?;
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<RepoLine> = None;
    let mut bumped = 0;

    for raw in text.split_inclusive('\n') {
        let (line, eol) = match raw.strip_suffix('\n') {
            Some(line) => (line, "\n"),
            None => (raw, ""),
        };

        if let Some(repo) = RepoLine::parse(line) {
            previous = Some(repo);
            out.push_str(raw);
            continue;
        }

        let new = bump_project_line(line, previous.as_ref(), latest_sha, date)
            .with_context(|| format!("in `{}`", path.display()))?;
        if new != line {
            bumped += 1;
        }
        out.push_str(&new);
        out.push_str(eol);
    }

    fs::write(path, out).with_context(|| format!("write `{}`", path.display()))?;
    Ok(bumped)
}

fn package_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "yml"))
        .collect();
    files.sort();
    files
}

/// Point every service in openstack-ansible's `repo_packages` at the head
/// of the branch it follows. Returns the files that were rewritten.
pub fn bump_upstream_sources(
    config: &Config,
    workdir: &Path,
    resolver: &Resolver,
) -> Result<Vec<PathBuf>> {
    let oa_folder = workdir.join("openstack-ansible");
    let branch = git::tracking_branch_name(&oa_folder)?;
    let on_stable = branch.starts_with("stable/");
    let date = chrono::Local::now().format("%d.%m.%Y").to_string();

    let mut cache: HashMap<(String, String), String> = HashMap::new();
    let mut latest_sha = |remote: &str, branch: &str| -> Result<String> {
        let key = (remote.to_string(), branch.to_string());
        if let Some(sha) = cache.get(&key) {
            return Ok(sha.clone());
        }
        let sha = git::find_latest_remote_ref(remote, branch, resolver)?;
        cache.insert(key, sha.clone());
        Ok(sha)
    };

    log::info!("Each file can take a while to update.");
    let mut updated = Vec::new();
    for path in package_files(&oa_folder.join(REPO_PACKAGES)) {
        let skipped = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| config.stable_branch_skips.iter().any(|skip| skip == name));
        if on_stable && skipped {
            log::info!("Skipping {} for stable branch", path.display());
            continue;
        }

        log::info!("Updating {}", path.display());
        let bumped = bump_file(&path, &mut latest_sha, &date)?;
        log::debug!("{} services bumped in `{}`", bumped, path.display());
        updated.push(path);
    }

    log::info!("All files patched !");
    Ok(updated)
}
