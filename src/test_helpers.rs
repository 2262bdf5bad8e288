#![allow(unused)]

pub use erreur::{Context, Result};
pub use std::{
    fs,
    path::{Path, PathBuf},
};
pub use tempfile::{tempdir, TempDir};

pub fn logger() {
    let _ = pretty_env_logger::formatted_builder()
        .filter(None, log::LevelFilter::Debug)
        .target(env_logger::Target::Stderr)
        .is_test(true)
        .try_init();
}

pub fn write_file(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path.parent().context("parent dir")?).context("mkdir")?;
    fs::write(path, content).with_context(|| format!("write `{}`", path.display()))?;
    Ok(())
}

/// A repository with a committer identity, on branch `master`.
pub fn init_repo(path: impl AsRef<Path>) -> Result<git2::Repository> {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("master");
    let repo = git2::Repository::init_opts(path.as_ref(), &opts).context("git init")?;
    set_identity(&repo)?;
    Ok(repo)
}

/// Committer identity, so commits don't depend on the global git config.
pub fn set_identity(repo: &git2::Repository) -> Result<()> {
    let mut config = repo.config().context("repo config")?;
    config.set_str("user.name", "Release Bot")?;
    config.set_str("user.email", "release-bot@example.com")?;
    Ok(())
}

/// Clone `upstream` at `branch` into `path` with a committer identity.
pub fn clone_with_identity(upstream: &Path, path: &Path, branch: &str) -> Result<git2::Repository> {
    let repo = git2::build::RepoBuilder::new()
        .branch(branch)
        .clone(&file_url(upstream), path)
        .context("clone")?;
    set_identity(&repo)?;
    Ok(repo)
}

/// Stage everything in the work tree and commit it on HEAD.
pub fn commit_all(repo: &git2::Repository, message: &str) -> Result<git2::Oid> {
    let mut index = repo.index()?;
    index.add_all(std::iter::once("*"), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = repo.signature()?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(oid)
}

pub fn tag_head(repo: &git2::Repository, name: &str) -> Result<()> {
    let head = repo.head()?.peel(git2::ObjectType::Commit)?;
    repo.tag_lightweight(name, &head, false)?;
    Ok(())
}

pub fn branch_head(repo: &git2::Repository, name: &str) -> Result<git2::Oid> {
    let head = repo.head()?.peel_to_commit()?;
    repo.branch(name, &head, false)?;
    Ok(head.id())
}

/// A repository with a single commit containing `files`.
pub fn repo_with_files(path: impl AsRef<Path>, files: &[(&str, &str)]) -> Result<git2::Repository> {
    let path = path.as_ref();
    let repo = init_repo(path)?;
    for (name, content) in files {
        write_file(path.join(name), content)?;
    }
    commit_all(&repo, "initial import")?;
    Ok(repo)
}

pub fn file_url(path: impl AsRef<Path>) -> String {
    format!("file://{}", path.as_ref().display())
}
