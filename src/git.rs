use crate::refs::{RemoteRef, Resolver};
use erreur::{ensure, eyre, Context, Result};
use git2::{build::CheckoutBuilder, build::RepoBuilder, BranchType, Direction, Oid, Repository};
use std::path::Path;

/// List branches and release tags of a remote without cloning it.
pub fn list_remote_refs(url: &str) -> Result<Vec<RemoteRef>> {
    let mut remote = git2::Remote::create_detached(url)
        .with_context(|| format!("cannot create remote for `{}`", url))?;
    remote
        .connect(Direction::Fetch)
        .with_context(|| format!("cannot connect to `{}`", url))?;

    let refs: Vec<RemoteRef> = remote
        .list()
        .with_context(|| format!("cannot list references of `{}`", url))?
        .iter()
        .filter_map(|head| RemoteRef::from_ref_name(&head.oid().to_string(), head.name()))
        .collect();
    log::debug!("`{}` advertises {} usable refs", url, refs.len());

    Ok(refs)
}

/// Pin `reference` against what `url` currently advertises.
pub fn find_latest_remote_ref(url: &str, reference: &str, resolver: &Resolver) -> Result<String> {
    let refs = list_remote_refs(url)?;
    Ok(resolver.resolve(&refs, reference))
}

pub fn clone_branch(url: &str, path: &Path, branch: &str) -> Result<Repository> {
    log::info!("cloning `{}` ({}) into `{}`", url, branch, path.display());
    RepoBuilder::new()
        .branch(branch)
        .clone(url, path)
        .with_context(|| format!("clone `{}` at `{}`", url, branch))
}

/// Clone the default branch of `url`, then detach HEAD at `revision`: a sha,
/// a tag, or a branch of `origin`.
pub fn clone_at(url: &str, path: &Path, revision: &str) -> Result<Repository> {
    log::info!("cloning `{}` into `{}`", url, path.display());
    let repo = RepoBuilder::new()
        .clone(url, path)
        .with_context(|| format!("clone `{}`", url))?;

    {
        let object = repo
            .revparse_single(revision)
            .or_else(|_| repo.revparse_single(&format!("origin/{}", revision)))
            .with_context(|| format!("`{}` has no revision `{}`", url, revision))?;
        let commit = object
            .peel_to_commit()
            .with_context(|| format!("`{}` is not a commit", revision))?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::default().force()))?;
        repo.set_head_detached(commit.id())?;
    }

    Ok(repo)
}

/// Clone `url` into `path`, or bring an existing checkout up to date.
pub fn open_or_clone(url: &str, path: &Path, branch: &str) -> Result<Repository> {
    if !path.exists() {
        return clone_branch(url, path, branch);
    }

    log::info!("`{}` already exists, updating", path.display());
    let repo =
        Repository::open(path).with_context(|| format!("open repo `{}`", path.display()))?;
    pull(&repo, branch).with_context(|| format!("update `{}`", path.display()))?;
    Ok(repo)
}

/// Fetch `branch` from `origin` and fast-forward the local branch to it.
pub fn pull(repo: &Repository, branch: &str) -> Result<()> {
    let mut origin = repo.find_remote("origin").context("no `origin` remote")?;
    origin
        .fetch(&[branch], None, None)
        .with_context(|| format!("fetch `{}` from origin", branch))?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let fetched = repo.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repo.merge_analysis(&[&fetched])?;
    if analysis.is_up_to_date() {
        log::debug!("`{}` already up to date", branch);
        return Ok(());
    }
    ensure!(
        analysis.is_fast_forward(),
        "local `{}` has diverged from origin, refusing to merge",
        branch
    );

    let refname = format!("refs/heads/{}", branch);
    repo.find_reference(&refname)
        .with_context(|| format!("no local branch `{}`", branch))?
        .set_target(fetched.id(), "pull: fast-forward")?;
    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    log::debug!("fast-forwarded `{}` to {}", branch, fetched.id());
    Ok(())
}

pub fn head_commit(repo: &Repository) -> Result<String> {
    let commit = repo
        .head()
        .context("repo has no HEAD")?
        .peel_to_commit()
        .context("HEAD is not a commit")?;
    Ok(commit.id().to_string())
}

/// Name of the remote branch the checked-out branch tracks, without the
/// remote name (`stable/pike`, not `origin/stable/pike`).
pub fn tracking_branch_name(path: &Path) -> Result<String> {
    let repo =
        Repository::open(path).with_context(|| format!("open repo `{}`", path.display()))?;
    let head = repo.head().context("repo has no HEAD")?;
    ensure!(head.is_branch(), "`{}` has a detached HEAD", path.display());
    let local = head
        .shorthand()
        .with_context(|| format!("branch name in `{}` is not UTF-8", path.display()))?;

    let upstream = repo
        .find_branch(local, BranchType::Local)?
        .upstream()
        .map_err(|_| eyre!("`{}` is not tracking any remote branch", path.display()))?;
    let upstream_ref = upstream
        .get()
        .name()
        .context("upstream ref name is not UTF-8")?
        .to_string();
    let remote = repo.branch_remote_name(&upstream_ref)?;
    let remote = remote.as_str().context("remote name is not UTF-8")?;

    let prefix = format!("refs/remotes/{}/", remote);
    let name = upstream_ref
        .strip_prefix(&prefix)
        .with_context(|| format!("unexpected upstream ref `{}`", upstream_ref))?;
    Ok(name.to_string())
}

/// Stage `paths` (relative to the work tree) and commit them on HEAD.
pub fn commit_paths(repo: &Repository, paths: &[&Path], message: &str) -> Result<Oid> {
    let mut index = repo.index()?;
    for path in paths {
        index
            .add_path(path)
            .with_context(|| format!("stage `{}`", path.display()))?;
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = repo
        .signature()
        .context("no committer identity, set user.name and user.email")?;
    let parent = repo.head()?.peel_to_commit()?;
    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
        .context("commit")?;
    log::info!("committed {}", oid);
    Ok(oid)
}
