//! Git repository fixtures built with `git2`.
//!
//! Repositories are non-bare so they can be cloned through a `file://` URL
//! while still being easy to populate from a test.

use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Repository, Signature};

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("failed to build signature: {e}"))
}

/// Initialises a repository at `path` with one commit containing `files`.
///
/// # Panics
/// Panics if any git or filesystem operation fails.
pub fn repo_with_files(path: &Path, files: &[(&str, &str)]) -> (Repository, Oid) {
    let repo = Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "repo_with_files: failed to init repository at {}: {e}",
            path.display()
        )
    });
    let oid = commit_files(&repo, files, "Initial commit");
    (repo, oid)
}

/// Writes `files` into the working tree and commits them on HEAD.
///
/// # Panics
/// Panics if any git or filesystem operation fails.
pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
    let workdir = repo
        .workdir()
        .unwrap_or_else(|| panic!("commit_files: repository has no working directory"));
    let mut index = repo
        .index()
        .unwrap_or_else(|e| panic!("commit_files: failed to open index: {e}"));

    for (name, contents) in files {
        let path = workdir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("commit_files: failed to create {}: {e}", parent.display()));
        }
        fs::write(&path, contents)
            .unwrap_or_else(|e| panic!("commit_files: failed to write {name}: {e}"));
        index
            .add_path(Path::new(name))
            .unwrap_or_else(|e| panic!("commit_files: failed to stage {name}: {e}"));
    }

    index
        .write()
        .unwrap_or_else(|e| panic!("commit_files: failed to write index: {e}"));
    let tree_id = index
        .write_tree()
        .unwrap_or_else(|e| panic!("commit_files: failed to write tree: {e}"));
    let tree = repo
        .find_tree(tree_id)
        .unwrap_or_else(|e| panic!("commit_files: failed to find tree: {e}"));

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit<'_>> = parent.iter().collect();
    let sig = signature();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap_or_else(|e| panic!("commit_files: failed to commit: {e}"))
}

/// Creates `branch` from HEAD, commits `files` on it and switches back.
///
/// # Panics
/// Panics if any git or filesystem operation fails.
pub fn branch_with_files(repo: &Repository, branch: &str, files: &[(&str, &str)]) -> Oid {
    let original = repo
        .head()
        .ok()
        .and_then(|head| head.name().map(String::from))
        .unwrap_or_else(|| panic!("branch_with_files: HEAD is not a named reference"));
    let head_commit = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .unwrap_or_else(|e| panic!("branch_with_files: failed to resolve HEAD: {e}"));

    repo.branch(branch, &head_commit, false)
        .unwrap_or_else(|e| panic!("branch_with_files: failed to create {branch}: {e}"));
    switch_to(repo, &format!("refs/heads/{branch}"));

    let oid = commit_files(repo, files, &format!("Update {branch}"));

    switch_to(repo, &original);
    oid
}

fn switch_to(repo: &Repository, refname: &str) {
    repo.set_head(refname)
        .unwrap_or_else(|e| panic!("failed to set HEAD to {refname}: {e}"));
    repo.checkout_head(Some(CheckoutBuilder::new().force()))
        .unwrap_or_else(|e| panic!("failed to check out {refname}: {e}"));
}

/// `git+file://` location for `subpath` inside the repository at `path`.
pub fn file_location(path: &Path, subpath: &str, reference: Option<&str>) -> String {
    let mut location = format!("git+file://{}//{subpath}", path.display());
    if let Some(reference) = reference {
        location.push('#');
        location.push_str(reference);
    }
    location
}
