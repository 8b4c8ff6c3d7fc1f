use std::sync::Arc;
use tracing::debug;

use crate::errors::*;
use crate::fs::FileSystem;
use super::commit::Commit;
use super::id::Id;
use super::repository::Repository;
use super::tree::EntryKind;

/// Id of the object at `path` below the tree `root`, or `None` when some
/// component is missing. Components are marked tree names, so every one
/// but the last must name a directory (`"src/"`). An empty path is the
/// root tree itself.
pub fn resolve_path<FS, S>(repo: &Repository<FS>, root: &Id, path: &[S]) -> Result<Option<Id>>
where
    FS: FileSystem,
    S: AsRef<str>,
{
    let mut current = root.clone();
    for (n, name) in path.iter().enumerate() {
        let tree = repo.tree(&current)?;
        let entry = match tree.get(name.as_ref()) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if n + 1 < path.len() && entry.kind() != EntryKind::Directory {
            return Ok(None);
        }
        current = entry.id().clone();
    }
    Ok(Some(current))
}

/// The commit that last changed `path`, starting from `HEAD`.
pub fn last_commit_touching<FS, S>(repo: &Repository<FS>, path: &[S]) -> Result<Arc<Commit>>
where
    FS: FileSystem,
    S: AsRef<str>,
{
    let head = repo.latest_commit_id()?;
    last_commit_touching_from(repo, &head, path)
}

/// Walks first parents from `start` while `path` keeps the id it has at
/// `start`. The last commit of that run is the one that introduced the
/// current content; a root commit ends the walk.
///
/// Only first parents are followed, so a change merged in from a side
/// branch is attributed to the merge commit.
pub fn last_commit_touching_from<FS, S>(repo: &Repository<FS>, start: &Id, path: &[S]) -> Result<Arc<Commit>>
where
    FS: FileSystem,
    S: AsRef<str>,
{
    let mut current = repo.commit(start)?;
    let wanted = resolve_path(repo, current.tree(), path)?
        .ok_or_else(|| ErrorKind::NotFound(format!("{} at {}", display_path(path), start)))?;
    while let Some(parent_id) = current.parent().cloned() {
        let parent = repo.commit(&parent_id)?;
        match resolve_path(repo, parent.tree(), path)? {
            Some(ref id) if *id == wanted => current = parent,
            _ => break,
        }
    }
    debug!("{} last touched by {}", display_path(path), current.id());
    Ok(current)
}

fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    let mut out = String::new();
    for name in path {
        out.push_str(name.as_ref());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
