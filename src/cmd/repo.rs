use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::errors::*;
use crate::fs::FileSystem;
use crate::model::history::last_commit_touching_from;
use crate::model::repository::Repository;
use crate::model::tree::EntryKind;
use super::{escape_html, fill, format_time, subject};

fn kind_class(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Directory => "dir",
        EntryKind::Symlink => "symlink",
    }
}

/// The page of one repository: every entry of the root tree of `HEAD`
/// with the commit that last touched it.
pub fn render_repo<FS: FileSystem>(config: &Config, name: &str, repo: &Repository<FS>) -> Result<String> {
    let head = repo.latest_commit_id()?;
    let commit = repo.commit(&head)?;
    let tree = repo.tree(commit.tree())?;

    let escaped_name = escape_html(name);
    let description = escape_html(&repo.description());
    let header = [("name", escaped_name.as_str()), ("description", description.as_str())];
    let mut page = fill(&config.repo_page_head, &header);
    for entry in tree.entries() {
        let last = last_commit_touching_from(repo, &head, &[entry.name()])?;
        let entry_name = escape_html(entry.name());
        let date = escape_html(&format_time(last.time(), &config.repo_date_format)?);
        let message = escape_html(subject(last.message()));
        page.push_str(&fill(
            &config.entry_template,
            &[
                ("name", entry_name.as_str()),
                ("kind", kind_class(entry.kind())),
                ("commit", last.id().as_str()),
                ("date", date.as_str()),
                ("message", message.as_str()),
            ],
        ));
    }
    page.push_str(&fill(&config.repo_page_foot, &header));
    Ok(page)
}

/// Writes `<output_dir>/<name>/index.html` for the repository `name`.
pub fn build_repo(config: &Config, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(format!("invalid repository name {:?}", name).into());
    }
    let git_dir = config.git_dir_of(name);
    let repo = Repository::open(&git_dir);
    let page = render_repo(config, name, &repo)
        .chain_err(|| ErrorKind::InvalidRepository(git_dir.clone()))?;
    let dir = config.output_dir.join(name);
    std::fs::create_dir_all(&dir).chain_err(|| format!("error creating {}", dir.display()))?;
    let path = dir.join("index.html");
    std::fs::write(&path, page).chain_err(|| format!("error writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(path)
}
