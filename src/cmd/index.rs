use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::*;
use crate::fs::FileSystem;
use crate::model::repository::Repository;
use super::{escape_html, fill, format_time, subject};

/// What the index page shows for one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSummary {
    pub name: String,
    pub description: String,
    pub message: String,
    pub time: DateTime<FixedOffset>,
    pub pin: Option<usize>,
}

pub fn summarize<FS: FileSystem>(config: &Config, name: &str, repo: &Repository<FS>) -> Result<RepoSummary> {
    let head = repo.latest_commit_id()?;
    let commit = repo.commit(&head)?;
    Ok(RepoSummary {
        name: name.to_owned(),
        description: repo.description(),
        message: subject(commit.message()).to_owned(),
        time: *commit.time(),
        pin: config.pin_position(name),
    })
}

/// Pinned repositories first in pin order, then the rest by newest
/// commit.
pub fn compare(a: &RepoSummary, b: &RepoSummary) -> Ordering {
    match (a.pin, b.pin) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.time.cmp(&a.time),
    }
}

pub fn render_index(config: &Config, repos: &[RepoSummary]) -> Result<String> {
    let mut page = config.index_head.clone();
    for repo in repos {
        let pinned = if repo.pin.is_some() { config.pin_class.as_str() } else { "" };
        let name = escape_html(&repo.name);
        let link = format!("/{}/", name);
        let description = escape_html(&repo.description);
        let date = escape_html(&format_time(&repo.time, &config.repo_date_format)?);
        let message = escape_html(&repo.message);
        page.push_str(&fill(
            &config.repo_template,
            &[
                ("pinned", pinned),
                ("link", link.as_str()),
                ("name", name.as_str()),
                ("description", description.as_str()),
                ("date", date.as_str()),
                ("message", message.as_str()),
            ],
        ));
    }
    page.push_str(&config.index_foot);
    Ok(page)
}

/// Writes the index of every repository under `repos_dir`. Directories
/// that are not readable repositories are skipped.
pub fn build_index(config: &Config) -> Result<PathBuf> {
    let dir = std::fs::read_dir(&config.repos_dir)
        .chain_err(|| format!("error reading repos dir {}", config.repos_dir.display()))?;
    let mut repos = Vec::new();
    for entry in dir {
        let entry = entry.chain_err(|| "error reading repos dir")?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let repo = Repository::open(config.git_dir_of(&name));
        match summarize(config, &name, &repo) {
            Ok(summary) => repos.push(summary),
            Err(e) => warn!("skipping {}: {}", name, e),
        }
    }
    repos.sort_by(compare);

    let page = render_index(config, &repos)?;
    std::fs::create_dir_all(&config.output_dir)
        .chain_err(|| format!("error creating {}", config.output_dir.display()))?;
    let path = config.output_dir.join(&config.index_file);
    std::fs::write(&path, page).chain_err(|| format!("error writing index {}", path.display()))?;
    info!("wrote {} with {} repositories", path.display(), repos.len());
    Ok(path)
}
