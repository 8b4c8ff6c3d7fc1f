use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::*;

pub const DEFAULT_INDEX_HEAD: &str = "<!DOCTYPE html>\n<html><head><title>Repositories</title></head><body><table>\n";
pub const DEFAULT_INDEX_FOOT: &str = "</table></body></html>\n";
pub const DEFAULT_REPO_TEMPLATE: &str = "<tr class=\"{pinned}\"><td><a href=\"{link}\">{name}</a></td><td>{description}</td><td>{date}</td><td>{message}</td></tr>\n";
pub const DEFAULT_REPO_PAGE_HEAD: &str = "<!DOCTYPE html>\n<html><head><title>{name}</title></head><body><h1>{name}</h1><p>{description}</p><table>\n";
pub const DEFAULT_REPO_PAGE_FOOT: &str = "</table></body></html>\n";
pub const DEFAULT_ENTRY_TEMPLATE: &str = "<tr class=\"{kind}\"><td>{name}</td><td>{message}</td><td>{date}</td></tr>\n";

/// Settings of a run, read from a JSON file with camelCase keys.
///
/// Every template may instead be given as a path in the matching `*File`
/// field, whose content then replaces the inline value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory whose subdirectories are the repositories.
    pub repos_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Path of the git directory inside each repository directory.
    pub git_dir: PathBuf,
    pub index_file: String,
    /// Repositories listed first, in this order.
    pub pinned: Vec<String>,
    pub pin_class: String,
    /// `strftime` style, as understood by chrono.
    pub repo_date_format: String,

    pub index_head: String,
    pub index_head_file: Option<PathBuf>,
    pub index_foot: String,
    pub index_foot_file: Option<PathBuf>,
    pub repo_template: String,
    pub repo_template_file: Option<PathBuf>,
    pub repo_page_head: String,
    pub repo_page_head_file: Option<PathBuf>,
    pub repo_page_foot: String,
    pub repo_page_foot_file: Option<PathBuf>,
    pub entry_template: String,
    pub entry_template_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repos_dir: PathBuf::from("./"),
            output_dir: PathBuf::from("."),
            git_dir: PathBuf::from(".git"),
            index_file: "index.html".to_owned(),
            pinned: Vec::new(),
            pin_class: "pinned".to_owned(),
            repo_date_format: "%Y-%m-%d %H:%M".to_owned(),
            index_head: DEFAULT_INDEX_HEAD.to_owned(),
            index_head_file: None,
            index_foot: DEFAULT_INDEX_FOOT.to_owned(),
            index_foot_file: None,
            repo_template: DEFAULT_REPO_TEMPLATE.to_owned(),
            repo_template_file: None,
            repo_page_head: DEFAULT_REPO_PAGE_HEAD.to_owned(),
            repo_page_head_file: None,
            repo_page_foot: DEFAULT_REPO_PAGE_FOOT.to_owned(),
            repo_page_foot_file: None,
            entry_template: DEFAULT_ENTRY_TEMPLATE.to_owned(),
            entry_template_file: None,
        }
    }
}

impl Config {
    /// Reads the config at `path`. A missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(e).chain_err(|| format!("error opening config file {}", path.display())),
        };
        let mut config = Config::from_json(&data)
            .chain_err(|| format!("error parsing config file {}", path.display()))?;
        config.read_template_files()?;
        Ok(config)
    }

    pub fn from_json(data: &[u8]) -> Result<Config> {
        Ok(serde_json::from_slice(data)?)
    }

    fn read_template_files(&mut self) -> Result<()> {
        let Config {
            index_head,
            index_head_file,
            index_foot,
            index_foot_file,
            repo_template,
            repo_template_file,
            repo_page_head,
            repo_page_head_file,
            repo_page_foot,
            repo_page_foot_file,
            entry_template,
            entry_template_file,
            ..
        } = self;
        let pairs = [
            (index_head, &*index_head_file),
            (index_foot, &*index_foot_file),
            (repo_template, &*repo_template_file),
            (repo_page_head, &*repo_page_head_file),
            (repo_page_foot, &*repo_page_foot_file),
            (entry_template, &*entry_template_file),
        ];
        for (template, file) in pairs {
            if let Some(file) = file {
                *template = std::fs::read_to_string(file)
                    .chain_err(|| format!("error reading template file {}", file.display()))?;
            }
        }
        Ok(())
    }

    /// Position of `name` in the pinned list.
    pub fn pin_position(&self, name: &str) -> Option<usize> {
        self.pinned.iter().position(|p| p == name)
    }

    pub fn git_dir_of(&self, name: &str) -> PathBuf {
        self.repos_dir.join(name).join(&self.git_dir)
    }
}
