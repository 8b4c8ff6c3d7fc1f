extern crate structopt;

use std::path::PathBuf;
use structopt::StructOpt;

use gitweb::cmd::index::build_index;
use gitweb::cmd::repo::build_repo;
use gitweb::config::Config;
use gitweb::errors::*;

#[derive(Debug, StructOpt)]
#[structopt(name = "gitweb", about = "static html pages for a directory of git repositories")]
struct Opt {
    #[structopt(short = "c", parse(from_os_str))]
    /// Config file location, ~/.gitweb when not given.
    config: Option<PathBuf>,

    #[structopt(short = "r")]
    /// Git repo to build a page for, before the index is rebuilt.
    repo: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let opt = Opt::from_args();
    if let Err((code, ref e)) = run(opt) {
        use std::io::Write;
        use error_chain::ChainedError; // trait which holds `display_chain`
        let stderr = &mut ::std::io::stderr();
        let errmsg = "Error writing to stderr";

        writeln!(stderr, "{}", e.display_chain()).expect(errmsg);
        ::std::process::exit(code);
    }
}

fn config_path(opt: &Opt) -> Result<PathBuf> {
    match opt.config {
        Some(ref path) => Ok(path.clone()),
        None => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".gitweb"))
            .ok_or_else(|| "error getting current user: HOME is not set".into()),
    }
}

fn run(opt: Opt) -> std::result::Result<(), (i32, Error)> {
    let path = config_path(&opt).map_err(|e| (1, e))?;
    let config = Config::load(&path).map_err(|e| (2, e))?;
    if let Some(ref name) = opt.repo {
        build_repo(&config, name).map_err(|e| (2, e))?;
    }
    build_index(&config).map_err(|e| (3, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn opt(config: &Path, repo: Option<&str>) -> Opt {
        Opt {
            config: Some(config.to_path_buf()),
            repo: repo.map(str::to_owned),
        }
    }

    fn write_config(dir: &Path, repos_dir: &Path) -> PathBuf {
        let path = dir.join("gitweb.json");
        let config = serde_json::json!({
            "reposDir": repos_dir,
            "outputDir": dir.join("out"),
        });
        std::fs::write(&path, config.to_string()).unwrap();
        path
    }

    fn exit_code(result: std::result::Result<(), (i32, Error)>) -> i32 {
        match result {
            Ok(()) => 0,
            Err((code, _)) => code,
        }
    }

    #[test]
    fn unreadable_config_exits_with_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitweb.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert_eq!(exit_code(run(opt(&path, None))), 2);
    }

    #[test]
    fn failing_pages_exit_with_2_and_3() {
        let dir = tempfile::tempdir().unwrap();
        let repos = dir.path().join("repos");
        std::fs::create_dir_all(&repos).unwrap();
        let path = write_config(dir.path(), &repos);
        assert_eq!(exit_code(run(opt(&path, None))), 0);
        assert!(dir.path().join("out").join("index.html").is_file());
        assert_eq!(exit_code(run(opt(&path, Some("missing")))), 2);

        let path = write_config(dir.path(), &dir.path().join("no-such-dir"));
        assert_eq!(exit_code(run(opt(&path, None))), 3);
    }
}
