use std::fs::create_dir_all;

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use podindex_config::ConfigFile;
use tracing::{info, warn};

use crate::cli::RootArgs;

/// Write a default configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let path = &root_args.home;

        if ConfigFile::exists(path) {
            if !self.force {
                bail!("Configuration already exists in {path:?}, use --force to overwrite");
            }
            warn!(%path, "Overwriting existing configuration");
        }

        create_dir_all(path).wrap_err_with(|| format!("failed to create {path:?}"))?;

        ConfigFile::default().save(path)?;

        info!(%path, "Initialized configuration");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempdir::TempDir;

    use super::*;

    fn args(dir: &TempDir) -> RootArgs {
        RootArgs {
            home: Utf8PathBuf::from_path_buf(dir.path().join("home")).unwrap(),
        }
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new("podindexd").unwrap();
        let args = args(&dir);

        InitCommand { force: false }.run(&args).unwrap();

        let config = ConfigFile::load(&args.home).unwrap();
        assert!(config.crosscheck.enabled);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new("podindexd").unwrap();
        let args = args(&dir);

        InitCommand { force: false }.run(&args).unwrap();

        assert!(InitCommand { force: false }.run(&args).is_err());
        InitCommand { force: true }.run(&args).unwrap();
    }
}
