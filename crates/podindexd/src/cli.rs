use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use const_format::concatcp;
use eyre::Result as EyreResult;

use crate::defaults;

mod init;
mod run;

use init::InitCommand;
use run::RunCommand;

pub const EXAMPLES: &str = r"
  # Write a default configuration
  $ podindexd --home data/ init

  # Sync the registry and serve the index
  $ GH_TOKEN=... podindexd --home data/ run

  # Serve on a different address
  $ podindexd --home data/ run --listen 0.0.0.0:8080
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  PODINDEX_HOME    Directory for config\n",
    "  GH_TOKEN         Access token for the upstream API\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    #[command(alias = "up")]
    Run(RunCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config
    #[arg(long, value_name = "PATH", default_value_t = defaults::default_home_dir())]
    #[arg(env = "PODINDEX_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Run(run) => run.run(self.args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let command = RootCommand::try_parse_from([
            "podindexd",
            "--home",
            "data",
            "run",
            "--token",
            "abc",
            "--listen",
            "0.0.0.0:8080",
            "--listen",
            "[::]:8080",
        ])
        .unwrap();

        assert_eq!(command.args.home, Utf8PathBuf::from("data"));

        let SubCommands::Run(run) = command.action else {
            panic!("expected run");
        };
        assert_eq!(run.token.as_deref(), Some("abc"));
        assert_eq!(run.listen.len(), 2);
    }

    #[test]
    fn test_up_is_an_alias_for_run() {
        let command = RootCommand::try_parse_from(["podindexd", "--home", "data", "up"]).unwrap();

        assert!(matches!(command.action, SubCommands::Run(_)));
    }

    #[test]
    fn test_init_force() {
        let command = RootCommand::try_parse_from([
            "podindexd",
            "--home",
            "data",
            "init",
            "--force",
        ])
        .unwrap();

        let SubCommands::Init(init) = command.action else {
            panic!("expected init");
        };
        assert!(init.force);
    }
}
