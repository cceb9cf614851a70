use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use eyre::Result as EyreResult;
use proofnet_config::dirs::default_home;

mod hooks;
mod init;
mod run;

use hooks::HooksCommand;
use init::InitCommand;
use run::RunCommand;

pub const AFTER_HELP: &str = r"Environment variables:
  PROOFNET_HOME    Directory for config

Examples:
  # Initialize a publicly reachable node
  $ proofnetd --home data/hub init --gender female --listen 0.0.0.0:7640

  # Initialize a node behind NAT that bootstraps through the hub
  $ proofnetd --home data/desk init --gender male --hook 203.0.113.7:7640

  # Run a node and announce it to the network
  $ proofnetd --home data/hub run --join 203.0.113.9:7640

  # Forget every remembered hook
  $ proofnetd --home data/desk hooks clear
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = AFTER_HELP)]
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
    Hooks(HooksCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config [default: ~/.proofnet]
    #[arg(long, value_name = "PATH")]
    #[arg(env = "PROOFNET_HOME", hide_env_values = true)]
    pub home: Option<Utf8PathBuf>,
}

impl RootArgs {
    pub fn home(&self) -> EyreResult<Utf8PathBuf> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => default_home(),
        }
    }
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Run(run) => run.run(&self.args).await,
            SubCommands::Hooks(hooks) => hooks.run(&self.args),
        }
    }
}
