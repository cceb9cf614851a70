use clap::{Parser, Subcommand};
use eyre::{bail, Result as EyreResult};
use proofnet_config::ConfigFile;
use tracing::info;

use crate::cli::RootArgs;

/// Inspect or reset the remembered bootstrap addresses
#[derive(Debug, Parser)]
pub struct HooksCommand {
    #[command(subcommand)]
    pub action: HooksAction,
}

#[derive(Debug, Subcommand)]
pub enum HooksAction {
    /// Print every remembered hook
    #[command(alias = "ls")]
    List,
    /// Forget every remembered hook
    Clear,
}

impl HooksCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let path = root_args.home()?;

        if !ConfigFile::exists(&path) {
            bail!("Node is not initialized in {path:?}");
        }

        let mut config = ConfigFile::load(&path)?;

        match self.action {
            HooksAction::List => {
                for hook in &config.network.hooks {
                    println!("{hook}");
                }
            }
            HooksAction::Clear => {
                let cleared = config.network.hooks.len();
                config.network.hooks.clear();
                config.save(&path)?;

                info!(cleared, "cleared hooks");
            }
        }

        Ok(())
    }
}
