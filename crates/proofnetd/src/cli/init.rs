use std::fs::create_dir_all;
use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use eyre::{bail, Result as EyreResult, WrapErr};
use proofnet_config::ConfigFile;
use proofnet_network::config::DEFAULT_PORT;
use proofnet_primitives::gender::Gender;
use tracing::{info, warn};

use crate::cli::RootArgs;

#[derive(Clone, Copy, Debug, ValueEnum)]
#[clap(rename_all = "lower")]
pub enum GenderArg {
    /// Dials out only, for nodes behind NAT
    Male,
    /// Publicly reachable, accepts connections
    Female,
}

impl From<GenderArg> for Gender {
    fn from(value: GenderArg) -> Self {
        match value {
            GenderArg::Male => Self::Male,
            GenderArg::Female => Self::Female,
        }
    }
}

/// Initialize node configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    #[arg(long, value_enum, default_value_t = GenderArg::Male)]
    pub gender: GenderArg,

    /// Address a Female node listens on
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Address announced to peers when it differs from the listen address
    #[arg(long, value_name = "ADDR")]
    pub public_address: Option<SocketAddr>,

    /// Bootstrap address, may be repeated
    #[arg(long = "hook", value_name = "ADDR")]
    pub hooks: Vec<SocketAddr>,

    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let path = root_args.home()?;

        if ConfigFile::exists(&path) {
            if !self.force {
                bail!("Node is already initialized in {path:?}, use --force to overwrite");
            }
            warn!(%path, "overwriting existing configuration");
        }

        create_dir_all(&path)
            .wrap_err_with(|| format!("failed to create directory {path:?}"))?;

        let gender = Gender::from(self.gender);
        let listen = match gender {
            Gender::Female => Some(
                self.listen
                    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))),
            ),
            Gender::Male => {
                if self.listen.is_some() {
                    bail!("a Male node does not listen, drop --listen or use --gender female");
                }
                None
            }
        };

        let mut config = ConfigFile::generate(gender, listen, self.hooks);
        config.network.public_address = self.public_address;

        config.save(&path)?;

        info!(
            node_id=%config.identity.node_id,
            ?gender,
            %path,
            "initialized node configuration"
        );

        Ok(())
    }
}
