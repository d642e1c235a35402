pub mod commands;
pub mod context;
pub mod output;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

/// Encrypt state and plan files at rest.
#[derive(Parser, Debug)]
#[command(name = "stateseal", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Encryption configuration file
    #[arg(
        long,
        global = true,
        env = "STATESEAL_CONFIG",
        default_value = "encryption.toml"
    )]
    pub config: PathBuf,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt a state or plan file
    Encrypt {
        /// File to encrypt
        file: PathBuf,
        /// Target whose configuration applies: state, plan, backend or remote:<name>
        #[arg(long, short, default_value = "state")]
        target: TargetArg,
        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Decrypt a state or plan file
    Decrypt {
        /// File to decrypt
        file: PathBuf,
        /// Target whose configuration applies: state, plan, backend or remote:<name>
        #[arg(long, short, default_value = "state")]
        target: TargetArg,
        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show whether a file is encrypted and what its envelope holds
    Inspect {
        /// File to inspect
        file: PathBuf,
    },

    /// Validate the encryption configuration and build every target
    Validate,
}

/// Which configured target a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetArg {
    State,
    Plan,
    Backend,
    Remote(String),
}

impl FromStr for TargetArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" => Ok(Self::State),
            "plan" => Ok(Self::Plan),
            "backend" => Ok(Self::Backend),
            other => match other.strip_prefix("remote:") {
                Some(name) if !name.is_empty() => Ok(Self::Remote(name.to_string())),
                _ => Err(format!(
                    "unknown target '{other}'. Use state, plan, backend or remote:<name>"
                )),
            },
        }
    }
}

impl fmt::Display for TargetArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => f.write_str("state"),
            Self::Plan => f.write_str("plan"),
            Self::Backend => f.write_str("backend"),
            Self::Remote(name) => write!(f, "remote:{name}"),
        }
    }
}
