use std::path::PathBuf;

use clap::{Parser, Subcommand};

use etherscan_plugin::verify::VerificationApproach;

#[derive(Parser, Debug)]
#[command(
    name = "etherscan-plugin",
    about = "Query Etherscan-family explorers and publish contract sources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ecosystem name (ethereum, polygon, arbitrum, ...)
    #[arg(long, global = true, default_value = "ethereum")]
    pub ecosystem: String,

    /// Network name; a `-fork` suffix is ignored
    #[arg(long, global = true, default_value = "mainnet")]
    pub network: String,

    /// Config file [default: ./.etherscan/config.toml, fallback ~/.config/etherscan/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project path
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(long, global = true, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Only print summary lines
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List supported ecosystems and networks
    Networks,

    /// Print the explorer URL of an address
    AddressUrl { address: String },

    /// Print the explorer URL of a transaction
    TxUrl { hash: String },

    /// Show the ABI of a verified contract
    ContractType { address: String },

    /// Print the package manifest built from a verified contract
    Manifest { address: String },

    /// Show the creation transaction of a contract
    Creation { address: String },

    /// List transactions sent by an account
    Transactions {
        account: String,

        #[arg(long, default_value_t = 0)]
        start_nonce: u64,

        #[arg(long, default_value_t = u64::MAX)]
        stop_nonce: u64,
    },

    /// Publish a deployed contract's source to the explorer
    Verify {
        /// Deployed contract address
        address: String,

        /// Contract name inside the build manifest
        #[arg(long)]
        contract: String,

        /// Build manifest (ethPM JSON) holding the contract type and compilers
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,

        /// Contracts folder [default: <project>/contracts]
        #[arg(long)]
        contracts_folder: Option<PathBuf>,

        /// Overrides `[verification] approach` from the config
        #[arg(long)]
        approach: Option<VerificationApproach>,

        /// ABI-encoded constructor arguments (hex)
        #[arg(long)]
        constructor_args: Option<String>,
    },

    /// Fetch a verified contract as a cached dependency package
    Fetch {
        name: String,
        address: String,

        /// Ignore cached manifests
        #[arg(long)]
        no_cache: bool,

        /// Cache root [default: platform cache dir]/etherscan/packages
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Print the explorer license code of a source file, or list all codes
    License { file: Option<PathBuf> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
