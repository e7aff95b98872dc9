//! `etherscan-plugin` — command line front end for the explorer adapter.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Initialise logging from `RUST_LOG` or `--log-level`.
//! 3. Load config ([`etherscan_plugin::config::load_config`]).
//! 4. Resolve the explorer for `--ecosystem` / `--network`.
//! 5. Run the subcommand and render its result as a table or JSON.

mod cli;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command, ReportFormat};
use etherscan_plugin::config::{load_config, EtherscanConfig};
use etherscan_plugin::dependency::{EtherscanDependency, ManifestCache};
use etherscan_plugin::license::classifier::license_from_file;
use etherscan_plugin::license::spdx;
use etherscan_plugin::models::{checksum_address, PackageManifest};
use etherscan_plugin::networks::ECOSYSTEMS;
use etherscan_plugin::query::EtherscanQueryEngine;
use etherscan_plugin::report::terminal;
use etherscan_plugin::verify::VerificationRequest;
use etherscan_plugin::Etherscan;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    let project = cli
        .project
        .canonicalize()
        .unwrap_or_else(|_| cli.project.clone());
    let config = load_config(&project, cli.config.as_deref())?;

    match &cli.command {
        Command::Networks => match cli.report {
            ReportFormat::Terminal => terminal::render_networks(ECOSYSTEMS, cli.quiet)?,
            ReportFormat::Json => {
                let rows: Vec<_> = ECOSYSTEMS
                    .iter()
                    .flat_map(|eco| {
                        eco.networks.iter().map(move |net| {
                            serde_json::json!({
                                "ecosystem": eco.name,
                                "network": net.name,
                                "chain_id": net.chain_id,
                                "explorer": format!("https://{}", net.explorer),
                            })
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        },

        Command::AddressUrl { address } => {
            println!("{}", explorer(&cli, &config)?.get_address_url(address));
        }

        Command::TxUrl { hash } => {
            println!("{}", explorer(&cli, &config)?.get_transaction_url(hash));
        }

        Command::ContractType { address } => {
            let explorer = explorer(&cli, &config)?;
            let contract_type = explorer
                .get_contract_type(address)
                .await?
                .ok_or_else(|| anyhow!("Contract '{}' is not verified", address))?;
            match cli.report {
                ReportFormat::Terminal => {
                    let url = format!("{}#code", explorer.get_address_url(&checksum_address(address)?));
                    terminal::render_contract_type(address, &contract_type, &url)?;
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&contract_type)?),
            }
        }

        Command::Manifest { address } => {
            let manifest = explorer(&cli, &config)?
                .get_manifest(address)
                .await?
                .ok_or_else(|| anyhow!("Contract '{}' is not verified", address))?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }

        Command::Creation { address } => {
            let explorer = explorer(&cli, &config)?;
            let engine = EtherscanQueryEngine::new(explorer.client_factory().clone());
            let creation = engine.contract_creation(address).await?;
            match cli.report {
                ReportFormat::Terminal => terminal::render_creation(creation.as_ref(), explorer.instance())?,
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&creation)?),
            }
        }

        Command::Transactions {
            account,
            start_nonce,
            stop_nonce,
        } => {
            let explorer = explorer(&cli, &config)?;
            let engine = EtherscanQueryEngine::new(explorer.client_factory().clone());
            let receipts = engine
                .account_transactions(account, *start_nonce, *stop_nonce)
                .await?;
            match cli.report {
                ReportFormat::Terminal => {
                    terminal::render_transactions(explorer.instance(), account, &receipts, cli.quiet)?
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&receipts)?),
            }
        }

        Command::Verify {
            address,
            contract,
            manifest,
            contracts_folder,
            approach,
            constructor_args,
        } => {
            let build: PackageManifest = serde_json::from_str(
                &std::fs::read_to_string(manifest)
                    .with_context(|| format!("reading {}", manifest.display()))?,
            )?;
            let contract_type = build
                .contract_types
                .get(contract)
                .cloned()
                .ok_or_else(|| anyhow!("Contract type '{}' not found in {}", contract, manifest.display()))?;

            let request = VerificationRequest {
                address: checksum_address(address)?,
                contract_type,
                contracts_folder: contracts_folder
                    .clone()
                    .unwrap_or_else(|| project.join("contracts")),
                compilers: build.compilers,
                approach: approach.unwrap_or(config.verification.approach),
                constructor_arguments: constructor_args.clone(),
            };

            let explorer = explorer(&cli, &config)?;
            let spinner = spinner(cli.quiet, format!("Verifying {}...", contract))?;
            let result = explorer.publish_contract(request).await;
            if let Some(pb) = &spinner {
                pb.finish_and_clear();
            }

            let url = result?;
            println!(" {} Contract verification successful!", "✓".green());
            println!(" {}", url);
        }

        Command::Fetch {
            name,
            address,
            no_cache,
            cache_dir,
        } => {
            let dependency = EtherscanDependency {
                ecosystem: cli.ecosystem.clone(),
                network: cli.network.clone(),
                ..EtherscanDependency::new(name.clone(), address.clone())
            };
            let cache = cache_dir
                .clone()
                .map(ManifestCache::new)
                .unwrap_or_default();

            let explorer = dependency.explorer(&config)?;
            let manifest = dependency
                .extract_manifest(&explorer, &cache, !no_cache)
                .await?;

            match cli.report {
                ReportFormat::Terminal => {
                    println!(
                        " {} {} ({}) {} sources, {}",
                        "→".cyan(),
                        name,
                        dependency.version_id(),
                        manifest.sources.len(),
                        dependency.uri(&config)?
                    );
                    println!("   {}", cache.path(name, &dependency.version_id()).display());
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
            }
        }

        Command::License { file } => match file {
            Some(file) => {
                let license = license_from_file(file)?;
                println!("{} ({})", license.code(), license);
            }
            None => terminal::render_licenses(&spdx::ALL)?,
        },
    }

    Ok(())
}

fn explorer(cli: &Cli, config: &EtherscanConfig) -> Result<Etherscan> {
    Ok(Etherscan::new(config, &cli.ecosystem, &cli.network)?)
}

/// `RUST_LOG` wins over `--log-level`.
fn setup_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn spinner(quiet: bool, message: String) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(Some(pb))
}
