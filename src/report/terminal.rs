use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use serde_json::Value;

use crate::license::LicenseType;
use crate::models::{ContractCreation, ContractType, Receipt};
use crate::networks::{EcosystemInfo, EtherscanInstance};

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(titles));
    table
}

fn banner(title: &str) {
    println!("\n {} v{}", "etherscan-plugin".bold(), env!("CARGO_PKG_VERSION"));
    println!(" {}\n", title);
}

/// Every supported ecosystem and network with its explorer host.
pub fn render_networks(ecosystems: &[EcosystemInfo], quiet: bool) -> Result<()> {
    if quiet {
        for eco in ecosystems {
            for net in eco.networks {
                println!("{}:{}", eco.name, net.name);
            }
        }
        return Ok(());
    }

    banner("Supported explorers");
    println!("{}", networks_table(ecosystems));
    Ok(())
}

pub fn networks_table(ecosystems: &[EcosystemInfo]) -> Table {
    let mut table = new_table(&["Ecosystem", "Network", "Chain ID", "Explorer", "API key"]);
    for eco in ecosystems {
        for net in eco.networks {
            table.add_row(vec![
                Cell::new(eco.name).fg(Color::Cyan),
                Cell::new(net.name),
                Cell::new(net.chain_id).set_alignment(CellAlignment::Right),
                Cell::new(format!("https://{}", net.explorer)),
                Cell::new(eco.api_key_env).fg(Color::DarkGrey),
            ]);
        }
    }
    table
}

pub fn render_transactions(
    instance: &EtherscanInstance,
    account: &str,
    receipts: &[Receipt],
    quiet: bool,
) -> Result<()> {
    let failed = receipts.iter().filter(|r| r.status == 0).count();
    if quiet {
        println!(
            "Total: {}  Success: {}  Failed: {}",
            receipts.len(),
            (receipts.len() - failed).to_string().green(),
            failed.to_string().red(),
        );
        return Ok(());
    }

    banner(&format!("Transactions of {} on {}:{}", account, instance.ecosystem, instance.network));
    if receipts.is_empty() {
        println!(" {} No transactions in range.\n", "→".cyan());
        return Ok(());
    }

    println!("{}\n", transactions_table(instance, receipts));
    println!(
        " {} {} transactions, {} failed\n",
        "→".cyan(),
        receipts.len(),
        failed
    );
    Ok(())
}

pub fn transactions_table(instance: &EtherscanInstance, receipts: &[Receipt]) -> Table {
    let mut table = new_table(&["Nonce", "Block", "To", "Gas used", "Status", "Link"]);
    for receipt in receipts {
        let (status, color) = if receipt.status == 1 {
            ("✓ success", Color::Green)
        } else {
            ("✗ failed", Color::Red)
        };
        let to = receipt
            .receiver
            .as_deref()
            .or(receipt.contract_address.as_deref())
            .unwrap_or("-");

        table.add_row(vec![
            Cell::new(receipt.nonce.map_or("-".to_string(), |n| n.to_string()))
                .set_alignment(CellAlignment::Right),
            Cell::new(receipt.block_number).set_alignment(CellAlignment::Right),
            Cell::new(to),
            Cell::new(receipt.gas_used).set_alignment(CellAlignment::Right),
            Cell::new(status).fg(color).set_alignment(CellAlignment::Center),
            Cell::new(instance.transaction_url(&receipt.txn_hash)).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Contract name plus a table of its ABI entries.
pub fn render_contract_type(address: &str, contract_type: &ContractType, url: &str) -> Result<()> {
    banner(&format!("Contract {}", address));
    println!(" {}  {}", "Name:".bold(), contract_type.name());
    println!(" {}  {}\n", "Code:".bold(), url);
    println!("{}\n", abi_table(&contract_type.abi));
    Ok(())
}

pub fn abi_table(abi: &[Value]) -> Table {
    let mut table = new_table(&["Type", "Name", "Inputs", "Mutability"]);
    for entry in abi {
        let kind = entry.get("type").and_then(Value::as_str).unwrap_or("function");
        let color = match kind {
            "function" => Color::Cyan,
            "event" => Color::Yellow,
            "error" => Color::Red,
            _ => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(kind).fg(color),
            Cell::new(entry.get("name").and_then(Value::as_str).unwrap_or("")),
            Cell::new(input_signature(entry)),
            Cell::new(entry.get("stateMutability").and_then(Value::as_str).unwrap_or("")),
        ]);
    }
    table
}

/// Comma-separated input types, e.g. `address,uint256`.
fn input_signature(entry: &Value) -> String {
    entry
        .get("inputs")
        .and_then(Value::as_array)
        .map(|inputs| {
            inputs
                .iter()
                .filter_map(|i| i.get("type").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

pub fn render_creation(creation: Option<&ContractCreation>, instance: &EtherscanInstance) -> Result<()> {
    let Some(creation) = creation else {
        println!(" {} No creation data found.", "[WARN]".yellow().bold());
        return Ok(());
    };

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "CONTRACT CREATION".bold());
    println!(" └────────────────────────────────────────────────────┘");
    println!("  Contract : {}", creation.contract_address);
    println!("  Creator  : {}", creation.contract_creator);
    println!("  Tx       : {}", instance.transaction_url(&creation.tx_hash));
    println!();
    Ok(())
}

/// Explorer license codes with their names.
pub fn render_licenses(licenses: &[LicenseType]) -> Result<()> {
    let mut table = new_table(&["Code", "License"]);
    for license in licenses {
        table.add_row(vec![
            Cell::new(license.code()).set_alignment(CellAlignment::Right),
            Cell::new(license.to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}
