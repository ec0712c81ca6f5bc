//! Decode a cross-chain message as carried by a bridge deposit
//!
//! Run with: cargo run --bin decode-message -- 0x<hex>

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use console::style;

use smartpool::crosschain::codec::Message;

#[derive(Parser)]
#[command(name = "decode-message")]
#[command(about = "Decode an ABI-encoded cross-chain pool message", long_about = None)]
struct Cli {
    /// Message bytes, hex with or without 0x prefix
    message: String,

    /// Print as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let raw = cli.message.trim();
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).wrap_err("message is not valid hex")?;
    let message = Message::decode(&bytes)?;

    if cli.json {
        let json = serde_json::json!({
            "opType": message.params.op_type,
            "shouldUnwrapNative": message.params.should_unwrap_native,
            "sourceChainId": message.source_chain_id.to_string(),
            "sourceNav": message.source_nav.to_string(),
            "sourceDecimals": message.source_decimals,
            "navTolerance": message.nav_tolerance.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("{}", style("Cross-chain message (v1)").cyan().bold());
    println!("  op type:              {}", style(message.params.op_type).bold());
    println!("  unwrap native:        {}", message.params.should_unwrap_native);
    println!("  source chain:         {}", message.source_chain_id);
    println!(
        "  source NAV:           {} ({} decimals)",
        message.source_nav, message.source_decimals
    );
    println!("  NAV tolerance:        {} bps", message.nav_tolerance);
    Ok(())
}
