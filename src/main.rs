//! Smart Pool simulator
//!
//! Run with: cargo run -- simulate
//!
//! Deploys the same pool on two in-process chains, invests in both, then
//! walks a Transfer through the bridge and lets a Sync deposit expire and
//! come back through the escrow, printing the NAV after every step.

use alloy_primitives::{address, Address, U256};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alloy_sol_types::SolCall;
use smartpool::abi::{AcrossParams, IAIntents, IECrosschain};
use smartpool::config::Config;
use smartpool::crosschain::bridge::{Relayer, SpokePool};
use smartpool::crosschain::codec::{DestinationParams, OpType, SourceParams};
use smartpool::events::EventRecord;
use smartpool::oracle::{pow10, PriceFeedOracle};
use smartpool::pool::storage::PoolParams;
use smartpool::tokens::{self, DAI, GRG, USDC, USDT, WBTC};
use smartpool::Chain;

const OWNER: Address = address!("00000000000000000000000000000000000a11ce");
const INVESTOR: Address = address!("000000000000000000000000000000000000a1a1");
const RELAYER: Address = address!("000000000000000000000000000000000000f111");
const KEEPER: Address = address!("000000000000000000000000000000000000cee9");

#[derive(Parser)]
#[command(name = "smartpool")]
#[command(about = "Smart pool NAV and cross-chain accounting simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to environment / .env)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two-chain bridge scenario
    Simulate {
        /// Chain ID of the destination chain
        #[arg(long, default_value_t = 10)]
        destination_chain_id: u64,

        /// USDC (whole units) each investor puts in per chain
        #[arg(long, default_value_t = 10_000)]
        investment: u64,

        /// USDC (whole units) bridged by the Transfer
        #[arg(long, default_value_t = 2_500)]
        transfer: u64,

        /// ETH price in USD used by the oracle
        #[arg(long, default_value_t = 2_000)]
        eth_usd: u64,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to this TOML file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" SMART POOL - NAV & Cross-chain Simulator").cyan().bold());
    println!(
        "{}",
        style("    Extensions | Adapters | Escrow refunds").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn usdc(units: u64) -> U256 {
    U256::from(units) * pow10(6)
}

fn format_usdc(amount: U256) -> String {
    let whole = amount / pow10(6);
    let frac = amount % pow10(6);
    format!("{}.{:06}", whole, frac)
}

/// Oracle quoting every token in ETH at the given ETH/USD price.
fn build_oracle(wrapped_native: Address, eth_usd: u64) -> Result<Arc<PriceFeedOracle>> {
    if eth_usd == 0 {
        return Err(eyre!("--eth-usd must be non-zero"));
    }
    let oracle = PriceFeedOracle::new(wrapped_native);
    let usd = pow10(18) / U256::from(eth_usd);
    let feeds = [
        (USDC, usd),
        (USDT, usd),
        (DAI, usd),
        (WBTC, usd * U256::from(60_000u64)),
        (GRG, usd / U256::from(4u64)),
    ];
    for (address, price) in feeds {
        let token = tokens::get_token(&address).ok_or_else(|| eyre!("unknown token {}", address))?;
        oracle.update_price(token.address, price, token.decimals);
    }
    Ok(Arc::new(oracle))
}

fn pool_params() -> PoolParams {
    PoolParams {
        name: "USDC Growth".into(),
        symbol: "UGRO".into(),
        owner: OWNER,
        base_token: USDC,
        decimals: 6,
    }
}

fn print_nav(chain: &mut Chain, pool: Address, label: &str) -> Result<()> {
    let nav = chain.update_unitary_value(KEEPER, pool)?;
    println!(
        "   {} chain {:>4}: unitary value {} USDC, supply {}, pool USDC {}",
        style(label).dim(),
        chain.chain_id(),
        style(format_usdc(nav.unitary_value)).bold(),
        format_usdc(nav.total_supply),
        format_usdc(chain.balance(USDC, pool)),
    );
    Ok(())
}

fn deposit_calldata(op_type: OpType, amount: U256, destination_chain_id: u64, tolerance: u64) -> Vec<u8> {
    IAIntents::depositV3Call {
        params: AcrossParams {
            inputToken: USDC,
            outputToken: USDC,
            inputAmount: amount,
            // relayer keeps 5 bps
            outputAmount: amount - amount * U256::from(5u64) / U256::from(10_000u64),
            destinationChainId: U256::from(destination_chain_id),
            fillDeadline: 0,
            sourceParams: SourceParams {
                op_type,
                nav_tolerance: U256::from(tolerance),
                source_native_amount: U256::ZERO,
                should_unwrap_on_destination: false,
            }
            .into(),
        },
    }
    .abi_encode()
}

fn donate_calldata(token: Address, amount: U256, op_type: OpType) -> Vec<u8> {
    IECrosschain::donateCall {
        token,
        amount,
        params: DestinationParams {
            op_type,
            should_unwrap_native: false,
        }
        .into(),
    }
    .abi_encode()
}

fn journal(config: &Config, chains: &[&Chain]) -> Result<()> {
    if !config.event_log {
        return Ok(());
    }
    let mut written = 0usize;
    for chain in chains {
        for event in chain.events() {
            EventRecord::new(chain.chain_id(), event.clone()).append_to_file(&config.event_log_path)?;
            written += 1;
        }
    }
    info!(events = written, path = %config.event_log_path, "event journal written");
    Ok(())
}

fn simulate(
    config: &Config,
    destination_chain_id: u64,
    investment: u64,
    transfer: u64,
    eth_usd: u64,
) -> Result<()> {
    let source_config = config.chain_config()?;
    if destination_chain_id == source_config.chain_id {
        return Err(eyre!("destination chain must differ from CHAIN_ID"));
    }
    if transfer >= investment {
        return Err(eyre!("--transfer must be smaller than --investment"));
    }
    let mut destination_config = source_config.clone();
    destination_config.chain_id = destination_chain_id;

    let oracle = build_oracle(source_config.wrapped_native, eth_usd)?;
    let mut source = Chain::new(source_config, oracle.clone());
    let mut destination = Chain::new(destination_config, oracle);

    // =============================================
    // STEP 1: DEPLOY AND INVEST
    // =============================================
    println!("{}", style("═══ STEP 1: DEPLOY AND INVEST ═══").blue().bold());
    let pool = source.deploy_pool(pool_params())?;
    let remote = destination.deploy_pool(pool_params())?;
    if pool != remote {
        return Err(eyre!("pool addresses differ across chains"));
    }
    println!("{} Pool {} deployed on both chains", style("✓").green(), pool);

    for chain in [&mut source, &mut destination] {
        chain.state_mut().ledger.mint(USDC, INVESTOR, usdc(investment));
        let shares = chain.mint(INVESTOR, pool, INVESTOR, usdc(investment), U256::ZERO)?;
        println!(
            "{} Chain {}: minted {} shares for {} USDC",
            style("✓").green(),
            chain.chain_id(),
            format_usdc(shares),
            investment
        );
    }
    destination.state_mut().ledger.mint(USDC, RELAYER, usdc(investment));

    // 1% of the investment arrives as DAI and is booked as value
    let gain = U256::from(investment) * pow10(18) / U256::from(100u64);
    source.state_mut().ledger.mint(DAI, OWNER, gain);
    let register = donate_calldata(DAI, U256::from(1u64), OpType::Sync);
    let credit = donate_calldata(DAI, gain, OpType::Sync);
    source.transact(OWNER, |tx| {
        tx.call(OWNER, pool, &register)?;
        tx.state.ledger.transfer(DAI, OWNER, pool, gain)?;
        tx.call(OWNER, pool, &credit)
    })?;
    println!(
        "{} Donated {} DAI, active tokens on source: {}",
        style("✓").green(),
        investment / 100,
        source
            .pool(pool)
            .map(|p| p.active_tokens.len())
            .unwrap_or_default()
    );
    print_nav(&mut source, pool, "source     ")?;
    print_nav(&mut destination, pool, "destination")?;
    println!();

    // =============================================
    // STEP 2: TRANSFER THROUGH THE BRIDGE
    // =============================================
    println!("{}", style("═══ STEP 2: TRANSFER ═══").magenta().bold());
    let calldata = deposit_calldata(OpType::Transfer, usdc(transfer), destination_chain_id, 0);
    source.call(OWNER, pool, &calldata)?;
    let transfer_id = last_deposit(&source)?;
    println!(
        "{} Deposit #{} of {} USDC escrowed by the spoke pool",
        style("✓").green(),
        transfer_id,
        transfer
    );

    Relayer::new(RELAYER).fill(&mut source, &mut destination, transfer_id)?;
    println!("{} Relayer filled deposit #{}", style("✓").green(), transfer_id);
    print_nav(&mut source, pool, "source     ")?;
    print_nav(&mut destination, pool, "destination")?;
    println!();

    // =============================================
    // STEP 3: SYNC THAT EXPIRES
    // =============================================
    println!("{}", style("═══ STEP 3: EXPIRED SYNC AND ESCROW REFUND ═══").green().bold());
    let tolerance = config.max_nav_tolerance_bps.min(100);
    let calldata = deposit_calldata(OpType::Sync, usdc(transfer / 2), destination_chain_id, tolerance);
    source.call(OWNER, pool, &calldata)?;
    let sync_id = last_deposit(&source)?;
    print_nav(&mut source, pool, "in flight  ")?;

    source.advance_time(u64::from(config.fill_window_secs) + 1);
    SpokePool::expire(&mut source, sync_id)?;
    let escrow = source
        .state()
        .spoke_pool
        .get(sync_id)
        .map(|d| d.refund_address)
        .ok_or_else(|| eyre!("deposit #{} vanished", sync_id))?;
    println!(
        "{} Deposit #{} expired, {} USDC sitting in escrow {}",
        style("✓").green(),
        sync_id,
        format_usdc(source.balance(USDC, escrow)),
        escrow
    );

    source.refund_vault(KEEPER, escrow, USDC)?;
    println!("{} Escrow flushed back into the pool", style("✓").green());
    print_nav(&mut source, pool, "source     ")?;
    println!();

    journal(config, &[&source, &destination])?;

    println!(
        "{} {} events on chain {}, {} on chain {}",
        style("Done.").green().bold(),
        source.events().len(),
        source.chain_id(),
        destination.events().len(),
        destination.chain_id()
    );
    for token in [USDC, tokens::WETH] {
        info!(token = %tokens::label(&token), balance = %source.balance(token, pool), "source pool balance");
    }
    Ok(())
}

fn last_deposit(chain: &Chain) -> Result<u32> {
    chain
        .state()
        .spoke_pool
        .deposits()
        .map(|(id, _)| id)
        .last()
        .ok_or_else(|| eyre!("no deposit recorded"))
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartpool=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    match cli.command {
        Commands::Simulate {
            destination_chain_id,
            investment,
            transfer,
            eth_usd,
        } => {
            print_banner();
            config.print_summary();
            println!();
            simulate(&config, destination_chain_id, investment, transfer, eth_usd)
        }
        Commands::Config { write } => {
            config.print_summary();
            if let Some(path) = write {
                config.save_to_file(&path)?;
                println!("{} Written to {}", style("✓").green(), path.display());
            }
            Ok(())
        }
    }
}
