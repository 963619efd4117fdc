//! Quote tool: seed a pool from a config file and print a quote as JSON

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lmsr::rounding::{mul_fixed_floor, to_internal};
use lmsr::{decimal_to_fixed, FastSwapQuote, Pool, QuoteReport};
use lmsr_config::PoolConfig;
use rust_decimal::Decimal;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pool configuration file path
    #[arg(short, long, default_value = "config/pool.toml")]
    config: PathBuf,

    /// Initial deposits in pool order, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    deposits: Vec<u128>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exact-input swap
    Swap {
        /// Input asset symbol
        from: String,
        /// Output asset symbol
        to: String,
        /// Gross input amount, fee included
        amount: u128,
        /// Optional marginal-rate limit
        #[arg(long)]
        limit: Option<Decimal>,
    },
    /// Single-asset deposit
    Mint {
        asset: String,
        amount: u128,
    },
    /// Single-asset withdrawal of a fraction of the LP supply
    Burn {
        asset: String,
        /// Fraction of the LP supply to redeem, in (0, 1]
        fraction: Decimal,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lmsr=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = PoolConfig::load(&args.config)
        .with_context(|| format!("Failed to load pool config {:?}", args.config))?;

    let mut pool = Pool::from_config(&config).context("Invalid pool parameters")?;
    pool.initialize(&args.deposits).context("Failed to seed pool")?;
    info!(assets = config.assets.len(), lp = pool.lp_supply(), "Pool seeded");

    let output = match args.command {
        Command::Swap { from, to, amount, limit } => {
            let i = asset(&config, &from)?;
            let j = asset(&config, &to)?;
            let limit = limit.map(decimal_to_fixed).transpose()?;
            let receipt = pool.quote_swap(i, j, amount, limit)?;

            let net = to_internal(receipt.amount_in - receipt.fee, pool.bases()[i])?;
            let quote = FastSwapQuote {
                quote: pool.state().quote_swap_exact_input(i, j, net, limit)?,
                path: receipt.path,
            };
            let report = QuoteReport::swap(pool.state(), i, j, &quote)?;
            json!({ "receipt": receipt, "report": report })
        }
        Command::Mint { asset: symbol, amount } => {
            let i = asset(&config, &symbol)?;
            let receipt = pool.quote_mint_single(i, amount)?;
            let net = to_internal(receipt.amount_in - receipt.fee, pool.bases()[i])?;
            let report = QuoteReport::mint(i, &pool.state().quote_mint(i, net)?);
            json!({ "receipt": receipt, "report": report })
        }
        Command::Burn { asset: symbol, fraction } => {
            let i = asset(&config, &symbol)?;
            if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
                bail!("fraction must be in (0, 1], got {}", fraction);
            }
            let fraction = decimal_to_fixed(fraction)?;
            let lp = mul_fixed_floor(fraction, pool.lp_supply())?;
            let receipt = pool.quote_burn_single(i, lp)?;
            let report = QuoteReport::burn(i, &pool.state().quote_burn(i, fraction)?);
            json!({ "receipt": receipt, "report": report })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn asset(config: &PoolConfig, symbol: &str) -> Result<usize> {
    config
        .asset_index(symbol)
        .with_context(|| format!("Unknown asset {}", symbol))
}
