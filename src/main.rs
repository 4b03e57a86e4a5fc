// Entry point for the pow-ledger CLI
use clap::Parser;
use log::error;
use pow_ledger::{Command, Ledger, LedgerConfig, Opt};
use std::process;

fn main() {
    let opt = Opt::parse();

    let config = match &opt.config {
        Some(path) => LedgerConfig::from_toml_file(path),
        None => Ok(LedgerConfig::from_env()),
    };

    // RUST_LOG wins over the configured level
    let default_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match config {
        Ok(config) => run_command(&config, opt.command),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(
    config: &LedgerConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Createblockchain { address } => {
            Ledger::create_chain(config, &address)?;
            println!("Done!");
        }
        Command::GetBalance { address } => {
            let ledger = Ledger::open(config)?;
            let balance = ledger.balance_of(&address)?;
            println!("Balance of '{address}': {balance}");
        }
        Command::Send { from, to, amount } => {
            let ledger = Ledger::open(config)?;
            let block = ledger.append_transfer(&from, &to, amount)?;
            println!("Success! Block {}", block.get_hash_hex());
        }
        Command::Mine { address } => {
            let ledger = Ledger::open(config)?;
            let block = ledger.mine_reward(&address)?;
            println!("Mined block {}", block.get_hash_hex());
        }
        Command::Printchain { json } => {
            let ledger = Ledger::open(config)?;
            let chain = ledger.dump_chain()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
            } else {
                for block in chain {
                    println!("Prev. hash: {}", block.prev_hash);
                    println!("Data: {}", block.tx_digest);
                    println!("Hash: {}", block.hash);
                    println!("Timestamp: {}", block.timestamp);
                    println!("Nonce: {}", block.nonce);
                    println!("Transactions: {}", block.transactions);
                    println!("Pow: {}", block.pow_valid);
                    println!();
                }
            }
        }
        Command::Reindexutxo => {
            let ledger = Ledger::open(config)?;
            let count = ledger.reindex()?;
            println!("Done! There are {count} transactions in the UTXO set.");
        }
    }
    Ok(())
}
