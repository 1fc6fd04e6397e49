//! Bounty client: entry point.
//!
//! ```text
//! bounty_client [watch]           follow bounty changes until Ctrl-C
//! bounty_client stats             print a one-off bounty summary
//! bounty_client show <id>         print one bounty with its description
//! bounty_client convert <amount>  print the Planck value of a token amount
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bounty_client::amount::{format_with_symbol, to_planck};
use bounty_client::config::Config;
use bounty_client::events::{summarize, BountyNotifier};
use bounty_client::rpc::RpcClient;
use bounty_client::watcher::BountyWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("watch") => watch(&config).await,
        Some("stats") => stats(&config).await,
        Some("show") => {
            let id = args
                .get(1)
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| anyhow::anyhow!("usage: bounty_client show <id>"))?;
            show(&config, id).await
        }
        Some("convert") => {
            let amount = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: bounty_client convert <amount>"))?;
            let planck = to_planck(amount, config.token_decimals)?;
            println!("{planck}");
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown command '{other}' (expected watch, stats, show or convert)"),
    }
}

fn rpc_client(config: &Config) -> anyhow::Result<Arc<RpcClient>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.rpc_timeout_secs))
        .build()?;
    Ok(Arc::new(RpcClient::new(client, config)))
}

async fn stats(config: &Config) -> anyhow::Result<()> {
    let rpc = rpc_client(config)?;
    let proposed_ever = rpc.bounty_count().await?;
    let summary = summarize(&rpc.fetch_bounties().await?);

    println!("Bounties proposed (all time): {proposed_ever}");
    println!("Bounties in storage:          {}", summary.total);
    println!("  proposed:                   {}", summary.proposed);
    println!("  active:                     {}", summary.active);
    println!("  pending payout:             {}", summary.pending_payout);
    println!(
        "Total value:                  {}",
        format_with_symbol(summary.total_value, config.token_decimals, &config.token_symbol)
    );
    Ok(())
}

async fn show(config: &Config, id: u32) -> anyhow::Result<()> {
    let rpc = rpc_client(config)?;
    let Some(bounty) = rpc.fetch_bounty(id).await? else {
        anyhow::bail!("bounty #{id} not found");
    };
    let text = rpc.bounty_description(id).await?.unwrap_or_default();

    println!("Bounty #{id}: {}", text.title);
    if !text.description.is_empty() {
        println!("  {}", text.description);
    }
    println!("Status:   {}", bounty.status.as_str());
    println!(
        "Value:    {}",
        format_with_symbol(bounty.value, config.token_decimals, &config.token_symbol)
    );
    println!("Proposer: {}", bounty.proposer);
    Ok(())
}

async fn watch(config: &Config) -> anyhow::Result<()> {
    let rpc = rpc_client(config)?;

    // Refuse to start against a node that cannot serve us.
    rpc.ensure_supported().await?;

    let notifier = Arc::new(BountyNotifier::new(config.update_history));
    let decimals = config.token_decimals;
    let symbol = config.token_symbol.clone();
    notifier.subscribe(move |update| {
        let value = update
            .value
            .map(|v| format_with_symbol(v, decimals, &symbol))
            .unwrap_or_default();
        info!(
            "bounty #{} {} {}",
            update.bounty_id,
            update.kind.as_str(),
            value
        );
    });

    // ─── Background watcher ───────────────────────────────
    let cancel = CancellationToken::new();
    let watcher = BountyWatcher::new(
        Arc::clone(&rpc),
        Arc::clone(&notifier),
        Duration::from_secs(config.poll_interval_secs),
    );
    let handle = tokio::spawn(watcher.run(cancel.clone()));

    info!("Watching bounties on {}", rpc.url());
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel.cancel();
    handle.await?;
    Ok(())
}
