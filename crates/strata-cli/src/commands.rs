use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use strata_crypto::Wallet;
use strata_registry::names::parse_digest;
use strata_registry::{Organization, Registry, RegistryContext};
use strata_server::{ServerConfig, StrataServer};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(wallet) = cli.wallet.clone() {
        config.wallet_file = Some(wallet);
    }
    tracing::debug!(
        application = %config.registry.application_name,
        gateway = %config.registry.gateway_url,
        "configuration loaded",
    );
    let format = cli.format;

    match cli.command {
        Command::Keygen(args) => cmd_keygen(args, format),
        Command::Address => cmd_address(&config, format),
        Command::Org(args) => match args.action {
            OrgAction::Show { org } => cmd_org_show(&config, &org, format).await,
            OrgAction::Set {
                org,
                users,
                homepage,
            } => {
                let registry = registry(&config, load_wallet(&config)?)?;
                let id = registry
                    .update_organization(&org, users, homepage.as_deref())
                    .await?;
                print(format, json!({ "org": org, "tx_id": id.to_string() }), || {
                    println!("{} Submitted update for {}", "✓".green().bold(), org.bold());
                    println!("  Record: {}", id.to_string().yellow());
                });
                Ok(())
            }
        },
        Command::Tag(args) => match args.action {
            TagAction::Resolve { org, artifact, tag } => {
                let registry = registry(&config, Wallet::generate())?;
                let digest = registry.index().resolve_tag(&org, &artifact, &tag).await?;
                let shown = digest.as_ref().map(|d| d.to_string());
                print(format, json!({ "tag": tag, "digest": shown }), || match &shown {
                    Some(d) => println!("{org}/{artifact}:{tag} -> {}", d.yellow()),
                    None => println!("{org}/{artifact}:{tag} {}", "not found".red()),
                });
                Ok(())
            }
        },
        Command::Blob(args) => match args.action {
            BlobAction::Locate {
                org,
                artifact,
                digest,
            } => {
                let digest = parse_digest(&digest)?;
                let registry = registry(&config, Wallet::generate())?;
                let locator = registry.locate_blob(&org, &artifact, &digest).await?;
                let value = match &locator {
                    Some(l) => json!({
                        "digest": digest.to_string(),
                        "tx_id": l.tx_id.to_string(),
                        "url": l.url,
                    }),
                    None => json!({ "digest": digest.to_string(), "url": null }),
                };
                print(format, value, || match &locator {
                    Some(l) => println!("{} {}", digest.short().yellow(), l.url.blue()),
                    None => println!("{} {}", digest.short().yellow(), "not found".red()),
                });
                Ok(())
            }
        },
        Command::Serve => {
            let server = StrataServer::from_config(config)?;
            server.serve().await?;
            Ok(())
        }
    }
}

fn cmd_keygen(args: KeygenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let wallet = Wallet::generate();
    wallet
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    let path = args.out.display().to_string();
    print(
        format,
        json!({ "address": wallet.address().as_str(), "path": path }),
        || {
            println!("{} Wrote {}", "✓".green().bold(), path.bold());
            println!("  Address: {}", wallet.address().as_str().cyan());
        },
    );
    Ok(())
}

fn cmd_address(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let wallet = load_wallet(config)?;
    print(format, json!({ "address": wallet.address().as_str() }), || {
        println!("{}", wallet.address().as_str())
    });
    Ok(())
}

async fn cmd_org_show(
    config: &ServerConfig,
    org: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let registry = registry(config, Wallet::generate())?;
    let state = registry.existing_organization(org).await?;
    print(format, org_json(&state), || print_org(&state));
    Ok(())
}

fn org_json(org: &Organization) -> serde_json::Value {
    json!({
        "name": org.name,
        "homepage": org.homepage,
        "authorized_users": org.authorized_users.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
    })
}

fn print_org(org: &Organization) {
    println!("Organization {}", org.name.bold());
    if !org.homepage.is_empty() {
        println!("  Homepage: {}", org.homepage.blue());
    }
    if org.authorized_users.is_empty() {
        println!("  {}", "No authorized users (frozen)".yellow());
    }
    for user in &org.authorized_users {
        println!("  {} {}", "member".green(), user.as_str());
    }
}

fn load_wallet(config: &ServerConfig) -> anyhow::Result<Wallet> {
    let path = config
        .wallet_file
        .as_deref()
        .context("no wallet configured; pass --wallet or set STRATA_WALLET_FILE")?;
    Wallet::load(path).with_context(|| format!("loading wallet {}", path.display()))
}

fn registry(config: &ServerConfig, wallet: Wallet) -> anyhow::Result<Registry> {
    let ctx = RegistryContext::http(config.registry.clone(), wallet)?;
    Ok(Registry::new(ctx))
}

fn print(format: OutputFormat, value: serde_json::Value, text: impl FnOnce()) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Text => text(),
    }
}
