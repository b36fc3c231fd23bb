//! sbu-accounts - List connected social accounts and their capabilities

use clap::Parser;
use libsocialbu::logging::{LogFormat, LoggingConfig};
use libsocialbu::{Account, Config, Result, SocialBuClient, SocialBuError};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "sbu-accounts")]
#[command(version)]
#[command(about = "List connected social accounts and their capabilities")]
#[command(long_about = r#"List connected social accounts and their capabilities.

EXAMPLES:
    # List every connected account
    sbu-accounts

    # Filter by platform type
    sbu-accounts --type twitter
    sbu-accounts --type facebook.page

    # Show one account in full
    sbu-accounts --id 101

    # JSON output for scripting
    sbu-accounts --format json | jq '.[] | select(.status == "active") | .id'

OUTPUT FORMATS:
    text - One account per line with status and limits (default)
    json - JSON array of account objects

EXIT CODES:
    0 - Success (including empty results)
    1 - Runtime error
    2 - Authentication error
"#)]
struct Cli {
    /// Show a single account by ID
    #[arg(long, value_name = "ID")]
    id: Option<u64>,

    /// Filter by platform type
    #[arg(short = 'T', long = "type", value_name = "TYPE")]
    #[arg(help = "Filter results to one platform type (e.g. twitter, facebook.page)")]
    account_type: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(LogFormat::Text, "error".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let client = SocialBuClient::new(&config)?;
    require_token(&client)?;

    let accounts = match cli.id {
        Some(id) => vec![client.get_account(id).await?],
        None => {
            debug!(filter = ?cli.account_type, "listing accounts");
            client.all_accounts(cli.account_type.as_deref()).await?
        }
    };

    match cli.format.as_str() {
        "json" => {
            let values: Vec<_> = accounts.iter().map(Account::to_value).collect();
            println!("{:#}", serde_json::Value::Array(values));
        }
        _ => {
            for account in &accounts {
                render_account(account);
            }
        }
    }

    Ok(())
}

fn render_account(account: &Account) {
    let marker = if account.is_active() { "✓" } else { "✗" };
    println!(
        "{} {} | {} | {}",
        marker, account.id, account.account_type, account.name
    );

    let mut limits = Vec::new();
    if let Some(max) = account.post_max_length {
        limits.push(format!("max {} chars", max));
    }
    if let Some(max) = account.max_attachments {
        limits.push(format!("max {} attachments", max));
    }
    if account.requires_media() {
        limits.push("media required".to_string());
    }
    if !limits.is_empty() {
        println!("    {}", limits.join(", "));
    }
}

fn require_token(client: &SocialBuClient) -> Result<()> {
    if client.is_configured() {
        return Ok(());
    }
    Err(SocialBuError::Authentication {
        message: "No API token configured. Set SOCIALBU_TOKEN or add `token` to the config file."
            .to_string(),
        response: None,
        request: None,
    })
}
