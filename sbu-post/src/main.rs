//! sbu-post - Publish or schedule a post to connected social accounts

use std::collections::BTreeMap;
use std::io::Read;

use clap::Parser;
use libsocialbu::logging::{LogFormat, LoggingConfig};
use libsocialbu::{Config, Post, Result, SocialBuClient, SocialBuError};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "sbu-post")]
#[command(version)]
#[command(about = "Publish or schedule a post to connected social accounts")]
#[command(long_about = r#"Publish or schedule a post to connected social accounts.

EXAMPLES:
    # Publish to the default accounts from config
    sbu-post "Hello, world!"

    # Read content from stdin
    echo "Hello from a pipe" | sbu-post

    # Target specific accounts
    sbu-post "Release day!" --to 101 --to 102

    # Attach media (local file or URL), uploaded in order
    sbu-post "Look at this" --media photo.jpg --media https://example.com/b.png

    # Schedule for later
    sbu-post "Good morning" --schedule "2025-07-01 09:00:00"

    # Save as draft
    sbu-post "Work in progress" --draft

    # Validate and print the payload without any network calls
    sbu-post "Check me" --to 101 --dry-run

OUTPUT FORMATS:
    text - Human-readable summary (default)
    json - The created post as JSON

EXIT CODES:
    0 - Success
    1 - Runtime error (network, server, upload)
    2 - Authentication error
    3 - Validation error
"#)]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Media file path or URL to attach (repeatable)
    #[arg(short, long, value_name = "PATH_OR_URL")]
    #[arg(help = "Attach a local file or remote URL (repeatable, uploaded in order)")]
    media: Vec<String>,

    /// Target account ID (repeatable)
    #[arg(short = 't', long = "to", value_name = "ID")]
    #[arg(help = "Target account ID (repeatable; defaults come from config)")]
    to: Vec<u64>,

    /// Schedule time (YYYY-MM-DD HH:MM:SS)
    #[arg(short, long, value_name = "DATETIME")]
    #[arg(help = "Schedule for an absolute time instead of publishing now")]
    schedule: Option<String>,

    /// Save as draft without publishing
    #[arg(short, long)]
    draft: bool,

    /// Validate and print the payload without posting
    #[arg(long)]
    dry_run: bool,

    /// Postback URL for status callbacks
    #[arg(long, value_name = "URL")]
    postback_url: Option<String>,

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
        render_error(&e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let content = resolve_content(cli.content.as_deref())?;
    debug!(chars = content.chars().count(), "composing post");

    let config = Config::load()?;
    let client = SocialBuClient::new(&config)?;

    let mut builder = client
        .compose()
        .content(content)
        .to(cli.to.iter().copied());

    for source in &cli.media {
        builder = builder.media(source);
    }
    if let Some(schedule) = &cli.schedule {
        builder = builder.scheduled_at(schedule.as_str());
    }
    if cli.draft {
        builder = builder.as_draft();
    }
    if let Some(url) = &cli.postback_url {
        builder = builder.postback_url(url);
    }

    if cli.dry_run {
        let payload: serde_json::Value = builder.dry_run()?;
        match cli.format.as_str() {
            "json" => println!("{:#}", payload),
            _ => {
                println!("Dry run OK. Payload:");
                println!("{:#}", payload);
            }
        }
        return Ok(());
    }

    require_token(&client)?;
    let post = builder.send().await?;
    render_post(&post, &cli.format);
    Ok(())
}

/// Content from the argument, falling back to stdin.
fn resolve_content(arg: Option<&str>) -> Result<String> {
    let content = match arg {
        Some(content) => content.to_string(),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| SocialBuError::Network(format!("Failed to read stdin: {}", e)))?;
            buffer.trim_end().to_string()
        }
    };

    if content.trim().is_empty() {
        let mut errors = BTreeMap::new();
        errors.insert(
            "content".to_string(),
            vec!["Content is required.".to_string()],
        );
        return Err(SocialBuError::Validation {
            message: "Validation failed.".to_string(),
            errors,
            response: None,
            request: None,
        });
    }

    Ok(content)
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

fn render_post(post: &Post, format: &str) {
    match format {
        "json" => println!("{:#}", post.to_value()),
        _ => {
            println!("Post {} ({})", post.id, post.status);
            if let Some(publish_at) = post.publish_at {
                println!("  Scheduled for: {}", publish_at.format("%Y-%m-%d %H:%M:%S"));
            }
            if !post.account_ids.is_empty() {
                let ids: Vec<String> = post.account_ids.iter().map(u64::to_string).collect();
                println!("  Accounts: {}", ids.join(", "));
            }
        }
    }
}

/// Print an error to stderr in a shape the shell user can act on.
fn render_error(error: &SocialBuError) {
    eprintln!("Error: {}", error);

    if let Some(errors) = error.validation_errors() {
        for (field, messages) in errors {
            eprintln!("  {}:", field);
            for message in messages {
                eprintln!("    - {}", message);
            }
        }
    }

    if let Some(step) = error.upload_step() {
        eprintln!("  (media upload pipeline failed at the {} step)", step);
    }

    if let Some(seconds) = error.retry_after() {
        eprintln!("  Retry after {} seconds.", seconds);
    }
}
