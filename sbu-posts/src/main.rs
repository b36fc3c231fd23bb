//! sbu-posts - Query and manage posts

use clap::Parser;
use libsocialbu::logging::{LogFormat, LoggingConfig};
use libsocialbu::{Config, Post, Result, SocialBuClient, SocialBuError};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "sbu-posts")]
#[command(version)]
#[command(about = "Query and manage posts")]
#[command(long_about = r#"Query and manage posts.

EXAMPLES:
    # List the first page of posts
    sbu-posts

    # Filter by type
    sbu-posts --type scheduled
    sbu-posts --type draft

    # Page through results
    sbu-posts --page 2 --per-page 50

    # Show one post in full
    sbu-posts --id 42

    # Delete a post
    sbu-posts --delete 42

    # JSON output for scripting
    sbu-posts --format json | jq '.[] | select(.status == "failed") | .id'

OUTPUT FORMATS:
    text - One post per line with status and schedule (default)
    json - JSON array of post objects

EXIT CODES:
    0 - Success (including empty results)
    1 - Runtime error
    2 - Authentication error
"#)]
struct Cli {
    /// Show a single post by ID
    #[arg(long, value_name = "ID")]
    id: Option<u64>,

    /// Delete a post by ID
    #[arg(long, value_name = "ID")]
    delete: Option<u64>,

    /// Filter by post type
    #[arg(short = 'T', long = "type", value_name = "TYPE")]
    #[arg(help = "Filter results by type (e.g. scheduled, draft, published)")]
    post_type: Option<String>,

    /// Page number
    #[arg(long, default_value = "1", value_name = "N")]
    page: u64,

    /// Results per page
    #[arg(long, default_value = "20", value_name = "N")]
    per_page: u64,

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

    if let Some(id) = cli.delete {
        client.delete_post(id).await?;
        println!("Deleted post {}", id);
        return Ok(());
    }

    let posts = match cli.id {
        Some(id) => vec![client.get_post(id).await?],
        None => {
            debug!(filter = ?cli.post_type, page = cli.page, "listing posts");
            client
                .list_posts(cli.post_type.as_deref(), cli.page, cli.per_page)
                .await?
        }
    };

    match cli.format.as_str() {
        "json" => {
            let values: Vec<_> = posts.iter().map(Post::to_value).collect();
            println!("{:#}", serde_json::Value::Array(values));
        }
        _ => {
            for post in &posts {
                render_post(post);
            }
        }
    }

    Ok(())
}

fn render_post(post: &Post) {
    let preview: String = post.content.chars().take(60).collect();
    let preview = if post.content.chars().count() > 60 {
        format!("{}...", preview)
    } else {
        preview
    };

    match post.publish_at {
        Some(publish_at) => println!(
            "{} | {} | {} | {}",
            post.id,
            post.status,
            publish_at.format("%Y-%m-%d %H:%M:%S"),
            preview
        ),
        None => println!("{} | {} | {}", post.id, post.status, preview),
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
