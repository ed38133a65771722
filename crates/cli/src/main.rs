use beatfeed_cli::{self as cli, Context};
use beatfeed_core::{config::FeedConfig, FeedResult};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    /// Path to config file; defaults to ~/.beatfeed/beatfeed.toml
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    /// Path to the sqlite Db; overrides the config file
    db: Option<PathBuf>,

    #[arg(long = "as", value_name = "USER_ID")]
    /// Act as this user
    user: Option<String>,

    #[arg(short, long, action = ArgAction::SetTrue)]
    /// Select if the output should be json
    json: bool,

    #[command(subcommand)]
    command: FeedCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum FeedCommand {
    /// Creates the store if it does not exist yet
    Init,

    /// Adds a user profile
    Profile {
        id: String,
        username: String,
        #[arg(short, long)]
        display_name: Option<String>,
    },

    /// Creates a new post as the `--as` user
    Post {
        media_url: String,
        #[arg(short, long, default_value = "image")]
        kind: String,
        #[arg(short, long)]
        caption: Option<String>,
        /// Hours until the post expires; never when omitted
        #[arg(short, long)]
        ttl: Option<i64>,
    },

    /// Lists the active posts, newest first
    Feed,

    /// Toggles the like of the `--as` user on a post
    Like { post_id: String },

    /// Shows the comments on a post
    Thread { post_id: String },

    /// Comments on a post; reads stdin when `text` is omitted
    Comment {
        post_id: String,
        text: Option<String>,
    },

    /// Prints the shareable link of a post
    Share { post_id: String },

    /// Sends a direct message; reads stdin when `text` is omitted
    Message { to: String, text: Option<String> },
}

async fn run(cli: Cli, config: FeedConfig) -> FeedResult<()> {
    let ctx = Context::open(config, cli.db, cli.user, cli.json)?;
    match cli.command {
        FeedCommand::Init => cli::init(&ctx),
        FeedCommand::Profile {
            id,
            username,
            display_name,
        } => cli::add_profile(&ctx, id, username, display_name).await,
        FeedCommand::Post {
            media_url,
            kind,
            caption,
            ttl,
        } => cli::new_post(&ctx, media_url, &kind, caption, ttl).await,
        FeedCommand::Feed => cli::feed(&ctx).await,
        FeedCommand::Like { post_id } => cli::like(&ctx, &post_id).await,
        FeedCommand::Thread { post_id } => cli::thread(&ctx, &post_id).await,
        FeedCommand::Comment { post_id, text } => cli::comment(&ctx, &post_id, text).await,
        FeedCommand::Share { post_id } => cli::share(&ctx, &post_id).await,
        FeedCommand::Message { to, text } => cli::message(&ctx, &to, text).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match FeedConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
    };
    cli::init_tracing(&config);

    if let Err(err) = run(cli, config).await {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
