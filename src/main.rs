use anyhow::Result;
use bugz::auth::AdcCredentials;
use bugz::tracker::{IssueTracker, TrackerConfig, issue_url};
use clap::Parser;

/// bugz - Buganizer issue tracker client
///
/// Manual smoke-test commands against the Google Issue Tracker API.
///
/// Requires ambient application-default credentials: either an access
/// token in GOOGLE_OAUTH_ACCESS_TOKEN or the GCE metadata server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Discovery document URL (overrides the public endpoint)
    #[arg(
        long = "discovery-url",
        value_name = "URL",
        env = "BUGZ_DISCOVERY_URL",
        global = true
    )]
    pub discovery_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch an issue and print it as JSON
    Get(GetArgs),

    /// Post a canned test comment to an issue
    Comment(CommentArgs),

    /// Search issues by keyword
    Search(SearchArgs),
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// The issue id
    #[arg(value_name = "ISSUE_ID")]
    pub issue_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CommentArgs {
    /// The issue id
    #[arg(value_name = "ISSUE_ID")]
    pub issue_id: String,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Keywords to search for
    #[arg(value_name = "KEYWORD", required = true)]
    pub keywords: Vec<String>,

    /// Only match open issues
    #[arg(long)]
    pub open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = TrackerConfig::default();
    if let Some(url) = cli.discovery_url {
        config.discovery_url = url;
    }

    let mut tracker = IssueTracker::connect(AdcCredentials::new(), config).await?;

    match cli.command {
        Commands::Get(args) => match tracker.get_issue(&args.issue_id).await? {
            Some(issue) => println!("{}", serde_json::to_string_pretty(issue.data())?),
            None => anyhow::bail!("Issue {} not found", args.issue_id),
        },
        Commands::Comment(args) => {
            let result = tracker.add_comment(&args.issue_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Search(args) => {
            let keywords: Vec<&str> = args.keywords.iter().map(String::as_str).collect();
            let issues = tracker.find_issues(&keywords, args.open).await?;
            for issue in &issues {
                match issue.id() {
                    Some(id) => println!(
                        "{}  {}  {}",
                        issue_url(&id.to_string()),
                        issue.status().unwrap_or("UNKNOWN"),
                        issue.title().unwrap_or("")
                    ),
                    None => println!("(issue without id)"),
                }
            }
        }
    }
    Ok(())
}
