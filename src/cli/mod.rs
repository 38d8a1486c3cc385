pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use self::client::ApiClient;

#[derive(Parser)]
#[command(name = "zaytoonz")]
#[command(about = "Zaytoonz CLI - Command-line interface for the Zaytoonz NGO API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "ZAYTOONZ_API_URL", default_value = "http://localhost:3000", help = "API base URL")]
    pub url: String,

    #[arg(long, global = true, env = "ZAYTOONZ_TOKEN", hide_env_values = true, help = "Bearer token sent with requests")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check server and database health")]
    Health,

    #[command(about = "Show dashboard statistics")]
    Stats {
        #[arg(value_enum, help = "Statistics to fetch")]
        kind: commands::stats::StatsKind,
    },

    #[command(about = "List approved NGOs")]
    Ngos,

    #[command(about = "Render a JSON array of rows as CSV")]
    Export {
        #[arg(help = "JSON file holding an array of objects (or {\"data\": [...]})")]
        input: std::path::PathBuf,
        #[arg(long, short, help = "Write CSV here instead of stdout")]
        output: Option<std::path::PathBuf>,
    },

    #[command(about = "Mint a development access token with SUPABASE_JWT_SECRET")]
    Token {
        #[arg(help = "User id placed in the token subject")]
        user_id: String,
        #[arg(long, help = "User type claim, e.g. Admin or NGO")]
        user_type: Option<String>,
        #[arg(long, help = "Email claim")]
        email: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Health => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            commands::health::handle(&client, output_format).await
        }
        Commands::Stats { kind } => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            commands::stats::handle(&client, kind, output_format).await
        }
        Commands::Ngos => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            commands::ngos::handle(&client, output_format).await
        }
        Commands::Export { input, output } => commands::export::handle(&input, output.as_deref(), output_format),
        Commands::Token { user_id, user_type, email } => {
            commands::token::handle(user_id, user_type, email, output_format)
        }
    }
}
