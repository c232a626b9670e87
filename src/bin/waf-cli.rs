use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "waf-cli")]
#[command(about = "Management CLI for the WAF proxy admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "WAF_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show proxy status, lb mode and verdict cache usage
    Status,
    /// List upstream groups with per-server health and weights
    Upstreams,
    /// Return an evicted server to its group's healthy set
    Recover {
        /// Group key, e.g. app.local_80
        group: String,
        /// Server key, e.g. 10.0.0.1:8080
        server: String,
    },
    /// Take a server out of rotation
    Evict {
        group: String,
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Upstreams => client.get(format!("{}/admin/upstreams", cli.url)),
        Commands::Recover { group, server } => client.post(format!(
            "{}/admin/upstreams/{}/servers/{}/recover",
            cli.url, group, server
        )),
        Commands::Evict { group, server } => client.post(format!(
            "{}/admin/upstreams/{}/servers/{}/evict",
            cli.url, group, server
        )),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
