use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vmss_common::NodeName;
use vmss_resolver::provider_manager::ProviderManager;
use vmss_resolver::{resolve_nodes, NodeResolution};

#[derive(Parser, Debug)]
#[command(
    name = "vmss-resolver",
    about = "Resolve the private IP addresses of scale-set nodes"
)]
struct Cli {
    /// Cloud provider backend (azure or mock).
    #[arg(long, env = "PROVIDER", default_value = "azure")]
    provider: String,

    /// Maximum number of nodes resolved at the same time.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Print the report as JSON instead of one line per node.
    #[arg(long)]
    json: bool,

    /// Node names to resolve.
    #[arg(required = true)]
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let resolver = match ProviderManager::build_resolver(&cli.provider) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("❌ failed to configure provider {}: {:#}", cli.provider, e);
            return ExitCode::from(2);
        }
    };

    let nodes: Vec<NodeName> = cli.nodes.into_iter().map(NodeName::from).collect();
    let report = resolve_nodes(&resolver, &nodes, cli.concurrency).await;

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("❌ failed to encode report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for entry in &report.nodes {
            match &entry.resolution {
                NodeResolution::Resolved { address } => println!("{}\t{}", entry.node, address),
                NodeResolution::NotFound => println!("{}\tnot-found", entry.node),
                NodeResolution::Failed { error } => println!("{}\terror: {}", entry.node, error),
            }
        }
    }

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
