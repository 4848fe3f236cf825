mod config;

use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use pagegraph_core::{Executor, QueryRequest, Schema};
use pagegraph_gateway::GatewayState;
use pagegraph_source::HttpSource;

use config::Config;

#[derive(Parser)]
#[command(name = "pagegraph")]
#[command(about = "GraphQL queries over live HTML pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the GraphQL HTTP gateway
    Serve {
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one query and print the JSON response
    Query {
        /// Query document, or `-` to read it from stdin
        query: String,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
        /// Operation to run when the document has several
        #[arg(long)]
        operation: Option<String>,
    },
    /// Print the schema in SDL
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let cli = Cli::parse();

    let serving = matches!(cli.command, Commands::Serve { .. });
    logging::init_logger(&config.log_config(!serving));

    match cli.command {
        Commands::Serve { bind, port } => {
            let config = Config {
                bind_address: bind.unwrap_or(config.bind_address),
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Query {
            query,
            variables,
            operation,
        } => {
            let request = build_request(&query, variables.as_deref(), operation)?;
            let succeeded = run_query(&config, request).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Schema => {
            print!("{}", Schema::build().sdl());
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let ip: IpAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);

    info!(
        addr = %addr,
        timeout_secs = config.request_timeout_secs,
        "Starting pagegraph gateway"
    );

    let source = HttpSource::new(config.source_config()).context("failed to build HTTP client")?;
    let state = GatewayState::new(Arc::new(source))
        .with_request_timeout(config.request_timeout())
        .with_pretty(config.pretty);

    pagegraph_gateway::start_server(addr, state).await
}

fn build_request(
    query: &str,
    variables: Option<&str>,
    operation: Option<String>,
) -> Result<QueryRequest> {
    let query = if query == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read query from stdin")?;
        buf
    } else {
        query.to_string()
    };

    let mut request = QueryRequest::new(query);
    if let Some(raw) = variables {
        let map: Map<String, Value> =
            serde_json::from_str(raw).context("--variables must be a JSON object")?;
        request = request.with_variables(map);
    }
    if let Some(name) = operation {
        request = request.with_operation_name(name);
    }
    Ok(request)
}

/// Prints the response; `false` when the request produced no data.
async fn run_query(config: &Config, request: QueryRequest) -> Result<bool> {
    let schema = Schema::build();
    let source = HttpSource::new(config.source_config()).context("failed to build HTTP client")?;
    let executor = Executor::new(&schema, &source);

    let Ok(response) = tokio::time::timeout(config.request_timeout(), executor.execute(&request)).await
    else {
        bail!("query timed out after {}s", config.request_timeout_secs);
    };

    let out = if config.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");
    Ok(response.data.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::try_parse_from([
            "pagegraph",
            "query",
            "{ __typename }",
            "--variables",
            r#"{"u":"http://a.test"}"#,
            "--operation",
            "Q",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                query,
                variables,
                operation,
            } => {
                assert_eq!(query, "{ __typename }");
                assert!(variables.is_some());
                assert_eq!(operation.as_deref(), Some("Q"));
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_build_request() {
        let request =
            build_request("{ __typename }", Some(r#"{"u":"http://a.test"}"#), Some("Q".into()))
                .unwrap();
        assert_eq!(request.query, "{ __typename }");
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(
            request.variables.unwrap()["u"],
            Value::String("http://a.test".into())
        );

        assert!(build_request("{ __typename }", Some("[1, 2]"), None).is_err());
    }

    #[tokio::test]
    async fn test_run_query_without_network() {
        let config = Config::default();
        let ok = run_query(&config, QueryRequest::new("{ __typename }"))
            .await
            .unwrap();
        assert!(ok);
        let failed = run_query(&config, QueryRequest::new("mutation { x }"))
            .await
            .unwrap();
        assert!(!failed);
    }
}
