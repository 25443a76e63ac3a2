use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use beacon_nodes::dispatch::{CommandRequest, DEFAULT_AGENT_ID, Dispatcher};
use beacon_nodes::{AskMode, Config, GatewayClient, commands};

/// Beacon Nodes - run commands on remote nodes through the Beacon gateway
#[derive(Parser)]
#[command(name = "beacon-nodes", version, about)]
struct Cli {
    /// Gateway base URL (overrides config)
    #[arg(long, env = "BEACON_NODES_GATEWAY_URL", global = true)]
    gateway_url: Option<String>,

    /// Gateway access token (overrides config)
    #[arg(long, env = "BEACON_NODES_GATEWAY_TOKEN", hide_env_values = true, global = true)]
    gateway_token: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a shell command on a node
    Run {
        /// Target node id
        #[arg(long)]
        node: String,

        /// Approval prompting mode override
        #[arg(long, value_enum)]
        ask: Option<AskArg>,

        /// Agent identity the command runs under
        #[arg(long, default_value = DEFAULT_AGENT_ID)]
        agent: String,

        /// Also send the joined command line as a raw (unparsed) command
        #[arg(long)]
        raw: bool,

        /// Command and arguments to execute
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Record the screen of a node
    ScreenRecord {
        /// Target node id
        #[arg(long)]
        node: String,

        /// Recording length, human readable (e.g. "30s")
        #[arg(long, conflicts_with = "duration_ms")]
        duration: Option<String>,

        /// Recording length in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Approval prompting mode override
        #[arg(long, value_enum)]
        ask: Option<AskArg>,

        /// Agent identity the command runs under
        #[arg(long, default_value = DEFAULT_AGENT_ID)]
        agent: String,
    },
    /// List nodes known to the gateway
    List {
        /// Print the raw fleet snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Ask-mode flag values
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AskArg {
    Off,
    OnMiss,
    Always,
}

impl From<AskArg> for AskMode {
    fn from(value: AskArg) -> Self {
        match value {
            AskArg::Off => Self::Off,
            AskArg::OnMiss => Self::OnMiss,
            AskArg::Always => Self::Always,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,beacon_nodes=info",
        1 => "info,beacon_nodes=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(url) = cli.gateway_url {
        config.gateway_url = url;
    }
    if let Some(token) = cli.gateway_token {
        config.gateway_token = Some(token.into());
    }
    config.validate()?;

    let gateway = GatewayClient::over_http(&config.gateway_url, config.gateway_token.clone());
    let dispatcher = Dispatcher::new(gateway, config.timeouts);

    match cli.command {
        Command::Run {
            node,
            ask,
            agent,
            raw,
            command,
        } => {
            let mut request = CommandRequest::new(node, commands::SYSTEM_RUN)
                .with_argv(command.clone())
                .with_agent(agent);
            if raw {
                request = request.with_raw_command(command.join(" "));
            }
            if let Some(ask) = ask {
                request = request.with_ask(ask.into());
            }
            execute(&dispatcher, &request).await
        }
        Command::ScreenRecord {
            node,
            duration,
            duration_ms,
            ask,
            agent,
        } => {
            let mut request =
                CommandRequest::new(node, commands::SCREEN_RECORD).with_agent(agent);
            if let Some(duration) = duration {
                request = request.with_duration(duration);
            }
            if let Some(ms) = duration_ms {
                request = request.with_duration_ms(ms);
            }
            if let Some(ask) = ask {
                request = request.with_ask(ask.into());
            }
            execute(&dispatcher, &request).await
        }
        Command::List { json } => list_nodes(&dispatcher, json).await,
    }
}

/// Dispatch a request and map the result onto the process exit code
async fn execute(dispatcher: &Dispatcher, request: &CommandRequest) -> anyhow::Result<ExitCode> {
    let result = dispatcher.dispatch(request).await?;

    print!("{}", result.stdout);
    eprint!("{}", result.stderr);

    if result.timed_out {
        tracing::warn!("command timed out on the node");
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        let code = u8::try_from(result.exit_code).unwrap_or(1);
        Ok(ExitCode::from(if code == 0 { 1 } else { code }))
    }
}

/// Print the current fleet snapshot
async fn list_nodes(dispatcher: &Dispatcher, json: bool) -> anyhow::Result<ExitCode> {
    let snapshot = dispatcher.fleet().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot.nodes)?);
        return Ok(ExitCode::SUCCESS);
    }

    if snapshot.nodes.is_empty() {
        println!("no nodes connected");
        return Ok(ExitCode::SUCCESS);
    }

    for node in &snapshot.nodes {
        let state = if node.connected { "connected" } else { "offline" };
        let mut notes = Vec::new();
        if node.permission_granted(commands::SCREEN_RECORDING_PERMISSION) == Some(false) {
            notes.push("screen recording not granted");
        }
        let commands = if node.commands.is_empty() {
            "(no commands advertised)".to_string()
        } else {
            node.commands.join(", ")
        };

        println!(
            "{:<20} {:<10} {:<10} {}{}",
            node.label(),
            node.platform,
            state,
            commands,
            if notes.is_empty() {
                String::new()
            } else {
                format!("  [{}]", notes.join("; "))
            }
        );
    }

    Ok(ExitCode::SUCCESS)
}
