use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rdtwatch::{
    sparkline, Dashboard, HttpControlPlane, Settings, SlotStrip, ViewModel, WebSocketTransport,
};
use rdtwatch_types::{ActionResponse, ProtocolMode};

/// Glyphs for the eight sparkline levels.
const SPARK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Samples shown in the throughput sparkline.
const SPARK_WIDTH: usize = 30;

#[derive(Parser, Debug)]
#[command(name = "rdtwatch")]
#[command(about = "Live monitor and control client for a reliable-data-transfer engine")]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the HTTP API (overrides settings)
    #[arg(long, global = true)]
    api: Option<String>,

    /// URL of the push channel (overrides settings)
    #[arg(long, global = true)]
    ws: Option<String>,

    /// Protocol mode: stop_wait, go_back_n or selective_repeat
    #[arg(long, global = true)]
    mode: Option<ProtocolMode>,

    /// Sender window size (1-100)
    #[arg(long, global = true)]
    window_size: Option<u32>,

    /// Simulated packet loss rate (0.0-0.5)
    #[arg(long, global = true)]
    loss_rate: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the control plane and print a status line until Ctrl-C
    Watch {
        /// How often to print, in milliseconds
        #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
    },
    /// Collect state for a while, then write it as JSON
    Export {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// How long to collect before writing, in milliseconds
        #[arg(long, default_value = "2500")]
        settle_ms: u64,
    },
    /// Start, stop or reset the receiver
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Configure the sender with the current settings
    Configure,
    /// Close the sender's connection
    Close,
    /// Start a transfer
    Transfer {
        /// Upload and send this file
        #[arg(long, conflicts_with = "data")]
        file: Option<PathBuf>,

        /// Send this text; generated test data is sent when neither option is given
        #[arg(long)]
        data: Option<String>,
    },
    /// List finished file transfers, or show one
    Transfers {
        /// Show only this transfer
        #[arg(long)]
        id: Option<String>,
    },
    /// Download a PDF report of the current transfer
    Report {
        /// Output file; defaults to the name the control plane suggests
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the transferred file, as printed on the report
        #[arg(long, default_value = "transfer")]
        filename: String,

        /// Bytes transferred; 0 uses the sender's count
        #[arg(long, default_value = "0")]
        file_size: u64,

        /// Describe the configured parameters instead of the live sender's
        #[arg(long)]
        generate: bool,
    },
    /// List or download files the receiver has reassembled
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// Run a demo transfer of random data with the current settings
    Demo {
        /// Bytes of random data to send
        #[arg(long, default_value = "10000", value_parser = clap::value_parser!(u64).range(1..))]
        data_size: u64,
    },
    /// Describe the available reliability protocols
    Protocols,
    /// Query the control plane's health endpoint
    Health,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ServerAction {
    Start,
    Stop,
    /// Clear per-transfer state, including the current peer
    Reset,
}

#[derive(Subcommand, Debug)]
enum FilesAction {
    List,
    Download {
        name: String,

        /// Output file; defaults to the file's own name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rdtwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&args)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args.command, settings))
}

/// Layer CLI flags over file and environment settings.
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(api) = &args.api {
        settings.api_url = api.clone();
    }
    if let Some(ws) = &args.ws {
        settings.ws_url = ws.clone();
    }
    if let Some(mode) = args.mode {
        settings.transfer.protocol_mode = mode;
    }
    if let Some(window_size) = args.window_size {
        settings.transfer.window_size = window_size;
    }
    if let Some(loss_rate) = args.loss_rate {
        settings.transfer.packet_loss_rate = loss_rate;
    }
    settings.validate()?;
    Ok(settings)
}

async fn run(command: Command, settings: Settings) -> Result<()> {
    let transport = Arc::new(
        WebSocketTransport::new(&settings.ws_url).context("invalid push channel URL")?,
    );
    let control = Arc::new(
        HttpControlPlane::builder()
            .endpoint(settings.api_url.clone())
            .timeout(settings.request_timeout())
            .build()
            .context("invalid API URL")?,
    );
    let mut dashboard = Dashboard::start(settings.transfer.clone(), transport, control);

    let result = match command {
        Command::Watch { interval_ms } => watch(&dashboard, Duration::from_millis(interval_ms)).await,
        Command::Export { output, settle_ms } => {
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
            dashboard.export_to_file(&output).map(|()| {
                println!("Exported state to {}", output.display());
            })
        }
        Command::Server { action } => {
            let response = match action {
                ServerAction::Start => dashboard.start_server().await,
                ServerAction::Stop => dashboard.stop_server().await,
                ServerAction::Reset => dashboard.reset_server().await,
            }?;
            report_action(&response)
        }
        Command::Configure => report_action(&dashboard.configure_client().await?),
        Command::Close => report_action(&dashboard.close_client().await?),
        Command::Transfer { file, data } => {
            let response = match file {
                Some(path) => dashboard.start_transfer_file(&path).await?,
                None => {
                    dashboard
                        .start_transfer_data(data.as_deref().map(str::as_bytes))
                        .await?
                }
            };
            println!("{} (id {})", response.message, response.transfer_id);
            if let Some(stats) = response.stats {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            if response.success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("transfer reported failure"))
            }
        }
        Command::Transfers { id } => {
            let records = match id {
                Some(id) => vec![dashboard.transfer_record(&id).await?],
                None => dashboard.transfers().await?,
            };
            if records.is_empty() {
                println!("No transfers yet");
            }
            for record in records {
                println!(
                    "{}  {}  {} bytes  {}  {}",
                    record.id,
                    record.filename,
                    record.size,
                    if record.success { "ok" } else { "failed" },
                    record.timestamp
                );
            }
            Ok(())
        }
        Command::Report {
            output,
            filename,
            file_size,
            generate,
        } => {
            let report = if generate {
                dashboard.generate_report(&filename, file_size).await?
            } else {
                dashboard.download_report(&filename, file_size).await?
            };
            let path = output
                .or_else(|| report.filename.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(format!("transfer_report_{}.pdf", filename)));
            save(&path, &report.bytes)
        }
        Command::Files { action } => match action {
            FilesAction::List => {
                for file in dashboard.received_files().await? {
                    println!("{}  {} bytes  {}", file.name, file.size, file.modified);
                }
                Ok(())
            }
            FilesAction::Download { name, output } => {
                let download = dashboard.download_file(&name).await?;
                save(&output.unwrap_or_else(|| PathBuf::from(&name)), &download.bytes)
            }
        },
        Command::Demo { data_size } => {
            let result = dashboard.run_demo(data_size).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("demo transfer reported failure"))
            }
        }
        Command::Protocols => {
            for protocol in dashboard.protocols().await? {
                println!("{} ({}): {}", protocol.name, protocol.id, protocol.description);
                for pro in &protocol.pros {
                    println!("  + {}", pro);
                }
                for con in &protocol.cons {
                    println!("  - {}", con);
                }
            }
            Ok(())
        }
        Command::Health => {
            let health = dashboard.health().await?;
            println!(
                "{} at {} (server running: {}, client: {})",
                health.status, health.timestamp, health.server_running, health.client_state
            );
            Ok(())
        }
    };

    dashboard.shutdown().await;
    result
}

/// Print an action's message; an unsuccessful acknowledgement is an error.
fn report_action(response: &ActionResponse) -> Result<()> {
    println!("{}", response.message);
    if response.success {
        Ok(())
    } else {
        Err(anyhow::anyhow!("control plane reported failure"))
    }
}

fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Print a status line at `interval` until Ctrl-C.
async fn watch(dashboard: &Dashboard, interval: Duration) -> Result<()> {
    let view = dashboard.view();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => println!("{}", status_line(&view.latest())),
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
        }
    }
}

fn status_line(view: &ViewModel) -> String {
    let summary = view.summary();
    let recent = view
        .throughput_history
        .iter()
        .rev()
        .take(SPARK_WIDTH)
        .map(|s| s.throughput)
        .collect::<Vec<_>>();
    let spark: String = sparkline(recent.into_iter().rev())
        .into_iter()
        .map(|level| SPARK_GLYPHS[usize::from(level)])
        .collect();
    let slots = view.window_slots();

    format!(
        "[{}] server={} client={} sent={} recv={} retx={} drop={} eff={:.1}% thr={} win={}",
        view.connection,
        if view.server.running { "up" } else { "down" },
        view.client.state,
        summary.sent,
        summary.received,
        summary.retransmissions,
        summary.dropped,
        summary.efficiency(),
        spark,
        SlotStrip(&slots),
    )
}
