//! Entry point for `gbn-transfer`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv** mode.
//! All protocol work is delegated to the library; `main.rs` owns only
//! process setup (logging, argument parsing, file I/O).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use gbn_transfer::{receive_stream, send_stream, ProtocolConfig, UdpChannel};

/// Reliable one-way file transfer over UDP using Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a waiting receiver.
    Send {
        /// Local address to bind (e.g. 0.0.0.0:9001).
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Receiver address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        peer: SocketAddr,
        /// File to send.
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        proto: ProtoArgs,
    },
    /// Receive a file from a sender.
    Recv {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Sender address; datagrams from anywhere else are ignored.
        #[arg(short, long)]
        peer: SocketAddr,
        /// Where to write the received bytes.
        #[arg(short, long)]
        out: PathBuf,
        /// Keep answering duplicate EOTs for this long after closing.
        #[arg(long, default_value_t = 0)]
        linger_ms: u64,
        #[command(flatten)]
        proto: ProtoArgs,
    },
}

/// Protocol constants; both ends must agree on them.
#[derive(Args)]
struct ProtoArgs {
    /// Maximum number of unacknowledged packets.
    #[arg(long, default_value_t = 7)]
    window: usize,
    /// Size of the sequence-number space (N).
    #[arg(long, default_value_t = 8)]
    seq_space: u32,
    /// Maximum payload bytes per data packet.
    #[arg(long, default_value_t = 30)]
    max_payload: usize,
    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

impl ProtoArgs {
    fn into_config(self) -> ProtocolConfig {
        ProtocolConfig {
            window_size: self.window,
            seq_space: self.seq_space,
            max_payload: self.max_payload,
            timeout: Duration::from_millis(self.timeout_ms),
            ..ProtocolConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    match run(cli.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        Mode::Send {
            bind,
            peer,
            file,
            proto,
        } => {
            let config = proto.into_config();
            config.validate()?;
            let data = tokio::fs::read(&file).await?;
            let channel = UdpChannel::bind(bind, peer)
                .await?
                .with_max_datagram(config.max_datagram());
            log::info!(
                "Sending {} ({} bytes) from {} to {peer}",
                file.display(),
                data.len(),
                channel.local_addr
            );
            let report = send_stream(&channel, &config, &data).await?;
            if report.stats.forced_close {
                log::warn!("receiver never confirmed the end of transmission");
            }
            log::info!("Sent {} packet(s)", report.packets);
        }
        Mode::Recv {
            bind,
            peer,
            out,
            linger_ms,
            proto,
        } => {
            let config = ProtocolConfig {
                linger: Duration::from_millis(linger_ms),
                ..proto.into_config()
            };
            config.validate()?;
            let channel = UdpChannel::bind(bind, peer)
                .await?
                .with_max_datagram(config.max_datagram());
            let sink = tokio::fs::File::create(&out).await?;
            log::info!("Receiving on {} into {}", channel.local_addr, out.display());
            let report = receive_stream(&channel, &config, sink).await?;
            log::info!(
                "Received {} byte(s) in {} packet(s)",
                report.stats.bytes_delivered,
                report.stats.accepted
            );
        }
    }
    Ok(())
}
