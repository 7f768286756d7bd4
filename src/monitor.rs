//! Real-time status monitoring
//!
//! One long-lived task owns the telemetry socket, the frame decoder and all
//! writes into the status cache. It reconnects forever: command-connection
//! failures back off instead of surfacing, and any stream error first
//! discards the cached status so stale frames are never served as current.

use crate::controller::ArmController;
use crate::protocol::FrameDecoder;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Run the telemetry ingestion loop. Never returns; spawn it alongside the
/// workers and let it die with the process.
pub async fn run_status_stream(ctx: Arc<ArmController>) {
    let host = ctx.config().robot.host.clone();
    let port = ctx.config().robot.status_port;
    let backoff = ctx.config().connection.reconnect_backoff();
    let read_timeout = ctx.config().connection.read_timeout();

    let mut decoder = FrameDecoder::new();
    let mut stream: Option<TcpStream> = None;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        // The command connection is the arm's liveness signal; make sure it
        // is up before streaming status.
        while !ctx.link().is_connected().await {
            warn!("Arm not connected, trying to reconnect");
            ctx.link().connect().await;

            if !ctx.link().is_connected().await {
                info!(
                    "Arm not connected after reconnect attempt, waiting {:?} to reconnect",
                    backoff
                );
                sleep(backoff).await;
            }
        }

        if stream.is_none() {
            match TcpStream::connect((host.as_str(), port)).await {
                Ok(sock) => {
                    info!("Arm status stream connected");
                    decoder.reset();
                    stream = Some(sock);
                }
                Err(e) => {
                    warn!("Unable to open arm status stream: {}", e);
                    ctx.link().disconnect().await;
                    continue;
                }
            }
        }
        let Some(sock) = stream.as_mut() else {
            continue;
        };

        match timeout(read_timeout, sock.read(&mut buf)).await {
            Ok(Ok(0)) => {
                warn!("Arm status stream closed, reconnecting");
                ctx.cache().clear();
                stream = None;
            }
            Ok(Ok(n)) => {
                for frame in decoder.feed(&buf[..n]) {
                    ctx.cache().set(frame);
                }
            }
            Ok(Err(e)) => {
                warn!("Arm status stream read error: {}, reconnecting", e);
                ctx.cache().clear();
                stream = None;
            }
            Err(_) => {
                warn!("Arm status stream read timed out, reconnecting");
                ctx.cache().clear();
                stream = None;
            }
        }
    }
}
