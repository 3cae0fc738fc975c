//! ==============================================================================
//! ingest.rs - tcp line ingest from radio gateways
//! ==============================================================================
//!
//! purpose:
//!     accepts the gateway's line stream (serial bridged to tcp), rebuilds
//!     frames with the assembler and hands them to the aggregator.
//!
//! relationships:
//!     - uses: assembler.rs (frame boundaries, blank payload guard)
//!     - feeds: aggregator.rs (parse + merge)
//!
//! failure model:
//!     one gateway connection failing never affects another, and a broken
//!     frame only loses its own sections. invalid utf-8 is replaced, not fatal.
//!     a frame or line longer than the configured cap is dropped whole, so a
//!     peer that never sends a separator or a newline cannot grow memory.
//!
//! ==============================================================================

use crate::aggregator::StateAggregator;
use crate::assembler::{Assembled, FrameAssembler};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpListener;

/// counters for one gateway connection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// frames handed to the aggregator
    pub frames: usize,
    /// frames dropped because no section carried a message
    pub empty: usize,
    /// snapshots merged out of those frames
    pub snapshots: usize,
    /// frames dropped for exceeding the size limit
    pub oversized: usize,
}

/// accept gateway connections forever
pub async fn run_tcp_ingest(
    bind: String,
    separator: String,
    max_frame_bytes: usize,
    aggregator: StateAggregator,
    show_frames: bool,
) -> Result<()> {
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind ingest listener on {}", bind))?;
    info!("[INGEST] Listening for gateway frames on {}", bind);

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("[INGEST] Accept failed: {}", e);
                continue;
            }
        };
        info!("[INGEST] Gateway connected: {}", peer);

        let aggregator = aggregator.clone();
        let assembler = FrameAssembler::new(separator.clone(), max_frame_bytes);
        tokio::spawn(async move {
            match consume_lines(BufReader::new(socket), assembler, &aggregator, show_frames).await {
                Ok(stats) => info!(
                    "[INGEST] Gateway {} closed ({} frames, {} empty, {} oversized, {} snapshots)",
                    peer, stats.frames, stats.empty, stats.oversized, stats.snapshots
                ),
                Err(e) => warn!("[INGEST] Gateway {} dropped: {:#}", peer, e),
            }
        });
    }
}

/// drain a line stream into the aggregator until eof
pub async fn consume_lines<R>(
    mut reader: R,
    mut assembler: FrameAssembler,
    aggregator: &StateAggregator,
    show_frames: bool,
) -> Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut raw = Vec::new();
    // one byte over the cap tells a full-length line from an overlong one
    let line_cap = assembler.max_frame_bytes() as u64 + 1;

    loop {
        raw.clear();
        let n = (&mut reader)
            .take(line_cap)
            .read_until(b'\n', &mut raw)
            .await
            .context("gateway read failed")?;
        if n == 0 {
            break;
        }

        if n as u64 == line_cap && raw.last() != Some(&b'\n') {
            let skipped = n + skip_line(&mut reader).await?;
            let dropped = assembler.discard();
            warn!("[INGEST] Line of {}+ bytes dropped with its frame", skipped + dropped);
            stats.oversized += 1;
            continue;
        }

        let line = String::from_utf8_lossy(&raw);
        match assembler.push_line(&line) {
            Some(Assembled::Frame(frame)) => {
                if show_frames {
                    info!("[INGEST] Frame:\n{}", frame);
                }
                let merged = aggregator.ingest_frame(&frame).await;
                stats.frames += 1;
                stats.snapshots += merged.len();
            }
            Some(Assembled::EmptyPayload) => {
                debug!("[INGEST] Frame ignored: empty Msg");
                stats.empty += 1;
            }
            Some(Assembled::Oversized(bytes)) => {
                warn!("[INGEST] Frame over {} bytes dropped", bytes);
                stats.oversized += 1;
            }
            None => {}
        }
    }

    if assembler.pending() > 0 {
        debug!("[INGEST] {} bytes of unterminated frame discarded", assembler.pending());
    }
    Ok(stats)
}

/// consume the rest of the current line without keeping it
async fn skip_line<R>(reader: &mut R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let buf = reader.fill_buf().await.context("gateway read failed")?;
        if buf.is_empty() {
            return Ok(skipped);
        }
        match buf.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(skipped + end + 1);
            }
            None => {
                let len = buf.len();
                reader.consume(len);
                skipped += len;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::DEFAULT_SEPARATOR;
    use crate::domain::NodeId;

    #[tokio::test]
    async fn stream_of_frames_reaches_the_aggregator() {
        let stream = "Nodo: nodo-07\r\n\
            Datos: Lat=4.6 Lon=-74.1 Sat=6 Msg=Bat: 4.0 Temp: 21.0\r\n\
            ----------------------\r\n\
            Nodo: nodo-08\n\
            Datos: Msg=\n\
            ----------------------\n\
            Nodo: nodo-07\n\
            Datos: Msg=pH: 7.2\n\
            ----------------------\n\
            Nodo: nodo-09\n";

        let agg = StateAggregator::new(8);
        let stats = consume_lines(stream.as_bytes(), FrameAssembler::default(), &agg, false)
            .await
            .unwrap();

        assert_eq!(
            stats,
            IngestStats { frames: 2, empty: 1, snapshots: 2, oversized: 0 }
        );

        let node7 = agg.get(&NodeId::normalize("NODE07").unwrap()).await.unwrap();
        assert_eq!(node7.temperature, Some(21.0));
        assert_eq!(node7.ph, Some(7.2));
        assert_eq!(node7.battery_percent, Some(80));
        assert_eq!(agg.current().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_end_the_stream() {
        let mut bytes = b"Nodo: 3\nDatos: Msg=Temp: 19.5 \xff\xfe\n".to_vec();
        bytes.extend_from_slice(b"----------------------\n");

        let agg = StateAggregator::new(8);
        let stats = consume_lines(bytes.as_slice(), FrameAssembler::default(), &agg, false)
            .await
            .unwrap();
        assert_eq!(stats.snapshots, 1);
    }

    #[tokio::test]
    async fn overlong_line_is_dropped_with_its_frame() {
        let mut bytes = b"Nodo: 1\nDatos: Msg=Temp: ".to_vec();
        bytes.extend(std::iter::repeat(b'9').take(4096));
        bytes.extend_from_slice(b"\n----------------------\n");
        bytes.extend_from_slice(b"Nodo: 2\nDatos: Msg=Temp: 18\n----------------------\n");

        let agg = StateAggregator::new(8);
        let assembler = FrameAssembler::new(DEFAULT_SEPARATOR, 256);
        let stats = consume_lines(bytes.as_slice(), assembler, &agg, false).await.unwrap();

        assert_eq!(
            stats,
            IngestStats { frames: 1, empty: 0, snapshots: 1, oversized: 1 }
        );
        let current = agg.current().await;
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].node.as_str(), "NODE2");
    }

    #[tokio::test]
    async fn frame_without_separator_is_capped() {
        let line = "Datos: Msg=Temp: 20\n";
        let stream = format!("{}Nodo: 5\nDatos: Msg=pH: 6.9\n----------------------\n", line.repeat(1000));

        let agg = StateAggregator::new(8);
        let assembler = FrameAssembler::new(DEFAULT_SEPARATOR, 1024);
        let stats = consume_lines(stream.as_bytes(), assembler, &agg, false).await.unwrap();

        // the runaway frame swallows everything up to its separator
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.frames, 0);
        assert!(agg.current().await.is_empty());
    }
}
