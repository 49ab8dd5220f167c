//! JPEG loop server example
//!
//! Run with: cargo run --example jpeg_loop [JPEG_DIR] [PORT]
//!
//! Examples:
//!   cargo run --example jpeg_loop                   # synthetic frames on :8080
//!   cargo run --example jpeg_loop ./frames          # loops ./frames/*.jpg on :8080
//!   cargo run --example jpeg_loop ./frames 9000     # same, on :9000
//!
//! ## Watching the stream
//!
//! Browser:
//!   http://localhost:8080/
//!
//! ffplay:
//!   ffplay -f mjpeg http://localhost:8080/
//!
//! A plain thread plays the part of the video pipeline: it pushes one frame
//! every 40 ms into the server's `FrameSink`, which is safe to call from
//! outside the Tokio runtime.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use mjpeg_rs::{FrameSink, MjpegServer, ServerConfig};

const FRAME_INTERVAL: Duration = Duration::from_millis(40);

fn load_frames(dir: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths.iter().map(std::fs::read).collect()
}

/// Opaque placeholder frames, used when no directory is given
fn synthetic_frames() -> Vec<Vec<u8>> {
    (0u8..25)
        .map(|i| {
            let mut frame = vec![0xFF, 0xD8];
            frame.extend(std::iter::repeat(i).take(1024 + i as usize * 64));
            frame.extend([0xFF, 0xD9]);
            frame
        })
        .collect()
}

fn run_pipeline(sink: FrameSink, frames: Vec<Vec<u8>>) {
    let started = Instant::now();

    for frame in frames.iter().cycle() {
        if sink.is_closed() {
            break;
        }
        let timestamp = started.elapsed().as_nanos() as u64;
        sink.push(frame.clone(), timestamp);
        thread::sleep(FRAME_INTERVAL);
    }
}

fn print_usage() {
    eprintln!("Usage: jpeg_loop [JPEG_DIR] [PORT]");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let port = match args.get(2) {
        Some(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Error: invalid port {:?}: {}", port, e);
                print_usage();
                std::process::exit(1);
            }
        },
        None => 8080,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?)
                .add_directive("jpeg_loop=debug".parse()?),
        )
        .init();

    let frames = match args.get(1) {
        Some(dir) => load_frames(Path::new(dir))?,
        None => synthetic_frames(),
    };
    if frames.is_empty() {
        eprintln!("Error: no .jpg files found");
        std::process::exit(1);
    }

    let config = ServerConfig::default().port(port);
    let server = MjpegServer::new(config)?;
    let mut handle = server.start()?;

    println!("Streaming {} frames on http://{}/", frames.len(), handle.local_addr());

    let sink = handle.frame_sink();
    thread::spawn(move || run_pipeline(sink, frames));

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    let stats = handle.stats();
    println!(
        "Stats: connections={} rejected={} frames_published={}",
        stats.total_connections,
        stats.rejected_connections,
        handle.broadcaster().stats().frames_published,
    );

    handle.stop().await;
    Ok(())
}
