use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{net::SocketAddr, path::PathBuf};
use tokio::io::AsyncReadExt;

use s3put::{Emulator, Session, S3};

#[derive(Debug, Parser)]
#[command(name = "s3put", about = "Upload a single object to S3-compatible storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file (or stdin) to bucket/key
    Put {
        bucket: String,
        key: String,
        /// Read the body from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Run the in-memory S3 emulator until interrupted
    Emulate {
        #[arg(long, default_value = "127.0.0.1:4572")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Put { bucket, key, file } => put(&bucket, &key, file).await,
        Command::Emulate { addr } => emulate(addr).await,
    }
}

async fn put(bucket: &str, key: &str, file: Option<PathBuf>) -> anyhow::Result<()> {
    let body = match file {
        Some(path) => tokio::fs::read(&path)
            .await
            .with_context(|| format!("fail read file, path is [{}]", path.display()))?,
        None => {
            let mut body = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut body)
                .await
                .context("fail read stdin")?;
            body
        }
    };

    let session = Session::from_env()?;
    let s3 = S3::connect(&session).await?;
    let size = body.len();
    s3.put(bucket, key, body).await?;

    tracing::info!("uploaded {} bytes to s3://{}/{}", size, bucket, key);
    Ok(())
}

async fn emulate(addr: SocketAddr) -> anyhow::Result<()> {
    let emulator = Emulator::bind(addr).await?;
    tracing::info!("emulator listening on {}", emulator.endpoint_url());
    println!(
        "AWS_ENDPOINT_URL={} AWS_REGION={} AWS_S3_FORCE_PATH_STYLE=true",
        emulator.endpoint_url(),
        Emulator::REGION
    );

    tokio::signal::ctrl_c()
        .await
        .context("fail listen for shutdown signal")?;
    emulator.shutdown().await
}
