use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context as AnyhowContext, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::TryStreamExt;
use haven::{Context, ContextBuilder, Progress};
use haven_config::ConfigArgs;
use haven_core::{FileKey, FileSource};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "haven", version, about = "Store files on the DataHaven network")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a bucket unless it exists already and print its id
    Bucket { name: String },

    /// Upload a file into a bucket, creating the bucket when needed
    Upload {
        bucket: String,
        path: PathBuf,
        /// Record the file key in the asset registry afterwards
        #[arg(long)]
        register: bool,
        /// Emit an upload event on the tracker contract afterwards
        #[arg(long)]
        track: bool,
        /// Content type reported with the upload result
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },

    /// Download a file by its key
    Fetch {
        file_key: String,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Sign in first, needed for private files
        #[arg(long)]
        authenticate: bool,
    },

    /// Manage the asset registry
    #[command(subcommand)]
    Assets(AssetsCommand),

    /// Switch the wallet to the storage network, adding it when unknown
    SwitchNetwork,
}

#[derive(Subcommand, Debug)]
enum AssetsCommand {
    /// List the file keys recorded for the connected account
    List,
    Save { cid: String },
    Delete { cid: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = ContextBuilder::from_cli(&cli.config)?.build()?;

    if let Err(err) = run(&context, cli.command).await {
        error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

async fn run(context: &Context, command: Command) -> Result<()> {
    match command {
        Command::Bucket { name } => {
            let owner = context.connect().await?;
            let (progress, printer) = progress_printer();
            let bucket_id = context.ensure_bucket(owner, &name, &progress).await;
            finish(progress, printer).await;
            println!("{}", bucket_id?);
        }
        Command::Upload {
            bucket,
            path,
            register,
            track,
            content_type,
        } => {
            let owner = context.connect().await?;
            let mut file = FileSource::from_path(&path)
                .with_context(|| format!("could not open {}", path.display()))?;
            if let Some(content_type) = content_type {
                file = file.with_content_type(content_type);
            }

            let (progress, printer) = progress_printer();
            let outcome = async {
                let bucket_id = context.ensure_bucket(owner, &bucket, &progress).await?;
                Ok::<_, anyhow::Error>(context.upload(bucket_id, &file, Some(owner), &progress).await?)
            }
            .await;
            finish(progress, printer).await;
            let outcome = outcome?;
            println!("{}", outcome.file_key);

            let cid = outcome.file_key.to_string();
            if register {
                let registry = context.registry()?;
                registry.ensure_contract_chain().await?;
                let tx_hash = registry.save_asset(owner, &cid).await?;
                println!("‣ registered in transaction {tx_hash}");
            }
            if track {
                let tx_hash = context.tracker()?.track(owner, &cid).await?;
                println!("‣ tracked in transaction {tx_hash}");
            }
        }
        Command::Fetch {
            file_key,
            out,
            authenticate,
        } => {
            let file_key = FileKey::from_str(&file_key)
                .map_err(|err| anyhow::anyhow!("invalid file key {file_key}: {err}"))?;
            let owner = context.connect().await?;
            if authenticate {
                context.sessions().authenticate(owner).await?;
            } else {
                context.sessions().session(owner).await?;
            }

            let stream = context.fetch(&file_key).await?;
            match out {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("could not create {}", path.display()))?;
                    let written = write_stream(stream, &mut file).await?;
                    println!("‣ wrote {written} bytes to {}", path.display());
                }
                None => {
                    write_stream(stream, &mut tokio::io::stdout()).await?;
                }
            }
        }
        Command::Assets(command) => {
            let owner = context.connect().await?;
            let registry = context.registry()?;
            if !registry.is_configured() {
                bail!("registry.contract_address is not configured");
            }
            match command {
                AssetsCommand::List => {
                    for cid in registry.get_assets(owner).await? {
                        println!("{cid}");
                    }
                }
                AssetsCommand::Save { cid } => {
                    registry.ensure_contract_chain().await?;
                    println!("{}", registry.save_asset(owner, &cid).await?);
                }
                AssetsCommand::Delete { cid } => {
                    registry.ensure_contract_chain().await?;
                    println!("{}", registry.delete_asset(owner, &cid).await?);
                }
            }
        }
        Command::SwitchNetwork => {
            context.switch_network().await?;
            println!(
                "‣ wallet is on {} ({})",
                context.config().chain.chain_name,
                context.config().chain.chain_id
            );
        }
    }
    Ok(())
}

/// Progress reporter whose events are printed to stderr as they arrive.
fn progress_printer() -> (Progress, JoinHandle<()>) {
    let (progress, mut rx) = Progress::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.stage {
                Some(stage) => eprintln!("‣ [{stage}] {}", event.message),
                None => eprintln!("‣ {}", event.message),
            }
        }
    });
    (progress, printer)
}

/// Closes the progress channel and waits until everything sent was printed.
async fn finish(progress: Progress, printer: JoinHandle<()>) {
    drop(progress);
    let _ = printer.await;
}

async fn write_stream<W>(mut stream: haven::retrieval::ByteStream, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(chunk) = stream.try_next().await? {
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}
