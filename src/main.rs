use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kb_upload_guard::config::Config;
use kb_upload_guard::http::HttpKnowledgeBase;
use kb_upload_guard::models::{StagedFile, UploadTarget};
use kb_upload_guard::name_check::NameStatus;
use kb_upload_guard::notify::{RefreshBus, TracingNotifier};
use kb_upload_guard::scope::ActiveScopeGuard;
use kb_upload_guard::upload::Uploader;
use kb_upload_guard::utils::shutdown_signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// upload documents into a knowledge base
#[derive(Parser, Debug)]
#[command(name = "kb-upload", version)]
struct Cli {
    /// knowledge base to upload into
    knowledge_base: String,

    /// files to upload (pdf, docx, pptx, xlsx, md, txt, csv)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// create the knowledge base instead of uploading into an existing one
    #[arg(long)]
    create: bool,

    /// print the upload summary as json
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        run(config, cli).await
    })
}

async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    let api = Arc::new(HttpKnowledgeBase::new(&config)?);
    let guard = ActiveScopeGuard::builder(api.clone(), api.clone())
        .notifier(Arc::new(TracingNotifier))
        .build();
    let name = cli.knowledge_base.trim().to_string();

    if cli.create && guard.check_name(&name).await? == NameStatus::Taken {
        bail!("knowledge base '{}' already exists", name);
    }

    guard.start(&name, cli.create);

    let snapshot = tokio::select! {
        s = guard.wait_settled() => s,
        _ = shutdown_signal() => {
            guard.stop();
            bail!("interrupted");
        }
    };
    if !snapshot.ready {
        bail!("knowledge base '{}' is not ready for uploads", name);
    }

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let file = StagedFile::from_path(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(file);
    }

    if guard.stage_files(&name, files) == 0 {
        bail!("no supported files to upload");
    }

    let uploader = Uploader::new(guard.clone(), api, RefreshBus::new());
    let target = UploadTarget::new(&name, cli.create);

    let summary = tokio::select! {
        res = uploader.upload_pending(&target) => res?,
        _ = shutdown_signal() => {
            guard.stop();
            bail!("interrupted");
        }
    };
    guard.stop();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.aborted {
        bail!("upload to '{}' was abandoned", name);
    }
    if summary.failed > 0 {
        bail!("{} of {} uploads failed", summary.failed, summary.total);
    }
    Ok(())
}
