use std::time::Duration;

use clap::Parser;
use error::AppError;
use hlsdl_engine::{
    CancellationToken, DownloadMode, DownloaderConfig, HlsProtocolBuilder, ProxyAuth,
    ProxyConfig, ProxyType, VariantPreference,
};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod error;
mod processor;
mod utils;

use cli::CliArgs;
use processor::DownloadJob;
use utils::progress::{EventOutput, ProgressManager};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

fn proxy_settings(args: &CliArgs) -> Result<(Option<ProxyConfig>, bool), AppError> {
    if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        return Ok((None, false));
    }

    let Some(proxy_url) = args.proxy.as_ref() else {
        return Ok((None, true));
    };

    let proxy_type: ProxyType = args
        .proxy_type
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid proxy type: '{}'", args.proxy_type)))?;

    // Authentication only applies when both halves are given
    let auth = match (&args.proxy_user, &args.proxy_pass) {
        (Some(username), Some(password)) => Some(ProxyAuth {
            username: username.clone(),
            password: password.clone(),
        }),
        (None, None) => None,
        _ => {
            warn!("Ignoring proxy credentials: both --proxy-user and --proxy-pass are required");
            None
        }
    };

    info!(
        proxy_url = %proxy_url,
        proxy_type = ?proxy_type,
        has_auth = auth.is_some(),
        "Using explicit proxy configuration for downloads"
    );

    Ok((
        Some(ProxyConfig {
            url: proxy_url.clone(),
            proxy_type,
            auth,
        }),
        false,
    ))
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("hlsdl.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stderr, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s, segment={}s",
        args.timeout, args.connect_timeout, args.segment_timeout
    );

    let (proxy_config, use_system_proxy) = proxy_settings(&args)?;

    let download_config = {
        let mut builder = DownloaderConfig::builder()
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_headers(utils::build_headers(
                args.user_agent.as_deref(),
                args.referer.as_deref(),
                args.cookies.as_deref(),
                args.origin.as_deref(),
                &args.headers,
            ));

        if let Some(user_agent) = args.user_agent.as_deref().filter(|s| !s.trim().is_empty()) {
            builder = builder.with_user_agent(user_agent.trim());
        }

        if let Some(proxy) = proxy_config {
            builder = builder.with_proxy(proxy);
        } else {
            builder = builder.with_system_proxy(use_system_proxy);
        }
        builder.build()
    };

    let concurrency: usize = args
        .concurrency
        .try_into()
        .map_err(|_| AppError::InvalidInput("Invalid HLS concurrency".to_string()))?;
    if concurrency == 0 {
        return Err(AppError::InvalidInput(
            "--conc must be at least 1".to_string(),
        ));
    }

    let mut hls_builder = HlsProtocolBuilder::new()
        .with_base_config(download_config)
        .variant_preference(VariantPreference::from_strings(
            args.resolution.as_deref(),
            args.bandwidth.as_deref(),
        ))
        .download_concurrency(concurrency)
        .segment_retry_count(args.retries)
        .segment_timeout(Duration::from_secs(args.segment_timeout))
        .remux(!args.no_remux)
        .ffmpeg_path(args.ffmpeg.clone())
        .keep_segments(args.keep_segments);
    if let Some(dir) = args.work_dir.clone() {
        hls_builder = hls_builder.work_dir(dir);
    }
    let hls_config = hls_builder.into_config();

    if args.list_variants {
        return processor::list_variants(&args.url, hls_config).await;
    }

    let mode: DownloadMode = args.mode.parse().map_err(AppError::InvalidInput)?;
    let output = args
        .out
        .clone()
        .unwrap_or_else(|| utils::derive_output_from_url(&args.url, &args.downloads_dir));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after in-flight segments");
            signal_token.cancel();
        }
    });

    let progress = ProgressManager::new(if args.json_events {
        EventOutput::Json
    } else {
        EventOutput::Bar
    });

    let path = processor::process_job(DownloadJob {
        url: args.url.clone(),
        output,
        mode,
        config: hls_config,
        progress,
        cancel,
    })
    .await?;

    info!("Saved {}", path.display());
    Ok(())
}
