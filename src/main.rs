use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use mbgfeed::app::{AppEvent, FeedViewModel};
use mbgfeed::config::Config;
use mbgfeed::events::handle_app_event;
use mbgfeed::feed::build_client;
use mbgfeed::presenter::{LogPresenter, LOAD_FAILED_MESSAGE, LOAD_FAILED_TITLE};

#[derive(Parser, Debug)]
#[command(name = "mbgfeed", about = "Fetch the article feed and list it with thumbnails")]
struct Args {
    /// Feed URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Config file (default: ~/.config/mbgfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List articles without fetching thumbnails
    #[arg(long)]
    no_images: bool,
}

/// Wait for one completion and apply it. Returns false on Ctrl+C or when
/// every sender is gone.
async fn pump(vm: &mut FeedViewModel, event_rx: &mut mpsc::Receiver<AppEvent>) -> bool {
    tokio::select! {
        event = event_rx.recv() => match event {
            Some(event) => {
                handle_app_event(vm, event);
                true
            }
            None => false,
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling outstanding fetches");
            vm.shutdown();
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(url) = args.url {
        config.feed_url = url;
    }

    let client = build_client(&config).context("Failed to build HTTP client")?;

    // Completions from fetch tasks are applied here, on the main task
    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);
    let mut vm = FeedViewModel::from_config(&config, client, Box::new(LogPresenter), event_tx);

    vm.load_feed();
    while vm.is_loading() {
        if !pump(&mut vm, &mut event_rx).await {
            break;
        }
    }

    if !vm.is_loaded() {
        anyhow::bail!("{}: {}", LOAD_FAILED_TITLE, LOAD_FAILED_MESSAGE);
    }

    if !args.no_images {
        for index in 0..vm.row_count() {
            vm.row_data(index);
        }
        while vm.in_flight_images() > 0 {
            if !pump(&mut vm, &mut event_rx).await {
                break;
            }
        }
    }

    for index in 0..vm.row_count() {
        let Some(selection) = vm.select(index) else {
            continue;
        };
        let image = match (&selection.image, args.no_images) {
            (Some(bytes), _) => format!("{} bytes", bytes.len()),
            (None, true) => "skipped".to_string(),
            (None, false) => "pending".to_string(),
        };
        println!(
            "{:>3}  {}  by {}  [{}]",
            index, selection.article.title, selection.article.author_name, image
        );
    }

    println!(
        "{} articles, {} thumbnails cached",
        vm.row_count(),
        vm.cached_images()
    );
    Ok(())
}
