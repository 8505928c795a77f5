use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubedigest::cli::{Cli, Commands};
use tubedigest::config::{load_channels, Config};
use tubedigest::http::{HttpClient, ReqwestClient};
use tubedigest::transcript::WatchPageProvider;
use tubedigest::{feed, output, resolver, transcript, ScraperRunner, YouTubeScraper};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Run {
            channels,
            max_results,
            languages,
            format,
            output: output_path,
            deadline_secs,
        } => {
            if let Some(max_results) = max_results {
                config.max_results_per_channel = max_results;
            }
            if let Some(languages) = languages {
                config.languages = languages;
            }
            if deadline_secs.is_some() {
                config.deadline_secs = deadline_secs;
            }
            config.validate()?;

            let channels_path = channels.unwrap_or_else(|| config.channels_file.clone());
            tracing::info!("Loading channels from {}", channels_path.display());
            let references = load_channels(&channels_path)?;

            if references.is_empty() {
                anyhow::bail!("No channels configured in {}", channels_path.display());
            }
            tracing::info!("Found {} channel(s) to process", references.len());

            let http = build_client(&config)?;
            let provider = Arc::new(WatchPageProvider::new(http.clone()));
            let scraper = YouTubeScraper::new(http, provider, references, config.batch_options())?;

            let mut runner = ScraperRunner::new();
            runner.register(Box::new(scraper));
            tracing::info!("Running registered scrapers: {:?}", runner.list_scrapers());

            let progress = spinner(cli.quiet, "Fetching videos and transcripts...");
            let results = runner.run_all().await;
            progress.finish_and_clear();

            let content = output::render_results(&results, &format)?;
            match output_path {
                Some(path) => {
                    output::save_to_file(&content, &path).await?;
                    println!("Results saved to: {}", path.display());
                }
                None => println!("{}", content),
            }
        }
        Commands::Resolve { references } => {
            let http = build_client(&config)?;
            for reference in &references {
                match resolver::resolve(http.as_ref(), reference).await {
                    Some(id) => println!("{} -> {}", reference, id),
                    None => println!("{} -> (unresolved)", reference),
                }
            }
        }
        Commands::Feed { channel, max_results } => {
            let http = build_client(&config)?;
            let channel_id = resolver::resolve_reference(http.as_ref(), &channel)
                .await
                .with_context(|| format!("Could not resolve channel {}", channel))?;

            let cap = max_results.unwrap_or(config.max_results_per_channel);
            let videos = feed::fetch_channel_feed(http.as_ref(), &channel_id, cap)
                .await
                .with_context(|| format!("Failed to fetch feed for channel {}", channel_id))?;

            println!("Latest videos for {}:", channel_id);
            print!("{}", output::format_videos(&videos));
        }
        Commands::Transcript { video_id, languages } => {
            if let Some(languages) = languages {
                config.languages = languages;
            }
            config.validate()?;
            let languages = config.preferred_languages();
            let http = build_client(&config)?;
            let provider = WatchPageProvider::new(http);

            let progress = spinner(cli.quiet, "Fetching transcript...");
            let result = transcript::fetch_transcript(&provider, &video_id, &languages).await;
            progress.finish_and_clear();

            match result {
                Some(transcript) => println!("{}", transcript.text),
                None => anyhow::bail!("No transcript available for {}", video_id),
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "tubedigest=debug" } else { "tubedigest=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn build_client(config: &Config) -> Result<Arc<dyn HttpClient>> {
    let client = ReqwestClient::new(config.request_timeout(), &config.http.user_agent)
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(client))
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}
