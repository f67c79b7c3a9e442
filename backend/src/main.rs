// Everynote - notes and tasks backend
// Entry point: opens the configured database and prints JSON to stdout
//
//   everynote              today's daily note
//   everynote today        same
//   everynote search TERMS ranked search results

use anyhow::{bail, Context};
use everynote::app::AppState;
use everynote::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "everynote=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Everynote");

    let config = Config::from_env();
    let state = AppState::initialize(&config)
        .await
        .with_context(|| format!("failed to open data directory {:?}", config.data_dir))?;

    let args: Vec<String> = std::env::args().skip(1).collect();

    let output = match args.first().map(String::as_str) {
        None | Some("today") => serde_json::to_string_pretty(&state.daily.today().await?)?,
        Some("search") => {
            let query = args[1..].join(" ");
            serde_json::to_string_pretty(&state.search.search(&query, None).await?)?
        }
        Some(other) => bail!("unknown command '{}', expected 'today' or 'search <terms>'", other),
    };

    println!("{}", output);

    Ok(())
}
