// services/ad_client/src/bin/adctl.rs

use ad_client_lib::{
    adapters::{FileIdentityStore, HeadlessPage, HttpBeaconSender, HttpTransport},
    config::Config,
    delivery::{DeliveryEngine, DeliveryPorts, EventKind, RequestOverrides},
    error::ClientError,
};
use ad_delivery_core::{ContainerRef, RequestMode};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONTAINER: &str = "#ad-slot";

#[derive(Parser)]
#[command(name = "adctl", about = "Request, render and print one ad", version)]
struct Cli {
    /// Treat the text as an agent response instead of a user query.
    #[arg(long, conflicts_with = "query")]
    agent: bool,

    /// Treat the text as a user query (the configured default unless AD_MODE says otherwise).
    #[arg(long)]
    query: bool,

    /// The text to match ads against.
    #[arg(required = true)]
    text: Vec<String>,
}

impl Cli {
    fn mode(&self) -> Option<RequestMode> {
        if self.agent {
            Some(RequestMode::AgentResponse)
        } else if self.query {
            Some(RequestMode::UserQuery)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- 2. Read the Request from the Command Line ---
    let mode = cli.mode();
    let input = cli.text.join(" ");

    // --- 3. Initialize Adapters & the Engine ---
    let http = reqwest::Client::new();
    let page = Arc::new(HeadlessPage::new());
    page.add_container(CONTAINER);
    let ports = DeliveryPorts {
        transport: Arc::new(HttpTransport::new(http.clone())),
        beacons: Arc::new(HttpBeaconSender::new(http, config.options.timeout)),
        page: page.clone(),
        visibility: None,
        identity: Arc::new(FileIdentityStore::new(config.identity_path.clone())),
    };
    let engine =
        DeliveryEngine::configure(config.api_key.clone(), config.options.clone(), ports).await?;
    engine.on(EventKind::Error, |event| info!("Delivery failed: {:?}", event));

    // --- 4. Request, Render and Print ---
    let overrides = RequestOverrides {
        mode,
        ..RequestOverrides::default()
    };
    let ad = engine.request_ad(input, overrides).await?;
    let rendered = engine.render(
        ad.as_ref(),
        &ContainerRef::Selector(CONTAINER.to_string()),
        None,
    )?;

    match page.markup(CONTAINER) {
        Some(markup) => println!("{}", markup),
        None => println!("no ad available"),
    }

    engine.flush_beacons().await;
    if let Some(rendered) = rendered {
        rendered.unmount().await;
    }
    Ok(())
}
