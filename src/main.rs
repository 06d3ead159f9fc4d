use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use secrecy::SecretString;
use tracing::error;

use maps_harvester::{
    init_tracing, AppConfig, AppError, Harvester, HttpPlacesClient, Pacing, PlacesApi,
    RequestExecutor, ScanPlan,
};

#[derive(Debug, Parser)]
#[command(name = "maps-harvester")]
#[command(about = "Harvests business listings from the Google Places API into spreadsheets")]
struct Cli {
    /// Google Places API key; falls back to GOOGLE_PLACES_API_KEY when omitted.
    api_key: Option<String>,
    /// Scan only this region; everything configured is scanned when omitted.
    region: Option<String>,
    /// Scan only this locality within the given region.
    locality: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let api_key = cli
        .api_key
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
        .or_else(|| config.google_places_api_key.clone());
    let Some(api_key) = api_key else {
        bail!("no API key given; pass one as the first argument or set GOOGLE_PLACES_API_KEY");
    };

    let plan = match &config.scan_plan_path {
        Some(path) => ScanPlan::load(Path::new(path))?,
        None => ScanPlan::default(),
    };

    let executor = Arc::new(RequestExecutor::new(&config)?);
    let client = HttpPlacesClient::new(executor, api_key, &config);

    if !client.check_connection().await {
        eprintln!("could not verify the API connection; check the API key and network");
        std::process::exit(1);
    }

    let api: Arc<dyn PlacesApi> = Arc::new(client);
    let harvester = Harvester::new(api, plan, Pacing::default(), &config);

    let outcome = match (cli.region, cli.locality) {
        (Some(region), Some(locality)) => harvester
            .scan_single_locality(&region, &locality)
            .await
            .map(|_| ()),
        (Some(region), None) => {
            let mut accumulator = Vec::new();
            harvester.scan_region(&region, &mut accumulator).await.map(|_| ())
        }
        _ => harvester.scan_all().await.map(|_| ()),
    };

    match outcome {
        Ok(()) => Ok(()),
        // A bad region or locality name skips the operation without failing
        // the process.
        Err(AppError::Config(message)) => {
            error!(%message, "nothing scanned");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
