pub mod config;
pub mod errors;
pub mod output;
pub mod places;
pub mod plan;
pub mod records;
pub mod report;
pub mod request;
pub mod scanner;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::{AppConfig, Pacing};
pub use errors::{AppError, AppResult};
pub use places::{HttpPlacesClient, PlaceDetail, PlacesApi, RawPlace, SearchPage};
pub use plan::{RegionPlan, ScanPlan};
pub use records::{OutputRow, COLUMNS, SOURCE_LABEL};
pub use request::RequestExecutor;
pub use scanner::Harvester;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,maps_harvester=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
