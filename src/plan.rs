use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{AppError, AppResult};

/// What to scan: regions, their localities, and the search terms combined
/// with every locality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPlan {
    pub regions: Vec<RegionPlan>,
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionPlan {
    pub name: String,
    pub localities: Vec<String>,
}

impl Default for ScanPlan {
    fn default() -> Self {
        Self {
            regions: vec![RegionPlan {
                name: "Ciudad Autónoma de Buenos Aires".to_string(),
                localities: [
                    "Recoleta",
                    "Palermo",
                    "San Telmo",
                    "Puerto Madero",
                    "Belgrano",
                    "Caballito",
                    "Núñez",
                    "Villa Urquiza",
                    "Villa Crespo",
                    "Flores",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            }],
            search_terms: [
                "servicio técnico de notebooks",
                "venta de notebooks nuevas",
                "venta de notebooks usadas",
                "venta de notebooks reacondicionadas",
                "reparación de notebooks",
                "mantenimiento de notebooks",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl ScanPlan {
    /// Loads a plan from a JSON file, writing the default plan there when the
    /// file is missing or unreadable as a plan.
    pub fn load(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(plan) => Ok(plan),
                Err(err) => {
                    warn!(?err, path = %path.display(), "failed to parse scan plan; regenerating defaults");
                    let defaults = Self::default();
                    defaults.persist(path)?;
                    Ok(defaults)
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let defaults = Self::default();
                defaults.persist(path)?;
                Ok(defaults)
            }
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn persist(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn region(&self, name: &str) -> Option<&RegionPlan> {
        self.regions.iter().find(|region| region.name == name)
    }
}

impl RegionPlan {
    pub fn has_locality(&self, locality: &str) -> bool {
        self.localities.iter().any(|known| known == locality)
    }
}
