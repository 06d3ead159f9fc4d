use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::{AppConfig, Pacing};
use crate::errors::{AppError, AppResult};
use crate::output::{
    build_locality_workbook, locality_workbook_path, save_workbook_with_retry, RunLog,
};
use crate::places::PlacesApi;
use crate::plan::ScanPlan;
use crate::records::OutputRow;
use crate::report::generate_consolidated_report;

/// Drives the whole collection: region → locality → term → page → place,
/// strictly sequential, with the pacing delays as the only rate limiting.
pub struct Harvester {
    api: Arc<dyn PlacesApi>,
    plan: ScanPlan,
    pacing: Pacing,
    output_dir: PathBuf,
    max_pages_per_term: u32,
}

impl Harvester {
    pub fn new(api: Arc<dyn PlacesApi>, plan: ScanPlan, pacing: Pacing, config: &AppConfig) -> Self {
        Self {
            api,
            plan,
            pacing,
            output_dir: PathBuf::from(&config.output_dir),
            max_pages_per_term: config.max_pages_per_term,
        }
    }

    /// Collects every row for one (region, locality) pair, re-saving the
    /// workbook after each search term so a crash loses at most one term's
    /// worth of rows. Returns the saved path, or `None` when nothing could be
    /// written.
    pub async fn scan_locality(
        &self,
        region: &str,
        locality: &str,
        accumulator: &mut Vec<OutputRow>,
    ) -> Option<PathBuf> {
        info!(locality, region, "scanning locality");

        let mut rows: Vec<OutputRow> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let extracted_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let path = locality_workbook_path(&self.output_dir, region, locality);

        for term in &self.plan.search_terms {
            let term = term.as_str();
            info!(term, locality, "searching");
            if let Err(err) = self
                .run_term(region, locality, term, &extracted_at, &mut seen, &mut rows, accumulator)
                .await
            {
                // One term failing never takes the locality down with it.
                error!(%err, term, locality, "search term aborted");
            }

            self.save_locality(&path, locality, &rows).await;
            sleep(self.pacing.between_terms).await;
        }

        self.save_locality(&path, locality, &rows).await
    }

    /// Pagination loop for a single term. Search and detail failures are
    /// already absorbed below this layer; anything surfacing here aborts the
    /// term only.
    #[allow(clippy::too_many_arguments)]
    async fn run_term(
        &self,
        region: &str,
        locality: &str,
        term: &str,
        extracted_at: &str,
        seen: &mut HashSet<String>,
        rows: &mut Vec<OutputRow>,
        accumulator: &mut Vec<OutputRow>,
    ) -> AppResult<()> {
        let mut page_token: Option<String> = None;
        let mut page_count: u32 = 0;

        loop {
            let page = self
                .api
                .search(locality, region, term, page_token.as_deref())
                .await;

            if page.results.is_empty() {
                info!(term, locality, "no results");
            } else {
                info!(
                    count = page.results.len(),
                    page = page_count + 1,
                    "found results"
                );
                for place in &page.results {
                    // Terms overlap heavily; each place id is processed once
                    // per locality.
                    if !seen.insert(place.place_id.clone()) {
                        continue;
                    }

                    if let Some(detail) = self.api.fetch_detail(&place.place_id).await {
                        if let Some(row) =
                            OutputRow::from_detail(&detail, region, locality, term, extracted_at)
                        {
                            rows.push(row.clone());
                            accumulator.push(row);
                        }
                    }

                    sleep(self.pacing.detail_fetch).await;
                }
            }

            match page.next_page_token {
                None => break,
                Some(token) => {
                    page_count += 1;
                    if page_count >= self.max_pages_per_term {
                        info!(max_pages = self.max_pages_per_term, "page limit reached");
                        break;
                    }
                    info!("waiting before requesting the next page");
                    sleep(self.pacing.next_page).await;
                    page_token = Some(token);
                }
            }
        }

        Ok(())
    }

    async fn save_locality(
        &self,
        path: &std::path::Path,
        locality: &str,
        rows: &[OutputRow],
    ) -> Option<PathBuf> {
        let mut workbook = match build_locality_workbook(locality, rows) {
            Ok(workbook) => workbook,
            Err(err) => {
                error!(%err, locality, "could not build locality workbook");
                return None;
            }
        };
        match save_workbook_with_retry(&mut workbook, path, self.pacing.save_retry).await {
            Ok(()) => Some(path.to_path_buf()),
            Err(err) => {
                error!(%err, locality, "could not save locality workbook");
                None
            }
        }
    }

    /// Scans every locality of one region. Unknown region names are a
    /// configuration error: reported, nothing scanned.
    pub async fn scan_region(
        &self,
        region_name: &str,
        accumulator: &mut Vec<OutputRow>,
    ) -> AppResult<Vec<PathBuf>> {
        let Some(region) = self.plan.region(region_name) else {
            return Err(AppError::Config(format!(
                "no localities configured for region '{region_name}'"
            )));
        };

        let started = Instant::now();
        info!(region = region_name, "scanning all localities");
        let mut files = Vec::new();

        for locality in &region.localities {
            let locality = locality.as_str();
            let locality_started = Instant::now();
            if let Some(path) = self.scan_locality(&region.name, locality, accumulator).await {
                files.push(path);
            }
            info!(
                locality,
                minutes = %elapsed_minutes(locality_started),
                "locality completed"
            );
            info!("waiting before the next locality");
            sleep(self.pacing.between_localities).await;
        }

        info!(
            region = region_name,
            minutes = %elapsed_minutes(started),
            files = files.len(),
            "region completed"
        );
        Ok(files)
    }

    /// Full run over every configured region, with a plaintext progress log
    /// and the consolidated report at the end. This is the only level where
    /// an error is allowed to kill the run.
    pub async fn scan_all(&self) -> AppResult<Vec<PathBuf>> {
        let started = Instant::now();
        let run_log = RunLog::create(&self.output_dir)?;
        let mut accumulator: Vec<OutputRow> = Vec::new();
        let mut files = Vec::new();

        match self.run_regions(&run_log, &mut accumulator, &mut files).await {
            Ok(()) => {
                generate_consolidated_report(&accumulator, &self.output_dir);
                let minutes = elapsed_minutes(started);
                info!(%minutes, files = files.len(), "full scan finished");
                run_log.append(&format!(
                    "Proceso completo finalizado en {minutes} minutos. Archivos generados: {}",
                    files.len()
                ))?;
                Ok(files)
            }
            Err(err) => {
                error!(%err, "critical error; aborting run");
                run_log.append(&format!("ERROR CRÍTICO: {err}"))?;
                Err(err)
            }
        }
    }

    async fn run_regions(
        &self,
        run_log: &RunLog,
        accumulator: &mut Vec<OutputRow>,
        files: &mut Vec<PathBuf>,
    ) -> AppResult<()> {
        for region in &self.plan.regions {
            let region_started = Instant::now();
            info!(region = %region.name, "scanning region");

            files.extend(self.scan_region(&region.name, accumulator).await?);

            let minutes = elapsed_minutes(region_started);
            run_log.append(&format!(
                "Provincia {} completada en {minutes} minutos",
                region.name
            ))?;

            info!("waiting before the next region");
            sleep(self.pacing.between_regions).await;
        }
        Ok(())
    }

    /// CLI path for one explicit (region, locality) pair; both names must be
    /// in the plan.
    pub async fn scan_single_locality(
        &self,
        region_name: &str,
        locality: &str,
    ) -> AppResult<Option<PathBuf>> {
        let Some(region) = self.plan.region(region_name) else {
            return Err(AppError::Config(format!(
                "region '{region_name}' is not in the configured region list"
            )));
        };
        if !region.has_locality(locality) {
            return Err(AppError::Config(format!(
                "locality '{locality}' is not configured for region '{region_name}'"
            )));
        }

        let mut accumulator = Vec::new();
        let saved = self.scan_locality(region_name, locality, &mut accumulator).await;
        match &saved {
            Some(path) => info!(path = %path.display(), "scan completed"),
            None => error!(locality, "locality scan produced no file"),
        }
        Ok(saved)
    }
}

fn elapsed_minutes(started: Instant) -> String {
    format!("{:.2}", started.elapsed().as_secs_f64() / 60.0)
}
