use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::Workbook;
use tracing::{error, info};

use crate::errors::AppResult;
use crate::output::{header_format, write_rows_sheet};
use crate::records::OutputRow;

/// Aggregate counts over every row collected in a run. Key order is
/// first-seen collection order, not sorted.
#[derive(Debug)]
pub struct ReportStats {
    pub by_region: Vec<(String, usize)>,
    pub by_locality: Vec<((String, String), usize)>,
    pub by_term: Vec<(String, usize)>,
}

impl ReportStats {
    pub fn collect(rows: &[OutputRow]) -> Self {
        Self {
            by_region: count_by(rows, |row| row.region.clone()),
            by_locality: count_by(rows, |row| (row.locality.clone(), row.region.clone())),
            by_term: count_by(rows, |row| row.search_term.clone()),
        }
    }
}

fn count_by<K, F>(rows: &[OutputRow], key: F) -> Vec<(K, usize)>
where
    K: PartialEq,
    F: Fn(&OutputRow) -> K,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    for row in rows {
        let k = key(row);
        match counts.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, count)) => *count += 1,
            None => counts.push((k, 1)),
        }
    }
    counts
}

/// Builds and saves the end-of-run consolidated workbook. Runs last, so a
/// failure here is logged and absorbed instead of crashing the run; there is
/// no retry either.
pub fn generate_consolidated_report(rows: &[OutputRow], output_dir: &Path) -> Option<PathBuf> {
    if rows.is_empty() {
        info!("no data collected; skipping consolidated report");
        return None;
    }

    info!("generating consolidated report");
    match build_and_save(rows, output_dir) {
        Ok(path) => {
            info!(path = %path.display(), "consolidated report generated");
            Some(path)
        }
        Err(err) => {
            error!(%err, "failed to generate consolidated report");
            None
        }
    }
}

fn build_and_save(rows: &[OutputRow], output_dir: &Path) -> AppResult<PathBuf> {
    let stats = ReportStats::collect(rows);
    let mut workbook = Workbook::new();

    let data_sheet = workbook.add_worksheet();
    data_sheet.set_name("Consolidado")?;
    write_rows_sheet(data_sheet, rows)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Estadísticas")?;
    let bold = header_format();

    let mut row: u32 = 0;
    sheet.write_with_format(row, 0, "Estadísticas por Provincia", &bold)?;
    row += 1;
    sheet.write(row, 0, "Provincia")?;
    sheet.write(row, 1, "Cantidad de registros")?;
    row += 1;
    for (region, count) in &stats.by_region {
        sheet.write(row, 0, region)?;
        sheet.write(row, 1, *count as u32)?;
        row += 1;
    }

    row += 2;
    sheet.write_with_format(row, 0, "Estadísticas por Localidad", &bold)?;
    row += 1;
    sheet.write(row, 0, "Localidad")?;
    sheet.write(row, 1, "Provincia")?;
    sheet.write(row, 2, "Cantidad de registros")?;
    row += 1;
    for ((locality, region), count) in &stats.by_locality {
        sheet.write(row, 0, locality)?;
        sheet.write(row, 1, region)?;
        sheet.write(row, 2, *count as u32)?;
        row += 1;
    }

    row += 2;
    sheet.write_with_format(row, 0, "Estadísticas por Término", &bold)?;
    row += 1;
    sheet.write(row, 0, "Término")?;
    sheet.write(row, 1, "Cantidad de registros")?;
    row += 1;
    for (term, count) in &stats.by_term {
        sheet.write(row, 0, term)?;
        sheet.write(row, 1, *count as u32)?;
        row += 1;
    }

    row += 2;
    sheet.write_with_format(row, 0, "Resumen General", &bold)?;
    row += 1;
    sheet.write(row, 0, "Registros totales:")?;
    sheet.write(row, 1, rows.len() as u32)?;
    row += 1;
    sheet.write(row, 0, "Provincias escaneadas:")?;
    sheet.write(row, 1, stats.by_region.len() as u32)?;
    row += 1;
    sheet.write(row, 0, "Localidades escaneadas:")?;
    sheet.write(row, 1, stats.by_locality.len() as u32)?;
    row += 1;
    sheet.write(row, 0, "Términos utilizados:")?;
    sheet.write(row, 1, stats.by_term.len() as u32)?;
    row += 1;
    sheet.write(row, 0, "Fecha de generación:")?;
    sheet.write(
        row,
        1,
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    )?;
    sheet.autofit();

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!(
        "empresas_reporte_consolidado_{}.xlsx",
        Local::now().format("%Y-%m-%d")
    ));
    workbook.save(&path)?;
    Ok(path)
}
