use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use tracing::{error, info, warn};

use crate::errors::{AppError, AppResult};
use crate::records::{OutputRow, COLUMNS};

const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Excel caps sheet names at 31 characters.
const SHEET_NAME_LIMIT: usize = 31;

const HEADER_FILL: Color = Color::RGB(0xDDDDDD);

/// Lowercase, trim, spaces to underscores, then strip everything outside
/// `[a-z0-9_]`. Accented letters are stripped rather than transliterated;
/// that is the original behavior, kept on purpose even though two locality
/// names differing only in accents can collide.
pub fn sanitize_filename(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

pub fn locality_workbook_path(output_dir: &Path, region: &str, locality: &str) -> PathBuf {
    output_dir
        .join(sanitize_filename(region))
        .join(format!("empresas_{}.xlsx", sanitize_filename(locality)))
}

pub fn sheet_title(name: &str) -> String {
    name.chars().take(SHEET_NAME_LIMIT).collect()
}

pub fn header_format() -> Format {
    Format::new().set_bold().set_background_color(HEADER_FILL)
}

/// Writes the canonical header row plus all rows, styled like the original
/// exports: bold headers on a grey fill, autofitted columns.
pub fn write_rows_sheet(worksheet: &mut Worksheet, rows: &[OutputRow]) -> AppResult<()> {
    let header = header_format();
    for (col, title) in COLUMNS.iter().enumerate() {
        worksheet.write_with_format(0, col as u16, *title, &header)?;
    }
    for (index, row) in rows.iter().enumerate() {
        for (col, value) in row.values().iter().enumerate() {
            worksheet.write((index + 1) as u32, col as u16, *value)?;
        }
    }
    worksheet.autofit();
    Ok(())
}

pub fn build_locality_workbook(locality: &str, rows: &[OutputRow]) -> AppResult<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_title(locality))?;
    write_rows_sheet(worksheet, rows)?;
    Ok(workbook)
}

/// Runs `attempt_save` up to three times with a fixed delay between tries,
/// logging each failure with its attempt number.
pub async fn persist_with_retry<F>(path: &Path, delay: Duration, mut attempt_save: F) -> AppResult<()>
where
    F: FnMut() -> AppResult<()>,
{
    for attempt in 1..=MAX_SAVE_ATTEMPTS {
        match attempt_save() {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(%err, attempt, path = %path.display(), "failed to save file");
                if attempt < MAX_SAVE_ATTEMPTS {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    error!(path = %path.display(), attempts = MAX_SAVE_ATTEMPTS, "giving up on save");
    Err(AppError::Save {
        path: path.display().to_string(),
        attempts: MAX_SAVE_ATTEMPTS,
    })
}

/// Saves a workbook, creating missing parent directories first.
pub async fn save_workbook_with_retry(
    workbook: &mut Workbook,
    path: &Path,
    delay: Duration,
) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    persist_with_retry(path, delay, || {
        workbook.save(path).map_err(AppError::from)
    })
    .await?;
    info!(path = %path.display(), "file saved");
    Ok(())
}

/// Plaintext progress log for a full run, appended to after every region.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn create(output_dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(output_dir)?;
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = output_dir.join(format!("log_{stamp}.txt"));
        let log = Self { path };
        log.append(&format!(
            "Inicio de escaneo completo: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        Ok(log)
    }

    pub fn append(&self, line: &str) -> AppResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn sanitizes_spaces_to_underscores() {
        assert_eq!(sanitize_filename("San Telmo"), "san_telmo");
    }

    #[test]
    fn sanitizes_by_stripping_accented_characters() {
        assert_eq!(
            sanitize_filename("Ciudad Autónoma de Buenos Aires"),
            "ciudad_autnoma_de_buenos_aires"
        );
        assert_eq!(sanitize_filename("Núñez"), "nez");
    }

    #[test]
    fn sanitize_trims_and_keeps_digits() {
        assert_eq!(sanitize_filename("  Flores 2024  "), "flores_2024");
    }

    #[test]
    fn locality_path_nests_under_sanitized_region() {
        let path = locality_workbook_path(Path::new("resultados"), "Córdoba", "Villa María");
        assert_eq!(
            path,
            Path::new("resultados/crdoba/empresas_villa_mara.xlsx")
        );
    }

    #[test]
    fn sheet_title_is_capped_at_31_chars() {
        let long = "Ciudad Autónoma de Buenos Aires y alrededores";
        assert_eq!(sheet_title(long).chars().count(), 31);
        assert_eq!(sheet_title("Flores"), "Flores");
    }

    #[tokio::test]
    async fn retry_succeeds_on_third_attempt() {
        let attempts = Cell::new(0u32);
        let result = persist_with_retry(Path::new("out.xlsx"), Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(AppError::Transport("disk hiccup".into()))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_three_failures() {
        let attempts = Cell::new(0u32);
        let result = persist_with_retry(Path::new("out.xlsx"), Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            Err(AppError::Transport("disk gone".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::Save { attempts: 3, .. })));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn saves_workbook_creating_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region").join("empresas_test.xlsx");
        let mut workbook = build_locality_workbook("Test", &[]).unwrap();
        save_workbook_with_retry(&mut workbook, &path, Duration::ZERO)
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn run_log_appends_lines() {
        let dir = tempdir().unwrap();
        let log = RunLog::create(dir.path()).unwrap();
        log.append("Provincia X completada en 1.5 minutos").unwrap();
        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(contents.starts_with("Inicio de escaneo completo:"));
        assert!(contents.contains("Provincia X completada"));
    }
}
