mod download;
mod form;
mod logging;

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use services::{AppServices, Clock, Settings, StoreSettings};

use crate::form::Form;

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;

    // Create the SQLite file up front. Keep this in the binary glue so services stay pure.
    if let StoreSettings::Sqlite { database_url } = &settings.store {
        prepare_sqlite_file(database_url)?;
    }

    let services = AppServices::from_settings(&settings, Clock::default_clock()).await?;
    tracing::info!(
        questions = services.questions().len(),
        sheet = services.response_store().sheet_title(),
        "survey ready"
    );

    let download_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut session = services.new_session();
    Form::new(BufReader::new(io::stdin()), io::stdout(), download_dir)
        .run(&mut session)
        .await?;
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let invalid = || io::Error::new(io::ErrorKind::InvalidInput, format!("invalid database_url: {db_url}"));
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        tracing::error!(error = %err, "survey stopped");
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_file_and_parent_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("survey.sqlite3");
        prepare_sqlite_file(&format!("sqlite://{}", db.display())).unwrap();
        assert!(db.exists());
    }

    #[test]
    fn in_memory_urls_are_left_alone() {
        prepare_sqlite_file("sqlite::memory:").unwrap();
        prepare_sqlite_file("sqlite:file:x?mode=memory&cache=shared").unwrap();
    }

    #[test]
    fn non_sqlite_url_is_rejected() {
        assert!(prepare_sqlite_file("postgres://localhost/db").is_err());
    }
}
