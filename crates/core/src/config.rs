use crate::error::Result;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    /// Overrides the persisted submission endpoint when set.
    pub endpoint_override: Option<String>,
    /// Directory where codec output files are written.
    pub work_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let endpoint_override = env::var("DOCSHOT_ENDPOINT")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let work_dir = env::var("DOCSHOT_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("docshot"));

        Ok(Self {
            endpoint_override,
            work_dir,
        })
    }
}
