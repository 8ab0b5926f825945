use crate::types::{ModisError, ModisResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

/// Fetches named files from a remote directory into a local cache
pub struct Downloader {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl Downloader {
    pub fn new<P: AsRef<Path>>(base_url: &str, cache_dir: P) -> ModisResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(concat!("modgrid/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
            client,
        })
    }

    /// `$XDG_CACHE_HOME/modgrid` or the platform equivalent, else `./data`
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join("modgrid"))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url, filename)
    }

    /// Make sure `filename` exists locally and return its path
    pub fn download(&self, filename: &str) -> ModisResult<PathBuf> {
        let output_path = self.local_path(filename);
        if output_path.exists() {
            log::info!("{} already exists, skipping download", output_path.display());
            return Ok(output_path);
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        let url = self.url_for(filename);
        log::info!("Downloading {}", url);

        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            log::debug!("Download attempt {} of {}", attempt, MAX_RETRIES);
            match self.try_download_once(&url, &output_path) {
                Ok(size) => {
                    log::info!("Downloaded {} bytes to {}", size, output_path.display());
                    return Ok(output_path);
                }
                Err(e) => {
                    log::warn!("Download attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ModisError::Download(format!("{} failed after {} attempts", url, MAX_RETRIES))
        }))
    }

    fn try_download_once(&self, url: &str, output_path: &Path) -> ModisResult<u64> {
        let mut response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModisError::Download(format!(
                "HTTP {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                url
            )));
        }

        // stream into a temp file next to the target so a partial download never
        // shows up under the final name
        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        let size = response.copy_to(&mut tmp)?;
        if size == 0 {
            return Err(ModisError::Download(format!("Empty response body from {}", url)));
        }
        tmp.flush()?;
        tmp.persist(output_path).map_err(|e| ModisError::Io(e.error))?;
        Ok(size)
    }
}
