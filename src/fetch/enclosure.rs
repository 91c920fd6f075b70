use std::path::{Path, PathBuf};
use thiserror::Error;

use super::proxy::ProxyConfig;
use super::resource::Fetch;

#[derive(Debug, Error)]
pub enum EnclosureError {
    #[error("Invalid enclosure URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Enclosure URL has no file name: {0}")]
    MissingFileName(String),
    #[error("Download directory does not exist: {0}")]
    DirectoryMissing(PathBuf),
    #[error("Enclosure download returned no data")]
    Empty,
    #[error("Failed to write enclosure: {0}")]
    Io(#[from] std::io::Error),
}

/// A media enclosure saved to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosureDownload {
    pub file_name: String,
    pub path: PathBuf,
    pub size: usize,
}

/// Derive the on-disk name from the last path segment of the URL.
pub fn enclosure_file_name(url: &str) -> Result<String, EnclosureError> {
    let parsed = url::Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| EnclosureError::MissingFileName(url.to_string()))
}

/// Download a feed item's enclosure (a podcast episode, for instance) into
/// `directory`.
///
/// The directory must already exist. Fetch failures arrive as an empty body
/// from the fetcher and are reported as [`EnclosureError::Empty`] without
/// touching the filesystem.
pub async fn download_enclosure<F: Fetch + ?Sized>(
    fetcher: &F,
    proxy: &ProxyConfig,
    url: &str,
    directory: &Path,
) -> Result<EnclosureDownload, EnclosureError> {
    let file_name = enclosure_file_name(url)?;

    if !tokio::fs::try_exists(directory).await.unwrap_or(false) {
        return Err(EnclosureError::DirectoryMissing(directory.to_path_buf()));
    }

    let data = fetcher.fetch(url, proxy).await;
    if data.is_empty() {
        return Err(EnclosureError::Empty);
    }

    let path = directory.join(&file_name);
    tokio::fs::write(&path, &data).await?;
    tracing::info!(url = %url, path = %path.display(), bytes = data.len(), "Enclosure downloaded");

    Ok(EnclosureDownload {
        file_name,
        path,
        size: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticFetcher(Vec<u8>);

    #[async_trait]
    impl Fetch for StaticFetcher {
        async fn fetch(&self, _url: &str, _proxy: &ProxyConfig) -> Vec<u8> {
            self.0.clone()
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            enclosure_file_name("https://cdn.example.com/shows/ep42.mp3?token=abc").unwrap(),
            "ep42.mp3"
        );
        assert!(matches!(
            enclosure_file_name("https://cdn.example.com/"),
            Err(EnclosureError::MissingFileName(_))
        ));
        assert!(enclosure_file_name("not a url").is_err());
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = temp_dir("feedsync_enclosure_test_write");
        let fetcher = StaticFetcher(b"ID3 audio".to_vec());

        let download = download_enclosure(
            &fetcher,
            &ProxyConfig::none(),
            "https://cdn.example.com/ep1.mp3",
            &dir,
        )
        .await
        .unwrap();

        assert_eq!(download.file_name, "ep1.mp3");
        assert_eq!(download.size, 9);
        assert_eq!(std::fs::read(&download.path).unwrap(), b"ID3 audio");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_directory_rejected() {
        let dir = std::env::temp_dir().join("feedsync_enclosure_test_missing_dir");
        std::fs::remove_dir_all(&dir).ok();
        let fetcher = StaticFetcher(b"data".to_vec());

        let result = download_enclosure(
            &fetcher,
            &ProxyConfig::none(),
            "https://cdn.example.com/ep1.mp3",
            &dir,
        )
        .await;
        assert!(matches!(result, Err(EnclosureError::DirectoryMissing(_))));
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let dir = temp_dir("feedsync_enclosure_test_empty");
        let fetcher = StaticFetcher(Vec::new());

        let result = download_enclosure(
            &fetcher,
            &ProxyConfig::none(),
            "https://cdn.example.com/ep2.mp3",
            &dir,
        )
        .await;
        assert!(matches!(result, Err(EnclosureError::Empty)));
        assert!(!dir.join("ep2.mp3").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
