use estatex_core::{Error, ListingDocument, Result};
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Something listings can be fetched from.
///
/// Fetching is the only read of the upstream store; callers decide what an
/// error means (the recommendation engine degrades to empty, training aborts).
pub trait ListingSource {
    fn fetch_listings(&self) -> impl Future<Output = Result<Vec<ListingDocument>>> + Send;
}

/// Accepted payload shapes: a bare array or `{"listings": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ListingPayload {
    Bare(Vec<ListingDocument>),
    Wrapped { listings: Vec<ListingDocument> },
}

/// Parse a JSON export of listing documents
pub fn parse_documents(bytes: &[u8]) -> Result<Vec<ListingDocument>> {
    let payload: ListingPayload =
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(match payload {
        ListingPayload::Bare(docs) => docs,
        ListingPayload::Wrapped { listings } => listings,
    })
}

/// JSON export on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListingSource for FileSource {
    async fn fetch_listings(&self) -> Result<Vec<ListingDocument>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Source(format!("{}: {}", self.path.display(), e)))?;
        let docs = parse_documents(&bytes)?;
        debug!("Read {} listing documents from {:?}", docs.len(), self.path);
        Ok(docs)
    }
}

/// HTTP endpoint serving the same JSON shapes
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ListingSource for HttpSource {
    async fn fetch_listings(&self) -> Result<Vec<ListingDocument>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Source(format!("Failed to reach {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Source(format!(
                "{} answered with status {}",
                self.url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Source(format!("Failed to read body from {}: {}", self.url, e)))?;
        let docs = parse_documents(&bytes)?;
        debug!("Fetched {} listing documents from {}", docs.len(), self.url);
        Ok(docs)
    }
}

/// Fixed set of documents held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<ListingDocument>,
}

impl MemorySource {
    pub fn new(documents: Vec<ListingDocument>) -> Self {
        Self { documents }
    }
}

impl ListingSource for MemorySource {
    async fn fetch_listings(&self) -> Result<Vec<ListingDocument>> {
        Ok(self.documents.clone())
    }
}

/// Source selected from configuration
#[derive(Debug, Clone)]
pub enum DataSource {
    File(FileSource),
    Http(HttpSource),
}

impl DataSource {
    /// `http://` and `https://` URLs fetch over HTTP, anything else is a file path
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidConfig("database url is empty".to_string()));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(DataSource::Http(HttpSource::new(url)))
        } else {
            Ok(DataSource::File(FileSource::new(url.strip_prefix("file://").unwrap_or(url))))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::File(f) => format!("file {}", f.path().display()),
            DataSource::Http(h) => format!("url {}", h.url()),
        }
    }
}

impl ListingSource for DataSource {
    async fn fetch_listings(&self) -> Result<Vec<ListingDocument>> {
        match self {
            DataSource::File(f) => f.fetch_listings().await,
            DataSource::Http(h) => h.fetch_listings().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"[
        {"_id": {"$oid": "a1"}, "price": 100000, "bedroom": 2, "bathroom": 1, "latitude": 1.0, "longitude": 2.0},
        {"_id": "b2", "price": 200000, "bedroom": 3, "bathroom": 2, "latitude": 1.5, "longitude": 2.5, "city": "x"}
    ]"#;

    #[test]
    fn test_parse_documents_shapes() {
        let bare = parse_documents(EXPORT.as_bytes()).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0].id.as_deref(), Some("a1"));

        let wrapped = format!(r#"{{"listings": {}}}"#, EXPORT);
        assert_eq!(parse_documents(wrapped.as_bytes()).unwrap().len(), 2);

        assert!(matches!(parse_documents(b"{\"nope\": 1}"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_data_source_from_url() {
        assert!(matches!(DataSource::from_url("https://example.com/posts"), Ok(DataSource::Http(_))));
        match DataSource::from_url("file:///tmp/posts.json").unwrap() {
            DataSource::File(f) => assert_eq!(f.path(), Path::new("/tmp/posts.json")),
            other => panic!("unexpected source {:?}", other),
        }
        assert!(DataSource::from_url("  ").is_err());
    }

    #[tokio::test]
    async fn test_file_source_reads_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, EXPORT).unwrap();

        let source = DataSource::from_url(path.to_str().unwrap()).unwrap();
        let docs = source.fetch_listings().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].to_listing().unwrap().bedroom, 3.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let source = FileSource::new("/definitely/not/here.json");
        assert!(matches!(source.fetch_listings().await, Err(Error::Source(_))));
    }
}
