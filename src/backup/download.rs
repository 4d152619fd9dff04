use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStorage;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

type InFlight = Shared<BoxFuture<'static, SyncResult<Arc<Vec<u8>>>>>;

/// Downloads backups, sharing one request between concurrent callers of the
/// same path.
pub struct DownloadQueue {
    remote: Arc<dyn RemoteStorage>,
    timeout: Duration,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl DownloadQueue {
    pub fn new(remote: Arc<dyn RemoteStorage>, timeout: Duration) -> Self {
        Self {
            remote,
            timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches `path`, inflating it when the name ends in `.gz`.
    pub async fn download(&self, path: &str) -> SyncResult<Arc<Vec<u8>>> {
        let request = self.request_for(path);
        let result = request.clone().await;

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(path).is_some_and(|current| current.ptr_eq(&request)) {
            in_flight.remove(path);
        }
        result
    }

    fn request_for(&self, path: &str) -> InFlight {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(path) {
            log::debug!("Joining in-flight download of {}", path);
            return existing.clone();
        }

        let request = fetch(self.remote.clone(), path.to_string(), self.timeout)
            .boxed()
            .shared();
        in_flight.insert(path.to_string(), request.clone());
        request
    }

    /// Number of downloads currently running.
    pub fn pending(&self) -> usize {
        self.in_flight.lock().len()
    }
}

async fn fetch(remote: Arc<dyn RemoteStorage>, path: String, timeout: Duration) -> SyncResult<Arc<Vec<u8>>> {
    log::debug!("Downloading {}", path);
    let body = tokio::time::timeout(timeout, remote.get(&path))
        .await
        .map_err(|_| SyncError::DownloadTimeout(timeout.as_secs()))??;

    let body = if path.ends_with(".gz") { gunzip(&body)? } else { body };
    Ok(Arc::new(body))
}

pub fn gzip(data: &[u8]) -> SyncResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(data: &[u8]) -> SyncResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| SyncError::DecompressionFailure(e.to_string()))?;
    Ok(out)
}
