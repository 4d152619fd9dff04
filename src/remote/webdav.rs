use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use super::{RemoteEntry, RemoteStorage};
use crate::error::{SyncError, SyncResult};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One `<response>` of a PROPFIND multistatus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropfindEntry {
    /// Percent-decoded href as sent by the server.
    pub href: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
    pub is_collection: bool,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Href,
    Length,
    Modified,
}

/// Parses a `207 Multi-Status` body. Namespace prefixes are ignored.
pub fn parse_multistatus(xml: &str) -> SyncResult<Vec<PropfindEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<PropfindEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(PropfindEntry::default()),
                b"href" => field = Some(Field::Href),
                b"getcontentlength" => field = Some(Field::Length),
                b"getlastmodified" => field = Some(Field::Modified),
                b"collection" => {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    let value = text
                        .unescape()
                        .map_err(|e| malformed_listing(e.to_string()))?
                        .into_owned();
                    match field {
                        Field::Href => entry.href = percent_decode(&value),
                        Field::Length => entry.size = value.parse().ok(),
                        Field::Modified => entry.modified = Some(value),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"href" | b"getcontentlength" | b"getlastmodified" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed_listing(e.to_string())),
            _ => {}
        }
    }

    Ok(entries)
}

fn malformed_listing(message: String) -> SyncError {
    SyncError::Remote {
        status: 207,
        message: format!("unreadable multistatus response: {message}"),
    }
}

/// Decodes `%XX` escapes. Invalid escapes are kept verbatim.
fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Last path segment of an href, ignoring a trailing slash.
fn href_name(href: &str) -> &str {
    href.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// WebDAV client with HTTP Basic authentication.
pub struct WebDavClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl WebDavClient {
    /// `base_url` is the endpoint all paths are relative to.
    pub fn new(base_url: &str, username: &str, password: &str) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn propfind(&self, path: &str, depth: &str) -> SyncResult<RequestBuilder> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| SyncError::Config(format!("invalid method: {e}")))?;
        Ok(self
            .request(method, path)
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> SyncResult<Response> {
        builder.send().await.map_err(|e| map_transport_error(e, what))
    }
}

fn map_transport_error(err: reqwest::Error, what: &str) -> SyncError {
    if err.is_connect() || err.is_timeout() {
        SyncError::Offline(format!("{what}: {err}"))
    } else {
        SyncError::Remote {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: format!("{what}: {err}"),
        }
    }
}

fn status_error(status: StatusCode, what: &str) -> SyncError {
    SyncError::from_status(
        status.as_u16(),
        format!("{what}: {}", status.canonical_reason().unwrap_or("unexpected status")),
    )
}

#[async_trait]
impl RemoteStorage for WebDavClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn is_online(&self) -> bool {
        let Ok(builder) = self.propfind("", "0") else {
            return false;
        };
        match builder.timeout(PROBE_TIMEOUT).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("WebDAV endpoint unreachable: {}", e);
                false
            }
        }
    }

    async fn exists(&self, path: &str) -> SyncResult<bool> {
        let what = format!("PROPFIND {path}");
        let response = self.send(self.propfind(path, "0")?, &what).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(status_error(status, &what)),
        }
    }

    async fn list(&self, dir: &str) -> SyncResult<Vec<RemoteEntry>> {
        let what = format!("PROPFIND {dir}");
        let response = self.send(self.propfind(dir, "1")?, &what).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(status_error(status, &what));
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, &what))?;
        let own_name = href_name(dir.trim_matches('/'));

        let mut entries = Vec::new();
        for (position, entry) in parse_multistatus(&body)?.into_iter().enumerate() {
            let name = href_name(&entry.href).to_string();
            // The collection itself is listed first.
            if position == 0 && entry.is_collection && (name == own_name || own_name.is_empty()) {
                continue;
            }
            if name.is_empty() {
                continue;
            }
            entries.push(RemoteEntry {
                name,
                size: entry.size,
                modified: entry.modified,
                is_collection: entry.is_collection,
            });
        }

        log::debug!("Listed {} entries in {}", entries.len(), dir);
        Ok(entries)
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> SyncResult<()> {
        let what = format!("PUT {path}");
        let content_type = if path.ends_with(".gz") {
            "application/gzip"
        } else {
            "application/json"
        };
        let builder = self
            .request(Method::PUT, path)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        let response = self.send(builder, &what).await?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &what));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> SyncResult<Vec<u8>> {
        let what = format!("GET {path}");
        let builder = self
            .request(Method::GET, path)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        let response = self.send(builder, &what).await?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &what));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(e, &what))?;
        Ok(bytes.to_vec())
    }

    async fn mkcol(&self, path: &str) -> SyncResult<()> {
        let what = format!("MKCOL {path}");
        let method = Method::from_bytes(b"MKCOL")
            .map_err(|e| SyncError::Config(format!("invalid method: {e}")))?;
        let response = self.send(self.request(method, path), &what).await?;
        match response.status() {
            // Already exists.
            StatusCode::METHOD_NOT_ALLOWED => Ok(()),
            status if status.is_success() => {
                log::info!("Created remote collection {}", path);
                Ok(())
            }
            status => Err(status_error(status, &what)),
        }
    }

    async fn delete(&self, path: &str) -> SyncResult<()> {
        let what = format!("DELETE {path}");
        let response = self.send(self.request(Method::DELETE, path), &what).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                log::debug!("{} was already gone", path);
                Ok(())
            }
            status if status.is_success() => Ok(()),
            status => Err(status_error(status, &what)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXTCLOUD_LISTING: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns">
  <d:response>
    <d:href>/remote.php/dav/files/alice/bookmarks/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
        <d:getlastmodified>Mon, 02 Jun 2025 10:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/files/alice/bookmarks/bookmarks_20250602_100000_laptop_12_v1.json.gz</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>2048</d:getcontentlength>
        <d:getlastmodified>Mon, 02 Jun 2025 10:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/files/alice/bookmarks/my%20notes.txt</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>5</d:getcontentlength>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parses_multistatus() {
        let entries = parse_multistatus(NEXTCLOUD_LISTING).unwrap();
        assert_eq!(entries.len(), 3);

        assert!(entries[0].is_collection);
        assert_eq!(entries[0].size, None);

        assert!(!entries[1].is_collection);
        assert_eq!(entries[1].size, Some(2048));
        assert_eq!(
            href_name(&entries[1].href),
            "bookmarks_20250602_100000_laptop_12_v1.json.gz"
        );
        assert_eq!(
            entries[1].modified.as_deref(),
            Some("Mon, 02 Jun 2025 10:00:00 GMT")
        );

        assert_eq!(href_name(&entries[2].href), "my notes.txt");
    }

    #[test]
    fn test_parses_unprefixed_namespace() {
        let xml = r#"<multistatus xmlns="DAV:"><response><href>/dav/a.json</href>
            <propstat><prop><resourcetype></resourcetype><getcontentlength>3</getcontentlength></prop></propstat>
            </response></multistatus>"#;
        let entries = parse_multistatus(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].href, "/dav/a.json");
        assert_eq!(entries[0].size, Some(3));
    }

    #[test]
    fn test_rejects_broken_xml() {
        assert!(parse_multistatus("<d:multistatus><d:response></d:multistatus>").is_err());
    }

    #[test]
    fn test_decodes_percent_escapes() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn test_builds_urls() {
        let client = WebDavClient::new("https://dav.example/files/", "u", "p").unwrap();
        assert_eq!(client.endpoint(), "https://dav.example/files");
        assert_eq!(client.url("bookmarks/a.json"), "https://dav.example/files/bookmarks/a.json");
        assert_eq!(client.url(""), "https://dav.example/files/");
    }
}
