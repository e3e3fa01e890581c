use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Certificate;

use crate::config::Config;
use crate::error::{Result, SetupError};

const MAX_REDIRECTS: usize = 10;

/// Downloads one URL into one file.
pub trait Fetcher {
    /// Returns the number of bytes written to `destination`.
    fn fetch(&self, url: &str, destination: &Path, trust_anchor: &Path) -> Result<u64>;
}

pub struct HttpFetcher {
    user_agent: String,
    connect_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>, connect_timeout: Duration) -> Self {
        HttpFetcher {
            user_agent: user_agent.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.user_agent.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    /// HTTPS requests trust only the certificates in `trust_anchor`.
    /// Plain HTTP does not need the anchor, but a readable one is still
    /// installed so a redirect to HTTPS validates the same way.
    fn client(&self, url: &str, trust_anchor: &Path) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .connect_timeout(self.connect_timeout);

        let needs_anchor = url.starts_with("https://");
        match fs::read(trust_anchor) {
            Ok(pem) => {
                let certs = Certificate::from_pem_bundle(&pem).map_err(|e| {
                    SetupError::transport_init(format!(
                        "bad trust anchor {}: {}",
                        trust_anchor.display(),
                        e
                    ))
                })?;
                if certs.is_empty() {
                    return Err(SetupError::transport_init(format!(
                        "trust anchor {} holds no certificates",
                        trust_anchor.display()
                    )));
                }
                builder = builder.tls_built_in_root_certs(false);
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
            Err(e) if needs_anchor => {
                return Err(SetupError::transport_init(format!(
                    "cannot read trust anchor {}: {}",
                    trust_anchor.display(),
                    e
                )));
            }
            Err(_) => {}
        }

        builder
            .build()
            .map_err(|e| SetupError::transport_init(e.to_string()))
    }

    fn stream_into(client: &Client, url: &str, file: File) -> Result<u64> {
        let mut response = client
            .get(url)
            .send()
            .map_err(|e| SetupError::transfer(url, e))?;

        if !response.status().is_success() {
            return Err(SetupError::transfer(
                url,
                format!("server returned {}", response.status()),
            ));
        }

        let mut writer = BufWriter::new(file);
        let written = response
            .copy_to(&mut writer)
            .map_err(|e| SetupError::transfer(url, e))?;
        writer
            .flush()
            .map_err(|e| SetupError::transfer(url, e))?;
        Ok(written)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path, trust_anchor: &Path) -> Result<u64> {
        let client = self.client(url, trust_anchor)?;

        let file = File::create(destination).map_err(|source| SetupError::DestinationOpen {
            path: destination.to_path_buf(),
            source,
        })?;

        tracing::debug!("GET {} -> {}", url, destination.display());
        match Self::stream_into(&client, url, file) {
            Ok(written) => {
                tracing::info!("Fetched {} ({} bytes)", destination.display(), written);
                Ok(written)
            }
            Err(e) => {
                // never leave a truncated package behind
                if let Err(rm) = fs::remove_file(destination) {
                    tracing::warn!("Could not remove partial {}: {}", destination.display(), rm);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned response per connection on a loopback port.
    /// `responses` gets the server's base URL so it can build redirects.
    fn serve(responses: impl FnOnce(&str) -> Vec<String>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let responses = responses(&base);
        let handle = thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                // read the request head
                loop {
                    line.clear();
                    if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                        break;
                    }
                }
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (base, handle)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new("homebrew-setup-tests", Duration::from_secs(5))
    }

    #[test]
    fn streams_body_into_destination() {
        let (base, server) = serve(|_| vec![ok_response("package bytes")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("appstore.zip");

        let written = fetcher()
            .fetch(&format!("{}/appstore.zip", base), &dest, &dir.path().join("none.pem"))
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "package bytes");
        server.join().unwrap();
    }

    #[test]
    fn follows_redirects() {
        let (base, server) = serve(|base| {
            vec![
                format!(
                    "HTTP/1.1 302 Found\r\nLocation: {}/real.zip\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    base
                ),
                ok_response("moved"),
            ]
        });
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("01_sigpatches.rpx");

        fetcher()
            .fetch(&format!("{}/latest", base), &dest, &dir.path().join("none.pem"))
            .unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "moved");
        server.join().unwrap();
    }

    #[test]
    fn error_status_fails_and_removes_file() {
        let (base, server) = serve(|_| vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found".to_string(),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.zip");

        let err = fetcher()
            .fetch(&format!("{}/missing.zip", base), &dest, &dir.path().join("none.pem"))
            .unwrap_err();

        assert!(matches!(err, SetupError::Transfer { .. }));
        assert!(err.to_string().contains("404"));
        assert!(!dest.exists());
        server.join().unwrap();
    }

    #[test]
    fn unreachable_host_fails_without_leftovers() {
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tiramisu.zip");

        let err = fetcher()
            .fetch(&format!("http://127.0.0.1:{}/tiramisu.zip", port), &dest, &dir.path().join("none.pem"))
            .unwrap_err();

        assert!(matches!(err, SetupError::Transfer { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn missing_parent_directory_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("wiiu/apps/compat-installer.rpx");

        let err = fetcher()
            .fetch("http://127.0.0.1:9/compat.rpx", &dest, &dir.path().join("none.pem"))
            .unwrap_err();

        assert!(matches!(err, SetupError::DestinationOpen { .. }));
        assert!(!dir.path().join("wiiu").exists());
    }

    #[test]
    fn https_requires_a_trust_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("base.zip");

        let err = fetcher()
            .fetch("https://127.0.0.1:9/base.zip", &dest, &dir.path().join("foryour-cafe.pem"))
            .unwrap_err();
        assert!(matches!(err, SetupError::TransportInit(_)));

        fs::write(dir.path().join("empty.pem"), "").unwrap();
        let err = fetcher()
            .fetch("https://127.0.0.1:9/base.zip", &dest, &dir.path().join("empty.pem"))
            .unwrap_err();
        assert!(matches!(err, SetupError::TransportInit(_)));

        // transport failures happen before the destination is touched
        assert!(!dest.exists());
    }
}
