use crate::RemoteError;
use std::io::Read;

/// Thin wrapper over a shared `ureq::Agent`.
///
/// Maps HTTP 404 to `RemoteError::NotFound`, other error statuses to
/// `RemoteError::Status`, and transport failures to `RemoteError::Network`.
/// No retries here — callers own that policy.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        tracing::debug!("GET {url}");
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Status {
                    code,
                    url: url.to_owned(),
                });
            }
            Err(e) => {
                return Err(RemoteError::Network {
                    url: url.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).map_err(|e| RemoteError::Network {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(body)
    }

    pub fn get_text(&self, url: &str) -> Result<String, RemoteError> {
        let body = self.get_bytes(url)?;
        String::from_utf8(body).map_err(|e| RemoteError::Payload {
            url: url.to_owned(),
            reason: format!("not valid UTF-8: {e}"),
        })
    }
}
