use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};

use super::{GatewayError, LoadResponse, PersistedRecord, PersistenceGateway};
use crate::point::{Point, PointSequence};

/// Talks to a drawing server (see `server::DrawingServer`).
pub struct HttpGateway {
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            bail!("not a valid server url: {}", base_url);
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // NOTE: the blocking client owns a runtime and must not be dropped inside an
    // async context, so every call builds its own on the calling thread.
    fn client() -> anyhow::Result<Client> {
        // no timeout, in-flight requests are left to finish or fail on their own
        Ok(Client::builder().timeout(None).build()?)
    }

    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("not a valid server url: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl PersistenceGateway for HttpGateway {
    fn save(&self, user_id: &str, markers: &[Point]) -> Result<(), GatewayError> {
        let record = PersistedRecord {
            user_id: user_id.to_string(),
            markers: markers.to_vec(),
        };
        let response = Self::client()?
            .post(self.endpoint(&["saveDrawing"])?)
            .json(&record)
            .send()
            .map_err(anyhow::Error::from)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("saving drawing failed, server responded with {}", status).into())
        }
    }

    fn load(&self, user_id: &str) -> Result<PointSequence, GatewayError> {
        let response = Self::client()?
            .get(self.endpoint(&["loadDrawing", user_id])?)
            .send()
            .map_err(anyhow::Error::from)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(user_id.to_string())),
            status if status.is_success() => {
                let body = response.text().map_err(anyhow::Error::from)?;
                serde_json::from_str::<LoadResponse>(&body)
                    .map(|response| response.markers)
                    .map_err(|e| GatewayError::Malformed {
                        user_id: user_id.to_string(),
                        reason: e.to_string(),
                    })
            }
            status => Err(anyhow!("loading drawing failed, server responded with {}", status).into()),
        }
    }
}
