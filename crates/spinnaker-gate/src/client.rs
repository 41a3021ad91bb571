use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use snafu::{OptionExt as _, ResultExt as _, ensure};
use tracing::instrument;
use url::Url;

use crate::{error::*, task::TaskPollPolicy};

/// The endpoint used when no Gate endpoint is configured.
pub const DEFAULT_GATE_ENDPOINT: &str = "http://localhost:8085";

/// The `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("spinnaker-provider/", env!("CARGO_PKG_VERSION"));

/// Connection settings for a [`GateClient`].
#[derive(Clone, Debug, Default)]
pub struct GateConfig {
    /// Base URL of Gate. Falls back to [`DEFAULT_GATE_ENDPOINT`] when empty.
    pub endpoint: String,

    /// Headers sent with every request, in `key=value,key2=value2` form.
    pub default_headers: String,

    /// PEM encoded client certificate.
    pub x509_cert: Option<String>,

    /// PEM encoded private key belonging to [`Self::x509_cert`].
    pub x509_key: Option<String>,

    /// Skip verification of the certificate presented by Gate.
    pub ignore_cert_errors: bool,

    pub task_poll: TaskPollPolicy,
}

impl GateConfig {
    pub fn endpoint(&self) -> &str {
        if self.endpoint.is_empty() {
            DEFAULT_GATE_ENDPOINT
        } else {
            &self.endpoint
        }
    }

    /// Builds the client without touching the network.
    pub fn build(&self) -> Result<GateClient> {
        let endpoint = Url::parse(self.endpoint()).context(ParseEndpointSnafu {
            endpoint: self.endpoint(),
        })?;
        ensure!(
            !endpoint.cannot_be_a_base(),
            InvalidEndpointSnafu { endpoint }
        );

        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(self.ignore_cert_errors)
            .default_headers(parse_default_headers(&self.default_headers)?)
            .user_agent(USER_AGENT);

        match (
            non_empty(self.x509_cert.as_deref()),
            non_empty(self.x509_key.as_deref()),
        ) {
            (Some(cert), Some(key)) => {
                let identity = reqwest::Identity::from_pem(format!("{cert}\n{key}").as_bytes())
                    .context(LoadIdentitySnafu)?;
                builder = builder
                    .identity(identity)
                    .min_tls_version(reqwest::tls::Version::TLS_1_2);
            }
            (None, None) => {}
            _ => return IncompleteX509ConfigSnafu.fail(),
        }

        Ok(GateClient {
            http: builder.build().context(BuildHttpClientSnafu)?,
            endpoint,
            task_poll: self.task_poll,
        })
    }

    /// Builds the client and verifies that Gate answers on its version endpoint.
    #[instrument(skip(self), fields(endpoint = self.endpoint()))]
    pub async fn connect(&self) -> Result<GateClient> {
        let client = self.build()?;
        let version = client.version().await.context(UnreachableSnafu {
            endpoint: client.endpoint.clone(),
        })?;
        tracing::info!(%version, "connected to Gate");
        Ok(client)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Parses `key=value` pairs separated by commas into a [`HeaderMap`].
///
/// Keys and values are trimmed, values may contain `=`.
pub fn parse_default_headers(input: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if input.trim().is_empty() {
        return Ok(headers);
    }

    for element in input.split(',') {
        let (name, value) = element
            .split_once('=')
            .context(MalformedDefaultHeaderSnafu { element })?;
        let (name, value) = (name.trim(), value.trim());

        let header_name =
            HeaderName::from_bytes(name.as_bytes()).context(InvalidHeaderNameSnafu { name })?;
        let header_value = HeaderValue::from_str(value).context(InvalidHeaderValueSnafu { name })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// This `GateClient` can be used to access the Spinnaker Gate API.
///
/// It wraps a [`reqwest::Client`] carrying the TLS identity, cookie jar and default headers and
/// is cheap to clone.
#[derive(Clone, Debug)]
pub struct GateClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoint: Url,
    pub(crate) task_poll: TaskPollPolicy,
}

impl GateClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn task_poll_policy(&self) -> TaskPollPolicy {
        self.task_poll
    }

    /// Returns the version reported by Gate.
    pub async fn version(&self) -> Result<String> {
        const OPERATION: &str = "get version";

        let response = self.send(OPERATION, self.http.get(self.url(&["version"])?)).await?;
        ensure_status(OPERATION, &response, &[StatusCode::OK])?;
        let version: serde_json::Value = decode(OPERATION, response).await?;

        Ok(version
            .get("version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_owned())
    }

    /// Joins `segments` onto the endpoint, percent-encoding each of them.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                InvalidEndpointSnafu {
                    endpoint: self.endpoint.clone(),
                }
                .build()
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request.send().await.context(SendRequestSnafu { operation })?;
        tracing::debug!(operation, status = %response.status(), "received response from Gate");
        Ok(response)
    }
}

/// Fails with [`Error::UnexpectedStatus`] unless the response status is one of `expected`.
pub(crate) fn ensure_status(
    operation: &'static str,
    response: &reqwest::Response,
    expected: &[StatusCode],
) -> Result<()> {
    let status = response.status();
    ensure!(
        expected.contains(&status),
        UnexpectedStatusSnafu {
            operation,
            status: status.as_u16(),
        }
    );
    Ok(())
}

pub(crate) async fn decode<T>(operation: &'static str, response: reqwest::Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let body = response.bytes().await.context(ReadResponseSnafu { operation })?;
    serde_json::from_slice(&body).context(DecodeResponseSnafu { operation })
}

/// Decodes a JSON object body, treating an empty or `null` body as a missing object.
pub(crate) async fn decode_object(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
    let body = response.bytes().await.context(ReadResponseSnafu { operation })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&body).context(DecodeResponseSnafu { operation })
}
