//! HTTP transport adapter: typed SCEP requests in, content-type-dispatched
//! typed responses out. One transport is created per client operation and
//! owns no state beyond the endpoint and the shared HTTP connection pool.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use der::Decode;
use reqwest::header::CONTENT_TYPE;
use url::Url;
use x509_cert::Certificate;

use crate::capabilities::Capabilities;
use crate::error::{Result, ScepError};
use crate::message::signed;

const CONTENT_TYPE_PKI_MESSAGE: &str = "application/x-pki-message";
const CONTENT_TYPE_CA_CERT: &str = "application/x-x509-ca-cert";
const CONTENT_TYPE_CA_RA_CERT: &str = "application/x-x509-ca-ra-cert";
const CONTENT_TYPE_NEXT_CA_CERT: &str = "application/x-x509-next-ca-cert";
const CONTENT_TYPE_TEXT: &str = "text/plain";

/// A typed SCEP request, one variant per wire operation.
#[derive(Debug)]
pub(crate) enum CaRequest<'a> {
    GetCaCaps { profile: Option<&'a str> },
    GetCaCert { profile: Option<&'a str> },
    GetNextCaCert { profile: Option<&'a str> },
    PkiOperation { body: Vec<u8>, use_post: bool },
}

impl CaRequest<'_> {
    fn operation(&self) -> &'static str {
        match self {
            CaRequest::GetCaCaps { .. } => "GetCACaps",
            CaRequest::GetCaCert { .. } => "GetCACert",
            CaRequest::GetNextCaCert { .. } => "GetNextCACert",
            CaRequest::PkiOperation { .. } => "PKIOperation",
        }
    }
}

/// A typed SCEP response, selected by the request kind.
pub(crate) enum CaResponse {
    Capabilities(Capabilities),
    /// The `GetCACert` chain: a bare CA certificate or a CA+RA bag.
    CertificateBag(Vec<Certificate>),
    /// Raw signed-data of a `GetNextCACert` reply; verification against the
    /// current CA happens above the transport.
    NextCaBag(Vec<u8>),
    /// Raw signed-data of a `PKIOperation` reply.
    PkiMessage(Vec<u8>),
}

pub(crate) struct Transport {
    http: reqwest::Client,
    endpoint: Url,
}

impl Transport {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// Run one request/response exchange. No retries: transport failures
    /// surface to the caller as-is.
    pub async fn roundtrip(&self, request: CaRequest<'_>) -> Result<CaResponse> {
        let operation = request.operation();
        let (content_type, body) = match &request {
            CaRequest::GetCaCaps { profile }
            | CaRequest::GetCaCert { profile }
            | CaRequest::GetNextCaCert { profile } => self.get(operation, *profile).await?,
            CaRequest::PkiOperation { body, use_post } => {
                if *use_post {
                    self.post(operation, body.clone()).await?
                } else {
                    self.get(operation, Some(&URL_SAFE.encode(body))).await?
                }
            }
        };
        tracing::debug!(
            operation,
            content_type = %content_type,
            body_len = body.len(),
            "SCEP exchange complete"
        );
        decode(&request, &content_type, &body)
    }

    pub async fn get_ca_caps(&self, profile: Option<&str>) -> Result<Capabilities> {
        match self.roundtrip(CaRequest::GetCaCaps { profile }).await? {
            CaResponse::Capabilities(capabilities) => Ok(capabilities),
            _ => Err(ScepError::Cms("transport returned a mismatched response kind")),
        }
    }

    pub async fn get_ca_cert(&self, profile: Option<&str>) -> Result<Vec<Certificate>> {
        match self.roundtrip(CaRequest::GetCaCert { profile }).await? {
            CaResponse::CertificateBag(chain) => Ok(chain),
            _ => Err(ScepError::Cms("transport returned a mismatched response kind")),
        }
    }

    pub async fn get_next_ca_cert(&self, profile: Option<&str>) -> Result<Vec<u8>> {
        match self.roundtrip(CaRequest::GetNextCaCert { profile }).await? {
            CaResponse::NextCaBag(raw) => Ok(raw),
            _ => Err(ScepError::Cms("transport returned a mismatched response kind")),
        }
    }

    async fn get(&self, operation: &str, message: Option<&str>) -> Result<(String, Vec<u8>)> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("operation", operation);
            if let Some(message) = message {
                query.append_pair("message", message);
            }
        }
        tracing::debug!(%url, "GET to CA");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Self::content_typed_body(response).await
    }

    async fn post(&self, operation: &str, body: Vec<u8>) -> Result<(String, Vec<u8>)> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("operation", operation);
        tracing::debug!(%url, body_len = body.len(), "POST to CA");
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_PKI_MESSAGE)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Self::content_typed_body(response).await
    }

    async fn content_typed_body(response: reqwest::Response) -> Result<(String, Vec<u8>)> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let body = response.bytes().await?.to_vec();
        Ok((content_type, body))
    }
}

/// Total decode function over (request kind, content type, body).
fn decode(request: &CaRequest<'_>, content_type: &str, body: &[u8]) -> Result<CaResponse> {
    let unexpected = || ScepError::UnexpectedContentType {
        operation: request.operation(),
        content_type: content_type.to_owned(),
    };

    match request {
        CaRequest::GetCaCaps { .. } => {
            if content_type != CONTENT_TYPE_TEXT {
                return Err(unexpected());
            }
            let body = std::str::from_utf8(body)
                .map_err(|_| ScepError::Cms("capability list is not valid UTF-8"))?;
            Ok(CaResponse::Capabilities(Capabilities::parse(body)))
        }
        CaRequest::GetCaCert { .. } => match content_type {
            CONTENT_TYPE_CA_CERT => Ok(CaResponse::CertificateBag(vec![Certificate::from_der(
                body,
            )?])),
            CONTENT_TYPE_CA_RA_CERT => {
                let (certificates, _) = signed::parse_degenerate_bag(body)?;
                Ok(CaResponse::CertificateBag(certificates))
            }
            _ => Err(unexpected()),
        },
        CaRequest::GetNextCaCert { .. } => {
            if content_type != CONTENT_TYPE_NEXT_CA_CERT {
                return Err(unexpected());
            }
            Ok(CaResponse::NextCaBag(body.to_vec()))
        }
        CaRequest::PkiOperation { .. } => {
            if content_type != CONTENT_TYPE_PKI_MESSAGE {
                return Err(unexpected());
            }
            Ok(CaResponse::PkiMessage(body.to_vec()))
        }
    }
}
