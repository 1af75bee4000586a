//! SigV4 signing for the IAM-authorized AgentCore endpoints (identity and gateway).

use std::time::SystemTime;

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Request;
use tracing::debug;

use crate::error::SigningError;

/// Signing name of the AgentCore data plane and gateway.
pub const AGENTCORE_SERVICE: &str = "bedrock-agentcore";

/// Signs outgoing reqwest requests with the process's AWS credentials.
pub struct SigV4Signer {
    credentials: SharedCredentialsProvider,
    region: String,
    service: &'static str,
}

impl SigV4Signer {
    pub fn new(credentials: SharedCredentialsProvider, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: AGENTCORE_SERVICE,
        }
    }

    /// Add the `authorization`, `x-amz-date` (and session token) headers.
    ///
    /// Must run after every other header and the body are set.
    pub async fn sign(&self, request: &mut Request) -> Result<(), SigningError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| SigningError::Credentials(e.to_string()))?;
        let identity: Identity = credentials.into();

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| SigningError::Sign(e.to_string()))?
            .into();

        let signed_headers: Vec<(String, String)> = {
            let headers: Vec<(&str, &str)> = request
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
                .collect();
            let body = request.body().and_then(|b| b.as_bytes()).unwrap_or_default();
            let signable = SignableRequest::new(
                request.method().as_str(),
                request.url().as_str(),
                headers.into_iter(),
                SignableBody::Bytes(body),
            )
            .map_err(|e| SigningError::Sign(e.to_string()))?;

            let (instructions, _signature) = sign(signable, &params)
                .map_err(|e| SigningError::Sign(e.to_string()))?
                .into_parts();
            instructions
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        };

        for (name, value) in signed_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SigningError::Sign(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| SigningError::Sign(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }

        debug!("Signed {} {} for {}", request.method(), request.url().path(), self.service);
        Ok(())
    }
}

/// Signer with fixed credentials for tests.
#[cfg(test)]
pub(crate) fn test_signer() -> SigV4Signer {
    use aws_credential_types::Credentials;

    SigV4Signer::new(
        SharedCredentialsProvider::new(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test")),
        "ap-northeast-1",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::Credentials;
    use reqwest::Client;

    #[tokio::test]
    async fn test_sign_adds_sigv4_headers() {
        let mut request = Client::new()
            .post("https://bedrock-agentcore.ap-northeast-1.amazonaws.com/identities/oauth2/token")
            .json(&serde_json::json!({"workloadIdentityToken": "wat"}))
            .build()
            .unwrap();

        test_signer().sign(&mut request).await.unwrap();

        let auth = request.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(auth.contains("/ap-northeast-1/bedrock-agentcore/aws4_request"));
        assert!(auth.contains("SignedHeaders="));
        assert!(request.headers().contains_key("x-amz-date"));
        assert!(!request.headers().contains_key("x-amz-security-token"));
    }

    #[tokio::test]
    async fn test_session_token_is_forwarded() {
        let signer = SigV4Signer::new(
            SharedCredentialsProvider::new(Credentials::new(
                "ASIAEXAMPLE",
                "secret",
                Some("session-token".into()),
                None,
                "test",
            )),
            "us-east-1",
        );
        let mut request = Client::new().post("https://example.com/mcp").build().unwrap();
        signer.sign(&mut request).await.unwrap();
        assert_eq!(request.headers()["x-amz-security-token"], "session-token");
    }
}
