//! HTTP implementation of [`SysApi`] against the Vault v1 API

use crate::api::{rekey_prefix, SysApi};
use crate::error::ApiError;
use crate::models::{
    ErrorResponse, GenerateRootInitRequest, GenerateRootStatus, InitRequest, InitStatus,
    RekeyInitRequest, RekeyStatus, RekeyUpdateResponse, RekeyVerifyResponse, ShareSubmission,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;
use vault_init_core::config::VaultConnection;
use vault_init_core::{BootstrapResult, KeyKind};
use zeroize::Zeroizing;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Client for the `sys/` endpoints of one server
pub struct VaultSysClient {
    http: reqwest::Client,
    base: Url,
    token: Option<Zeroizing<String>>,
    namespace: Option<String>,
}

impl VaultSysClient {
    pub fn new(connection: &VaultConnection) -> Result<Self, ApiError> {
        let mut base = Url::parse(&connection.address).map_err(|e| ApiError::Address {
            address: connection.address.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Address {
                address: connection.address.clone(),
                message: "not an http(s) URL".to_string(),
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("vault-init/", env!("CARGO_PKG_VERSION")))
            .timeout(connection.request_timeout())
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base,
            token: connection.token.clone().map(Zeroizing::new),
            namespace: connection.namespace.clone(),
        })
    }

    pub fn address(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base
            .join(&format!("v1/{}", path))
            .map_err(|e| ApiError::unexpected(path, format!("invalid request path: {}", e)))?;

        let mut builder = self.http.request(method, url);
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token.as_str());
        }
        Ok(builder)
    }

    async fn execute(&self, builder: RequestBuilder, path: &str) -> Result<Response, ApiError> {
        trace!(path, "Sending admin API request");
        let response = builder.send().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(path, status = status.as_u16(), "Admin API request succeeded");
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let errors = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|e| e.errors)
            .unwrap_or_default();
        Err(ApiError::status(path, status.as_u16(), errors))
    }

    async fn json<T: DeserializeOwned>(&self, response: Response, path: &str) -> Result<T, ApiError> {
        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;
        let body = Zeroizing::new(bytes.to_vec());
        // serde_json messages can quote the offending value; keep the position only
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::unexpected(
                path,
                format!("{:?} error at line {} column {}", e.classify(), e.line(), e.column()),
            )
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::GET, path)?, path).await?;
        self.json(response, path).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::PUT, path)?.json(body);
        let response = self.execute(builder, path).await?;
        self.json(response, path).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, path)?, path)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SysApi for VaultSysClient {
    async fn init_status(&self) -> Result<InitStatus, ApiError> {
        self.get("sys/init").await
    }

    async fn init(&self, request: &InitRequest) -> Result<BootstrapResult, ApiError> {
        self.put("sys/init", request).await
    }

    async fn rekey_status(&self, kind: KeyKind) -> Result<RekeyStatus, ApiError> {
        self.get(&format!("{}/init", rekey_prefix(kind))).await
    }

    async fn rekey_init(
        &self,
        kind: KeyKind,
        request: &RekeyInitRequest,
    ) -> Result<RekeyStatus, ApiError> {
        self.put(&format!("{}/init", rekey_prefix(kind)), request)
            .await
    }

    async fn rekey_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyUpdateResponse, ApiError> {
        self.put(
            &format!("{}/update", rekey_prefix(kind)),
            &ShareSubmission { key, nonce },
        )
        .await
    }

    async fn rekey_cancel(&self, kind: KeyKind) -> Result<(), ApiError> {
        self.delete(&format!("{}/init", rekey_prefix(kind))).await
    }

    async fn rekey_verify_update(
        &self,
        kind: KeyKind,
        key: &str,
        nonce: &str,
    ) -> Result<RekeyVerifyResponse, ApiError> {
        self.put(
            &format!("{}/verify", rekey_prefix(kind)),
            &ShareSubmission { key, nonce },
        )
        .await
    }

    async fn rekey_verify_cancel(&self, kind: KeyKind) -> Result<(), ApiError> {
        self.delete(&format!("{}/verify", rekey_prefix(kind))).await
    }

    async fn generate_root_status(&self) -> Result<GenerateRootStatus, ApiError> {
        self.get("sys/generate-root/attempt").await
    }

    async fn generate_root_init(
        &self,
        request: &GenerateRootInitRequest,
    ) -> Result<GenerateRootStatus, ApiError> {
        self.put("sys/generate-root/attempt", request).await
    }

    async fn generate_root_update(
        &self,
        key: &str,
        nonce: &str,
    ) -> Result<GenerateRootStatus, ApiError> {
        self.put(
            "sys/generate-root/update",
            &ShareSubmission { key, nonce },
        )
        .await
    }

    async fn generate_root_cancel(&self) -> Result<(), ApiError> {
        self.delete("sys/generate-root/attempt").await
    }

    async fn revoke_self(&self, token: &str) -> Result<(), ApiError> {
        let path = "auth/token/revoke-self";
        let url = self
            .base
            .join(&format!("v1/{}", path))
            .map_err(|e| ApiError::unexpected(path, format!("invalid request path: {}", e)))?;

        let mut builder = self.http.post(url).header(TOKEN_HEADER, token);
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        self.execute(builder, path).await.map(|_| ())
    }
}
