//! Identification proxy.

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use super::ProxyError;
use crate::secrets::SecretResolver;
use crate::upstream::{PlantIdResponse, PlantIdentificationService};

const SERVICE: &str = "Plant.id";

/// Forwards images to the identification service with the API key injected.
///
/// Stateless: one call is one upstream request, with no retry.
pub struct IdentificationProxy {
    service: Arc<dyn PlantIdentificationService>,
    secrets: Arc<dyn SecretResolver>,
    api_key_env: String,
}

impl IdentificationProxy {
    pub fn new(
        service: Arc<dyn PlantIdentificationService>,
        secrets: Arc<dyn SecretResolver>,
        api_key_env: &str,
    ) -> Self {
        Self {
            service,
            secrets,
            api_key_env: api_key_env.to_string(),
        }
    }

    /// Identify the plant in `images` (base64 strings or data URLs).
    ///
    /// Returns the upstream payload unmodified. A payload without
    /// suggestions is a successful "no match".
    pub async fn identify(&self, images: &[String]) -> Result<Value, ProxyError> {
        let result = self.forward(images).await;
        if let Err(e) = &result {
            error!("Plant identification failed: {}", e);
        }
        result
    }

    async fn forward(&self, images: &[String]) -> Result<Value, ProxyError> {
        if images.is_empty() {
            return Err(ProxyError::InvalidRequest(
                "images must contain at least one image".to_string(),
            ));
        }
        if images.iter().any(|image| image.trim().is_empty()) {
            return Err(ProxyError::InvalidRequest(
                "images must not contain empty strings".to_string(),
            ));
        }

        let api_key = self
            .secrets
            .resolve(&self.api_key_env)
            .await
            .ok_or_else(|| ProxyError::Configuration(self.api_key_env.clone()))?;

        info!("Identifying plant with {} API ({} image(s))", SERVICE, images.len());

        let payload = self
            .service
            .identify(&api_key, images)
            .await
            .map_err(|e| ProxyError::from_upstream(SERVICE, e))?;

        let suggestions = PlantIdResponse::from_value(&payload)
            .map_err(|e| ProxyError::from_upstream(SERVICE, e))?
            .suggestions
            .map_or(0, |s| s.len());

        info!(
            "Plant identification successful ({} suggestion(s))",
            suggestions
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecrets;
    use crate::upstream::UpstreamError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const KEY_ENV: &str = "PLANT_ID_API_KEY";

    /// Scripted identification service that counts calls.
    struct FakeService {
        calls: AtomicUsize,
        seen_key: Mutex<Option<String>>,
        reply: Box<dyn Fn() -> Result<Value, UpstreamError> + Send + Sync>,
    }

    impl FakeService {
        fn new(reply: impl Fn() -> Result<Value, UpstreamError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen_key: Mutex::new(None),
                reply: Box::new(reply),
            })
        }
    }

    #[async_trait]
    impl PlantIdentificationService for FakeService {
        async fn identify(&self, api_key: &str, _images: &[String]) -> Result<Value, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_key.lock().unwrap() = Some(api_key.to_string());
            (self.reply)()
        }
    }

    fn proxy(service: Arc<FakeService>, secrets: StaticSecrets) -> IdentificationProxy {
        IdentificationProxy::new(service, Arc::new(secrets), KEY_ENV)
    }

    fn images() -> Vec<String> {
        vec!["data:image/png;base64,iVBORw0KGgo=".to_string()]
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_call() {
        let service = FakeService::new(|| Ok(json!({ "suggestions": [] })));
        let proxy = proxy(service.clone(), StaticSecrets::new());

        let err = proxy.identify(&images()).await.unwrap_err();
        assert!(matches!(err, ProxyError::Configuration(ref name) if name == KEY_ENV));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_images_rejected() {
        let service = FakeService::new(|| Ok(json!({})));
        let proxy = proxy(service.clone(), StaticSecrets::new().with(KEY_ENV, "k"));

        let err = proxy.identify(&[]).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
        let err = proxy.identify(&["  ".to_string()]).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_passthrough_unmodified() {
        let payload = json!({
            "id": 77,
            "custom": { "kept": true },
            "suggestions": [{ "plant_name": "Aloe vera", "probability": 0.8 }]
        });
        let expected = payload.clone();
        let service = FakeService::new(move || Ok(payload.clone()));
        let proxy = proxy(service.clone(), StaticSecrets::new().with(KEY_ENV, "secret-key"));

        let result = proxy.identify(&images()).await.unwrap();
        assert_eq!(result, expected);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.seen_key.lock().unwrap().as_deref(), Some("secret-key"));
    }

    #[tokio::test]
    async fn test_empty_suggestions_is_success() {
        let service = FakeService::new(|| Ok(json!({ "suggestions": [] })));
        let proxy = proxy(service, StaticSecrets::new().with(KEY_ENV, "k"));
        let result = proxy.identify(&images()).await.unwrap();
        assert_eq!(result["suggestions"], json!([]));
    }

    #[tokio::test]
    async fn test_upstream_status_error() {
        let service = FakeService::new(|| {
            Err(UpstreamError::Status {
                status: 429,
                body: "rate limited".to_string(),
            })
        });
        let proxy = proxy(service.clone(), StaticSecrets::new().with(KEY_ENV, "k"));
        let err = proxy.identify(&images()).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { status: 429, .. }));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1); // no retry
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_parse_error() {
        let service = FakeService::new(|| Ok(json!({ "suggestions": "none" })));
        let proxy = proxy(service, StaticSecrets::new().with(KEY_ENV, "k"));
        let err = proxy.identify(&images()).await.unwrap_err();
        assert!(matches!(err, ProxyError::Parse { .. }));
    }
}
