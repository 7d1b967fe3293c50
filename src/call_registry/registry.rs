use super::provider::{CallProvider, DateRange};
use crate::analysis::{AnalysisError, AnalysisResult};
use crate::discovery_store::{Call, DiscoveryStore, Engagement};
use std::sync::Arc;
use tracing::{info, warn};

/// Calls of an engagement: discovery through the provider, transcripts and
/// the operator's selection.
#[derive(Clone)]
pub struct CallRegistry {
    store: Arc<dyn DiscoveryStore>,
    provider: Arc<dyn CallProvider>,
}

impl CallRegistry {
    pub fn new(store: Arc<dyn DiscoveryStore>, provider: Arc<dyn CallProvider>) -> Self {
        Self { store, provider }
    }

    fn engagement(&self, engagement_id: &str) -> AnalysisResult<Engagement> {
        self.store
            .get_engagement(engagement_id)?
            .ok_or_else(|| AnalysisError::engagement_not_found(engagement_id))
    }

    /// The call, if it exists and belongs to the engagement.
    fn owned_call(&self, engagement_id: &str, call_id: &str) -> AnalysisResult<Call> {
        self.store
            .get_call(call_id)?
            .filter(|call| call.engagement_id == engagement_id)
            .ok_or_else(|| AnalysisError::call_not_found(call_id))
    }

    pub fn list_calls(&self, engagement_id: &str) -> AnalysisResult<Vec<Call>> {
        self.engagement(engagement_id)?;
        Ok(self.store.list_calls(engagement_id)?)
    }

    /// Searches the provider and upserts every match. `domain` defaults to the
    /// engagement's account domain.
    pub async fn search_calls(
        &self,
        engagement_id: &str,
        domain: Option<&str>,
        range: &DateRange,
    ) -> AnalysisResult<Vec<Call>> {
        let engagement = self.engagement(engagement_id)?;
        let domain = domain
            .or(engagement.account_domain.as_deref())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                AnalysisError::Validation(
                    "No account domain given and the engagement has none".to_string(),
                )
            })?
            .to_string();

        let found = self
            .provider
            .search_calls(&domain, range)
            .await
            .map_err(|e| AnalysisError::Provider(format!("Call search failed: {}", e)))?;

        let mut calls = Vec::with_capacity(found.len());
        for metadata in &found {
            calls.push(self.store.upsert_call(engagement_id, metadata)?);
        }
        info!(
            engagement_id = %engagement_id,
            domain = %domain,
            count = calls.len(),
            "Upserted calls from provider search"
        );
        Ok(calls)
    }

    /// Fetches the transcript from the provider and attaches it. Repeated
    /// fetches refresh the text and fetch time.
    pub async fn fetch_transcript(&self, engagement_id: &str, call_id: &str) -> AnalysisResult<Call> {
        self.engagement(engagement_id)?;
        let call = self.owned_call(engagement_id, call_id)?;

        let transcript = self
            .provider
            .fetch_transcript(&call.external_id)
            .await
            .map_err(|e| AnalysisError::Provider(format!("Transcript fetch failed: {}", e)))?;
        if transcript.trim().is_empty() {
            warn!(call_id = %call_id, external_id = %call.external_id, "Provider has no transcript");
            return Err(AnalysisError::Provider(format!(
                "The call provider has no transcript for call {}",
                call_id
            )));
        }

        self.store
            .set_transcript(call_id, &transcript)?
            .ok_or_else(|| AnalysisError::call_not_found(call_id))
    }

    /// Flips the selection flag. Existing jobs are unaffected.
    pub fn set_selected(&self, engagement_id: &str, call_id: &str, selected: bool) -> AnalysisResult<Call> {
        self.engagement(engagement_id)?;
        self.owned_call(engagement_id, call_id)?;
        self.store
            .set_selected(call_id, selected)?
            .ok_or_else(|| AnalysisError::call_not_found(call_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_registry::ProviderError;
    use crate::discovery_store::{CallMetadata, EngagementStore, SqliteDiscoveryStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProvider {
        calls: Vec<CallMetadata>,
        transcript: String,
        searched_domains: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CallProvider for FakeProvider {
        async fn search_calls(
            &self,
            domain: &str,
            _range: &DateRange,
        ) -> Result<Vec<CallMetadata>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Timeout);
            }
            self.searched_domains.lock().unwrap().push(domain.to_string());
            Ok(self.calls.clone())
        }

        async fn fetch_transcript(&self, _external_id: &str) -> Result<String, ProviderError> {
            if self.fail {
                return Err(ProviderError::NotConfigured);
            }
            Ok(self.transcript.clone())
        }
    }

    fn meta(external_id: &str) -> CallMetadata {
        CallMetadata {
            external_id: external_id.to_string(),
            title: Some(external_id.to_uppercase()),
            ..Default::default()
        }
    }

    fn setup(provider: FakeProvider) -> (CallRegistry, Arc<FakeProvider>, Engagement) {
        let store = Arc::new(SqliteDiscoveryStore::in_memory().unwrap());
        let engagement = store.create_engagement("Acme", Some("acme.com")).unwrap();
        let provider = Arc::new(provider);
        (CallRegistry::new(store, provider.clone()), provider, engagement)
    }

    #[tokio::test]
    async fn test_search_defaults_to_engagement_domain_and_upserts() {
        let (registry, provider, engagement) = setup(FakeProvider {
            calls: vec![meta("a"), meta("b")],
            ..Default::default()
        });

        let calls = registry
            .search_calls(&engagement.id, None, &DateRange::default())
            .await
            .unwrap();
        assert_eq!(calls.len(), 2);
        registry
            .search_calls(&engagement.id, Some("beta.io"), &DateRange::default())
            .await
            .unwrap();

        assert_eq!(
            *provider.searched_domains.lock().unwrap(),
            vec!["acme.com", "beta.io"]
        );
        assert_eq!(registry.list_calls(&engagement.id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_without_any_domain_is_a_validation_error() {
        let store = Arc::new(SqliteDiscoveryStore::in_memory().unwrap());
        let engagement = store.create_engagement("No Domain", None).unwrap();
        let registry = CallRegistry::new(store, Arc::new(FakeProvider::default()));

        let err = registry
            .search_calls(&engagement.id, Some("  "), &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
    }

    #[tokio::test]
    async fn test_provider_failures_surface_as_provider_errors() {
        let (registry, _, engagement) = setup(FakeProvider {
            fail: true,
            ..Default::default()
        });
        let err = registry
            .search_calls(&engagement.id, None, &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Provider(_)));
    }

    #[tokio::test]
    async fn test_fetch_transcript_attaches_text() {
        let (registry, _, engagement) = setup(FakeProvider {
            calls: vec![meta("a")],
            transcript: "[Speaker 1]: hi".to_string(),
            ..Default::default()
        });
        let call = registry
            .search_calls(&engagement.id, None, &DateRange::default())
            .await
            .unwrap()
            .remove(0);

        let fetched = registry.fetch_transcript(&engagement.id, &call.id).await.unwrap();
        assert_eq!(fetched.transcript.as_deref(), Some("[Speaker 1]: hi"));
        assert!(fetched.transcript_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_transcript_is_not_attached() {
        let (registry, _, engagement) = setup(FakeProvider {
            calls: vec![meta("a")],
            ..Default::default()
        });
        let call = registry
            .search_calls(&engagement.id, None, &DateRange::default())
            .await
            .unwrap()
            .remove(0);

        let err = registry
            .fetch_transcript(&engagement.id, &call.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Provider(_)));
        let stored = registry.list_calls(&engagement.id).unwrap().remove(0);
        assert!(stored.transcript.is_none());
    }

    #[tokio::test]
    async fn test_calls_of_other_engagements_are_not_found() {
        let store = Arc::new(SqliteDiscoveryStore::in_memory().unwrap());
        let acme = store.create_engagement("Acme", Some("acme.com")).unwrap();
        let beta = store.create_engagement("Beta", Some("beta.io")).unwrap();
        let registry = CallRegistry::new(
            store,
            Arc::new(FakeProvider {
                calls: vec![meta("a")],
                ..Default::default()
            }),
        );
        let call = registry
            .search_calls(&acme.id, None, &DateRange::default())
            .await
            .unwrap()
            .remove(0);

        let err = registry.set_selected(&beta.id, &call.id, true).unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
        let err = registry.list_calls("missing").unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_selected_flips_flag() {
        let (registry, _, engagement) = setup(FakeProvider {
            calls: vec![meta("a")],
            ..Default::default()
        });
        let call = registry
            .search_calls(&engagement.id, None, &DateRange::default())
            .await
            .unwrap()
            .remove(0);
        assert!(!call.selected_for_analysis);

        assert!(registry.set_selected(&engagement.id, &call.id, true).unwrap().selected_for_analysis);
        assert!(!registry.set_selected(&engagement.id, &call.id, false).unwrap().selected_for_analysis);
    }
}
