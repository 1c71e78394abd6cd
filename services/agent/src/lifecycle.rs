//! Workspace index provisioning and teardown.
//!
//! Both paths probe the cluster first so an unreachable search engine fails
//! the run before any index mutation is attempted.

use crate::elastic::client::{ElasticClient, ElasticError};

/// Create the workspace index if it does not exist yet. Called only for
/// never-synchronized workspaces (checkpoint 0).
pub async fn ensure_index(elastic: &ElasticClient, index: &str) -> Result<(), ElasticError> {
    elastic.ping().await?;

    if elastic.index_exists(index).await? {
        tracing::debug!(index, "index already present");
        return Ok(());
    }

    tracing::info!(index, "creating index");
    elastic.create_index(index).await
}

/// Drop the workspace index. Missing index counts as deleted, so repeated
/// decommission attempts converge.
pub async fn delete_index(elastic: &ElasticClient, index: &str) -> Result<(), ElasticError> {
    elastic.ping().await?;

    tracing::info!(index, "deleting index");
    elastic.delete_index(index).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elastic::client::ElasticConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ElasticClient {
        ElasticClient::new(ElasticConfig {
            endpoints: vec![server.uri()],
            api_key: None,
            index_prefix: "audit-".to_string(),
            shards: 1,
            replicas: 1,
            timeout_secs: 5,
        })
        .expect("client should build")
    }

    async fn mount_ping(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn ensure_index_creates_when_absent() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("HEAD"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "acknowledged": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        ensure_index(&test_client(&server), "audit-100")
            .await
            .expect("ensure");
    }

    #[tokio::test]
    async fn ensure_index_skips_create_when_present() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("HEAD"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        ensure_index(&test_client(&server), "audit-100")
            .await
            .expect("ensure");
    }

    #[tokio::test]
    async fn ensure_index_fails_when_cluster_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;

        let err = ensure_index(&test_client(&server), "audit-100")
            .await
            .unwrap_err();
        assert!(matches!(err, ElasticError::Http { .. }));
    }

    #[tokio::test]
    async fn ensure_index_propagates_unacknowledged_create() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("HEAD"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/audit-100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "acknowledged": false
            })))
            .mount(&server)
            .await;

        let err = ensure_index(&test_client(&server), "audit-100")
            .await
            .unwrap_err();
        assert!(matches!(err, ElasticError::NotAcknowledged { .. }));
    }

    #[tokio::test]
    async fn delete_index_removes_existing() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/audit-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "acknowledged": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        delete_index(&test_client(&server), "audit-7")
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn delete_index_tolerates_missing_index() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/audit-7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        delete_index(&test_client(&server), "audit-7")
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn delete_index_fails_when_cluster_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/audit-7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = delete_index(&test_client(&server), "audit-7")
            .await
            .unwrap_err();
        assert!(matches!(err, ElasticError::Http { .. }));
    }
}
