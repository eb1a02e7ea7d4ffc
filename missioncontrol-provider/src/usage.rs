//! Usage reporting
//!
//! Each lifecycle operation records a feature id such as
//! `Resource/jpd/CREATE`. Reports run on detached tasks; their outcome is
//! logged and otherwise ignored.

use missioncontrol_core::provider::Operation;
use serde::Serialize;

use crate::client::PlatformClient;

const USAGE_ENDPOINT: &str = "artifactory/api/system/usage";

/// Product id reported with usage events
pub const PRODUCT_ID: &str = concat!("missioncontrol-provider/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageRequest {
    product_id: String,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    feature_id: String,
}

/// Sends usage events without blocking the caller
#[derive(Debug, Clone)]
pub struct UsageReporter {
    client: PlatformClient,
    product_id: String,
}

impl UsageReporter {
    pub fn new(client: PlatformClient) -> Self {
        Self {
            client,
            product_id: PRODUCT_ID.to_string(),
        }
    }

    /// Feature id for a resource lifecycle operation
    pub fn resource_feature(resource_type: &str, operation: Operation) -> String {
        format!("Resource/{}/{}", resource_type, operation.verb())
    }

    pub fn report_operation(&self, resource_type: &str, operation: Operation) {
        self.report(Self::resource_feature(resource_type, operation));
    }

    /// Dispatch a usage event on a detached task
    ///
    /// Outside a tokio runtime the event is dropped.
    pub fn report(&self, feature_id: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("no async runtime, usage event '{}' dropped", feature_id);
            return;
        };

        let client = self.client.clone();
        let request = UsageRequest {
            product_id: self.product_id.clone(),
            features: vec![Feature {
                feature_id: feature_id.clone(),
            }],
        };
        handle.spawn(async move {
            let result = match client.endpoint(USAGE_ENDPOINT, &[]) {
                Ok(url) => client.post_discarding(url, &request).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                log::debug!("failed to send usage event '{}': {}", feature_id, e);
            }
        });
    }
}
