use async_trait::async_trait;
use sgn_common::{AnalysisRequest, AnalysisResponse, ProviderId};

use crate::error::ProviderError;

/// The one capability every AI backend exposes.
///
/// The selector depends only on this trait, so backends can be swapped or
/// mocked without touching dispatch logic.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn model_name(&self) -> &str;

    /// Run a compliance analysis. Implementations must not retry internally
    /// in a way that outlives the caller's timeout.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ProviderError>;
}
