use async_trait::async_trait;

use riskwatch_workers::scheduler::{Job, JobError};

use super::admission::AdmissionController;

/// Periodically trims the bucket registry so idle identities do not pile up.
pub struct BucketEvictionJob {
    admission: AdmissionController,
}

impl BucketEvictionJob {
    pub fn new(admission: AdmissionController) -> Self {
        Self { admission }
    }
}

#[async_trait]
impl Job for BucketEvictionJob {
    fn name(&self) -> &'static str {
        "bucket-eviction"
    }

    async fn run(&self) -> Result<(), JobError> {
        let evicted = self.admission.evict_idle();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.admission.registry().len(), "rate limit buckets evicted");
        }
        Ok(())
    }
}
