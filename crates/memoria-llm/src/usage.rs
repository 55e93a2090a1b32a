/// Where `LlmGateway` reports input/output token counts after every
/// completion and embedding call. Billing/quota accounting itself is an external
/// collaborator; this is the narrow seam `memoria-server` hooks
/// its `metrics` counters into.
pub trait UsageSink: Send + Sync {
    fn record_completion(&self, project_id: &str, model: &str, input_tokens: usize, output_tokens: usize);
    fn record_embedding(&self, project_id: &str, model: &str, tokens: usize);
}

/// Default sink used when nobody cares to observe usage (unit tests,
/// standalone gateway construction).
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn record_completion(&self, _project_id: &str, _model: &str, _input_tokens: usize, _output_tokens: usize) {}
    fn record_embedding(&self, _project_id: &str, _model: &str, _tokens: usize) {}
}
