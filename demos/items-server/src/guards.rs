use trellis::prelude::*;

/// Header checked by [`ApiKeyGuard`].
pub const API_KEY_HEADER: &str = "x-api-key";

/// Lets a request through when it carries the configured `API_KEY`.
///
/// Without a configured key every guarded route is denied.
#[derive(Injectable)]
pub struct ApiKeyGuard {
    #[inject(lookup)]
    config: Arc<ConfigService>,
}

#[async_trait]
impl Guard for ApiKeyGuard {
    async fn can_activate(&self, context: &ExecutionContext) -> Result<bool, HandlerError> {
        let Some(expected) = self.config.get("API_KEY") else {
            return Ok(false);
        };
        Ok(context.request().header(API_KEY_HEADER) == Some(expected.as_str()))
    }
}
