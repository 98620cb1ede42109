use crate::dispatch::{ExecutionContext, HandlerResult};
use crate::di::{Injectable, Injector};
use crate::interceptor::{Interceptor, Next};
use async_trait::async_trait;
use std::time::Instant;

/// An interceptor that logs handler timing and outcome, once per matched
/// request
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

impl Injectable for LoggingInterceptor {
    fn inject(_: &mut Injector<'_>) -> crate::Result<Self> {
        Ok(LoggingInterceptor)
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, context: &ExecutionContext, next: Next) -> HandlerResult {
        // Global interceptors also see the pre-match pass; log only the
        // matched invocation.
        let Some(route) = context.route() else {
            return next.run().await;
        };
        let request = context.request();
        let route = route.path.as_str();
        let start = Instant::now();

        tracing::info!(
            request_id = %context.request_id(),
            method = %request.method(),
            path = %request.path(),
            route = %route,
            "--> handling request"
        );

        let result = next.run().await;
        let duration_us = start.elapsed().as_micros() as u64;
        match &result {
            Ok(_) => tracing::info!(
                request_id = %context.request_id(),
                route = %route,
                duration_us,
                "<-- handled"
            ),
            Err(e) => tracing::warn!(
                request_id = %context.request_id(),
                route = %route,
                duration_us,
                error = %e,
                "<-- failed"
            ),
        }
        result
    }
}
