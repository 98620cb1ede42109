use std::time::Duration;
use tower_http::trace::TraceLayer;
use trellis::prelude::*;

mod app_module;
mod guards;
mod modules;

use app_module::AppModule;
use modules::items::ItemsService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    tracing::info!("Starting items server...");

    let config = ConfigService::from_env();
    let app_config = AppConfig::from_service(&config);

    let app = Application::builder(AppModule::registry(config))
        .root_module::<AppModule>()
        .config(app_config)
        .global_interceptor(InterceptorRef::of::<LoggingInterceptor>())
        .on_destroy::<ItemsService>()
        .init_timeout(Duration::from_secs(30))
        .build()
        .await?;
    app.shutdown_handle().request_on_panic();

    for route in app.routes().routes() {
        tracing::info!(method = %route.method, path = %route.path, "Mapped route");
    }

    let listener = tokio::net::TcpListener::bind(app.config().addr()).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    let status = app
        .serve_with(listener, |router| router.layer(TraceLayer::new_for_http()))
        .await;
    std::process::exit(status.code());
}
