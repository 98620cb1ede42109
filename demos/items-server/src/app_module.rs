use crate::modules::items::ItemsModule;
use trellis::prelude::*;

pub struct AppModule;

impl AppModule {
    /// Declare every module of the application.
    pub fn registry(config: ConfigService) -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        ItemsModule::declare(&mut registry);
        registry.module::<AppModule>(
            ModuleMetadata::new()
                .import::<ItemsModule>()
                .value(config),
        );
        registry
    }
}
