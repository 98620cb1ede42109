mod controller;
mod model;
mod service;

pub use controller::ItemsController;
pub use service::ItemsService;

use trellis::prelude::*;

pub struct ItemsModule;

impl ItemsModule {
    pub fn declare(registry: &mut MetadataRegistry) {
        ItemsController::declare(registry);
        registry.module::<ItemsModule>(
            ModuleMetadata::new()
                .controller::<ItemsController>()
                .provider::<ItemsService>()
                .export::<ItemsService>(),
        );
    }
}
