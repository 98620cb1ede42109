mod container;
mod injectable;
mod injector;
mod reference;

pub use container::{Container, Instance, Provider};
pub use injectable::Injectable;
pub use injector::Injector;
pub use reference::ComponentRef;
