use crate::di::Injector;
use crate::error::Result;

/// Trait for types that can be constructed by the DI container
///
/// Dependencies are declared explicitly: `inject` pulls each one from the
/// [`Injector`], which resolves it from the owning module's container or,
/// failing that, from any scanned module. This trait is typically
/// implemented via `#[derive(Injectable)]`.
///
/// # Example
/// ```
/// use trellis::{Injectable, Injector, Result};
/// use std::sync::Arc;
///
/// pub struct UsersRepository;
///
/// impl Injectable for UsersRepository {
///     fn inject(_: &mut Injector<'_>) -> Result<Self> {
///         Ok(UsersRepository)
///     }
/// }
///
/// pub struct UsersService {
///     repository: Arc<UsersRepository>,
/// }
///
/// impl Injectable for UsersService {
///     fn inject(injector: &mut Injector<'_>) -> Result<Self> {
///         Ok(UsersService {
///             repository: injector.get::<UsersRepository>()?,
///         })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving its dependencies
    ///
    /// # Errors
    /// Returns an error if a required dependency cannot be provided or its
    /// resolution would close a dependency cycle.
    fn inject(injector: &mut Injector<'_>) -> Result<Self>;
}
