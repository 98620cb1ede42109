use proc_macro::TokenStream;

mod injectable;

/// Derive macro implementing `trellis::di::Injectable` for a struct
///
/// Each field is bound by its type:
///
/// - `Arc<T>`: resolved (and constructed when nobody provides it);
///   `T` must itself be `Injectable`
/// - `Arc<dyn Trait>`: looked up as a registered `Arc<dyn Trait>` value
/// - `Option<Arc<T>>`: `None` when no module provides `T`
/// - anything else: `Default::default()`
///
/// `#[inject(lookup)]` on an `Arc<T>` field requires `T` to be registered
/// (typically a value provider) instead of constructing it.
///
/// # Example
/// ```ignore
/// use trellis::Injectable;
///
/// #[derive(Injectable)]
/// pub struct ItemsService {
///     repository: Arc<dyn ItemsRepository>,
///     #[inject(lookup)]
///     config: Arc<ItemsConfig>,
///     audit: Option<Arc<AuditLog>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
