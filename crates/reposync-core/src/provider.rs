use crate::model::{Identity, RepositoryDescriptor};
use std::future::Future;
use std::pin::Pin;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Remote repository directory for one account. Pagination stays behind the trait.
pub trait RepoDirectory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every repository the identity owns, with local flags left at their defaults.
    fn list_repositories<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> ProviderFuture<'a, Vec<RepositoryDescriptor>>;

    /// Fails when the credential is rejected or belongs to another account.
    fn validate_identity<'a>(&'a self, identity: &'a Identity) -> ProviderFuture<'a, ()>;
}
