use crate::{Error, User, UserId};
use async_trait::async_trait;

/// Read access to the credential store
///
/// The guard only ever queries accounts; provisioning lives on the storage
/// backends themselves.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Find an account by its login name
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error>;

    /// Find an account by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;
}
