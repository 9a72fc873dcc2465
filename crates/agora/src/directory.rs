use async_trait::async_trait;

use crate::{AgoraResult, Guid};

/// Identity/group-management collaborator. For organization and
/// organizational-unit containers the allocated group identifier becomes the
/// container guid, so the call happens before the local transaction commits
/// and its failure aborts the create.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn allocate_group(&self, name: &str) -> AgoraResult<Guid>;
    async fn update_access_settings(&self, group: Guid) -> AgoraResult<()>;
}

/// In-process allocator used when no external directory is wired up.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalGroupDirectory;

#[async_trait]
impl GroupDirectory for LocalGroupDirectory {
    async fn allocate_group(&self, _name: &str) -> AgoraResult<Guid> {
        Ok(Guid::new())
    }

    async fn update_access_settings(&self, _group: Guid) -> AgoraResult<()> {
        Ok(())
    }
}
