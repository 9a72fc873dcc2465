use std::collections::HashMap;

use async_trait::async_trait;

use crate::graph::EdgeSnapshot;
use crate::query::{ContainerFilter, SortMode};
use crate::{
    AgoraResult, Container, Guid, IndexJob, JobStatus, ModifiedContainer, NewContainer, Predicate,
    Relation, Revision, TaskPriority, UserContext,
};

/// Append-only CRUD of containers. Every mutation runs in exactly one
/// transaction; any step failure rolls the whole operation back.
#[async_trait]
pub trait ContainerWriteApi {
    async fn create(&self, container: NewContainer) -> AgoraResult<Container>;
    async fn update(&self, container: ModifiedContainer) -> AgoraResult<Container>;
    async fn delete(&self, container: &Container) -> AgoraResult<()>;
    /// Soft-deletes the container and its full hierarchical subtree in one
    /// transaction.
    async fn delete_recursively(&self, container: &Container) -> AgoraResult<()>;
}

#[async_trait]
pub trait ContainerReadApi {
    async fn get_by_guid(&self, guid: Guid) -> AgoraResult<Container>;
    /// Collapses authorization denial into not-found so single-entity lookups
    /// do not leak existence.
    async fn get_for_user(&self, guid: Guid, user: &UserContext) -> AgoraResult<Container>;
    async fn get_by_slug(&self, slug: &str) -> AgoraResult<Container>;
    /// Full history ordered by valid_from, including the deleted tail row.
    async fn get_all_revisions_by_guid(&self, guid: Guid) -> AgoraResult<Vec<Container>>;
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
        sort: SortMode,
        limit: Option<u64>,
    ) -> AgoraResult<Vec<Container>>;
    /// Everything reachable from `guid` over the given predicates, the anchor
    /// excluded, narrowed by the filter.
    async fn get_related_containers(
        &self,
        guid: Guid,
        predicates: &[Predicate],
        filter: &ContainerFilter,
        sort: SortMode,
    ) -> AgoraResult<Vec<Container>>;
    async fn fetch_by_guids(&self, guids: &[Guid], sort: SortMode) -> AgoraResult<Vec<Container>>;
    /// Rows in the order of the supplied guid list.
    async fn fetch_by_guids_ordered(&self, guids: &[Guid]) -> AgoraResult<Vec<Container>>;
}

#[async_trait]
pub trait RelationApi {
    async fn create_relations(&self, relations: &[Relation]) -> AgoraResult<()>;
    /// Rewrites `position = index` for one complete `(object, predicate)`
    /// group; partial reorders are rejected before anything is written.
    async fn reorder_relations(
        &self,
        object: Revision,
        predicate: Predicate,
        ordered: &[Relation],
    ) -> AgoraResult<()>;
    async fn get_direct_relations(&self, guid: Guid) -> AgoraResult<Vec<Relation>>;
    async fn edge_snapshot(&self, predicates: &[Predicate]) -> AgoraResult<EdgeSnapshot>;
}

#[async_trait]
pub trait AccessControlApi {
    /// Derives the admin/collaborator/head/member guid sets from ACL edges.
    async fn load_user_context(&self, user: Guid, roles: Vec<String>) -> AgoraResult<UserContext>;
}

#[async_trait]
pub trait TaskPriorityApi {
    async fn upsert_task_priorities(&self, priorities: &[TaskPriority]) -> AgoraResult<()>;
    async fn task_priorities(&self, tasks: &[Guid]) -> AgoraResult<HashMap<Guid, i64>>;
}

#[async_trait]
pub trait IndexQueueApi {
    async fn list_index_jobs(
        &self,
        status: Option<JobStatus>,
        limit: u32,
    ) -> AgoraResult<Vec<IndexJob>>;
    async fn list_dead_letter_jobs(&self, limit: u32) -> AgoraResult<Vec<IndexJob>>;
}
