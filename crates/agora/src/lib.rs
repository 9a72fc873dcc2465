pub mod api;
pub mod authz;
pub mod config;
mod db;
pub mod directory;
pub mod error;
pub mod facet;
pub mod graph;
pub mod ids;
pub mod indexing;
pub mod migration;
pub mod model;
pub mod payload;
pub mod query;
pub mod search;
pub mod store;
pub mod time;

pub use api::{
    AccessControlApi, ContainerReadApi, ContainerWriteApi, IndexQueueApi, RelationApi,
    TaskPriorityApi,
};
pub use authz::{filter_visible, Ability, Action, UserContext};
pub use config::{AgoraConfig, DatabaseConfig, IndexingConfig, PoolConfig, SearchConfig};
pub use directory::{GroupDirectory, LocalGroupDirectory};
pub use error::{AgoraError, AgoraResult};
pub use facet::{count_in_memory, FacetCounts, FacetStrategy};
pub use graph::{EdgeSnapshot, SnapshotEdge};
pub use ids::{Guid, Revision};
pub use indexing::{IndexDocument, IndexWorker};
pub use model::{
    Container, IndexAction, IndexEvent, IndexJob, JobStatus, ModifiedContainer, NewContainer,
    NewRelation, Predicate, Relation, TaskPriority, UserRelation,
};
pub use payload::{
    FacetDimension, GoalPayload, IndicatorPayload, MeasurePayload, ObjectivePayload,
    OrganizationPayload, OrganizationalUnitPayload, Payload, PayloadType, ProgramPayload,
    ResourcePayload, SimpleMeasurePayload, TaskPayload, TextPayload, UndefinedPayload,
    Visibility,
};
pub use query::{ContainerFilter, QueryBackend, QueryEngine, SortMode};
pub use search::SearchIndex;
pub use store::AgoraStore;
pub use time::Timestamp;
