use sea_orm::sea_query;
use sea_orm::{ConnectionTrait, QueryResult, StatementBuilder};
use sea_orm_migration::prelude::Iden;

use crate::{AgoraError, AgoraResult, Container, Guid, Payload, Relation, Revision, Timestamp};

#[derive(Iden, Clone, Copy)]
pub enum AgoraContainers {
    Table,
    Revision,
    Guid,
    Realm,
    Organization,
    OrganizationalUnit,
    ManagedBy,
    Payload,
    PayloadType,
    TitleSort,
    SearchNorm,
    Slug,
    Template,
    ValidCurrently,
    Deleted,
    ValidFrom,
}

#[derive(Iden, Clone, Copy)]
pub enum AgoraContainerRelations {
    Table,
    Object,
    Predicate,
    Subject,
    Position,
}

#[derive(Iden, Clone, Copy)]
pub enum AgoraContainerUsers {
    Table,
    Object,
    Predicate,
    Subject,
}

#[derive(Iden, Clone, Copy)]
pub enum AgoraContainerFacets {
    Table,
    Revision,
    Dimension,
    Value,
}

#[derive(Iden, Clone, Copy)]
pub enum AgoraTaskPriorities {
    Table,
    Task,
    Priority,
}

#[derive(Iden, Clone, Copy)]
pub enum AgoraIndexJobs {
    Table,
    JobId,
    Action,
    Guid,
    EnqueuedAt,
    Attempts,
    NextRunAfter,
    Status,
    LastError,
}

pub(crate) fn col_name(iden: impl Iden) -> String {
    iden.to_string()
}

pub(crate) fn guid_value(guid: Guid) -> sea_query::Value {
    guid.to_uuid_string().into()
}

pub(crate) fn opt_guid_value(guid: Option<Guid>) -> sea_query::Value {
    match guid {
        Some(guid) => guid.to_uuid_string().into(),
        None => sea_query::Value::String(None),
    }
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> AgoraResult<()>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    conn.execute(backend.build(stmt)).await?;
    Ok(())
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> AgoraResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    Ok(conn.query_one(backend.build(stmt)).await?)
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> AgoraResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    Ok(conn.query_all(backend.build(stmt)).await?)
}

pub(crate) fn read_guid(row: &QueryResult, iden: impl Iden) -> AgoraResult<Guid> {
    let raw: String = row.try_get("", &col_name(iden))?;
    Guid::from_uuid_str(&raw)
}

pub(crate) fn read_opt_guid(row: &QueryResult, iden: impl Iden) -> AgoraResult<Option<Guid>> {
    let raw: Option<String> = row.try_get("", &col_name(iden))?;
    raw.map(|value| Guid::from_uuid_str(&value)).transpose()
}

pub(crate) fn read_revision(row: &QueryResult, iden: impl Iden) -> AgoraResult<Revision> {
    let raw: i64 = row.try_get("", &col_name(iden))?;
    Ok(Revision(raw))
}

/// Columns selected whenever a full container row is materialized.
pub(crate) fn container_columns() -> [AgoraContainers; 10] {
    [
        AgoraContainers::Revision,
        AgoraContainers::Guid,
        AgoraContainers::Realm,
        AgoraContainers::Organization,
        AgoraContainers::OrganizationalUnit,
        AgoraContainers::ManagedBy,
        AgoraContainers::Payload,
        AgoraContainers::ValidCurrently,
        AgoraContainers::Deleted,
        AgoraContainers::ValidFrom,
    ]
}

/// Build a container from a row; relations and ACL rows are attached by the
/// caller.
pub(crate) fn container_from_row(row: &QueryResult) -> AgoraResult<Container> {
    let payload_raw: String = row.try_get("", &col_name(AgoraContainers::Payload))?;
    let payload: Payload = serde_json::from_str(&payload_raw)
        .map_err(|err| AgoraError::storage(format!("malformed payload column: {err}")))?;
    let valid_from: i64 = row.try_get("", &col_name(AgoraContainers::ValidFrom))?;
    Ok(Container {
        revision: read_revision(row, AgoraContainers::Revision)?,
        guid: read_guid(row, AgoraContainers::Guid)?,
        realm: row.try_get("", &col_name(AgoraContainers::Realm))?,
        organization: read_guid(row, AgoraContainers::Organization)?,
        organizational_unit: read_opt_guid(row, AgoraContainers::OrganizationalUnit)?,
        managed_by: read_guid(row, AgoraContainers::ManagedBy)?,
        payload,
        valid_currently: row.try_get("", &col_name(AgoraContainers::ValidCurrently))?,
        deleted: row.try_get("", &col_name(AgoraContainers::Deleted))?,
        valid_from: Timestamp::from_i64(valid_from),
        relation: Vec::new(),
        user: Vec::new(),
    })
}

pub(crate) fn relation_from_row(row: &QueryResult) -> AgoraResult<Relation> {
    let predicate_raw: String = row.try_get("", &col_name(AgoraContainerRelations::Predicate))?;
    Ok(Relation {
        object: read_revision(row, AgoraContainerRelations::Object)?,
        predicate: crate::Predicate::parse(&predicate_raw)?,
        subject: read_revision(row, AgoraContainerRelations::Subject)?,
        position: row.try_get("", &col_name(AgoraContainerRelations::Position))?,
    })
}
