use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::sea_query::{
    Alias, Expr, ExprTrait, JoinType, NullOrdering, OnConflict, Order, Query, SelectStatement,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::api::{
    AccessControlApi, ContainerReadApi, ContainerWriteApi, IndexQueueApi, RelationApi,
    TaskPriorityApi,
};
use crate::config::{AgoraConfig, DatabaseConfig, IndexingConfig};
use crate::db::*;
use crate::directory::{GroupDirectory, LocalGroupDirectory};
use crate::graph::{EdgeSnapshot, SnapshotEdge};
use crate::indexing::{backoff_micros, normalize_search_text, normalize_title_sort};
use crate::migration::Migrator;
use crate::query::{prepare_where, ContainerFilter, SortMode};
use crate::{
    Ability, Action, AgoraError, AgoraResult, Container, Guid, IndexAction, IndexEvent, IndexJob,
    JobStatus,
    ModifiedContainer, NewContainer, NewRelation, Payload, PayloadType, Predicate, Relation,
    Revision, TaskPriority, Timestamp, UserContext, UserRelation,
};

#[derive(Clone)]
pub struct AgoraStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    directory: Arc<dyn GroupDirectory>,
    fts_language: Option<String>,
}

fn build_connection_url(config: &AgoraConfig, base_dir: &Path) -> AgoraResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.to_string_lossy()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
    }
}

fn resolve_new_relations(revision: Revision, relations: &[NewRelation]) -> Vec<Relation> {
    relations
        .iter()
        .map(|relation| Relation {
            object: relation.object.unwrap_or(revision),
            predicate: relation.predicate,
            subject: relation.subject.unwrap_or(revision),
            position: relation.position,
        })
        .collect()
}

fn index_job_from_row(row: &sea_orm::QueryResult) -> AgoraResult<IndexJob> {
    let status_raw: i16 = row.try_get("", &col_name(AgoraIndexJobs::Status))?;
    let status = JobStatus::from_i16(status_raw)
        .ok_or_else(|| AgoraError::storage(format!("invalid job status {status_raw}")))?;
    let enqueued_at: i64 = row.try_get("", &col_name(AgoraIndexJobs::EnqueuedAt))?;
    Ok(IndexJob {
        job_id: row.try_get("", &col_name(AgoraIndexJobs::JobId))?,
        action: row.try_get("", &col_name(AgoraIndexJobs::Action))?,
        guid: row.try_get("", &col_name(AgoraIndexJobs::Guid))?,
        enqueued_at: Timestamp::from_i64(enqueued_at),
        attempts: row.try_get("", &col_name(AgoraIndexJobs::Attempts))?,
        next_run_after: row.try_get("", &col_name(AgoraIndexJobs::NextRunAfter))?,
        status,
        last_error: row.try_get("", &col_name(AgoraIndexJobs::LastError))?,
    })
}

impl AgoraStore {
    pub async fn connect(config: &AgoraConfig, base_dir: &Path) -> AgoraResult<Self> {
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await.map_err(AgoraError::from)?;
        let backend = conn.get_database_backend();
        Migrator::up(&conn, None).await.map_err(AgoraError::from)?;
        Ok(Self {
            conn,
            backend,
            directory: Arc::new(LocalGroupDirectory),
            fts_language: config.search.language.clone(),
        })
    }

    pub async fn connect_sqlite(path: &Path) -> AgoraResult<Self> {
        let config = AgoraConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn with_directory(mut self, directory: Arc<dyn GroupDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Current row without relations or ACL rows attached; `None` when the
    /// container never existed or was soft-deleted.
    pub async fn get_current_row(&self, guid: Guid) -> AgoraResult<Option<Container>> {
        self.fetch_current_row(&self.conn, guid).await
    }

    async fn fetch_current_row<C: ConnectionTrait>(
        &self,
        conn: &C,
        guid: Guid,
    ) -> AgoraResult<Option<Container>> {
        let select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::Guid))
                    .eq(guid.to_uuid_string()),
            )
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently)).eq(true),
            )
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false))
            .limit(1)
            .to_owned();
        let row = query_one(conn, &select).await?;
        row.map(|row| container_from_row(&row)).transpose()
    }

    async fn fetch_users_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        revision: Revision,
    ) -> AgoraResult<Vec<UserRelation>> {
        let select = Query::select()
            .columns([
                AgoraContainerUsers::Predicate,
                AgoraContainerUsers::Subject,
            ])
            .from(AgoraContainerUsers::Table)
            .and_where(Expr::col(AgoraContainerUsers::Object).eq(revision.as_i64()))
            .to_owned();
        let rows = query_all(conn, &select).await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let predicate_raw: String =
                row.try_get("", &col_name(AgoraContainerUsers::Predicate))?;
            users.push(UserRelation {
                predicate: Predicate::parse(&predicate_raw)?,
                subject: read_guid(&row, AgoraContainerUsers::Subject)?,
            });
        }
        Ok(users)
    }

    /// Attach ACL rows and the currently visible relations to a row set.
    async fn attach_users_and_relations<C: ConnectionTrait>(
        &self,
        conn: &C,
        containers: &mut [Container],
    ) -> AgoraResult<()> {
        if containers.is_empty() {
            return Ok(());
        }
        let revisions: Vec<i64> = containers
            .iter()
            .map(|container| container.revision.as_i64())
            .collect();

        let user_select = Query::select()
            .columns([
                AgoraContainerUsers::Object,
                AgoraContainerUsers::Predicate,
                AgoraContainerUsers::Subject,
            ])
            .from(AgoraContainerUsers::Table)
            .and_where(Expr::col(AgoraContainerUsers::Object).is_in(revisions.clone()))
            .to_owned();
        let mut users_by_revision: HashMap<i64, Vec<UserRelation>> = HashMap::new();
        for row in query_all(conn, &user_select).await? {
            let object: i64 = row.try_get("", &col_name(AgoraContainerUsers::Object))?;
            let predicate_raw: String =
                row.try_get("", &col_name(AgoraContainerUsers::Predicate))?;
            users_by_revision.entry(object).or_default().push(UserRelation {
                predicate: Predicate::parse(&predicate_raw)?,
                subject: read_guid(&row, AgoraContainerUsers::Subject)?,
            });
        }

        let co = Alias::new("co");
        let cs = Alias::new("cs");
        let relation_select = Query::select()
            .columns([
                (AgoraContainerRelations::Table, AgoraContainerRelations::Object),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Predicate,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Subject,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Position,
                ),
            ])
            .from(AgoraContainerRelations::Table)
            .join_as(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                co.clone(),
                Expr::col((co.clone(), AgoraContainers::Revision))
                    .equals((
                        AgoraContainerRelations::Table,
                        AgoraContainerRelations::Object,
                    ))
                    .and(Expr::col((co.clone(), AgoraContainers::ValidCurrently)).eq(true))
                    .and(Expr::col((co.clone(), AgoraContainers::Deleted)).eq(false)),
            )
            .join_as(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                cs.clone(),
                Expr::col((cs.clone(), AgoraContainers::Revision))
                    .equals((
                        AgoraContainerRelations::Table,
                        AgoraContainerRelations::Subject,
                    ))
                    .and(Expr::col((cs.clone(), AgoraContainers::ValidCurrently)).eq(true))
                    .and(Expr::col((cs.clone(), AgoraContainers::Deleted)).eq(false)),
            )
            .cond_where(
                sea_orm::sea_query::Cond::any()
                    .add(
                        Expr::col((
                            AgoraContainerRelations::Table,
                            AgoraContainerRelations::Object,
                        ))
                        .is_in(revisions.clone()),
                    )
                    .add(
                        Expr::col((
                            AgoraContainerRelations::Table,
                            AgoraContainerRelations::Subject,
                        ))
                        .is_in(revisions),
                    ),
            )
            .order_by(
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Position,
                ),
                Order::Asc,
            )
            .to_owned();
        let mut relations = Vec::new();
        for row in query_all(conn, &relation_select).await? {
            relations.push(relation_from_row(&row)?);
        }

        for container in containers.iter_mut() {
            container.user = users_by_revision
                .remove(&container.revision.as_i64())
                .unwrap_or_default();
            container.relation = relations
                .iter()
                .filter(|relation| {
                    relation.object == container.revision
                        || relation.subject == container.revision
                })
                .copied()
                .collect();
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_revision_row<C: ConnectionTrait>(
        &self,
        conn: &C,
        guid: Guid,
        realm: &str,
        organization: Guid,
        organizational_unit: Option<Guid>,
        managed_by: Guid,
        payload: &Payload,
        valid_currently: bool,
        deleted: bool,
    ) -> AgoraResult<(Revision, Timestamp)> {
        let payload_json = serde_json::to_string(payload)?;
        let valid_from = Timestamp::now_micros();
        let insert = Query::insert()
            .into_table(AgoraContainers::Table)
            .columns([
                AgoraContainers::Guid,
                AgoraContainers::Realm,
                AgoraContainers::Organization,
                AgoraContainers::OrganizationalUnit,
                AgoraContainers::ManagedBy,
                AgoraContainers::Payload,
                AgoraContainers::PayloadType,
                AgoraContainers::TitleSort,
                AgoraContainers::SearchNorm,
                AgoraContainers::Slug,
                AgoraContainers::Template,
                AgoraContainers::ValidCurrently,
                AgoraContainers::Deleted,
                AgoraContainers::ValidFrom,
            ])
            .values_panic([
                guid_value(guid).into(),
                realm.to_string().into(),
                guid_value(organization).into(),
                opt_guid_value(organizational_unit).into(),
                guid_value(managed_by).into(),
                payload_json.into(),
                payload.kind().as_str().into(),
                normalize_title_sort(payload.title()).into(),
                normalize_search_text(&payload.index_text()).into(),
                payload.slug().map(|slug| slug.to_string()).into(),
                payload.template().into(),
                valid_currently.into(),
                deleted.into(),
                valid_from.as_i64().into(),
            ])
            .returning(Query::returning().column(AgoraContainers::Revision))
            .to_owned();
        let row = query_one(conn, &insert)
            .await?
            .ok_or_else(|| AgoraError::storage("insert did not return a revision"))?;
        let revision = read_revision(&row, AgoraContainers::Revision)?;
        Ok((revision, valid_from))
    }

    async fn insert_users<C: ConnectionTrait>(
        &self,
        conn: &C,
        revision: Revision,
        users: &[UserRelation],
    ) -> AgoraResult<()> {
        for user in users {
            let insert = Query::insert()
                .into_table(AgoraContainerUsers::Table)
                .columns([
                    AgoraContainerUsers::Object,
                    AgoraContainerUsers::Predicate,
                    AgoraContainerUsers::Subject,
                ])
                .values_panic([
                    revision.as_i64().into(),
                    user.predicate.as_str().into(),
                    guid_value(user.subject).into(),
                ])
                .on_conflict(
                    OnConflict::columns([
                        AgoraContainerUsers::Object,
                        AgoraContainerUsers::Predicate,
                        AgoraContainerUsers::Subject,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .to_owned();
            exec(conn, &insert).await?;
        }
        Ok(())
    }

    /// Duplicate edges are ignored, which makes relation inserts idempotent.
    async fn insert_relation_rows<C: ConnectionTrait>(
        &self,
        conn: &C,
        relations: &[Relation],
    ) -> AgoraResult<()> {
        for relation in relations {
            let insert = Query::insert()
                .into_table(AgoraContainerRelations::Table)
                .columns([
                    AgoraContainerRelations::Object,
                    AgoraContainerRelations::Position,
                    AgoraContainerRelations::Predicate,
                    AgoraContainerRelations::Subject,
                ])
                .values_panic([
                    relation.object.as_i64().into(),
                    relation.position.into(),
                    relation.predicate.as_str().into(),
                    relation.subject.as_i64().into(),
                ])
                .on_conflict(
                    OnConflict::columns([
                        AgoraContainerRelations::Object,
                        AgoraContainerRelations::Predicate,
                        AgoraContainerRelations::Subject,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .to_owned();
            exec(conn, &insert).await?;
        }
        Ok(())
    }

    /// A newly inserted program chapter pushes later siblings down one slot.
    async fn shift_sibling_positions<C: ConnectionTrait>(
        &self,
        conn: &C,
        revision: Revision,
        relations: &[Relation],
    ) -> AgoraResult<()> {
        let Some(inserted) = relations.iter().find(|relation| {
            relation.predicate == Predicate::IsPartOfProgram && relation.subject == revision
        }) else {
            return Ok(());
        };
        let update = Query::update()
            .table(AgoraContainerRelations::Table)
            .value(
                AgoraContainerRelations::Position,
                Expr::col(AgoraContainerRelations::Position).add(1),
            )
            .and_where(
                Expr::col(AgoraContainerRelations::Predicate)
                    .eq(Predicate::IsPartOfProgram.as_str()),
            )
            .and_where(Expr::col(AgoraContainerRelations::Object).eq(inserted.object.as_i64()))
            .and_where(Expr::col(AgoraContainerRelations::Subject).ne(revision.as_i64()))
            .and_where(Expr::col(AgoraContainerRelations::Position).gte(inserted.position))
            .to_owned();
        exec(conn, &update).await
    }

    async fn insert_facets<C: ConnectionTrait>(
        &self,
        conn: &C,
        revision: Revision,
        payload: &Payload,
    ) -> AgoraResult<()> {
        for (dimension, value) in payload.facet_entries() {
            let insert = Query::insert()
                .into_table(AgoraContainerFacets::Table)
                .columns([
                    AgoraContainerFacets::Revision,
                    AgoraContainerFacets::Dimension,
                    AgoraContainerFacets::Value,
                ])
                .values_panic([
                    revision.as_i64().into(),
                    dimension.key().into(),
                    value.into(),
                ])
                .on_conflict(
                    OnConflict::columns([
                        AgoraContainerFacets::Revision,
                        AgoraContainerFacets::Dimension,
                        AgoraContainerFacets::Value,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .to_owned();
            exec(conn, &insert).await?;
        }
        Ok(())
    }

    async fn flip_valid_currently<C: ConnectionTrait>(
        &self,
        conn: &C,
        guid: Guid,
    ) -> AgoraResult<()> {
        let update = Query::update()
            .table(AgoraContainers::Table)
            .value(AgoraContainers::ValidCurrently, false)
            .and_where(Expr::col(AgoraContainers::Guid).eq(guid.to_uuid_string()))
            .to_owned();
        exec(conn, &update).await
    }

    /// Forward-carry inbound edges from prior revisions onto the new one.
    /// When several prior revisions carry the same `(predicate, subject)`,
    /// the most recent prior revision wins.
    async fn forward_carry_relations<C: ConnectionTrait>(
        &self,
        conn: &C,
        guid: Guid,
        new_revision: Revision,
    ) -> AgoraResult<()> {
        let cs = Alias::new("cs");
        let subject_valid = Query::select()
            .expr(Expr::val(1))
            .from_as(AgoraContainers::Table, cs.clone())
            .and_where(Expr::col((cs.clone(), AgoraContainers::Revision)).equals((
                AgoraContainerRelations::Table,
                AgoraContainerRelations::Subject,
            )))
            .and_where(Expr::col((cs.clone(), AgoraContainers::ValidCurrently)).eq(true))
            .and_where(Expr::col((cs, AgoraContainers::Deleted)).eq(false))
            .to_owned();
        let select = Query::select()
            .columns([
                (AgoraContainerRelations::Table, AgoraContainerRelations::Object),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Predicate,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Subject,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Position,
                ),
            ])
            .from(AgoraContainerRelations::Table)
            .join(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                Expr::col((AgoraContainers::Table, AgoraContainers::Revision)).equals((
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Object,
                )),
            )
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Guid)).eq(guid.to_uuid_string()))
            .and_where(
                Expr::col((
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Object,
                ))
                .ne(new_revision.as_i64()),
            )
            .and_where(Expr::exists(subject_valid))
            .to_owned();
        let rows = query_all(conn, &select).await?;

        let mut latest: BTreeMap<(Predicate, Revision), Relation> = BTreeMap::new();
        for row in rows {
            let relation = relation_from_row(&row)?;
            let key = (relation.predicate, relation.subject);
            match latest.get(&key) {
                Some(existing) if existing.object >= relation.object => {}
                _ => {
                    latest.insert(key, relation);
                }
            }
        }
        let carried: Vec<Relation> = latest
            .into_values()
            .map(|relation| Relation {
                object: new_revision,
                ..relation
            })
            .collect();
        self.insert_relation_rows(conn, &carried).await
    }

    async fn edge_snapshot_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        predicates: &[Predicate],
    ) -> AgoraResult<EdgeSnapshot> {
        let co = Alias::new("co");
        let cs = Alias::new("cs");
        let select = Query::select()
            .columns([
                (AgoraContainerRelations::Table, AgoraContainerRelations::Object),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Predicate,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Subject,
                ),
                (
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Position,
                ),
            ])
            .expr_as(
                Expr::col((co.clone(), AgoraContainers::Guid)),
                Alias::new("object_guid"),
            )
            .expr_as(
                Expr::col((cs.clone(), AgoraContainers::Guid)),
                Alias::new("subject_guid"),
            )
            .from(AgoraContainerRelations::Table)
            .join_as(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                co.clone(),
                Expr::col((co.clone(), AgoraContainers::Revision))
                    .equals((
                        AgoraContainerRelations::Table,
                        AgoraContainerRelations::Object,
                    ))
                    .and(Expr::col((co.clone(), AgoraContainers::ValidCurrently)).eq(true))
                    .and(Expr::col((co, AgoraContainers::Deleted)).eq(false)),
            )
            .join_as(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                cs.clone(),
                Expr::col((cs.clone(), AgoraContainers::Revision))
                    .equals((
                        AgoraContainerRelations::Table,
                        AgoraContainerRelations::Subject,
                    ))
                    .and(Expr::col((cs.clone(), AgoraContainers::ValidCurrently)).eq(true))
                    .and(Expr::col((cs, AgoraContainers::Deleted)).eq(false)),
            )
            .and_where(
                Expr::col((
                    AgoraContainerRelations::Table,
                    AgoraContainerRelations::Predicate,
                ))
                .is_in(predicates.iter().map(|predicate| predicate.as_str())),
            )
            .to_owned();
        let rows = query_all(conn, &select).await?;
        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            let relation = relation_from_row(&row)?;
            let object_guid_raw: String = row.try_get("", "object_guid")?;
            let subject_guid_raw: String = row.try_get("", "subject_guid")?;
            edges.push(SnapshotEdge {
                object: relation.object,
                object_guid: Guid::from_uuid_str(&object_guid_raw)?,
                predicate: relation.predicate,
                subject: relation.subject,
                subject_guid: Guid::from_uuid_str(&subject_guid_raw)?,
                position: relation.position,
            });
        }
        Ok(EdgeSnapshot::new(edges))
    }

    /// Update one ownership column across a subtree. Only descendants whose
    /// value still equals the pre-change value are touched, so re-running the
    /// cascade is idempotent and re-pointed descendants stay untouched.
    async fn cascade_ownership<C: ConnectionTrait>(
        &self,
        conn: &C,
        root: Guid,
        column: AgoraContainers,
        old: Option<Guid>,
        new: Option<Guid>,
    ) -> AgoraResult<()> {
        let snapshot = self
            .edge_snapshot_with(conn, &Predicate::HIERARCHICAL)
            .await?;
        let descendants = snapshot.descendants_of(root);
        if descendants.is_empty() {
            return Ok(());
        }
        let mut update = Query::update()
            .table(AgoraContainers::Table)
            .value(column, opt_guid_value(new))
            .and_where(
                Expr::col(AgoraContainers::Guid)
                    .is_in(descendants.iter().map(|guid| guid.to_uuid_string())),
            )
            .to_owned();
        match old {
            Some(old) => {
                update.and_where(Expr::col(column).eq(old.to_uuid_string()));
            }
            None => {
                update.and_where(Expr::col(column).is_null());
            }
        }
        exec(conn, &update).await?;
        for descendant in descendants {
            self.enqueue_index_event(conn, IndexAction::Upsert, descendant)
                .await?;
        }
        Ok(())
    }

    async fn enqueue_index_event<C: ConnectionTrait>(
        &self,
        conn: &C,
        action: IndexAction,
        guid: Guid,
    ) -> AgoraResult<()> {
        let event = IndexEvent {
            action,
            guid,
            timestamp: Timestamp::now_micros(),
        };
        let insert = Query::insert()
            .into_table(AgoraIndexJobs::Table)
            .columns([
                AgoraIndexJobs::Action,
                AgoraIndexJobs::Guid,
                AgoraIndexJobs::EnqueuedAt,
                AgoraIndexJobs::Attempts,
                AgoraIndexJobs::Status,
            ])
            .values_panic([
                event.action.as_str().into(),
                guid_value(event.guid).into(),
                event.timestamp.as_i64().into(),
                0_i32.into(),
                JobStatus::Pending.as_i16().into(),
            ])
            .to_owned();
        exec(conn, &insert).await
    }

    async fn soft_delete_in_tx(&self, tx: &DatabaseTransaction, guid: Guid) -> AgoraResult<()> {
        let Some(current) = self.fetch_current_row(tx, guid).await? else {
            return Ok(());
        };
        self.flip_valid_currently(tx, guid).await?;
        let (tail_revision, _) = self
            .insert_revision_row(
                tx,
                guid,
                &current.realm,
                current.organization,
                current.organizational_unit,
                current.managed_by,
                &current.payload,
                false,
                true,
            )
            .await?;
        let users = self.fetch_users_of(tx, current.revision).await?;
        self.insert_users(tx, tail_revision, &users).await?;
        self.enqueue_index_event(tx, IndexAction::Delete, guid).await
    }

    fn base_list_select(&self, filter: &ContainerFilter, sort: SortMode) -> SelectStatement {
        let mut select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .cond_where(prepare_where(self.backend, filter, self.fts_language.as_deref()))
            .to_owned();
        self.apply_sort(&mut select, sort);
        select
    }

    fn apply_sort(&self, select: &mut SelectStatement, sort: SortMode) {
        match sort {
            SortMode::Alpha => {
                select
                    .order_by(
                        (AgoraContainers::Table, AgoraContainers::TitleSort),
                        Order::Asc,
                    )
                    .order_by((AgoraContainers::Table, AgoraContainers::Guid), Order::Asc);
            }
            SortMode::Modified => {
                select
                    .order_by(
                        (AgoraContainers::Table, AgoraContainers::ValidFrom),
                        Order::Desc,
                    )
                    .order_by((AgoraContainers::Table, AgoraContainers::Guid), Order::Asc);
            }
            SortMode::Priority => {
                select
                    .join(
                        JoinType::LeftJoin,
                        AgoraTaskPriorities::Table,
                        Expr::col((AgoraTaskPriorities::Table, AgoraTaskPriorities::Task))
                            .equals((AgoraContainers::Table, AgoraContainers::Guid)),
                    )
                    .order_by_with_nulls(
                        (AgoraTaskPriorities::Table, AgoraTaskPriorities::Priority),
                        Order::Asc,
                        NullOrdering::Last,
                    )
                    .order_by((AgoraContainers::Table, AgoraContainers::Guid), Order::Asc);
            }
        }
    }

    async fn run_container_select<C: ConnectionTrait>(
        &self,
        conn: &C,
        select: &SelectStatement,
    ) -> AgoraResult<Vec<Container>> {
        let rows = query_all(conn, select).await?;
        let mut containers = Vec::with_capacity(rows.len());
        for row in rows {
            containers.push(container_from_row(&row)?);
        }
        self.attach_users_and_relations(conn, &mut containers).await?;
        Ok(containers)
    }

    pub(crate) async fn lease_index_jobs(
        &self,
        limit: u32,
        now: Timestamp,
    ) -> AgoraResult<Vec<IndexJob>> {
        let select = Query::select()
            .columns([
                AgoraIndexJobs::JobId,
                AgoraIndexJobs::Action,
                AgoraIndexJobs::Guid,
                AgoraIndexJobs::EnqueuedAt,
                AgoraIndexJobs::Attempts,
                AgoraIndexJobs::NextRunAfter,
                AgoraIndexJobs::Status,
                AgoraIndexJobs::LastError,
            ])
            .from(AgoraIndexJobs::Table)
            .and_where(Expr::col(AgoraIndexJobs::Status).eq(JobStatus::Pending.as_i16()))
            .cond_where(
                sea_orm::sea_query::Cond::any()
                    .add(Expr::col(AgoraIndexJobs::NextRunAfter).is_null())
                    .add(Expr::col(AgoraIndexJobs::NextRunAfter).lte(now.as_i64())),
            )
            .order_by(AgoraIndexJobs::JobId, Order::Asc)
            .limit(limit as u64)
            .to_owned();
        let rows = query_all(&self.conn, &select).await?;
        rows.iter().map(index_job_from_row).collect()
    }

    pub(crate) async fn complete_index_jobs(&self, job_ids: &[i64]) -> AgoraResult<()> {
        if job_ids.is_empty() {
            return Ok(());
        }
        let delete = Query::delete()
            .from_table(AgoraIndexJobs::Table)
            .and_where(Expr::col(AgoraIndexJobs::JobId).is_in(job_ids.iter().copied()))
            .to_owned();
        exec(&self.conn, &delete).await
    }

    /// Bump attempts with exponential backoff; jobs at the receive-count
    /// threshold move to the dead-letter set with the last error recorded.
    pub(crate) async fn fail_index_jobs(
        &self,
        job_ids: &[i64],
        error: &str,
        config: &IndexingConfig,
        now: Timestamp,
    ) -> AgoraResult<()> {
        for job_id in job_ids {
            let select = Query::select()
                .column(AgoraIndexJobs::Attempts)
                .from(AgoraIndexJobs::Table)
                .and_where(Expr::col(AgoraIndexJobs::JobId).eq(*job_id))
                .to_owned();
            let Some(row) = query_one(&self.conn, &select).await? else {
                continue;
            };
            let attempts: i32 = row.try_get("", &col_name(AgoraIndexJobs::Attempts))?;
            let attempts = attempts + 1;
            let mut update = Query::update()
                .table(AgoraIndexJobs::Table)
                .value(AgoraIndexJobs::Attempts, attempts)
                .value(AgoraIndexJobs::LastError, error.to_string())
                .and_where(Expr::col(AgoraIndexJobs::JobId).eq(*job_id))
                .to_owned();
            if attempts >= config.max_attempts {
                update.value(AgoraIndexJobs::Status, JobStatus::DeadLetter.as_i16());
            } else {
                update.value(
                    AgoraIndexJobs::NextRunAfter,
                    now.as_i64() + backoff_micros(attempts, config),
                );
            }
            exec(&self.conn, &update).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerWriteApi for AgoraStore {
    async fn create(&self, container: NewContainer) -> AgoraResult<Container> {
        container.payload.validate()?;
        let tx = self.conn.begin().await?;

        // Organization-shaped containers take their guid from the external
        // group directory. The directory call precedes the local commit; a
        // directory failure aborts the create, a later local failure leaves
        // an orphaned remote group behind.
        let mut allocated: Option<Guid> = None;
        let (guid, organization) = match &container.payload {
            Payload::Organization(payload) => {
                let group = self.directory.allocate_group(&payload.name).await?;
                self.directory.update_access_settings(group).await?;
                allocated = Some(group);
                (group, group)
            }
            Payload::OrganizationalUnit(payload) => {
                let group = self.directory.allocate_group(&payload.name).await?;
                self.directory.update_access_settings(group).await?;
                allocated = Some(group);
                (group, container.organization)
            }
            _ => (Guid::new(), container.organization),
        };

        let result = self
            .create_in_tx(&tx, guid, organization, &container)
            .await;
        match result {
            Ok(created) => match tx.commit().await {
                Ok(()) => Ok(created),
                Err(err) => {
                    if let Some(group) = allocated {
                        log::warn!("create commit failed; remote group {group} is orphaned: {err}");
                    }
                    Err(err.into())
                }
            },
            Err(err) => {
                if let Some(group) = allocated {
                    log::warn!("create failed; remote group {group} is orphaned: {err}");
                }
                Err(err)
            }
        }
    }

    async fn update(&self, container: ModifiedContainer) -> AgoraResult<Container> {
        container.payload.validate()?;
        let tx = self.conn.begin().await?;
        let previous = self
            .fetch_current_row(&tx, container.guid)
            .await?
            .ok_or_else(|| AgoraError::not_found(format!("container {}", container.guid)))?;
        if let Some(expected) = container.expected_revision {
            if expected != previous.revision {
                return Err(AgoraError::conflict(format!(
                    "container {} is at revision {}, expected {}",
                    container.guid, previous.revision, expected
                )));
            }
        }

        self.flip_valid_currently(&tx, container.guid).await?;
        let (revision, valid_from) = self
            .insert_revision_row(
                &tx,
                container.guid,
                &container.realm,
                container.organization,
                container.organizational_unit,
                container.managed_by,
                &container.payload,
                true,
                false,
            )
            .await?;
        self.insert_users(&tx, revision, &container.user).await?;
        let relations = resolve_new_relations(revision, &container.relation);
        self.insert_relation_rows(&tx, &relations).await?;
        self.forward_carry_relations(&tx, container.guid, revision)
            .await?;
        self.insert_facets(&tx, revision, &container.payload).await?;

        let kind = container.payload.kind();
        if kind.is_hierarchy_root() {
            if container.organizational_unit.is_some()
                && previous.organizational_unit != container.organizational_unit
            {
                self.cascade_ownership(
                    &tx,
                    container.guid,
                    AgoraContainers::OrganizationalUnit,
                    previous.organizational_unit,
                    container.organizational_unit,
                )
                .await?;
            }
            if previous.organization != container.organization {
                self.cascade_ownership(
                    &tx,
                    container.guid,
                    AgoraContainers::Organization,
                    Some(previous.organization),
                    Some(container.organization),
                )
                .await?;
            }
            if previous.managed_by != container.managed_by {
                self.cascade_ownership(
                    &tx,
                    container.guid,
                    AgoraContainers::ManagedBy,
                    Some(previous.managed_by),
                    Some(container.managed_by),
                )
                .await?;
            }
        } else if matches!(kind, PayloadType::Measure | PayloadType::SimpleMeasure)
            && previous.managed_by != container.managed_by
        {
            self.cascade_ownership(
                &tx,
                container.guid,
                AgoraContainers::ManagedBy,
                Some(previous.managed_by),
                Some(container.managed_by),
            )
            .await?;
        }

        self.enqueue_index_event(&tx, IndexAction::Upsert, container.guid)
            .await?;
        tx.commit().await?;
        Ok(Container {
            revision,
            guid: container.guid,
            realm: container.realm,
            organization: container.organization,
            organizational_unit: container.organizational_unit,
            managed_by: container.managed_by,
            payload: container.payload,
            valid_currently: true,
            deleted: false,
            valid_from,
            relation: relations,
            user: container.user,
        })
    }

    async fn delete(&self, container: &Container) -> AgoraResult<()> {
        let tx = self.conn.begin().await?;
        self.soft_delete_in_tx(&tx, container.guid).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_recursively(&self, container: &Container) -> AgoraResult<()> {
        let tx = self.conn.begin().await?;
        let snapshot = self
            .edge_snapshot_with(&tx, &Predicate::HIERARCHICAL)
            .await?;
        self.soft_delete_in_tx(&tx, container.guid).await?;
        for descendant in snapshot.descendants_of(container.guid) {
            self.soft_delete_in_tx(&tx, descendant).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl AgoraStore {
    async fn create_in_tx(
        &self,
        tx: &DatabaseTransaction,
        guid: Guid,
        organization: Guid,
        container: &NewContainer,
    ) -> AgoraResult<Container> {
        let (revision, valid_from) = self
            .insert_revision_row(
                tx,
                guid,
                &container.realm,
                organization,
                container.organizational_unit,
                container.managed_by,
                &container.payload,
                true,
                false,
            )
            .await?;
        self.insert_users(tx, revision, &container.user).await?;
        let relations = resolve_new_relations(revision, &container.relation);
        self.insert_relation_rows(tx, &relations).await?;
        self.shift_sibling_positions(tx, revision, &relations).await?;
        self.insert_facets(tx, revision, &container.payload).await?;
        self.enqueue_index_event(tx, IndexAction::Upsert, guid).await?;
        Ok(Container {
            revision,
            guid,
            realm: container.realm.clone(),
            organization,
            organizational_unit: container.organizational_unit,
            managed_by: container.managed_by,
            payload: container.payload.clone(),
            valid_currently: true,
            deleted: false,
            valid_from,
            relation: relations,
            user: container.user.clone(),
        })
    }
}

#[async_trait]
impl ContainerReadApi for AgoraStore {
    async fn get_by_guid(&self, guid: Guid) -> AgoraResult<Container> {
        let container = self
            .fetch_current_row(&self.conn, guid)
            .await?
            .ok_or_else(|| AgoraError::not_found(format!("container {guid}")))?;
        let mut containers = vec![container];
        self.attach_users_and_relations(&self.conn, &mut containers)
            .await?;
        Ok(containers.remove(0))
    }

    async fn get_for_user(&self, guid: Guid, user: &UserContext) -> AgoraResult<Container> {
        let container = self.get_by_guid(guid).await?;
        let ability = Ability::for_user(user);
        if !ability.can(Action::Read, &container) {
            return Err(AgoraError::not_found(format!("container {guid}")));
        }
        Ok(container)
    }

    async fn get_by_slug(&self, slug: &str) -> AgoraResult<Container> {
        let select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Slug)).eq(slug))
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently)).eq(true),
            )
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false))
            .limit(1)
            .to_owned();
        let row = query_one(&self.conn, &select)
            .await?
            .ok_or_else(|| AgoraError::not_found(format!("slug '{slug}'")))?;
        let mut containers = vec![container_from_row(&row)?];
        self.attach_users_and_relations(&self.conn, &mut containers)
            .await?;
        Ok(containers.remove(0))
    }

    async fn get_all_revisions_by_guid(&self, guid: Guid) -> AgoraResult<Vec<Container>> {
        let select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::Guid))
                    .eq(guid.to_uuid_string()),
            )
            .order_by(
                (AgoraContainers::Table, AgoraContainers::ValidFrom),
                Order::Asc,
            )
            .order_by(
                (AgoraContainers::Table, AgoraContainers::Revision),
                Order::Asc,
            )
            .to_owned();
        let rows = query_all(&self.conn, &select).await?;
        if rows.is_empty() {
            return Err(AgoraError::not_found(format!("container {guid}")));
        }
        let mut containers = Vec::with_capacity(rows.len());
        for row in rows {
            containers.push(container_from_row(&row)?);
        }
        self.attach_users_and_relations(&self.conn, &mut containers)
            .await?;
        Ok(containers)
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
        sort: SortMode,
        limit: Option<u64>,
    ) -> AgoraResult<Vec<Container>> {
        let mut select = self.base_list_select(filter, sort);
        if let Some(limit) = limit {
            select.limit(limit);
        }
        self.run_container_select(&self.conn, &select).await
    }

    async fn get_related_containers(
        &self,
        guid: Guid,
        predicates: &[Predicate],
        filter: &ContainerFilter,
        sort: SortMode,
    ) -> AgoraResult<Vec<Container>> {
        self.fetch_current_row(&self.conn, guid)
            .await?
            .ok_or_else(|| AgoraError::not_found(format!("container {guid}")))?;
        let snapshot = self.edge_snapshot_with(&self.conn, predicates).await?;
        let component = snapshot.connected_component(guid);
        if component.is_empty() {
            return Ok(Vec::new());
        }
        let mut select = self.base_list_select(filter, sort);
        select.and_where(
            Expr::col((AgoraContainers::Table, AgoraContainers::Guid))
                .is_in(component.iter().map(|guid| guid.to_uuid_string())),
        );
        self.run_container_select(&self.conn, &select).await
    }

    async fn fetch_by_guids(&self, guids: &[Guid], sort: SortMode) -> AgoraResult<Vec<Container>> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let mut select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::Guid))
                    .is_in(guids.iter().map(|guid| guid.to_uuid_string())),
            )
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently)).eq(true),
            )
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false))
            .to_owned();
        self.apply_sort(&mut select, sort);
        self.run_container_select(&self.conn, &select).await
    }

    async fn fetch_by_guids_ordered(&self, guids: &[Guid]) -> AgoraResult<Vec<Container>> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let select = Query::select()
            .columns(container_columns().map(|col| (AgoraContainers::Table, col)))
            .from(AgoraContainers::Table)
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::Guid))
                    .is_in(guids.iter().map(|guid| guid.to_uuid_string())),
            )
            .and_where(
                Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently)).eq(true),
            )
            .and_where(Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false))
            .to_owned();
        let containers = self.run_container_select(&self.conn, &select).await?;
        let mut by_guid: HashMap<Guid, Container> = containers
            .into_iter()
            .map(|container| (container.guid, container))
            .collect();
        Ok(guids
            .iter()
            .filter_map(|guid| by_guid.remove(guid))
            .collect())
    }
}

#[async_trait]
impl RelationApi for AgoraStore {
    async fn create_relations(&self, relations: &[Relation]) -> AgoraResult<()> {
        let tx = self.conn.begin().await?;
        self.insert_relation_rows(&tx, relations).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn reorder_relations(
        &self,
        object: Revision,
        predicate: Predicate,
        ordered: &[Relation],
    ) -> AgoraResult<()> {
        for relation in ordered {
            if relation.object != object || relation.predicate != predicate {
                return Err(AgoraError::validation(
                    "relation",
                    "all entries must share the reordered (object, predicate) group",
                ));
            }
        }
        let tx = self.conn.begin().await?;
        let select = Query::select()
            .column(AgoraContainerRelations::Subject)
            .from(AgoraContainerRelations::Table)
            .and_where(Expr::col(AgoraContainerRelations::Object).eq(object.as_i64()))
            .and_where(Expr::col(AgoraContainerRelations::Predicate).eq(predicate.as_str()))
            .to_owned();
        let rows = query_all(&tx, &select).await?;
        let mut existing: HashSet<i64> = HashSet::new();
        for row in rows {
            existing.insert(row.try_get("", &col_name(AgoraContainerRelations::Subject))?);
        }
        let submitted: HashSet<i64> = ordered
            .iter()
            .map(|relation| relation.subject.as_i64())
            .collect();
        if existing != submitted {
            return Err(AgoraError::validation(
                "relation",
                "the complete (object, predicate) group must be supplied",
            ));
        }
        for (position, relation) in ordered.iter().enumerate() {
            let update = Query::update()
                .table(AgoraContainerRelations::Table)
                .value(AgoraContainerRelations::Position, position as i64)
                .and_where(Expr::col(AgoraContainerRelations::Object).eq(object.as_i64()))
                .and_where(
                    Expr::col(AgoraContainerRelations::Predicate).eq(predicate.as_str()),
                )
                .and_where(
                    Expr::col(AgoraContainerRelations::Subject).eq(relation.subject.as_i64()),
                )
                .to_owned();
            exec(&tx, &update).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_direct_relations(&self, guid: Guid) -> AgoraResult<Vec<Relation>> {
        let container = self
            .fetch_current_row(&self.conn, guid)
            .await?
            .ok_or_else(|| AgoraError::not_found(format!("container {guid}")))?;
        let mut containers = vec![container];
        self.attach_users_and_relations(&self.conn, &mut containers)
            .await?;
        Ok(containers.remove(0).relation)
    }

    async fn edge_snapshot(&self, predicates: &[Predicate]) -> AgoraResult<EdgeSnapshot> {
        self.edge_snapshot_with(&self.conn, predicates).await
    }
}

#[async_trait]
impl AccessControlApi for AgoraStore {
    async fn load_user_context(&self, user: Guid, roles: Vec<String>) -> AgoraResult<UserContext> {
        let select = Query::select()
            .column((AgoraContainerUsers::Table, AgoraContainerUsers::Predicate))
            .expr_as(
                Expr::col((AgoraContainers::Table, AgoraContainers::Guid)),
                Alias::new("container_guid"),
            )
            .from(AgoraContainerUsers::Table)
            .join(
                JoinType::InnerJoin,
                AgoraContainers::Table,
                Expr::col((AgoraContainers::Table, AgoraContainers::Revision))
                    .equals((AgoraContainerUsers::Table, AgoraContainerUsers::Object))
                    .and(
                        Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently))
                            .eq(true),
                    )
                    .and(
                        Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false),
                    ),
            )
            .and_where(
                Expr::col((AgoraContainerUsers::Table, AgoraContainerUsers::Subject))
                    .eq(user.to_uuid_string()),
            )
            .and_where(
                Expr::col((AgoraContainerUsers::Table, AgoraContainerUsers::Predicate)).is_in(
                    Predicate::ACCESS_CONTROL
                        .iter()
                        .map(|predicate| predicate.as_str()),
                ),
            )
            .to_owned();
        let mut context = UserContext {
            is_authenticated: true,
            guid: Some(user),
            roles,
            ..UserContext::default()
        };
        for row in query_all(&self.conn, &select).await? {
            let predicate_raw: String =
                row.try_get("", &col_name(AgoraContainerUsers::Predicate))?;
            let container_raw: String = row.try_get("", "container_guid")?;
            let container = Guid::from_uuid_str(&container_raw)?;
            let target = match Predicate::parse(&predicate_raw)? {
                Predicate::IsAdminOf => &mut context.admin_of,
                Predicate::IsCollaboratorOf => &mut context.collaborator_of,
                Predicate::IsHeadOf => &mut context.head_of,
                Predicate::IsMemberOf => &mut context.member_of,
                _ => continue,
            };
            if !target.contains(&container) {
                target.push(container);
            }
        }
        Ok(context)
    }
}

#[async_trait]
impl TaskPriorityApi for AgoraStore {
    async fn upsert_task_priorities(&self, priorities: &[TaskPriority]) -> AgoraResult<()> {
        let tx = self.conn.begin().await?;
        for priority in priorities {
            let insert = Query::insert()
                .into_table(AgoraTaskPriorities::Table)
                .columns([AgoraTaskPriorities::Task, AgoraTaskPriorities::Priority])
                .values_panic([
                    guid_value(priority.task).into(),
                    priority.priority.into(),
                ])
                .on_conflict(
                    OnConflict::column(AgoraTaskPriorities::Task)
                        .update_columns([AgoraTaskPriorities::Priority])
                        .to_owned(),
                )
                .to_owned();
            exec(&tx, &insert).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn task_priorities(&self, tasks: &[Guid]) -> AgoraResult<HashMap<Guid, i64>> {
        if tasks.is_empty() {
            return Ok(HashMap::new());
        }
        let select = Query::select()
            .columns([AgoraTaskPriorities::Task, AgoraTaskPriorities::Priority])
            .from(AgoraTaskPriorities::Table)
            .and_where(
                Expr::col(AgoraTaskPriorities::Task)
                    .is_in(tasks.iter().map(|task| task.to_uuid_string())),
            )
            .to_owned();
        let mut priorities = HashMap::new();
        for row in query_all(&self.conn, &select).await? {
            let task = read_guid(&row, AgoraTaskPriorities::Task)?;
            let priority: i64 = row.try_get("", &col_name(AgoraTaskPriorities::Priority))?;
            priorities.insert(task, priority);
        }
        Ok(priorities)
    }
}

#[async_trait]
impl IndexQueueApi for AgoraStore {
    async fn list_index_jobs(
        &self,
        status: Option<JobStatus>,
        limit: u32,
    ) -> AgoraResult<Vec<IndexJob>> {
        let mut select = Query::select()
            .columns([
                AgoraIndexJobs::JobId,
                AgoraIndexJobs::Action,
                AgoraIndexJobs::Guid,
                AgoraIndexJobs::EnqueuedAt,
                AgoraIndexJobs::Attempts,
                AgoraIndexJobs::NextRunAfter,
                AgoraIndexJobs::Status,
                AgoraIndexJobs::LastError,
            ])
            .from(AgoraIndexJobs::Table)
            .order_by(AgoraIndexJobs::JobId, Order::Asc)
            .limit(limit as u64)
            .to_owned();
        if let Some(status) = status {
            select.and_where(Expr::col(AgoraIndexJobs::Status).eq(status.as_i16()));
        }
        let rows = query_all(&self.conn, &select).await?;
        rows.iter().map(index_job_from_row).collect()
    }

    async fn list_dead_letter_jobs(&self, limit: u32) -> AgoraResult<Vec<IndexJob>> {
        self.list_index_jobs(Some(JobStatus::DeadLetter), limit).await
    }
}
