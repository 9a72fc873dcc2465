use sea_orm_migration::prelude::*;

use crate::db::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AgoraContainers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraContainers::Revision)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AgoraContainers::Guid).string().not_null())
                    .col(ColumnDef::new(AgoraContainers::Realm).string().not_null())
                    .col(
                        ColumnDef::new(AgoraContainers::Organization)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AgoraContainers::OrganizationalUnit).string())
                    .col(
                        ColumnDef::new(AgoraContainers::ManagedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AgoraContainers::Payload).text().not_null())
                    .col(
                        ColumnDef::new(AgoraContainers::PayloadType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainers::TitleSort)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainers::SearchNorm)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AgoraContainers::Slug).string())
                    .col(
                        ColumnDef::new(AgoraContainers::Template)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainers::ValidCurrently)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainers::Deleted)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainers::ValidFrom)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_containers_guid")
                    .table(AgoraContainers::Table)
                    .col(AgoraContainers::Guid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_containers_guid_current")
                    .table(AgoraContainers::Table)
                    .col(AgoraContainers::Guid)
                    .col(AgoraContainers::ValidCurrently)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_containers_type")
                    .table(AgoraContainers::Table)
                    .col(AgoraContainers::PayloadType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_containers_organization")
                    .table(AgoraContainers::Table)
                    .col(AgoraContainers::Organization)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_containers_slug")
                    .table(AgoraContainers::Table)
                    .col(AgoraContainers::Slug)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgoraContainerRelations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraContainerRelations::Object)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerRelations::Predicate)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerRelations::Subject)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerRelations::Position)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_agora_container_relations")
                            .col(AgoraContainerRelations::Object)
                            .col(AgoraContainerRelations::Predicate)
                            .col(AgoraContainerRelations::Subject),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_container_relations_subject")
                    .table(AgoraContainerRelations::Table)
                    .col(AgoraContainerRelations::Subject)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgoraContainerUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraContainerUsers::Object)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerUsers::Predicate)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerUsers::Subject)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_agora_container_users")
                            .col(AgoraContainerUsers::Object)
                            .col(AgoraContainerUsers::Predicate)
                            .col(AgoraContainerUsers::Subject),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_container_users_subject")
                    .table(AgoraContainerUsers::Table)
                    .col(AgoraContainerUsers::Subject)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgoraContainerFacets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraContainerFacets::Revision)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerFacets::Dimension)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraContainerFacets::Value)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_agora_container_facets")
                            .col(AgoraContainerFacets::Revision)
                            .col(AgoraContainerFacets::Dimension)
                            .col(AgoraContainerFacets::Value),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgoraTaskPriorities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraTaskPriorities::Task)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AgoraTaskPriorities::Priority)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AgoraIndexJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgoraIndexJobs::JobId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AgoraIndexJobs::Action).string().not_null())
                    .col(ColumnDef::new(AgoraIndexJobs::Guid).string().not_null())
                    .col(
                        ColumnDef::new(AgoraIndexJobs::EnqueuedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgoraIndexJobs::Attempts)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AgoraIndexJobs::NextRunAfter).big_integer())
                    .col(
                        ColumnDef::new(AgoraIndexJobs::Status)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AgoraIndexJobs::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agora_index_jobs_status")
                    .table(AgoraIndexJobs::Table)
                    .col(AgoraIndexJobs::Status)
                    .col(AgoraIndexJobs::NextRunAfter)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AgoraIndexJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AgoraTaskPriorities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AgoraContainerFacets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AgoraContainerUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(AgoraContainerRelations::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(AgoraContainers::Table).to_owned())
            .await?;
        Ok(())
    }
}
