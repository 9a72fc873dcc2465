use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use agora::{
    AgoraResult, AgoraStore, Container, ContainerReadApi, ContainerWriteApi, GoalPayload,
    GroupDirectory, Guid, ModifiedContainer, NewContainer, NewRelation, OrganizationPayload,
    Payload, Predicate, ProgramPayload, RelationApi, UserContext, UserRelation, Visibility,
};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, Statement};
use tempfile::tempdir;

fn goal_payload(title: &str, visibility: Visibility) -> Payload {
    Payload::Goal(GoalPayload {
        title: title.to_string(),
        description: None,
        goal_type: None,
        category: Vec::new(),
        topic: Vec::new(),
        policy_field: Vec::new(),
        fulfillment_date: None,
        custom_categories: BTreeMap::new(),
        template: false,
        visibility,
    })
}

fn program_payload(title: &str) -> Payload {
    Payload::Program(ProgramPayload {
        title: title.to_string(),
        description: None,
        slug: None,
        program_type: Vec::new(),
        audience: Vec::new(),
        category: Vec::new(),
        topic: Vec::new(),
        policy_field: Vec::new(),
        level: None,
        custom_categories: BTreeMap::new(),
        template: false,
        visibility: Visibility::Public,
    })
}

fn new_container(organization: Guid, payload: Payload) -> NewContainer {
    NewContainer {
        realm: "test".to_string(),
        organization,
        organizational_unit: None,
        managed_by: organization,
        payload,
        user: Vec::new(),
        relation: Vec::new(),
    }
}

fn modified(container: &Container, payload: Payload) -> ModifiedContainer {
    ModifiedContainer {
        guid: container.guid,
        realm: container.realm.clone(),
        organization: container.organization,
        organizational_unit: container.organizational_unit,
        managed_by: container.managed_by,
        payload,
        user: container.user.clone(),
        relation: Vec::new(),
        expected_revision: None,
    }
}

#[tokio::test]
async fn updates_append_revisions_and_keep_one_current() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let created = store
        .create(new_container(
            organization,
            goal_payload("Reduce emissions", Visibility::Public),
        ))
        .await?;
    let second = store
        .update(modified(
            &created,
            goal_payload("Reduce emissions by 2030", Visibility::Public),
        ))
        .await?;
    let third = store
        .update(modified(
            &second,
            goal_payload("Reduce emissions by 2035", Visibility::Public),
        ))
        .await?;

    assert!(created.revision < second.revision);
    assert!(second.revision < third.revision);

    let revisions = store.get_all_revisions_by_guid(created.guid).await?;
    assert_eq!(revisions.len(), 3);
    let current: Vec<_> = revisions.iter().filter(|r| r.valid_currently).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].revision, third.revision);
    assert_eq!(current[0].payload.title(), "Reduce emissions by 2035");
    Ok(())
}

#[tokio::test]
async fn stale_expected_revision_is_a_conflict() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let created = store
        .create(new_container(
            organization,
            goal_payload("Expand cycling network", Visibility::Public),
        ))
        .await?;
    let mut update = modified(
        &created,
        goal_payload("Expand cycling network fast", Visibility::Public),
    );
    update.expected_revision = Some(created.revision);
    let second = store.update(update).await?;

    let mut stale = modified(
        &second,
        goal_payload("Expand cycling network faster", Visibility::Public),
    );
    stale.expected_revision = Some(created.revision);
    let err = store.update(stale).await.unwrap_err();
    assert!(matches!(err, agora::AgoraError::Conflict { .. }));

    let current = store.get_by_guid(created.guid).await?;
    assert_eq!(current.revision, second.revision);
    Ok(())
}

#[tokio::test]
async fn soft_delete_hides_the_container_but_keeps_history() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let created = store
        .create(new_container(
            organization,
            goal_payload("Interim concept", Visibility::Public),
        ))
        .await?;
    store.delete(&created).await?;

    let err = store.get_by_guid(created.guid).await.unwrap_err();
    assert!(matches!(err, agora::AgoraError::NotFound { .. }));

    let revisions = store.get_all_revisions_by_guid(created.guid).await?;
    assert_eq!(revisions.len(), 2);
    let tail = revisions.last().expect("tail row");
    assert!(tail.deleted);
    assert!(!tail.valid_currently);
    assert!(revisions.iter().all(|r| !r.valid_currently));
    Ok(())
}

#[tokio::test]
async fn recursive_delete_covers_the_subtree() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Climate program")))
        .await?;
    let mut goal = new_container(
        organization,
        goal_payload("Lower district heat demand", Visibility::Public),
    );
    goal.relation.push(NewRelation {
        object: Some(program.revision),
        predicate: Predicate::IsPartOfProgram,
        subject: None,
        position: 0,
    });
    let goal = store.create(goal).await?;
    let mut leaf = new_container(
        organization,
        goal_payload("Insulate schools", Visibility::Public),
    );
    leaf.relation.push(NewRelation {
        object: Some(goal.revision),
        predicate: Predicate::IsPartOf,
        subject: None,
        position: 0,
    });
    let leaf = store.create(leaf).await?;

    store.delete_recursively(&program).await?;

    for guid in [program.guid, goal.guid, leaf.guid] {
        let err = store.get_by_guid(guid).await.unwrap_err();
        assert!(matches!(err, agora::AgoraError::NotFound { .. }));
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_submitted_relations_collapse_into_one_edge() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Mobility program")))
        .await?;
    let mut goal = new_container(
        organization,
        goal_payload("More bus lanes", Visibility::Public),
    );
    for _ in 0..2 {
        goal.relation.push(NewRelation {
            object: Some(program.revision),
            predicate: Predicate::IsPartOfProgram,
            subject: None,
            position: 0,
        });
    }
    let goal = store.create(goal).await?;
    let relations = store.get_direct_relations(goal.guid).await?;
    assert_eq!(relations.len(), 1);
    Ok(())
}

#[derive(Default)]
struct RecordingDirectory {
    allocated: Mutex<Vec<Guid>>,
}

#[async_trait]
impl GroupDirectory for RecordingDirectory {
    async fn allocate_group(&self, _name: &str) -> AgoraResult<Guid> {
        let guid = Guid::new();
        self.allocated.lock().expect("lock").push(guid);
        Ok(guid)
    }

    async fn update_access_settings(&self, _group: Guid) -> AgoraResult<()> {
        Ok(())
    }
}

struct FailingDirectory;

#[async_trait]
impl GroupDirectory for FailingDirectory {
    async fn allocate_group(&self, _name: &str) -> AgoraResult<Guid> {
        Err(agora::AgoraError::directory("group service unavailable"))
    }

    async fn update_access_settings(&self, _group: Guid) -> AgoraResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn organization_takes_its_guid_from_the_directory() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let directory = Arc::new(RecordingDirectory::default());
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite"))
        .await?
        .with_directory(directory.clone());

    let creator = Guid::new();
    let organization = store
        .create(NewContainer {
            realm: "test".to_string(),
            organization: Guid::new(),
            organizational_unit: None,
            managed_by: Guid::new(),
            payload: Payload::Organization(OrganizationPayload {
                name: "Stadt Musterstadt".to_string(),
                description: None,
                slug: Some("musterstadt".to_string()),
                default: false,
                visibility: Visibility::Public,
            }),
            user: vec![UserRelation {
                predicate: Predicate::IsCreatorOf,
                subject: creator,
            }],
            relation: Vec::new(),
        })
        .await?;

    let allocated = directory.allocated.lock().expect("lock").clone();
    assert_eq!(allocated, vec![organization.guid]);
    assert_eq!(organization.organization, organization.guid);

    let by_slug = store.get_by_slug("musterstadt").await?;
    assert_eq!(by_slug.guid, organization.guid);
    assert!(by_slug
        .user
        .iter()
        .any(|u| u.predicate == Predicate::IsCreatorOf && u.subject == creator));
    Ok(())
}

#[tokio::test]
async fn directory_failure_aborts_the_create() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite"))
        .await?
        .with_directory(Arc::new(FailingDirectory));

    let err = store
        .create(NewContainer {
            realm: "test".to_string(),
            organization: Guid::new(),
            organizational_unit: None,
            managed_by: Guid::new(),
            payload: Payload::Organization(OrganizationPayload {
                name: "Stadt Fehlschlag".to_string(),
                description: None,
                slug: None,
                default: false,
                visibility: Visibility::Public,
            }),
            user: Vec::new(),
            relation: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, agora::AgoraError::Directory { .. }));

    let backend = store.connection().get_database_backend();
    let rows = store
        .connection()
        .query_all(Statement::from_string(
            backend,
            "SELECT revision FROM agora_containers".to_string(),
        ))
        .await
        .expect("query");
    assert!(rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn denied_lookup_collapses_into_not_found() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let hidden = store
        .create(new_container(
            organization,
            goal_payload("Internal draft", Visibility::Organization),
        ))
        .await?;
    let err = store
        .get_for_user(hidden.guid, &UserContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, agora::AgoraError::NotFound { .. }));
    Ok(())
}
