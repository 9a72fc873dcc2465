use std::collections::BTreeMap;

use agora::{
    AgoraResult, AgoraStore, Container, ContainerFilter, ContainerReadApi, ContainerWriteApi,
    GoalPayload, Guid, ModifiedContainer, NewContainer, NewRelation, Payload, Predicate,
    ProgramPayload, Relation, RelationApi, SortMode, Visibility,
};
use tempfile::tempdir;

fn goal_payload(title: &str) -> Payload {
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
        visibility: Visibility::Public,
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

async fn create_child_of(
    store: &AgoraStore,
    organization: Guid,
    parent: &Container,
    title: &str,
    position: i64,
) -> AgoraResult<Container> {
    let mut child = new_container(organization, goal_payload(title));
    child.relation.push(NewRelation {
        object: Some(parent.revision),
        predicate: Predicate::IsPartOfProgram,
        subject: None,
        position,
    });
    store.create(child).await
}

#[tokio::test]
async fn related_containers_survive_revisioning() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Smart city")))
        .await?;
    let goal = create_child_of(&store, organization, &program, "Open data portal", 0).await?;

    let filter = ContainerFilter {
        organizations: vec![organization],
        ..ContainerFilter::default()
    };
    let related = store
        .get_related_containers(
            program.guid,
            &Predicate::HIERARCHICAL,
            &filter,
            SortMode::Alpha,
        )
        .await?;
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].revision, goal.revision);

    // Updating the goal yields a new revision; the edge must follow it.
    let updated = store
        .update(ModifiedContainer {
            guid: goal.guid,
            realm: goal.realm.clone(),
            organization: goal.organization,
            organizational_unit: goal.organizational_unit,
            managed_by: goal.managed_by,
            payload: goal_payload("Open data portal v2"),
            user: Vec::new(),
            relation: vec![NewRelation {
                object: Some(program.revision),
                predicate: Predicate::IsPartOfProgram,
                subject: None,
                position: 0,
            }],
            expected_revision: None,
        })
        .await?;

    let related = store
        .get_related_containers(
            program.guid,
            &Predicate::HIERARCHICAL,
            &filter,
            SortMode::Alpha,
        )
        .await?;
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].revision, updated.revision);
    assert!(related[0]
        .relation
        .iter()
        .any(|r| r.subject == updated.revision && r.object == program.revision));
    Ok(())
}

#[tokio::test]
async fn inbound_edges_are_forward_carried_on_update() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Energy transition")))
        .await?;
    let goal = create_child_of(&store, organization, &program, "District heating", 0).await?;

    // Update the parent; the goal's inbound edge must reference the new
    // program revision afterwards.
    let updated_program = store
        .update(ModifiedContainer {
            guid: program.guid,
            realm: program.realm.clone(),
            organization: program.organization,
            organizational_unit: program.organizational_unit,
            managed_by: program.managed_by,
            payload: program_payload("Energy transition 2.0"),
            user: Vec::new(),
            relation: Vec::new(),
            expected_revision: None,
        })
        .await?;

    let relations = store.get_direct_relations(program.guid).await?;
    assert!(relations
        .iter()
        .any(|r| r.object == updated_program.revision && r.subject == goal.revision));
    assert!(!relations.iter().any(|r| r.object == program.revision));
    Ok(())
}

#[tokio::test]
async fn reorder_rewrites_every_position() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Chapter order")))
        .await?;
    let r0 = create_child_of(&store, organization, &program, "Intro", 0).await?;
    let r1 = create_child_of(&store, organization, &program, "Goals", 1).await?;
    let r2 = create_child_of(&store, organization, &program, "Measures", 2).await?;

    let ordered: Vec<Relation> = [&r1, &r2, &r0]
        .iter()
        .map(|child| Relation {
            object: program.revision,
            predicate: Predicate::IsPartOfProgram,
            subject: child.revision,
            position: 0,
        })
        .collect();
    store
        .reorder_relations(program.revision, Predicate::IsPartOfProgram, &ordered)
        .await?;

    let mut relations = store.get_direct_relations(program.guid).await?;
    relations.sort_by_key(|r| r.position);
    let subjects: Vec<_> = relations.iter().map(|r| r.subject).collect();
    assert_eq!(subjects, vec![r1.revision, r2.revision, r0.revision]);
    let positions: Vec<_> = relations.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    Ok(())
}

#[tokio::test]
async fn partial_reorders_are_rejected() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Partial order")))
        .await?;
    let first = create_child_of(&store, organization, &program, "First", 0).await?;
    let _second = create_child_of(&store, organization, &program, "Second", 1).await?;

    let err = store
        .reorder_relations(
            program.revision,
            Predicate::IsPartOfProgram,
            &[Relation {
                object: program.revision,
                predicate: Predicate::IsPartOfProgram,
                subject: first.revision,
                position: 0,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, agora::AgoraError::Validation { .. }));
    Ok(())
}

#[tokio::test]
async fn inserting_a_chapter_shifts_later_siblings() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let organization = Guid::new();

    let program = store
        .create(new_container(organization, program_payload("Shifting")))
        .await?;
    let first = create_child_of(&store, organization, &program, "First", 0).await?;
    let second = create_child_of(&store, organization, &program, "Second", 1).await?;
    // Insert at the head of the group; existing chapters move down.
    let inserted = create_child_of(&store, organization, &program, "Preface", 0).await?;

    let mut relations = store.get_direct_relations(program.guid).await?;
    relations.sort_by_key(|r| r.position);
    let subjects: Vec<_> = relations.iter().map(|r| r.subject).collect();
    assert_eq!(
        subjects,
        vec![inserted.revision, first.revision, second.revision]
    );
    Ok(())
}
