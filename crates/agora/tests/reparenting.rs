use std::collections::BTreeMap;

use agora::{
    AgoraResult, AgoraStore, Container, ContainerReadApi, ContainerWriteApi, GoalPayload, Guid,
    ModifiedContainer, NewContainer, NewRelation, Payload, Predicate, ProgramPayload, Visibility,
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

fn reparented(container: &Container, organization: Guid) -> ModifiedContainer {
    ModifiedContainer {
        guid: container.guid,
        realm: container.realm.clone(),
        organization,
        organizational_unit: container.organizational_unit,
        managed_by: container.managed_by,
        payload: container.payload.clone(),
        user: Vec::new(),
        relation: Vec::new(),
        expected_revision: None,
    }
}

async fn seeded_tree(
    store: &AgoraStore,
    org_a: Guid,
    org_c: Guid,
) -> AgoraResult<(Container, Container, Container)> {
    let program = store
        .create(new_container(org_a, program_payload("Digital services")))
        .await?;
    let mut child = new_container(org_a, goal_payload("Online permits"));
    child.relation.push(NewRelation {
        object: Some(program.revision),
        predicate: Predicate::IsPartOfProgram,
        subject: None,
        position: 0,
    });
    let child = store.create(child).await?;
    // This descendant was already re-pointed to a different organization.
    let mut foreign = new_container(org_c, goal_payload("Shared infrastructure"));
    foreign.relation.push(NewRelation {
        object: Some(program.revision),
        predicate: Predicate::IsPartOfProgram,
        subject: None,
        position: 1,
    });
    let foreign = store.create(foreign).await?;
    Ok((program, child, foreign))
}

#[tokio::test]
async fn changing_a_program_organization_cascades_to_matching_descendants() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let org_a = Guid::new();
    let org_b = Guid::new();
    let org_c = Guid::new();
    let (program, child, foreign) = seeded_tree(&store, org_a, org_c).await?;

    store.update(reparented(&program, org_b)).await?;

    let child_now = store.get_by_guid(child.guid).await?;
    assert_eq!(child_now.organization, org_b);
    // A descendant someone already re-pointed keeps its own organization.
    let foreign_now = store.get_by_guid(foreign.guid).await?;
    assert_eq!(foreign_now.organization, org_c);
    Ok(())
}

#[tokio::test]
async fn rerunning_the_cascade_is_idempotent() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let org_a = Guid::new();
    let org_b = Guid::new();
    let org_c = Guid::new();
    let (program, child, foreign) = seeded_tree(&store, org_a, org_c).await?;

    let updated = store.update(reparented(&program, org_b)).await?;
    let after_first: Vec<Guid> = [
        store.get_by_guid(child.guid).await?.organization,
        store.get_by_guid(foreign.guid).await?.organization,
    ]
    .to_vec();

    // The second run finds no descendant still holding the pre-change value;
    // the assignment is unchanged.
    store.update(reparented(&updated, org_b)).await?;
    let after_second: Vec<Guid> = [
        store.get_by_guid(child.guid).await?.organization,
        store.get_by_guid(foreign.guid).await?.organization,
    ]
    .to_vec();
    assert_eq!(after_first, after_second);
    assert_eq!(after_first, vec![org_b, org_c]);
    Ok(())
}

#[tokio::test]
async fn goal_updates_do_not_cascade_ownership() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = AgoraStore::connect_sqlite(&dir.path().join("agora.sqlite")).await?;
    let org_a = Guid::new();
    let org_b = Guid::new();

    let parent = store
        .create(new_container(org_a, goal_payload("Parent goal")))
        .await?;
    let mut child = new_container(org_a, goal_payload("Child task area"));
    child.relation.push(NewRelation {
        object: Some(parent.revision),
        predicate: Predicate::IsPartOf,
        subject: None,
        position: 0,
    });
    let child = store.create(child).await?;

    store.update(reparented(&parent, org_b)).await?;
    let child_now = store.get_by_guid(child.guid).await?;
    assert_eq!(child_now.organization, org_a);
    Ok(())
}
