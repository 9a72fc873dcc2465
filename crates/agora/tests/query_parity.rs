use std::collections::BTreeMap;

use agora::{
    AgoraResult, AgoraStore, ContainerFilter, ContainerWriteApi, FacetDimension, FacetStrategy,
    GoalPayload, Guid, IndexWorker, IndexingConfig, MeasurePayload, NewContainer, Payload,
    QueryBackend, QueryEngine, SearchIndex, SortMode, TaskPayload, TaskPriority, TaskPriorityApi,
    TextPayload, Visibility,
};
use tempfile::tempdir;

struct Fixture {
    store: AgoraStore,
    index: SearchIndex,
    organization: Guid,
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

fn goal(title: &str, topics: &[&str], custom_district: Option<&str>, template: bool) -> Payload {
    let mut custom_categories = BTreeMap::new();
    if let Some(district) = custom_district {
        custom_categories.insert("district".to_string(), vec![district.to_string()]);
    }
    Payload::Goal(GoalPayload {
        title: title.to_string(),
        description: None,
        goal_type: None,
        category: vec!["sdg.11".to_string()],
        topic: topics.iter().map(|t| t.to_string()).collect(),
        policy_field: Vec::new(),
        fulfillment_date: None,
        custom_categories,
        template,
        visibility: Visibility::Public,
    })
}

fn measure(title: &str, topics: &[&str]) -> Payload {
    Payload::Measure(MeasurePayload {
        title: title.to_string(),
        description: Some("Ausbau der Infrastruktur".to_string()),
        summary: None,
        measure_type: vec!["measure_type.planning".to_string()],
        audience: Vec::new(),
        category: Vec::new(),
        topic: topics.iter().map(|t| t.to_string()).collect(),
        status: None,
        start_date: None,
        end_date: None,
        custom_categories: BTreeMap::new(),
        template: false,
        visibility: Visibility::Public,
    })
}

fn task(title: &str, assignee: Option<Guid>) -> Payload {
    Payload::Task(TaskPayload {
        title: title.to_string(),
        description: None,
        task_category: vec!["task_category.default".to_string()],
        task_status: None,
        assignee: assignee.into_iter().collect(),
        fulfillment_date: None,
        custom_categories: BTreeMap::new(),
        template: false,
        visibility: Visibility::Public,
    })
}

async fn seeded_fixture(base: &std::path::Path) -> AgoraResult<(Fixture, Vec<Guid>, Guid)> {
    let config = agora::AgoraConfig::default_sqlite(
        base.join("agora.sqlite").to_string_lossy(),
    );
    let store = AgoraStore::connect(&config, base).await?;
    let index = SearchIndex::open_or_create(
        &config.search_path(base),
        config.search.language.as_deref(),
    )?;
    let organization = Guid::new();
    let assignee = Guid::new();

    let seeds = vec![
        goal("Klimaanpassung", &["topic.resilience"], Some("north"), false),
        goal("Vorlage Leitbild", &[], None, true),
        measure("Radwege ausbauen", &["topic.mobility"]),
        task("Zebrastreifen markieren", Some(assignee)),
        Payload::Text(TextPayload {
            title: "Begrünung".to_string(),
            body: Some("Mehr Stadtgrün für alle".to_string()),
            template: false,
            visibility: Visibility::Public,
        }),
    ];
    let mut guids = Vec::new();
    for payload in seeds {
        let created = store.create(new_container(organization, payload)).await?;
        guids.push(created.guid);
    }

    let worker = IndexWorker::new(store.clone(), index.clone(), IndexingConfig::default());
    worker.run_until_idle().await?;

    Ok((
        Fixture {
            store,
            index,
            organization,
        },
        guids,
        assignee,
    ))
}

async fn assert_parity(
    fixture: &Fixture,
    filter: &ContainerFilter,
    sort: SortMode,
    limit: Option<u64>,
) -> AgoraResult<Vec<Guid>> {
    let engine = QueryEngine::new(&fixture.store, &fixture.index);
    let relational: Vec<Guid> = engine
        .list(QueryBackend::Relational, filter, sort, limit)
        .await?
        .into_iter()
        .map(|container| container.guid)
        .collect();
    let indexed: Vec<Guid> = engine
        .list(QueryBackend::SearchIndex, filter, sort, limit)
        .await?
        .into_iter()
        .map(|container| container.guid)
        .collect();
    assert_eq!(
        relational, indexed,
        "backends disagree for {filter:?} sort {sort:?} limit {limit:?}"
    );
    Ok(relational)
}

#[tokio::test]
async fn backends_agree_on_ordered_guid_lists() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let (fixture, _guids, assignee) = seeded_fixture(dir.path()).await?;

    let base = ContainerFilter {
        organizations: vec![fixture.organization],
        ..ContainerFilter::default()
    };

    for sort in [SortMode::Alpha, SortMode::Modified] {
        for limit in [None, Some(2)] {
            assert_parity(&fixture, &base, sort, limit).await?;
        }
    }

    let mut topics = base.clone();
    topics.topics = vec!["topic.mobility".to_string()];
    let matched = assert_parity(&fixture, &topics, SortMode::Alpha, None).await?;
    assert_eq!(matched.len(), 1);

    let mut assignees = base.clone();
    assignees.assignees = vec![assignee];
    let matched = assert_parity(&fixture, &assignees, SortMode::Alpha, None).await?;
    assert_eq!(matched.len(), 1);

    let mut custom = base.clone();
    custom
        .custom
        .insert("district".to_string(), vec!["north".to_string()]);
    let matched = assert_parity(&fixture, &custom, SortMode::Alpha, None).await?;
    assert_eq!(matched.len(), 1);

    Ok(())
}

#[tokio::test]
async fn unset_template_excludes_templates_in_both_backends() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let (fixture, _guids, _assignee) = seeded_fixture(dir.path()).await?;
    let base = ContainerFilter {
        organizations: vec![fixture.organization],
        ..ContainerFilter::default()
    };

    let default_set = assert_parity(&fixture, &base, SortMode::Alpha, None).await?;
    assert_eq!(default_set.len(), 4);

    let mut templates = base.clone();
    templates.template = Some(true);
    let template_set = assert_parity(&fixture, &templates, SortMode::Alpha, None).await?;
    assert_eq!(template_set.len(), 1);
    assert!(default_set.iter().all(|guid| !template_set.contains(guid)));
    Ok(())
}

#[tokio::test]
async fn free_text_prefix_search_matches_the_same_set() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let (fixture, _guids, _assignee) = seeded_fixture(dir.path()).await?;

    let mut terms = ContainerFilter {
        organizations: vec![fixture.organization],
        ..ContainerFilter::default()
    };
    terms.terms = Some("ausbau".to_string());
    let matched = assert_parity(&fixture, &terms, SortMode::Alpha, None).await?;
    assert_eq!(matched.len(), 1);

    terms.terms = Some("stadtgrün".to_string());
    let matched = assert_parity(&fixture, &terms, SortMode::Alpha, None).await?;
    assert_eq!(matched.len(), 1);

    terms.terms = Some("nichtvorhanden".to_string());
    let matched = assert_parity(&fixture, &terms, SortMode::Alpha, None).await?;
    assert!(matched.is_empty());
    Ok(())
}

#[tokio::test]
async fn priority_sort_consults_the_priority_table_with_missing_last() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let (fixture, guids, _assignee) = seeded_fixture(dir.path()).await?;

    // The task gets an explicit priority; everything else sorts behind it.
    let task_guid = guids[3];
    fixture
        .store
        .upsert_task_priorities(&[TaskPriority {
            task: task_guid,
            priority: 1,
        }])
        .await?;

    let filter = ContainerFilter {
        organizations: vec![fixture.organization],
        ..ContainerFilter::default()
    };
    let ordered = assert_parity(&fixture, &filter, SortMode::Priority, None).await?;
    assert_eq!(ordered.first(), Some(&task_guid));
    Ok(())
}

#[tokio::test]
async fn facet_strategies_produce_identical_histograms() -> AgoraResult<()> {
    let dir = tempdir().expect("tempdir");
    let (fixture, _guids, _assignee) = seeded_fixture(dir.path()).await?;
    let engine = QueryEngine::new(&fixture.store, &fixture.index);

    let filter = ContainerFilter {
        organizations: vec![fixture.organization],
        ..ContainerFilter::default()
    };
    let visible = engine
        .list(QueryBackend::Relational, &filter, SortMode::Alpha, None)
        .await?;
    let dimensions = [
        FacetDimension::Topic,
        FacetDimension::Category,
        FacetDimension::MeasureType,
        FacetDimension::TaskCategory,
        FacetDimension::Custom("district".to_string()),
    ];

    let in_memory = engine.facet_counts(FacetStrategy::InMemory, &visible, &dimensions)?;
    let from_index = engine.facet_counts(FacetStrategy::Index, &visible, &dimensions)?;
    assert_eq!(in_memory, from_index);

    let topics = in_memory.get("topic").expect("topic histogram");
    assert_eq!(topics.get("topic.mobility"), Some(&1));
    let district = in_memory
        .get("custom.district")
        .expect("district histogram");
    assert_eq!(district.get("north"), Some(&1));
    Ok(())
}
