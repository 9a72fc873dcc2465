use std::collections::BTreeMap;

use sea_orm::sea_query::{Cond, Expr, Query};
use sea_orm::DatabaseBackend;

use crate::api::ContainerReadApi;
use crate::db::{AgoraContainerFacets, AgoraContainers};
use crate::facet::{count_in_memory, FacetCounts, FacetStrategy};
use crate::indexing::tokenize;
use crate::search::SearchIndex;
use crate::store::AgoraStore;
use crate::{
    AgoraResult, Container, FacetDimension, Guid, PayloadType, UserContext, filter_visible,
};

/// One filter DSL satisfied by both backends.
#[derive(Clone, Debug, Default)]
pub struct ContainerFilter {
    pub realm: Option<String>,
    pub organizations: Vec<Guid>,
    pub organizational_units: Vec<Guid>,
    pub assignees: Vec<Guid>,
    pub audience: Vec<String>,
    pub categories: Vec<String>,
    pub topics: Vec<String>,
    pub policy_fields: Vec<String>,
    pub program_types: Vec<String>,
    pub measure_types: Vec<String>,
    pub indicator_categories: Vec<String>,
    pub indicator_types: Vec<String>,
    pub task_categories: Vec<String>,
    pub custom: BTreeMap<String, Vec<String>>,
    /// Unset means templates are excluded; both backends treat undefined and
    /// false identically.
    pub template: Option<bool>,
    pub terms: Option<String>,
    pub payload_types: Vec<PayloadType>,
}

impl ContainerFilter {
    /// Facet-array clauses: the entity matches when the payload array for the
    /// dimension intersects the requested set.
    pub fn facet_clauses(&self) -> Vec<(FacetDimension, Vec<String>)> {
        let mut clauses = Vec::new();
        let pairs: [(FacetDimension, &Vec<String>); 9] = [
            (FacetDimension::Audience, &self.audience),
            (FacetDimension::Category, &self.categories),
            (FacetDimension::Topic, &self.topics),
            (FacetDimension::PolicyField, &self.policy_fields),
            (FacetDimension::ProgramType, &self.program_types),
            (FacetDimension::MeasureType, &self.measure_types),
            (FacetDimension::IndicatorCategory, &self.indicator_categories),
            (FacetDimension::IndicatorType, &self.indicator_types),
            (FacetDimension::TaskCategory, &self.task_categories),
        ];
        for (dimension, values) in pairs {
            if !values.is_empty() {
                clauses.push((dimension, values.clone()));
            }
        }
        if !self.assignees.is_empty() {
            clauses.push((
                FacetDimension::Assignee,
                self.assignees
                    .iter()
                    .map(|guid| guid.to_uuid_string())
                    .collect(),
            ));
        }
        for (name, values) in &self.custom {
            if !values.is_empty() {
                clauses.push((FacetDimension::Custom(name.clone()), values.clone()));
            }
        }
        clauses
    }

    pub fn search_tokens(&self) -> Vec<String> {
        self.terms
            .as_deref()
            .map(tokenize)
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortMode {
    /// Title ascending, case-normalized; guid as tie-break.
    Alpha,
    /// Most recent first; guid tie-break.
    Modified,
    /// Ascending external priority, missing last; guid tie-break.
    Priority,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryBackend {
    Relational,
    SearchIndex,
}

/// Relational predicate translation of the filter DSL.
pub(crate) fn prepare_where(
    backend: DatabaseBackend,
    filter: &ContainerFilter,
    language: Option<&str>,
) -> Cond {
    let mut cond = Cond::all()
        .add(Expr::col((AgoraContainers::Table, AgoraContainers::ValidCurrently)).eq(true))
        .add(Expr::col((AgoraContainers::Table, AgoraContainers::Deleted)).eq(false))
        .add(
            Expr::col((AgoraContainers::Table, AgoraContainers::PayloadType)).is_not_in([
                PayloadType::Organization.as_str(),
                PayloadType::OrganizationalUnit.as_str(),
            ]),
        );

    if let Some(realm) = &filter.realm {
        cond = cond
            .add(Expr::col((AgoraContainers::Table, AgoraContainers::Realm)).eq(realm.clone()));
    }
    if !filter.organizations.is_empty() {
        cond = cond.add(
            Expr::col((AgoraContainers::Table, AgoraContainers::Organization)).is_in(
                filter
                    .organizations
                    .iter()
                    .map(|guid| guid.to_uuid_string()),
            ),
        );
    }
    if !filter.organizational_units.is_empty() {
        cond = cond.add(
            Expr::col((AgoraContainers::Table, AgoraContainers::OrganizationalUnit)).is_in(
                filter
                    .organizational_units
                    .iter()
                    .map(|guid| guid.to_uuid_string()),
            ),
        );
    }
    if !filter.payload_types.is_empty() {
        cond = cond.add(
            Expr::col((AgoraContainers::Table, AgoraContainers::PayloadType))
                .is_in(filter.payload_types.iter().map(|kind| kind.as_str())),
        );
    }
    cond = cond.add(
        Expr::col((AgoraContainers::Table, AgoraContainers::Template))
            .eq(filter.template.unwrap_or(false)),
    );
    for (dimension, values) in filter.facet_clauses() {
        let sub_query = Query::select()
            .expr(Expr::val(1))
            .from(AgoraContainerFacets::Table)
            .and_where(
                Expr::col((AgoraContainerFacets::Table, AgoraContainerFacets::Revision))
                    .equals((AgoraContainers::Table, AgoraContainers::Revision)),
            )
            .and_where(
                Expr::col((AgoraContainerFacets::Table, AgoraContainerFacets::Dimension))
                    .eq(dimension.key()),
            )
            .and_where(
                Expr::col((AgoraContainerFacets::Table, AgoraContainerFacets::Value))
                    .is_in(values),
            )
            .to_owned();
        cond = cond.add(Expr::exists(sub_query));
    }
    for token in filter.search_tokens() {
        match backend {
            DatabaseBackend::Postgres if language.is_some() => {
                let language = language.unwrap_or_default().to_string();
                cond = cond.add(Expr::cust_with_values(
                    "to_tsquery(?, ?) @@ to_tsvector(?, agora_containers.search_norm)",
                    [
                        language.clone(),
                        format!("{token}:*"),
                        language,
                    ],
                ));
            }
            _ => {
                cond = cond.add(
                    Cond::any()
                        .add(
                            Expr::col((AgoraContainers::Table, AgoraContainers::SearchNorm))
                                .like(format!("{token}%")),
                        )
                        .add(
                            Expr::col((AgoraContainers::Table, AgoraContainers::SearchNorm))
                                .like(format!("% {token}%")),
                        ),
                );
            }
        }
    }
    cond
}

/// Orchestrates the two independent backends. Results are combined only here,
/// never interleaved.
pub struct QueryEngine<'a> {
    store: &'a AgoraStore,
    index: &'a SearchIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a AgoraStore, index: &'a SearchIndex) -> Self {
        Self { store, index }
    }

    pub async fn list(
        &self,
        backend: QueryBackend,
        filter: &ContainerFilter,
        sort: SortMode,
        limit: Option<u64>,
    ) -> AgoraResult<Vec<Container>> {
        match backend {
            QueryBackend::Relational => self.store.list_containers(filter, sort, limit).await,
            QueryBackend::SearchIndex => {
                let guids = self.index.search_guids(filter, sort, limit)?;
                match sort {
                    SortMode::Priority => {
                        let mut containers =
                            self.store.fetch_by_guids(&guids, SortMode::Priority).await?;
                        if let Some(limit) = limit {
                            containers.truncate(limit as usize);
                        }
                        Ok(containers)
                    }
                    _ => self.store.fetch_by_guids_ordered(&guids).await,
                }
            }
        }
    }

    /// Candidate fetch, then silent authorization filtering.
    pub async fn list_visible(
        &self,
        backend: QueryBackend,
        filter: &ContainerFilter,
        sort: SortMode,
        limit: Option<u64>,
        user: &UserContext,
    ) -> AgoraResult<Vec<Container>> {
        let containers = self.list(backend, filter, sort, limit).await?;
        Ok(filter_visible(containers, user))
    }

    /// Value→count histograms over an already filtered/visible set. Both
    /// strategies produce identical counts for identical inputs.
    pub fn facet_counts(
        &self,
        strategy: FacetStrategy,
        containers: &[Container],
        dimensions: &[FacetDimension],
    ) -> AgoraResult<FacetCounts> {
        match strategy {
            FacetStrategy::InMemory => Ok(count_in_memory(containers, dimensions)),
            FacetStrategy::Index => {
                let guids: Vec<Guid> = containers.iter().map(|c| c.guid).collect();
                self.index.facet_counts(&guids, dimensions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facet_clauses_skip_empty_dimensions() {
        let mut filter = ContainerFilter::default();
        filter.topics = vec!["topic.mobility".to_string()];
        filter.custom
            .insert("district".to_string(), vec!["north".to_string()]);
        filter.custom.insert("empty".to_string(), Vec::new());
        let clauses = filter.facet_clauses();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].0, FacetDimension::Topic);
        assert_eq!(
            clauses[1].0,
            FacetDimension::Custom("district".to_string())
        );
    }

    #[test]
    fn terms_tokenize_to_normalized_words() {
        let filter = ContainerFilter {
            terms: Some("  Smart-City  Ausbau ".to_string()),
            ..ContainerFilter::default()
        };
        assert_eq!(filter.search_tokens(), vec!["smart", "city", "ausbau"]);
    }
}
