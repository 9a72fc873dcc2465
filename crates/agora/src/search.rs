use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tantivy::aggregation::agg_req::Aggregations;
use tantivy::aggregation::AggregationCollector;
use tantivy::collector::DocSetCollector;
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, STORED, STRING,
};
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer};
use tantivy::{Index, TantivyDocument, Term};

use crate::facet::FacetCounts;
use crate::indexing::IndexOp;
use crate::query::{ContainerFilter, SortMode};
use crate::{AgoraError, AgoraResult, FacetDimension, Guid, PayloadType};

const TOKENIZER_NAME: &str = "agora_text";
const WRITER_HEAP_SIZE: usize = 50_000_000;
const TERMS_BUCKET_LIMIT: u32 = 10_000;

/// Field handles for document construction and querying.
#[derive(Clone)]
pub(crate) struct DocumentFields {
    pub guid: Field,
    pub realm: Field,
    pub organization: Field,
    pub organizational_unit: Field,
    pub managed_by: Field,
    pub payload_type: Field,
    pub title: Field,
    pub title_sort: Field,
    pub valid_from: Field,
    pub template: Field,
    pub search: Field,
    pub audience: Field,
    pub category: Field,
    pub topic: Field,
    pub policy_field: Field,
    pub program_type: Field,
    pub measure_type: Field,
    pub indicator_category: Field,
    pub indicator_type: Field,
    pub task_category: Field,
    pub assignee: Field,
    pub custom: Field,
}

impl DocumentFields {
    fn facet_field(&self, name: &str) -> Option<Field> {
        match name {
            "audience" => Some(self.audience),
            "category" => Some(self.category),
            "topic" => Some(self.topic),
            "policy_field" => Some(self.policy_field),
            "program_type" => Some(self.program_type),
            "measure_type" => Some(self.measure_type),
            "indicator_category" => Some(self.indicator_category),
            "indicator_type" => Some(self.indicator_type),
            "task_category" => Some(self.task_category),
            "assignee" => Some(self.assignee),
            _ => None,
        }
    }
}

fn build_schema() -> (Schema, DocumentFields) {
    let mut builder = Schema::builder();

    let keyword = || STRING | FAST;
    let search_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_NAME)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );

    let guid = builder.add_text_field("guid", STRING | STORED);
    let realm = builder.add_text_field("realm", keyword());
    let organization = builder.add_text_field("organization", keyword());
    let organizational_unit = builder.add_text_field("organizational_unit", keyword());
    let managed_by = builder.add_text_field("managed_by", keyword());
    let payload_type = builder.add_text_field("type", keyword());
    let title = builder.add_text_field("title", STORED);
    let title_sort = builder.add_text_field("title_sort", STRING | STORED | FAST);
    let valid_from = builder.add_i64_field("valid_from", tantivy::schema::INDEXED | STORED | FAST);
    let template = builder.add_u64_field("template", tantivy::schema::INDEXED | FAST);
    let search = builder.add_text_field("search", search_options);
    let audience = builder.add_text_field("audience", keyword() | STORED);
    let category = builder.add_text_field("category", keyword() | STORED);
    let topic = builder.add_text_field("topic", keyword() | STORED);
    let policy_field = builder.add_text_field("policy_field", keyword() | STORED);
    let program_type = builder.add_text_field("program_type", keyword() | STORED);
    let measure_type = builder.add_text_field("measure_type", keyword() | STORED);
    let indicator_category = builder.add_text_field("indicator_category", keyword() | STORED);
    let indicator_type = builder.add_text_field("indicator_type", keyword() | STORED);
    let task_category = builder.add_text_field("task_category", keyword() | STORED);
    let assignee = builder.add_text_field("assignee", keyword() | STORED);
    let custom = builder.add_text_field("custom", keyword() | STORED);

    let schema = builder.build();
    let fields = DocumentFields {
        guid,
        realm,
        organization,
        organizational_unit,
        managed_by,
        payload_type,
        title,
        title_sort,
        valid_from,
        template,
        search,
        audience,
        category,
        topic,
        policy_field,
        program_type,
        measure_type,
        indicator_category,
        indicator_type,
        task_category,
        assignee,
        custom,
    };
    (schema, fields)
}

fn stemmer_language(language: &str) -> Option<Language> {
    match language {
        "german" => Some(Language::German),
        "english" => Some(Language::English),
        "french" => Some(Language::French),
        _ => None,
    }
}

/// Search-index backend keyed by container guid. Per-document upsert/delete,
/// boolean filter queries with per-token prefix expansion, stored sort keys,
/// and terms aggregation.
#[derive(Clone)]
pub struct SearchIndex {
    index: Index,
    fields: DocumentFields,
}

impl SearchIndex {
    pub fn open_or_create(path: &Path, language: Option<&str>) -> AgoraResult<Self> {
        fs::create_dir_all(path)
            .map_err(|err| AgoraError::index(format!("create index dir: {err}")))?;
        let (schema, fields) = build_schema();
        let directory = MmapDirectory::open(path)
            .map_err(|err| AgoraError::index(format!("open index dir: {err}")))?;
        let index = Index::open_or_create(directory, schema)?;
        let analyzer = match language.and_then(stemmer_language) {
            Some(language) => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .filter(Stemmer::new(language))
                .build(),
            None => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .build(),
        };
        index.tokenizers().register(TOKENIZER_NAME, analyzer);
        Ok(Self { index, fields })
    }

    /// Batched upsert/delete, one commit per batch.
    pub fn apply(&self, ops: &[IndexOp]) -> AgoraResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut writer = self.index.writer::<TantivyDocument>(WRITER_HEAP_SIZE)?;
        for op in ops {
            match op {
                IndexOp::Delete(guid) => {
                    writer.delete_term(Term::from_field_text(
                        self.fields.guid,
                        &guid.to_uuid_string(),
                    ));
                }
                IndexOp::Upsert(document) => {
                    writer.delete_term(Term::from_field_text(
                        self.fields.guid,
                        &document.guid.to_uuid_string(),
                    ));
                    writer.add_document(self.make_doc(document))?;
                }
            }
        }
        writer.commit()?;
        Ok(())
    }

    fn make_doc(&self, source: &crate::indexing::IndexDocument) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.guid, source.guid.to_uuid_string());
        doc.add_text(self.fields.realm, &source.realm);
        doc.add_text(
            self.fields.organization,
            source.organization.to_uuid_string(),
        );
        if let Some(unit) = source.organizational_unit {
            doc.add_text(self.fields.organizational_unit, unit.to_uuid_string());
        }
        doc.add_text(self.fields.managed_by, source.managed_by.to_uuid_string());
        doc.add_text(self.fields.payload_type, &source.payload_type);
        doc.add_text(self.fields.title, &source.title);
        doc.add_text(self.fields.title_sort, &source.title_sort);
        doc.add_i64(self.fields.valid_from, source.valid_from);
        doc.add_u64(self.fields.template, source.template as u64);
        doc.add_text(self.fields.search, &source.text);
        for (field, value) in &source.facets {
            if let Some(field) = self.fields.facet_field(field) {
                doc.add_text(field, value);
            }
        }
        for entry in &source.custom {
            doc.add_text(self.fields.custom, entry);
        }
        doc
    }

    fn filter_query(&self, filter: &ContainerFilter) -> AgoraResult<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, Box::new(AllQuery))];

        for kind in [PayloadType::Organization, PayloadType::OrganizationalUnit] {
            clauses.push((
                Occur::MustNot,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.payload_type, kind.as_str()),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        if let Some(realm) = &filter.realm {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.realm, realm),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        if !filter.organizations.is_empty() {
            clauses.push((
                Occur::Must,
                Box::new(self.any_term(
                    self.fields.organization,
                    filter
                        .organizations
                        .iter()
                        .map(|guid| guid.to_uuid_string()),
                )),
            ));
        }
        if !filter.organizational_units.is_empty() {
            clauses.push((
                Occur::Must,
                Box::new(self.any_term(
                    self.fields.organizational_unit,
                    filter
                        .organizational_units
                        .iter()
                        .map(|guid| guid.to_uuid_string()),
                )),
            ));
        }
        if !filter.payload_types.is_empty() {
            clauses.push((
                Occur::Must,
                Box::new(self.any_term(
                    self.fields.payload_type,
                    filter
                        .payload_types
                        .iter()
                        .map(|kind| kind.as_str().to_string()),
                )),
            ));
        }
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_u64(self.fields.template, filter.template.unwrap_or(false) as u64),
                IndexRecordOption::Basic,
            )),
        ));
        for (dimension, values) in filter.facet_clauses() {
            let query = match &dimension {
                FacetDimension::Custom(name) => self.any_term(
                    self.fields.custom,
                    values
                        .iter()
                        .map(|value| format!("{name}:{value}")),
                ),
                fixed => {
                    let field = fixed
                        .field_name()
                        .and_then(|name| self.fields.facet_field(name))
                        .ok_or_else(|| {
                            AgoraError::index(format!("no index field for {:?}", fixed))
                        })?;
                    self.any_term(field, values.iter().cloned())
                }
            };
            clauses.push((Occur::Must, Box::new(query)));
        }
        for token in filter.search_tokens() {
            let prefix = RegexQuery::from_pattern(&format!("{token}.*"), self.fields.search)?;
            clauses.push((Occur::Must, Box::new(prefix)));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn any_term(&self, field: Field, values: impl Iterator<Item = String>) -> BooleanQuery {
        let clauses: Vec<(Occur, Box<dyn Query>)> = values
            .map(|value| {
                (
                    Occur::Should,
                    Box::new(TermQuery::new(
                        Term::from_field_text(field, &value),
                        IndexRecordOption::Basic,
                    )) as Box<dyn Query>,
                )
            })
            .collect();
        BooleanQuery::new(clauses)
    }

    /// Matching guids ordered per sort mode. Priority ordering consults the
    /// external priority table and is applied by the caller; the full matched
    /// set is returned for that mode.
    pub fn search_guids(
        &self,
        filter: &ContainerFilter,
        sort: SortMode,
        limit: Option<u64>,
    ) -> AgoraResult<Vec<Guid>> {
        let query = self.filter_query(filter)?;
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let addresses = searcher.search(&query, &DocSetCollector)?;

        let mut rows: Vec<(String, i64, Guid)> = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let guid_raw = doc
                .get_first(self.fields.guid)
                .and_then(|value| value.as_str())
                .ok_or_else(|| AgoraError::index("document without guid"))?;
            let guid = Guid::from_uuid_str(guid_raw)
                .map_err(|err| AgoraError::index(err.to_string()))?;
            let title_sort = doc
                .get_first(self.fields.title_sort)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            let valid_from = doc
                .get_first(self.fields.valid_from)
                .and_then(|value| value.as_i64())
                .unwrap_or_default();
            rows.push((title_sort, valid_from, guid));
        }

        match sort {
            SortMode::Alpha => {
                rows.sort_by(|a, b| (&a.0, a.2).cmp(&(&b.0, b.2)));
            }
            SortMode::Modified => {
                rows.sort_by_key(|row| (Reverse(row.1), row.2));
            }
            SortMode::Priority => {
                rows.sort_by_key(|row| row.2);
            }
        }
        if let Some(limit) = limit {
            if sort != SortMode::Priority {
                rows.truncate(limit as usize);
            }
        }
        Ok(rows.into_iter().map(|row| row.2).collect())
    }

    /// Terms aggregation over a guid set.
    pub fn facet_counts(
        &self,
        guids: &[Guid],
        dimensions: &[FacetDimension],
    ) -> AgoraResult<FacetCounts> {
        let mut counts: FacetCounts = dimensions
            .iter()
            .map(|dimension| (dimension.key(), BTreeMap::new()))
            .collect();
        if guids.is_empty() {
            return Ok(counts);
        }

        let mut request = serde_json::Map::new();
        let mut wants_custom = false;
        for dimension in dimensions {
            match dimension {
                FacetDimension::Custom(_) => wants_custom = true,
                fixed => {
                    if let Some(field) = fixed.field_name() {
                        request.insert(
                            fixed.key(),
                            serde_json::json!({
                                "terms": {"field": field, "size": TERMS_BUCKET_LIMIT}
                            }),
                        );
                    }
                }
            }
        }
        if wants_custom {
            request.insert(
                "custom".to_string(),
                serde_json::json!({
                    "terms": {"field": "custom", "size": TERMS_BUCKET_LIMIT}
                }),
            );
        }
        if request.is_empty() {
            return Ok(counts);
        }

        let aggregations: Aggregations =
            serde_json::from_value(serde_json::Value::Object(request))
                .map_err(|err| AgoraError::index(format!("aggregation request: {err}")))?;
        let collector = AggregationCollector::from_aggs(aggregations, Default::default());
        let query = self.any_term(
            self.fields.guid,
            guids.iter().map(|guid| guid.to_uuid_string()),
        );
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let results = searcher.search(&query, &collector)?;
        let results = serde_json::to_value(results)
            .map_err(|err| AgoraError::index(format!("aggregation result: {err}")))?;

        for dimension in dimensions {
            let (source, prefix) = match dimension {
                FacetDimension::Custom(name) => ("custom".to_string(), Some(format!("{name}:"))),
                fixed => (fixed.key(), None),
            };
            let buckets = results
                .get(source.as_str())
                .and_then(|agg| agg.get("buckets"))
                .and_then(|buckets| buckets.as_array());
            let Some(buckets) = buckets else {
                continue;
            };
            let bucket_counts = counts
                .get_mut(&dimension.key())
                .expect("dimension present in counts");
            for bucket in buckets {
                let Some(key) = bucket.get("key").and_then(|key| key.as_str()) else {
                    continue;
                };
                let doc_count = bucket
                    .get("doc_count")
                    .and_then(|count| count.as_u64())
                    .unwrap_or(0);
                if doc_count == 0 {
                    continue;
                }
                match &prefix {
                    Some(prefix) => {
                        if let Some(value) = key.strip_prefix(prefix) {
                            *bucket_counts.entry(value.to_string()).or_insert(0) += doc_count;
                        }
                    }
                    None => {
                        *bucket_counts.entry(key.to_string()).or_insert(0) += doc_count;
                    }
                }
            }
        }
        Ok(counts)
    }
}
