use unicode_normalization::UnicodeNormalization;

use crate::config::IndexingConfig;
use crate::search::SearchIndex;
use crate::store::AgoraStore;
use crate::{AgoraResult, Container, FacetDimension, Guid, IndexAction, Timestamp};

/// Tokens as both backends see them: NFC, lowercased, split on
/// non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.nfc()
        .collect::<String>()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Word-joined normalized text backing the relational free-text match.
pub fn normalize_search_text(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Case/umlaut-normalized sort key shared by both backends.
pub fn normalize_title_sort(title: &str) -> String {
    title
        .nfc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .flat_map(|c| match c {
            'ä' => vec!['a'],
            'ö' => vec!['o'],
            'ü' => vec!['u'],
            'ß' => vec!['s', 's'],
            other => vec![other],
        })
        .collect()
}

/// Index-document shape the worker writes; converted from the current
/// container row, never from the queued event.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexDocument {
    pub guid: Guid,
    pub realm: String,
    pub organization: Guid,
    pub organizational_unit: Option<Guid>,
    pub managed_by: Guid,
    pub payload_type: String,
    pub title: String,
    pub title_sort: String,
    pub valid_from: i64,
    pub template: bool,
    pub text: String,
    /// `(field, value)` pairs for the fixed facet dimensions.
    pub facets: Vec<(&'static str, String)>,
    /// Flattened `name:value` entries for custom dimensions.
    pub custom: Vec<String>,
}

impl IndexDocument {
    pub fn from_container(container: &Container) -> Self {
        let payload = &container.payload;
        let mut facets = Vec::new();
        let mut custom = Vec::new();
        for (dimension, value) in payload.facet_entries() {
            match dimension {
                FacetDimension::Custom(name) => custom.push(format!("{name}:{value}")),
                fixed => {
                    if let Some(field) = fixed.field_name() {
                        facets.push((field, value));
                    }
                }
            }
        }
        Self {
            guid: container.guid,
            realm: container.realm.clone(),
            organization: container.organization,
            organizational_unit: container.organizational_unit,
            managed_by: container.managed_by,
            payload_type: payload.kind().as_str().to_string(),
            title: payload.title().to_string(),
            title_sort: normalize_title_sort(payload.title()),
            valid_from: container.valid_from.as_i64(),
            template: payload.template(),
            text: payload.index_text(),
            facets,
            custom,
        }
    }
}

#[derive(Clone, Debug)]
pub enum IndexOp {
    Upsert(Box<IndexDocument>),
    Delete(Guid),
}

pub(crate) fn backoff_micros(attempts: i32, config: &IndexingConfig) -> i64 {
    let shift = attempts.saturating_sub(1).clamp(0, 10) as u32;
    let millis = config
        .backoff_base_ms
        .saturating_mul(1_i64 << shift)
        .min(config.backoff_max_ms);
    millis.saturating_mul(1_000)
}

/// Drains the index-job queue: leases due events, refetches current rows,
/// applies a batched index write, retries with exponential backoff, and parks
/// poison or repeatedly failing jobs in the dead-letter set. The relational
/// store stays authoritative during any divergence.
pub struct IndexWorker {
    store: AgoraStore,
    index: SearchIndex,
    config: IndexingConfig,
}

impl IndexWorker {
    pub fn new(store: AgoraStore, index: SearchIndex, config: IndexingConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// One lease/process/ack cycle. Returns the number of completed jobs.
    pub async fn run_once(&self) -> AgoraResult<u32> {
        let now = Timestamp::now_micros();
        let jobs = self
            .store
            .lease_index_jobs(self.config.batch_size, now)
            .await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut valid: Vec<(i64, Guid, IndexAction)> = Vec::new();
        let mut poison: Vec<(i64, String)> = Vec::new();
        for job in &jobs {
            match (
                IndexAction::parse(&job.action),
                Guid::from_uuid_str(&job.guid),
            ) {
                (Ok(action), Ok(guid)) => valid.push((job.job_id, guid, action)),
                (Err(err), _) | (_, Err(err)) => poison.push((job.job_id, err.to_string())),
            }
        }
        for (job_id, message) in &poison {
            log::warn!("index job {job_id} is malformed: {message}");
            self.store
                .fail_index_jobs(&[*job_id], message, &self.config, now)
                .await?;
        }
        if valid.is_empty() {
            return Ok(0);
        }

        // Latest event per guid wins; superseded jobs complete with the batch.
        let mut latest: Vec<(Guid, IndexAction)> = Vec::new();
        for (_, guid, action) in &valid {
            latest.retain(|(seen, _)| seen != guid);
            latest.push((*guid, *action));
        }

        let outcome = self.build_and_apply(&latest).await;
        let job_ids: Vec<i64> = valid.iter().map(|(job_id, _, _)| *job_id).collect();
        match outcome {
            Ok(()) => {
                self.store.complete_index_jobs(&job_ids).await?;
                Ok(job_ids.len() as u32)
            }
            Err(err) => {
                log::warn!("index batch failed, scheduling retry: {err}");
                self.store
                    .fail_index_jobs(&job_ids, &err.to_string(), &self.config, now)
                    .await?;
                Ok(0)
            }
        }
    }

    /// Convenience loop for embedded use and tests; failed jobs back off into
    /// the future, so the loop terminates.
    pub async fn run_until_idle(&self) -> AgoraResult<u32> {
        let mut total = 0;
        loop {
            let processed = self.run_once().await?;
            if processed == 0 {
                return Ok(total);
            }
            total += processed;
        }
    }

    async fn build_and_apply(&self, events: &[(Guid, IndexAction)]) -> AgoraResult<()> {
        let mut ops = Vec::with_capacity(events.len());
        for (guid, action) in events {
            match action {
                IndexAction::Delete => ops.push(IndexOp::Delete(*guid)),
                IndexAction::Upsert => match self.store.get_current_row(*guid).await? {
                    Some(container) if !container.deleted => ops.push(IndexOp::Upsert(
                        Box::new(IndexDocument::from_container(&container)),
                    )),
                    _ => {
                        log::debug!("upsert for {guid} resolved to delete; row gone");
                        ops.push(IndexOp::Delete(*guid));
                    }
                },
            }
        }
        self.index.apply(&ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_and_lowercases() {
        assert_eq!(
            tokenize("Smart-City: Ausbau 2030"),
            vec!["smart", "city", "ausbau", "2030"]
        );
    }

    #[test]
    fn title_sort_folds_umlauts() {
        assert_eq!(normalize_title_sort("Äußere Straße"), "aussere strasse");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = IndexingConfig {
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 4_000,
            batch_size: 10,
        };
        assert_eq!(backoff_micros(1, &config), 500_000);
        assert_eq!(backoff_micros(2, &config), 1_000_000);
        assert_eq!(backoff_micros(3, &config), 2_000_000);
        assert_eq!(backoff_micros(10, &config), 4_000_000);
    }
}
