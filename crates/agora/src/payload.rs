use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{AgoraError, AgoraResult, Guid};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    Organization,
    OrganizationalUnit,
    Program,
    Goal,
    Measure,
    SimpleMeasure,
    Indicator,
    Objective,
    Resource,
    Task,
    Text,
    Undefined,
}

impl PayloadType {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadType::Organization => "organization",
            PayloadType::OrganizationalUnit => "organizational_unit",
            PayloadType::Program => "program",
            PayloadType::Goal => "goal",
            PayloadType::Measure => "measure",
            PayloadType::SimpleMeasure => "simple_measure",
            PayloadType::Indicator => "indicator",
            PayloadType::Objective => "objective",
            PayloadType::Resource => "resource",
            PayloadType::Task => "task",
            PayloadType::Text => "text",
            PayloadType::Undefined => "undefined",
        }
    }

    pub fn options() -> [PayloadType; 12] {
        [
            PayloadType::Organization,
            PayloadType::OrganizationalUnit,
            PayloadType::Program,
            PayloadType::Goal,
            PayloadType::Measure,
            PayloadType::SimpleMeasure,
            PayloadType::Indicator,
            PayloadType::Objective,
            PayloadType::Resource,
            PayloadType::Task,
            PayloadType::Text,
            PayloadType::Undefined,
        ]
    }

    /// Hierarchy roots cascade ownership changes over their subtree.
    pub fn is_hierarchy_root(self) -> bool {
        matches!(self, PayloadType::Program)
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse read-access tier carried by every payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Creator,
    Members,
    Organization,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Creator => "creator",
            Visibility::Members => "members",
            Visibility::Organization => "organization",
            Visibility::Public => "public",
        }
    }
}

/// A named dimension over which value→count histograms are computed.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FacetDimension {
    Audience,
    Category,
    Topic,
    PolicyField,
    ProgramType,
    MeasureType,
    IndicatorCategory,
    IndicatorType,
    TaskCategory,
    Assignee,
    Custom(String),
}

impl FacetDimension {
    pub const FIXED: [FacetDimension; 9] = [
        FacetDimension::Audience,
        FacetDimension::Category,
        FacetDimension::Topic,
        FacetDimension::PolicyField,
        FacetDimension::ProgramType,
        FacetDimension::MeasureType,
        FacetDimension::IndicatorCategory,
        FacetDimension::IndicatorType,
        FacetDimension::TaskCategory,
    ];

    pub fn key(&self) -> String {
        match self {
            FacetDimension::Audience => "audience".to_string(),
            FacetDimension::Category => "category".to_string(),
            FacetDimension::Topic => "topic".to_string(),
            FacetDimension::PolicyField => "policy_field".to_string(),
            FacetDimension::ProgramType => "program_type".to_string(),
            FacetDimension::MeasureType => "measure_type".to_string(),
            FacetDimension::IndicatorCategory => "indicator_category".to_string(),
            FacetDimension::IndicatorType => "indicator_type".to_string(),
            FacetDimension::TaskCategory => "task_category".to_string(),
            FacetDimension::Assignee => "assignee".to_string(),
            FacetDimension::Custom(name) => format!("custom.{name}"),
        }
    }

    /// Index field name for the fixed dimensions; custom dimensions share one
    /// flattened field and are not addressed by name.
    pub fn field_name(&self) -> Option<&'static str> {
        match self {
            FacetDimension::Audience => Some("audience"),
            FacetDimension::Category => Some("category"),
            FacetDimension::Topic => Some("topic"),
            FacetDimension::PolicyField => Some("policy_field"),
            FacetDimension::ProgramType => Some("program_type"),
            FacetDimension::MeasureType => Some("measure_type"),
            FacetDimension::IndicatorCategory => Some("indicator_category"),
            FacetDimension::IndicatorType => Some("indicator_type"),
            FacetDimension::TaskCategory => Some("task_category"),
            FacetDimension::Assignee => Some("assignee"),
            FacetDimension::Custom(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub default: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrganizationalUnitPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    pub level: i32,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub program_type: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub policy_field: Vec<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub custom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub goal_type: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub policy_field: Vec<String>,
    #[serde(default)]
    pub fulfillment_date: Option<String>,
    #[serde(default)]
    pub custom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurePayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub measure_type: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub custom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleMeasurePayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub measure_type: Vec<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fulfillment_date: Option<String>,
    #[serde(default)]
    pub custom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub indicator_category: Vec<String>,
    #[serde(default)]
    pub indicator_type: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub topic: Vec<String>,
    #[serde(default)]
    pub historical_values: Vec<(i64, f64)>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectivePayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fulfillment_date: Option<String>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourcePayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub fulfillment_date: Option<String>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub task_category: Vec<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub assignee: Vec<Guid>,
    #[serde(default)]
    pub fulfillment_date: Option<String>,
    #[serde(default)]
    pub custom_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndefinedPayload {
    pub title: String,
    #[serde(default)]
    pub template: bool,
    pub visibility: Visibility,
}

/// Tagged payload union. Dispatch is exhaustive matching on the tag; there is
/// deliberately no payload trait object anywhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Organization(OrganizationPayload),
    OrganizationalUnit(OrganizationalUnitPayload),
    Program(ProgramPayload),
    Goal(GoalPayload),
    Measure(MeasurePayload),
    SimpleMeasure(SimpleMeasurePayload),
    Indicator(IndicatorPayload),
    Objective(ObjectivePayload),
    Resource(ResourcePayload),
    Task(TaskPayload),
    Text(TextPayload),
    Undefined(UndefinedPayload),
}

impl Payload {
    pub fn kind(&self) -> PayloadType {
        match self {
            Payload::Organization(_) => PayloadType::Organization,
            Payload::OrganizationalUnit(_) => PayloadType::OrganizationalUnit,
            Payload::Program(_) => PayloadType::Program,
            Payload::Goal(_) => PayloadType::Goal,
            Payload::Measure(_) => PayloadType::Measure,
            Payload::SimpleMeasure(_) => PayloadType::SimpleMeasure,
            Payload::Indicator(_) => PayloadType::Indicator,
            Payload::Objective(_) => PayloadType::Objective,
            Payload::Resource(_) => PayloadType::Resource,
            Payload::Task(_) => PayloadType::Task,
            Payload::Text(_) => PayloadType::Text,
            Payload::Undefined(_) => PayloadType::Undefined,
        }
    }

    /// Display title; organizations and units carry a `name` instead.
    pub fn title(&self) -> &str {
        match self {
            Payload::Organization(p) => &p.name,
            Payload::OrganizationalUnit(p) => &p.name,
            Payload::Program(p) => &p.title,
            Payload::Goal(p) => &p.title,
            Payload::Measure(p) => &p.title,
            Payload::SimpleMeasure(p) => &p.title,
            Payload::Indicator(p) => &p.title,
            Payload::Objective(p) => &p.title,
            Payload::Resource(p) => &p.title,
            Payload::Task(p) => &p.title,
            Payload::Text(p) => &p.title,
            Payload::Undefined(p) => &p.title,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Payload::Organization(p) => p.description.as_deref(),
            Payload::OrganizationalUnit(p) => p.description.as_deref(),
            Payload::Program(p) => p.description.as_deref(),
            Payload::Goal(p) => p.description.as_deref(),
            Payload::Measure(p) => p.description.as_deref(),
            Payload::SimpleMeasure(p) => p.description.as_deref(),
            Payload::Indicator(p) => p.description.as_deref(),
            Payload::Objective(p) => p.description.as_deref(),
            Payload::Resource(p) => p.description.as_deref(),
            Payload::Task(p) => p.description.as_deref(),
            Payload::Text(p) => p.body.as_deref(),
            Payload::Undefined(_) => None,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Payload::Organization(p) => p.visibility,
            Payload::OrganizationalUnit(p) => p.visibility,
            Payload::Program(p) => p.visibility,
            Payload::Goal(p) => p.visibility,
            Payload::Measure(p) => p.visibility,
            Payload::SimpleMeasure(p) => p.visibility,
            Payload::Indicator(p) => p.visibility,
            Payload::Objective(p) => p.visibility,
            Payload::Resource(p) => p.visibility,
            Payload::Task(p) => p.visibility,
            Payload::Text(p) => p.visibility,
            Payload::Undefined(p) => p.visibility,
        }
    }

    pub fn template(&self) -> bool {
        match self {
            Payload::Organization(_) | Payload::OrganizationalUnit(_) => false,
            Payload::Program(p) => p.template,
            Payload::Goal(p) => p.template,
            Payload::Measure(p) => p.template,
            Payload::SimpleMeasure(p) => p.template,
            Payload::Indicator(p) => p.template,
            Payload::Objective(p) => p.template,
            Payload::Resource(p) => p.template,
            Payload::Task(p) => p.template,
            Payload::Text(p) => p.template,
            Payload::Undefined(p) => p.template,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Payload::Organization(p) => p.slug.as_deref(),
            Payload::OrganizationalUnit(p) => p.slug.as_deref(),
            Payload::Program(p) => p.slug.as_deref(),
            _ => None,
        }
    }

    pub fn assignees(&self) -> &[Guid] {
        match self {
            Payload::Task(p) => &p.assignee,
            _ => &[],
        }
    }

    /// All facet dimension entries this payload contributes, one per distinct
    /// element per dimension.
    pub fn facet_entries(&self) -> Vec<(FacetDimension, String)> {
        let mut entries: BTreeSet<(FacetDimension, String)> = BTreeSet::new();
        let push = |entries: &mut BTreeSet<(FacetDimension, String)>,
                        dim: FacetDimension,
                        values: &[String]| {
            for value in values {
                entries.insert((dim.clone(), value.clone()));
            }
        };
        match self {
            Payload::Program(p) => {
                push(&mut entries, FacetDimension::Audience, &p.audience);
                push(&mut entries, FacetDimension::Category, &p.category);
                push(&mut entries, FacetDimension::Topic, &p.topic);
                push(&mut entries, FacetDimension::PolicyField, &p.policy_field);
                push(&mut entries, FacetDimension::ProgramType, &p.program_type);
                for (name, values) in &p.custom_categories {
                    push(&mut entries, FacetDimension::Custom(name.clone()), values);
                }
            }
            Payload::Goal(p) => {
                push(&mut entries, FacetDimension::Category, &p.category);
                push(&mut entries, FacetDimension::Topic, &p.topic);
                push(&mut entries, FacetDimension::PolicyField, &p.policy_field);
                for (name, values) in &p.custom_categories {
                    push(&mut entries, FacetDimension::Custom(name.clone()), values);
                }
            }
            Payload::Measure(p) => {
                push(&mut entries, FacetDimension::Audience, &p.audience);
                push(&mut entries, FacetDimension::Category, &p.category);
                push(&mut entries, FacetDimension::Topic, &p.topic);
                push(&mut entries, FacetDimension::MeasureType, &p.measure_type);
                for (name, values) in &p.custom_categories {
                    push(&mut entries, FacetDimension::Custom(name.clone()), values);
                }
            }
            Payload::SimpleMeasure(p) => {
                push(&mut entries, FacetDimension::Audience, &p.audience);
                push(&mut entries, FacetDimension::Category, &p.category);
                push(&mut entries, FacetDimension::Topic, &p.topic);
                push(&mut entries, FacetDimension::MeasureType, &p.measure_type);
                for (name, values) in &p.custom_categories {
                    push(&mut entries, FacetDimension::Custom(name.clone()), values);
                }
            }
            Payload::Indicator(p) => {
                push(&mut entries, FacetDimension::Category, &p.category);
                push(&mut entries, FacetDimension::Topic, &p.topic);
                push(
                    &mut entries,
                    FacetDimension::IndicatorCategory,
                    &p.indicator_category,
                );
                push(&mut entries, FacetDimension::IndicatorType, &p.indicator_type);
            }
            Payload::Task(p) => {
                push(&mut entries, FacetDimension::TaskCategory, &p.task_category);
                for assignee in &p.assignee {
                    entries.insert((FacetDimension::Assignee, assignee.to_uuid_string()));
                }
                for (name, values) in &p.custom_categories {
                    push(&mut entries, FacetDimension::Custom(name.clone()), values);
                }
            }
            Payload::Organization(_)
            | Payload::OrganizationalUnit(_)
            | Payload::Objective(_)
            | Payload::Resource(_)
            | Payload::Text(_)
            | Payload::Undefined(_) => {}
        }
        entries.into_iter().collect()
    }

    /// Searchable text: title, prose, and facet values.
    pub fn index_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title()];
        if let Some(description) = self.description() {
            parts.push(description);
        }
        let entries = self.facet_entries();
        let mut text = parts.join(" ");
        for (dim, value) in &entries {
            if !matches!(dim, FacetDimension::Assignee) {
                text.push(' ');
                text.push_str(value);
            }
        }
        text
    }

    /// Rejected before any transaction opens.
    pub fn validate(&self) -> AgoraResult<()> {
        if self.title().trim().is_empty() {
            let field = match self {
                Payload::Organization(_) | Payload::OrganizationalUnit(_) => "name",
                _ => "title",
            };
            return Err(AgoraError::validation(field, "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_is_tagged_by_type() {
        let payload = Payload::Goal(GoalPayload {
            title: "Reduce emissions".to_string(),
            description: None,
            goal_type: None,
            category: vec!["sdg.13".to_string()],
            topic: Vec::new(),
            policy_field: Vec::new(),
            fulfillment_date: None,
            custom_categories: BTreeMap::new(),
            template: false,
            visibility: Visibility::Public,
        });
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["type"], "goal");
        let back: Payload = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.kind(), PayloadType::Goal);
        assert_eq!(back.title(), "Reduce emissions");
    }

    #[test]
    fn facet_entries_deduplicate_per_dimension() {
        let payload = Payload::Measure(MeasurePayload {
            title: "Sensor rollout".to_string(),
            description: None,
            summary: None,
            measure_type: vec!["measure_type.sensory".to_string()],
            audience: Vec::new(),
            category: vec!["sdg.11".to_string(), "sdg.11".to_string()],
            topic: Vec::new(),
            status: None,
            start_date: None,
            end_date: None,
            custom_categories: BTreeMap::new(),
            template: false,
            visibility: Visibility::Organization,
        });
        let entries = payload.facet_entries();
        let categories: Vec<_> = entries
            .iter()
            .filter(|(dim, _)| *dim == FacetDimension::Category)
            .collect();
        assert_eq!(categories.len(), 1);
    }

    #[test]
    fn empty_title_fails_validation() {
        let payload = Payload::Text(TextPayload {
            title: "  ".to_string(),
            body: None,
            template: false,
            visibility: Visibility::Public,
        });
        assert!(payload.validate().is_err());
    }
}
