use crate::{Container, Guid, PayloadType, Predicate, Visibility};

/// Per-request user context. The four membership sets hold organization and
/// organizational-unit guids derived from ACL edges; they are recomputed for
/// every request and never cached across requests.
#[derive(Clone, Debug, Default)]
pub struct UserContext {
    pub is_authenticated: bool,
    pub guid: Option<Guid>,
    pub roles: Vec<String>,
    pub admin_of: Vec<Guid>,
    pub collaborator_of: Vec<Guid>,
    pub head_of: Vec<Guid>,
    pub member_of: Vec<Guid>,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_sysadmin(&self) -> bool {
        self.is_authenticated && self.roles.iter().any(|role| role == "sysadmin")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    DeleteRecursively,
    InviteMembers,
    Relate,
    Prioritize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Effect {
    Allow,
    Deny,
}

#[derive(Clone, Debug)]
enum TypeMatcher {
    Any,
    OneOf(Vec<PayloadType>),
}

impl TypeMatcher {
    fn matches(&self, kind: PayloadType) -> bool {
        match self {
            TypeMatcher::Any => true,
            TypeMatcher::OneOf(kinds) => kinds.contains(&kind),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum OwnershipField {
    Organization,
    OrganizationalUnit,
    ManagedBy,
    OwnGuid,
}

#[derive(Clone, Debug)]
enum Condition {
    VisibilityIs(Visibility),
    FieldIn(OwnershipField, Vec<Guid>),
    CreatedBy(Guid),
    All(Vec<Condition>),
}

impl Condition {
    fn matches(&self, container: &Container) -> bool {
        match self {
            Condition::VisibilityIs(visibility) => {
                container.payload.visibility() == *visibility
            }
            Condition::FieldIn(field, guids) => {
                let value = match field {
                    OwnershipField::Organization => Some(container.organization),
                    OwnershipField::OrganizationalUnit => container.organizational_unit,
                    OwnershipField::ManagedBy => Some(container.managed_by),
                    OwnershipField::OwnGuid => Some(container.guid),
                };
                value.map(|guid| guids.contains(&guid)).unwrap_or(false)
            }
            Condition::CreatedBy(user) => container.user.iter().any(|relation| {
                relation.predicate == Predicate::IsCreatorOf && relation.subject == *user
            }),
            Condition::All(conditions) => {
                conditions.iter().all(|condition| condition.matches(container))
            }
        }
    }
}

#[derive(Clone, Debug)]
struct Rule {
    effect: Effect,
    actions: Vec<Action>,
    types: TypeMatcher,
    /// Field subset a field-scoped rule applies to; such rules take part only
    /// in field-level checks.
    fields: Option<Vec<&'static str>>,
    condition: Option<Condition>,
}

impl Rule {
    fn matches(&self, action: Action, container: &Container, field: Option<&str>) -> bool {
        if !self.actions.contains(&action) {
            return false;
        }
        if !self.types.matches(container.payload.kind()) {
            return false;
        }
        match (&self.fields, field) {
            (Some(_), None) => return false,
            (Some(fields), Some(field)) if !fields.contains(&field) => return false,
            _ => {}
        }
        match &self.condition {
            Some(condition) => condition.matches(container),
            None => true,
        }
    }
}

const COMMON_TYPES: [PayloadType; 8] = [
    PayloadType::Goal,
    PayloadType::Measure,
    PayloadType::Objective,
    PayloadType::Resource,
    PayloadType::SimpleMeasure,
    PayloadType::Task,
    PayloadType::Text,
    PayloadType::Undefined,
];

fn with_program(extra: &[PayloadType]) -> Vec<PayloadType> {
    let mut kinds = vec![PayloadType::Program];
    kinds.extend_from_slice(extra);
    kinds.extend_from_slice(&COMMON_TYPES);
    kinds
}

fn union(sets: &[&[Guid]]) -> Vec<Guid> {
    let mut merged: Vec<Guid> = Vec::new();
    for set in sets {
        for guid in *set {
            if !merged.contains(guid) {
                merged.push(*guid);
            }
        }
    }
    merged
}

/// Capability predicate built from an ordered allow/deny record list, folded
/// top to bottom with last-matching-wins within the matched scope.
#[derive(Clone, Debug)]
pub struct Ability {
    rules: Vec<Rule>,
}

impl Ability {
    pub fn for_user(user: &UserContext) -> Self {
        let mut rules = Vec::new();

        rules.push(Rule {
            effect: Effect::Allow,
            actions: vec![Action::Read],
            types: TypeMatcher::Any,
            fields: None,
            condition: Some(Condition::VisibilityIs(Visibility::Public)),
        });

        if user.is_sysadmin() {
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Create, Action::Read, Action::Update, Action::Delete],
                types: TypeMatcher::Any,
                fields: None,
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Relate],
                types: TypeMatcher::OneOf(with_program(&[PayloadType::Indicator])),
                fields: None,
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::DeleteRecursively],
                types: TypeMatcher::OneOf(vec![PayloadType::Measure]),
                fields: None,
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::InviteMembers],
                types: TypeMatcher::Any,
                fields: None,
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Prioritize],
                types: TypeMatcher::OneOf(vec![PayloadType::Task]),
                fields: None,
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Update],
                types: TypeMatcher::OneOf(with_program(&[])),
                fields: Some(vec!["organization", "organizational_unit"]),
                condition: None,
            });
        } else if user.is_authenticated {
            let admin_or_head = union(&[&user.admin_of, &user.head_of]);
            let admin_collab_head =
                union(&[&user.admin_of, &user.collaborator_of, &user.head_of]);

            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Update],
                types: TypeMatcher::OneOf(vec![PayloadType::Organization]),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::Organization,
                    admin_or_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Create, Action::Update, Action::Delete],
                types: TypeMatcher::OneOf(vec![PayloadType::OrganizationalUnit]),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::Organization,
                    admin_or_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Update],
                types: TypeMatcher::OneOf(vec![PayloadType::OrganizationalUnit]),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::OrganizationalUnit,
                    admin_or_head.clone(),
                )),
            });
            for field in [OwnershipField::Organization, OwnershipField::OrganizationalUnit] {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Create, Action::Update, Action::Delete],
                    types: TypeMatcher::OneOf(with_program(&[])),
                    fields: None,
                    condition: Some(Condition::FieldIn(field, admin_or_head.clone())),
                });
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::InviteMembers],
                    types: TypeMatcher::Any,
                    fields: None,
                    condition: Some(Condition::FieldIn(field, admin_or_head.clone())),
                });
            }
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Create],
                types: TypeMatcher::OneOf(COMMON_TYPES.to_vec()),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_collab_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Update],
                types: TypeMatcher::OneOf(with_program(&[])),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_collab_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Delete],
                types: TypeMatcher::OneOf(COMMON_TYPES.to_vec()),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_collab_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Create, Action::Update, Action::Delete],
                types: TypeMatcher::OneOf(vec![PayloadType::Indicator]),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_or_head.clone(),
                )),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::InviteMembers],
                types: TypeMatcher::Any,
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_or_head.clone(),
                )),
            });
            for field in [
                OwnershipField::ManagedBy,
                OwnershipField::Organization,
                OwnershipField::OrganizationalUnit,
            ] {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Relate],
                    types: TypeMatcher::OneOf(with_program(&[PayloadType::Indicator])),
                    fields: None,
                    condition: Some(Condition::FieldIn(field, admin_collab_head.clone())),
                });
            }
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Prioritize],
                types: TypeMatcher::OneOf(vec![PayloadType::Task]),
                fields: None,
                condition: Some(Condition::FieldIn(
                    OwnershipField::ManagedBy,
                    admin_collab_head.clone(),
                )),
            });

            if let Some(guid) = user.guid {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Read],
                    types: TypeMatcher::Any,
                    fields: None,
                    condition: Some(Condition::All(vec![
                        Condition::VisibilityIs(Visibility::Creator),
                        Condition::CreatedBy(guid),
                    ])),
                });
            }
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Read],
                types: TypeMatcher::Any,
                fields: None,
                condition: Some(Condition::All(vec![
                    Condition::VisibilityIs(Visibility::Creator),
                    Condition::FieldIn(OwnershipField::Organization, user.admin_of.clone()),
                ])),
            });
            for field in [
                OwnershipField::Organization,
                OwnershipField::OrganizationalUnit,
            ] {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Read],
                    types: TypeMatcher::Any,
                    fields: None,
                    condition: Some(Condition::All(vec![
                        Condition::VisibilityIs(Visibility::Members),
                        Condition::FieldIn(field, admin_or_head.clone()),
                    ])),
                });
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Read],
                    types: TypeMatcher::Any,
                    fields: None,
                    condition: Some(Condition::All(vec![
                        Condition::VisibilityIs(Visibility::Organization),
                        Condition::FieldIn(field, admin_or_head.clone()),
                    ])),
                });
            }
            for field in [
                OwnershipField::Organization,
                OwnershipField::OrganizationalUnit,
                OwnershipField::ManagedBy,
            ] {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Read],
                    types: TypeMatcher::Any,
                    fields: None,
                    condition: Some(Condition::All(vec![
                        Condition::VisibilityIs(Visibility::Organization),
                        Condition::FieldIn(field, user.member_of.clone()),
                    ])),
                });
            }
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Read],
                types: TypeMatcher::Any,
                fields: None,
                condition: Some(Condition::All(vec![
                    Condition::VisibilityIs(Visibility::Members),
                    Condition::FieldIn(OwnershipField::ManagedBy, user.member_of.clone()),
                ])),
            });
            for visibility in [Visibility::Members, Visibility::Organization] {
                rules.push(Rule {
                    effect: Effect::Allow,
                    actions: vec![Action::Read],
                    types: TypeMatcher::OneOf(vec![PayloadType::OrganizationalUnit]),
                    fields: None,
                    condition: Some(Condition::All(vec![
                        Condition::VisibilityIs(visibility),
                        Condition::FieldIn(OwnershipField::OwnGuid, user.member_of.clone()),
                    ])),
                });
            }
            rules.push(Rule {
                effect: Effect::Deny,
                actions: vec![Action::Update],
                types: TypeMatcher::Any,
                fields: Some(vec!["organization", "organizational_unit"]),
                condition: None,
            });
            rules.push(Rule {
                effect: Effect::Allow,
                actions: vec![Action::Update],
                types: TypeMatcher::Any,
                fields: Some(vec!["organizational_unit"]),
                condition: Some(Condition::FieldIn(
                    OwnershipField::Organization,
                    admin_or_head,
                )),
            });
        }

        Self { rules }
    }

    fn last_match(&self, action: Action, container: &Container, field: Option<&str>) -> Option<Effect> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(action, container, field))
            .map(|rule| rule.effect)
    }

    pub fn can(&self, action: Action, container: &Container) -> bool {
        matches!(self.last_match(action, container, None), Some(Effect::Allow))
    }

    pub fn can_field(&self, action: Action, container: &Container, field: &str) -> bool {
        matches!(
            self.last_match(action, container, Some(field)),
            Some(Effect::Allow)
        )
    }
}

/// List-level denial is silent filtering, never an error.
pub fn filter_visible(containers: Vec<Container>, user: &UserContext) -> Vec<Container> {
    let ability = Ability::for_user(user);
    containers
        .into_iter()
        .filter(|container| ability.can(Action::Read, container))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        GoalPayload, Payload, Revision, Timestamp, UserRelation, Visibility,
    };
    use std::collections::BTreeMap;

    fn goal(organization: Guid, visibility: Visibility) -> Container {
        Container {
            revision: Revision(1),
            guid: Guid::new(),
            realm: "test".to_string(),
            organization,
            organizational_unit: None,
            managed_by: organization,
            payload: Payload::Goal(GoalPayload {
                title: "goal".to_string(),
                description: None,
                goal_type: None,
                category: Vec::new(),
                topic: Vec::new(),
                policy_field: Vec::new(),
                fulfillment_date: None,
                custom_categories: BTreeMap::new(),
                template: false,
                visibility,
            }),
            valid_currently: true,
            deleted: false,
            valid_from: Timestamp(0),
            relation: Vec::new(),
            user: Vec::new(),
        }
    }

    fn member(guid: Guid, member_of: Vec<Guid>) -> UserContext {
        UserContext {
            is_authenticated: true,
            guid: Some(guid),
            roles: Vec::new(),
            admin_of: Vec::new(),
            collaborator_of: Vec::new(),
            head_of: Vec::new(),
            member_of,
        }
    }

    #[test]
    fn anonymous_users_read_public_only() {
        let org = Guid::new();
        let user = UserContext::anonymous();
        let visible = filter_visible(
            vec![
                goal(org, Visibility::Public),
                goal(org, Visibility::Organization),
                goal(org, Visibility::Members),
            ],
            &user,
        );
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].payload.visibility(), Visibility::Public);
    }

    #[test]
    fn sysadmin_reads_and_mutates_everything() {
        let org = Guid::new();
        let user = UserContext {
            is_authenticated: true,
            guid: Some(Guid::new()),
            roles: vec!["sysadmin".to_string()],
            ..UserContext::default()
        };
        let ability = Ability::for_user(&user);
        let container = goal(org, Visibility::Creator);
        assert!(ability.can(Action::Read, &container));
        assert!(ability.can(Action::Update, &container));
        assert!(ability.can(Action::Delete, &container));
        assert!(ability.can_field(Action::Update, &container, "organization"));
    }

    #[test]
    fn org_admin_filter_keeps_only_their_organization() {
        // Scenario: adminOf = [orgX]; three orgX entities with organization
        // visibility and two orgY entities must filter to the three.
        let org_x = Guid::new();
        let org_y = Guid::new();
        let user = UserContext {
            is_authenticated: true,
            guid: Some(Guid::new()),
            admin_of: vec![org_x],
            ..UserContext::default()
        };
        let containers = vec![
            goal(org_x, Visibility::Organization),
            goal(org_x, Visibility::Organization),
            goal(org_x, Visibility::Organization),
            goal(org_y, Visibility::Organization),
            goal(org_y, Visibility::Organization),
        ];
        let visible = filter_visible(containers, &user);
        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|c| c.organization == org_x));
    }

    #[test]
    fn adding_admin_relation_never_shrinks_the_readable_set() {
        let org_x = Guid::new();
        let org_y = Guid::new();
        let me = Guid::new();
        let containers: Vec<Container> = vec![
            goal(org_x, Visibility::Public),
            goal(org_x, Visibility::Organization),
            goal(org_x, Visibility::Members),
            goal(org_x, Visibility::Creator),
            goal(org_y, Visibility::Organization),
            goal(org_y, Visibility::Creator),
        ];
        let before = filter_visible(containers.clone(), &member(me, vec![org_x]));
        let mut with_admin = member(me, vec![org_x]);
        with_admin.admin_of = vec![org_y];
        let after = filter_visible(containers, &with_admin);
        for container in &before {
            assert!(
                after.iter().any(|c| c.guid == container.guid),
                "readable set shrank for {}",
                container.guid
            );
        }
        assert!(after.len() >= before.len());
    }

    #[test]
    fn creator_visibility_requires_the_creator_edge() {
        let org = Guid::new();
        let me = Guid::new();
        let somebody = Guid::new();
        let mut mine = goal(org, Visibility::Creator);
        mine.user.push(UserRelation {
            predicate: Predicate::IsCreatorOf,
            subject: me,
        });
        let mut theirs = goal(org, Visibility::Creator);
        theirs.user.push(UserRelation {
            predicate: Predicate::IsCreatorOf,
            subject: somebody,
        });
        let user = member(me, Vec::new());
        let visible = filter_visible(vec![mine.clone(), theirs], &user);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].guid, mine.guid);
    }

    #[test]
    fn ownership_fields_stay_locked_for_plain_collaborators() {
        let org = Guid::new();
        let user = UserContext {
            is_authenticated: true,
            guid: Some(Guid::new()),
            collaborator_of: vec![org],
            ..UserContext::default()
        };
        let ability = Ability::for_user(&user);
        let container = goal(org, Visibility::Organization);
        assert!(ability.can(Action::Update, &container));
        assert!(!ability.can_field(Action::Update, &container, "organization"));
        assert!(!ability.can_field(Action::Update, &container, "organizational_unit"));

        let admin = UserContext {
            is_authenticated: true,
            guid: Some(Guid::new()),
            admin_of: vec![org],
            ..UserContext::default()
        };
        let ability = Ability::for_user(&admin);
        assert!(ability.can_field(Action::Update, &container, "organizational_unit"));
        assert!(!ability.can_field(Action::Update, &container, "organization"));
    }
}
