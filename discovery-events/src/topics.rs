//! Topic naming: `discovery_{entity}_{change|delete}`.

use discovery_shared::EntityKind;

/// Entity kinds that have event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventEntity {
    Course,
    CourseRun,
    Organization,
    Program,
}

impl EventEntity {
    pub const ALL: [EventEntity; 4] = [
        EventEntity::Course,
        EventEntity::CourseRun,
        EventEntity::Organization,
        EventEntity::Program,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventEntity::Course => "course",
            EventEntity::CourseRun => "courserun",
            EventEntity::Organization => "organization",
            EventEntity::Program => "program",
        }
    }

    pub fn from_kind(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Course => Some(EventEntity::Course),
            EntityKind::CourseRun => Some(EventEntity::CourseRun),
            EntityKind::Organization => Some(EventEntity::Organization),
            EntityKind::Program => Some(EventEntity::Program),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    Change,
    Delete,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Change => "change",
            EventAction::Delete => "delete",
        }
    }
}

pub fn topic_name(entity: EventEntity, action: EventAction) -> String {
    format!("discovery_{}_{}", entity.as_str(), action.as_str())
}

/// Every topic the broadcaster may publish to.
pub fn all_topics() -> Vec<String> {
    EventEntity::ALL
        .iter()
        .flat_map(|e| {
            [
                topic_name(*e, EventAction::Change),
                topic_name(*e, EventAction::Delete),
            ]
        })
        .collect()
}
