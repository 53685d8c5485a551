//! The DCR (Dynamic Condition Response) graph produced by the
//! translation engine and consumed by the XML emit adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type EventId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    Condition,
    Response,
    Include,
    Exclude,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DcrEvent {
    pub id: EventId,
    pub label: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marking {
    pub executed: bool,
    pub included: bool,
    pub pending: bool,
}

impl Marking {
    pub const START: Marking = Marking {
        executed: false,
        included: true,
        pending: true,
    };
    pub const DORMANT: Marking = Marking {
        executed: false,
        included: false,
        pending: false,
    };
    pub const AND_AUX: Marking = Marking {
        executed: false,
        included: true,
        pending: false,
    };
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DcrRelation {
    pub source_id: EventId,
    pub target_id: EventId,
    pub relation: RelationKind,
}

/// `events`/`initial_marking`/`labelling` use `BTreeMap` so iteration
/// order (and therefore XML emission order) is a pure function of event
/// ids, not of hashing — required for the compiler's determinism
/// guarantee.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DcrGraph {
    pub events: BTreeMap<EventId, DcrEvent>,
    pub relations: Vec<DcrRelation>,
    pub initial_marking: BTreeMap<EventId, Marking>,
    pub labelling: BTreeMap<EventId, String>,
}

impl DcrGraph {
    pub fn add_event(&mut self, id: impl Into<EventId>, label: impl Into<String>, marking: Marking) {
        let id = id.into();
        let label = label.into();
        self.labelling.insert(id.clone(), label.clone());
        self.initial_marking.insert(id.clone(), marking);
        self.events.insert(id.clone(), DcrEvent { id, label });
    }

    pub fn add_relation(&mut self, source: impl Into<EventId>, target: impl Into<EventId>, relation: RelationKind) {
        self.relations.push(DcrRelation {
            source_id: source.into(),
            target_id: target.into(),
            relation,
        });
    }

    /// Collapses `relations` to a deterministically ordered set. Sorting
    /// by `(source, target, relation)` rather than relying on insertion
    /// order through a hash set keeps output byte-identical across runs.
    pub fn dedup_relations(&mut self) {
        self.relations.sort();
        self.relations.dedup();
    }
}
