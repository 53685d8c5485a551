//! In-memory BPMN control-flow model produced by the ingest adapter and
//! consumed by the normalizer, validator, and translation engine.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

pub type ObjectId = String;
pub type FlowId = String;
pub type PairId = u32;
pub type TraceId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    StartEvent,
    EndEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
    Exclusive,
    Parallel,
    Inclusive,
}

impl GatewayKind {
    pub fn label(&self) -> &'static str {
        match self {
            GatewayKind::Exclusive => "Exclusive",
            GatewayKind::Parallel => "Parallel",
            GatewayKind::Inclusive => "Inclusive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayRole {
    Split,
    Join,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Task,
    Event(EventKind),
    Gateway { kind: GatewayKind, role: GatewayRole },
}

/// One BPMN element. `canonical_name` starts as the author-supplied `name`
/// (or the id, if absent) and is overwritten by the normalizer/pairing pass
/// for events and gateways.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BpmnObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub canonical_name: String,
    /// Outgoing sequence flow ids, in ingest order.
    pub outgoing: Vec<FlowId>,
    /// Incoming sequence flow ids, in ingest order.
    pub incoming: Vec<FlowId>,
}

impl BpmnObject {
    pub fn is_task(&self) -> bool {
        matches!(self.kind, ObjectKind::Task)
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        match self.kind {
            ObjectKind::Event(k) => Some(k),
            _ => None,
        }
    }

    pub fn gateway(&self) -> Option<(GatewayKind, GatewayRole)> {
        match self.kind {
            ObjectKind::Gateway { kind, role } => Some((kind, role)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceFlow {
    pub id: FlowId,
    pub source: ObjectId,
    pub target: ObjectId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InclusiveTrace {
    pub trace_id: TraceId,
    pub start_object_id: ObjectId,
    pub end_object_id: ObjectId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayPair {
    pub pair_id: PairId,
    pub kind: GatewayKind,
    pub split_id: ObjectId,
    pub join_id: ObjectId,
    pub is_loop: bool,
    pub inclusive_traces: Vec<InclusiveTrace>,
}

pub type BpmnGraph = DiGraph<BpmnObject, SequenceFlow>;

/// The validated process. Node order in `graph` is ingest order: petgraph
/// assigns `NodeIndex`es sequentially as nodes are added, so
/// `graph.node_indices()` replays document order.
#[derive(Debug)]
pub struct BpmnProcess {
    pub process_id: String,
    pub graph: BpmnGraph,
    pub index: HashMap<ObjectId, NodeIndex>,
    pub flows: HashMap<FlowId, SequenceFlow>,
    /// Insertion-ordered; keyed by a dense counter assigned during pairing.
    pub pairs: Vec<GatewayPair>,
}

impl BpmnProcess {
    pub fn object(&self, id: &str) -> &BpmnObject {
        &self.graph[self.index[id]]
    }

    pub fn object_mut(&mut self, id: &str) -> &mut BpmnObject {
        let ix = self.index[id];
        &mut self.graph[ix]
    }

    pub fn try_object(&self, id: &str) -> Option<&BpmnObject> {
        self.index.get(id).map(|&ix| &self.graph[ix])
    }

    pub fn objects_in_order(&self) -> impl Iterator<Item = &BpmnObject> {
        self.graph.node_indices().map(move |ix| &self.graph[ix])
    }

    pub fn successors(&self, id: &str) -> Vec<ObjectId> {
        self.object(id)
            .outgoing
            .iter()
            .map(|fid| self.flows[fid].target.clone())
            .collect()
    }

    pub fn predecessors(&self, id: &str) -> Vec<ObjectId> {
        self.object(id)
            .incoming
            .iter()
            .map(|fid| self.flows[fid].source.clone())
            .collect()
    }

    pub fn start_event(&self) -> Option<&BpmnObject> {
        self.objects_in_order()
            .find(|o| o.event_kind() == Some(EventKind::StartEvent))
    }

    pub fn end_events(&self) -> Vec<&BpmnObject> {
        self.objects_in_order()
            .filter(|o| o.event_kind() == Some(EventKind::EndEvent))
            .collect()
    }

    pub fn gateways(&self) -> Vec<&BpmnObject> {
        self.objects_in_order()
            .filter(|o| o.gateway().is_some())
            .collect()
    }

    pub fn pair_for(&self, gateway_id: &str) -> Option<&GatewayPair> {
        self.pairs
            .iter()
            .find(|p| p.split_id == gateway_id || p.join_id == gateway_id)
    }
}
