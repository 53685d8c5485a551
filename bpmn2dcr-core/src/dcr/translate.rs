//! Translation engine: turns a validated `BpmnProcess` into a `DcrGraph`.
//!
//! Runs in three stages: a preprocessing pass that normalizes
//! single-task inclusive branches, object mapping (one DCR event per
//! BPMN object plus a self-exclude), and relation mapping dispatched per
//! gateway kind, synthesizing AND-State/OR-State auxiliary events along
//! the way.

use std::collections::HashMap;

use tracing::info;

use crate::bpmn::model::{
    BpmnObject, BpmnProcess, EventKind, FlowId, GatewayKind, GatewayRole, ObjectId, ObjectKind,
    SequenceFlow,
};
use crate::dcr::model::{DcrGraph, EventId, Marking, RelationKind};

pub fn translate(process: &mut BpmnProcess) -> DcrGraph {
    preprocess_inclusive_single_task_traces(process);

    let mut dcr = DcrGraph::default();
    map_objects(process, &mut dcr);

    let or_join_flow_map = prepare_or_aux_events(process, &mut dcr);
    map_relations(process, &mut dcr, &or_join_flow_map);

    dcr.dedup_relations();
    info!(
        events = dcr.events.len(),
        relations = dcr.relations.len(),
        "translation complete"
    );
    dcr
}

/// For every inclusive trace whose branch is a single task (start and end
/// coincide), splices in a synthetic trigger task ahead of it so the
/// branch has a distinct entry point from its exit, which the OR-join
/// emission schema requires.
fn preprocess_inclusive_single_task_traces(process: &mut BpmnProcess) {
    let pair_indices: Vec<usize> = process
        .pairs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind == GatewayKind::Inclusive)
        .map(|(i, _)| i)
        .collect();

    for idx in pair_indices {
        let pair_id = process.pairs[idx].pair_id;
        let single_task_traces: Vec<usize> = process.pairs[idx]
            .inclusive_traces
            .iter()
            .enumerate()
            .filter(|(_, t)| t.start_object_id == t.end_object_id && process.object(&t.start_object_id).is_task())
            .map(|(i, _)| i)
            .collect();

        let mut k = 0u32;
        for ti in single_task_traces {
            k += 1;
            let task_id = process.pairs[idx].inclusive_traces[ti].start_object_id.clone();
            let trigger_id = format!("or_{pair_id}_trigger_{k}");
            let trigger_label = format!("OR {pair_id} Trigger {k}");
            insert_task_before(process, &task_id, &trigger_id, &trigger_label);
            process.pairs[idx].inclusive_traces[ti].start_object_id = trigger_id;
        }
    }
}

fn insert_task_before(process: &mut BpmnProcess, task_id: &str, trigger_id: &str, label: &str) {
    let flow_id = process.object(task_id).incoming[0].clone();
    let split_id = process.flows[&flow_id].source.clone();
    let split_ix = process.index[&split_id];
    let task_ix = process.index[task_id];

    if let Some(edge_ix) = process.graph.find_edge(split_ix, task_ix) {
        process.graph.remove_edge(edge_ix);
    }

    let trigger = BpmnObject {
        id: trigger_id.to_string(),
        kind: ObjectKind::Task,
        canonical_name: label.to_string(),
        outgoing: Vec::new(),
        incoming: Vec::new(),
    };
    let trigger_ix = process.graph.add_node(trigger);
    process.index.insert(trigger_id.to_string(), trigger_ix);

    {
        let flow = process.flows.get_mut(&flow_id).expect("flow must exist");
        flow.target = trigger_id.to_string();
    }
    let retargeted = process.flows[&flow_id].clone();
    process.graph.add_edge(split_ix, trigger_ix, retargeted);

    process.object_mut(task_id).incoming.retain(|f| f != &flow_id);
    process.object_mut(trigger_id).incoming.push(flow_id.clone());

    let new_flow_id = format!("{flow_id}_pre");
    let new_flow = SequenceFlow {
        id: new_flow_id.clone(),
        source: trigger_id.to_string(),
        target: task_id.to_string(),
    };
    process.graph.add_edge(trigger_ix, task_ix, new_flow.clone());
    process.flows.insert(new_flow_id.clone(), new_flow);
    process.object_mut(trigger_id).outgoing.push(new_flow_id.clone());
    process.object_mut(task_id).incoming.push(new_flow_id);
}

fn map_objects(process: &BpmnProcess, dcr: &mut DcrGraph) {
    for obj in process.objects_in_order() {
        let marking = if obj.event_kind() == Some(EventKind::StartEvent) {
            Marking::START
        } else {
            Marking::DORMANT
        };
        dcr.add_event(obj.id.clone(), obj.canonical_name.clone(), marking);
    }
    for obj in process.objects_in_order() {
        dcr.add_relation(obj.id.clone(), obj.id.clone(), RelationKind::Exclude);
    }
}

/// Pre-allocates one OR-State aux event per inclusive trace, keyed by the
/// flow that carries that trace's branch into the join, so the relation
/// mapping pass can look it up without recomputation.
fn prepare_or_aux_events(
    process: &BpmnProcess,
    dcr: &mut DcrGraph,
) -> HashMap<FlowId, (EventId, ObjectId)> {
    let mut map = HashMap::new();
    let mut counter = 0u32;

    for pair in &process.pairs {
        if pair.kind != GatewayKind::Inclusive {
            continue;
        }
        for trace in &pair.inclusive_traces {
            let flow_id = process
                .object(&trace.end_object_id)
                .outgoing
                .iter()
                .find(|fid| process.flows[*fid].target == pair.join_id)
                .cloned();
            let Some(flow_id) = flow_id else { continue };

            counter += 1;
            let aux_id = format!("s_{counter}_OR_{}", trace.trace_id);
            dcr.add_event(aux_id.clone(), format!("OR State {counter}"), Marking::DORMANT);
            dcr.add_relation(aux_id.clone(), aux_id.clone(), RelationKind::Exclude);
            map.insert(flow_id, (aux_id, trace.start_object_id.clone()));
        }
    }
    map
}

fn map_relations(
    process: &BpmnProcess,
    dcr: &mut DcrGraph,
    or_join_flow_map: &HashMap<FlowId, (EventId, ObjectId)>,
) {
    let mut and_aux_counter = 0u32;

    for obj in process.objects_in_order() {
        let u = obj.id.clone();
        for fid in &obj.outgoing {
            let flow = &process.flows[fid];
            let v = flow.target.clone();

            let u_split = matches!(process.object(&u).gateway(), Some((_, GatewayRole::Split)));
            let v_join = matches!(process.object(&v).gateway(), Some((_, GatewayRole::Join)));

            if !u_split && !v_join {
                basic(dcr, &u, &v);
            }

            if u_split {
                let (kind, _) = process.object(&u).gateway().unwrap();
                let pair = process
                    .pair_for(&u)
                    .expect("split gateway must belong to a pair");
                match kind {
                    GatewayKind::Exclusive => {
                        basic(dcr, &u, &v);
                        for w in process.successors(&u) {
                            if w != v {
                                dcr.add_relation(v.clone(), w.clone(), RelationKind::Exclude);
                                dcr.add_relation(w.clone(), v.clone(), RelationKind::Exclude);
                            }
                        }
                    }
                    GatewayKind::Parallel => {
                        basic(dcr, &u, &v);
                        dcr.add_relation(u.clone(), pair.join_id.clone(), RelationKind::Response);
                    }
                    GatewayKind::Inclusive => {
                        basic(dcr, &u, &v);
                        dcr.add_relation(u.clone(), pair.join_id.clone(), RelationKind::Response);
                        dcr.add_relation(pair.join_id.clone(), v.clone(), RelationKind::Exclude);
                    }
                }
            }

            if !u_split && v_join {
                let (kind, _) = process.object(&v).gateway().unwrap();
                match kind {
                    GatewayKind::Exclusive => {
                        basic(dcr, &u, &v);
                    }
                    GatewayKind::Parallel => {
                        and_aux_counter += 1;
                        let aux = format!("s_{and_aux_counter}_AND_{u}");
                        dcr.add_event(aux.clone(), format!("AND State {and_aux_counter}"), Marking::AND_AUX);
                        dcr.add_relation(aux.clone(), aux.clone(), RelationKind::Exclude);
                        dcr.add_relation(u.clone(), aux.clone(), RelationKind::Exclude);
                        dcr.add_relation(aux.clone(), v.clone(), RelationKind::Condition);
                        dcr.add_relation(u.clone(), v.clone(), RelationKind::Include);
                    }
                    GatewayKind::Inclusive => {
                        if let Some((aux, trace_start)) = or_join_flow_map.get(fid) {
                            dcr.add_relation(u.clone(), aux.clone(), RelationKind::Exclude);
                            dcr.add_relation(aux.clone(), v.clone(), RelationKind::Condition);
                            dcr.add_relation(u.clone(), v.clone(), RelationKind::Include);
                            dcr.add_relation(trace_start.clone(), aux.clone(), RelationKind::Include);
                        }
                    }
                }
            }
        }
    }
}

fn basic(dcr: &mut DcrGraph, u: &str, v: &str) {
    dcr.add_relation(u.to_string(), v.to_string(), RelationKind::Response);
    dcr.add_relation(u.to_string(), v.to_string(), RelationKind::Include);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::normalize::normalize;
    use crate::bpmn::pairing::validate_and_pair;
    use crate::bpmn::parser::parse_bpmn;

    fn compile(xml: &str) -> DcrGraph {
        let mut process = parse_bpmn(xml).unwrap();
        normalize(&mut process);
        let errors = validate_and_pair(&mut process);
        assert!(errors.is_empty(), "{errors:?}");
        translate(&mut process)
    }

    #[test]
    fn linear_process_has_response_and_include_and_self_excludes() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/><task id="T1" name="T1"/><endEvent id="E"/>
<sequenceFlow id="F1" sourceRef="S" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="T1" targetRef="E"/>
</process></definitions>"#;
        let dcr = compile(xml);
        assert_eq!(dcr.events.len(), 3);
        assert!(dcr.relations.contains(&crate::dcr::model::DcrRelation {
            source_id: "S".into(),
            target_id: "T1".into(),
            relation: RelationKind::Response
        }));
        assert!(dcr.relations.contains(&crate::dcr::model::DcrRelation {
            source_id: "T1".into(),
            target_id: "T1".into(),
            relation: RelationKind::Exclude
        }));
        assert_eq!(dcr.initial_marking["S"], Marking::START);
        assert_eq!(dcr.initial_marking["T1"], Marking::DORMANT);
    }

    #[test]
    fn parallel_join_creates_and_aux_per_branch() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/>
<parallelGateway id="P1"/>
<task id="T1" name="T1"/><task id="T2" name="T2"/>
<parallelGateway id="P2"/>
<endEvent id="E"/>
<sequenceFlow id="F0" sourceRef="S" targetRef="P1"/>
<sequenceFlow id="F1" sourceRef="P1" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="P1" targetRef="T2"/>
<sequenceFlow id="F3" sourceRef="T1" targetRef="P2"/>
<sequenceFlow id="F4" sourceRef="T2" targetRef="P2"/>
<sequenceFlow id="F5" sourceRef="P2" targetRef="E"/>
</process></definitions>"#;
        let dcr = compile(xml);
        let and_aux: Vec<_> = dcr.events.keys().filter(|k| k.contains("_AND_")).collect();
        assert_eq!(and_aux.len(), 2);
        assert!(dcr.relations.iter().any(|r| r.source_id == "P1"
            && r.target_id == "P2"
            && r.relation == RelationKind::Response));
    }

    #[test]
    fn relations_are_deduplicated() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/><task id="T1" name="T1"/><endEvent id="E"/>
<sequenceFlow id="F1" sourceRef="S" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="T1" targetRef="E"/>
</process></definitions>"#;
        let dcr = compile(xml);
        let mut sorted = dcr.relations.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), dcr.relations.len());
    }
}
