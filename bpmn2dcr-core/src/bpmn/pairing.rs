//! Structural validator and gateway pairing pass.
//!
//! Checks R1-R3 are plain structural counts. R4 is discharged by pairing
//! every split gateway with a join of the same kind via a multi-source,
//! origin-tracking BFS that tolerates cycles by treating end events as
//! "terminated branches" rather than failures. Exclusive pairs are then
//! classified as loops or plain branches by enumerating every acyclic
//! start-to-end path. Inclusive pairs additionally get their branch
//! traces enumerated for the translation engine.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{info, warn};

use crate::bpmn::model::{
    BpmnProcess, EventKind, GatewayKind, GatewayPair, GatewayRole, InclusiveTrace, ObjectId,
    ObjectKind,
};

/// Runs R1-R4 and, if structurally sound, populates `process.pairs`.
/// Returns the accumulated list of human-readable errors; empty means
/// the process is ready for translation.
pub fn validate_and_pair(process: &mut BpmnProcess) -> Vec<String> {
    let mut errors = Vec::new();

    check_start_end(process, &mut errors);
    check_tasks(process, &mut errors);
    let valid_gateways = check_and_classify_gateways(process, &mut errors);

    let pairs = pair_gateways(process, &valid_gateways, &mut errors);
    let all_paths = enumerate_all_paths(process);

    let mut named_pairs = Vec::with_capacity(pairs.len());
    let mut kind_counters: HashMap<GatewayKind, u32> = HashMap::new();
    let mut loop_counter = 0u32;

    for (kind, split_id, join_id) in pairs {
        let is_loop = kind == GatewayKind::Exclusive && is_loop_pair(&all_paths, &split_id, &join_id);
        let n = kind_counters.entry(kind).or_insert(0);
        *n += 1;
        let n = *n;

        let (split_name, join_name) = if is_loop {
            loop_counter += 1;
            (
                format!("Exclusive {n} -- Split (Loop {loop_counter} Out)"),
                format!("Exclusive {n} -- Join (Loop {loop_counter} In)"),
            )
        } else {
            (
                format!("{} {n} -- Split", kind.label()),
                format!("{} {n} -- Join", kind.label()),
            )
        };
        process.object_mut(&split_id).canonical_name = split_name;
        process.object_mut(&join_id).canonical_name = join_name;

        let inclusive_traces = if kind == GatewayKind::Inclusive {
            trace_inclusive_branches(process, &split_id, &join_id)
        } else {
            Vec::new()
        };

        named_pairs.push(GatewayPair {
            pair_id: named_pairs.len() as u32 + 1,
            kind,
            split_id,
            join_id,
            is_loop,
            inclusive_traces,
        });
    }

    if errors.is_empty() {
        info!(pairs = named_pairs.len(), "gateway pairing complete");
        process.pairs = named_pairs;
    } else {
        warn!(count = errors.len(), "BPMN validation failed");
    }

    errors
}

fn check_start_end(process: &BpmnProcess, errors: &mut Vec<String>) {
    let start_count = process
        .objects_in_order()
        .filter(|o| o.event_kind() == Some(EventKind::StartEvent))
        .count();
    let end_count = process
        .objects_in_order()
        .filter(|o| o.event_kind() == Some(EventKind::EndEvent))
        .count();
    if start_count != 1 {
        errors.push(format!(
            "R1: process must have exactly one start event, found {start_count}"
        ));
    }
    if end_count < 1 {
        errors.push("R1: process must have at least one end event, found 0".to_string());
    }
}

fn check_tasks(process: &BpmnProcess, errors: &mut Vec<String>) {
    for obj in process.objects_in_order() {
        if !obj.is_task() {
            continue;
        }
        if obj.incoming.len() != 1 || obj.outgoing.len() != 1 {
            errors.push(format!(
                "R2: task {} must have exactly one incoming and one outgoing flow, found {} in / {} out",
                obj.id,
                obj.incoming.len(),
                obj.outgoing.len()
            ));
        }
    }
}

/// Determines each gateway's actual role from its flow counts, writing
/// the resolved role back onto the object. Returns the ids of gateways
/// whose shape matched Split or Join so the pairing pass only considers
/// structurally valid gateways.
fn check_and_classify_gateways(process: &mut BpmnProcess, errors: &mut Vec<String>) -> Vec<ObjectId> {
    let gateway_ids: Vec<ObjectId> = process.gateways().into_iter().map(|o| o.id.clone()).collect();
    let mut valid = Vec::new();

    for id in gateway_ids {
        let obj = process.object(&id);
        let (kind, _) = obj.gateway().expect("filtered to gateways");
        let (n_in, n_out) = (obj.incoming.len(), obj.outgoing.len());

        let role = if n_in == 1 && n_out > 1 {
            Some(GatewayRole::Split)
        } else if n_in > 1 && n_out == 1 {
            Some(GatewayRole::Join)
        } else {
            None
        };

        match role {
            Some(role) => {
                process.object_mut(&id).kind = ObjectKind::Gateway { kind, role };
                valid.push(id);
            }
            None => {
                errors.push(format!(
                    "R3: gateway {id} has an invalid shape ({n_in} in / {n_out} out); expected 1-in/N-out (split) or N-in/1-out (join)"
                ));
            }
        }
    }
    valid
}

/// Pairs every split gateway in `valid_gateways` with a join of the same
/// kind via BFS from the start event, in the order splits are first
/// encountered. Appends an R4 error for every gateway left unpaired.
fn pair_gateways(
    process: &BpmnProcess,
    valid_gateways: &[ObjectId],
    errors: &mut Vec<String>,
) -> Vec<(GatewayKind, ObjectId, ObjectId)> {
    let Some(start) = process.start_event() else {
        return Vec::new();
    };

    let mut paired: HashSet<ObjectId> = HashSet::new();
    let mut pairs = Vec::new();

    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start.id.clone()]);
    visited.insert(start.id.clone());

    while let Some(node) = queue.pop_front() {
        if let Some((kind, GatewayRole::Split)) = process.object(&node).gateway() {
            if valid_gateways.contains(&node) && !paired.contains(&node) {
                let candidates: HashSet<ObjectId> = valid_gateways
                    .iter()
                    .filter(|g| {
                        !paired.contains(*g)
                            && matches!(process.object(g.as_str()).gateway(), Some((k, GatewayRole::Join)) if k == kind)
                    })
                    .cloned()
                    .collect();
                if let Some(join) = find_join(process, &node, &candidates) {
                    paired.insert(node.clone());
                    paired.insert(join.clone());
                    pairs.push((kind, node.clone(), join));
                }
            }
        }
        for succ in process.successors(&node) {
            if visited.insert(succ.clone()) {
                queue.push_back(succ);
            }
        }
    }

    for id in valid_gateways {
        if !paired.contains(id) {
            errors.push(format!("R4: gateway {id} has no matching join/split of the same kind"));
        }
    }

    pairs
}

/// Multi-source BFS from every immediate successor of `split`, tracking
/// which successor ("origin") each visited node is reachable from. A
/// candidate join is accepted once the union of its live origins and the
/// origins that have already terminated at an end event covers every
/// child of the split.
fn find_join(process: &BpmnProcess, split: &str, candidates: &HashSet<ObjectId>) -> Option<ObjectId> {
    let children = process.successors(split);
    if children.is_empty() {
        return None;
    }
    let all_origins: HashSet<usize> = (0..children.len()).collect();

    let mut seen: HashMap<ObjectId, HashSet<usize>> = HashMap::new();
    let mut terminated: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<(ObjectId, usize)> = VecDeque::new();
    for (i, child) in children.iter().enumerate() {
        queue.push_back((child.clone(), i));
    }

    while let Some((node, origin)) = queue.pop_front() {
        let entry = seen.entry(node.clone()).or_default();
        if !entry.insert(origin) {
            continue;
        }
        let origins_here = entry.clone();

        if process.object(&node).event_kind() == Some(EventKind::EndEvent) {
            terminated.insert(origin);
            // A termination can complete the coverage of a candidate seen
            // earlier on a different branch, so every candidate needs
            // rechecking here, not just the node that just terminated.
            if let Some(join) = fully_covered_candidate(candidates, &seen, &terminated, &all_origins) {
                return Some(join);
            }
            continue;
        }

        if candidates.contains(&node) {
            let covered: HashSet<usize> = origins_here.union(&terminated).copied().collect();
            if covered == all_origins {
                return Some(node);
            }
        }

        for succ in process.successors(&node) {
            queue.push_back((succ, origin));
        }
    }
    None
}

/// Scans every candidate for one whose visited origins, unioned with the
/// origins that have already terminated at an end event, cover all of the
/// split's children. Ties are broken by id so the result stays
/// deterministic regardless of `HashSet` iteration order.
fn fully_covered_candidate(
    candidates: &HashSet<ObjectId>,
    seen: &HashMap<ObjectId, HashSet<usize>>,
    terminated: &HashSet<usize>,
    all_origins: &HashSet<usize>,
) -> Option<ObjectId> {
    let mut covered: Vec<&ObjectId> = candidates
        .iter()
        .filter(|c| {
            seen.get(*c)
                .map(|origins| origins.union(terminated).copied().collect::<HashSet<usize>>() == *all_origins)
                .unwrap_or(false)
        })
        .collect();
    covered.sort();
    covered.into_iter().next().cloned()
}

fn is_loop_pair(all_paths: &[Vec<ObjectId>], split: &str, join: &str) -> bool {
    let containing: Vec<&Vec<ObjectId>> = all_paths
        .iter()
        .filter(|p| p.iter().any(|n| n == split) && p.iter().any(|n| n == join))
        .collect();
    !containing.is_empty()
        && containing.iter().all(|p| {
            let split_pos = p.iter().position(|n| n == split).unwrap();
            let join_pos = p.iter().position(|n| n == join).unwrap();
            join_pos < split_pos
        })
}

/// Enumerates every acyclic path from the start event to any end event.
/// Exponential in pathological diamond-of-diamonds graphs, but this is
/// the same approach the reference compiler uses and is adequate for the
/// modestly sized processes this compiler targets.
fn enumerate_all_paths(process: &BpmnProcess) -> Vec<Vec<ObjectId>> {
    let mut out = Vec::new();
    let Some(start) = process.start_event() else {
        return out;
    };
    let mut path = vec![start.id.clone()];
    let mut on_path: HashSet<ObjectId> = HashSet::from([start.id.clone()]);
    dfs_paths(process, &start.id, &mut path, &mut on_path, &mut out);
    out
}

fn dfs_paths(
    process: &BpmnProcess,
    node: &str,
    path: &mut Vec<ObjectId>,
    on_path: &mut HashSet<ObjectId>,
    out: &mut Vec<Vec<ObjectId>>,
) {
    if process.object(node).event_kind() == Some(EventKind::EndEvent) {
        out.push(path.clone());
        return;
    }
    for succ in process.successors(node) {
        if on_path.contains(&succ) {
            continue;
        }
        path.push(succ.clone());
        on_path.insert(succ.clone());
        dfs_paths(process, &succ, path, on_path, out);
        path.pop();
        on_path.remove(&succ);
    }
}

/// For each immediate successor of `split`, BFS forward (never revisiting
/// split or join) and record every predecessor-of-join reached.
fn trace_inclusive_branches(process: &BpmnProcess, split: &str, join: &str) -> Vec<InclusiveTrace> {
    let preds_of_join: HashSet<ObjectId> = process.predecessors(join).into_iter().collect();
    let mut traces = Vec::new();
    let mut trace_id = 0u32;

    for start in process.successors(split) {
        let mut visited: HashSet<ObjectId> =
            HashSet::from([split.to_string(), join.to_string(), start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(node) = queue.pop_front() {
            if preds_of_join.contains(&node) {
                trace_id += 1;
                traces.push(InclusiveTrace {
                    trace_id,
                    start_object_id: start.clone(),
                    end_object_id: node.clone(),
                });
            }
            for succ in process.successors(&node) {
                if visited.insert(succ.clone()) {
                    queue.push_back(succ);
                }
            }
        }
    }
    traces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::parser::parse_bpmn;

    fn linear() -> BpmnProcess {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/><task id="T1" name="T1"/><endEvent id="E"/>
<sequenceFlow id="F1" sourceRef="S" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="T1" targetRef="E"/>
</process></definitions>"#;
        parse_bpmn(xml).unwrap()
    }

    #[test]
    fn linear_process_has_no_errors_and_no_pairs() {
        let mut process = linear();
        let errors = validate_and_pair(&mut process);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(process.pairs.is_empty());
    }

    #[test]
    fn exclusive_branch_pairs_and_names_gateways() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/>
<exclusiveGateway id="X1"/>
<task id="T1" name="T1"/><task id="T2" name="T2"/>
<exclusiveGateway id="X2"/>
<endEvent id="E"/>
<sequenceFlow id="F0" sourceRef="S" targetRef="X1"/>
<sequenceFlow id="F1" sourceRef="X1" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="X1" targetRef="T2"/>
<sequenceFlow id="F3" sourceRef="T1" targetRef="X2"/>
<sequenceFlow id="F4" sourceRef="T2" targetRef="X2"/>
<sequenceFlow id="F5" sourceRef="X2" targetRef="E"/>
</process></definitions>"#;
        let mut process = parse_bpmn(xml).unwrap();
        let errors = validate_and_pair(&mut process);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(process.pairs.len(), 1);
        let pair = &process.pairs[0];
        assert!(!pair.is_loop);
        assert_eq!(process.object("X1").canonical_name, "Exclusive 1 -- Split");
        assert_eq!(process.object("X2").canonical_name, "Exclusive 1 -- Join");
    }

    #[test]
    fn unpaired_gateway_reports_r4() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/>
<exclusiveGateway id="X1"/>
<task id="T1" name="T1"/><task id="T2" name="T2"/>
<endEvent id="E1"/><endEvent id="E2"/>
<sequenceFlow id="F0" sourceRef="S" targetRef="X1"/>
<sequenceFlow id="F1" sourceRef="X1" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="X1" targetRef="T2"/>
<sequenceFlow id="F3" sourceRef="T1" targetRef="E1"/>
<sequenceFlow id="F4" sourceRef="T2" targetRef="E2"/>
</process></definitions>"#;
        let mut process = parse_bpmn(xml).unwrap();
        let errors = validate_and_pair(&mut process);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("R4"));
    }

    #[test]
    fn exclusive_loop_is_classified() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/>
<exclusiveGateway id="XJ"/>
<task id="T1" name="T1"/>
<exclusiveGateway id="XS"/>
<endEvent id="E"/>
<sequenceFlow id="F0" sourceRef="S" targetRef="XJ"/>
<sequenceFlow id="F1" sourceRef="XJ" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="T1" targetRef="XS"/>
<sequenceFlow id="F3" sourceRef="XS" targetRef="XJ"/>
<sequenceFlow id="F4" sourceRef="XS" targetRef="E"/>
</process></definitions>"#;
        let mut process = parse_bpmn(xml).unwrap();
        let errors = validate_and_pair(&mut process);
        assert!(errors.is_empty(), "{errors:?}");
        let pair = &process.pairs[0];
        assert!(pair.is_loop);
        assert_eq!(process.object("XS").canonical_name, "Exclusive 1 -- Split (Loop 1 Out)");
        assert_eq!(process.object("XJ").canonical_name, "Exclusive 1 -- Join (Loop 1 In)");
    }
}
