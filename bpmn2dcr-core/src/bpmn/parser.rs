//! Streaming (SAX-style) BPMN 2.0 XML ingest adapter.
//!
//! Recognizes exactly the element set this compiler supports: `task`,
//! `startEvent`, `endEvent`, `sequenceFlow`, and the three gateway kinds.
//! Namespace prefixes are stripped before matching so `bpmn:task`,
//! `task`, and (tolerantly) `Task` are all accepted. Anything else
//! encountered directly inside `<process>` is rejected rather than
//! silently treated as a task or silently skipped, with the exception of
//! a small whitelist of purely descriptive child elements.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info};

use crate::bpmn::model::{
    BpmnGraph, BpmnObject, BpmnProcess, EventKind, GatewayKind, GatewayRole, ObjectKind,
    SequenceFlow,
};
use crate::error::{CompileError, Result};

/// Elements whose content we do not need and that never indicate an
/// unsupported process shape; safe to ignore wherever they appear.
const IGNORABLE: &[&str] = &["incoming", "outgoing"];

/// Elements that bracket opaque vendor content; everything nested inside
/// is skipped without inspection.
const SKIP_CONTAINERS: &[&str] = &["extensionElements", "documentation"];

struct RawElement {
    id: String,
    tag: String,
    name: Option<String>,
}

struct RawFlow {
    id: String,
    source: String,
    target: String,
}

pub fn parse_bpmn(xml: &str) -> Result<BpmnProcess> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut process_id: Option<String> = None;
    let mut process_count = 0u32;
    let mut in_process = false;
    let mut skip_depth = 0u32;
    let mut elements: Vec<RawElement> = Vec::new();
    let mut flows: Vec<RawFlow> = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CompileError::Ingest(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                let tag = local_name(&e);
                if IGNORABLE.contains(&tag.as_str()) {
                    continue;
                }
                if SKIP_CONTAINERS.contains(&tag.as_str()) {
                    skip_depth = 1;
                    continue;
                }
                if tag.eq_ignore_ascii_case("process") {
                    let attrs = get_attrs(&e)?;
                    process_count += 1;
                    process_id = attrs.get("id").cloned();
                    in_process = true;
                    continue;
                }
                if !in_process {
                    continue;
                }
                handle_element(&tag, &e, &mut elements, &mut flows)?;
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let tag = local_name(&e);
                if IGNORABLE.contains(&tag.as_str()) || SKIP_CONTAINERS.contains(&tag.as_str()) {
                    continue;
                }
                if tag.eq_ignore_ascii_case("process") {
                    let attrs = get_attrs(&e)?;
                    process_count += 1;
                    process_id = attrs.get("id").cloned();
                    continue;
                }
                if !in_process {
                    continue;
                }
                handle_element(&tag, &e, &mut elements, &mut flows)?;
            }
            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                let tag = local_name_end(&e);
                if tag.eq_ignore_ascii_case("process") {
                    in_process = false;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if process_count != 1 {
        return Err(CompileError::Ingest(format!(
            "expected exactly one <process> element, found {process_count}"
        )));
    }
    let process_id = process_id.unwrap_or_else(|| "Process".to_string());

    info!(elements = elements.len(), flows = flows.len(), "parsed BPMN document");
    build_process(process_id, elements, flows)
}

fn handle_element(
    tag: &str,
    e: &BytesStart,
    elements: &mut Vec<RawElement>,
    flows: &mut Vec<RawFlow>,
) -> Result<()> {
    let attrs = get_attrs(e)?;
    let id = attrs
        .get("id")
        .cloned()
        .ok_or_else(|| CompileError::Ingest(format!("<{tag}> is missing required id attribute")))?;

    if tag.eq_ignore_ascii_case("sequenceFlow") {
        let source = attrs.get("sourceRef").cloned().ok_or_else(|| {
            CompileError::Ingest(format!("sequenceFlow {id} is missing sourceRef"))
        })?;
        let target = attrs.get("targetRef").cloned().ok_or_else(|| {
            CompileError::Ingest(format!("sequenceFlow {id} is missing targetRef"))
        })?;
        flows.push(RawFlow { id, source, target });
        return Ok(());
    }

    if !is_recognized(tag) {
        return Err(CompileError::Unsupported {
            element: tag.to_string(),
            id,
        });
    }

    elements.push(RawElement {
        id,
        tag: tag.to_string(),
        name: attrs.get("name").cloned(),
    });
    Ok(())
}

fn is_recognized(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "task" | "startevent" | "endevent" | "exclusivegateway" | "parallelgateway"
            | "inclusivegateway"
    )
}

fn object_kind_for(tag: &str) -> ObjectKind {
    match tag.to_ascii_lowercase().as_str() {
        "task" => ObjectKind::Task,
        "startevent" => ObjectKind::Event(EventKind::StartEvent),
        "endevent" => ObjectKind::Event(EventKind::EndEvent),
        "exclusivegateway" => ObjectKind::Gateway {
            kind: GatewayKind::Exclusive,
            role: GatewayRole::Split,
        },
        "parallelgateway" => ObjectKind::Gateway {
            kind: GatewayKind::Parallel,
            role: GatewayRole::Split,
        },
        "inclusivegateway" => ObjectKind::Gateway {
            kind: GatewayKind::Inclusive,
            role: GatewayRole::Split,
        },
        other => unreachable!("unrecognized tag reached object_kind_for: {other}"),
    }
}

fn build_process(
    process_id: String,
    elements: Vec<RawElement>,
    flows: Vec<RawFlow>,
) -> Result<BpmnProcess> {
    let mut graph: BpmnGraph = BpmnGraph::new();
    let mut index: HashMap<String, NodeIndex> = HashMap::new();

    for el in &elements {
        if index.contains_key(&el.id) {
            return Err(CompileError::Ingest(format!("duplicate element id {}", el.id)));
        }
        let obj = BpmnObject {
            id: el.id.clone(),
            kind: object_kind_for(&el.tag),
            canonical_name: el.name.clone().unwrap_or_else(|| el.id.clone()),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };
        let ix = graph.add_node(obj);
        index.insert(el.id.clone(), ix);
    }

    let mut flow_map: HashMap<String, SequenceFlow> = HashMap::with_capacity(flows.len());
    for f in flows {
        let &src_ix = index.get(&f.source).ok_or_else(|| {
            CompileError::Internal(format!(
                "sequenceFlow {} references unknown sourceRef {}",
                f.id, f.source
            ))
        })?;
        let &tgt_ix = index.get(&f.target).ok_or_else(|| {
            CompileError::Internal(format!(
                "sequenceFlow {} references unknown targetRef {}",
                f.id, f.target
            ))
        })?;
        let flow = SequenceFlow {
            id: f.id.clone(),
            source: f.source.clone(),
            target: f.target.clone(),
        };
        graph.add_edge(src_ix, tgt_ix, flow.clone());
        graph[src_ix].outgoing.push(f.id.clone());
        graph[tgt_ix].incoming.push(f.id.clone());
        debug!(flow = %f.id, source = %f.source, target = %f.target, "linked sequence flow");
        flow_map.insert(f.id, flow);
    }

    Ok(BpmnProcess {
        process_id,
        graph,
        index,
        flows: flow_map,
        pairs: Vec::new(),
    })
}

fn get_attrs(e: &BytesStart) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CompileError::Ingest(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| CompileError::Ingest(e.to_string()))?
            .to_string();
        map.insert(key, value);
    }
    Ok(map)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn local_name_end(e: &quick_xml::events::BytesEnd) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="Process_1">{body}</process>
</definitions>"#
        )
    }

    #[test]
    fn parses_linear_process() {
        let xml = wrap(
            r#"<startEvent id="Start_1" name="Start"/>
<task id="Task_1" name="Do the thing"/>
<endEvent id="End_1" name="End"/>
<sequenceFlow id="Flow_1" sourceRef="Start_1" targetRef="Task_1"/>
<sequenceFlow id="Flow_2" sourceRef="Task_1" targetRef="End_1"/>"#,
        );
        let process = parse_bpmn(&xml).expect("parse should succeed");
        assert_eq!(process.objects_in_order().count(), 3);
        assert_eq!(process.successors("Start_1"), vec!["Task_1".to_string()]);
        assert_eq!(process.predecessors("End_1"), vec!["Task_1".to_string()]);
    }

    #[test]
    fn rejects_unsupported_element() {
        let xml = wrap(r#"<subProcess id="Sub_1"/>"#);
        let err = parse_bpmn(&xml).unwrap_err();
        match err {
            CompileError::Unsupported { element, id } => {
                assert_eq!(element.to_ascii_lowercase(), "subprocess");
                assert_eq!(id, "Sub_1");
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_process_element() {
        let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL"/>"#;
        let err = parse_bpmn(xml).unwrap_err();
        assert!(matches!(err, CompileError::Ingest(_)));
    }

    #[test]
    fn ignores_incoming_outgoing_children() {
        let xml = wrap(
            r#"<startEvent id="Start_1"><outgoing>Flow_1</outgoing></startEvent>
<task id="Task_1"><incoming>Flow_1</incoming></task>
<sequenceFlow id="Flow_1" sourceRef="Start_1" targetRef="Task_1"/>"#,
        );
        let process = parse_bpmn(&xml).expect("parse should succeed");
        assert_eq!(process.objects_in_order().count(), 2);
    }
}
