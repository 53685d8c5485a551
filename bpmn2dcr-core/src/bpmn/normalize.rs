//! Normalizer & Namer: assigns canonical names to start/end events.
//!
//! Tasks keep whatever name the ingest adapter already resolved (author
//! name, falling back to id). Gateway names are assigned later by the
//! pairing pass, once pairs are known.

use crate::bpmn::model::{BpmnProcess, EventKind};

pub fn normalize(process: &mut BpmnProcess) {
    let start_id = process.start_event().map(|o| o.id.clone());
    if let Some(id) = start_id {
        process.object_mut(&id).canonical_name = "Start Event".to_string();
    }

    let end_ids: Vec<String> = process
        .end_events()
        .into_iter()
        .map(|o| o.id.clone())
        .collect();
    for (n, id) in end_ids.into_iter().enumerate() {
        process.object_mut(&id).canonical_name = format!("End Event {}", n + 1);
    }

    debug_assert!(
        process
            .objects_in_order()
            .filter(|o| o.event_kind() == Some(EventKind::StartEvent))
            .count()
            <= 1
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::parser::parse_bpmn;

    #[test]
    fn names_start_and_end_events() {
        let xml = r#"<?xml version="1.0"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="P">
<startEvent id="S"/>
<endEvent id="E1"/>
<endEvent id="E2"/>
<sequenceFlow id="F1" sourceRef="S" targetRef="E1"/>
<sequenceFlow id="F2" sourceRef="S" targetRef="E2"/>
</process>
</definitions>"#;
        let mut process = parse_bpmn(xml).unwrap();
        normalize(&mut process);
        assert_eq!(process.object("S").canonical_name, "Start Event");
        assert_eq!(process.object("E1").canonical_name, "End Event 1");
        assert_eq!(process.object("E2").canonical_name, "End Event 2");
    }
}
