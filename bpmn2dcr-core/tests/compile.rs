//! End-to-end BPMN -> DCR XML scenarios.

use bpmn2dcr_core::compile;
use bpmn2dcr_core::error::CompileError;
use bpmn2dcr_core::xml::dcr_xml;

fn wrap(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
<process id="Process_1">{body}</process>
</definitions>"#
    )
}

#[test]
fn linear_process_compiles_to_dcr_xml() {
    let xml = wrap(
        r#"<startEvent id="Start_1"/>
<task id="Task_1" name="Do the thing"/>
<endEvent id="End_1"/>
<sequenceFlow id="Flow_1" sourceRef="Start_1" targetRef="Task_1"/>
<sequenceFlow id="Flow_2" sourceRef="Task_1" targetRef="End_1"/>"#,
    );
    let dcr = compile(&xml).expect("compile should succeed");
    assert_eq!(dcr.events.len(), 3);
    let rendered = dcr_xml::to_xml(&dcr).expect("xml emit should succeed");
    assert!(rendered.contains("<dcrgraph>"));
}

#[test]
fn inclusive_single_task_branch_gets_trigger_and_or_aux() {
    let xml = wrap(
        r#"<startEvent id="Start_1"/>
<inclusiveGateway id="O1"/>
<task id="T1" name="T1"/>
<task id="T2" name="T2"/>
<inclusiveGateway id="O2"/>
<endEvent id="End_1"/>
<sequenceFlow id="F0" sourceRef="Start_1" targetRef="O1"/>
<sequenceFlow id="F1" sourceRef="O1" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="O1" targetRef="T2"/>
<sequenceFlow id="F3" sourceRef="T1" targetRef="O2"/>
<sequenceFlow id="F4" sourceRef="T2" targetRef="O2"/>
<sequenceFlow id="F5" sourceRef="O2" targetRef="End_1"/>"#,
    );
    let dcr = compile(&xml).expect("compile should succeed");
    assert!(dcr.events.keys().any(|k| k.starts_with("or_") && k.contains("trigger")));
    assert!(dcr.events.keys().any(|k| k.contains("_OR_")));
}

#[test]
fn unpaired_gateway_surfaces_as_validation_error() {
    let xml = wrap(
        r#"<startEvent id="Start_1"/>
<exclusiveGateway id="X1"/>
<task id="T1" name="T1"/><task id="T2" name="T2"/>
<endEvent id="End_1"/><endEvent id="End_2"/>
<sequenceFlow id="F0" sourceRef="Start_1" targetRef="X1"/>
<sequenceFlow id="F1" sourceRef="X1" targetRef="T1"/>
<sequenceFlow id="F2" sourceRef="X1" targetRef="T2"/>
<sequenceFlow id="F3" sourceRef="T1" targetRef="End_1"/>
<sequenceFlow id="F4" sourceRef="T2" targetRef="End_2"/>"#,
    );
    match compile(&xml) {
        Err(CompileError::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("R4"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn unsupported_element_is_rejected_at_ingest() {
    let xml = wrap(r#"<subProcess id="Sub_1"/>"#);
    match compile(&xml) {
        Err(CompileError::Unsupported { element, .. }) => {
            assert_eq!(element.to_ascii_lowercase(), "subprocess");
        }
        other => panic!("expected Unsupported, got {other:?}"),
    }
}
