//! DCR XML emit adapter.
//!
//! Produces the `<dcrgraph>` document shape expected by downstream DCR
//! tooling: a `<specification>` (resources + constraints) and a
//! `<runtime>` (initial marking). Event layout is a deterministic grid
//! (step 180x200, wrapping at x=900) purely for visualization; relation
//! wrapper ids are a single monotonic counter shared across all four
//! relation kinds.

use std::collections::BTreeSet;
use std::io::Cursor;

use quick_xml::events::{BytesDecl, Event};
use quick_xml::writer::Writer;

use crate::dcr::model::{DcrGraph, RelationKind};
use crate::error::{CompileError, Result};

type XResult = std::result::Result<(), quick_xml::Error>;

const START_X: i32 = 100;
const START_Y: i32 = 100;
const STEP_X: i32 = 180;
const STEP_Y: i32 = 200;
const MAX_X: i32 = 900;
const EVENT_W: i32 = 130;
const EVENT_H: i32 = 150;

pub fn to_xml(dcr: &DcrGraph) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_document(&mut writer, dcr).map_err(|e| CompileError::Internal(e.to_string()))?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| CompileError::Internal(e.to_string()))
}

fn write_document(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("dcrgraph")
        .write_inner_content(|writer| {
            writer
                .create_element("specification")
                .write_inner_content(|writer| {
                    write_resources(writer, dcr)?;
                    write_constraints(writer, dcr)?;
                    Ok(())
                })?;
            writer
                .create_element("runtime")
                .write_inner_content(|writer| write_marking(writer, dcr))?;
            Ok(())
        })?;
    Ok(())
}

fn empty(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str) -> XResult {
    writer.create_element(tag).write_empty()?;
    Ok(())
}

fn write_resources(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer
        .create_element("resources")
        .write_inner_content(|writer| {
            write_events(writer, dcr)?;
            write_labels(writer, dcr)?;
            write_label_mappings(writer, dcr)?;
            empty(writer, "subProcesses")?;
            empty(writer, "variables")?;
            empty(writer, "expressions")?;
            writer
                .create_element("variableAccesses")
                .write_inner_content(|writer| {
                    empty(writer, "readAccessess")?;
                    empty(writer, "writeAccessess")?;
                    Ok(())
                })?;
            Ok(())
        })?;
    Ok(())
}

fn write_events(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer.create_element("events").write_inner_content(|writer| {
        let mut x = START_X;
        let mut y = START_Y;
        for id in dcr.events.keys() {
            writer
                .create_element("event")
                .with_attribute(("id", id.as_str()))
                .write_inner_content(|writer| {
                    writer
                        .create_element("custom")
                        .write_inner_content(|writer| {
                            writer
                                .create_element("visualization")
                                .write_inner_content(|writer| {
                                    writer
                                        .create_element("location")
                                        .with_attribute(("xLoc", x.to_string().as_str()))
                                        .with_attribute(("yLoc", y.to_string().as_str()))
                                        .write_empty()?;
                                    writer
                                        .create_element("size")
                                        .with_attribute(("width", EVENT_W.to_string().as_str()))
                                        .with_attribute(("height", EVENT_H.to_string().as_str()))
                                        .write_empty()?;
                                    Ok(())
                                })?;
                            Ok(())
                        })?;
                    Ok(())
                })?;
            x += STEP_X;
            if x > MAX_X {
                x = START_X;
                y += STEP_Y;
            }
        }
        Ok(())
    })?;
    Ok(())
}

fn write_labels(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    let labels: BTreeSet<&String> = dcr.labelling.values().collect();
    writer.create_element("labels").write_inner_content(|writer| {
        for label in labels {
            writer
                .create_element("label")
                .with_attribute(("id", label.as_str()))
                .write_empty()?;
        }
        Ok(())
    })?;
    Ok(())
}

fn write_label_mappings(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer
        .create_element("labelMappings")
        .write_inner_content(|writer| {
            for (event_id, label) in &dcr.labelling {
                writer
                    .create_element("labelMapping")
                    .with_attribute(("eventId", event_id.as_str()))
                    .with_attribute(("labelId", label.as_str()))
                    .write_empty()?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_constraints(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer
        .create_element("constraints")
        .write_inner_content(|writer| {
            let mut counter = 1u32;
            write_relation_group(writer, dcr, RelationKind::Condition, "conditions", "condition", &mut counter)?;
            write_relation_group(writer, dcr, RelationKind::Response, "responses", "response", &mut counter)?;
            write_relation_group(writer, dcr, RelationKind::Include, "includes", "include", &mut counter)?;
            write_relation_group(writer, dcr, RelationKind::Exclude, "excludes", "exclude", &mut counter)?;
            empty(writer, "coresponces")?;
            empty(writer, "milestones")?;
            empty(writer, "updates")?;
            empty(writer, "spawns")?;
            Ok(())
        })?;
    Ok(())
}

fn write_relation_group(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    dcr: &DcrGraph,
    kind: RelationKind,
    group_tag: &str,
    item_tag: &str,
    counter: &mut u32,
) -> XResult {
    writer
        .create_element(group_tag)
        .write_inner_content(|writer| {
            for rel in dcr.relations.iter().filter(|r| r.relation == kind) {
                let relation_label = format!("Relation_{counter}");
                *counter += 1;
                writer
                    .create_element(item_tag)
                    .with_attribute(("sourceId", rel.source_id.as_str()))
                    .with_attribute(("targetId", rel.target_id.as_str()))
                    .write_inner_content(|writer| {
                        writer
                            .create_element("custom")
                            .write_inner_content(|writer| {
                                empty(writer, "waypoints")?;
                                writer
                                    .create_element("id")
                                    .with_attribute(("id", relation_label.as_str()))
                                    .write_empty()?;
                                Ok(())
                            })?;
                        Ok(())
                    })?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_marking(writer: &mut Writer<Cursor<Vec<u8>>>, dcr: &DcrGraph) -> XResult {
    writer.create_element("marking").write_inner_content(|writer| {
        write_event_ids(writer, "executed", dcr, |m| m.executed)?;
        write_event_ids(writer, "included", dcr, |m| m.included)?;
        write_event_ids(writer, "pendingResponses", dcr, |m| m.pending)?;
        empty(writer, "globalStore")?;
        Ok(())
    })?;
    Ok(())
}

fn write_event_ids(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    dcr: &DcrGraph,
    pred: impl Fn(&crate::dcr::model::Marking) -> bool,
) -> XResult {
    writer.create_element(tag).write_inner_content(|writer| {
        for (id, marking) in &dcr.initial_marking {
            if pred(marking) {
                writer
                    .create_element("event")
                    .with_attribute(("id", id.as_str()))
                    .write_empty()?;
            }
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcr::model::Marking;

    #[test]
    fn emits_root_and_sections() {
        let mut dcr = DcrGraph::default();
        dcr.add_event("S", "Start Event", Marking::START);
        dcr.add_event("T1", "T1", Marking::DORMANT);
        dcr.add_relation("S", "T1", RelationKind::Response);
        dcr.add_relation("S", "T1", RelationKind::Include);
        dcr.dedup_relations();

        let xml = to_xml(&dcr).expect("serialization should succeed");
        assert!(xml.contains("<dcrgraph>"));
        assert!(xml.contains("<specification>"));
        assert!(xml.contains("<runtime>"));
        assert!(xml.contains(r#"sourceId="S""#));
        assert!(xml.contains("Relation_1"));
    }
}
