//! Top-level compiler facade: parse, normalize, validate & pair, then
//! translate. Synchronous and single-threaded end to end, per request.

use tracing::{info, instrument};

use crate::bpmn::normalize::normalize;
use crate::bpmn::pairing::validate_and_pair;
use crate::bpmn::parser::parse_bpmn;
use crate::dcr::model::DcrGraph;
use crate::dcr::translate::translate;
use crate::error::{CompileError, Result};

/// Compiles a BPMN XML document into a DCR graph.
///
/// Ingest errors short-circuit immediately. Structural/pairing errors
/// (R1-R4) are accumulated and returned together as
/// [`CompileError::Validation`]; no partial graph is produced in that
/// case.
#[instrument(skip_all)]
pub fn compile(bpmn_xml: &str) -> Result<DcrGraph> {
    let mut process = parse_bpmn(bpmn_xml)?;
    normalize(&mut process);

    let errors = validate_and_pair(&mut process);
    if !errors.is_empty() {
        return Err(CompileError::Validation(errors));
    }

    let dcr = translate(&mut process);
    info!(process = %process.process_id, "compiled BPMN process to DCR graph");
    Ok(dcr)
}
