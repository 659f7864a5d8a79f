//! Fault reporting

use colored::Colorize;
use miette::{NamedSource, Report};
use serde::Serialize;
use tsql_lower::LowerFault;

/// Source text the faults point into
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// One fault in the JSON fault log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub code: &'static str,
    pub message: String,
    pub offset: usize,
    pub length: usize,
}

impl From<&LowerFault> for FaultRecord {
    fn from(fault: &LowerFault) -> Self {
        let span = fault.span();
        Self {
            code: fault.code_name(),
            message: fault.to_string(),
            offset: span.offset(),
            length: span.len(),
        }
    }
}

/// Print every fault to stderr, rendered against the source when it is known
pub fn print_faults(faults: &[LowerFault], source: Option<&SourceFile>) {
    for fault in faults {
        match source {
            Some(source) => {
                let report = Report::new(fault.clone())
                    .with_source_code(NamedSource::new(&source.name, source.text.clone()));
                eprintln!("{report:?}");
            }
            None => {
                eprintln!("  {} [{}] {}", "✗".yellow(), fault.code_name(), fault);
            }
        }
    }
}

/// One-line summary of a lowering run
pub fn print_summary(procedures: usize, faults: usize) {
    if faults == 0 {
        eprintln!(
            "{} {} procedure(s), no faults",
            "Lowered:".green().bold(),
            procedures
        );
    } else {
        eprintln!(
            "{} {} procedure(s), {} fault(s)",
            "Lowered:".yellow().bold(),
            procedures,
            faults
        );
    }
}

pub fn faults_json(faults: &[LowerFault]) -> serde_json::Result<String> {
    let records: Vec<FaultRecord> = faults.iter().map(FaultRecord::from).collect();
    serde_json::to_string_pretty(&records)
}
