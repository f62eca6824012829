// BSD 3-Clause License
//
// Copyright © 2020-2021 Keegan Saunders
// Copyright © 2020 VTIL Project
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this
//    list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice,
//    this list of conditions and the following disclaimer in the documentation
//    and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its
//    contributors may be used to endorse or promote products derived from
//    this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
//

use crate::inst::{Instruction, SrcLocation};
use getset::{CopyGetters, Getters};
use std::fmt;
use std::io;
use tracing::trace;

/// Severity of a recorded diagnostic.
///
/// Only the error categories affect the validation verdict; warnings and
/// informational records change presentation alone.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Rule violation bound to a specific instruction
    InstructionError,
    /// Rule violation concerning the whole program
    GlobalError,
    /// Suspicious but legal construct
    Warning,
    /// Informational note
    Info,
}

impl Category {
    /// Whether records of this category fail the shader
    pub fn is_error(self) -> bool {
        matches!(self, Category::InstructionError | Category::GlobalError)
    }

    /// Label used in the serialized log
    pub fn label(self) -> &'static str {
        match self {
            Category::InstructionError | Category::GlobalError => "error",
            Category::Warning => "warning",
            Category::Info => "info",
        }
    }
}

/// One recorded diagnostic, bound to its source location when the
/// assembler provided one through comment metadata
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Diagnostic {
    #[get_copy = "pub"]
    /// Severity category
    category: Category,
    #[get = "pub"]
    /// Human-readable message
    message: String,
    #[get_copy = "pub"]
    /// 1-based index of the bound instruction, if any
    spew_index: Option<u32>,
    #[get = "pub"]
    /// Source location inherited from the bound instruction
    location: SrcLocation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(file) = self.location.file() {
            f.write_str(file)?;
            if let Some(line) = self.location.line() {
                write!(f, "({})", line)?;
            }
            f.write_str(": ")?;
        } else if let Some(line) = self.location.line() {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}: ", self.category.label())?;
        if let Some(index) = self.spew_index {
            write!(f, "instruction {}: ", index)?;
        }
        f.write_str(&self.message)
    }
}

/// Accumulates diagnostics in program order and serializes the final log
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    records: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticSink {
    pub fn new() -> DiagnosticSink {
        DiagnosticSink::default()
    }

    /// Record a diagnostic, binding the instruction's position and source
    /// location when one is given
    pub fn record(&mut self, category: Category, inst: Option<&Instruction>, message: String) {
        trace!(category = category.label(), %message, "shader diagnostic");
        if category.is_error() {
            self.error_count += 1;
        }
        self.records.push(Diagnostic {
            category,
            message,
            spew_index: inst.map(|i| i.spew_index()),
            location: inst.map(|i| i.location().clone()).unwrap_or_default(),
        });
    }

    pub(crate) fn instruction_error(&mut self, inst: &Instruction, message: String) {
        self.record(Category::InstructionError, Some(inst), message);
    }

    pub(crate) fn global_error(&mut self, message: String) {
        self.record(Category::GlobalError, None, message);
    }

    pub(crate) fn warning(&mut self, inst: Option<&Instruction>, message: String) {
        self.record(Category::Warning, inst, message);
    }

    /// Whether any error-category diagnostic was recorded
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Recorded diagnostics in order
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub(crate) fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }
}

/// Number of bytes [`write_log`] will produce for these diagnostics
pub fn required_log_size(records: &[Diagnostic]) -> usize {
    records.iter().map(|r| r.to_string().len() + 1).sum()
}

/// Serialize the log, one line per diagnostic, into any writer
pub fn write_log(records: &[Diagnostic], writer: &mut dyn io::Write) -> io::Result<()> {
    for record in records {
        writeln!(writer, "{}", record)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inst::Instruction;
    use crate::Opcode;

    fn bound_instruction() -> Instruction {
        Instruction::new(
            Opcode::Mov as u16,
            false,
            1,
            2,
            SrcLocation::new(Some("shader.psh".to_string()), Some(14)),
        )
    }

    #[test]
    fn errors_flip_the_verdict_warnings_do_not() {
        let mut sink = DiagnosticSink::new();
        sink.warning(None, "suspicious".to_string());
        sink.record(Category::Info, None, "note".to_string());
        assert!(!sink.has_errors());
        sink.global_error("broken".to_string());
        assert!(sink.has_errors());
    }

    #[test]
    fn records_keep_program_order() {
        let mut sink = DiagnosticSink::new();
        sink.global_error("first".to_string());
        sink.warning(None, "second".to_string());
        sink.global_error("third".to_string());
        let messages: Vec<&str> = sink.records().iter().map(|r| r.message().as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn instruction_binding_carries_location() {
        let inst = bound_instruction();
        let mut sink = DiagnosticSink::new();
        sink.instruction_error(&inst, "bad write mask".to_string());
        let record = &sink.records()[0];
        assert_eq!(record.spew_index(), Some(2));
        assert_eq!(
            record.to_string(),
            "shader.psh(14): error: instruction 2: bad write mask"
        );
    }

    #[test]
    fn log_size_matches_serialized_log() {
        let inst = bound_instruction();
        let mut sink = DiagnosticSink::new();
        sink.instruction_error(&inst, "one".to_string());
        sink.warning(None, "two".to_string());

        let mut buffer = Vec::new();
        write_log(sink.records(), &mut buffer).unwrap();
        assert_eq!(buffer.len(), required_log_size(sink.records()));
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("warning: two"));
    }
}
