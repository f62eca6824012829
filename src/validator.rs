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

//! The validation engine shared by both shader families.
//!
//! The engine owns the decode loop and all shared state; family-specific
//! behavior (register tag mapping, reserved masks, rule tables) is passed
//! in as a strategy implementing [`FamilyRules`].

use crate::caps::ShaderCaps;
use crate::diag::{self, Diagnostic, DiagnosticSink};
use crate::inst::{DstParam, Instruction, SrcLocation, SrcParam, MAX_PARAMS};
use crate::regfile::RegisterBank;
use crate::token::{
    self, RegFile, ShaderKind, ShaderVersion, FILE_COMMENT_TAG, LINE_COMMENT_TAG, OP_COMMENT,
    OP_END,
};
use crate::{Opcode, Result};
use getset::CopyGetters;
use scroll::Pread;
use std::io;
use tracing::debug;

/// Forward-only little-endian DWORD cursor over the bytecode buffer
pub(crate) struct TokenReader<'a> {
    source: &'a [u8],
    offset: usize,
}

impl<'a> TokenReader<'a> {
    pub(crate) fn new(source: &'a [u8]) -> TokenReader<'a> {
        TokenReader { source, offset: 0 }
    }

    /// Read the token at the cursor without advancing
    pub(crate) fn peek(&self) -> Result<u32> {
        Ok(self.source.pread_with::<u32>(self.offset, scroll::LE)?)
    }

    /// Read the token at the cursor and advance past it
    pub(crate) fn next(&mut self) -> Result<u32> {
        Ok(self
            .source
            .gread_with::<u32>(&mut self.offset, scroll::LE)?)
    }

    /// Advance past `count` DWORDs
    pub(crate) fn skip(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.next()?;
        }
        Ok(())
    }

    /// DWORDs consumed so far
    pub(crate) fn dwords_read(&self) -> usize {
        self.offset / 4
    }
}

/// Instruction counters accumulated while decoding.
///
/// Comments and `def` never count; `tex` and `blend` are pixel shader
/// classifications.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, CopyGetters)]
#[get_copy = "pub"]
pub struct OpCounts {
    /// Instructions counted toward device limits
    total: u32,
    /// Texture addressing instructions
    tex: u32,
    /// Arithmetic (blending) instructions
    blend: u32,
}

impl OpCounts {
    pub(crate) fn count_total(&mut self) {
        self.total += 1;
    }

    pub(crate) fn count_tex(&mut self) {
        self.tex += 1;
    }

    pub(crate) fn count_blend(&mut self) {
        self.blend += 1;
    }
}

/// Outcome of one validation run: the verdict, the ordered diagnostics and
/// the instruction counters
#[derive(Debug, CopyGetters)]
pub struct Validation {
    #[get_copy = "pub"]
    /// Whether the shader passed every error-category rule
    succeeded: bool,
    #[get_copy = "pub"]
    /// Version parsed from the version token, if one was read
    version: Option<ShaderVersion>,
    #[get_copy = "pub"]
    /// Instruction counters
    counts: OpCounts,
    instructions: Vec<Instruction>,
    diagnostics: Vec<Diagnostic>,
}

impl Validation {
    /// Recorded diagnostics in program order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The decoded instruction list, in program order, as far as decoding
    /// got before completing or aborting
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of bytes [`Validation::write_log`] will produce
    pub fn required_log_size(&self) -> usize {
        diag::required_log_size(&self.diagnostics)
    }

    /// Serialize the diagnostic log, one line per record
    pub fn write_log(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        diag::write_log(&self.diagnostics, writer)
    }

    /// The diagnostic log as a string
    pub fn log(&self) -> String {
        self.diagnostics
            .iter()
            .map(|record| format!("{}\n", record))
            .collect()
    }
}

/// Shared engine state for one validation run
pub(crate) struct Context<'a> {
    pub(crate) reader: TokenReader<'a>,
    pub(crate) caps: &'a ShaderCaps,
    pub(crate) kind: ShaderKind,
    pub(crate) version: ShaderVersion,
    pub(crate) version_seen: bool,
    pub(crate) insts: Vec<Instruction>,
    pub(crate) bank: RegisterBank,
    pub(crate) sink: DiagnosticSink,
    pub(crate) counts: OpCounts,
    pub(crate) cycle: u32,
    pub(crate) spew_count: u32,
    pub(crate) pending_file: Option<String>,
    pub(crate) pending_line: Option<u32>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(code: &'a [u8], caps: &'a ShaderCaps, kind: ShaderKind) -> Context<'a> {
        Context {
            reader: TokenReader::new(code),
            caps,
            kind,
            version: ShaderVersion::new(0, 0),
            version_seen: false,
            insts: Vec::new(),
            bank: RegisterBank::new(),
            sink: DiagnosticSink::new(),
            counts: OpCounts::default(),
            cycle: 0,
            spew_count: 0,
            pending_file: None,
            pending_line: None,
        }
    }

    fn read_version_header(&mut self) -> bool {
        let raw = match self.reader.next() {
            Ok(raw) => raw,
            Err(_) => {
                self.sink
                    .global_error("Shader code is empty.".to_string());
                return false;
            }
        };
        match token::parse_version(raw) {
            Ok((kind, version)) if kind == self.kind => {
                self.version = version;
                self.version_seen = true;
                true
            }
            Ok((kind, _)) => {
                self.sink.global_error(format!(
                    "Version token identifies a {} shader, expected a {} shader.",
                    kind, self.kind
                ));
                false
            }
            Err(err) => {
                self.sink.global_error(err.to_string());
                false
            }
        }
    }

    /// Skip a comment frame, harvesting assembler file/line metadata.
    /// The recovered location applies to all subsequent instructions until
    /// the next metadata comment replaces it.
    fn skip_comment(&mut self) -> bool {
        let header = match self.reader.next() {
            Ok(header) => header,
            Err(_) => return false,
        };
        let length = token::comment_length(header) as usize;
        let mut payload = Vec::with_capacity(length);
        for _ in 0..length {
            match self.reader.next() {
                Ok(dword) => payload.push(dword),
                Err(_) => {
                    self.sink.global_error(
                        "Unexpected end of shader code inside a comment.  Aborting validation."
                            .to_string(),
                    );
                    return false;
                }
            }
        }
        match payload.first() {
            Some(&FILE_COMMENT_TAG) => {
                let bytes: Vec<u8> = payload[1..]
                    .iter()
                    .flat_map(|dword| dword.to_le_bytes().to_vec())
                    .take_while(|&b| b != 0)
                    .collect();
                if !bytes.is_empty() {
                    self.pending_file = Some(String::from_utf8_lossy(&bytes).into_owned());
                }
            }
            Some(&LINE_COMMENT_TAG) => {
                if let Some(&line) = payload.get(1) {
                    self.pending_line = Some(line);
                }
            }
            _ => {}
        }
        true
    }

}

/// Family-specific strategy plugged into the shared engine
pub(crate) trait FamilyRules {
    fn kind(&self) -> ShaderKind;
    /// Reserved bits of an instruction token for this family
    fn instruction_reserved_mask(&self) -> u32;
    /// Reserved bits of a destination parameter token
    fn dst_reserved_mask(&self) -> u32;
    /// Reserved bits of a source parameter token
    fn src_reserved_mask(&self) -> u32;
    /// Allocate register files and perform family preamble work (such as
    /// parsing the vertex declaration). Returning `false` aborts the run.
    fn init_validation(&mut self, ctx: &mut Context) -> bool;
    /// Classification and counter updates after an instruction decodes
    fn post_decode(&mut self, ctx: &mut Context);
    /// Family rule table for the freshly decoded instruction. Returning
    /// `false` aborts the decode loop.
    fn apply_per_instruction_rules(&mut self, ctx: &mut Context) -> bool;
    /// Whole-program rules, run even when the loop aborted early
    fn apply_post_instruction_rules(&mut self, ctx: &mut Context);
}

/// Drive a full validation run with the given family strategy
pub(crate) fn run<F: FamilyRules>(
    code: &[u8],
    caps: &ShaderCaps,
    flags: u32,
    mut family: F,
) -> Validation {
    // `flags` is accepted for interface compatibility; no bits are defined
    let _ = flags;
    let kind = family.kind();
    let mut ctx = Context::new(code, caps, kind);
    debug!(kind = kind.name(), "validating shader");

    if ctx.read_version_header() && check_version_supported(&mut ctx) {
        if family.init_validation(&mut ctx) {
            decode_loop(&mut ctx, &mut family);
        }
        family.apply_post_instruction_rules(&mut ctx);
    }

    finish(ctx)
}

fn check_version_supported(ctx: &mut Context) -> bool {
    let max = match ctx.kind {
        ShaderKind::Pixel => ctx.caps.pixel.max_version,
        ShaderKind::Vertex => ctx.caps.vertex.max_version,
    };
    if ctx.version < ShaderVersion::new(1, 0) || ctx.version > max {
        ctx.sink.global_error(format!(
            "Shader version {} is not supported by the device (max {}).",
            ctx.version, max
        ));
        return false;
    }
    true
}

fn decode_loop<F: FamilyRules>(ctx: &mut Context, family: &mut F) {
    loop {
        let raw = match ctx.reader.peek() {
            Ok(raw) => raw,
            Err(_) => {
                ctx.sink.global_error(
                    "Unexpected end of shader code.  Aborting validation.".to_string(),
                );
                break;
            }
        };
        if !token::is_param_token(raw) && token::opcode_value(raw) == OP_END {
            break;
        }
        if !token::is_param_token(raw) && token::opcode_value(raw) == OP_COMMENT {
            if !ctx.skip_comment() {
                break;
            }
            continue;
        }
        if !decode_next_instruction(ctx, family) {
            break;
        }
        family.post_decode(ctx);
        if !family.apply_per_instruction_rules(ctx) {
            break;
        }
        track_registers(ctx);
    }
}

/// Decode one instruction at the cursor, following the family token
/// layout. Returns `false` on fatal errors that leave the stream position
/// meaningless.
fn decode_next_instruction<F: FamilyRules>(ctx: &mut Context, family: &F) -> bool {
    let kind = family.kind();
    let raw = match ctx.reader.peek() {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    let raw_opcode = token::opcode_value(raw);
    let co_issue = token::has_coissue(raw);

    // Co-issued instructions share the cycle of their leader
    if !co_issue {
        ctx.cycle += 1;
    }
    ctx.spew_count += 1;
    let location = SrcLocation::new(ctx.pending_file.clone(), ctx.pending_line);
    let mut inst = Instruction::new(raw_opcode, co_issue, ctx.cycle, ctx.spew_count, location);

    let opcode = match inst.opcode() {
        Some(opcode) => opcode,
        None => {
            ctx.sink.instruction_error(
                &inst,
                format!(
                    "Unrecognized instruction opcode {:#06x}!  Aborting validation.",
                    raw_opcode
                ),
            );
            ctx.insts.push(inst);
            return false;
        }
    };
    if raw & family.instruction_reserved_mask() != 0 {
        ctx.sink.instruction_error(
            &inst,
            "Reserved bit(s) set in instruction parameter token!  Aborting validation."
                .to_string(),
        );
        ctx.insts.push(inst);
        return false;
    }
    if ctx.reader.next().is_err() {
        return false;
    }

    // Destination parameters
    let mut dst_remaining = opcode.dst_count();
    loop {
        let param_token = match ctx.reader.peek() {
            Ok(param_token) => param_token,
            Err(_) => break,
        };
        if !token::is_param_token(param_token) || dst_remaining == 0 {
            break;
        }
        dst_remaining -= 1;
        match DstParam::from_token(param_token, kind) {
            Ok(param) => {
                if param_token & family.dst_reserved_mask() != 0 {
                    ctx.sink.instruction_error(
                        &inst,
                        "Reserved bit(s) set in destination parameter token!  Aborting validation."
                            .to_string(),
                    );
                    ctx.insts.push(inst);
                    return false;
                }
                inst.push_dst(param);
            }
            Err(err) => {
                ctx.sink.instruction_error(
                    &inst,
                    format!("{}!  Aborting validation.", err),
                );
                ctx.insts.push(inst);
                return false;
            }
        }
        if ctx.reader.next().is_err() {
            break;
        }
        if opcode == Opcode::Def {
            // The constant payload is four raw floats; nothing to validate,
            // and treating them as parameter tokens would desynchronize the
            // stream.
            if ctx.reader.skip(4).is_err() {
                ctx.sink.global_error(
                    "Unexpected end of shader code inside a def constant.  Aborting validation."
                        .to_string(),
                );
                ctx.insts.push(inst);
                return false;
            }
            ctx.insts.push(inst);
            return true;
        }
    }

    // Source parameters
    loop {
        let param_token = match ctx.reader.peek() {
            Ok(param_token) => param_token,
            Err(_) => break,
        };
        if !token::is_param_token(param_token) {
            break;
        }
        if inst.dst_params().len() + inst.src_params().len() + 1 > MAX_PARAMS {
            // Eat the excess so the cursor lands on the next instruction
            inst.count_extra_src();
            if ctx.reader.next().is_err() {
                break;
            }
            continue;
        }
        match SrcParam::from_token(param_token, kind) {
            Ok(param) => {
                if param_token & family.src_reserved_mask() != 0 {
                    ctx.sink.instruction_error(
                        &inst,
                        format!(
                            "Reserved bit(s) set in source {} parameter token!  Aborting validation.",
                            inst.src_params().len() + 1
                        ),
                    );
                    ctx.insts.push(inst);
                    return false;
                }
                inst.push_src(param);
            }
            Err(err) => {
                ctx.sink.instruction_error(
                    &inst,
                    format!("{}!  Aborting validation.", err),
                );
                ctx.insts.push(inst);
                return false;
            }
        }
        if ctx.reader.next().is_err() {
            break;
        }
    }

    if inst.extra_src_tokens() > 0 {
        ctx.sink.warning(
            Some(&inst),
            format!(
                "Instruction has more than {} parameters; {} extra token(s) ignored.",
                MAX_PARAMS,
                inst.extra_src_tokens()
            ),
        );
    }

    inst.derive_read_masks();
    ctx.insts.push(inst);
    true
}

/// Fold the current instruction's reads and writes into the register
/// files. Runs after the rule pass so initialization rules observe the
/// state established by preceding instructions only.
fn track_registers(ctx: &mut Context) {
    let Context { insts, bank, .. } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return,
    };
    let cycle = inst.cycle_num();
    for src in inst.src_params() {
        if src.component_read_mask().is_empty() {
            continue;
        }
        if let Some(file) = bank.file_mut(src.file()) {
            file.mark_read(src.index(), cycle);
        }
        if src.relative() {
            if let Some(file) = bank.file_mut(RegFile::Addr) {
                file.mark_read(0, cycle);
            }
        }
    }
    for dst in inst.dst_params() {
        if let Some(file) = bank.file_mut(dst.file()) {
            file.mark_written(dst.index(), cycle, dst.write_mask());
        }
    }
}

pub(crate) fn finish(ctx: Context) -> Validation {
    let succeeded = !ctx.sink.has_errors();
    debug!(
        succeeded,
        instructions = ctx.insts.len(),
        dwords = ctx.reader.dwords_read(),
        "shader validation finished"
    );
    Validation {
        succeeded,
        version: if ctx.version_seen {
            Some(ctx.version)
        } else {
            None
        },
        counts: ctx.counts,
        instructions: ctx.insts,
        diagnostics: ctx.sink.into_records(),
    }
}

// Shared rule implementations. Each returns whether the rule passed so
// family tables can short-circuit the remaining rules for the current
// instruction without aborting the whole run.

pub(crate) fn rule_instruction_recognized(ctx: &mut Context) -> bool {
    let Context { insts, sink, kind, .. } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return true,
    };
    let opcode = match inst.opcode() {
        Some(opcode) => opcode,
        None => return true,
    };
    if opcode.versions(*kind).is_none() {
        sink.instruction_error(
            inst,
            format!(
                "Instruction '{}' is not a {} shader instruction.",
                opcode, kind
            ),
        );
        return false;
    }
    true
}

pub(crate) fn rule_supported_by_version(ctx: &mut Context) -> bool {
    let Context {
        insts,
        sink,
        kind,
        version,
        ..
    } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return true,
    };
    let opcode = match inst.opcode() {
        Some(opcode) => opcode,
        None => return true,
    };
    if let Some((min, max)) = opcode.versions(*kind) {
        if *version < min || *version > max {
            sink.instruction_error(
                inst,
                format!(
                    "Instruction '{}' is not supported by {} shader version {}.",
                    opcode, kind, version
                ),
            );
            return false;
        }
    }
    true
}

pub(crate) fn rule_valid_param_count(ctx: &mut Context) -> bool {
    let Context { insts, sink, .. } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return true,
    };
    let opcode = match inst.opcode() {
        Some(opcode) => opcode,
        None => return true,
    };
    let found_src = inst.src_params().len() + inst.extra_src_tokens() as usize;
    if inst.dst_params().len() != opcode.dst_count() || found_src != opcode.src_count() {
        sink.instruction_error(
            inst,
            format!(
                "Invalid parameter count for '{}': expected {} destination and {} source parameter(s), found {} and {}.",
                opcode,
                opcode.dst_count(),
                opcode.src_count(),
                inst.dst_params().len(),
                found_src
            ),
        );
        return false;
    }
    true
}

pub(crate) fn rule_src_initialized(ctx: &mut Context) -> bool {
    let Context {
        insts, sink, bank, ..
    } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return true,
    };
    let mut ok = true;
    for src in inst.src_params() {
        if src.component_read_mask().is_empty() {
            continue;
        }
        if let Some(file) = bank.file(src.file()) {
            if !file.is_initialized(src.index()) {
                sink.instruction_error(
                    inst,
                    format!("Read of uninitialized register {}.", src.register_name()),
                );
                ok = false;
            }
        }
        if src.relative() {
            if let Some(file) = bank.file(RegFile::Addr) {
                if !file.is_initialized(0) {
                    sink.instruction_error(
                        inst,
                        "Relative addressing requires a0 to be initialized.".to_string(),
                    );
                    ok = false;
                }
            }
        }
    }
    ok
}

/// Distinct registers referenced from each port-limited file across the
/// current cycle, so co-issued pairs share the budget
pub(crate) fn rule_register_port_usage(ctx: &mut Context, limits: &[(RegFile, u32)]) -> bool {
    let Context { insts, sink, .. } = ctx;
    let inst = match insts.last() {
        Some(inst) => inst,
        None => return true,
    };
    let cycle = inst.cycle_num();
    let mut ok = true;
    for &(file, limit) in limits {
        let mut distinct: Vec<u32> = Vec::new();
        for cycle_inst in insts.iter().rev().take_while(|i| i.cycle_num() == cycle) {
            for src in cycle_inst.src_params() {
                if src.file() == file
                    && !src.component_read_mask().is_empty()
                    && !distinct.contains(&src.index())
                {
                    distinct.push(src.index());
                }
            }
        }
        if distinct.len() as u32 > limit {
            sink.instruction_error(
                inst,
                format!(
                    "Instruction reads {} different {} registers in one cycle (max {}).",
                    distinct.len(),
                    file.noun(),
                    limit
                ),
            );
            ok = false;
        }
    }
    ok
}

/// Range-check a parameter register index against its capability bound
pub(crate) fn check_register_range(
    sink: &mut DiagnosticSink,
    inst: &Instruction,
    file: RegFile,
    index: u32,
    bound: u32,
) -> bool {
    if index >= bound {
        sink.instruction_error(
            inst,
            format!(
                "Register {} out of range: the device supports {} {} register(s).",
                token::register_name(file, index),
                bound,
                file.noun()
            ),
        );
        return false;
    }
    true
}
