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

//! Vertex shader validation: declaration parsing, address register
//! discipline and the position-output rule on top of the shared engine.

use crate::caps::ShaderCaps;
use crate::opcode::Opcode;
use crate::token::{
    self, ComponentMask, RegFile, ShaderKind, SrcModifier, DECL_END_TOKEN, DECL_SKIP_FLAG,
    DECL_TYPE_CONSTMEM, DECL_TYPE_EXT, DECL_TYPE_NOP, DECL_TYPE_STREAM, DECL_TYPE_STREAM_DATA,
    DECL_TYPE_TESSELLATOR,
};
use crate::validator::{
    self, check_register_range, rule_instruction_recognized, rule_register_port_usage,
    rule_src_initialized, rule_supported_by_version, rule_valid_param_count, Context,
    FamilyRules, TokenReader, Validation,
};

/// Validate a vertex shader against the device capabilities.
///
/// `decl` is the declaration stream binding input registers; it is always
/// required. `code` is the shader body; passing `None` selects the
/// fixed-function path, where the declaration is the whole program.
/// `flags` is accepted for interface compatibility; pass 0.
pub fn validate_vertex_shader(
    code: Option<&[u8]>,
    decl: &[u8],
    caps: &ShaderCaps,
    flags: u32,
) -> Validation {
    match code {
        Some(code) => validator::run(code, caps, flags, VertexRules::new(decl)),
        None => {
            let _ = flags;
            let mut ctx = Context::new(&[], caps, ShaderKind::Vertex);
            let mut rules = VertexRules::new(decl);
            rules.allocate_files(&mut ctx);
            rules.parse_declaration(&mut ctx);
            validator::finish(ctx)
        }
    }
}

pub(crate) struct VertexRules<'d> {
    decl: &'d [u8],
    reported_count_limit: bool,
}

impl<'d> VertexRules<'d> {
    pub(crate) fn new(decl: &'d [u8]) -> VertexRules<'d> {
        VertexRules {
            decl,
            reported_count_limit: false,
        }
    }

    fn allocate_files(&mut self, ctx: &mut Context) {
        ctx.bank.add_file(RegFile::Temp, false);
        // Inputs become readable through declaration bindings only
        ctx.bank.add_file(RegFile::Input, false);
        ctx.bank.add_file(RegFile::Const, true);
        ctx.bank.add_file(RegFile::Addr, false);
        ctx.bank.add_file(RegFile::RastOut, false);
        ctx.bank.add_file(RegFile::AttrOut, false);
        ctx.bank.add_file(RegFile::TexCrdOut, false);
    }

    /// Walk the declaration stream, marking every bound input register as
    /// initialized. Constant uploads and extension records are skipped by
    /// their encoded lengths.
    fn parse_declaration(&mut self, ctx: &mut Context) {
        let mut reader = TokenReader::new(self.decl);
        loop {
            let raw = match reader.next() {
                Ok(raw) => raw,
                Err(_) => {
                    ctx.sink.global_error(
                        "Vertex shader declaration missing end token.".to_string(),
                    );
                    return;
                }
            };
            if raw == DECL_END_TOKEN {
                return;
            }
            match token::decl_token_type(raw) {
                DECL_TYPE_NOP | DECL_TYPE_STREAM => {}
                DECL_TYPE_STREAM_DATA => {
                    if raw & DECL_SKIP_FLAG != 0 {
                        continue;
                    }
                    self.bind_input(ctx, token::decl_register(raw));
                }
                DECL_TYPE_TESSELLATOR => {
                    self.bind_input(ctx, token::decl_register(raw));
                }
                DECL_TYPE_CONSTMEM => {
                    let count = token::decl_const_count(raw) as usize;
                    if reader.skip(count * 4).is_err() {
                        ctx.sink.global_error(
                            "Vertex shader declaration ends inside a constant record."
                                .to_string(),
                        );
                        return;
                    }
                }
                DECL_TYPE_EXT => {
                    let count = token::decl_ext_count(raw) as usize;
                    if reader.skip(count).is_err() {
                        ctx.sink.global_error(
                            "Vertex shader declaration ends inside an extension record."
                                .to_string(),
                        );
                        return;
                    }
                }
                _ => {
                    ctx.sink.global_error(format!(
                        "Invalid token in vertex shader declaration: {:#010x}.",
                        raw
                    ));
                    return;
                }
            }
        }
    }

    fn bind_input(&mut self, ctx: &mut Context, reg: u32) {
        if reg >= ctx.caps.vertex.max_inputs {
            ctx.sink.global_error(format!(
                "Declared input register v{} out of range (max {}).",
                reg, ctx.caps.vertex.max_inputs
            ));
        } else if let Some(file) = ctx.bank.file_mut(RegFile::Input) {
            file.mark_initialized(reg);
        }
    }

    fn rule_valid_dst_param(&mut self, ctx: &mut Context) -> bool {
        let Context {
            insts, sink, caps, ..
        } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        let opcode = match inst.opcode() {
            Some(opcode) => opcode,
            None => return true,
        };
        let mut ok = true;
        for dst in inst.dst_params() {
            let bound = match dst.file() {
                RegFile::Temp => caps.vertex.max_temps,
                RegFile::Addr => 1,
                RegFile::RastOut => 3,
                RegFile::AttrOut => caps.vertex.max_attr_outputs,
                RegFile::TexCrdOut => caps.vertex.max_texcoord_outputs,
                _ => {
                    sink.instruction_error(
                        inst,
                        format!(
                            "Instruction '{}' cannot write to register {}.",
                            opcode,
                            dst.register_name()
                        ),
                    );
                    ok = false;
                    continue;
                }
            };
            ok &= check_register_range(sink, inst, dst.file(), dst.index(), bound);
            if dst.write_mask().is_empty() {
                sink.instruction_error(
                    inst,
                    "Destination write mask cannot be empty.".to_string(),
                );
                ok = false;
            }
        }
        ok
    }

    fn rule_valid_src_params(&mut self, ctx: &mut Context) -> bool {
        let Context {
            insts, sink, caps, ..
        } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        let mut ok = true;
        for src in inst.src_params() {
            let bound = match src.file() {
                RegFile::Temp => caps.vertex.max_temps,
                RegFile::Input => caps.vertex.max_inputs,
                RegFile::Const => caps.vertex.max_consts,
                _ => {
                    sink.instruction_error(
                        inst,
                        format!(
                            "Register {} cannot be read by a vertex shader.",
                            src.register_name()
                        ),
                    );
                    ok = false;
                    continue;
                }
            };
            ok &= check_register_range(sink, inst, src.file(), src.index(), bound);

            if !matches!(src.modifier(), SrcModifier::None | SrcModifier::Negate) {
                sink.instruction_error(
                    inst,
                    "Vertex shader sources only support the negate modifier.".to_string(),
                );
                ok = false;
            }
            if src.relative() && src.file() != RegFile::Const {
                sink.instruction_error(
                    inst,
                    "Relative addressing is only valid on constant registers.".to_string(),
                );
                ok = false;
            }
        }
        ok
    }

    fn rule_valid_frc(&mut self, ctx: &mut Context) -> bool {
        let Context { insts, sink, .. } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        if inst.opcode() != Some(Opcode::Frc) {
            return true;
        }
        let xy = ComponentMask::RED | ComponentMask::GREEN;
        for dst in inst.dst_params() {
            if dst.write_mask() != ComponentMask::GREEN && dst.write_mask() != xy {
                sink.instruction_error(
                    inst,
                    format!(
                        "Write mask for frc must be .y or .xy, not {}.",
                        dst.write_mask()
                    ),
                );
                return false;
            }
        }
        true
    }

    fn rule_valid_address_reg_write(&mut self, ctx: &mut Context) -> bool {
        let Context { insts, sink, .. } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        if !inst.dst_params().iter().any(|d| d.file() == RegFile::Addr) {
            return true;
        }
        let mut ok = true;
        if inst.opcode() != Some(Opcode::Mov) {
            sink.instruction_error(
                inst,
                "Only mov may write to the address register a0.".to_string(),
            );
            ok = false;
        }
        for dst in inst.dst_params() {
            if dst.file() == RegFile::Addr && dst.write_mask() != ComponentMask::RED {
                sink.instruction_error(
                    inst,
                    "Write to a0 must use the .x write mask.".to_string(),
                );
                ok = false;
            }
        }
        ok
    }

    fn rule_valid_instruction_count(&mut self, ctx: &mut Context) -> bool {
        let Context {
            insts,
            sink,
            caps,
            counts,
            ..
        } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        if !self.reported_count_limit && counts.total() > caps.vertex.max_instructions {
            sink.instruction_error(
                inst,
                format!(
                    "Too many instructions (max {}).",
                    caps.vertex.max_instructions
                ),
            );
            self.reported_count_limit = true;
            return false;
        }
        true
    }
}

impl<'d> FamilyRules for VertexRules<'d> {
    fn kind(&self) -> ShaderKind {
        ShaderKind::Vertex
    }

    fn instruction_reserved_mask(&self) -> u32 {
        token::VS_INSTRUCTION_RESERVED
    }

    fn dst_reserved_mask(&self) -> u32 {
        token::VS_DST_RESERVED
    }

    fn src_reserved_mask(&self) -> u32 {
        token::VS_SRC_RESERVED
    }

    fn init_validation(&mut self, ctx: &mut Context) -> bool {
        self.allocate_files(ctx);
        self.parse_declaration(ctx);
        true
    }

    fn post_decode(&mut self, ctx: &mut Context) {
        if ctx.insts.last().is_some() {
            ctx.counts.count_total();
        }
    }

    fn apply_per_instruction_rules(&mut self, ctx: &mut Context) -> bool {
        if !rule_instruction_recognized(ctx) {
            return true;
        }
        if !rule_supported_by_version(ctx) {
            return true;
        }
        rule_valid_param_count(ctx);
        self.rule_valid_dst_param(ctx);
        self.rule_valid_src_params(ctx);
        rule_src_initialized(ctx);
        self.rule_valid_frc(ctx);
        self.rule_valid_address_reg_write(ctx);
        let const_limit = ctx.caps.vertex.const_reads_per_instruction;
        let input_limit = ctx.caps.vertex.input_reads_per_instruction;
        rule_register_port_usage(
            ctx,
            &[
                (RegFile::Const, const_limit),
                (RegFile::Input, input_limit),
            ],
        );
        self.rule_valid_instruction_count(ctx);
        true
    }

    fn apply_post_instruction_rules(&mut self, ctx: &mut Context) {
        if !self.reported_count_limit && ctx.counts.total() > ctx.caps.vertex.max_instructions {
            ctx.sink.global_error(format!(
                "Too many instructions (max {}).",
                ctx.caps.vertex.max_instructions
            ));
        }
        let opos_written = ctx
            .bank
            .file(RegFile::RastOut)
            .map(|file| file.was_written(0))
            .unwrap_or(false);
        if !opos_written {
            ctx.sink.global_error(
                "oPos not written: a vertex shader must write the position output.".to_string(),
            );
        }
    }
}
