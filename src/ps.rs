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

//! Pixel shader validation: the family strategy layered on the shared
//! engine, covering tex ops, blend ops, co-issue pairing and the final
//! combiner.

use crate::caps::ShaderCaps;
use crate::opcode::{Opcode, TexmRole};
use crate::token::{
    self, ComponentMask, RegFile, ShaderKind, SrcModifier, Swizzle, SHIFT_D2, SHIFT_NONE,
    SHIFT_X2, SHIFT_X4,
};
use crate::validator::{
    self, check_register_range, rule_instruction_recognized, rule_register_port_usage,
    rule_src_initialized, rule_supported_by_version, rule_valid_param_count, Context,
    FamilyRules, Validation,
};

/// Validate a pixel shader token stream against the device capabilities.
///
/// `code` is the little-endian DWORD stream starting with the version
/// token and terminated by the end token. `flags` is accepted for
/// interface compatibility; pass 0.
pub fn validate_pixel_shader(code: &[u8], caps: &ShaderCaps, flags: u32) -> Validation {
    validator::run(code, caps, flags, PixelRules::new())
}

/// A pending `texm*` matrix sequence
struct TexmSequence {
    /// Destination register of the first row
    base: u32,
    /// Rows seen so far
    pads: u32,
    /// Total rows of the sequence (2 or 3)
    rows: u32,
}

pub(crate) struct PixelRules {
    texm: Option<TexmSequence>,
    reported_tex_limit: bool,
    reported_blend_limit: bool,
}

impl PixelRules {
    pub(crate) fn new() -> PixelRules {
        PixelRules {
            texm: None,
            reported_tex_limit: false,
            reported_blend_limit: false,
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
            let file_ok = if opcode.is_texture_op() {
                dst.file() == RegFile::Texture
            } else if opcode == Opcode::Def {
                dst.file() == RegFile::Const
            } else {
                dst.file() == RegFile::Temp
            };
            if !file_ok {
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
            let bound = match dst.file() {
                RegFile::Temp => caps.pixel.max_temps,
                RegFile::Texture => caps.pixel.max_texture_stages,
                RegFile::Const => caps.pixel.max_consts,
                _ => 0,
            };
            ok &= check_register_range(sink, inst, dst.file(), dst.index(), bound);

            if dst.write_mask().is_empty() {
                sink.instruction_error(
                    inst,
                    "Destination write mask cannot be empty.".to_string(),
                );
                ok = false;
            } else if opcode.is_texture_op() && dst.write_mask() != ComponentMask::ALL {
                sink.instruction_error(
                    inst,
                    format!(
                        "Texture instruction '{}' must write all components.",
                        opcode
                    ),
                );
                ok = false;
            }

            let shift_ok = if opcode.is_blend_op() {
                matches!(dst.shift(), SHIFT_NONE | SHIFT_X2 | SHIFT_X4 | SHIFT_D2)
            } else {
                dst.shift() == SHIFT_NONE
            };
            if !shift_ok {
                sink.instruction_error(
                    inst,
                    format!(
                        "Result shift {:#x} is not valid on '{}'.",
                        dst.shift(),
                        opcode
                    ),
                );
                ok = false;
            }
            if dst.saturate() && !opcode.is_blend_op() {
                sink.instruction_error(
                    inst,
                    format!("Saturate modifier is not valid on '{}'.", opcode),
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
        let opcode = match inst.opcode() {
            Some(opcode) => opcode,
            None => return true,
        };
        let mut ok = true;
        for src in inst.src_params() {
            let bound = match src.file() {
                RegFile::Temp => caps.pixel.max_temps,
                RegFile::Input => caps.pixel.max_inputs,
                RegFile::Const => caps.pixel.max_consts,
                RegFile::Texture => caps.pixel.max_texture_stages,
                _ => {
                    sink.instruction_error(
                        inst,
                        format!(
                            "Register {} cannot be read by a pixel shader.",
                            src.register_name()
                        ),
                    );
                    ok = false;
                    continue;
                }
            };
            ok &= check_register_range(sink, inst, src.file(), src.index(), bound);

            if !matches!(
                src.swizzle(),
                Swizzle::IDENTITY | Swizzle::ALPHA_REPLICATE | Swizzle::BLUE_REPLICATE
            ) {
                sink.instruction_error(
                    inst,
                    format!(
                        "Source swizzle {:#04x} is not supported by pixel shaders.",
                        src.swizzle().0
                    ),
                );
                ok = false;
            }

            let modifier_ok = if opcode.is_texture_op() {
                src.modifier() == SrcModifier::None
            } else {
                matches!(
                    src.modifier(),
                    SrcModifier::None
                        | SrcModifier::Negate
                        | SrcModifier::Bias
                        | SrcModifier::BiasNegate
                        | SrcModifier::Sign
                        | SrcModifier::SignNegate
                        | SrcModifier::Complement
                )
            };
            if !modifier_ok {
                sink.instruction_error(
                    inst,
                    format!("Source modifier is not valid on '{}'.", opcode),
                );
                ok = false;
            }

            if opcode.is_texture_op() {
                if src.file() != RegFile::Texture {
                    sink.instruction_error(
                        inst,
                        format!(
                            "Texture instruction '{}' can only read texture registers, not {}.",
                            opcode,
                            src.register_name()
                        ),
                    );
                    ok = false;
                } else if let Some(dst) = inst.dst() {
                    if src.index() >= dst.index() {
                        sink.instruction_error(
                            inst,
                            format!(
                                "Texture instruction source t{} must reference a lower stage than destination t{}.",
                                src.index(),
                                dst.index()
                            ),
                        );
                        ok = false;
                    }
                }
            }
        }
        ok
    }

    /// Co-issue legality: the pair is the previous instruction (which must
    /// not itself be the trailing half of another pair) plus this one;
    /// both halves are arithmetic, one writes alpha alone, and their
    /// writes never overlap.
    fn rule_valid_co_issue(&mut self, ctx: &mut Context) -> bool {
        let Context {
            insts, sink, bank, ..
        } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        if !inst.co_issue() {
            return true;
        }
        let prev = if insts.len() >= 2 {
            insts.get(insts.len() - 2)
        } else {
            None
        };
        let prev = match prev {
            Some(prev) => prev,
            None => {
                sink.instruction_error(
                    inst,
                    "Cannot co-issue the first instruction of the shader.".to_string(),
                );
                return false;
            }
        };
        let mut ok = true;
        if prev.co_issue() {
            sink.instruction_error(
                inst,
                "Cannot co-issue more than two instructions.".to_string(),
            );
            ok = false;
        }
        let arithmetic = inst.opcode().map(Opcode::is_blend_op).unwrap_or(false)
            && prev.opcode().map(Opcode::is_blend_op).unwrap_or(false);
        if !arithmetic {
            sink.instruction_error(
                inst,
                "Only arithmetic instructions may be co-issued.".to_string(),
            );
            ok = false;
        }
        if let (Some(dst), Some(prev_dst)) = (inst.dst(), prev.dst()) {
            if dst.write_mask() != ComponentMask::ALPHA
                && prev_dst.write_mask() != ComponentMask::ALPHA
            {
                sink.instruction_error(
                    inst,
                    "Co-issued instruction pair must include an alpha-only write.".to_string(),
                );
                ok = false;
            }
        }
        for dst in inst.dst_params() {
            if let Some(file) = bank.file(dst.file()) {
                for reg in file.writes_in_cycle(inst.cycle_num()) {
                    if reg != dst.index() {
                        continue;
                    }
                    if let Some(written) = file.write_mask_in_cycle(reg, inst.cycle_num()) {
                        if written.intersects(dst.write_mask()) {
                            sink.instruction_error(
                                inst,
                                format!(
                                    "Co-issued instructions write overlapping components of {}.",
                                    dst.register_name()
                                ),
                            );
                            ok = false;
                        }
                    }
                }
            }
        }
        ok
    }

    /// The `texm*` rows of one matrix operation must be consecutive
    /// instructions writing consecutive texture registers.
    fn rule_texm_sequence(&mut self, ctx: &mut Context) -> bool {
        let Context { insts, sink, .. } = ctx;
        let inst = match insts.last() {
            Some(inst) => inst,
            None => return true,
        };
        let opcode = match inst.opcode() {
            Some(opcode) => opcode,
            None => return true,
        };
        let dst_index = inst.dst().map(|d| d.index());
        match opcode.texm_role() {
            None => {
                if self.texm.take().is_some() {
                    sink.instruction_error(
                        inst,
                        "texm sequence interrupted; the matrix rows must be consecutive instructions."
                            .to_string(),
                    );
                    return false;
                }
                true
            }
            Some(TexmRole::Pad2) | Some(TexmRole::Pad3) => {
                let rows = if opcode.texm_role() == Some(TexmRole::Pad2) {
                    2
                } else {
                    3
                };
                match self.texm.take() {
                    None => {
                        self.texm = dst_index.map(|base| TexmSequence {
                            base,
                            pads: 1,
                            rows,
                        });
                        true
                    }
                    Some(seq)
                        if rows == 3
                            && seq.rows == 3
                            && seq.pads == 1
                            && dst_index == Some(seq.base + 1) =>
                    {
                        self.texm = Some(TexmSequence {
                            base: seq.base,
                            pads: 2,
                            rows: 3,
                        });
                        true
                    }
                    Some(seq) => {
                        sink.instruction_error(
                            inst,
                            format!(
                                "Cannot start a new texm sequence before the one at t{} completes.",
                                seq.base
                            ),
                        );
                        false
                    }
                }
            }
            Some(TexmRole::Final2) | Some(TexmRole::Final3) => {
                let (rows, pads_needed) = if opcode.texm_role() == Some(TexmRole::Final2) {
                    (2, 1)
                } else {
                    (3, 2)
                };
                match self.texm.take() {
                    Some(seq)
                        if seq.rows == rows
                            && seq.pads == pads_needed
                            && dst_index == Some(seq.base + pads_needed) =>
                    {
                        true
                    }
                    _ => {
                        sink.instruction_error(
                            inst,
                            format!(
                                "'{}' must complete a texm sequence of consecutive destination registers.",
                                opcode
                            ),
                        );
                        false
                    }
                }
            }
        }
    }

    /// Instruction-count limits, evaluated incrementally so the diagnostic
    /// lands on the first instruction past the limit
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
        let mut ok = true;
        if !self.reported_tex_limit && counts.tex() > caps.pixel.max_tex_ops {
            sink.instruction_error(
                inst,
                format!(
                    "Too many texture addressing instructions (max {}).",
                    caps.pixel.max_tex_ops
                ),
            );
            self.reported_tex_limit = true;
            ok = false;
        }
        if !self.reported_blend_limit && counts.blend() > caps.pixel.max_blend_ops {
            sink.instruction_error(
                inst,
                format!(
                    "Too many arithmetic instructions (max {}).",
                    caps.pixel.max_blend_ops
                ),
            );
            self.reported_blend_limit = true;
            ok = false;
        }
        ok
    }
}

impl FamilyRules for PixelRules {
    fn kind(&self) -> ShaderKind {
        ShaderKind::Pixel
    }

    fn instruction_reserved_mask(&self) -> u32 {
        token::PS_INSTRUCTION_RESERVED
    }

    fn dst_reserved_mask(&self) -> u32 {
        token::PS_DST_RESERVED
    }

    fn src_reserved_mask(&self) -> u32 {
        token::PS_SRC_RESERVED
    }

    fn init_validation(&mut self, ctx: &mut Context) -> bool {
        ctx.bank.add_file(RegFile::Temp, false);
        ctx.bank.add_file(RegFile::Input, true);
        ctx.bank.add_file(RegFile::Const, true);
        // Texture registers only become readable once a tex op loads them
        ctx.bank.add_file(RegFile::Texture, false);
        true
    }

    fn post_decode(&mut self, ctx: &mut Context) {
        let opcode = match ctx.insts.last().and_then(|i| i.opcode()) {
            Some(opcode) => opcode,
            None => return,
        };
        // def carries data, not work; it counts toward no limit
        if opcode == Opcode::Def {
            return;
        }
        ctx.counts.count_total();
        if opcode.is_texture_op() {
            ctx.counts.count_tex();
        }
        if opcode.is_blend_op() {
            ctx.counts.count_blend();
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
        self.rule_valid_co_issue(ctx);
        let const_limit = ctx.caps.pixel.const_reads_per_cycle;
        rule_register_port_usage(ctx, &[(RegFile::Const, const_limit)]);
        self.rule_texm_sequence(ctx);
        self.rule_valid_instruction_count(ctx);
        true
    }

    fn apply_post_instruction_rules(&mut self, ctx: &mut Context) {
        if let Some(seq) = self.texm.take() {
            ctx.sink.global_error(format!(
                "texm sequence starting at t{} is never completed.",
                seq.base
            ));
        }
        if !self.reported_tex_limit && ctx.counts.tex() > ctx.caps.pixel.max_tex_ops {
            ctx.sink.global_error(format!(
                "Too many texture addressing instructions (max {}).",
                ctx.caps.pixel.max_tex_ops
            ));
        }
        if !self.reported_blend_limit && ctx.counts.blend() > ctx.caps.pixel.max_blend_ops {
            ctx.sink.global_error(format!(
                "Too many arithmetic instructions (max {}).",
                ctx.caps.pixel.max_blend_ops
            ));
        }
        let r0_written = ctx
            .bank
            .file(RegFile::Temp)
            .map(|file| file.was_written(0))
            .unwrap_or(false);
        if !r0_written {
            ctx.sink.global_error(
                "r0 is never written; a pixel shader must produce a result in r0.".to_string(),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::{dst, src, ShaderBuilder};
    use crate::token::PS_DST_RESERVED;

    fn caps() -> ShaderCaps {
        ShaderCaps::default()
    }

    #[test]
    fn tex_load_then_mov_succeeds() {
        let code = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
        assert_eq!(validation.counts().total(), 2);
        assert_eq!(validation.counts().tex(), 1);
        assert_eq!(validation.counts().blend(), 1);
        assert_eq!(
            validation.version(),
            Some(crate::ShaderVersion::new(1, 1))
        );
    }

    #[test]
    fn empty_program_never_writes_r0() {
        let code = ShaderBuilder::pixel(1, 1).end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("r0 is never written"));
    }

    #[test]
    fn reserved_bit_in_dst_token_is_fatal() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.tex(0);
        builder.raw_token(crate::token::make_opcode(Opcode::Mov as u16, false));
        builder.raw_token(
            crate::token::make_dst(RegFile::Temp, 0, ComponentMask::ALL, 0, false)
                | (PS_DST_RESERVED & 0x0000_2000),
        );
        builder.raw_token(crate::token::make_src(
            RegFile::Texture,
            0,
            Swizzle::IDENTITY,
            SrcModifier::None,
            false,
        ));
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("Reserved bit(s) set in destination parameter token"));
    }

    #[test]
    fn dp3_read_masks_drop_alpha() {
        let code = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .dp3(
                dst(RegFile::Temp, 0),
                src(RegFile::Texture, 0),
                src(RegFile::Texture, 0),
            )
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
        let dp3 = &validation.instructions()[1];
        for param in dp3.src_params() {
            assert_eq!(param.component_read_mask(), ComponentMask::RGB);
        }
    }

    #[test]
    fn reading_texture_register_before_tex_load_fails() {
        let code = ShaderBuilder::pixel(1, 1)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("Read of uninitialized register t0"));
    }

    #[test]
    fn co_issued_color_alpha_pair_succeeds() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.tex(0);
        builder.mov(
            dst(RegFile::Temp, 0).mask(ComponentMask::RGB),
            src(RegFile::Texture, 0),
        );
        builder
            .mov(
                dst(RegFile::Temp, 0).mask(ComponentMask::ALPHA),
                src(RegFile::Input, 0).swizzle(Swizzle::ALPHA_REPLICATE),
            )
            .co_issue();
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());

        // The pair shares a cycle and only the trailing half carries the flag
        let insts = validation.instructions();
        assert_eq!(insts[1].cycle_num(), insts[2].cycle_num());
        assert!(!insts[1].co_issue());
        assert!(insts[2].co_issue());
        assert_ne!(insts[0].cycle_num(), insts[1].cycle_num());
    }

    #[test]
    fn co_issue_on_first_instruction_fails() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder
            .mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0))
            .co_issue();
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("Cannot co-issue the first instruction"));
    }

    #[test]
    fn co_issue_of_three_instructions_fails() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.mov(
            dst(RegFile::Temp, 0).mask(ComponentMask::RGB),
            src(RegFile::Input, 0),
        );
        builder
            .mov(
                dst(RegFile::Temp, 0).mask(ComponentMask::ALPHA),
                src(RegFile::Input, 0).swizzle(Swizzle::ALPHA_REPLICATE),
            )
            .co_issue();
        builder
            .mov(
                dst(RegFile::Temp, 1).mask(ComponentMask::ALPHA),
                src(RegFile::Input, 1).swizzle(Swizzle::ALPHA_REPLICATE),
            )
            .co_issue();
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("Cannot co-issue more than two instructions"));
    }

    #[test]
    fn co_issued_overlapping_writes_fail() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0));
        builder
            .mov(
                dst(RegFile::Temp, 0).mask(ComponentMask::ALPHA),
                src(RegFile::Input, 1).swizzle(Swizzle::ALPHA_REPLICATE),
            )
            .co_issue();
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("write overlapping components of r0"));
    }

    #[test]
    fn co_issue_requires_an_alpha_only_half() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.mov(
            dst(RegFile::Temp, 0).mask(ComponentMask::RED),
            src(RegFile::Input, 0),
        );
        builder
            .mov(
                dst(RegFile::Temp, 1).mask(ComponentMask::GREEN),
                src(RegFile::Input, 1),
            )
            .co_issue();
        // r0 must still be written somewhere
        builder.mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0));
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("alpha-only write"));
    }

    #[test]
    fn tex_op_limit_is_enforced() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        for stage in 0..4 {
            builder.tex(stage);
        }
        builder.tex(3);
        builder.mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0));
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("Too many texture addressing instructions (max 4)"));
    }

    #[test]
    fn def_counts_toward_no_limit() {
        let code = ShaderBuilder::pixel(1, 1)
            .def(0, [1.0, 0.5, 0.25, 0.0])
            .mov(dst(RegFile::Temp, 0), src(RegFile::Const, 0))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
        assert_eq!(validation.counts().total(), 1);
        assert_eq!(validation.counts().blend(), 1);
    }

    #[test]
    fn def_must_write_a_constant_register() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.raw_token(crate::token::make_opcode(Opcode::Def as u16, false));
        builder.raw_token(crate::token::make_dst(
            RegFile::Temp,
            0,
            ComponentMask::ALL,
            0,
            false,
        ));
        for _ in 0..4 {
            builder.raw_token(0);
        }
        builder.mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0));
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("'def' cannot write to register r0"));
    }

    #[test]
    fn xfc_validates_with_seven_sources() {
        let sources = [
            src(RegFile::Input, 0),
            src(RegFile::Input, 1),
            src(RegFile::Const, 0),
            src(RegFile::Const, 1),
            src(RegFile::Input, 0),
            src(RegFile::Input, 1),
            src(RegFile::Input, 0),
        ];
        let code = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .xfc(&sources)
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
        let xfc = validation.instructions().last().unwrap();
        assert_eq!(xfc.dst_params().len(), 0);
        assert_eq!(xfc.src_params().len(), 7);
        assert_eq!(
            xfc.src_params()[6].component_read_mask(),
            ComponentMask::BLUE
        );
    }

    #[test]
    fn excess_parameters_are_eaten_with_a_warning() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.raw_token(crate::token::make_opcode(Opcode::Mov as u16, false));
        builder.raw_token(crate::token::make_dst(
            RegFile::Temp,
            0,
            ComponentMask::ALL,
            0,
            false,
        ));
        for _ in 0..8 {
            builder.raw_token(crate::token::make_src(
                RegFile::Input,
                0,
                Swizzle::IDENTITY,
                SrcModifier::None,
                false,
            ));
        }
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        // The stream stays aligned: the end token is still found, so the
        // only diagnostics are the warning and the arity error.
        assert!(!validation.succeeded());
        assert!(validation.log().contains("extra token(s) ignored"));
        assert!(validation.log().contains("Invalid parameter count"));
        let mov = &validation.instructions()[0];
        assert_eq!(mov.src_params().len(), 7);
        assert_eq!(mov.extra_src_tokens(), 1);
    }

    #[test]
    fn trailing_bytes_after_end_token_are_ignored() {
        let mut code = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .end()
            .to_bytes();
        code.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
    }

    #[test]
    fn arbitrary_swizzle_is_rejected() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.tex(0);
        builder.mov(
            dst(RegFile::Temp, 0),
            src(RegFile::Texture, 0).swizzle(Swizzle(0x1b)),
        );
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("swizzle"));
        // The read-mask dataflow still ran on the decoded swizzle
        let mov = &validation.instructions()[1];
        assert_eq!(
            mov.src_params()[0].component_read_mask(),
            ComponentMask::ALL
        );
    }

    #[test]
    fn too_many_distinct_constants_in_one_cycle() {
        let code = ShaderBuilder::pixel(1, 1)
            .mad(
                dst(RegFile::Temp, 0),
                src(RegFile::Const, 0),
                src(RegFile::Const, 1),
                src(RegFile::Const, 2),
            )
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("3 different constant registers in one cycle (max 2)"));
    }

    #[test]
    fn texm3x2_sequence_must_be_consecutive_and_adjacent() {
        let good = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .texm3x2pad(1, 0)
            .texm3x2tex(2, 0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 2))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&good, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());

        // Destination register of the final row must be base + 1
        let skewed = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .texm3x2pad(1, 0)
            .texm3x2tex(3, 0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 3))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&skewed, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("texm sequence"));

        // A dangling pad row is a whole-program error
        let dangling = ShaderBuilder::pixel(1, 1)
            .tex(0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .texm3x2pad(1, 0)
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&dangling, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("never completed"));
    }

    #[test]
    fn version_gated_opcode_is_rejected_on_older_shaders() {
        // cmp needs ps 1.2
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.cmp(
            dst(RegFile::Temp, 0),
            src(RegFile::Input, 0),
            src(RegFile::Input, 1),
            src(RegFile::Input, 0),
        );
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("'cmp' is not supported by pixel shader version 1.1"));

        let mut builder = ShaderBuilder::pixel(1, 2);
        builder.cmp(
            dst(RegFile::Temp, 0),
            src(RegFile::Input, 0),
            src(RegFile::Input, 1),
            src(RegFile::Input, 0),
        );
        let code = builder.end().to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(validation.succeeded(), "log: {}", validation.log());
    }

    #[test]
    fn vertex_only_opcode_is_not_recognized() {
        let code = ShaderBuilder::pixel(1, 1)
            .frc(dst(RegFile::Temp, 0), src(RegFile::Input, 0))
            .mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation
            .log()
            .contains("'frc' is not a pixel shader instruction"));
    }

    #[test]
    fn out_of_range_registers_are_rejected() {
        let code = ShaderBuilder::pixel(1, 1)
            .mov(dst(RegFile::Temp, 5), src(RegFile::Const, 12))
            .mov(dst(RegFile::Temp, 0), src(RegFile::Input, 0))
            .end()
            .to_bytes();
        let validation = validate_pixel_shader(&code, &caps(), 0);
        assert!(!validation.succeeded());
        assert!(validation.log().contains("Register r5 out of range"));
        assert!(validation.log().contains("Register c12 out of range"));
    }
}
