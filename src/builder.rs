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

//! Fluent builders for shader token streams and vertex declarations.
//!
//! Producing bit-exact streams by hand is error prone; these builders are
//! the writing half of the token codec, used by the test suite and by
//! tooling that needs to synthesize programs for the validator.

use crate::token::{
    self, ComponentMask, RegFile, ShaderKind, ShaderVersion, SrcModifier, Swizzle,
    DECL_END_TOKEN, END_TOKEN, FILE_COMMENT_TAG, LINE_COMMENT_TAG,
};
use crate::Opcode;

/// Destination operand under construction
#[derive(Debug, Clone, Copy)]
pub struct Dst {
    file: RegFile,
    index: u32,
    mask: ComponentMask,
    shift: u8,
    saturate: bool,
}

/// Destination operand for `file[index]`, writing all components
pub fn dst(file: RegFile, index: u32) -> Dst {
    Dst {
        file,
        index,
        mask: ComponentMask::ALL,
        shift: 0,
        saturate: false,
    }
}

impl Dst {
    /// Restrict the write mask
    pub fn mask(mut self, mask: ComponentMask) -> Dst {
        self.mask = mask;
        self
    }

    /// Apply a result shift
    pub fn shift(mut self, shift: u8) -> Dst {
        self.shift = shift;
        self
    }

    /// Saturate the result
    pub fn saturate(mut self) -> Dst {
        self.saturate = true;
        self
    }
}

/// Source operand under construction
#[derive(Debug, Clone, Copy)]
pub struct Src {
    file: RegFile,
    index: u32,
    swizzle: Swizzle,
    modifier: SrcModifier,
    relative: bool,
}

/// Source operand for `file[index]` with the identity swizzle
pub fn src(file: RegFile, index: u32) -> Src {
    Src {
        file,
        index,
        swizzle: Swizzle::IDENTITY,
        modifier: SrcModifier::None,
        relative: false,
    }
}

impl Src {
    /// Route components through a swizzle
    pub fn swizzle(mut self, swizzle: Swizzle) -> Src {
        self.swizzle = swizzle;
        self
    }

    /// Apply a source modifier
    pub fn modifier(mut self, modifier: SrcModifier) -> Src {
        self.modifier = modifier;
        self
    }

    /// Address relative to `a0.x` (vertex shader constants)
    pub fn relative(mut self) -> Src {
        self.relative = true;
        self
    }
}

/// Builder for a shader token stream, starting from the version token
pub struct ShaderBuilder {
    tokens: Vec<u32>,
    last_instruction: Option<usize>,
}

macro_rules! op1 {
    ($name:ident, $op:ident) => {
        /// Emit the corresponding instruction
        pub fn $name(&mut self, dst: Dst, a: Src) -> &mut Self {
            self.instr(Opcode::$op, Some(dst), &[a])
        }
    };
}

macro_rules! op2 {
    ($name:ident, $op:ident) => {
        /// Emit the corresponding instruction
        pub fn $name(&mut self, dst: Dst, a: Src, b: Src) -> &mut Self {
            self.instr(Opcode::$op, Some(dst), &[a, b])
        }
    };
}

macro_rules! op3 {
    ($name:ident, $op:ident) => {
        /// Emit the corresponding instruction
        pub fn $name(&mut self, dst: Dst, a: Src, b: Src, c: Src) -> &mut Self {
            self.instr(Opcode::$op, Some(dst), &[a, b, c])
        }
    };
}

macro_rules! tex_op0 {
    ($name:ident, $op:ident) => {
        /// Emit the corresponding texture instruction on `stage`
        pub fn $name(&mut self, stage: u32) -> &mut Self {
            self.instr(Opcode::$op, Some(dst(RegFile::Texture, stage)), &[])
        }
    };
}

macro_rules! tex_op1 {
    ($name:ident, $op:ident) => {
        /// Emit the corresponding texture instruction reading `src_stage`
        pub fn $name(&mut self, stage: u32, src_stage: u32) -> &mut Self {
            self.instr(
                Opcode::$op,
                Some(dst(RegFile::Texture, stage)),
                &[src(RegFile::Texture, src_stage)],
            )
        }
    };
}

impl ShaderBuilder {
    /// Start a pixel shader stream at the given version
    pub fn pixel(major: u8, minor: u8) -> ShaderBuilder {
        ShaderBuilder::with_version(ShaderKind::Pixel, major, minor)
    }

    /// Start a vertex shader stream at the given version
    pub fn vertex(major: u8, minor: u8) -> ShaderBuilder {
        ShaderBuilder::with_version(ShaderKind::Vertex, major, minor)
    }

    fn with_version(kind: ShaderKind, major: u8, minor: u8) -> ShaderBuilder {
        ShaderBuilder {
            tokens: vec![token::make_version(kind, ShaderVersion::new(major, minor))],
            last_instruction: None,
        }
    }

    /// Emit an arbitrary instruction with its parameter tokens
    pub fn instr(&mut self, opcode: Opcode, dst: Option<Dst>, srcs: &[Src]) -> &mut Self {
        self.last_instruction = Some(self.tokens.len());
        self.tokens.push(token::make_opcode(opcode as u16, false));
        if let Some(d) = dst {
            self.tokens
                .push(token::make_dst(d.file, d.index, d.mask, d.shift, d.saturate));
        }
        for s in srcs {
            self.tokens.push(token::make_src(
                s.file, s.index, s.swizzle, s.modifier, s.relative,
            ));
        }
        self
    }

    /// Mark the most recent instruction as co-issued with its predecessor
    pub fn co_issue(&mut self) -> &mut Self {
        if let Some(index) = self.last_instruction {
            self.tokens[index] |= token::COISSUE_BIT;
        }
        self
    }

    /// Emit a `nop`
    pub fn nop(&mut self) -> &mut Self {
        self.instr(Opcode::Nop, None, &[])
    }

    op1!(mov, Mov);
    op1!(rcp, Rcp);
    op1!(rsq, Rsq);
    op1!(exp, Exp);
    op1!(log, Log);
    op1!(lit, Lit);
    op1!(frc, Frc);
    op1!(expp, Expp);
    op1!(logp, Logp);

    op2!(add, Add);
    op2!(sub, Sub);
    op2!(mul, Mul);
    op2!(dp3, Dp3);
    op2!(dp4, Dp4);
    op2!(min, Min);
    op2!(max, Max);
    op2!(slt, Slt);
    op2!(sge, Sge);
    op2!(bem, Bem);
    op2!(m4x4, M4x4);
    op2!(m4x3, M4x3);
    op2!(m3x4, M3x4);
    op2!(m3x3, M3x3);
    op2!(m3x2, M3x2);

    op3!(mad, Mad);
    op3!(lrp, Lrp);
    op3!(cnd, Cnd);
    op3!(cmp, Cmp);

    tex_op0!(tex, Tex);
    tex_op0!(texcoord, Texcoord);
    tex_op0!(texkill, Texkill);
    tex_op0!(texdepth, Texdepth);

    tex_op1!(texbem, Texbem);
    tex_op1!(texbeml, Texbeml);
    tex_op1!(texreg2ar, Texreg2ar);
    tex_op1!(texreg2gb, Texreg2gb);
    tex_op1!(texreg2rgb, Texreg2rgb);
    tex_op1!(texdp3tex, Texdp3tex);
    tex_op1!(texdp3, Texdp3);
    tex_op1!(texm3x2pad, Texm3x2pad);
    tex_op1!(texm3x2tex, Texm3x2tex);
    tex_op1!(texm3x2depth, Texm3x2depth);
    tex_op1!(texm3x3pad, Texm3x3pad);
    tex_op1!(texm3x3tex, Texm3x3tex);
    tex_op1!(texm3x3vspec, Texm3x3vspec);
    tex_op1!(texm3x3_final, Texm3x3);

    /// Emit `texm3x3spec`, which takes the row source and an eye-ray
    /// constant
    pub fn texm3x3spec(&mut self, stage: u32, src_stage: u32, eye: u32) -> &mut Self {
        self.instr(
            Opcode::Texm3x3spec,
            Some(dst(RegFile::Texture, stage)),
            &[src(RegFile::Texture, src_stage), src(RegFile::Const, eye)],
        )
    }

    /// Emit a `def` defining constant `c{index}` from four floats
    pub fn def(&mut self, index: u32, values: [f32; 4]) -> &mut Self {
        self.last_instruction = Some(self.tokens.len());
        self.tokens.push(token::make_opcode(Opcode::Def as u16, false));
        self.tokens.push(token::make_dst(
            RegFile::Const,
            index,
            ComponentMask::ALL,
            0,
            false,
        ));
        for value in &values {
            self.tokens.push(value.to_bits());
        }
        self
    }

    /// Emit the final-combiner instruction with its seven sources
    pub fn xfc(&mut self, srcs: &[Src]) -> &mut Self {
        self.instr(Opcode::Xfc, None, srcs)
    }

    /// Emit an opaque comment frame wrapping `payload`
    pub fn comment(&mut self, payload: &[u32]) -> &mut Self {
        self.tokens.push(token::make_comment(payload.len() as u32));
        self.tokens.extend_from_slice(payload);
        self
    }

    /// Emit an assembler metadata comment binding the given source file
    /// name to all following instructions
    pub fn source_file(&mut self, name: &str) -> &mut Self {
        let mut bytes: Vec<u8> = name.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        let mut payload = vec![FILE_COMMENT_TAG];
        for chunk in bytes.chunks(4) {
            payload.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        self.comment(&payload)
    }

    /// Emit an assembler metadata comment binding the given source line
    /// number to all following instructions
    pub fn source_line(&mut self, line: u32) -> &mut Self {
        self.comment(&[LINE_COMMENT_TAG, line])
    }

    /// Append a raw token verbatim
    pub fn raw_token(&mut self, raw: u32) -> &mut Self {
        self.tokens.push(raw);
        self
    }

    /// Terminate the stream with the end token
    pub fn end(&mut self) -> &mut Self {
        self.tokens.push(END_TOKEN);
        self
    }

    /// The stream as DWORD tokens
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// The stream as little-endian bytes, ready for the validator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.tokens.len() * 4);
        for raw in &self.tokens {
            bytes.extend_from_slice(&raw.to_le_bytes());
        }
        bytes
    }
}

/// Builder for a vertex shader declaration stream
pub struct DeclBuilder {
    tokens: Vec<u32>,
}

impl DeclBuilder {
    pub fn new() -> DeclBuilder {
        DeclBuilder { tokens: Vec::new() }
    }

    /// Select the vertex stream subsequent records read from
    pub fn stream(&mut self, stream: u32) -> &mut Self {
        self.tokens.push(token::make_decl_stream(stream));
        self
    }

    /// Bind input register `v{reg}` to the current stream
    pub fn input(&mut self, reg: u32) -> &mut Self {
        // The data type nibble is opaque to validation; float4 is typical
        self.tokens.push(token::make_decl_reg(reg, 4));
        self
    }

    /// Skip `count` DWORDs of vertex data without binding a register
    pub fn skip(&mut self, count: u32) -> &mut Self {
        self.tokens.push(token::make_decl_skip(count));
        self
    }

    /// Upload constants starting at `c{addr}`
    pub fn const_mem(&mut self, addr: u32, values: &[[f32; 4]]) -> &mut Self {
        self.tokens
            .push(token::make_decl_const(addr, values.len() as u32));
        for group in values {
            for value in group {
                self.tokens.push(value.to_bits());
            }
        }
        self
    }

    /// Bind input register `v{reg}` to the tessellator
    pub fn tess(&mut self, reg: u32) -> &mut Self {
        self.tokens.push(token::make_decl_tess(reg));
        self
    }

    /// Append a raw declaration token verbatim
    pub fn raw_token(&mut self, raw: u32) -> &mut Self {
        self.tokens.push(raw);
        self
    }

    /// Terminate the declaration with its end sentinel
    pub fn end(&mut self) -> &mut Self {
        self.tokens.push(DECL_END_TOKEN);
        self
    }

    /// The declaration as DWORD tokens
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// The declaration as little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.tokens.len() * 4);
        for raw in &self.tokens {
            bytes.extend_from_slice(&raw.to_le_bytes());
        }
        bytes
    }
}

impl Default for DeclBuilder {
    fn default() -> DeclBuilder {
        DeclBuilder::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder
            .tex(0)
            .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
            .end();

        let tokens = builder.tokens();
        assert_eq!(tokens[0], 0xffff_0101);
        assert_eq!(token::opcode_value(tokens[1]), Opcode::Tex as u16);
        assert!(token::is_param_token(tokens[2]));
        assert_eq!(*tokens.last().unwrap(), END_TOKEN);

        let bytes = builder.to_bytes();
        assert_eq!(bytes.len(), tokens.len() * 4);
        assert_eq!(&bytes[0..4], &[0x01, 0x01, 0xff, 0xff]);
    }

    #[test]
    fn def_embeds_raw_floats() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.def(2, [1.0, 0.0, 0.0, 1.0]).end();
        let tokens = builder.tokens();
        assert_eq!(token::opcode_value(tokens[1]), Opcode::Def as u16);
        assert_eq!(tokens[3], 1.0f32.to_bits());
        assert_eq!(tokens[4], 0);
    }

    #[test]
    fn co_issue_sets_the_flag_on_the_last_instruction() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.mov(
            dst(RegFile::Temp, 0).mask(ComponentMask::RGB),
            src(RegFile::Input, 0),
        );
        builder
            .mov(
                dst(RegFile::Temp, 0).mask(ComponentMask::ALPHA),
                src(RegFile::Input, 1),
            )
            .co_issue();
        let tokens = builder.tokens();
        assert!(!token::has_coissue(tokens[1]));
        assert!(token::has_coissue(tokens[4]));
    }

    #[test]
    fn source_file_comment_round_trips() {
        let mut builder = ShaderBuilder::pixel(1, 1);
        builder.source_file("water.psh");
        let tokens = builder.tokens();
        assert_eq!(token::opcode_value(tokens[1]), token::OP_COMMENT);
        // tag + three DWORDs of padded name
        assert_eq!(token::comment_length(tokens[1]), 4);
        assert_eq!(tokens[2], FILE_COMMENT_TAG);
    }

    #[test]
    fn declaration_stream_shape() {
        let decl = DeclBuilder::new()
            .stream(0)
            .input(0)
            .skip(2)
            .end()
            .to_bytes();
        assert_eq!(decl.len(), 4 * 4);
        assert_eq!(&decl[decl.len() - 4..], &[0xff, 0xff, 0xff, 0xff]);
    }
}
