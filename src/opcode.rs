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

use crate::{ShaderKind, ShaderVersion};

/// Instruction opcodes of the D3D8 shader families.
///
/// Discriminants are the encoded opcode values; comment (0xfffe) and end
/// (0xffff) are stream framing, not instructions, and are handled by the
/// decoder before opcode lookup.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Nop = 0x00,
    Mov = 0x01,
    Add = 0x02,
    Sub = 0x03,
    Mad = 0x04,
    Mul = 0x05,
    Rcp = 0x06,
    Rsq = 0x07,
    Dp3 = 0x08,
    Dp4 = 0x09,
    Min = 0x0a,
    Max = 0x0b,
    Slt = 0x0c,
    Sge = 0x0d,
    Exp = 0x0e,
    Log = 0x0f,
    Lit = 0x10,
    Dst = 0x11,
    Lrp = 0x12,
    Frc = 0x13,
    M4x4 = 0x14,
    M4x3 = 0x15,
    M3x4 = 0x16,
    M3x3 = 0x17,
    M3x2 = 0x18,
    Texcoord = 0x40,
    Texkill = 0x41,
    Tex = 0x42,
    Texbem = 0x43,
    Texbeml = 0x44,
    Texreg2ar = 0x45,
    Texreg2gb = 0x46,
    Texm3x2pad = 0x47,
    Texm3x2tex = 0x48,
    Texm3x3pad = 0x49,
    Texm3x3tex = 0x4a,
    Texm3x3spec = 0x4c,
    Texm3x3vspec = 0x4d,
    Expp = 0x4e,
    Logp = 0x4f,
    Cnd = 0x50,
    Def = 0x51,
    Texreg2rgb = 0x52,
    Texdp3tex = 0x53,
    Texm3x2depth = 0x54,
    Texdp3 = 0x55,
    Texm3x3 = 0x56,
    Texdepth = 0x57,
    Cmp = 0x58,
    Bem = 0x59,
    /// Final-combiner pseudo-instruction: seven sources, no destination
    Xfc = 0x70,
}

/// Position of a `texm*` instruction inside its matrix sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexmRole {
    /// First row of a 3x2 sequence
    Pad2,
    /// Final row of a 3x2 sequence
    Final2,
    /// One of the first two rows of a 3x3 sequence
    Pad3,
    /// Final row of a 3x3 sequence
    Final3,
}

impl Opcode {
    /// Opcode from its encoded value, `None` for values outside the set
    pub fn from_u16(value: u16) -> Option<Opcode> {
        use Opcode::*;
        Some(match value {
            0x00 => Nop,
            0x01 => Mov,
            0x02 => Add,
            0x03 => Sub,
            0x04 => Mad,
            0x05 => Mul,
            0x06 => Rcp,
            0x07 => Rsq,
            0x08 => Dp3,
            0x09 => Dp4,
            0x0a => Min,
            0x0b => Max,
            0x0c => Slt,
            0x0d => Sge,
            0x0e => Exp,
            0x0f => Log,
            0x10 => Lit,
            0x11 => Dst,
            0x12 => Lrp,
            0x13 => Frc,
            0x14 => M4x4,
            0x15 => M4x3,
            0x16 => M3x4,
            0x17 => M3x3,
            0x18 => M3x2,
            0x40 => Texcoord,
            0x41 => Texkill,
            0x42 => Tex,
            0x43 => Texbem,
            0x44 => Texbeml,
            0x45 => Texreg2ar,
            0x46 => Texreg2gb,
            0x47 => Texm3x2pad,
            0x48 => Texm3x2tex,
            0x49 => Texm3x3pad,
            0x4a => Texm3x3tex,
            0x4c => Texm3x3spec,
            0x4d => Texm3x3vspec,
            0x4e => Expp,
            0x4f => Logp,
            0x50 => Cnd,
            0x51 => Def,
            0x52 => Texreg2rgb,
            0x53 => Texdp3tex,
            0x54 => Texm3x2depth,
            0x55 => Texdp3,
            0x56 => Texm3x3,
            0x57 => Texdepth,
            0x58 => Cmp,
            0x59 => Bem,
            0x70 => Xfc,
            _ => return None,
        })
    }

    /// Assembly mnemonic
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Mov => "mov",
            Add => "add",
            Sub => "sub",
            Mad => "mad",
            Mul => "mul",
            Rcp => "rcp",
            Rsq => "rsq",
            Dp3 => "dp3",
            Dp4 => "dp4",
            Min => "min",
            Max => "max",
            Slt => "slt",
            Sge => "sge",
            Exp => "exp",
            Log => "log",
            Lit => "lit",
            Dst => "dst",
            Lrp => "lrp",
            Frc => "frc",
            M4x4 => "m4x4",
            M4x3 => "m4x3",
            M3x4 => "m3x4",
            M3x3 => "m3x3",
            M3x2 => "m3x2",
            Texcoord => "texcoord",
            Texkill => "texkill",
            Tex => "tex",
            Texbem => "texbem",
            Texbeml => "texbeml",
            Texreg2ar => "texreg2ar",
            Texreg2gb => "texreg2gb",
            Texm3x2pad => "texm3x2pad",
            Texm3x2tex => "texm3x2tex",
            Texm3x3pad => "texm3x3pad",
            Texm3x3tex => "texm3x3tex",
            Texm3x3spec => "texm3x3spec",
            Texm3x3vspec => "texm3x3vspec",
            Expp => "expp",
            Logp => "logp",
            Cnd => "cnd",
            Def => "def",
            Texreg2rgb => "texreg2rgb",
            Texdp3tex => "texdp3tex",
            Texm3x2depth => "texm3x2depth",
            Texdp3 => "texdp3",
            Texm3x3 => "texm3x3",
            Texdepth => "texdepth",
            Cmp => "cmp",
            Bem => "bem",
            Xfc => "xfc",
        }
    }

    /// Number of destination parameters the instruction takes
    pub fn dst_count(self) -> usize {
        match self {
            Opcode::Nop | Opcode::Xfc => 0,
            _ => 1,
        }
    }

    /// Number of source parameters the instruction takes
    pub fn src_count(self) -> usize {
        use Opcode::*;
        match self {
            Nop | Texcoord | Texkill | Tex | Texdepth | Def => 0,
            Mov | Rcp | Rsq | Exp | Log | Lit | Frc | Expp | Logp | Texbem | Texbeml
            | Texreg2ar | Texreg2gb | Texreg2rgb | Texdp3tex | Texdp3 | Texm3x2pad
            | Texm3x2tex | Texm3x2depth | Texm3x3pad | Texm3x3tex | Texm3x3vspec | Texm3x3 => 1,
            Add | Sub | Mul | Dp3 | Dp4 | Min | Max | Slt | Sge | Dst | M4x4 | M4x3 | M3x4
            | M3x3 | M3x2 | Texm3x3spec | Bem => 2,
            Mad | Lrp | Cnd | Cmp => 3,
            Xfc => 7,
        }
    }

    /// Pixel shader versions that accept this instruction, `None` if it is
    /// not a pixel shader instruction at all
    pub fn ps_versions(self) -> Option<(ShaderVersion, ShaderVersion)> {
        use Opcode::*;
        let range = match self {
            Nop | Mov | Add | Sub | Mad | Mul | Dp3 | Lrp | Def | Texcoord | Texkill | Tex
            | Texbem | Texbeml | Texreg2ar | Texreg2gb | Texm3x2pad | Texm3x2tex | Texm3x3pad
            | Texm3x3tex | Texm3x3spec | Texm3x3vspec | Xfc => (1, 0, 1, 3),
            Cnd | Bem => (1, 1, 1, 3),
            Dp4 | Cmp | Texreg2rgb | Texdp3tex | Texdp3 | Texm3x3 => (1, 2, 1, 3),
            Texm3x2depth | Texdepth => (1, 3, 1, 3),
            _ => return None,
        };
        Some((
            ShaderVersion::new(range.0, range.1),
            ShaderVersion::new(range.2, range.3),
        ))
    }

    /// Vertex shader versions that accept this instruction
    pub fn vs_versions(self) -> Option<(ShaderVersion, ShaderVersion)> {
        use Opcode::*;
        match self {
            Nop | Mov | Add | Sub | Mad | Mul | Rcp | Rsq | Dp3 | Dp4 | Min | Max | Slt | Sge
            | Exp | Log | Lit | Dst | Frc | M4x4 | M4x3 | M3x4 | M3x3 | M3x2 | Expp | Logp => {
                Some((ShaderVersion::new(1, 0), ShaderVersion::new(1, 1)))
            }
            _ => None,
        }
    }

    /// Versions that accept this instruction in the given family
    pub fn versions(self, kind: ShaderKind) -> Option<(ShaderVersion, ShaderVersion)> {
        match kind {
            ShaderKind::Pixel => self.ps_versions(),
            ShaderKind::Vertex => self.vs_versions(),
        }
    }

    /// Whether this is a pixel shader texture addressing instruction
    pub fn is_texture_op(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Texcoord
                | Texkill
                | Tex
                | Texbem
                | Texbeml
                | Texreg2ar
                | Texreg2gb
                | Texreg2rgb
                | Texdp3tex
                | Texdp3
                | Texm3x2pad
                | Texm3x2tex
                | Texm3x2depth
                | Texm3x3pad
                | Texm3x3tex
                | Texm3x3spec
                | Texm3x3vspec
                | Texm3x3
                | Texdepth
        )
    }

    /// Whether this is a pixel shader arithmetic (blending) instruction
    pub fn is_blend_op(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Mov | Add | Sub | Mad | Mul | Dp3 | Dp4 | Lrp | Cnd | Cmp | Bem
        )
    }

    /// Role inside a `texm*` matrix sequence, if any
    pub fn texm_role(self) -> Option<TexmRole> {
        use Opcode::*;
        match self {
            Texm3x2pad => Some(TexmRole::Pad2),
            Texm3x2tex | Texm3x2depth => Some(TexmRole::Final2),
            Texm3x3pad => Some(TexmRole::Pad3),
            Texm3x3tex | Texm3x3spec | Texm3x3vspec | Texm3x3 => Some(TexmRole::Final3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
