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

//! Bit layout of the D3D8 shader token stream.
//!
//! Every consumer of the stream goes through this module; there is no
//! ad-hoc bit twiddling elsewhere. Instruction tokens carry the opcode in
//! the low 16 bits, parameter tokens are flagged by bit 31, and comment
//! frames carry a DWORD payload length so they can be skipped wholesale.

use crate::{Error, Result};
use std::fmt;

/// Opcode field of an instruction token
pub const OPCODE_MASK: u32 = 0x0000_ffff;
/// Marks the second instruction of a co-issued pixel shader pair
pub const COISSUE_BIT: u32 = 0x4000_0000;
/// Set on destination and source parameter tokens, clear on instruction tokens
pub const PARAM_BIT: u32 = 0x8000_0000;

/// Opcode value of a comment frame
pub const OP_COMMENT: u16 = 0xfffe;
/// Opcode value of the end-of-stream sentinel
pub const OP_END: u16 = 0xffff;
/// The end-of-stream token in full
pub const END_TOKEN: u32 = 0x0000_ffff;
/// End sentinel of a vertex shader declaration stream
pub const DECL_END_TOKEN: u32 = 0xffff_ffff;

/// Payload length of a comment frame, in DWORDs
pub const COMMENT_LENGTH_MASK: u32 = 0x7fff_0000;
pub const COMMENT_LENGTH_SHIFT: u32 = 16;

/// Register index field of a parameter token
pub const REGISTER_INDEX_MASK: u32 = 0x0000_07ff;
/// Low three bits of the register file tag
pub const REGISTER_TAG_LOW_MASK: u32 = 0x7000_0000;
pub const REGISTER_TAG_LOW_SHIFT: u32 = 28;
/// High two bits of the register file tag
pub const REGISTER_TAG_HIGH_MASK: u32 = 0x0000_1800;
pub const REGISTER_TAG_HIGH_SHIFT: u32 = 11;
/// Relative-addressing flag on vertex shader source tokens
pub const RELATIVE_BIT: u32 = 0x0000_2000;

/// Write mask field of a destination token
pub const WRITE_MASK_MASK: u32 = 0x000f_0000;
pub const WRITE_MASK_SHIFT: u32 = 16;
/// Saturate flag of a destination token
pub const SATURATE_BIT: u32 = 0x0010_0000;
/// Result-shift nibble of a destination token
pub const RESULT_SHIFT_MASK: u32 = 0x0f00_0000;
pub const RESULT_SHIFT_SHIFT: u32 = 24;

/// Swizzle field of a source token
pub const SWIZZLE_MASK: u32 = 0x00ff_0000;
pub const SWIZZLE_SHIFT: u32 = 16;
/// Source-modifier nibble of a source token
pub const SRC_MODIFIER_MASK: u32 = 0x0f00_0000;
pub const SRC_MODIFIER_SHIFT: u32 = 24;

/// Shader-type tag of a pixel shader version token
pub const VERSION_TAG_PIXEL: u32 = 0xffff_0000;
/// Shader-type tag of a vertex shader version token
pub const VERSION_TAG_VERTEX: u32 = 0xfffe_0000;

/// Token-type field of a vertex declaration token
pub const DECL_TOKEN_TYPE_MASK: u32 = 0xe000_0000;
pub const DECL_TOKEN_TYPE_SHIFT: u32 = 29;
/// Declaration record types
pub const DECL_TYPE_NOP: u32 = 0;
pub const DECL_TYPE_STREAM: u32 = 1;
pub const DECL_TYPE_STREAM_DATA: u32 = 2;
pub const DECL_TYPE_TESSELLATOR: u32 = 3;
pub const DECL_TYPE_CONSTMEM: u32 = 4;
pub const DECL_TYPE_EXT: u32 = 5;
/// Marks a stream-data record as padding that binds no register
pub const DECL_SKIP_FLAG: u32 = 0x1000_0000;
/// Register field of a declaration record
pub const DECL_REGISTER_MASK: u32 = 0x0000_001f;
/// 4-DWORD constant count of a constant-memory record
pub const DECL_CONST_COUNT_MASK: u32 = 0x1e00_0000;
pub const DECL_CONST_COUNT_SHIFT: u32 = 25;
/// DWORD count of an extension record
pub const DECL_EXT_COUNT_MASK: u32 = 0x1f00_0000;
pub const DECL_EXT_COUNT_SHIFT: u32 = 24;

/// Tag of an assembler comment carrying a NUL-terminated source file name
pub const FILE_COMMENT_TAG: u32 = u32::from_le_bytes(*b"FILE");
/// Tag of an assembler comment carrying a source line number DWORD
pub const LINE_COMMENT_TAG: u32 = u32::from_le_bytes(*b"LINE");

/// Reserved bits of a pixel shader instruction token
pub const PS_INSTRUCTION_RESERVED: u32 = 0xbfff_0000;
/// Reserved bits of a vertex shader instruction token (no co-issue)
pub const VS_INSTRUCTION_RESERVED: u32 = 0xffff_0000;
/// Reserved bits of a pixel shader destination token
pub const PS_DST_RESERVED: u32 = 0x00e0_e000;
/// Reserved bits of a vertex shader destination token (no modifier, no shift)
pub const VS_DST_RESERVED: u32 = 0x0ff0_e000;
/// Reserved bits of a pixel shader source token
pub const PS_SRC_RESERVED: u32 = 0x0000_e000;
/// Reserved bits of a vertex shader source token (bit 13 selects relative addressing)
pub const VS_SRC_RESERVED: u32 = 0x0000_c000;

/// The two shader families sharing the token encoding
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Pixel shader (`ps` programs)
    Pixel,
    /// Vertex shader (`vs` programs)
    Vertex,
}

impl ShaderKind {
    /// Lowercase family name as used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ShaderKind::Pixel => "pixel",
            ShaderKind::Vertex => "vertex",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shader version extracted from the leading version token
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderVersion {
    /// Major version number
    pub major: u8,
    /// Minor version number
    pub minor: u8,
}

impl ShaderVersion {
    /// Version from its components
    pub const fn new(major: u8, minor: u8) -> ShaderVersion {
        ShaderVersion { major, minor }
    }
}

impl fmt::Display for ShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

bitflags! {
    /// Mask over the four color/vector components of a register.
    ///
    /// Used both for destination write masks and for the derived
    /// per-source component read masks.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ComponentMask: u32 {
        /// First component (`.x` in vertex shaders, `.r` in pixel shaders)
        const RED = 1 << 0;
        /// Second component
        const GREEN = 1 << 1;
        /// Third component
        const BLUE = 1 << 2;
        /// Fourth component
        const ALPHA = 1 << 3;
        /// The three color components
        const RGB = Self::RED.bits | Self::GREEN.bits | Self::BLUE.bits;
        /// All four components
        const ALL = Self::RGB.bits | Self::ALPHA.bits;
    }
}

impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(".")?;
        for (bit, name) in &[
            (ComponentMask::RED, "x"),
            (ComponentMask::GREEN, "y"),
            (ComponentMask::BLUE, "z"),
            (ComponentMask::ALPHA, "w"),
        ] {
            if self.contains(*bit) {
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

/// Four 2-bit selectors routing source components to destination components
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swizzle(pub u8);

impl Swizzle {
    /// Every output selects its same-index source component
    pub const IDENTITY: Swizzle = Swizzle(0xe4);
    /// Every output selects the alpha component
    pub const ALPHA_REPLICATE: Swizzle = Swizzle(0xff);
    /// Every output selects the blue component
    pub const BLUE_REPLICATE: Swizzle = Swizzle(0xaa);

    /// Source component (0..4) selected for the given output component (0..4)
    pub fn select(self, output: u32) -> u32 {
        (u32::from(self.0) >> (2 * output)) & 0x3
    }

    /// Set of source components read when the given output components are
    /// enabled. This is the core of the component-read-mask dataflow: each
    /// enabled output routes through its selector and the results are OR'd.
    pub fn route(self, enabled: ComponentMask) -> ComponentMask {
        let mut read = ComponentMask::empty();
        for output in 0..4 {
            if enabled.bits() & (1 << output) != 0 {
                read |= ComponentMask::from_bits_truncate(1 << self.select(output));
            }
        }
        read
    }
}

/// Modifier applied to a source parameter before the operation reads it
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SrcModifier {
    /// Value used as-is
    None = 0,
    /// -v
    Negate = 1,
    /// v - 0.5
    Bias = 2,
    /// -(v - 0.5)
    BiasNegate = 3,
    /// 2 * (v - 0.5), the `_bx2` modifier
    Sign = 4,
    /// -2 * (v - 0.5)
    SignNegate = 5,
    /// 1 - v
    Complement = 6,
    /// 2 * v
    X2 = 7,
    /// -2 * v
    X2Negate = 8,
    /// v / v.z
    Dz = 9,
    /// v / v.w
    Dw = 10,
}

impl SrcModifier {
    /// Modifier from its 4-bit encoding, `None` if the nibble is undefined
    pub fn from_bits(bits: u32) -> Option<SrcModifier> {
        Some(match bits {
            0 => SrcModifier::None,
            1 => SrcModifier::Negate,
            2 => SrcModifier::Bias,
            3 => SrcModifier::BiasNegate,
            4 => SrcModifier::Sign,
            5 => SrcModifier::SignNegate,
            6 => SrcModifier::Complement,
            7 => SrcModifier::X2,
            8 => SrcModifier::X2Negate,
            9 => SrcModifier::Dz,
            10 => SrcModifier::Dw,
            _ => return None,
        })
    }

    /// The 4-bit encoding of this modifier
    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Result-shift values legal on pixel shader arithmetic destinations
pub const SHIFT_NONE: u8 = 0;
pub const SHIFT_X2: u8 = 1;
pub const SHIFT_X4: u8 = 2;
pub const SHIFT_D2: u8 = 15;

/// A logical register bank addressed by parameter tokens
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFile {
    /// Read/write temporaries (`r#`)
    Temp,
    /// Input registers (`v#`)
    Input,
    /// Constant registers (`c#`)
    Const,
    /// Vertex shader address register (`a0`)
    Addr,
    /// Pixel shader texture registers (`t#`)
    Texture,
    /// Vertex shader rasterizer outputs (`oPos`, `oFog`, `oPts`)
    RastOut,
    /// Vertex shader attribute (color) outputs (`oD#`)
    AttrOut,
    /// Vertex shader texture coordinate outputs (`oT#`)
    TexCrdOut,
}

impl RegFile {
    /// Register file from the assembled 5-bit tag. Tag 3 is the address
    /// register in vertex shaders and the texture register in pixel shaders.
    pub fn from_tag(tag: u8, kind: ShaderKind) -> Result<RegFile> {
        Ok(match tag {
            0 => RegFile::Temp,
            1 => RegFile::Input,
            2 => RegFile::Const,
            3 => match kind {
                ShaderKind::Vertex => RegFile::Addr,
                ShaderKind::Pixel => RegFile::Texture,
            },
            4 => RegFile::RastOut,
            5 => RegFile::AttrOut,
            6 => RegFile::TexCrdOut,
            tag => {
                return Err(Error::Malformed(format!(
                    "Invalid register file tag: {:#x}",
                    tag
                )))
            }
        })
    }

    /// Noun used when diagnostics talk about the file's registers
    pub fn noun(self) -> &'static str {
        match self {
            RegFile::Temp => "temporary",
            RegFile::Input => "input",
            RegFile::Const => "constant",
            RegFile::Addr => "address",
            RegFile::Texture => "texture",
            RegFile::RastOut => "rasterizer output",
            RegFile::AttrOut => "attribute output",
            RegFile::TexCrdOut => "texture coordinate output",
        }
    }

    /// The 5-bit tag of this register file
    pub fn tag(self) -> u8 {
        match self {
            RegFile::Temp => 0,
            RegFile::Input => 1,
            RegFile::Const => 2,
            RegFile::Addr | RegFile::Texture => 3,
            RegFile::RastOut => 4,
            RegFile::AttrOut => 5,
            RegFile::TexCrdOut => 6,
        }
    }
}

/// Assembly-style name of a register, e.g. `r0`, `c12`, `oPos`
pub fn register_name(file: RegFile, index: u32) -> String {
    match file {
        RegFile::Temp => format!("r{}", index),
        RegFile::Input => format!("v{}", index),
        RegFile::Const => format!("c{}", index),
        RegFile::Addr => format!("a{}", index),
        RegFile::Texture => format!("t{}", index),
        RegFile::RastOut => match index {
            0 => "oPos".to_string(),
            1 => "oFog".to_string(),
            2 => "oPts".to_string(),
            _ => format!("oRast{}", index),
        },
        RegFile::AttrOut => format!("oD{}", index),
        RegFile::TexCrdOut => format!("oT{}", index),
    }
}

/// Opcode field of an instruction token
pub fn opcode_value(token: u32) -> u16 {
    (token & OPCODE_MASK) as u16
}

/// Whether bit 31 flags this token as a parameter token
pub fn is_param_token(token: u32) -> bool {
    token & PARAM_BIT != 0
}

/// Whether the co-issue flag is set on an instruction token
pub fn has_coissue(token: u32) -> bool {
    token & COISSUE_BIT != 0
}

/// Payload length of a comment frame, in DWORDs
pub fn comment_length(token: u32) -> u32 {
    (token & COMMENT_LENGTH_MASK) >> COMMENT_LENGTH_SHIFT
}

/// Register index of a parameter token
pub fn register_index(token: u32) -> u32 {
    token & REGISTER_INDEX_MASK
}

/// Register file tag of a parameter token, assembled from its split field
pub fn register_tag(token: u32) -> u8 {
    let low = (token & REGISTER_TAG_LOW_MASK) >> REGISTER_TAG_LOW_SHIFT;
    let high = (token & REGISTER_TAG_HIGH_MASK) >> REGISTER_TAG_HIGH_SHIFT;
    (low | (high << 3)) as u8
}

/// Write mask of a destination token
pub fn write_mask(token: u32) -> ComponentMask {
    ComponentMask::from_bits_truncate((token & WRITE_MASK_MASK) >> WRITE_MASK_SHIFT)
}

/// Result-shift nibble of a destination token
pub fn result_shift(token: u32) -> u8 {
    ((token & RESULT_SHIFT_MASK) >> RESULT_SHIFT_SHIFT) as u8
}

/// Saturate flag of a destination token
pub fn has_saturate(token: u32) -> bool {
    token & SATURATE_BIT != 0
}

/// Swizzle field of a source token
pub fn swizzle_of(token: u32) -> Swizzle {
    Swizzle(((token & SWIZZLE_MASK) >> SWIZZLE_SHIFT) as u8)
}

/// Source-modifier field of a source token
pub fn source_modifier(token: u32) -> Result<SrcModifier> {
    let bits = (token & SRC_MODIFIER_MASK) >> SRC_MODIFIER_SHIFT;
    SrcModifier::from_bits(bits)
        .ok_or_else(|| Error::Malformed(format!("Invalid source modifier: {:#x}", bits)))
}

/// Relative-addressing flag of a vertex shader source token
pub fn is_relative(token: u32) -> bool {
    token & RELATIVE_BIT != 0
}

/// Build a version token for the given shader family
pub fn make_version(kind: ShaderKind, version: ShaderVersion) -> u32 {
    let tag = match kind {
        ShaderKind::Pixel => VERSION_TAG_PIXEL,
        ShaderKind::Vertex => VERSION_TAG_VERTEX,
    };
    tag | (u32::from(version.major) << 8) | u32::from(version.minor)
}

/// Split a version token into shader family and version
pub fn parse_version(token: u32) -> Result<(ShaderKind, ShaderVersion)> {
    let kind = match token & 0xffff_0000 {
        VERSION_TAG_PIXEL => ShaderKind::Pixel,
        VERSION_TAG_VERTEX => ShaderKind::Vertex,
        tag => {
            return Err(Error::Malformed(format!(
                "Invalid shader version token: {:#010x}",
                tag | (token & OPCODE_MASK)
            )))
        }
    };
    let version = ShaderVersion::new(((token >> 8) & 0xff) as u8, (token & 0xff) as u8);
    Ok((kind, version))
}

/// Build an instruction token
pub fn make_opcode(opcode: u16, coissue: bool) -> u32 {
    let mut token = u32::from(opcode);
    if coissue {
        token |= COISSUE_BIT;
    }
    token
}

/// Build a comment frame token for a payload of `length` DWORDs
pub fn make_comment(length: u32) -> u32 {
    u32::from(OP_COMMENT) | ((length << COMMENT_LENGTH_SHIFT) & COMMENT_LENGTH_MASK)
}

fn make_register(file: RegFile, index: u32) -> u32 {
    let tag = u32::from(file.tag());
    PARAM_BIT
        | ((tag & 0x7) << REGISTER_TAG_LOW_SHIFT)
        | (((tag >> 3) & 0x3) << REGISTER_TAG_HIGH_SHIFT)
        | (index & REGISTER_INDEX_MASK)
}

/// Build a destination parameter token
pub fn make_dst(
    file: RegFile,
    index: u32,
    mask: ComponentMask,
    shift: u8,
    saturate: bool,
) -> u32 {
    let mut token = make_register(file, index) | (mask.bits() << WRITE_MASK_SHIFT);
    token |= (u32::from(shift) << RESULT_SHIFT_SHIFT) & RESULT_SHIFT_MASK;
    if saturate {
        token |= SATURATE_BIT;
    }
    token
}

/// Build a source parameter token
pub fn make_src(
    file: RegFile,
    index: u32,
    swizzle: Swizzle,
    modifier: SrcModifier,
    relative: bool,
) -> u32 {
    let mut token = make_register(file, index)
        | (u32::from(swizzle.0) << SWIZZLE_SHIFT)
        | (modifier.bits() << SRC_MODIFIER_SHIFT);
    if relative {
        token |= RELATIVE_BIT;
    }
    token
}

/// Record type of a vertex declaration token
pub fn decl_token_type(token: u32) -> u32 {
    (token & DECL_TOKEN_TYPE_MASK) >> DECL_TOKEN_TYPE_SHIFT
}

/// Register bound by a declaration record
pub fn decl_register(token: u32) -> u32 {
    token & DECL_REGISTER_MASK
}

/// Number of 4-DWORD constants in a constant-memory record
pub fn decl_const_count(token: u32) -> u32 {
    (token & DECL_CONST_COUNT_MASK) >> DECL_CONST_COUNT_SHIFT
}

/// Number of payload DWORDs in an extension record
pub fn decl_ext_count(token: u32) -> u32 {
    (token & DECL_EXT_COUNT_MASK) >> DECL_EXT_COUNT_SHIFT
}

/// Build a stream-selector declaration record
pub fn make_decl_stream(stream: u32) -> u32 {
    (DECL_TYPE_STREAM << DECL_TOKEN_TYPE_SHIFT) | stream
}

/// Build a stream-data record binding `reg` with the given data type
pub fn make_decl_reg(reg: u32, data_type: u32) -> u32 {
    (DECL_TYPE_STREAM_DATA << DECL_TOKEN_TYPE_SHIFT)
        | ((data_type & 0xf) << 16)
        | (reg & DECL_REGISTER_MASK)
}

/// Build a stream-data record that skips `count` DWORDs of vertex data
pub fn make_decl_skip(count: u32) -> u32 {
    (DECL_TYPE_STREAM_DATA << DECL_TOKEN_TYPE_SHIFT) | DECL_SKIP_FLAG | ((count & 0xf) << 16)
}

/// Build a constant-memory record header for `count` 4-DWORD constants
pub fn make_decl_const(addr: u32, count: u32) -> u32 {
    (DECL_TYPE_CONSTMEM << DECL_TOKEN_TYPE_SHIFT)
        | ((count << DECL_CONST_COUNT_SHIFT) & DECL_CONST_COUNT_MASK)
        | (addr & 0x7f)
}

/// Build a tessellator record binding `reg`
pub fn make_decl_tess(reg: u32) -> u32 {
    (DECL_TYPE_TESSELLATOR << DECL_TOKEN_TYPE_SHIFT) | (reg & DECL_REGISTER_MASK)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_tokens() {
        let token = make_version(ShaderKind::Pixel, ShaderVersion::new(1, 1));
        assert_eq!(token, 0xffff_0101);
        let (kind, version) = parse_version(token).unwrap();
        assert_eq!(kind, ShaderKind::Pixel);
        assert_eq!(version, ShaderVersion::new(1, 1));

        let token = make_version(ShaderKind::Vertex, ShaderVersion::new(1, 0));
        assert_eq!(token, 0xfffe_0100);
        let (kind, version) = parse_version(token).unwrap();
        assert_eq!(kind, ShaderKind::Vertex);
        assert_eq!(version, ShaderVersion::new(1, 0));

        assert!(parse_version(0x1234_0101).is_err());
    }

    #[test]
    fn instruction_token_fields() {
        let token = make_opcode(0x42, false);
        assert_eq!(opcode_value(token), 0x42);
        assert!(!has_coissue(token));
        assert!(!is_param_token(token));

        let token = make_opcode(0x2, true);
        assert!(has_coissue(token));
        assert_eq!(token & PS_INSTRUCTION_RESERVED, 0);
    }

    #[test]
    fn comment_frame_fields() {
        let token = make_comment(5);
        assert_eq!(opcode_value(token), OP_COMMENT);
        assert_eq!(comment_length(token), 5);
        assert!(!is_param_token(token));

        // Length field saturates at 15 bits
        assert_eq!(comment_length(make_comment(0x7fff)), 0x7fff);
    }

    #[test]
    fn dst_token_fields() {
        let token = make_dst(RegFile::Temp, 1, ComponentMask::RGB, SHIFT_X2, true);
        assert!(is_param_token(token));
        assert_eq!(register_tag(token), 0);
        assert_eq!(register_index(token), 1);
        assert_eq!(write_mask(token), ComponentMask::RGB);
        assert_eq!(result_shift(token), SHIFT_X2);
        assert!(has_saturate(token));

        let token = make_dst(RegFile::TexCrdOut, 3, ComponentMask::ALL, 0, false);
        assert_eq!(
            RegFile::from_tag(register_tag(token), ShaderKind::Vertex).unwrap(),
            RegFile::TexCrdOut
        );
        assert_eq!(result_shift(token), 0);
        assert!(!has_saturate(token));
    }

    #[test]
    fn src_token_fields() {
        let token = make_src(
            RegFile::Const,
            10,
            Swizzle::ALPHA_REPLICATE,
            SrcModifier::Negate,
            true,
        );
        assert!(is_param_token(token));
        assert_eq!(register_index(token), 10);
        assert_eq!(swizzle_of(token), Swizzle::ALPHA_REPLICATE);
        assert_eq!(source_modifier(token).unwrap(), SrcModifier::Negate);
        assert!(is_relative(token));

        let token = make_src(RegFile::Temp, 0, Swizzle::IDENTITY, SrcModifier::None, false);
        assert_eq!(swizzle_of(token), Swizzle::IDENTITY);
        assert!(!is_relative(token));
        assert_eq!(token & PS_SRC_RESERVED, 0);
    }

    #[test]
    fn src_modifier_encodings() {
        for bits in 0..=10 {
            let modifier = SrcModifier::from_bits(bits).unwrap();
            assert_eq!(modifier.bits(), bits);
        }
        for bits in 11..16 {
            assert!(SrcModifier::from_bits(bits).is_none());
        }
        let token = make_src(RegFile::Temp, 0, Swizzle::IDENTITY, SrcModifier::None, false)
            | (11 << SRC_MODIFIER_SHIFT);
        assert!(source_modifier(token).is_err());
    }

    #[test]
    fn register_tag_mapping_is_family_specific() {
        assert_eq!(
            RegFile::from_tag(3, ShaderKind::Vertex).unwrap(),
            RegFile::Addr
        );
        assert_eq!(
            RegFile::from_tag(3, ShaderKind::Pixel).unwrap(),
            RegFile::Texture
        );
        assert!(RegFile::from_tag(7, ShaderKind::Pixel).is_err());

        for &file in &[
            RegFile::Temp,
            RegFile::Input,
            RegFile::Const,
            RegFile::RastOut,
            RegFile::AttrOut,
            RegFile::TexCrdOut,
        ] {
            assert_eq!(
                RegFile::from_tag(file.tag(), ShaderKind::Vertex).unwrap(),
                file
            );
        }
    }

    #[test]
    fn reserved_masks_do_not_cover_defined_fields() {
        for &reserved in &[PS_DST_RESERVED, VS_DST_RESERVED] {
            assert_eq!(reserved & PARAM_BIT, 0);
            assert_eq!(reserved & REGISTER_TAG_LOW_MASK, 0);
            assert_eq!(reserved & REGISTER_TAG_HIGH_MASK, 0);
            assert_eq!(reserved & REGISTER_INDEX_MASK, 0);
            assert_eq!(reserved & WRITE_MASK_MASK, 0);
        }
        // Saturate and result shift exist on pixel shader destinations only
        assert_eq!(PS_DST_RESERVED & SATURATE_BIT, 0);
        assert_eq!(PS_DST_RESERVED & RESULT_SHIFT_MASK, 0);
        assert_ne!(VS_DST_RESERVED & SATURATE_BIT, 0);
        assert_ne!(VS_DST_RESERVED & RESULT_SHIFT_MASK, 0);

        for &reserved in &[PS_SRC_RESERVED, VS_SRC_RESERVED] {
            assert_eq!(reserved & SWIZZLE_MASK, 0);
            assert_eq!(reserved & SRC_MODIFIER_MASK, 0);
            assert_eq!(reserved & REGISTER_INDEX_MASK, 0);
        }
        // Relative addressing exists on vertex shader sources only
        assert_ne!(PS_SRC_RESERVED & RELATIVE_BIT, 0);
        assert_eq!(VS_SRC_RESERVED & RELATIVE_BIT, 0);

        assert_eq!(PS_INSTRUCTION_RESERVED & OPCODE_MASK, 0);
        assert_eq!(PS_INSTRUCTION_RESERVED & COISSUE_BIT, 0);
        assert_ne!(VS_INSTRUCTION_RESERVED & COISSUE_BIT, 0);
    }

    #[test]
    fn swizzle_selects() {
        assert_eq!(Swizzle::IDENTITY.select(0), 0);
        assert_eq!(Swizzle::IDENTITY.select(1), 1);
        assert_eq!(Swizzle::IDENTITY.select(2), 2);
        assert_eq!(Swizzle::IDENTITY.select(3), 3);
        for output in 0..4 {
            assert_eq!(Swizzle::ALPHA_REPLICATE.select(output), 3);
            assert_eq!(Swizzle::BLUE_REPLICATE.select(output), 2);
        }
    }

    #[test]
    fn swizzle_routing() {
        assert_eq!(
            Swizzle::IDENTITY.route(ComponentMask::ALL),
            ComponentMask::ALL
        );
        assert_eq!(
            Swizzle::IDENTITY.route(ComponentMask::RGB),
            ComponentMask::RGB
        );
        assert_eq!(
            Swizzle::ALPHA_REPLICATE.route(ComponentMask::ALL),
            ComponentMask::ALPHA
        );
        assert_eq!(
            Swizzle::BLUE_REPLICATE.route(ComponentMask::RED | ComponentMask::GREEN),
            ComponentMask::BLUE
        );
        assert_eq!(
            Swizzle::IDENTITY.route(ComponentMask::empty()),
            ComponentMask::empty()
        );
        // .wzyx reversal
        assert_eq!(
            Swizzle(0x1b).route(ComponentMask::RED),
            ComponentMask::ALPHA
        );
    }

    #[test]
    fn component_mask_display() {
        assert_eq!(format!("{}", ComponentMask::ALL), ".xyzw");
        assert_eq!(
            format!("{}", ComponentMask::RED | ComponentMask::GREEN),
            ".xy"
        );
        assert_eq!(format!("{}", ComponentMask::GREEN), ".y");
    }

    #[test]
    fn register_names() {
        assert_eq!(register_name(RegFile::Temp, 0), "r0");
        assert_eq!(register_name(RegFile::Texture, 3), "t3");
        assert_eq!(register_name(RegFile::RastOut, 0), "oPos");
        assert_eq!(register_name(RegFile::RastOut, 1), "oFog");
        assert_eq!(register_name(RegFile::AttrOut, 1), "oD1");
        assert_eq!(register_name(RegFile::TexCrdOut, 2), "oT2");
    }

    #[test]
    fn declaration_record_fields() {
        let token = make_decl_stream(2);
        assert_eq!(decl_token_type(token), DECL_TYPE_STREAM);

        let token = make_decl_reg(7, 4);
        assert_eq!(decl_token_type(token), DECL_TYPE_STREAM_DATA);
        assert_eq!(decl_register(token), 7);
        assert_eq!(token & DECL_SKIP_FLAG, 0);

        let token = make_decl_skip(3);
        assert_eq!(decl_token_type(token), DECL_TYPE_STREAM_DATA);
        assert_ne!(token & DECL_SKIP_FLAG, 0);

        let token = make_decl_const(16, 2);
        assert_eq!(decl_token_type(token), DECL_TYPE_CONSTMEM);
        assert_eq!(decl_const_count(token), 2);

        let token = make_decl_tess(5);
        assert_eq!(decl_token_type(token), DECL_TYPE_TESSELLATOR);
        assert_eq!(decl_register(token), 5);

        assert_eq!(decl_token_type(DECL_END_TOKEN), 7);
    }
}
