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

use crate::token::{self, ComponentMask, RegFile, ShaderKind, SrcModifier, Swizzle};
use crate::{Opcode, Result};
use getset::{CopyGetters, Getters};

/// Hard cap on `dst + src` parameters of one instruction. Tokens beyond it
/// are consumed without decoding so the stream stays aligned.
pub const MAX_PARAMS: usize = 8;

/// Source file and line an instruction maps back to, recovered from
/// assembler comment frames. Applies to all instructions that follow the
/// comment until the next one overwrites it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, Getters, CopyGetters)]
pub struct SrcLocation {
    #[get = "pub"]
    /// Source file name, if the assembler provided one
    file: Option<String>,
    #[get_copy = "pub"]
    /// Source line number, if the assembler provided one
    line: Option<u32>,
}

impl SrcLocation {
    pub(crate) fn new(file: Option<String>, line: Option<u32>) -> SrcLocation {
        SrcLocation { file, line }
    }
}

/// Decoded destination parameter of an instruction
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, CopyGetters)]
#[get_copy = "pub"]
pub struct DstParam {
    /// Register file written to
    file: RegFile,
    /// Register index inside the file
    index: u32,
    /// Components written
    write_mask: ComponentMask,
    /// Result-shift nibble (pixel shaders only)
    shift: u8,
    /// Saturate modifier (pixel shaders only)
    saturate: bool,
    /// The raw parameter token
    token: u32,
}

impl DstParam {
    /// Decode a destination parameter token for the given shader family
    pub fn from_token(raw: u32, kind: ShaderKind) -> Result<DstParam> {
        let file = RegFile::from_tag(token::register_tag(raw), kind)?;
        Ok(DstParam {
            file,
            index: token::register_index(raw),
            write_mask: token::write_mask(raw),
            shift: token::result_shift(raw),
            saturate: token::has_saturate(raw),
            token: raw,
        })
    }

    /// Assembly-style name of the destination register
    pub fn register_name(&self) -> String {
        token::register_name(self.file, self.index)
    }
}

/// Decoded source parameter of an instruction
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, CopyGetters)]
#[get_copy = "pub"]
pub struct SrcParam {
    /// Register file read from
    file: RegFile,
    /// Register index inside the file
    index: u32,
    /// Component routing applied before the read
    swizzle: Swizzle,
    /// Value modifier applied before the read
    modifier: SrcModifier,
    /// Relative addressing through `a0.x` (vertex shaders only)
    relative: bool,
    /// Components actually consumed, derived from the destination write
    /// mask and the swizzle once the instruction is fully decoded
    component_read_mask: ComponentMask,
    /// The raw parameter token
    token: u32,
}

impl SrcParam {
    /// Decode a source parameter token for the given shader family
    pub fn from_token(raw: u32, kind: ShaderKind) -> Result<SrcParam> {
        let file = RegFile::from_tag(token::register_tag(raw), kind)?;
        Ok(SrcParam {
            file,
            index: token::register_index(raw),
            swizzle: token::swizzle_of(raw),
            modifier: token::source_modifier(raw)?,
            relative: token::is_relative(raw),
            component_read_mask: ComponentMask::empty(),
            token: raw,
        })
    }

    /// Assembly-style name of the source register
    pub fn register_name(&self) -> String {
        token::register_name(self.file, self.index)
    }
}

/// One decoded instruction of the token stream.
///
/// Instructions are stored in the append-only program-order list owned by
/// the validator; the previous instruction (needed for co-issue checks) is
/// reached by index, so no back-pointers are held.
#[derive(Debug, Getters, CopyGetters)]
pub struct Instruction {
    #[get_copy = "pub"]
    /// Resolved opcode, `None` when the value is outside the known set
    opcode: Option<Opcode>,
    #[get_copy = "pub"]
    /// Raw opcode value as encoded
    raw_opcode: u16,
    #[get = "pub"]
    /// Destination parameters in decode order
    dst_params: Vec<DstParam>,
    #[get = "pub"]
    /// Source parameters in decode order
    src_params: Vec<SrcParam>,
    #[get_copy = "pub"]
    /// Whether this instruction is the trailing half of a co-issued pair
    co_issue: bool,
    #[get_copy = "pub"]
    /// Execution cycle; co-issued neighbors share it
    cycle_num: u32,
    #[get_copy = "pub"]
    /// 1-based position used in diagnostics; counts decoded instructions only
    spew_index: u32,
    #[get = "pub"]
    /// Source location inherited from the most recent assembler comment
    location: SrcLocation,
    #[get_copy = "pub"]
    /// Source tokens consumed beyond [`MAX_PARAMS`] to keep the stream aligned
    extra_src_tokens: u32,
}

impl Instruction {
    pub(crate) fn new(
        raw_opcode: u16,
        co_issue: bool,
        cycle_num: u32,
        spew_index: u32,
        location: SrcLocation,
    ) -> Instruction {
        Instruction {
            opcode: Opcode::from_u16(raw_opcode),
            raw_opcode,
            dst_params: Vec::new(),
            src_params: Vec::new(),
            co_issue,
            cycle_num,
            spew_index,
            location,
            extra_src_tokens: 0,
        }
    }

    pub(crate) fn push_dst(&mut self, param: DstParam) {
        self.dst_params.push(param);
    }

    pub(crate) fn push_src(&mut self, param: SrcParam) {
        self.src_params.push(param);
    }

    pub(crate) fn count_extra_src(&mut self) {
        self.extra_src_tokens += 1;
    }

    /// The destination parameter, when the instruction has one
    pub fn dst(&self) -> Option<&DstParam> {
        self.dst_params.first()
    }

    /// Derive the per-source component read masks.
    ///
    /// Each source reads the components selected, through its swizzle, by
    /// the destination write mask. DP3 never reads alpha. The only
    /// instruction with sources but no destination is XFC: its first six
    /// sources default to reading RGB and the seventh reads blue alone.
    pub(crate) fn derive_read_masks(&mut self) {
        let dst_mask = self.dst_params.first().map(|d| d.write_mask);
        let is_dp3 = self.opcode == Some(Opcode::Dp3);
        for (i, src) in self.src_params.iter_mut().enumerate() {
            let mut enabled = match dst_mask {
                Some(mask) => mask,
                None => {
                    if i <= 5 {
                        ComponentMask::RGB
                    } else {
                        ComponentMask::BLUE
                    }
                }
            };
            if is_dp3 {
                enabled.remove(ComponentMask::ALPHA);
            }
            src.component_read_mask = src.swizzle.route(enabled);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::{make_dst, make_src};

    fn inst(op: Opcode) -> Instruction {
        Instruction::new(op as u16, false, 1, 1, SrcLocation::default())
    }

    fn dst(mask: ComponentMask) -> DstParam {
        DstParam::from_token(
            make_dst(RegFile::Temp, 0, mask, 0, false),
            ShaderKind::Pixel,
        )
        .unwrap()
    }

    fn src(swizzle: Swizzle) -> SrcParam {
        SrcParam::from_token(
            make_src(RegFile::Temp, 1, swizzle, SrcModifier::None, false),
            ShaderKind::Pixel,
        )
        .unwrap()
    }

    #[test]
    fn read_mask_follows_write_mask() {
        let mut mov = inst(Opcode::Mov);
        mov.push_dst(dst(ComponentMask::RED | ComponentMask::GREEN));
        mov.push_src(src(Swizzle::IDENTITY));
        mov.derive_read_masks();
        assert_eq!(
            mov.src_params()[0].component_read_mask(),
            ComponentMask::RED | ComponentMask::GREEN
        );
    }

    #[test]
    fn read_mask_routes_through_swizzle() {
        let mut mov = inst(Opcode::Mov);
        mov.push_dst(dst(ComponentMask::ALL));
        mov.push_src(src(Swizzle::ALPHA_REPLICATE));
        mov.derive_read_masks();
        assert_eq!(
            mov.src_params()[0].component_read_mask(),
            ComponentMask::ALPHA
        );
    }

    #[test]
    fn dp3_never_reads_alpha() {
        let mut dp3 = inst(Opcode::Dp3);
        dp3.push_dst(dst(ComponentMask::ALL));
        dp3.push_src(src(Swizzle::IDENTITY));
        dp3.push_src(src(Swizzle::IDENTITY));
        dp3.derive_read_masks();
        for param in dp3.src_params() {
            assert_eq!(param.component_read_mask(), ComponentMask::RGB);
        }
    }

    #[test]
    fn dp3_alpha_only_write_reads_nothing() {
        let mut dp3 = inst(Opcode::Dp3);
        dp3.push_dst(dst(ComponentMask::ALPHA));
        dp3.push_src(src(Swizzle::IDENTITY));
        dp3.derive_read_masks();
        assert_eq!(
            dp3.src_params()[0].component_read_mask(),
            ComponentMask::empty()
        );
    }

    #[test]
    fn xfc_sources_default_masks() {
        let mut xfc = inst(Opcode::Xfc);
        for _ in 0..7 {
            xfc.push_src(src(Swizzle::IDENTITY));
        }
        xfc.derive_read_masks();
        for param in &xfc.src_params()[..6] {
            assert_eq!(param.component_read_mask(), ComponentMask::RGB);
        }
        assert_eq!(
            xfc.src_params()[6].component_read_mask(),
            ComponentMask::BLUE
        );
    }

    #[test]
    fn dst_param_from_token() {
        let param = DstParam::from_token(
            make_dst(RegFile::Texture, 2, ComponentMask::ALL, 0, false),
            ShaderKind::Pixel,
        )
        .unwrap();
        assert_eq!(param.file(), RegFile::Texture);
        assert_eq!(param.index(), 2);
        assert_eq!(param.write_mask(), ComponentMask::ALL);
        assert_eq!(param.register_name(), "t2");
    }

    #[test]
    fn src_param_from_token() {
        let param = SrcParam::from_token(
            make_src(RegFile::Const, 3, Swizzle::IDENTITY, SrcModifier::Negate, true),
            ShaderKind::Vertex,
        )
        .unwrap();
        assert_eq!(param.file(), RegFile::Const);
        assert_eq!(param.index(), 3);
        assert_eq!(param.modifier(), SrcModifier::Negate);
        assert!(param.relative());
        assert_eq!(param.component_read_mask(), ComponentMask::empty());
    }
}
