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

use crate::ShaderVersion;

/// Device limits applied while validating pixel shaders
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct PixelCaps {
    /// Highest pixel shader version the device accepts
    pub max_version: ShaderVersion,
    /// Maximum number of texture addressing instructions
    pub max_tex_ops: u32,
    /// Maximum number of arithmetic (blending) instructions
    pub max_blend_ops: u32,
    /// Number of temporary registers (`r#`)
    pub max_temps: u32,
    /// Number of constant registers (`c#`)
    pub max_consts: u32,
    /// Number of color input registers (`v#`)
    pub max_inputs: u32,
    /// Number of texture stages, bounding the `t#` registers
    pub max_texture_stages: u32,
    /// Distinct constant registers one cycle may read
    pub const_reads_per_cycle: u32,
}

/// Device limits applied while validating vertex shaders
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct VertexCaps {
    /// Highest vertex shader version the device accepts
    pub max_version: ShaderVersion,
    /// Maximum number of instructions in the shader body
    pub max_instructions: u32,
    /// Number of temporary registers (`r#`)
    pub max_temps: u32,
    /// Number of constant registers (`c#`)
    pub max_consts: u32,
    /// Number of input registers (`v#`)
    pub max_inputs: u32,
    /// Number of texture coordinate outputs (`oT#`)
    pub max_texcoord_outputs: u32,
    /// Number of attribute (color) outputs (`oD#`)
    pub max_attr_outputs: u32,
    /// Distinct constant registers one instruction may read
    pub const_reads_per_instruction: u32,
    /// Distinct input registers one instruction may read
    pub input_reads_per_instruction: u32,
}

/// Capability snapshot borrowed read-only for the lifetime of a validation.
///
/// Defaults mirror the D3D8 reference device (ps 1.3, vs 1.1).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ShaderCaps {
    /// Pixel shader limits
    pub pixel: PixelCaps,
    /// Vertex shader limits
    pub vertex: VertexCaps,
}

impl Default for PixelCaps {
    fn default() -> PixelCaps {
        PixelCaps {
            max_version: ShaderVersion::new(1, 3),
            max_tex_ops: 4,
            max_blend_ops: 8,
            max_temps: 2,
            max_consts: 8,
            max_inputs: 2,
            max_texture_stages: 4,
            const_reads_per_cycle: 2,
        }
    }
}

impl Default for VertexCaps {
    fn default() -> VertexCaps {
        VertexCaps {
            max_version: ShaderVersion::new(1, 1),
            max_instructions: 128,
            max_temps: 12,
            max_consts: 96,
            max_inputs: 16,
            max_texcoord_outputs: 4,
            max_attr_outputs: 2,
            const_reads_per_instruction: 1,
            input_reads_per_instruction: 1,
        }
    }
}

impl Default for ShaderCaps {
    fn default() -> ShaderCaps {
        ShaderCaps {
            pixel: PixelCaps::default(),
            vertex: VertexCaps::default(),
        }
    }
}
