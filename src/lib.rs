//! Validate Direct3D 8 pixel and vertex shader bytecode.
//!
//! The validator decodes the 32-bit token stream, applies the per-family
//! rule tables and reports a verdict together with a diagnostic log bound
//! to the source locations the assembler embedded in comment frames.
//!
//! ```
//! use d3d8_shader_validator::{dst, src, validate_pixel_shader};
//! use d3d8_shader_validator::{RegFile, ShaderBuilder, ShaderCaps};
//!
//! let code = ShaderBuilder::pixel(1, 1)
//!     .tex(0)
//!     .mov(dst(RegFile::Temp, 0), src(RegFile::Texture, 0))
//!     .end()
//!     .to_bytes();
//!
//! let validation = validate_pixel_shader(&code, &ShaderCaps::default(), 0);
//! assert!(validation.succeeded());
//! ```

use memmap::MmapOptions;
use std::fs::File;
use std::path::Path;

#[macro_use]
extern crate bitflags;

mod error;
pub use error::Error;

mod token;
pub use token::{
    register_name, ComponentMask, RegFile, ShaderKind, ShaderVersion, SrcModifier, Swizzle,
};

mod opcode;
pub use opcode::{Opcode, TexmRole};

mod caps;
pub use caps::{PixelCaps, ShaderCaps, VertexCaps};

mod inst;
pub use inst::{DstParam, Instruction, SrcLocation, SrcParam, MAX_PARAMS};

mod regfile;
pub use regfile::{RegisterBank, RegisterFileState};

mod diag;
pub use diag::{Category, Diagnostic, DiagnosticSink};

mod validator;
pub use validator::{OpCounts, Validation};

mod ps;
pub use ps::validate_pixel_shader;

mod vs;
pub use vs::validate_vertex_shader;

mod builder;
pub use builder::{dst, src, DeclBuilder, Dst, ShaderBuilder, Src};

pub type Result<T> = std::result::Result<T, error::Error>;

/// One-shot validation of compiled shader files
pub struct ShaderReader;

impl ShaderReader {
    /// Validates the pixel shader bytecode at the given path
    pub fn pixel_from_path<P: AsRef<Path>>(path: P, caps: &ShaderCaps) -> Result<Validation> {
        let source = unsafe { MmapOptions::new().map(&File::open(path.as_ref())?)? };
        Ok(validate_pixel_shader(&source, caps, 0))
    }

    /// Validates pixel shader bytecode held in memory
    pub fn pixel_from_vec<B: AsRef<[u8]>>(source: B, caps: &ShaderCaps) -> Validation {
        validate_pixel_shader(source.as_ref(), caps, 0)
    }

    /// Validates the vertex shader bytecode at the given path against its
    /// declaration
    pub fn vertex_from_path<P: AsRef<Path>>(
        path: P,
        decl: &[u8],
        caps: &ShaderCaps,
    ) -> Result<Validation> {
        let source = unsafe { MmapOptions::new().map(&File::open(path.as_ref())?)? };
        Ok(validate_vertex_shader(Some(&source), decl, caps, 0))
    }

    /// Validates vertex shader bytecode held in memory against its
    /// declaration
    pub fn vertex_from_vec<B: AsRef<[u8]>>(
        source: B,
        decl: &[u8],
        caps: &ShaderCaps,
    ) -> Validation {
        validate_vertex_shader(Some(source.as_ref()), decl, caps, 0)
    }
}
