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

use crate::token::{ComponentMask, RegFile};
use indexmap::map::IndexMap;

/// Bookkeeping for one register of a file
#[derive(Debug, Clone)]
struct RegState {
    written: bool,
    last_write_cycle: Option<u32>,
    cycle_write_mask: ComponentMask,
    read_cycles: Vec<u32>,
}

impl Default for RegState {
    fn default() -> RegState {
        RegState {
            written: false,
            last_write_cycle: None,
            cycle_write_mask: ComponentMask::empty(),
            read_cycles: Vec::new(),
        }
    }
}

/// Initialization state and read/write history of one logical register
/// file.
///
/// The file does not enforce index bounds; the rule engine range-checks
/// indices against the capability snapshot before touching the file.
#[derive(Debug)]
pub struct RegisterFileState {
    file: RegFile,
    pre_initialized: bool,
    regs: IndexMap<u32, RegState>,
}

impl RegisterFileState {
    /// Empty file. `pre_initialized` marks files readable by convention
    /// before any instruction writes them (constants, pixel shader inputs).
    pub fn new(file: RegFile, pre_initialized: bool) -> RegisterFileState {
        RegisterFileState {
            file,
            pre_initialized,
            regs: IndexMap::new(),
        }
    }

    /// The register file this state tracks
    pub fn file(&self) -> RegFile {
        self.file
    }

    /// Record a write of `mask` components during `cycle`
    pub fn mark_written(&mut self, index: u32, cycle: u32, mask: ComponentMask) {
        let state = self.regs.entry(index).or_default();
        state.written = true;
        if state.last_write_cycle == Some(cycle) {
            state.cycle_write_mask |= mask;
        } else {
            state.last_write_cycle = Some(cycle);
            state.cycle_write_mask = mask;
        }
    }

    /// Record a read during `cycle`
    pub fn mark_read(&mut self, index: u32, cycle: u32) {
        self.regs.entry(index).or_default().read_cycles.push(cycle);
    }

    /// Mark a register initialized without a writing instruction, as a
    /// vertex declaration does for input registers
    pub fn mark_initialized(&mut self, index: u32) {
        self.regs.entry(index).or_default().written = true;
    }

    /// Whether reading the register is legal at this point
    pub fn is_initialized(&self, index: u32) -> bool {
        self.pre_initialized || self.regs.get(&index).map(|r| r.written).unwrap_or(false)
    }

    /// Whether an instruction wrote the register at any point
    pub fn was_written(&self, index: u32) -> bool {
        self.regs.get(&index).map(|r| r.written).unwrap_or(false)
    }

    /// Cycle of the most recent write, if any
    pub fn last_write(&self, index: u32) -> Option<u32> {
        self.regs.get(&index).and_then(|r| r.last_write_cycle)
    }

    /// Components the register accumulated from writes during `cycle`,
    /// when `cycle` is its most recent write cycle
    pub fn write_mask_in_cycle(&self, index: u32, cycle: u32) -> Option<ComponentMask> {
        self.regs.get(&index).and_then(|r| {
            if r.last_write_cycle == Some(cycle) {
                Some(r.cycle_write_mask)
            } else {
                None
            }
        })
    }

    /// Indices of registers whose most recent write happened during `cycle`
    pub fn writes_in_cycle(&self, cycle: u32) -> Vec<u32> {
        self.regs
            .iter()
            .filter(|(_, r)| r.last_write_cycle == Some(cycle))
            .map(|(index, _)| *index)
            .collect()
    }

    /// Cycles during which the register was read
    pub fn read_cycles(&self, index: u32) -> &[u32] {
        self.regs
            .get(&index)
            .map(|r| r.read_cycles.as_slice())
            .unwrap_or(&[])
    }
}

/// The register files allocated for one validation run, keyed by file tag
#[derive(Debug, Default)]
pub struct RegisterBank {
    files: IndexMap<RegFile, RegisterFileState>,
}

impl RegisterBank {
    pub fn new() -> RegisterBank {
        RegisterBank::default()
    }

    /// Allocate a file; called once per file by the family `init_validation`
    pub fn add_file(&mut self, file: RegFile, pre_initialized: bool) {
        self.files
            .insert(file, RegisterFileState::new(file, pre_initialized));
    }

    /// State of a file, if the family allocated it
    pub fn file(&self, file: RegFile) -> Option<&RegisterFileState> {
        self.files.get(&file)
    }

    /// Mutable state of a file, if the family allocated it
    pub fn file_mut(&mut self, file: RegFile) -> Option<&mut RegisterFileState> {
        self.files.get_mut(&file)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temporaries_start_uninitialized() {
        let mut file = RegisterFileState::new(RegFile::Temp, false);
        assert!(!file.is_initialized(0));
        file.mark_written(0, 1, ComponentMask::ALL);
        assert!(file.is_initialized(0));
        assert!(!file.is_initialized(1));
    }

    #[test]
    fn pre_initialized_files_are_always_readable() {
        let file = RegisterFileState::new(RegFile::Const, true);
        assert!(file.is_initialized(0));
        assert!(file.is_initialized(95));
        assert!(!file.was_written(0));
    }

    #[test]
    fn declaration_marking() {
        let mut file = RegisterFileState::new(RegFile::Input, false);
        file.mark_initialized(3);
        assert!(file.is_initialized(3));
        assert!(!file.is_initialized(0));
        assert_eq!(file.last_write(3), None);
    }

    #[test]
    fn write_history() {
        let mut file = RegisterFileState::new(RegFile::Temp, false);
        file.mark_written(0, 1, ComponentMask::RGB);
        file.mark_written(0, 3, ComponentMask::ALPHA);
        assert_eq!(file.last_write(0), Some(3));
        assert_eq!(
            file.write_mask_in_cycle(0, 3),
            Some(ComponentMask::ALPHA)
        );
        assert_eq!(file.write_mask_in_cycle(0, 1), None);
    }

    #[test]
    fn co_issued_writes_accumulate_in_one_cycle() {
        let mut file = RegisterFileState::new(RegFile::Temp, false);
        file.mark_written(0, 2, ComponentMask::RGB);
        file.mark_written(0, 2, ComponentMask::ALPHA);
        assert_eq!(file.write_mask_in_cycle(0, 2), Some(ComponentMask::ALL));
        assert_eq!(file.writes_in_cycle(2), vec![0]);
        assert_eq!(file.writes_in_cycle(1), Vec::<u32>::new());
    }

    #[test]
    fn read_history() {
        let mut file = RegisterFileState::new(RegFile::Temp, false);
        file.mark_read(1, 2);
        file.mark_read(1, 4);
        assert_eq!(file.read_cycles(1), &[2, 4]);
        assert_eq!(file.read_cycles(0), &[] as &[u32]);
    }

    #[test]
    fn bank_lookup() {
        let mut bank = RegisterBank::new();
        bank.add_file(RegFile::Temp, false);
        bank.add_file(RegFile::Const, true);
        assert!(bank.file(RegFile::Temp).is_some());
        assert!(bank.file(RegFile::Texture).is_none());
        bank.file_mut(RegFile::Temp)
            .unwrap()
            .mark_written(0, 1, ComponentMask::ALL);
        assert!(bank.file(RegFile::Temp).unwrap().is_initialized(0));
    }
}
