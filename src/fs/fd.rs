//! Per-process file descriptor table.
//!
//! A descriptor is an index into this table; the entry names either a
//! standard-stream console placeholder or a slot in the system-wide open
//! file table. Descriptor 0 is the table's reserved sentinel and doubles
//! as the stdin placeholder: lookups of 0 answer `Console` without
//! touching a slot, so the first real descriptor handed out is 3.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::table::{SlotTable, TableItem};

/// Maximum open descriptors per process.
pub const NOFILE: usize = 16;

/// What a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdEntry {
    /// Standard-stream placeholder routed to the console collaborator.
    Console,
    /// Index into the system-wide open file table.
    File(usize),
}

impl TableItem for FdEntry {
    type Key = usize;

    fn key(&self) -> usize {
        match self {
            FdEntry::Console => 0,
            FdEntry::File(index) => *index,
        }
    }
}

/// Descriptor table owned by one process.
#[derive(Debug)]
pub struct FdTable {
    table: SlotTable<FdEntry>,
}

impl FdTable {
    /// Fresh table with stdout and stderr wired to the console.
    pub fn new() -> Result<Self> {
        let mut table = SlotTable::new(NOFILE);
        table.set(1, FdEntry::Console)?;
        table.set(2, FdEntry::Console)?;
        Ok(Self { table })
    }

    /// Install an entry for a system file table slot, returning the new
    /// descriptor.
    pub fn add(&mut self, index: usize) -> Result<usize> {
        self.table
            .add(FdEntry::File(index))
            .ok_or(Error::DescriptorTableFull)
    }

    /// Resolve a descriptor. Descriptor 0 always answers the stdin
    /// placeholder.
    pub fn get(&self, fd: usize) -> Option<FdEntry> {
        if fd == 0 {
            return Some(FdEntry::Console);
        }
        self.table.get(fd).copied()
    }

    /// Free a descriptor, returning its former entry. Descriptor 0 cannot
    /// be closed.
    pub fn remove(&mut self, fd: usize) -> Result<FdEntry> {
        self.table.remove(fd).map_err(|_| Error::BadDescriptor)
    }

    /// Place an entry at an explicit descriptor (dup2 target). The
    /// descriptor must be free and within range.
    pub fn set_at(&mut self, fd: usize, entry: FdEntry) -> Result<()> {
        if fd >= NOFILE + 1 {
            return Err(Error::BadDescriptor);
        }
        self.table.set(fd, entry).map_err(|_| Error::BadDescriptor)
    }

    /// Copy for a forked child: same descriptors, same entries.
    pub fn duplicate(&self) -> Self {
        Self {
            table: self.table.duplicate(),
        }
    }

    /// System file table indices referenced by this table, one per
    /// descriptor, duplicates included.
    pub fn file_indices(&self) -> Vec<usize> {
        self.table
            .iter()
            .filter_map(|(_, entry)| match entry {
                FdEntry::File(index) => Some(*index),
                FdEntry::Console => None,
            })
            .collect()
    }

    /// Open descriptor count, the reserved stdin slot excluded.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_streams_are_preinstalled() {
        let t = FdTable::new().unwrap();
        assert_eq!(t.get(0), Some(FdEntry::Console));
        assert_eq!(t.get(1), Some(FdEntry::Console));
        assert_eq!(t.get(2), Some(FdEntry::Console));
        assert_eq!(t.get(3), None);
    }

    #[test]
    fn first_descriptor_after_the_standard_streams_is_three() {
        let mut t = FdTable::new().unwrap();
        assert_eq!(t.add(42).unwrap(), 3);
        assert_eq!(t.get(3), Some(FdEntry::File(42)));
    }

    #[test]
    fn stdin_placeholder_cannot_be_removed() {
        let mut t = FdTable::new().unwrap();
        assert_eq!(t.remove(0), Err(Error::BadDescriptor));
        assert_eq!(t.get(0), Some(FdEntry::Console));
    }

    #[test]
    fn fills_to_nofile_then_reports_emfile() {
        let mut t = FdTable::new().unwrap();
        let mut n = 2; // stdout and stderr
        while n < NOFILE {
            t.add(n).unwrap();
            n += 1;
        }
        assert_eq!(t.add(99), Err(Error::DescriptorTableFull));
    }

    #[test]
    fn duplicate_shares_entries_not_storage() {
        let mut t = FdTable::new().unwrap();
        let fd = t.add(7).unwrap();
        let mut copy = t.duplicate();
        assert_eq!(copy.get(fd), Some(FdEntry::File(7)));
        copy.remove(fd).unwrap();
        assert_eq!(t.get(fd), Some(FdEntry::File(7)));
    }

    #[test]
    fn file_indices_lists_real_files_only() {
        let mut t = FdTable::new().unwrap();
        t.add(4).unwrap();
        t.add(9).unwrap();
        let mut indices = t.file_indices();
        indices.sort_unstable();
        assert_eq!(indices, alloc::vec![4, 9]);
    }
}
