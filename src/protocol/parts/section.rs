//! Package sections: the server-side slots that bind a dynamic SQL
//! statement to an executable form.
//!
//! Sections come from a pool owned by the connection. A `Section` is
//! immutable after allocation except for its lazily cached PKGNAMCSN prefix,
//! which is computed on first use and then reused by every execution that
//! references the same section.

use crate::{Db2Error, Db2Result};
use std::cell::OnceCell;
use std::rc::Rc;

const PACKAGE_NAME: &str = "SYSSH200";
const MAX_SECTIONS: u16 = 384;

/// One allocated package section.
#[derive(Debug)]
pub struct Section {
    package_name: String,
    section_number: u16,
    cursor_name: String,
    holdable: bool,
    // True for one-shot dynamic slots, which go back to the pool as soon as
    // their command completes. Prepared statements keep their section until
    // the statement is closed.
    generated: bool,
    // Encoded package name, collection and consistency token; filled on
    // first PKGNAMCSN emission.
    pkgnamc_bytes: OnceCell<Vec<u8>>,
}

impl Section {
    fn new(section_number: u16, holdable: bool, generated: bool) -> Self {
        Self {
            package_name: PACKAGE_NAME.to_string(),
            section_number,
            cursor_name: format!("SQL_CURSH200C{section_number}"),
            holdable,
            generated,
            pkgnamc_bytes: OnceCell::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn section_number(&self) -> u16 {
        self.section_number
    }

    pub fn cursor_name(&self) -> &str {
        &self.cursor_name
    }

    pub fn is_holdable(&self) -> bool {
        self.holdable
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn cached_pkgnamc_bytes(&self) -> Option<&[u8]> {
        self.pkgnamc_bytes.get().map(Vec::as_slice)
    }

    pub fn cache_pkgnamc_bytes(&self, bytes: Vec<u8>) {
        // First writer wins; later executions reuse the cached prefix.
        let _ = self.pkgnamc_bytes.set(bytes);
    }
}

/// Allocates section numbers for dynamic statements. Owned by the
/// connection; freed numbers are reused before fresh ones.
#[derive(Debug)]
pub struct SectionPool {
    next_unused: u16,
    free: Vec<u16>,
}

impl Default for SectionPool {
    fn default() -> Self {
        Self {
            next_unused: 1,
            free: Vec::new(),
        }
    }
}

impl SectionPool {
    /// Allocates a one-shot slot for a dynamic statement; it is returned to
    /// the pool when the owning command completes.
    pub fn take_dynamic_section(&mut self) -> Db2Result<Rc<Section>> {
        self.take(true)
    }

    /// Allocates a slot bound to a prepared statement for its lifetime.
    pub fn take_prepared_section(&mut self) -> Db2Result<Rc<Section>> {
        self.take(false)
    }

    fn take(&mut self, generated: bool) -> Db2Result<Rc<Section>> {
        let number = if let Some(number) = self.free.pop() {
            number
        } else if self.next_unused <= MAX_SECTIONS {
            let number = self.next_unused;
            self.next_unused += 1;
            number
        } else {
            return Err(Db2Error::Usage("section pool exhausted"));
        };
        trace!("allocated section {number}");
        Ok(Rc::new(Section::new(number, false, generated)))
    }

    /// Returns a section number to the pool once the owning statement is
    /// closed.
    pub fn release(&mut self, section: &Section) {
        trace!("released section {}", section.section_number);
        self.free.push(section.section_number);
    }
}
