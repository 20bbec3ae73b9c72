//! Name lookups that remember what they did not find.
//!
//! [`Archive::entry`] and [`Archive::entry_mut`] return a [`Lookup`] that is
//! either found (an index into the archive) or not found (the normalized
//! name that was asked for), so creating a missing entry needs no second
//! search. The same type serves shared and exclusive borrows of the archive.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};

use super::archive::Archive;
use super::entry::{Entry, normalize_name};

/// What [`Lookup::create`] does when the entry already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreateMode {
    /// Keep the existing entry.
    #[default]
    IfNotExists,
    /// Replace the existing entry with a new, empty one at the same index.
    Overwrite,
    /// Fail with [`Error::EntryExists`].
    FailIfExists,
}

/// What [`Lookup::remove`] does when the entry does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoveMode {
    /// Nothing.
    #[default]
    IfExists,
    /// Fail with [`Error::EntryNotFound`].
    FailIfNotExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Found(usize),
    NotFound(String),
}

/// An entry looked up by name, found or not.
pub struct Lookup<A> {
    archive: A,
    slot: Slot,
}

/// Read-only lookup.
pub type MaybeEntry<'a> = Lookup<&'a Archive>;

/// Lookup that can create, rename and remove.
pub type MaybeEntryMut<'a> = Lookup<&'a mut Archive>;

impl<A: Deref<Target = Archive>> Lookup<A> {
    pub(crate) fn new(archive: A, name: &str) -> Self {
        let slot = match archive.find(name) {
            Some(index) => Slot::Found(index),
            None => Slot::NotFound(normalize_name(name).unwrap_or_else(|_| name.to_string())),
        };
        Self { archive, slot }
    }

    pub fn exists(&self) -> bool {
        matches!(self.slot, Slot::Found(_))
    }

    pub fn index(&self) -> Option<usize> {
        match self.slot {
            Slot::Found(index) => Some(index),
            Slot::NotFound(_) => None,
        }
    }

    /// Full name of the found entry, or the name that was looked up.
    pub fn name(&self) -> &str {
        match &self.slot {
            Slot::Found(index) => self.archive[*index].full_name(),
            Slot::NotFound(name) => name,
        }
    }

    pub fn get(&self) -> Result<&Entry> {
        match &self.slot {
            Slot::Found(index) => Ok(&self.archive[*index]),
            Slot::NotFound(name) => Err(Error::EntryNotFound(name.clone())),
        }
    }
}

impl<A: DerefMut<Target = Archive>> Lookup<A> {
    pub fn get_mut(&mut self) -> Result<&mut Entry> {
        match &self.slot {
            Slot::Found(index) => Ok(&mut self.archive[*index]),
            Slot::NotFound(name) => Err(Error::EntryNotFound(name.clone())),
        }
    }

    /// Rename the found entry's last path segment, or change the name a
    /// later [`create`](Self::create) will use.
    ///
    /// A found entry cannot take the name of another entry
    /// ([`Error::EntryExists`]). A not-found lookup whose new name exists
    /// becomes found.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        match self.slot {
            Slot::Found(index) => {
                let new_name = self.archive[index].sibling_name(name);
                self.archive.rename_entry(index, &new_name)
            }
            Slot::NotFound(_) => {
                let normalized = normalize_name(name)?;
                self.slot = match self.archive.find(&normalized) {
                    Some(index) => Slot::Found(index),
                    None => Slot::NotFound(normalized),
                };
                Ok(())
            }
        }
    }

    pub fn create(&mut self, mode: CreateMode) -> Result<&mut Self> {
        match mode {
            CreateMode::IfNotExists if self.exists() => {}
            CreateMode::FailIfExists if self.exists() => {
                return Err(Error::EntryExists(self.name().to_string()));
            }
            _ => self.create_forcefully()?,
        }
        Ok(self)
    }

    fn create_forcefully(&mut self) -> Result<()> {
        let entry = Entry::new(self.name(), self.archive.registry().clone())?;
        match self.index() {
            Some(index) => self.archive.replace_entry(index, entry),
            None => {
                self.archive.push_entry(entry);
                self.slot = Slot::Found(self.archive.len() - 1);
            }
        }
        Ok(())
    }

    /// Remove the found entry. Afterwards the lookup is "not found" and
    /// remembers the removed entry's name.
    pub fn remove(&mut self, mode: RemoveMode) -> Result<&mut Self> {
        match self.index() {
            Some(index) => {
                let removed = self.archive.remove_entry(index);
                self.slot = Slot::NotFound(removed.full_name().to_string());
            }
            None if mode == RemoveMode::FailIfNotExists => {
                return Err(Error::EntryNotFound(self.name().to_string()));
            }
            None => {}
        }
        Ok(self)
    }
}

impl<'a> Lookup<&'a Archive> {
    pub fn into_entry(self) -> Result<&'a Entry> {
        let Lookup { archive, slot } = self;
        match slot {
            Slot::Found(index) => Ok(&archive[index]),
            Slot::NotFound(name) => Err(Error::EntryNotFound(name)),
        }
    }
}

impl<'a> Lookup<&'a mut Archive> {
    pub fn into_entry(self) -> Result<&'a mut Entry> {
        let Lookup { archive, slot } = self;
        match slot {
            Slot::Found(index) => Ok(&mut archive[index]),
            Slot::NotFound(name) => Err(Error::EntryNotFound(name)),
        }
    }
}

impl<A: Deref<Target = Archive>> fmt::Debug for Lookup<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup").field("slot", &self.slot).finish()
    }
}
