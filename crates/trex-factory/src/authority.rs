//! # Implementation Authority
//!
//! Maps versions to immutable implementation sets and names the current
//! one. Every proxy points at an authority, so moving the current version
//! upgrades every suite behind it at once.
//!
//! The reference authority is the only one that accepts new versions.
//! Authorities deployed per token by the IA factory start empty and copy
//! versions from the reference with [`ImplementationAuthority::fetch_version`].

use std::collections::BTreeMap;

use trex_core::{Address, Event, EventBuffer, InvariantViolation, Ownable, StateError, TrexError, Version};

use crate::implementation::ImplementationSet;

#[derive(Debug, Clone)]
pub struct ImplementationAuthority {
    ownable: Ownable,
    reference: bool,
    versions: BTreeMap<Version, ImplementationSet>,
    current: Option<Version>,
    trex_factory: Address,
    ia_factory: Address,
}

impl ImplementationAuthority {
    pub fn new(ownable: Ownable, reference: bool) -> Self {
        Self {
            ownable,
            reference,
            versions: BTreeMap::new(),
            current: None,
            trex_factory: Address::ZERO,
            ia_factory: Address::ZERO,
        }
    }

    pub fn address(&self) -> Address {
        self.ownable.contract()
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn trex_factory(&self) -> Address {
        self.trex_factory
    }

    pub fn ia_factory(&self) -> Address {
        self.ia_factory
    }

    pub fn get_current_version(&self) -> Option<Version> {
        self.current
    }

    pub fn get_contracts(&self, version: &Version) -> Option<&ImplementationSet> {
        self.versions.get(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.versions.keys()
    }

    /// The implementation set proxies resolve to right now.
    pub fn current_set(&self) -> Result<&ImplementationSet, StateError> {
        self.current
            .and_then(|v| self.versions.get(&v))
            .ok_or(StateError::NoCurrentVersion {
                authority: self.address(),
            })
    }

    fn only_reference(&self) -> Result<(), StateError> {
        if self.reference {
            Ok(())
        } else {
            Err(StateError::NotReferenceAuthority {
                authority: self.address(),
            })
        }
    }

    fn insert_version(&mut self, version: Version, set: ImplementationSet, events: &mut EventBuffer) -> Result<(), TrexError> {
        if self.versions.contains_key(&version) {
            return Err(InvariantViolation::VersionImmutable {
                version: version.to_string(),
            }
            .into());
        }
        set.validate(version)?;
        self.versions.insert(version, set);
        events.emit(self.address(), Event::TrexVersionAdded { version });
        Ok(())
    }

    // ── versions ─────────────────────────────────────────────────────

    pub fn add_trex_version(
        &mut self,
        caller: &Address,
        version: Version,
        set: ImplementationSet,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        self.only_reference()?;
        self.insert_version(version, set, events)?;
        tracing::info!(authority = %self.address(), %version, "implementation version added");
        Ok(())
    }

    pub fn use_trex_version(&mut self, caller: &Address, version: Version, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if !self.versions.contains_key(&version) {
            return Err(StateError::VersionNotFound {
                version: version.to_string(),
            }
            .into());
        }
        if self.current == Some(version) {
            return Err(StateError::VersionAlreadyCurrent {
                version: version.to_string(),
            }
            .into());
        }
        self.current = Some(version);
        events.emit(self.address(), Event::VersionUpdated { version });
        tracing::info!(authority = %self.address(), %version, "current version updated");
        Ok(())
    }

    pub fn add_and_use_trex_version(
        &mut self,
        caller: &Address,
        version: Version,
        set: ImplementationSet,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.add_trex_version(caller, version, set, events)?;
        self.use_trex_version(caller, version, events)
    }

    /// Copy `version` from the reference authority. Open to any caller.
    pub fn fetch_version(
        &mut self,
        reference: &ImplementationAuthority,
        version: Version,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        if self.reference {
            return Err(InvariantViolation::InvalidInput(
                "the reference authority cannot fetch versions".into(),
            )
            .into());
        }
        reference.only_reference()?;
        let set = reference.get_contracts(&version).cloned().ok_or(StateError::VersionNotFound {
            version: version.to_string(),
        })?;
        self.insert_version(version, set, events)
    }

    // ── wiring ───────────────────────────────────────────────────────

    pub fn set_trex_factory(&mut self, caller: &Address, factory: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        self.only_reference()?;
        if factory.is_zero() {
            return Err(InvariantViolation::ZeroAddress("trex factory".into()).into());
        }
        self.trex_factory = factory;
        events.emit(self.address(), Event::TrexFactorySet { factory });
        Ok(())
    }

    pub fn set_ia_factory(&mut self, caller: &Address, factory: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        self.only_reference()?;
        if factory.is_zero() {
            return Err(InvariantViolation::ZeroAddress("IA factory".into()).into());
        }
        self.ia_factory = factory;
        events.emit(self.address(), Event::IaFactorySet { factory });
        Ok(())
    }
}
