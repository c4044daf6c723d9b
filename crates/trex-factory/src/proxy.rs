//! Stable-address wrapper around suite contract state.

/// The state of one suite contract plus the authority its behavior is
/// resolved through. The address and the state survive upgrades; only
/// the authority's current version changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy<S> {
    authority: trex_core::Address,
    state: S,
}

impl<S> Proxy<S> {
    pub fn new(authority: trex_core::Address, state: S) -> Self {
        Self { authority, state }
    }

    pub fn authority(&self) -> trex_core::Address {
        self.authority
    }

    pub fn set_authority(&mut self, authority: trex_core::Address) {
        self.authority = authority;
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }
}
