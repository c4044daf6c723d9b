//! Trusted Issuers Registry: which identities may vouch for which topics.
//!
//! Keeps a reverse index topic → issuers so eligibility checks look up the
//! candidate issuers of a topic directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trex_core::{Address, ClaimTopic, Event, EventBuffer, InvariantViolation, Ownable, TrexError};

pub const MAX_TRUSTED_ISSUERS: usize = 50;
pub const MAX_TOPICS_PER_ISSUER: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedIssuersRegistry {
    ownable: Ownable,
    issuers: Vec<Address>,
    topics_of: BTreeMap<Address, Vec<ClaimTopic>>,
    issuers_by_topic: BTreeMap<ClaimTopic, Vec<Address>>,
}

fn check_topics(topics: &[ClaimTopic]) -> Result<(), InvariantViolation> {
    if topics.is_empty() {
        return Err(InvariantViolation::InvalidInput(
            "trusted issuer needs at least one claim topic".into(),
        ));
    }
    if topics.len() > MAX_TOPICS_PER_ISSUER {
        return Err(InvariantViolation::LimitExceeded {
            what: "claim topics of one issuer".into(),
            max: MAX_TOPICS_PER_ISSUER,
        });
    }
    for (i, t) in topics.iter().enumerate() {
        if topics[..i].contains(t) {
            return Err(InvariantViolation::InvalidInput(format!("claim topic {t} listed twice")));
        }
    }
    Ok(())
}

impl TrustedIssuersRegistry {
    pub fn new(ownable: Ownable) -> Self {
        Self {
            ownable,
            issuers: Vec::new(),
            topics_of: BTreeMap::new(),
            issuers_by_topic: BTreeMap::new(),
        }
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    fn index(&mut self, issuer: Address, topics: &[ClaimTopic]) {
        for t in topics {
            self.issuers_by_topic.entry(*t).or_default().push(issuer);
        }
    }

    fn unindex(&mut self, issuer: &Address) {
        let Some(topics) = self.topics_of.get(issuer) else {
            return;
        };
        for t in topics {
            if let Some(list) = self.issuers_by_topic.get_mut(t) {
                list.retain(|i| i != issuer);
                if list.is_empty() {
                    self.issuers_by_topic.remove(t);
                }
            }
        }
    }

    pub fn add_trusted_issuer(
        &mut self,
        caller: &Address,
        issuer: Address,
        topics: Vec<ClaimTopic>,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if issuer.is_zero() {
            return Err(InvariantViolation::ZeroAddress("trusted issuer".into()).into());
        }
        if self.topics_of.contains_key(&issuer) {
            return Err(InvariantViolation::Duplicate {
                what: format!("trusted issuer {issuer}"),
            }
            .into());
        }
        check_topics(&topics)?;
        if self.issuers.len() >= MAX_TRUSTED_ISSUERS {
            return Err(InvariantViolation::LimitExceeded {
                what: "trusted issuers".into(),
                max: MAX_TRUSTED_ISSUERS,
            }
            .into());
        }
        self.issuers.push(issuer);
        self.index(issuer, &topics);
        self.topics_of.insert(issuer, topics.clone());
        events.emit(self.ownable.contract(), Event::TrustedIssuerAdded { issuer, topics });
        Ok(())
    }

    pub fn remove_trusted_issuer(&mut self, caller: &Address, issuer: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if !self.topics_of.contains_key(&issuer) {
            return Err(InvariantViolation::NotFound {
                what: format!("trusted issuer {issuer}"),
            }
            .into());
        }
        self.unindex(&issuer);
        self.topics_of.remove(&issuer);
        self.issuers.retain(|i| i != &issuer);
        events.emit(self.ownable.contract(), Event::TrustedIssuerRemoved { issuer });
        Ok(())
    }

    pub fn update_issuer_claim_topics(
        &mut self,
        caller: &Address,
        issuer: Address,
        topics: Vec<ClaimTopic>,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if !self.topics_of.contains_key(&issuer) {
            return Err(InvariantViolation::NotFound {
                what: format!("trusted issuer {issuer}"),
            }
            .into());
        }
        check_topics(&topics)?;
        self.unindex(&issuer);
        self.index(issuer, &topics);
        self.topics_of.insert(issuer, topics.clone());
        events.emit(
            self.ownable.contract(),
            Event::IssuerClaimTopicsUpdated { issuer, topics },
        );
        Ok(())
    }

    // ── queries ──────────────────────────────────────────────────────

    pub fn get_trusted_issuers(&self) -> &[Address] {
        &self.issuers
    }

    pub fn is_trusted_issuer(&self, issuer: &Address) -> bool {
        self.topics_of.contains_key(issuer)
    }

    pub fn get_trusted_issuer_claim_topics(&self, issuer: &Address) -> Option<&[ClaimTopic]> {
        self.topics_of.get(issuer).map(Vec::as_slice)
    }

    pub fn has_claim_topic(&self, issuer: &Address, topic: ClaimTopic) -> bool {
        self.topics_of.get(issuer).is_some_and(|t| t.contains(&topic))
    }

    pub fn get_trusted_issuers_for_claim_topic(&self, topic: ClaimTopic) -> &[Address] {
        self.issuers_by_topic.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }
}
