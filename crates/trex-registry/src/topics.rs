//! Claim Topics Registry: the topics every holder of a token must carry.

use serde::{Deserialize, Serialize};
use trex_core::{Address, ClaimTopic, Event, EventBuffer, InvariantViolation, Ownable, TrexError};

pub const MAX_CLAIM_TOPICS: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTopicsRegistry {
    ownable: Ownable,
    topics: Vec<ClaimTopic>,
}

impl ClaimTopicsRegistry {
    pub fn new(ownable: Ownable) -> Self {
        Self {
            ownable,
            topics: Vec::new(),
        }
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    pub fn get_claim_topics(&self) -> &[ClaimTopic] {
        &self.topics
    }

    pub fn add_claim_topic(&mut self, caller: &Address, topic: ClaimTopic, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if self.topics.len() >= MAX_CLAIM_TOPICS {
            return Err(InvariantViolation::LimitExceeded {
                what: "required claim topics".into(),
                max: MAX_CLAIM_TOPICS,
            }
            .into());
        }
        if self.topics.contains(&topic) {
            return Err(InvariantViolation::Duplicate {
                what: format!("claim topic {topic}"),
            }
            .into());
        }
        self.topics.push(topic);
        events.emit(self.ownable.contract(), Event::ClaimTopicAdded { topic });
        Ok(())
    }

    pub fn remove_claim_topic(&mut self, caller: &Address, topic: ClaimTopic, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        let pos = self
            .topics
            .iter()
            .position(|t| t == &topic)
            .ok_or_else(|| InvariantViolation::NotFound {
                what: format!("claim topic {topic}"),
            })?;
        self.topics.remove(pos);
        events.emit(self.ownable.contract(), Event::ClaimTopicRemoved { topic });
        Ok(())
    }
}
