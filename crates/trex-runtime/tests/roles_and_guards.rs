//! # Roles, Identity Execution and Call Guards
//!
//! Managers forwarding capability-gated actions on behalf of identities,
//! identity execution requests, and the reentrancy and depth guards that
//! bound every cross-contract hop.

mod common;

use common::{addr, Fixture};
use trex_core::{Address, AuthorizationError, ClaimTopic, ErrorKind, Event, KeyHash, StateError, TrexError};
use trex_identity::{KeyPurpose, KeyType};
use trex_roles::{AgentAction, AgentCapability, OwnerAction, OwnerCapability};
use trex_runtime::{
    Call, IdentityCall, ManagerCall, OwnershipCall, Output, RuntimeConfig, TokenCall, TrexFactoryCall,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An agent manager for the fixture's token, registered as a token agent.
fn agent_manager(f: &mut Fixture) -> Address {
    let token = f.token();
    let manager = f.rt.deploy_agent_manager(f.owner, token).unwrap().output;
    f.rt.call(f.owner, token, OwnershipCall::AddAgent { agent: manager }.into())
        .unwrap();
    manager
}

fn grant(f: &mut Fixture, manager: Address, capability: AgentCapability, identity: Address) {
    f.rt.call(
        f.owner,
        manager,
        Call::AgentManager(ManagerCall::Grant {
            capability,
            identity,
            admin_identity: None,
        }),
    )
    .unwrap();
}

fn forward(
    f: &mut Fixture,
    manager: Address,
    wallet: Address,
    identity: Address,
    action: AgentAction,
) -> Result<(), TrexError> {
    f.rt.call(wallet, manager, Call::AgentManager(ManagerCall::Execute { identity, action }))
        .map(|_| ())
}

fn add_action_key(f: &mut Fixture, manager_wallet: Address, identity: Address, wallet: Address) {
    f.rt.call(
        manager_wallet,
        identity,
        IdentityCall::AddKey {
            key: KeyHash::of_address(&wallet),
            purpose: KeyPurpose::Action,
            key_type: KeyType::Ecdsa,
        }
        .into(),
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// Agent manager
// ---------------------------------------------------------------------------

#[test]
fn supply_modifier_mints_and_burns_through_the_manager() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::SupplyModifier, ops_id);

    forward(&mut f, manager, ops, ops_id, AgentAction::Mint { to: alice, amount: 50 }).unwrap();
    assert_eq!(f.balance(&alice), 50);
    forward(&mut f, manager, ops, ops_id, AgentAction::Burn { from: alice, amount: 50 }).unwrap();
    assert_eq!(f.balance(&alice), 0);
    assert_eq!(f.supply(), 0);

    // Minted tokens come from the manager acting as a token agent.
    let minted_by_manager = f
        .rt
        .events_by(&f.suite.token)
        .iter()
        .any(|r| r.event == Event::Transfer { from: Address::ZERO, to: alice, value: 50 });
    assert!(minted_by_manager);
    assert_eq!(f.rt.capability_history(&manager).len(), 1);
}

#[test]
fn actions_outside_the_granted_capability_are_rejected() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::SupplyModifier, ops_id);

    let err = forward(&mut f, manager, ops, ops_id, AgentAction::SetAddressFrozen { wallet: alice, freeze: true })
        .unwrap_err();
    assert!(matches!(
        err,
        TrexError::Authorization(AuthorizationError::MissingCapability { identity, .. }) if identity == ops_id
    ));
    assert!(!f.rt.world().token(&f.suite.token).unwrap().is_frozen(&alice));
}

#[test]
fn removing_the_action_key_ends_manager_access() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::SupplyModifier, ops_id);

    let bot = addr("ops-bot");
    add_action_key(&mut f, ops, ops_id, bot);
    forward(&mut f, manager, bot, ops_id, AgentAction::Mint { to: alice, amount: 5 }).unwrap();

    f.rt.call(
        ops,
        ops_id,
        IdentityCall::RemoveKey {
            key: KeyHash::of_address(&bot),
            purpose: KeyPurpose::Action,
        }
        .into(),
    )
    .unwrap();
    let err = forward(&mut f, manager, bot, ops_id, AgentAction::Mint { to: alice, amount: 5 }).unwrap_err();
    assert!(matches!(
        err,
        TrexError::Authorization(AuthorizationError::MissingKeyPurpose { identity, .. }) if identity == ops_id
    ));
    assert_eq!(f.balance(&alice), 5);
}

#[test]
fn revoked_capability_stops_forwarding() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::SupplyModifier, ops_id);
    f.rt.call(
        f.owner,
        manager,
        Call::AgentManager(ManagerCall::Revoke {
            capability: AgentCapability::SupplyModifier,
            identity: ops_id,
            admin_identity: None,
        }),
    )
    .unwrap();
    let err = forward(&mut f, manager, ops, ops_id, AgentAction::Mint { to: alice, amount: 1 }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(f.rt.capability_history(&manager).len(), 2);
}

#[test]
fn compliance_agent_grants_are_audited_without_forwarding_anything() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::ComplianceAgent, ops_id);
    assert!(f
        .rt
        .world()
        .agent_manager(&manager)
        .unwrap()
        .has_capability(AgentCapability::ComplianceAgent, &ops_id));

    let err = forward(&mut f, manager, ops, ops_id, AgentAction::Mint { to: alice, amount: 1 }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    f.rt.call(
        f.owner,
        manager,
        Call::AgentManager(ManagerCall::Revoke {
            capability: AgentCapability::ComplianceAgent,
            identity: ops_id,
            admin_identity: None,
        }),
    )
    .unwrap();
    let history = f.rt.capability_history(&manager);
    assert_eq!(history.len(), 2);
    assert!(matches!(
        &history[0].event,
        Event::CapabilityGranted { capability, identity, .. } if capability == "ComplianceAgent" && *identity == ops_id
    ));
    assert!(matches!(
        &history[1].event,
        Event::CapabilityRevoked { capability, identity, .. } if capability == "ComplianceAgent" && *identity == ops_id
    ));
}

#[test]
fn admin_identity_grants_on_behalf_of_the_owner() {
    let mut f = Fixture::new();
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    let (_, desk_id) = f.identity_for("desk");
    grant(&mut f, manager, AgentCapability::AgentAdmin, ops_id);

    f.rt.call(
        ops,
        manager,
        Call::AgentManager(ManagerCall::Grant {
            capability: AgentCapability::Freezer,
            identity: desk_id,
            admin_identity: Some(ops_id),
        }),
    )
    .unwrap();
    assert!(f
        .rt
        .world()
        .agent_manager(&manager)
        .unwrap()
        .has_capability(AgentCapability::Freezer, &desk_id));

    // Only the owner hands out the admin capability itself.
    let err = f
        .rt
        .call(
            ops,
            manager,
            Call::AgentManager(ManagerCall::Grant {
                capability: AgentCapability::AgentAdmin,
                identity: desk_id,
                admin_identity: Some(ops_id),
            }),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

// ---------------------------------------------------------------------------
// Owner manager
// ---------------------------------------------------------------------------

#[test]
fn owner_manager_adds_a_claim_topic_it_owns() {
    let mut f = Fixture::new();
    let (alice, _) = f.onboard("alice", 250);
    let token = f.token();
    let manager = f.rt.deploy_owner_manager(f.owner, token).unwrap().output;
    f.rt.call(
        f.owner,
        f.suite.claim_topics_registry,
        OwnershipCall::TransferOwnership { new_owner: manager }.into(),
    )
    .unwrap();
    let (ops, ops_id) = f.identity_for("ops");
    f.rt.call(
        f.owner,
        manager,
        Call::OwnerManager(ManagerCall::Grant {
            capability: OwnerCapability::ClaimRegistryManager,
            identity: ops_id,
            admin_identity: None,
        }),
    )
    .unwrap();

    f.rt.call(
        ops,
        manager,
        Call::OwnerManager(ManagerCall::Execute {
            identity: ops_id,
            action: OwnerAction::AddClaimTopic { topic: ClaimTopic(2) },
        }),
    )
    .unwrap();
    let topics = f
        .rt
        .world()
        .claim_topics_registry(&f.suite.claim_topics_registry)
        .unwrap()
        .get_claim_topics();
    assert!(topics.contains(&ClaimTopic(2)));
    // Alice has no claim for the new topic.
    assert!(!f.rt.is_verified(&token, &alice).unwrap());
}

// ---------------------------------------------------------------------------
// Identity execution
// ---------------------------------------------------------------------------

#[test]
fn self_execution_waits_for_a_management_approval() {
    let mut f = Fixture::new();
    let (alice, alice_id) = f.identity_for("alice");
    let bot = addr("alice-bot");
    add_action_key(&mut f, alice, alice_id, bot);

    let new_key = KeyHash::of_address(&addr("alice-laptop"));
    let request = Call::Identity(IdentityCall::AddKey {
        key: new_key,
        purpose: KeyPurpose::Claim,
        key_type: KeyType::Ecdsa,
    });
    let receipt = f
        .rt
        .call(
            bot,
            alice_id,
            IdentityCall::Execute {
                to: alice_id,
                value: 0,
                call: Box::new(request),
            }
            .into(),
        )
        .unwrap();
    let Output::ExecutionId(id) = receipt.output else {
        panic!("execute returns the request id");
    };
    let identity = f.rt.world().identity(&alice_id).unwrap();
    assert!(!identity.key_has_purpose(&new_key, KeyPurpose::Claim));

    // An ACTION key cannot approve a request aimed at the identity itself.
    let err = f
        .rt
        .call(bot, alice_id, IdentityCall::Approve { execution_id: id, approve: true }.into())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let receipt = f
        .rt
        .call(alice, alice_id, IdentityCall::Approve { execution_id: id, approve: true }.into())
        .unwrap();
    assert!(receipt.emitted(
        &alice_id,
        &Event::Executed {
            execution_id: id,
            to: alice_id,
            value: 0
        }
    ));
    let identity = f.rt.world().identity(&alice_id).unwrap();
    assert!(identity.key_has_purpose(&new_key, KeyPurpose::Claim));
    assert!(identity.get_execution(id).unwrap().executed);

    let err = f
        .rt
        .call(alice, alice_id, IdentityCall::Approve { execution_id: id, approve: true }.into())
        .unwrap_err();
    assert!(matches!(err, TrexError::State(StateError::AlreadyExecuted { .. })));
}

#[test]
fn failed_execution_is_recorded_without_failing_the_call() {
    let mut f = Fixture::new();
    let (alice, alice_id) = f.identity_for("alice");
    let (bob, _) = f.onboard("bob", 250);
    let token = f.token();

    // The identity holds no tokens, so the transfer it requests fails.
    let receipt = f
        .rt
        .call(
            alice,
            alice_id,
            IdentityCall::Execute {
                to: token,
                value: 0,
                call: Box::new(TokenCall::Transfer { to: bob, amount: 1 }.into()),
            }
            .into(),
        )
        .unwrap();
    let Output::ExecutionId(id) = receipt.output else {
        panic!("execute returns the request id");
    };
    assert!(receipt
        .events
        .iter()
        .any(|(emitter, e)| emitter == &alice_id && matches!(e, Event::ExecutionFailed { execution_id, .. } if *execution_id == id)));
    assert!(!receipt.events.iter().any(|(emitter, _)| emitter == &token));
    let execution = f.rt.world().identity(&alice_id).unwrap().get_execution(id).unwrap();
    assert!(execution.approved);
    assert!(!execution.executed);

    let err = f
        .rt
        .call(alice, alice_id, IdentityCall::Approve { execution_id: 99, approve: true }.into())
        .unwrap_err();
    assert!(matches!(err, TrexError::State(StateError::ExecutionNotFound { id: 99 })));
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

#[test]
fn call_depth_bound_stops_forwarding() {
    let config = RuntimeConfig {
        max_call_depth: 1,
        ..RuntimeConfig::default()
    };
    let mut f = Fixture::with(config, Vec::new());
    let (alice, _) = f.onboard("alice", 250);
    let manager = agent_manager(&mut f);
    let (ops, ops_id) = f.identity_for("ops");
    grant(&mut f, manager, AgentCapability::SupplyModifier, ops_id);

    let err = forward(&mut f, manager, ops, ops_id, AgentAction::Mint { to: alice, amount: 5 }).unwrap_err();
    assert!(matches!(err, TrexError::State(StateError::CallDepthExceeded { max: 1 })));
    assert_eq!(f.supply(), 0);

    // Direct calls stay within the bound.
    f.mint(alice, 5).unwrap();
}

#[test]
fn reentering_a_contract_on_the_stack_is_rejected() {
    let mut f = Fixture::new();
    let factory = f.d.trex_factory;
    let err = f
        .rt
        .call(
            f.d.admin,
            factory,
            Call::TrexFactory(TrexFactoryCall::RecoverContractOwnership {
                contract: factory,
                new_owner: addr("new-admin"),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, TrexError::State(StateError::Reentrancy { address }) if address == factory));
    assert_eq!(f.rt.world().trex_factory(&factory).unwrap().ownable().owner(), f.d.admin);
}

#[test]
fn factory_recovery_acts_with_the_factory_as_caller() {
    let mut f = Fixture::new();
    // The suite was handed to its owner, so the factory no longer owns it.
    let err = f
        .rt
        .call(
            f.d.admin,
            f.d.trex_factory,
            Call::TrexFactory(TrexFactoryCall::RecoverContractOwnership {
                contract: f.suite.token,
                new_owner: addr("new-owner"),
            }),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TrexError::Authorization(AuthorizationError::NotOwner { caller, .. }) if caller == f.d.trex_factory
    ));
}
