//! Shared fixture for the runtime scenarios: a bootstrapped protocol, one
//! KYC issuer with an Ed25519 claim key, and a suite deployed through the
//! suite factory with a single token agent.

#![allow(dead_code)]

use trex_compliance::ModuleConfig;
use trex_core::{Address, ClaimTopic, SuiteRecord, TrexError};
use trex_factory::{ClaimDetails, TokenDetails};
use trex_identity::signing::SCHEME_ED25519;
use trex_identity::{Claim, ClaimSigner, KeyPurpose, KeyType};
use trex_runtime::{
    Call, Deployment, IdFactoryCall, IdentityCall, Output, Receipt, RegistryCall, Runtime, RuntimeConfig, TokenCall,
    TrexFactoryCall,
};

pub const KYC: ClaimTopic = ClaimTopic(1);
pub const KYC_DATA: &[u8] = b"kyc:passed";

pub fn addr(label: &str) -> Address {
    Address::from_label(label)
}

pub struct Fixture {
    pub rt: Runtime,
    pub d: Deployment,
    pub suite: SuiteRecord,
    /// Owner of every suite contract.
    pub owner: Address,
    /// Agent on the token and the identity registry.
    pub agent: Address,
    pub issuer: Address,
    pub signer: ClaimSigner,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(RuntimeConfig::default(), Vec::new())
    }

    pub fn with_modules(modules: Vec<ModuleConfig>) -> Self {
        Self::with(RuntimeConfig::default(), modules)
    }

    pub fn with(config: RuntimeConfig, modules: Vec<ModuleConfig>) -> Self {
        let admin = addr("admin");
        let (mut rt, d) = Runtime::bootstrap(config, admin).unwrap();

        let issuer_wallet = addr("issuer-ops");
        let issuer = create_identity(&mut rt, &d, issuer_wallet, "kyc-issuer");
        let signer = ClaimSigner::from_seed(&[7u8; 32]);
        rt.call(
            issuer_wallet,
            issuer,
            IdentityCall::AddKey {
                key: signer.key_hash(),
                purpose: KeyPurpose::Claim,
                key_type: KeyType::Ed25519,
            }
            .into(),
        )
        .unwrap();

        let owner = addr("owner");
        let agent = addr("agent");
        let receipt = rt
            .call(
                admin,
                d.trex_factory,
                Call::TrexFactory(TrexFactoryCall::DeployTrexSuite {
                    salt: "sec-1".into(),
                    token: details(owner, agent, modules),
                    claims: ClaimDetails {
                        claim_topics: vec![KYC],
                        issuers: vec![issuer],
                        issuer_claims: vec![vec![KYC]],
                    },
                }),
            )
            .unwrap();
        let Output::Suite(suite) = receipt.output else {
            panic!("suite deployment returns its record");
        };

        Self {
            rt,
            d,
            suite,
            owner,
            agent,
            issuer,
            signer,
        }
    }

    pub fn token(&self) -> Address {
        self.suite.token
    }

    /// Create an identity for a wallet labelled `label` without any claim.
    pub fn identity_for(&mut self, label: &str) -> (Address, Address) {
        let wallet = addr(label);
        let identity = create_identity(&mut self.rt, &self.d, wallet, label);
        (wallet, identity)
    }

    /// Have the issuer sign a KYC claim and the wallet store it.
    pub fn add_kyc_claim(&mut self, wallet: Address, identity: Address) {
        let signature = self.signer.sign_claim(&identity, KYC, KYC_DATA).unwrap();
        self.rt
            .call(
                wallet,
                identity,
                IdentityCall::AddClaim {
                    claim: Claim {
                        topic: KYC,
                        scheme: SCHEME_ED25519,
                        issuer: self.issuer,
                        signature,
                        data: KYC_DATA.to_vec(),
                        uri: String::new(),
                    },
                }
                .into(),
            )
            .unwrap();
    }

    /// Identity, KYC claim and registry entry for a new investor.
    pub fn onboard(&mut self, label: &str, country: u16) -> (Address, Address) {
        let (wallet, identity) = self.identity_for(label);
        self.add_kyc_claim(wallet, identity);
        self.rt
            .call(
                self.agent,
                self.suite.identity_registry,
                RegistryCall::RegisterIdentity {
                    wallet,
                    identity,
                    country,
                }
                .into(),
            )
            .unwrap();
        (wallet, identity)
    }

    pub fn token_call(&mut self, caller: Address, call: TokenCall) -> Result<Receipt, TrexError> {
        let token = self.token();
        self.rt.call(caller, token, call.into())
    }

    pub fn mint(&mut self, to: Address, amount: u128) -> Result<Receipt, TrexError> {
        self.token_call(self.agent, TokenCall::Mint { to, amount })
    }

    pub fn balance(&self, wallet: &Address) -> u128 {
        self.rt.balance_of(&self.suite.token, wallet)
    }

    pub fn supply(&self) -> u128 {
        self.rt.total_supply(&self.suite.token)
    }
}

pub fn details(owner: Address, agent: Address, modules: Vec<ModuleConfig>) -> TokenDetails {
    TokenDetails {
        owner,
        name: "Harbor Bond 2031".into(),
        symbol: "HB31".into(),
        decimals: 0,
        irs: Address::ZERO,
        onchain_id: Address::ZERO,
        ir_agents: vec![agent],
        token_agents: vec![agent],
        compliance_modules: modules,
        compliance_settings: vec![],
    }
}

/// Deploy an identity for `wallet` through the identity factory, as its
/// owner.
pub fn create_identity(rt: &mut Runtime, d: &Deployment, wallet: Address, salt: &str) -> Address {
    let receipt = rt
        .call(
            d.admin,
            d.id_factory,
            Call::IdFactory(IdFactoryCall::CreateIdentity {
                wallet,
                salt: salt.into(),
            }),
        )
        .unwrap();
    match receipt.output {
        Output::Address(identity) => identity,
        other => panic!("identity creation returned {other:?}"),
    }
}
