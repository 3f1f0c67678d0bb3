//! Nullable ledger: scripted organization state, recorded traffic.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use powers_crypto::{keccak256, AbiValue};
use powers_ledger::powers;
use powers_ledger::{
    ContractCall, LedgerClient, LedgerError, Receipt, Transaction, TxHandle, ViewCall, VoteData,
};
use powers_types::{ActionId, ActionState, BlockNumber, ChainId, Conditions, LawId, RoleId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::LedgerEvent;

type ActionKey = (Address, ActionId);

#[derive(Clone)]
struct AdoptedLaw {
    address: Address,
    active: bool,
    conditions: Conditions,
    input_params: Vec<String>,
    description: String,
}

struct PendingTx {
    label: String,
    contract_address: Option<Address>,
    reverts: bool,
    effect: Option<ContractCall>,
}

#[derive(Default)]
struct State {
    block: BlockNumber,
    action_codes: HashMap<ActionKey, u8>,
    vote_data: HashMap<ActionKey, VoteData>,
    votes: HashSet<(Address, ActionId, Address)>,
    fulfillments: HashMap<(Address, LawId), BlockNumber>,
    permissions: HashSet<(Address, Address, LawId)>,
    names: HashMap<Address, String>,
    treasuries: HashMap<Address, Address>,
    laws: HashMap<(Address, LawId), AdoptedLaw>,
    role_labels: HashMap<(Address, RoleId), String>,

    failing_views: HashSet<String>,
    failing_submits: HashSet<String>,
    reverting: HashSet<String>,
    addressless: HashSet<String>,
    fail_multicall: bool,
    view_delays: HashMap<String, VecDeque<Duration>>,

    pending: HashMap<B256, PendingTx>,
    tx_counter: u64,
    owners: HashMap<Address, Address>,
    constituted: HashMap<Address, Vec<Address>>,
    events: Vec<LedgerEvent>,
}

/// An in-memory ledger for tests.
///
/// Thread-safe so it can be shared through an `Arc` with spawned tasks.
/// Each confirmed transaction or applied batch mines one block.
pub struct NullLedger {
    state: Mutex<State>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Start at a given block height.
    pub fn at_block(block: BlockNumber) -> Self {
        let ledger = Self::new();
        ledger.set_block(block);
        ledger
    }

    // ── Scripting ──────────────────────────────────────────────────────

    pub fn set_block(&self, block: BlockNumber) {
        self.state.lock().unwrap().block = block;
    }

    pub fn set_action_state(&self, org: Address, id: ActionId, state: ActionState) {
        self.set_action_code(org, id, state.code());
    }

    /// Store a raw lifecycle code, including codes outside the known range.
    pub fn set_action_code(&self, org: Address, id: ActionId, code: u8) {
        self.state.lock().unwrap().action_codes.insert((org, id), code);
    }

    pub fn set_vote_end(&self, org: Address, id: ActionId, vote_end: BlockNumber) {
        self.state
            .lock()
            .unwrap()
            .vote_data
            .entry((org, id))
            .or_default()
            .vote_end = vote_end;
    }

    pub fn record_vote(&self, org: Address, id: ActionId, voter: Address) {
        self.state.lock().unwrap().votes.insert((org, id, voter));
    }

    pub fn set_latest_fulfillment(&self, org: Address, law: LawId, block: BlockNumber) {
        self.state
            .lock()
            .unwrap()
            .fulfillments
            .insert((org, law), block);
    }

    pub fn grant(&self, org: Address, account: Address, law: LawId) {
        self.state
            .lock()
            .unwrap()
            .permissions
            .insert((org, account, law));
    }

    pub fn set_organization(&self, org: Address, name: &str, treasury: Address) {
        let mut state = self.state.lock().unwrap();
        state.names.insert(org, name.to_string());
        state.treasuries.insert(org, treasury);
    }

    pub fn adopt_law(&self, org: Address, law: LawId, address: Address, conditions: Conditions) {
        self.state.lock().unwrap().laws.insert(
            (org, law),
            AdoptedLaw {
                address,
                active: true,
                conditions,
                input_params: Vec::new(),
                description: String::new(),
            },
        );
    }

    /// Declared input types and description of an adopted law.
    pub fn describe_law(&self, org: Address, law: LawId, input_params: &[&str], description: &str) {
        if let Some(adopted) = self.state.lock().unwrap().laws.get_mut(&(org, law)) {
            adopted.input_params = input_params.iter().map(|p| p.to_string()).collect();
            adopted.description = description.to_string();
        }
    }

    pub fn label_role(&self, org: Address, role: RoleId, label: &str) {
        self.state
            .lock()
            .unwrap()
            .role_labels
            .insert((org, role), label.to_string());
    }

    pub fn revoke_law(&self, org: Address, law: LawId) {
        if let Some(adopted) = self.state.lock().unwrap().laws.get_mut(&(org, law)) {
            adopted.active = false;
        }
    }

    // ── Failure injection ──────────────────────────────────────────────

    /// Reads of `method` fail with a transport error.
    pub fn fail_view(&self, method: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_views
            .insert(method.to_string());
    }

    /// Submitting the deploy or call labelled `label` fails with a transport error.
    pub fn fail_submit(&self, label: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_submits
            .insert(label.to_string());
    }

    /// The transaction labelled `label` is mined but reverts.
    pub fn revert_on_confirm(&self, label: &str) {
        self.state.lock().unwrap().reverting.insert(label.to_string());
    }

    /// The deploy named `label` confirms without a contract address.
    pub fn omit_contract_address(&self, label: &str) {
        self.state
            .lock()
            .unwrap()
            .addressless
            .insert(label.to_string());
    }

    /// Every batch reverts as a whole.
    pub fn fail_multicall(&self) {
        self.state.lock().unwrap().fail_multicall = true;
    }

    /// Delay the next read of `method`. Delays queue up per method.
    pub fn delay_next_view(&self, method: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .view_delays
            .entry(method.to_string())
            .or_default()
            .push_back(delay);
    }

    // ── Inspection ─────────────────────────────────────────────────────

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Methods read so far, in call order.
    pub fn views(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LedgerEvent::View(method) => Some(method),
                _ => None,
            })
            .collect()
    }

    pub fn view_count(&self, method: &str) -> usize {
        self.views().iter().filter(|m| m.as_str() == method).count()
    }

    /// Writes only, in order.
    pub fn writes(&self) -> Vec<LedgerEvent> {
        self.events().into_iter().filter(LedgerEvent::is_write).collect()
    }

    pub fn owner_of(&self, contract: Address) -> Option<Address> {
        self.state.lock().unwrap().owners.get(&contract).copied()
    }

    pub fn constituted_laws(&self, org: Address) -> Option<Vec<Address>> {
        self.state.lock().unwrap().constituted.get(&org).cloned()
    }

    pub fn block(&self) -> BlockNumber {
        self.state.lock().unwrap().block
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    // ── Internals ──────────────────────────────────────────────────────

    async fn observe_view(&self, method: &str) -> Result<(), LedgerError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.events.push(LedgerEvent::View(method.to_string()));
            if state.failing_views.contains(method) {
                return Err(LedgerError::Transport(format!("{method}: connection reset")));
            }
            state
                .view_delays
                .get_mut(method)
                .and_then(VecDeque::pop_front)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn arg(call: &ViewCall, index: usize) -> Result<&AbiValue, LedgerError> {
    call.args
        .get(index)
        .ok_or_else(|| LedgerError::Other(format!("{}: missing argument {index}", call.method())))
}

fn action_arg(call: &ViewCall) -> Result<ActionId, LedgerError> {
    Ok(ActionId::new(arg(call, 0)?.as_uint()?))
}

fn law_arg(call: &ViewCall, index: usize) -> Result<LawId, LedgerError> {
    let raw = arg(call, index)?.as_u64()?;
    u16::try_from(raw)
        .map(LawId::new)
        .map_err(|_| LedgerError::Other(format!("law id {raw} out of range")))
}

fn uint(value: u64) -> AbiValue {
    AbiValue::Uint(U256::from(value))
}

fn apply_effect(state: &mut State, call: &ContractCall) {
    match call.signature.as_str() {
        powers::CONSTITUTE => {
            if let Some(AbiValue::Array(items)) = call.args.first() {
                let laws = items.iter().filter_map(|v| v.as_address().ok()).collect();
                state.constituted.insert(call.to, laws);
            }
        }
        powers::TRANSFER_OWNERSHIP => {
            if let Some(Ok(owner)) = call.args.first().map(AbiValue::as_address) {
                state.owners.insert(call.to, owner);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn call_view(
        &self,
        call: &ViewCall,
        _chain: ChainId,
    ) -> Result<Vec<AbiValue>, LedgerError> {
        self.observe_view(call.method()).await?;
        let org = call.to;
        let state = self.state.lock().unwrap();
        match call.signature.as_str() {
            powers::GET_ACTION_STATE => {
                let id = action_arg(call)?;
                let code = state.action_codes.get(&(org, id)).copied().unwrap_or(0);
                Ok(vec![uint(code as u64)])
            }
            powers::GET_ACTION_VOTE_DATA => {
                let id = action_arg(call)?;
                let data = state.vote_data.get(&(org, id)).cloned().unwrap_or_default();
                Ok(vec![
                    uint(data.vote_start),
                    uint(data.vote_duration),
                    uint(data.vote_end),
                    uint(data.against),
                    uint(data.for_votes),
                    uint(data.abstain),
                ])
            }
            powers::HAS_VOTED => {
                let id = action_arg(call)?;
                let voter = arg(call, 1)?.as_address()?;
                Ok(vec![AbiValue::Bool(state.votes.contains(&(org, id, voter)))])
            }
            powers::GET_LATEST_FULFILLMENT => {
                let law = law_arg(call, 0)?;
                let block = state.fulfillments.get(&(org, law)).copied().unwrap_or(0);
                Ok(vec![uint(block)])
            }
            powers::CAN_CALL_LAW => {
                let account = arg(call, 0)?.as_address()?;
                let law = law_arg(call, 1)?;
                Ok(vec![AbiValue::Bool(
                    state.permissions.contains(&(org, account, law)),
                )])
            }
            powers::LAW_COUNTER => {
                let count = state
                    .laws
                    .keys()
                    .filter(|(o, _)| *o == org)
                    .map(|(_, law)| law.get() as u64)
                    .max()
                    .map_or(1, |max| max + 1);
                Ok(vec![uint(count)])
            }
            powers::GET_ADOPTED_LAW => {
                let law = law_arg(call, 0)?;
                let adopted = state.laws.get(&(org, law));
                Ok(vec![
                    AbiValue::Address(adopted.map_or(Address::ZERO, |a| a.address)),
                    AbiValue::Bool(adopted.is_some_and(|a| a.active)),
                ])
            }
            powers::GET_CONDITIONS => {
                let law = law_arg(call, 0)?;
                let c = state
                    .laws
                    .get(&(org, law))
                    .map(|a| a.conditions.clone())
                    .ok_or_else(|| LedgerError::Reverted {
                        tx: format!("getConditions({})", law.get()),
                    })?;
                Ok(vec![
                    AbiValue::Uint(c.allowed_role.as_u256()),
                    uint(c.quorum as u64),
                    uint(c.succeed_at as u64),
                    uint(c.voting_period),
                    uint(c.throttle_execution),
                    uint(c.delay_execution),
                    uint(c.need_fulfilled.get() as u64),
                    uint(c.need_not_fulfilled.get() as u64),
                    uint(c.read_state_from.get() as u64),
                ])
            }
            powers::GET_INPUT_PARAMS => {
                let law = law_arg(call, 0)?;
                let params = state
                    .laws
                    .get(&(org, law))
                    .map(|a| a.input_params.join(","))
                    .unwrap_or_default();
                Ok(vec![AbiValue::String(params)])
            }
            powers::GET_NAME_DESCRIPTION => {
                let law = law_arg(call, 0)?;
                let description = state
                    .laws
                    .get(&(org, law))
                    .map(|a| a.description.clone())
                    .unwrap_or_default();
                Ok(vec![AbiValue::String(description)])
            }
            powers::GET_ROLE_LABEL => {
                let role = RoleId::new(arg(call, 0)?.as_uint()?);
                let label = state.role_labels.get(&(org, role)).cloned().unwrap_or_default();
                Ok(vec![AbiValue::String(label)])
            }
            powers::NAME => Ok(vec![AbiValue::String(
                state.names.get(&org).cloned().unwrap_or_default(),
            )]),
            powers::TREASURY => Ok(vec![AbiValue::Address(
                state.treasuries.get(&org).copied().unwrap_or(Address::ZERO),
            )]),
            other => Err(LedgerError::Unsupported(format!("view {other}"))),
        }
    }

    async fn submit_transaction(
        &self,
        tx: &Transaction,
        chain: ChainId,
    ) -> Result<TxHandle, LedgerError> {
        let label = tx.label().to_string();
        let mut state = self.state.lock().unwrap();
        state.events.push(LedgerEvent::Submitted(label.clone()));
        if state.failing_submits.contains(&label) {
            return Err(LedgerError::Transport(format!("{label}: submission dropped")));
        }
        state.tx_counter += 1;
        let counter = state.tx_counter;
        let hash = B256::from(keccak256(&counter.to_be_bytes()));
        let (contract_address, effect) = match tx {
            Transaction::Deploy(_) if state.addressless.contains(&label) => (None, None),
            Transaction::Deploy(_) => {
                let mut raw = [0u8; 20];
                raw[0] = 0xc0;
                raw[12..].copy_from_slice(&counter.to_be_bytes());
                (Some(Address::from(raw)), None)
            }
            Transaction::Call(call) => (None, Some(call.clone())),
        };
        let reverts = state.reverting.contains(&label);
        state.pending.insert(
            hash,
            PendingTx {
                label,
                contract_address,
                reverts,
                effect,
            },
        );
        Ok(TxHandle {
            hash,
            chain_id: chain,
        })
    }

    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        _confirmations: u64,
    ) -> Result<Receipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let pending = state
            .pending
            .remove(&handle.hash)
            .ok_or_else(|| LedgerError::Other(format!("unknown transaction {}", handle.hash)))?;
        state.block += 1;
        state.events.push(LedgerEvent::Confirmed(pending.label.clone()));
        if !pending.reverts {
            if let Some(address) = pending.contract_address {
                state.events.push(LedgerEvent::Deployed {
                    name: pending.label.clone(),
                    address,
                });
            }
            if let Some(call) = &pending.effect {
                apply_effect(&mut state, call);
            }
        }
        Ok(Receipt {
            tx_hash: handle.hash,
            block_number: state.block,
            success: !pending.reverts,
            contract_address: pending.contract_address.filter(|_| !pending.reverts),
        })
    }

    async fn multicall(
        &self,
        calls: &[ContractCall],
        _chain: ChainId,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_multicall {
            return Err(LedgerError::Reverted {
                tx: "multicall".to_string(),
            });
        }
        state.tx_counter += 1;
        state.block += 1;
        let hash = B256::from(keccak256(&state.tx_counter.to_be_bytes()));
        state.events.push(LedgerEvent::Multicall(
            calls.iter().map(|c| c.method().to_string()).collect(),
        ));
        for call in calls {
            apply_effect(&mut state, call);
        }
        let block = state.block;
        Ok(calls
            .iter()
            .map(|_| Receipt {
                tx_hash: hash,
                block_number: block,
                success: true,
                contract_address: None,
            })
            .collect())
    }

    async fn current_block_number(&self, _chain: ChainId) -> Result<BlockNumber, LedgerError> {
        self.observe_view("blockNumber").await?;
        Ok(self.state.lock().unwrap().block)
    }

    async fn can_act(
        &self,
        account: Address,
        organization: Address,
        law: LawId,
        _chain: ChainId,
    ) -> Result<bool, LedgerError> {
        self.observe_view("canAct").await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .permissions
            .contains(&(organization, account, law)))
    }
}
