//! Organization fetcher with a bounded `(chain, address)` cache.

use alloy_primitives::Address;
use futures_util::future::try_join_all;
use futures_util::try_join;
use powers_crypto::AbiError;
use powers_ledger::{powers, LedgerClient};
use powers_types::{ChainId, Law, LawId, Organization, RoleId};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::GovernanceError;

/// Organizations kept by [`OrganizationRegistry::new`].
pub const DEFAULT_CAPACITY: usize = 256;

type OrgKey = (ChainId, Address);

/// FIFO-bounded map; the first-fetched organization is evicted first.
#[derive(Default)]
struct Organizations {
    map: HashMap<OrgKey, Organization>,
    order: VecDeque<OrgKey>,
}

impl Organizations {
    fn insert(&mut self, key: OrgKey, org: Organization, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.map.insert(key, org).is_some() {
            return;
        }
        if self.order.len() >= capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
        self.order.push_back(key);
    }

    fn remove(&mut self, key: &OrgKey) -> Option<Organization> {
        let org = self.map.remove(key)?;
        self.order.retain(|tracked| tracked != key);
        Some(org)
    }
}

pub struct OrganizationRegistry<L: ?Sized> {
    ledger: Arc<L>,
    organizations: Mutex<Organizations>,
    capacity: usize,
}

impl<L: LedgerClient + ?Sized> OrganizationRegistry<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self::with_capacity(ledger, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ledger: Arc<L>, capacity: usize) -> Self {
        Self {
            ledger,
            organizations: Mutex::new(Organizations::default()),
            capacity,
        }
    }

    fn organizations(&self) -> MutexGuard<'_, Organizations> {
        self.organizations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cached(&self, address: Address, chain: ChainId) -> Option<Organization> {
        self.organizations().map.get(&(chain, address)).cloned()
    }

    /// Number of organizations currently cached.
    pub fn len(&self) -> usize {
        self.organizations().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached organization, fetching it on first use.
    pub async fn get(
        &self,
        address: Address,
        chain: ChainId,
    ) -> Result<Organization, GovernanceError> {
        match self.cached(address, chain) {
            Some(org) => Ok(org),
            None => self.fetch(address, chain).await,
        }
    }

    /// Look up one adopted law.
    pub async fn law(
        &self,
        address: Address,
        chain: ChainId,
        law: LawId,
    ) -> Result<Law, GovernanceError> {
        self.get(address, chain)
            .await?
            .law(law)
            .cloned()
            .ok_or(GovernanceError::LawNotFound(law))
    }

    pub fn invalidate(&self, address: Address, chain: ChainId) -> Option<Organization> {
        self.organizations().remove(&(chain, address))
    }

    /// Read the organization from the ledger and replace the cached copy.
    ///
    /// Header fields and every adopted law are read concurrently. Law slots
    /// that were never adopted (zero address) are skipped; revoked laws are
    /// kept with `active == false`. Labels are read for every role some law
    /// is restricted to; unlabelled roles are left out of `roles`.
    pub async fn fetch(
        &self,
        address: Address,
        chain: ChainId,
    ) -> Result<Organization, GovernanceError> {
        let ledger = &*self.ledger;
        let (name_call, treasury_call, counter_call) = (
            powers::name(address),
            powers::treasury(address),
            powers::law_counter(address),
        );
        let (name, treasury, counter) = try_join!(
            ledger.call_view(&name_call, chain),
            ledger.call_view(&treasury_call, chain),
            ledger.call_view(&counter_call, chain),
        )?;
        let name = powers::single(&name)?.as_str()?.to_string();
        let treasury = powers::single(&treasury)?.as_address()?;
        let counter = powers::single(&counter)?.as_u64()?;
        let ids: Vec<LawId> = (1..counter)
            .filter_map(|i| u16::try_from(i).ok())
            .map(LawId::new)
            .collect();

        let adopted_calls: Vec<_> = ids
            .iter()
            .map(|id| powers::adopted_law(address, *id))
            .collect();
        let adopted =
            try_join_all(adopted_calls.iter().map(|call| ledger.call_view(call, chain))).await?;
        let mut slots = Vec::new();
        for (id, values) in ids.into_iter().zip(adopted) {
            let (law_address, active) = match values.as_slice() {
                [law_address, active] => (law_address.as_address()?, active.as_bool()?),
                other => {
                    return Err(AbiError::ArityMismatch {
                        expected: 2,
                        got: other.len(),
                    }
                    .into())
                }
            };
            if law_address != Address::ZERO {
                slots.push((id, law_address, active));
            }
        }

        let condition_calls: Vec<_> = slots
            .iter()
            .map(|(id, _, _)| powers::conditions(address, *id))
            .collect();
        let param_calls: Vec<_> = slots
            .iter()
            .map(|(id, _, _)| powers::input_params(address, *id))
            .collect();
        let description_calls: Vec<_> = slots
            .iter()
            .map(|(id, _, _)| powers::name_description(address, *id))
            .collect();
        let (conditions, params, descriptions) = try_join!(
            try_join_all(condition_calls.iter().map(|call| ledger.call_view(call, chain))),
            try_join_all(param_calls.iter().map(|call| ledger.call_view(call, chain))),
            try_join_all(description_calls.iter().map(|call| ledger.call_view(call, chain))),
        )?;

        let mut org = Organization::new(address, chain, name);
        org.treasury = treasury;
        let laws = slots.into_iter().zip(conditions).zip(params).zip(descriptions);
        for ((((index, law_address, active), conditions), params), description) in laws {
            org.insert_law(Law {
                index,
                address: law_address,
                conditions: powers::decode_conditions(&conditions)?,
                input_params: powers::decode_input_params(&params)?,
                description: powers::single(&description)?.as_str()?.to_string(),
                active,
            });
        }

        let roles: Vec<RoleId> = org
            .laws
            .values()
            .map(|law| law.conditions.allowed_role)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let label_calls: Vec<_> = roles
            .iter()
            .map(|role| powers::role_label(address, *role))
            .collect();
        let labels =
            try_join_all(label_calls.iter().map(|call| ledger.call_view(call, chain))).await?;
        for (role, values) in roles.into_iter().zip(labels) {
            let label = powers::single(&values)?.as_str()?;
            if !label.is_empty() {
                org.roles.insert(role, label.to_string());
            }
        }

        tracing::info!(
            organization = %address,
            chain = %chain,
            name = %org.name,
            laws = org.laws.len(),
            "organization fetched"
        );
        self.organizations()
            .insert((chain, address), org.clone(), self.capacity);
        Ok(org)
    }
}
