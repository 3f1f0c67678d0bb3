//! Deployed governance instances.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ChainId, Law, LawId, RoleId};

/// A governance instance as last fetched from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub address: Address,
    pub chain_id: ChainId,
    pub name: String,
    pub treasury: Address,
    /// Human-readable labels for known roles.
    #[serde(default)]
    pub roles: BTreeMap<RoleId, String>,
    /// Every adopted law, active or not, by index.
    #[serde(default)]
    pub laws: BTreeMap<LawId, Law>,
}

impl Organization {
    pub fn new(address: Address, chain_id: ChainId, name: impl Into<String>) -> Self {
        Self {
            address,
            chain_id,
            name: name.into(),
            treasury: Address::ZERO,
            roles: BTreeMap::new(),
            laws: BTreeMap::new(),
        }
    }

    pub fn law(&self, id: LawId) -> Option<&Law> {
        self.laws.get(&id)
    }

    pub fn active_laws(&self) -> impl Iterator<Item = &Law> {
        self.laws.values().filter(|law| law.active)
    }

    pub fn insert_law(&mut self, law: Law) {
        self.laws.insert(law.index, law);
    }

    pub fn role_label(&self, role: RoleId) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Conditions;

    fn law(index: u16, active: bool) -> Law {
        Law {
            index: LawId::new(index),
            address: Address::repeat_byte(index as u8),
            conditions: Conditions::open(RoleId::PUBLIC),
            input_params: Vec::new(),
            description: String::new(),
            active,
        }
    }

    #[test]
    fn active_laws_skips_revoked() {
        let mut org = Organization::new(Address::ZERO, ChainId::new(31337), "Test DAO");
        org.insert_law(law(1, true));
        org.insert_law(law(2, false));
        org.insert_law(law(3, true));
        let active: Vec<u16> = org.active_laws().map(|l| l.index.get()).collect();
        assert_eq!(active, vec![1, 3]);
        assert!(org.law(LawId::new(2)).is_some());
    }
}
