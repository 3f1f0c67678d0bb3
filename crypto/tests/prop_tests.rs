use proptest::prelude::*;

use alloy_primitives::U256;
use powers_crypto::hash_action;
use powers_types::{CallData, LawId};

fn call_data_strategy() -> impl Strategy<Value = CallData> {
    (0usize..4)
        .prop_flat_map(|words| prop::collection::vec(any::<u8>(), words * 32))
        .prop_map(|bytes| CallData::from_bytes(bytes).unwrap())
}

proptest! {
    /// Identical inputs always produce the identical id.
    #[test]
    fn hash_action_is_deterministic(
        law in 1u16..,
        data in call_data_strategy(),
        nonce in any::<u64>(),
    ) {
        let a = hash_action(LawId::new(law), &data, U256::from(nonce));
        let b = hash_action(LawId::new(law), &data.clone(), U256::from(nonce));
        prop_assert_eq!(a, b);
    }

    /// Changing the law id changes the id.
    #[test]
    fn law_id_changes_id(law in 1u16..u16::MAX, data in call_data_strategy(), nonce in any::<u64>()) {
        let a = hash_action(LawId::new(law), &data, U256::from(nonce));
        let b = hash_action(LawId::new(law + 1), &data, U256::from(nonce));
        prop_assert_ne!(a, b);
    }

    /// Changing the nonce changes the id.
    #[test]
    fn nonce_changes_id(law in 1u16.., data in call_data_strategy(), nonce in 0u64..u64::MAX) {
        let a = hash_action(LawId::new(law), &data, U256::from(nonce));
        let b = hash_action(LawId::new(law), &data, U256::from(nonce + 1));
        prop_assert_ne!(a, b);
    }

    /// Flipping any calldata byte changes the id.
    #[test]
    fn calldata_changes_id(
        law in 1u16..,
        bytes in prop::collection::vec(any::<u8>(), 32..=32),
        index in 0usize..32,
        nonce in any::<u64>(),
    ) {
        let original = CallData::from_bytes(bytes.clone()).unwrap();
        let mut flipped_bytes = bytes;
        flipped_bytes[index] ^= 0xff;
        let flipped = CallData::from_bytes(flipped_bytes).unwrap();
        prop_assert_ne!(
            hash_action(LawId::new(law), &original, U256::from(nonce)),
            hash_action(LawId::new(law), &flipped, U256::from(nonce))
        );
    }
}
