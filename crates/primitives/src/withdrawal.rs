use alloy_primitives::Address;
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// A validator withdrawal pushed into the block by the consensus layer.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Monotonically increasing identifier issued by the consensus layer.
    pub index: u64,
    /// Index of the validator associated with the withdrawal.
    pub validator_index: u64,
    /// Target address for the withdrawn funds.
    pub address: Address,
    /// Value of the withdrawal, in gwei.
    pub amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip_is_camel_case() {
        let withdrawal = Withdrawal {
            index: 5,
            validator_index: 9,
            address: Address::repeat_byte(0x42),
            amount: 1_000_000,
        };
        let json = serde_json::to_string(&withdrawal).unwrap();
        assert!(json.contains("validatorIndex"));
        assert_eq!(serde_json::from_str::<Withdrawal>(&json).unwrap(), withdrawal);
    }
}
