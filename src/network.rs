//! Network definitions and known token deployments.
//!
//! This module defines the supported Cronos networks and provides the
//! statically known USDC.e deployment per network. Selecting the wrong asset
//! contract is a correctness bug with financial consequences, so the mapping
//! is exhaustive and anything that is not an explicit mainnet selection
//! resolves to the testnet deployment.

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// USDC.e deployment on Cronos testnet (chain ID 338).
const USDCE_CRONOS_TESTNET: Address = address!("0xc01efAaF7C5C61bEbFAeb358E1161b537b8bC0e0");
/// USDC.e deployment on Cronos mainnet (chain ID 25).
const USDCE_CRONOS: Address = address!("0xf951eC28187D9E5Ca673Da8FE6757E6f0Be5F77C");

/// Supported networks for the payment gate.
///
/// Used to differentiate between testnet and mainnet environments for the
/// x402 protocol.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Cronos testnet (chain ID 338).
    #[serde(rename = "cronos-testnet")]
    CronosTestnet,
    /// Cronos mainnet (chain ID 25).
    #[serde(rename = "cronos")]
    Cronos,
}

impl Network {
    /// EIP-155 chain ID of the network.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::CronosTestnet => 338,
            Network::Cronos => 25,
        }
    }

    /// The USDC.e token contract on this network.
    pub fn usdc_asset(&self) -> Address {
        match self {
            Network::CronosTestnet => USDCE_CRONOS_TESTNET,
            Network::Cronos => USDCE_CRONOS,
        }
    }

    /// Resolves an environment-level network selection.
    ///
    /// Only the exact value `"cronos"` selects mainnet; every other value,
    /// including an empty or unset one, falls back to testnet.
    pub fn from_selection(value: &str) -> Self {
        match value {
            "cronos" => Network::Cronos,
            _ => Network::CronosTestnet,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::CronosTestnet => write!(f, "cronos-testnet"),
            Network::Cronos => write!(f, "cronos"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network: {0}")]
pub struct UnknownNetworkError(String);

impl FromStr for Network {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cronos-testnet" => Ok(Network::CronosTestnet),
            "cronos" => Ok(Network::Cronos),
            other => Err(UnknownNetworkError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_selection_is_exact() {
        assert_eq!(Network::from_selection("cronos"), Network::Cronos);
    }

    #[test]
    fn anything_else_selects_testnet() {
        for value in ["cronos-testnet", "", "CRONOS", "mainnet", "garbage"] {
            assert_eq!(Network::from_selection(value), Network::CronosTestnet);
        }
    }

    #[test]
    fn chain_ids_are_eip155() {
        assert_eq!(Network::CronosTestnet.chain_id(), 338);
        assert_eq!(Network::Cronos.chain_id(), 25);
    }

    #[test]
    fn usdc_asset_per_network() {
        assert_eq!(Network::CronosTestnet.usdc_asset(), USDCE_CRONOS_TESTNET);
        assert_eq!(Network::Cronos.usdc_asset(), USDCE_CRONOS);
    }

    #[test]
    fn serde_uses_kebab_case_names() {
        assert_eq!(
            serde_json::to_string(&Network::CronosTestnet).unwrap(),
            "\"cronos-testnet\""
        );
        assert_eq!(serde_json::to_string(&Network::Cronos).unwrap(), "\"cronos\"");
        let network: Network = serde_json::from_str("\"cronos\"").unwrap();
        assert_eq!(network, Network::Cronos);
    }
}
