use alloy::primitives::{address, Address};

/// Networks the fleet is allowed to deploy to. Config files name these in
/// their `domain` field; anything else is rejected during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Mainnet,
    Sepolia,
}

pub const SUPPORTED_DOMAINS: [Domain; 2] = [Domain::Mainnet, Domain::Sepolia];

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "sepolia" => Some(Self::Sepolia),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url_env: &'static str,
    pub automate: Address,
    pub multicall3: Address,
    pub block_time_ms: u64,
}

impl DomainConfig {
    pub fn get(domain: Domain) -> Self {
        match domain {
            Domain::Mainnet => Self::mainnet(),
            Domain::Sepolia => Self::sepolia(),
        }
    }

    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            name: "Ethereum Mainnet".to_string(),
            rpc_url_env: "MAINNET_RPC_URL",
            automate: address!("2A6C106ae13B558BB9E2Ec64Bd2f1f7FDff478f9"),
            multicall3: address!("cA11bde05977b3631167028862bE2a173976CA11"),
            block_time_ms: 12_000,
        }
    }

    pub fn sepolia() -> Self {
        Self {
            chain_id: 11_155_111,
            name: "Sepolia".to_string(),
            rpc_url_env: "SEPOLIA_RPC_URL",
            automate: address!("2A6C106ae13B558BB9E2Ec64Bd2f1f7FDff478f9"),
            multicall3: address!("cA11bde05977b3631167028862bE2a173976CA11"),
            block_time_ms: 12_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Domain, DomainConfig, SUPPORTED_DOMAINS};

    #[test]
    fn parse_accepts_supported_domains_case_insensitively() {
        assert_eq!(Domain::parse("mainnet"), Some(Domain::Mainnet));
        assert_eq!(Domain::parse(" Sepolia "), Some(Domain::Sepolia));
        assert_eq!(Domain::parse("moonbase"), None);
        assert_eq!(Domain::parse(""), None);
    }

    #[test]
    fn every_supported_domain_has_a_config() {
        for domain in SUPPORTED_DOMAINS {
            let cfg = DomainConfig::get(domain);
            assert!(cfg.chain_id > 0);
            assert!(!cfg.rpc_url_env.is_empty());
        }
    }
}
