use haven_config::{WalletKind, WalletProviderConfig};

/// Wallet kinds in order of preference.
const PREFERENCE: [WalletKind; 2] = [WalletKind::MetaMask, WalletKind::Okx];

/// Picks the wallet to talk to: the first MetaMask, else the first OKX wallet, else whatever
/// comes first.
pub fn resolve_provider(candidates: &[WalletProviderConfig]) -> Option<&WalletProviderConfig> {
    PREFERENCE
        .iter()
        .find_map(|kind| candidates.iter().find(|candidate| candidate.kind == *kind))
        .or_else(|| candidates.first())
}
