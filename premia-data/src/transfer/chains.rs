use std::collections::HashMap;

// Venue specific network names mapped to one canonical name. Names that already
// are canonical (e.g. "ETH", "SUI") need no entry.
const CHAIN_ALIASES: &[(&str, &str)] = &[
    ("ERC20", "ETH"),
    ("ETHEREUM", "ETH"),
    ("ARBITRUMONE", "ARBITRUM"),
    ("ARB", "ARBITRUM"),
    ("ARBONE", "ARBITRUM"),
    ("OP", "OPTIMISM"),
    ("BEP20", "BSC"),
    ("BNBSMARTCHAIN", "BSC"),
    ("BNBSMARTCHAIN(BEP20)", "BSC"),
    ("BINANCE", "BSC"),
    ("TRC20", "TRON"),
    ("TRX", "TRON"),
    ("SOLANA", "SOL"),
    ("APT", "APTOS"),
    ("MATIC", "POLYGON"),
    ("POLYGONPOS", "POLYGON"),
    ("TONCOIN", "TON"),
    ("BITCOIN", "BTC"),
    ("BITCOINCASH", "BCH"),
    ("ICON", "ICX"),
    ("AELF", "ELF"),
    ("WAXP", "WAX"),
    ("THETANETWORK", "THETA"),
    ("ONTOLOGY", "ONT"),
    ("RAVENCOIN", "RVN"),
    ("DECRED", "DCR"),
    ("ZCASH", "ZEC"),
    ("HORIZEN", "ZEN"),
    ("STACKS", "STX"),
    ("NERVOS", "CKB"),
    ("NERVOSNETWORK", "CKB"),
    ("ARWEAVE", "AR"),
    ("OASIS", "ROSE"),
    ("OASISNETWORK", "ROSE"),
    ("ASTR", "ASTAR"),
    ("MULTIVERSX", "EGLD"),
    ("ELROND", "EGLD"),
    ("ETHEREUMCLASSIC", "ETC"),
    ("NEON3", "NEO"),
    ("NEON3(N3)", "NEO"),
    ("NEOGAS", "GAS"),
    ("ZILLIQA", "ZIL"),
    ("ZKSERA", "ZKSYNC"),
    ("ZKSYNCERA", "ZKSYNC"),
    ("CHZ2", "CHZ"),
    ("CHILIZ", "CHZ"),
    ("CHILIZCHAIN", "CHZ"),
    ("BITTENSOR", "TAO"),
    ("STORY", "IP"),
    ("MONAD", "MON"),
    ("COSMOS", "ATOM"),
    ("AVALANCHE", "AVAX"),
    ("AVAXC", "AVAX"),
    ("AVALANCHEC-CHAIN", "AVAX"),
    ("CELESTIA", "TIA"),
    ("HEDERA", "HBAR"),
    ("CARDANO", "ADA"),
    ("RIPPLE", "XRP"),
    ("POLKADOT", "DOT"),
    ("KASPA", "KAS"),
    ("DOGECOIN", "DOGE"),
    ("LITECOIN", "LTC"),
    ("INITIA", "INIT"),
    ("MERLINCHAIN", "MERL"),
    ("MERLBTC", "MERL"),
    ("SHENTU", "CTK"),
    ("SOPHON", "SOPH"),
    ("STARKNET", "STRK"),
    ("MANTLE", "MNT"),
    ("KLAYTN", "KAIA"),
    ("KLAY", "KAIA"),
    ("FANTOM", "FTM"),
    ("ALGORAND", "ALGO"),
    ("CRONOS", "CRO"),
    ("INTERNETCOMPUTER", "ICP"),
    ("VECHAIN", "VET"),
    ("FILECOIN", "FIL"),
    ("BITCOINSV", "BSV"),
    ("DYDXCHAIN", "DYDX"),
    ("INJECTIVE", "INJ"),
    ("OSMOSIS", "OSMO"),
    ("AKASH", "AKT"),
    ("SECRET", "SCRT"),
    ("KUJIRA", "KUJI"),
    ("TERRA", "LUNA"),
    ("SOMMELIER", "SOMM"),
    ("A", "VAULTA"),
    ("ENJIN", "ENJ"),
    ("STELLAR", "XLM"),
    ("TEZOS", "XTZ"),
    ("XTZEVM", "XTZ"),
    ("ECASH", "XEC"),
    ("MEDIBLOC", "MED"),
    ("PROTON", "XPR"),
    ("SOLAR", "SXP"),
    ("BIFROST", "BFC"),
    ("METALL2", "MTL"),
    ("MTLETH", "MTL"),
];

/// Canonical chain name: upper case, whitespace removed, aliases resolved.
pub fn normalize_chain_name(name: &str) -> String {
    let compact = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    CHAIN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == compact)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(compact)
}

/// Pairs of `(sender name, receiver name)` that refer to the same chain, in
/// receiver order. Names keep the spelling each venue uses.
pub fn common_chain_pairs<'a>(sender: &[&'a str], receiver: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    let by_canonical = sender
        .iter()
        .filter_map(|name| {
            let canonical = normalize_chain_name(name);
            (!canonical.is_empty()).then_some((canonical, *name))
        })
        .collect::<HashMap<_, _>>();

    receiver
        .iter()
        .filter_map(|name| {
            let canonical = normalize_chain_name(name);
            by_canonical
                .get(&canonical)
                .map(|sender_name| (*sender_name, *name))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_chain_name() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let cases = vec![
            TestCase { input: "erc20", expected: "ETH" },
            TestCase { input: "Arbitrum One", expected: "ARBITRUM" },
            TestCase { input: "BNB Smart Chain", expected: "BSC" },
            TestCase { input: "TRC20", expected: "TRON" },
            TestCase { input: "Klaytn", expected: "KAIA" },
            TestCase { input: "SUI", expected: "SUI" },
            TestCase { input: "  ", expected: "" },
        ];

        for case in cases {
            assert_eq!(normalize_chain_name(case.input), case.expected, "{}", case.input);
        }
    }

    #[test]
    fn test_common_chain_pairs() {
        let pairs = common_chain_pairs(&["ERC20", "TRC20", "Solana"], &["SOL", "ETH", "BSC"]);
        assert_eq!(pairs, vec![("Solana", "SOL"), ("ERC20", "ETH")]);
        assert!(common_chain_pairs(&["ERC20"], &["BSC"]).is_empty());
    }
}
