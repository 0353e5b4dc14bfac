use aptos_explorer_gateway::cache::{CachePolicy, SharedQueryCache};
use aptos_explorer_gateway::rate_limit::RateLimitedClient;
use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient, ViewRequest};
use aptos_explorer_gateway::types::{AccountAddress, Network, Pagination};

fn live_tests_enabled() -> bool {
    std::env::var("APTOS_LIVE_TESTS").ok().as_deref() == Some("1")
}

fn live_network() -> Network {
    std::env::var("APTOS_NETWORK")
        .ok()
        .and_then(|network| network.parse().ok())
        .unwrap_or(Network::Testnet)
}

#[tokio::test]
#[ignore]
async fn live_rest_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let client = RateLimitedClient::new(
        AptosRestClient::builder()
            .network(live_network())
            .api_key_from_env()
            .build(),
    );

    let info = client.get_ledger_info().await?;
    assert!(info.ledger_version > 0);

    let resources = client.get_account_resources(AccountAddress::ONE).await?;
    assert!(!resources.is_empty());

    let _transactions = client
        .get_account_transactions(AccountAddress::ONE, &Pagination::default().limit(5))
        .await?;

    let block = client.get_block_by_height(info.block_height, false).await?;
    assert_eq!(block.block_height, info.block_height);

    let timestamp = client
        .view(&ViewRequest::new("0x1::timestamp::now_seconds"))
        .await?;
    assert_eq!(timestamp.len(), 1);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_cached_ledger_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let client = RateLimitedClient::new(AptosRestClient::builder().network(live_network()).build());
    let cache: SharedQueryCache<&'static str, u64> = SharedQueryCache::new(CachePolicy::default());

    let fetch = |client: RateLimitedClient<AptosRestClient>| {
        move || async move { client.get_ledger_info().await.map(|info| info.ledger_version) }
    };
    let first = cache.get_or_fetch("ledger_version", fetch(client.clone())).await?;
    let second = cache.get_or_fetch("ledger_version", fetch(client.clone())).await?;

    // Second read is served from the cache
    assert_eq!(first, second);

    Ok(())
}
