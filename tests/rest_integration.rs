use std::time::Duration;

use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aptos_explorer_gateway::rate_limit::{RateLimitOverrides, RateLimitedClient};
use aptos_explorer_gateway::rest::{AptosClient, AptosRestClient, ViewRequest};
use aptos_explorer_gateway::types::{AccountAddress, Pagination};
use aptos_explorer_gateway::{ClassifiedError, GatewayError, RawError, classify};

const ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

fn build_client(server: &MockServer) -> AptosRestClient {
    AptosRestClient::builder().base_url(server.uri()).build()
}

fn fast_retries() -> RateLimitOverrides {
    RateLimitOverrides::default()
        .base_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(50))
}

fn error_body(message: &str, code: &str) -> serde_json::Value {
    serde_json::json!({
        "message": message,
        "error_code": code,
        "vm_error_code": null
    })
}

fn classified<T: std::fmt::Debug>(result: Result<T, GatewayError>) -> ClassifiedError {
    let error = result.unwrap_err();
    classify(&RawError::from(error))
}

#[tokio::test]
async fn test_get_ledger_info() {
    let server = MockServer::start().await;
    let response = serde_json::json!({
        "chain_id": 2,
        "epoch": "100",
        "ledger_version": "6000000",
        "oldest_ledger_version": "0",
        "ledger_timestamp": "1700000000000000",
        "node_role": "full_node",
        "oldest_block_height": "0",
        "block_height": "3000000",
        "git_hash": "deadbeef"
    });

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(&server)
        .await;

    let client = build_client(&server);
    let info = client.get_ledger_info().await.unwrap();

    assert_eq!(info.chain_id, 2);
    assert_eq!(info.ledger_version, 6_000_000);
    assert_eq!(info.block_height, 3_000_000);
}

#[tokio::test]
async fn test_get_account_sends_key_and_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{}", ONE)))
        .and(header("authorization", "Bearer test-key"))
        .and(header("user-agent", "explorer-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sequence_number": "17",
            "authentication_key": ONE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AptosRestClient::builder()
        .base_url(server.uri())
        .api_key("test-key")
        .user_agent("explorer-tests")
        .build();
    let account = client.get_account(AccountAddress::ONE).await.unwrap();

    assert_eq!(account.sequence_number, 17);
}

#[tokio::test]
async fn test_get_account_transactions_pagination() {
    let server = MockServer::start().await;
    let response = serde_json::json!([{
        "type": "user_transaction",
        "hash": "0xaa",
        "version": "10",
        "success": true,
        "vm_status": "Executed successfully",
        "sender": "0x1",
        "gas_used": "5",
        "timestamp": "1700000000000000"
    }]);

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{}/transactions", ONE)))
        .and(query_param("start", "10"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(&server)
        .await;

    let client = build_client(&server);
    let transactions = client
        .get_account_transactions(AccountAddress::ONE, &Pagination::starting_at(10).limit(25))
        .await
        .unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].version, Some(10));
    assert!(transactions[0].is_user_transaction());
}

#[tokio::test]
async fn test_get_block_with_transactions() {
    let server = MockServer::start().await;
    let response = serde_json::json!({
        "block_height": "7",
        "block_hash": "0xbb",
        "block_timestamp": "1700000000000000",
        "first_version": "100",
        "last_version": "102",
        "transactions": []
    });

    Mock::given(method("GET"))
        .and(path("/blocks/by_height/7"))
        .and(query_param("with_transactions", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(&server)
        .await;

    let client = build_client(&server);
    let block = client.get_block_by_height(7, true).await.unwrap();

    assert_eq!(block.transaction_count(), 3);
    assert_eq!(block.transactions.map(|txs| txs.len()), Some(0));
}

#[tokio::test]
async fn test_view_posts_request_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/view"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "function": "0x1::coin::balance",
            "type_arguments": ["0x1::aptos_coin::AptosCoin"],
            "arguments": ["0x1"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["1000"])))
        .mount(&server)
        .await;

    let client = build_client(&server);
    let request = ViewRequest::new("0x1::coin::balance")
        .type_argument("0x1::aptos_coin::AptosCoin")
        .argument("0x1");
    let values = client.view(&request).await.unwrap();

    assert_eq!(values, vec![serde_json::json!("1000")]);
}

#[tokio::test]
async fn test_not_found_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions/by_version/99"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(error_body("Transaction not found", "transaction_not_found")),
        )
        .mount(&server)
        .await;

    let client = build_client(&server);
    let result = client.get_transaction_by_version(99).await;

    match &result {
        Err(GatewayError::Api(error)) => {
            assert!(error.is_not_found());
            assert_eq!(error.error_code.as_deref(), Some("transaction_not_found"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(classified(result), ClassifiedError::NotFound);
}

#[tokio::test]
async fn test_rate_limit_and_bad_request_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions/by_version/1"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/by_version/2"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(error_body("bad version", "invalid_input")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/by_version/3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = build_client(&server);

    assert_eq!(
        classified(client.get_transaction_by_version(1).await),
        ClassifiedError::TooManyRequests
    );
    assert_eq!(
        classified(client.get_transaction_by_version(2).await),
        ClassifiedError::InvalidInput("Bad Request".to_string())
    );
    assert_eq!(
        classified(client.get_transaction_by_version(3).await),
        ClassifiedError::Unhandled("503 Service Unavailable".to_string())
    );
}

#[tokio::test]
async fn test_invalid_hash_is_not_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let result = client.get_transaction_by_hash("0x123").await;

    assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = build_client(&server);
    let result = client.get_ledger_info().await;

    assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_rate_limited_client_retries_429() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions/by_version/5"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/by_version/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "block_metadata_transaction",
            "hash": "0xcc",
            "version": "5"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(build_client(&server)).with_overrides(fast_retries());
    let transaction = client.get_transaction_by_version(5).await.unwrap();

    assert_eq!(transaction.version, Some(5));
    assert!(!transaction.is_user_transaction());
}

#[tokio::test]
async fn test_rate_limited_client_does_not_retry_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{}/resources", ONE)))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_body("no account", "account_not_found")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(build_client(&server)).with_overrides(fast_retries());
    let result = client.get_account_resources(AccountAddress::ONE).await;

    assert!(matches!(
        result,
        Err(GatewayError::Classified(ClassifiedError::NotFound))
    ));
}

#[tokio::test]
async fn test_rate_limited_client_gives_up() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(build_client(&server))
        .with_overrides(fast_retries().max_retries(2));
    let result = client.get_ledger_info().await;

    assert!(matches!(
        result,
        Err(GatewayError::Classified(ClassifiedError::TooManyRequests))
    ));
}

#[tokio::test]
async fn test_clients_share_registry_by_host() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions/by_version/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "genesis_transaction",
            "hash": "0x01",
            "version": "1"
        })))
        .mount(&server)
        .await;

    let first = RateLimitedClient::new(build_client(&server));
    let second = RateLimitedClient::with_registry(build_client(&server), first.registry().clone());

    first.get_transaction_by_version(1).await.unwrap();
    second.get_transaction_by_version(1).await.unwrap();

    assert_eq!(first.endpoint_key(), second.endpoint_key());
    assert_eq!(first.registry().endpoint_count().await, 1);
}
