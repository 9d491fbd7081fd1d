use marketdata_client::MarketDataClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn raw_quote(symbol: &str, price: f64) -> serde_json::Value {
    serde_json::json!({
        "symbol": symbol,
        "name": format!("{symbol} NV"),
        "price": price,
        "change": 1.0,
        "changesPercentage": 0.5,
        "volume": 1000,
        "marketCap": 500000,
        "bid": price,
        "open": price,
        "dayHigh": price + 1.0,
        "dayLow": price - 1.0,
    })
}

#[tokio::test]
async fn get_multiple_quotes_makes_exactly_one_batch_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            raw_quote("ASML", 700.0),
            raw_quote("SHELL", 30.0),
            raw_quote("ING", 14.0),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let client = MarketDataClient::with_base_url("test-key", 120, server.uri());
    let symbols = vec!["ASML".to_string(), "SHELL".to_string(), "ING".to_string()];
    let quotes = client.get_multiple_quotes(&symbols).await.unwrap();

    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes["ASML"].price, 700.0);
    assert_eq!(quotes["SHELL"].price, 30.0);
    assert_eq!(quotes["ING"].price, 14.0);

    server.verify().await;
}

#[tokio::test]
async fn get_multiple_quotes_second_call_hits_cache_not_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![raw_quote("ASML", 700.0)]))
        .expect(1)
        .mount(&server)
        .await;

    let client = MarketDataClient::with_base_url("test-key", 120, server.uri());
    let symbols = vec!["ASML".to_string()];

    let first = client.get_multiple_quotes(&symbols).await.unwrap();
    let second = client.get_multiple_quotes(&symbols).await.unwrap();

    assert_eq!(first["ASML"].price, second["ASML"].price);
    server.verify().await;
}

#[tokio::test]
async fn get_multiple_quotes_falls_back_per_symbol_on_premium_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(403).set_body_string("premium feature required"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/quote/ASML"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![raw_quote("ASML", 700.0)]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/quote/SHELL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![raw_quote("SHELL", 30.0)]))
        .mount(&server)
        .await;

    let client = MarketDataClient::with_base_url("test-key", 120, server.uri());
    let symbols = vec!["ASML".to_string(), "SHELL".to_string()];
    let quotes = client.get_multiple_quotes(&symbols).await.unwrap();

    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes["ASML"].price, 700.0);
    assert_eq!(quotes["SHELL"].price, 30.0);
}

#[tokio::test]
async fn get_multiple_quotes_empty_input_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(0)
        .mount(&server)
        .await;

    let client = MarketDataClient::with_base_url("test-key", 120, server.uri());
    let quotes = client.get_multiple_quotes(&[]).await.unwrap();
    assert!(quotes.is_empty());
    server.verify().await;
}
