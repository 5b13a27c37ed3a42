use xbrlkit::{FilingQuery, FilingsOperations, Xbrl, XbrlError};

#[tokio::test]
#[ignore]
async fn rate_limited_requests_succeed() {
    let xbrl = Xbrl::new("test_agent example@example.com").unwrap();
    let before = xbrlkit::api_request_count();

    for _ in 0..8 {
        let query = FilingQuery::new().max_size(Some(1));
        let filings = xbrl.get_filings(&query).await.unwrap();
        assert_eq!(filings.len(), 1);
    }
    assert!(xbrlkit::api_request_count() - before >= 8);
}

#[tokio::test]
#[ignore]
async fn unknown_filter_is_an_api_error() {
    let xbrl = Xbrl::new("test_agent example@example.com").unwrap();

    let result = xbrl
        .get_filings(&FilingQuery::new().filter("no_such_attribute", "x"))
        .await;
    match result {
        Err(XbrlError::Api(group)) => {
            assert_eq!(group.status, 400);
            assert!(!group.errors.is_empty());
        }
        other => panic!("expected API error, got {other:?}"),
    }
}
