use serde_json::json;
use storage::repository::{ResponseRow, ResponseSheet, SheetHandle, StorageError};
use storage::sheets::{Credentials, GoogleSheetsRepository, ServiceAccountKey, SheetsConfig};
use survey_core::model::{
    Participant, Question, QuestionIndex, Rating, RatingDraft, RatingField, ResponseRecord,
    RESULTS_HEADER, RESULTS_SHEET_TITLE,
};
use survey_core::time::fixed_now;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SPREADSHEET: &str = "sheet123";

fn client(server: &MockServer) -> GoogleSheetsRepository {
    GoogleSheetsRepository::connect(
        SheetsConfig::new(SPREADSHEET, Credentials::Bearer("test-token".into()))
            .with_api_base(server.uri()),
    )
    .expect("client")
}

fn results_handle() -> SheetHandle {
    SheetHandle {
        title: RESULTS_SHEET_TITLE.into(),
        sheet_id: 42,
    }
}

fn record() -> ResponseRecord {
    let question = Question::new(QuestionIndex::new(4).unwrap(), "q4", "Why?", "Because.");
    let draft = RatingDraft::default()
        .with(RatingField::Accuracy, Rating::Two)
        .with(RatingField::Completeness, Rating::Three)
        .with(RatingField::Usefulness, Rating::Four)
        .with(RatingField::StyleTone, Rating::Five);
    ResponseRecord::from_submission(
        &Participant::parse("Alice").unwrap(),
        &question,
        &draft,
        "",
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn existing_sheet_is_reused_without_writing_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}")))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Sheet1" } },
                { "properties": { "sheetId": 42, "title": "results" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "results!A1:K1",
            "majorDimension": "ROWS",
            "values": [RESULTS_HEADER]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sheet = client(&server)
        .open_or_create(RESULTS_SHEET_TITLE, &RESULTS_HEADER)
        .await
        .unwrap();
    assert_eq!(sheet, results_handle());
}

#[tokio::test]
async fn missing_sheet_is_created_and_header_seeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [{ "properties": { "sheetId": 0, "title": "Sheet1" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}:batchUpdate")))
        .and(body_json(json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": "results",
                        "gridProperties": { "rowCount": 1, "columnCount": 20 }
                    }
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "spreadsheetId": SPREADSHEET,
            "replies": [{ "addSheet": { "properties": { "sheetId": 42, "title": "results" } } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_json(json!({
            "majorDimension": "ROWS",
            "values": [RESULTS_HEADER]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sheet = client(&server)
        .open_or_create(RESULTS_SHEET_TITLE, &RESULTS_HEADER)
        .await
        .unwrap();
    assert_eq!(sheet, results_handle());
}

#[tokio::test]
async fn existing_sheet_without_header_gets_it_seeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [{ "properties": { "sheetId": 42, "title": "results" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "results!A1:K1",
            "majorDimension": "ROWS"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .and(body_json(json!({
            "majorDimension": "ROWS",
            "values": [RESULTS_HEADER]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sheet = client(&server)
        .open_or_create(RESULTS_SHEET_TITLE, &RESULTS_HEADER)
        .await
        .unwrap();
    assert_eq!(sheet, results_handle());
}

#[tokio::test]
async fn header_write_failure_is_repaired_on_the_next_attempt() {
    let server = MockServer::start().await;
    // First lookup: the sheet does not exist yet.
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [{ "properties": { "sheetId": 0, "title": "Sheet1" } }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Sheet1" } },
                { "properties": { "sheetId": 42, "title": "results" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v4/spreadsheets/{SPREADSHEET}:batchUpdate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "replies": [{ "addSheet": { "properties": { "sheetId": 42, "title": "results" } } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "results!A1:K1",
            "majorDimension": "ROWS"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:K1"
        )))
        .and(body_json(json!({
            "majorDimension": "ROWS",
            "values": [RESULTS_HEADER]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = client(&server);
    let first = repo
        .open_or_create(RESULTS_SHEET_TITLE, &RESULTS_HEADER)
        .await
        .unwrap_err();
    assert!(matches!(first, StorageError::RateLimited));

    let second = repo
        .open_or_create(RESULTS_SHEET_TITLE, &RESULTS_HEADER)
        .await
        .unwrap();
    assert_eq!(second, results_handle());
}

#[tokio::test]
async fn answer_keys_read_only_the_projection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "results!B2:C100",
            "majorDimension": "ROWS",
            "values": [["Alice", "1"], ["bob"], ["alice", 2]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let keys = client(&server)
        .read_answer_keys(&results_handle())
        .await
        .unwrap();
    let pairs: Vec<(&str, &str)> = keys
        .iter()
        .map(|k| (k.participant.as_str(), k.q_index.as_str()))
        .collect();
    assert_eq!(pairs, vec![("Alice", "1"), ("bob", ""), ("alice", "2")]);
}

#[tokio::test]
async fn empty_sheet_has_no_answer_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "results!B2:C1000",
            "majorDimension": "ROWS"
        })))
        .mount(&server)
        .await;

    let keys = client(&server)
        .read_answer_keys(&results_handle())
        .await
        .unwrap();
    assert!(keys.is_empty());
}

#[tokio::test]
async fn append_posts_one_raw_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A1:append"
        )))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(body_json(json!({
            "majorDimension": "ROWS",
            "values": [[
                "2023-11-14T22:13:20Z", "Alice", 4, "q4", "Why?", "Because.",
                2, 3, 4, 5, ""
            ]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .append_row(&results_handle(), &ResponseRow::from_record(&record()))
        .await
        .unwrap();
}

#[tokio::test]
async fn full_read_parses_back_into_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!A:K"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                RESULTS_HEADER,
                ["2023-11-14T22:13:20Z", "Alice", "4", "q4", "Why?", "Because.", "2", "3", "4", "5"]
            ]
        })))
        .mount(&server)
        .await;

    let table = client(&server).read_table(&results_handle()).await.unwrap();
    assert_eq!(table.header, RESULTS_HEADER.to_vec());
    assert_eq!(table.response_records().unwrap(), vec![record()]);
}

#[tokio::test]
async fn status_codes_map_to_storage_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;

    let repo = client(&server);
    let first = repo.read_answer_keys(&results_handle()).await.unwrap_err();
    assert!(matches!(first, StorageError::RateLimited));
    let second = repo.read_answer_keys(&results_handle()).await.unwrap_err();
    assert!(matches!(second, StorageError::Unavailable(_)));
    assert!(second.is_transient());
    let third = repo.read_answer_keys(&results_handle()).await.unwrap_err();
    assert!(matches!(third, StorageError::Auth(_)));
    assert!(!third.is_transient());
}

#[tokio::test]
async fn service_account_token_is_exchanged_once_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "minted-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v4/spreadsheets/{SPREADSHEET}/values/results!B2:C"
        )))
        .and(header("authorization", "Bearer minted-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let key = ServiceAccountKey {
        key_type: Some("service_account".into()),
        project_id: Some("survey-test".into()),
        private_key_id: Some("kid-1".into()),
        private_key: include_str!("fixtures/test_service_account.pem").into(),
        client_email: "survey@survey-test.iam.gserviceaccount.com".into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let repo = GoogleSheetsRepository::connect(
        SheetsConfig::new(SPREADSHEET, Credentials::ServiceAccount(key))
            .with_api_base(server.uri()),
    )
    .unwrap();

    repo.read_answer_keys(&results_handle()).await.unwrap();
    repo.read_answer_keys(&results_handle()).await.unwrap();
}
