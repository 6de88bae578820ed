//! End-to-end tests loading configuration from disk
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;

use pretty_assertions::assert_eq;
use switchyard::{
    common::{Address, Envelope, Mail, ProcessingState},
    controller::Switchyard,
};

fn address(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn mail(recipients: &[&str]) -> Mail {
    Mail::new(
        Envelope::new(
            Some(address("sender@example.org")),
            recipients.iter().map(|r| address(r)).collect(),
        ),
        b"Message-ID: <e2e@example.org>\r\nSubject: Hello\r\n\r\nHi\r\n".as_slice(),
    )
}

#[tokio::test]
async fn test_shipped_config() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/switchyard.config.ron");
    let mut engine = Switchyard::from_file(path)
        .await
        .expect("Shipped config should load")
        .into_engine();

    let report = engine
        .process(mail(&[
            "postmaster@example.com",
            "team@example.com",
            "user@old.example.com",
            "dev@lists.example.com",
            "former@example.com",
        ]))
        .await
        .unwrap();

    assert_eq!(
        report.mail.recipients,
        vec![
            address("alice@example.org"),
            address("bob@example.com"),
            address("user@example.com"),
            address("dev-owner@example.com"),
        ]
    );

    assert_eq!(report.injected.len(), 1);
    assert_eq!(report.injected[0].state, ProcessingState::ERROR);
    assert_eq!(report.injected[0].recipients, vec![address("former@example.com")]);
}

#[tokio::test]
async fn test_shipped_config_forwards() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/switchyard.config.ron");
    let mut engine = Switchyard::from_file(path).await.unwrap().into_engine();

    let report = engine.process(mail(&["carol@example.com"])).await.unwrap();

    assert_eq!(report.mail.recipients, vec![address("carol@example.com")]);
    assert_eq!(report.injected.len(), 1);
    assert_eq!(report.injected[0].sender, Some(address("carol@example.com")));
    assert_eq!(
        report.injected[0].recipients,
        vec![address("carol@elsewhere.net")]
    );
}

#[tokio::test]
async fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(
            domains: (default_domain: Some("example.com")),
            table: (mappings: {{ "a@example.com": ["alias:b"] }}),
        )"#
    )
    .unwrap();

    let mut engine = Switchyard::from_file(file.path()).await.unwrap().into_engine();
    let report = engine.process(mail(&["a@example.com"])).await.unwrap();

    assert_eq!(report.mail.recipients, vec![address("b@example.com")]);
    assert!(report.injected.is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"(table: (mappings: {{ "a@example.com": ["regex:nope"] }}))"#).unwrap();

    let err = Switchyard::from_file(file.path()).await.unwrap_err();
    assert!(err.to_string().starts_with("Invalid config in"));

    let missing = Switchyard::from_file("/nonexistent/switchyard.config.ron").await;
    assert!(missing.is_err());
}
