use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const INVOICE: &str = r#"<html><body>
<table>
  <tr><td><b>Order #:</b> 112-1234567-7654321</td></tr>
  <tr><td><b>Order Placed:</b> November 5, 2020</td></tr>
  <tr><td><b>Items Ordered</b></td></tr>
  <tr><td>1 of: <i>Desk Lamp</i></td><td>$19.99</td></tr>
  <tr><td>Item(s) Subtotal:</td><td>$19.99</td></tr>
  <tr><td>Estimated tax to be collected:</td><td>$1.60</td></tr>
  <tr><td>Grand Total:</td><td>$21.59</td></tr>
</table>
</body></html>"#;

const CONFLICTING: &str =
    "<p>Order #: 112-1234567-7654321</p><p>Order Total: $1.00</p><p>Order Total: $2.00</p>";

fn ordex() -> Command {
    Command::cargo_bin("ordex").unwrap()
}

/// Config file pointing the store and fixtures into `dir`.
fn write_config(dir: &Path) -> String {
    let config = serde_json::json!({
        "store": {
            "data_dir": dir.join("data"),
            "fixtures_dir": dir.join("fixtures"),
        }
    });
    let path = dir.join("config.json");
    fs::write(&path, config.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_parse_json() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("invoice.html");
    fs::write(&page, INVOICE).unwrap();

    ordex()
        .args(["parse", page.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("112-1234567-7654321"))
        .stdout(predicate::str::contains("Desk Lamp"))
        .stdout(predicate::str::contains("2159"));
}

#[test]
fn test_parse_text_format() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("invoice.html");
    fs::write(&page, INVOICE).unwrap();

    ordex()
        .args(["parse", page.to_str().unwrap(), "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Order: 112-1234567-7654321"))
        .stdout(predicate::str::contains("1 x Desk Lamp @ $19.99"))
        .stdout(predicate::str::contains("Total:    $21.59"));
}

#[test]
fn test_parse_tokens() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("invoice.html");
    fs::write(&page, INVOICE).unwrap();

    ordex()
        .args(["parse", page.to_str().unwrap(), "--tokens"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Order Placed: November 5, 2020"))
        .stdout(predicate::str::contains("Grand Total: $21.59"));
}

#[test]
fn test_parse_failure_writes_fixture() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let page = dir.path().join("broken.html");
    fs::write(&page, CONFLICTING).unwrap();

    ordex()
        .args(["--config", &config, "parse", page.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parsing failed"));

    let fixtures: Vec<_> = fs::read_dir(dir.path().join("fixtures"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(fixtures.len(), 1);
    assert_eq!(fs::read_to_string(fixtures[0].path()).unwrap(), CONFLICTING);
}

#[test]
fn test_parse_no_matches() {
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("*.html");

    ordex()
        .args(["parse", pattern.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_orders_empty_store() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    ordex()
        .args(["--config", &config, "orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    ordex()
        .args(["--config", &config, "invoice", "112-1234567-7654321"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored invoice"));
}

#[test]
fn test_config_get() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    ordex()
        .args(["--config", &config, "config", "get", "scrape.fetch_attempts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}
