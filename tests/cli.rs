use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cview_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cview");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("data");
    let bundles = data_dir.join("page_bundles");
    fs::create_dir_all(&bundles).unwrap();

    // Parent links live in the bundles, except for g03 which has no bundle.
    let mut pages = Vec::new();
    pages.push(json!({"page_id": "root", "url": "https://site/guide", "title": "Guide"}));
    for i in 0..25 {
        let id = format!("g{:02}", i);
        let url = format!("https://site/guide/{:02}", i);
        let title = format!("Chapter {:02}", i);
        let mut summary = json!({
            "page_id": &id,
            "url": &url,
            "title": &title,
            "chunks_count": 4,
            "fetched_at": "2024-06-01 09:00:00"
        });
        if i == 3 {
            summary["parent_url"] = json!("https://site/guide");
        } else {
            let bundle = json!({
                "page": {"page_id": &id, "title": &title, "url": &url,
                         "parent_url": "https://site/guide", "breadcrumbs": ["Guide", &title]},
                "blocks": []
            });
            fs::write(bundles.join(format!("{}.json", id)), bundle.to_string()).unwrap();
        }
        pages.push(summary);
    }
    pages.push(json!({"page_id": "fees", "url": "https://site/fees", "title": "Passport fees"}));
    fs::write(data_dir.join("pages_index.json"), json!(pages).to_string()).unwrap();

    let bundle = json!({
        "page": {"page_id": "fees", "title": "Passport fees", "url": "https://site/fees",
                 "parent_url": null, "breadcrumbs": ["Home", "Passport fees"], "toc": ["Adults", "Children"]},
        "blocks": [
            {"kind": "text", "chunk_id": "c1", "source_order": 1, "section_path": ["Adults"],
             "text": "An adult passport costs 3000."},
            {"kind": "table", "table_id": "t1", "source_order": 2, "section_path": ["Children"],
             "caption": null, "columns": ["Age", "Fee"], "rows": [["0-14", "1500"]]},
            {"kind": "text", "chunk_id": "c2", "source_order": 3, "section_path": ["Adults"],
             "text": "Express service doubles the fee."}
        ]
    });
    fs::write(bundles.join("fees.json"), bundle.to_string()).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[source]
transport = "static-snapshot"
data_dir = "{}"

[listing]
page_size = 10
"#,
        data_dir.display()
    );
    let config_path = config_dir.join("cview.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cview(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cview_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("CVIEW_TRANSPORT")
        .env_remove("CVIEW_API_BASE")
        .env_remove("CVIEW_DATA_DIR")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cview binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_pages_paginates() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_cview(&config, &["pages"]);
    assert!(ok, "pages failed: {}", stderr);
    assert!(stdout.contains("Guide  [root]"));
    assert!(stdout.contains("Page 1 of 3 (27 pages)"));

    let (stdout, _, ok) = run_cview(&config, &["pages", "--page", "3"]);
    assert!(ok);
    assert!(stdout.contains("Passport fees  [fees]"));
    assert!(stdout.contains("Page 3 of 3"));
}

#[test]
fn test_pages_filter() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_cview(&config, &["pages", "--query", "PASSPORT"]);
    assert!(ok);
    assert!(stdout.contains("Passport fees"));
    assert!(!stdout.contains("Chapter"));
    assert!(stdout.contains("Page 1 of 1 (1 pages)"));

    let (stdout, _, ok) = run_cview(&config, &["pages", "--query", "nothing-matches"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "No pages.");
}

#[test]
fn test_page_groups_sections() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_cview(&config, &["page", "fees"]);
    assert!(ok, "page failed: {}", stderr);
    assert!(stdout.starts_with("# Passport fees\nHome › Passport fees\n"));

    let adults = stdout.find("== Adults ==").unwrap();
    let children = stdout.find("== Children ==").unwrap();
    let express = stdout.find("Express service").unwrap();
    assert!(adults < express && express < children);
    assert!(stdout.contains("[Table]"));
    assert!(stdout.contains("| Age  | Fee  |"));
    assert!(stdout.contains("--- Navigation ---"));
}

#[test]
fn test_page_not_found_still_shows_navigation() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_cview(&config, &["page", "g03"]);
    assert!(ok);
    assert!(stdout.contains("# Chapter 03"));
    assert!(stdout.contains("Page not found: g03"));
    assert!(stdout.contains("Up:       Guide [root]"));
}

#[test]
fn test_tree_reveals_current() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_cview(&config, &["tree"]);
    assert!(ok);
    assert!(stdout.contains("▾ Guide"));
    assert!(stdout.contains("Chapter 00"));

    let (stdout, _, ok) = run_cview(&config, &["tree", "--current", "g07"]);
    assert!(ok);
    let marked: Vec<&str> = stdout.lines().filter(|l| l.starts_with("> ")).collect();
    assert_eq!(marked.len(), 1);
    assert!(marked[0].ends_with("Chapter 07"));
}

#[test]
fn test_search_unsupported_on_snapshot() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_cview(&config, &["search", "passport"]);
    assert!(!ok);
    assert!(stdout.contains("Search failed"));
    assert!(stderr.contains("not available"));
}

#[test]
fn test_page_navigation_from_bundle_links() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_cview(&config, &["page", "g05"]);
    assert!(ok, "page failed: {}", stderr);
    assert!(stdout.contains("Guide › Chapter 05"));
    assert!(stdout.contains("Up:       Guide [root]"));
    assert!(stdout.contains("Chapter 04"));
}

#[test]
fn test_empty_query_rejected_by_search_and_ask() {
    let (_tmp, config) = setup_test_env();

    for command in ["search", "ask"] {
        let (stdout, stderr, ok) = run_cview(&config, &[command, "  "]);
        assert!(!ok, "{} accepted a blank query", command);
        assert!(stdout.is_empty());
        assert!(stderr.contains("query is empty"), "{}: {}", command, stderr);
    }
}

#[test]
fn test_health() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_cview(&config, &["health"]);
    assert!(ok);
    assert!(stdout.contains("static-snapshot"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config) = setup_test_env();
    fs::write(&config, "[listing]\npage_size = 0\n").unwrap();

    let (_, stderr, ok) = run_cview(&config, &["pages"]);
    assert!(!ok);
    assert!(stderr.contains("page_size"));
}
