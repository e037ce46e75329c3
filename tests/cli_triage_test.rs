//! CLI handlers driven with on-disk candidate batches and config files

use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;
use triagebox::cli::{handle_analyze, handle_cache, AnalyzeArgs, CacheAction, CacheArgs, ClearArgs, CommonArgs, OutputFormatArg};
use triagebox::PipelineConfig;

const BATCH: &str = r#"[
  {"id": "a", "name": "kv-store", "fingerprint": "sha256:01", "languages": ["rust"], "cheap_score": 4.0},
  {"id": "b", "name": "image-resizer", "fingerprint": "sha256:02", "languages": ["go"], "cheap_score": 3.0},
  {"id": "c", "name": "log-shipper", "fingerprint": "sha256:03", "languages": ["python"], "cheap_score": 2.0},
  {"id": "d", "name": "mail-relay", "fingerprint": "sha256:04", "languages": ["java"], "cheap_score": 1.0}
]"#;

fn common(config: Option<PathBuf>) -> CommonArgs {
    CommonArgs {
        config,
        format: OutputFormatArg::Json,
    }
}

#[tokio::test]
#[serial]
async fn test_triage_only_writes_selection() {
    let dir = TempDir::new().unwrap();
    let candidates = dir.path().join("batch.json");
    let output = dir.path().join("triage.json");
    std::fs::write(&candidates, BATCH).unwrap();

    let args = AnalyzeArgs {
        candidates,
        common: common(None),
        top_fraction: Some(0.5),
        triage_only: true,
        output: Some(output.clone()),
    };
    assert_eq!(handle_analyze(&args, true).await, 0);

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let selected: Vec<&str> = value["selected"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["candidate"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(selected, vec!["a", "b"]);
    assert_eq!(value["rejected"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_invalid_input_is_an_error_exit() {
    let dir = TempDir::new().unwrap();
    let candidates = dir.path().join("batch.json");
    std::fs::write(&candidates, "{not json").unwrap();

    let args = AnalyzeArgs {
        candidates,
        common: common(None),
        top_fraction: None,
        triage_only: true,
        output: None,
    };
    assert_eq!(handle_analyze(&args, true).await, 1);

    let args = AnalyzeArgs {
        candidates: dir.path().join("batch.json"),
        common: common(None),
        top_fraction: Some(2.0),
        triage_only: true,
        output: None,
    };
    assert_eq!(handle_analyze(&args, true).await, 1);
}

#[test]
#[serial]
fn test_config_file_then_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("triagebox.yaml");
    std::fs::write(
        &path,
        "top_fraction: 0.25\nmodel_version: from-file\ndefault_chain: [openai]\nproviders:\n  - name: openai\n    adapter: openai\n    model: gpt-4o-mini\n",
    )
    .unwrap();

    std::env::set_var("TRIAGEBOX_MODEL_VERSION", "from-env");
    let config = PipelineConfig::load(Some(&path));
    std::env::remove_var("TRIAGEBOX_MODEL_VERSION");

    let config = config.unwrap();
    assert_eq!(config.top_fraction, 0.25);
    assert_eq!(config.model_version, "from-env");
    assert_eq!(config.default_chain, vec!["openai"]);
}

#[test]
#[serial]
fn test_cache_commands_on_configured_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("triagebox.yaml");
    let cache = dir.path().join("cache.db");
    std::fs::write(&path, format!("cache_path: {}\n", cache.display())).unwrap();

    let stats = CacheArgs {
        action: CacheAction::Stats(common(Some(path.clone()))),
    };
    assert_eq!(handle_cache(&stats), 0);
    assert!(cache.exists());

    let clear = CacheArgs {
        action: CacheAction::Clear(ClearArgs {
            common: common(Some(path)),
            expired_only: true,
        }),
    };
    assert_eq!(handle_cache(&clear), 0);
}
