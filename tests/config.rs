//! Configuration loading tests: TOML file, environment overrides, and the
//! settings they produce for the pipeline and the store.

use jobmail::config::{ConfigError, JobmailConfig};
use jobmail::email::Verdict;
use jobmail::paths::JobmailPaths;
use jobmail::pipeline::RunOptions;
use jobmail::store::{JobSink, JobStore};

const CONFIG: &str = r#"
[mailbox]
user = "seeker@gmail.com"
fetch_window = 200
fetch_batch = 25

[extraction]
base_url = "http://localhost:11434/v1"
model = "llama3"

[classifier]
subject_keywords = ["application", "interview"]
allowed_senders = ["greenhouse.io", "recruiting@"]
denied_senders = ["linkedin.com", "spam"]

[schedule]
interval_secs = 300
rescan = true
"#;

#[test]
fn file_plus_environment_yields_runnable_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let mut config = JobmailConfig::load(&path).unwrap();
    assert!(config.validate().is_err(), "no password or api key yet");

    config.apply_env_with(|key| match key {
        "GMAIL_PASS" => Some("app-password".into()),
        "OPENAI_API_KEY" => Some("sk-local".into()),
        _ => None,
    });
    config.validate().unwrap();

    assert_eq!(config.mailbox.user, "seeker@gmail.com");
    assert_eq!(config.mailbox.pass, "app-password");
    assert_eq!(config.extraction.model, "llama3");
    assert_eq!(config.schedule.interval().as_secs(), 300);

    let options = RunOptions::from_config(&config);
    assert_eq!(options.window, 200);
    assert_eq!(options.batch, 25);
    assert!(options.rescan);
}

#[test]
fn configured_classifier_tables_replace_defaults() {
    let config = JobmailConfig::from_toml(CONFIG).unwrap();
    let rules = &config.classifier;

    assert_eq!(
        rules.classify("Interview scheduling", "recruiting@initech.com"),
        Verdict::Accepted
    );
    // "thank you" is a default keyword but not a configured one.
    assert_eq!(
        rules.classify("Thank you", "careers@greenhouse.io"),
        Verdict::IrrelevantSubject
    );
    assert_eq!(
        rules.classify("Your application", "jobs@linkedin.com"),
        Verdict::DeniedSender
    );
}

#[test]
fn missing_explicit_config_file_is_read_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = JobmailConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[schedule]\ninterval_secs = \"soon\"\n").unwrap();

    let err = JobmailConfig::load(&path).unwrap_err();
    match err {
        ConfigError::Parse { path: p, .. } => assert!(p.ends_with("broken.toml")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn configured_data_dir_holds_the_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let config = JobmailConfig::from_toml(&format!(
        "[store]\ndata_dir = {:?}\n",
        data_dir.display().to_string()
    ))
    .unwrap();

    let store = JobStore::open(config.store.data_dir.as_deref().unwrap()).unwrap();
    assert!(store.list_all().unwrap().is_empty());
    assert!(data_dir.join("jobs.redb").exists());
}

#[test]
fn xdg_layout_under_temp_home() {
    let dir = tempfile::TempDir::new().unwrap();
    let home = dir.path().display().to_string();
    let paths = JobmailPaths::resolve_with(|key| (key == "HOME").then(|| home.clone())).unwrap();

    assert!(paths.config_file().starts_with(dir.path()));
    assert!(paths.data_dir.ends_with(".local/share/jobmail"));

    // Defaults load when the file does not exist yet.
    let config = JobmailConfig::load_or_default(&paths.config_file()).unwrap();
    assert_eq!(config.mailbox.host, "imap.gmail.com");
}
