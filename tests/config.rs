use std::fs;
use std::path::PathBuf;

use review_sampler::config::{
    SamplerConfig, DEFAULT_DATABASE_PATH, DEFAULT_ESTIMATED_UNPROTECTED_RATIO,
    DEFAULT_TARGET_OVERALL_SELECTION_RATE,
};
use review_sampler::history::HistoryPolicy;
use review_sampler::{ConfigError, Sampler, SamplingRates};
use tempfile::tempdir;

#[test]
fn empty_config_uses_defaults() {
    let config = SamplerConfig::from_toml_str("").unwrap();
    assert_eq!(config.database.path, PathBuf::from(DEFAULT_DATABASE_PATH));
    assert_eq!(
        config.sampling.target_overall_selection_rate,
        DEFAULT_TARGET_OVERALL_SELECTION_RATE
    );
    assert_eq!(
        config.sampling.estimated_unprotected_ratio,
        DEFAULT_ESTIMATED_UNPROTECTED_RATIO
    );
    assert_eq!(config.sampling.on_history_unavailable, HistoryPolicy::AssumeEmpty);
}

#[test]
fn full_config_parses() {
    let config = SamplerConfig::from_toml_str(
        r#"
        [database]
        path = "/var/lib/sampler/selections.db"

        [sampling]
        target_overall_selection_rate = 0.05
        estimated_unprotected_ratio = 0.6
        on_history_unavailable = "fail"
        "#,
    )
    .unwrap();

    assert_eq!(config.database.path, PathBuf::from("/var/lib/sampler/selections.db"));
    let rates = config.rates().unwrap();
    assert_eq!(rates.target_overall_rate(), 0.05);
    assert_eq!(rates.estimated_eligible_ratio(), 0.6);
    assert_eq!(config.sampling.on_history_unavailable, HistoryPolicy::Fail);
}

#[test]
fn out_of_range_rates_are_rejected() {
    for (target, ratio, bad) in [
        (0.0, 0.8, "target_overall_selection_rate"),
        (1.5, 0.8, "target_overall_selection_rate"),
        (0.01, 0.0, "estimated_unprotected_ratio"),
        (0.01, -0.3, "estimated_unprotected_ratio"),
        (0.01, 1.2, "estimated_unprotected_ratio"),
    ] {
        let raw = format!(
            "[sampling]\ntarget_overall_selection_rate = {target:?}\nestimated_unprotected_ratio = {ratio:?}\n"
        );
        match SamplerConfig::from_toml_str(&raw) {
            Err(ConfigError::RateOutOfRange { name, .. }) => assert_eq!(name, bad),
            other => panic!("expected rate error for {target}/{ratio}, got {other:?}"),
        }
    }
    assert!(SamplingRates::new(1.0, 1.0).is_ok());
}

#[test]
fn unknown_history_policy_is_a_parse_error() {
    let err = SamplerConfig::from_toml_str("[sampling]\non_history_unavailable = \"retry\"\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn loads_from_file_with_path_override() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sampler.toml");
    fs::write(
        &path,
        "[sampling]\ntarget_overall_selection_rate = 0.02\nestimated_unprotected_ratio = 0.9\n",
    )
    .unwrap();

    let db = dir.path().join("override.db");
    let config = SamplerConfig::from_path(&path)
        .unwrap()
        .with_database_path(&db);
    assert_eq!(config.database.path, db);

    let sampler = Sampler::from_config(&config).unwrap();
    assert_eq!(sampler.store().path(), db.as_path());
    assert_eq!(sampler.rates().target_overall_rate(), 0.02);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().unwrap();
    let err = SamplerConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}
