// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 kubestate Contributors

//! Global subscriber installation. Runs in its own test binary so the
//! process-wide subscriber does not leak into other suites.

use kubestate_observability::{init_tracing_with_config, LogConfig, LogError, LogOutput};

#[test]
fn test_subscriber_installed_once() {
    let config = LogConfig::from_settings("debug", "json")
        .expect("valid settings")
        .with_output(LogOutput::Stdout);

    init_tracing_with_config(config.clone()).expect("first install succeeds");
    tracing::info!(collector = "pods", "subscriber ready");

    let second = init_tracing_with_config(config);
    assert!(matches!(second, Err(LogError::AlreadyInitialized(_))));
}

#[test]
fn test_bad_level_rejected_before_install() {
    let config = LogConfig::new().with_level("kubestate=verbose");
    assert!(matches!(
        init_tracing_with_config(config),
        Err(LogError::InvalidFilter { .. })
    ));
}
