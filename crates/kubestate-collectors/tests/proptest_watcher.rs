// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 kubestate Contributors

//! Property-based tests for the resource watcher
//!
//! Random sequences of cluster changes, redeliveries, spurious events,
//! dropped streams and expired cursors are played against the in-memory API
//! while a watcher runs. Once the sequence ends the store must hold exactly
//! the rendering of the objects that still exist.

#![allow(clippy::unwrap_used)]

use kubestate_collectors::api::{MockApi, RawObject, ResourceType, Tombstone, WatchEvent};
use kubestate_collectors::generators::render;
use kubestate_collectors::{lookup, KindSpec, ResourceWatcher, WatcherConfig};
use kubestate_store::{MetricsStore, ObjectIdentity};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NAMESPACES: [&str; 2] = ["default", "kube-system"];

/// One change or delivery fault
#[derive(Debug, Clone)]
enum Op {
    Apply { ns: usize, name: usize, data: u8 },
    Delete { ns: usize, name: usize },
    Redeliver(usize),
    Phantom(u8),
    PhantomDelete(u8),
    CloseWatch,
    Expire,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..2usize, 0..6usize, any::<u8>())
            .prop_map(|(ns, name, data)| Op::Apply { ns, name, data }),
        3 => (0..2usize, 0..6usize).prop_map(|(ns, name)| Op::Delete { ns, name }),
        2 => any::<usize>().prop_map(Op::Redeliver),
        1 => any::<u8>().prop_map(Op::Phantom),
        1 => any::<u8>().prop_map(Op::PhantomDelete),
        1 => Just(Op::CloseWatch),
        1 => Just(Op::Expire),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..40)
}

fn spec() -> &'static KindSpec {
    lookup("configmaps").unwrap()
}

fn configmaps() -> ResourceType {
    spec().resource
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        resync_period: Duration::from_millis(300),
        backoff_base: Duration::from_millis(5),
        backoff_max: Duration::from_millis(50),
    }
}

fn configmap(ns: &str, name: &str, data: u8) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": ns,
            "labels": {"revision": data.to_string()},
            "creationTimestamp": "2019-01-01T00:00:00Z"
        }
    })
}

/// Objects the cluster currently holds, as last applied
type Model = BTreeMap<ObjectIdentity, Value>;

fn with_version(mut object: Value, version: &str) -> Value {
    object["metadata"]["resourceVersion"] = Value::String(version.to_string());
    object
}

fn expected_lines(model: &Model) -> Vec<String> {
    let mut lines: Vec<String> = model
        .values()
        .flat_map(|object| render(spec(), &RawObject::new(object.clone())).unwrap())
        .map(|record| record.to_string())
        .collect();
    lines.sort();
    lines
}

async fn store_lines(store: &MetricsStore) -> Vec<String> {
    let mut lines: Vec<String> = store.list().await.iter().map(|r| r.to_string()).collect();
    lines.sort();
    lines
}

/// Wait until the store renders `model` exactly, or give up
async fn settle(store: &MetricsStore, model: &Model) -> Vec<String> {
    let expected = expected_lines(model);
    let mut actual = store_lines(store).await;
    for _ in 0..500 {
        if actual == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        actual = store_lines(store).await;
    }
    actual
}

fn start(api: &MockApi) -> (Arc<MetricsStore>, CancellationToken, tokio::task::JoinHandle<()>) {
    let store = Arc::new(MetricsStore::new());
    let cancel = CancellationToken::new();
    let watcher = ResourceWatcher::new(
        spec(),
        None,
        Arc::new(api.clone()),
        Arc::clone(&store),
        fast_config(),
    );
    let handle = tokio::spawn(watcher.run(cancel.clone()));
    (store, cancel, handle)
}

async fn play(api: &MockApi, model: &mut Model, op: Op) {
    let resource = configmaps();
    match op {
        Op::Apply { ns, name, data } => {
            let (ns, name) = (NAMESPACES[ns], format!("cm-{}", name));
            let object = configmap(ns, &name, data);
            let version = api.apply(&resource, object.clone()).await;
            model.insert(
                ObjectIdentity::namespaced("ConfigMap", ns, &name),
                with_version(object, &version),
            );
        }
        Op::Delete { ns, name } => {
            let (ns, name) = (NAMESPACES[ns], format!("cm-{}", name));
            api.delete(&resource, Some(ns), &name).await;
            model.remove(&ObjectIdentity::namespaced("ConfigMap", ns, &name));
        }
        Op::Redeliver(pick) => {
            if model.is_empty() {
                return;
            }
            let (identity, object) = model.iter().nth(pick % model.len()).unwrap();
            api.inject(
                &resource,
                identity.namespace(),
                WatchEvent::Modified(RawObject::new(object.clone())),
            );
        }
        Op::Phantom(n) => {
            let version = api.current_version().await;
            let object = with_version(configmap("default", &format!("ghost-{}", n), n), &version);
            api.inject(
                &resource,
                Some("default"),
                WatchEvent::Added(RawObject::new(object)),
            );
        }
        Op::PhantomDelete(n) => {
            api.inject(
                &resource,
                Some("default"),
                WatchEvent::Deleted(Tombstone {
                    identity: ObjectIdentity::namespaced("ConfigMap", "default", &format!("gone-{}", n)),
                    resource_version: None,
                }),
            );
        }
        Op::CloseWatch => api.close_watches(),
        Op::Expire => api.expire_watches().await,
    }
    // Let the watcher interleave with the changes
    tokio::task::yield_now().await;
}

/// Property: after any sequence of changes and delivery faults the store
/// converges to exactly the live objects
#[test]
fn proptest_store_converges_to_live_objects() {
    let mut runner = TestRunner::new(Config {
        cases: 32,
        ..Config::default()
    });

    runner
        .run(&arb_ops(), |ops| {
            runtime().block_on(async {
                let api = MockApi::new();
                let mut model = Model::new();
                let (store, cancel, handle) = start(&api);

                for op in ops {
                    play(&api, &mut model, op).await;
                }

                let actual = settle(&store, &model).await;
                prop_assert_eq!(actual, expected_lines(&model));

                let identities = store.identities().await;
                let live: Vec<ObjectIdentity> = model.keys().cloned().collect();
                prop_assert_eq!(identities, live);

                cancel.cancel();
                handle.await.unwrap();
                Ok(())
            })
        })
        .unwrap();
}

/// Property: delivering the same update twice leaves the store unchanged
#[test]
fn proptest_redelivery_is_idempotent() {
    let mut runner = TestRunner::new(Config {
        cases: 16,
        ..Config::default()
    });
    let applies = prop::collection::vec((0..2usize, 0..6usize, any::<u8>()), 1..20);

    runner
        .run(&applies, |applies| {
            runtime().block_on(async {
                let api = MockApi::new();
                let mut model = Model::new();
                let (store, cancel, handle) = start(&api);

                for (ns, name, data) in applies {
                    play(&api, &mut model, Op::Apply { ns, name, data }).await;
                }
                let before = settle(&store, &model).await;
                prop_assert_eq!(&before, &expected_lines(&model));

                for pick in 0..model.len() {
                    play(&api, &mut model, Op::Redeliver(pick)).await;
                    play(&api, &mut model, Op::Redeliver(pick)).await;
                }

                // A marker applied last is seen only after every redelivery
                let mut marked = model.clone();
                play(&api, &mut marked, Op::Apply { ns: 1, name: 99, data: 0 }).await;
                settle(&store, &marked).await;

                let marker = ObjectIdentity::namespaced("ConfigMap", NAMESPACES[1], "cm-99");
                let mut after = store_lines(&store).await;
                after.retain(|line| !line.contains("configmap=\"cm-99\""));
                prop_assert!(store.get(&marker).await.is_some());
                prop_assert_eq!(after, before);

                cancel.cancel();
                handle.await.unwrap();
                Ok(())
            })
        })
        .unwrap();
}
