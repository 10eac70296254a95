use super::*;
use crate::apply::CONFIG_FILE_NAME;
use kubert::index::IndexNamespacedResource;
use ngress_controller_k8s_api::ResourceId;
use std::fs;

/// Redelivering an identical resource doesn't schedule work, and rebuilding
/// unchanged state neither writes nor reloads.
#[tokio::test]
async fn unchanged_state_is_not_reapplied() {
    let test = TestConfig::default();
    let ing = mk_simple_ingress("ns", "ing", "a.example.com", "svc");
    {
        let mut controller = test.controller.write();
        controller.apply(mk_service("ns", "svc", &[8080]));
        controller.apply(ing.clone());
        assert!(controller.rebuild().reloaded);
    }
    assert_eq!(test.reloads.count(), 1);

    let config_path = test.dir.path().join("conf.d").join(CONFIG_FILE_NAME);
    let written = fs::metadata(&config_path).unwrap().modified().unwrap();

    assert!(!test.handle(Event::Updated {
        old: ing.clone(),
        new: ing.clone(),
    }));
    let applied = {
        let mut controller = test.controller.write();
        // Watches redeliver the same snapshot on resync.
        controller.apply(ing);
        controller.rebuild()
    };
    assert_eq!(applied, crate::Applied::default());
    assert_eq!(test.reloads.count(), 1);
    assert_eq!(
        fs::metadata(&config_path).unwrap().modified().unwrap(),
        written
    );
}

#[tokio::test]
async fn kubert_events_update_and_delete() {
    let test = TestConfig::default();
    let mut ing = mk_simple_ingress("ns", "ing", "a.example.com", "svc");
    let mut controller = test.controller.write();
    controller.apply(ing.clone());
    assert!(controller.host("a.example.com").is_some());

    ing.spec.as_mut().unwrap().rules.as_mut().unwrap()[0].host = Some("b.example.com".into());
    controller.apply(ing);
    assert!(controller.host("a.example.com").is_none());
    assert!(controller.host("b.example.com").is_some());

    IndexNamespacedResource::<k8s::Ingress>::delete(&mut *controller, "ns".into(), "ing".into());
    assert!(controller.hosts().is_empty());

    // Deletes for unknown resources are ignored.
    IndexNamespacedResource::<k8s::Secret>::delete(&mut *controller, "ns".into(), "sec".into());
    IndexNamespacedResource::<k8s::Service>::delete(&mut *controller, "ns".into(), "svc".into());
    assert_eq!(controller.stats(), crate::Stats::default());
}

#[tokio::test]
async fn certificates_follow_references() {
    let test = TestConfig::default();
    let certs_dir = test.dir.path().join("certs");
    let ing = with_tls(
        mk_simple_ingress("ns", "ing", "a.example.com", "svc"),
        "sec",
        &["a.example.com"],
    );
    {
        let mut controller = test.controller.write();
        controller.apply(mk_service("ns", "svc", &[8080]));
        controller.apply(mk_secret("ns", "sec", b"cert", b"key"));
        controller.apply(ing.clone());
        let applied = controller.rebuild();
        assert!(applied.certs_changed);
        assert!(applied.config_changed);
    }
    assert_eq!(fs::read(certs_dir.join("ns/sec/tls.crt")).unwrap(), b"cert");
    assert_eq!(fs::read(certs_dir.join("ns/sec/tls.key")).unwrap(), b"key");

    // Rotating the secret rewrites the certificates without changing the
    // configuration.
    test.controller
        .write()
        .apply(mk_secret("ns", "sec", b"cert-2", b"key-2"));
    let applied = test.controller.write().rebuild();
    assert!(applied.certs_changed);
    assert!(!applied.config_changed);
    assert_eq!(fs::read(certs_dir.join("ns/sec/tls.crt")).unwrap(), b"cert-2");
    assert_eq!(test.reloads.count(), 2);

    // Once no host uses the secret, its files are removed.
    test.delete_ingress(ing);
    let applied = test.controller.write().rebuild();
    assert!(applied.certs_changed);
    assert!(!certs_dir.join("ns/sec/tls.crt").exists());
    assert!(test
        .controller
        .read()
        .secrets()
        .get(&ResourceId::new("ns", "sec"))
        .is_some());
}

/// A burst of events produces a single rebuild once the burst quiesces.
#[tokio::test(start_paused = true)]
async fn bursts_are_debounced() {
    let test = TestConfig::with_debounce(time::Duration::from_secs(10));
    let config_path = test.dir.path().join("conf.d").join(CONFIG_FILE_NAME);

    test.add_service(mk_service("ns", "svc", &[8080]));
    for i in 0..5 {
        test.add_ingress(mk_simple_ingress(
            "ns",
            &format!("ing-{i}"),
            &format!("host-{i}.example.com"),
            "svc",
        ));
        time::sleep(time::Duration::from_secs(1)).await;
    }
    assert!(!config_path.exists());
    assert_eq!(test.reloads.count(), 0);

    time::sleep(time::Duration::from_secs(10)).await;
    assert_eq!(test.reloads.count(), 1);
    let config = fs::read_to_string(&config_path).unwrap();
    for i in 0..5 {
        assert!(config.contains(&format!("server_name host-{i}.example.com;")));
    }

    // Redundant events don't trigger another rebuild.
    let ing = mk_simple_ingress("ns", "ing-0", "host-0.example.com", "svc");
    test.controller.write().apply(ing);
    time::sleep(time::Duration::from_secs(20)).await;
    assert_eq!(test.reloads.count(), 1);
}
