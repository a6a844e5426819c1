use std::sync::Arc;
use std::time::{Duration, Instant};

use port_sniffer::probe::TcpProbe;
use port_sniffer::scanner::{scan_blocking, scan_with, ScanConfig};
use port_sniffer::types::ProbeOutcome;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn loopback_listeners_are_reported_sorted() {
    let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let pa = a.local_addr().unwrap().port();
    let pb = b.local_addr().unwrap().port();
    let closed = closed_port().await;

    let cfg = ScanConfig {
        ports: vec![pb, closed, pa],
        ..ScanConfig::default()
    };
    let prober = Arc::new(TcpProbe::new(cfg.timeout));
    let started = Instant::now();
    let res = scan_with("127.0.0.1", prober, &cfg, CancellationToken::new()).await;

    let mut expected = vec![ProbeOutcome::open(pa), ProbeOutcome::open(pb)];
    expected.sort_by_key(|o| o.port);
    assert_eq!(res, expected);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn hostname_targets_resolve() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let cfg = ScanConfig {
        ports: vec![port],
        ..ScanConfig::default()
    };
    let res = scan_with(
        "localhost",
        Arc::new(TcpProbe::new(cfg.timeout)),
        &cfg,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(res, vec![ProbeOutcome::open(port)]);
}

#[tokio::test]
async fn nothing_listening_yields_empty() {
    let cfg = ScanConfig {
        ports: vec![closed_port().await, closed_port().await],
        concurrency: Some(1),
        ..ScanConfig::default()
    };
    let res = scan_with(
        "127.0.0.1",
        Arc::new(TcpProbe::new(cfg.timeout)),
        &cfg,
        CancellationToken::new(),
    )
    .await;
    assert!(res.is_empty());
}

/// Opens up to 65535 sockets at once; needs a generous descriptor limit.
#[test]
#[ignore]
fn full_range_loopback_scan_finds_listener() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let listener = rt.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let port = listener.local_addr().unwrap().port();

    let res = scan_blocking("127.0.0.1").unwrap();
    assert!(res.contains(&ProbeOutcome::open(port)));
    assert!(res.windows(2).all(|w| w[0].port < w[1].port));
    drop(listener);
}
