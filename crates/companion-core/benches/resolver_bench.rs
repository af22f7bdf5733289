//! Criterion benchmarks for [`resolve`].
//!
//! Resolution runs on every page load and every adapted request, so it should
//! stay well below a microsecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package companion-core --bench resolver_bench
//! ```

use companion_core::{resolve, ConnectionConfig, EndpointKind, NetworkSignal};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// A fully configured hub with `n` allow-listed SSIDs.
fn build_config_with_n_ssids(n: usize) -> ConnectionConfig {
    let mut cfg = ConnectionConfig {
        webhook_id: "bench-hook".into(),
        internal_ssids: (0..n).map(|i| format!("ssid-{}", i)).collect(),
        use_cloud_relay: true,
        ..Default::default()
    };
    for (kind, address) in [
        (EndpointKind::Internal, "http://192.168.1.10:8123"),
        (EndpointKind::External, "https://hub.example.com"),
        (EndpointKind::RemoteRelay, "https://relay.example.com"),
    ] {
        cfg.set_address(kind, address.parse().ok());
    }
    cfg
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for n in [1usize, 16, 256] {
        let cfg = build_config_with_n_ssids(n);
        // Last SSID forces a full allow-list scan.
        let home = NetworkSignal::new(Some(format!("ssid-{}", n - 1)), None);
        let away = NetworkSignal::new(Some("elsewhere".into()), None);

        group.bench_with_input(BenchmarkId::new("internal", n), &cfg, |b, cfg| {
            b.iter(|| resolve(black_box(cfg), black_box(&home)))
        });
        group.bench_with_input(BenchmarkId::new("external", n), &cfg, |b, cfg| {
            b.iter(|| resolve(black_box(cfg), black_box(&away)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
