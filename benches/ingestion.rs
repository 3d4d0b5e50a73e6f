//! 采集热路径基准测试：身份哈希、票据存储、签名

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use viewpulse::analytics::{VisitorIdentity, hash_identifier, sign_body};
use viewpulse::cache::{MokaTicketStore, TicketStore};

const UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

// ============== 身份哈希 ==============

fn bench_identity(c: &mut Criterion) {
    c.bench_function("identity/hash_ip", |b| {
        b.iter(|| hash_identifier(std::hint::black_box("203.0.113.42")));
    });

    c.bench_function("identity/from_raw_and_ticket_key", |b| {
        b.iter(|| {
            let identity = VisitorIdentity::from_raw("203.0.113.42", UA);
            identity.ticket_key(std::hint::black_box(42))
        });
    });
}

// ============== 票据存储 ==============

fn bench_ticket_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MokaTicketStore::new(1_000_000));
    let ttl = Duration::from_secs(3600);

    // 已存在的票据：重复浏览路径
    rt.block_on(async {
        store.set_if_absent("viewed:dup", ttl).await.unwrap();
    });
    let dup_store = Arc::clone(&store);
    c.bench_function("ticket/set_if_absent_duplicate", |b| {
        b.to_async(&rt).iter(|| {
            let s = Arc::clone(&dup_store);
            async move {
                assert!(!s.set_if_absent("viewed:dup", ttl).await.unwrap());
            }
        });
    });

    // 新票据：首次浏览路径
    let counter = Arc::new(AtomicU64::new(0));
    let fresh_store = Arc::clone(&store);
    c.bench_function("ticket/set_if_absent_fresh", |b| {
        b.to_async(&rt).iter(|| {
            let s = Arc::clone(&fresh_store);
            let n = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                assert!(s.set_if_absent(&format!("viewed:{}", n), ttl).await.unwrap());
            }
        });
    });
}

// ============== 签名 ==============

fn bench_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature");
    for size in [64usize, 512, 4096] {
        let body = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| sign_body("bench-secret", body).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_identity, bench_ticket_store, bench_signature);
criterion_main!(benches);
