//! Throughput benchmarks for the deterministic cascade stages (C1-C4):
//! normalization, transfer-pair detection, merchant enrichment, and
//! classification.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use resolve_cascade::{classify, detect_transfer_pairs, normalize_batch};
use resolve_core::Flow;

mod common;
use common::*;

/// C1: normalizing a batch of raw transactions into `NormTx`.
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_batch");

    for size in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(|| raw_batch(size), |raws| black_box(normalize_batch(&raws)));
        });
    }

    group.finish();
}

/// C2: detecting internal-transfer pairs over a normalized batch.
fn bench_transfer_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_transfer_pairs");

    for size in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let raws = raw_batch(size);
            let norm = normalize_batch(&raws)
                .into_iter()
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            b.iter(|| black_box(detect_transfer_pairs(&norm)));
        });
    }

    group.finish();
}

/// C3: Layer 1 merchant enrichment over a batch, with `concurrency`
/// concurrent provider calls in flight.
fn bench_merchant_enrichment(c: &mut Criterion) {
    let mut group = c.benchmark_group("merchant_enrichment");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for size in [50, 200, 1_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        for concurrency in [1, 10].iter() {
            group.bench_with_input(
                BenchmarkId::new(format!("concurrency_{concurrency}"), size),
                size,
                |b, &size| {
                    let raws = raw_batch(size);
                    let norm = normalize_batch(&raws)
                        .into_iter()
                        .filter_map(Result::ok)
                        .collect::<Vec<_>>();
                    let enricher = merchant_enricher(size, *concurrency);
                    b.to_async(&rt).iter(|| async { black_box(enricher.enrich_batch(&norm).await) });
                },
            );
        }
    }

    group.finish();
}

/// C4: the ordered-keyword budget classifier, which the agentic workflow's
/// terminal node also calls once per transaction it settles.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let descriptions = [
        "NETFLIX.COM MONTHLY",
        "BARCLAYCARD PAYMENT",
        "SAINSBURYS LOCAL",
        "COUNCIL TAX DIRECT DEBIT",
        "SALARY ACME CORP",
    ];
    group.throughput(Throughput::Elements(descriptions.len() as u64));

    group.bench_function("ordered_keyword_rules", |b| {
        b.iter(|| {
            for description in descriptions {
                black_box(classify(&[], description, false, Flow::Outgoing));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_transfer_pairs, bench_merchant_enrichment, bench_classify);
criterion_main!(benches);
