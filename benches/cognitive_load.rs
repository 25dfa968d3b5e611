use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lecture_lens::chapters::{validate, BoundaryRules};
use lecture_lens::cognitive::{compute_load, CentralityMap, LoadOptions};
use lecture_lens::recover_json;
use lecture_lens::types::{TimeBoundary, TranscriptSegment};

const VOCABULARY: [&str; 8] = [
    "entropy", "gradient", "descent", "bayes", "prior", "posterior", "kernel", "margin",
];

fn lecture(minutes: usize) -> Vec<TranscriptSegment> {
    (0..minutes * 12)
        .map(|i| {
            let start = i as f64 * 5.0;
            let text = format!(
                "so the {} relates to the {} when we look at the {} again",
                VOCABULARY[i % 8],
                VOCABULARY[(i * 3) % 8],
                VOCABULARY[(i * 5) % 8]
            );
            TranscriptSegment::new(start, start + 5.0, text)
        })
        .collect()
}

fn bench_compute_load(c: &mut Criterion) {
    let centrality: CentralityMap = VOCABULARY
        .iter()
        .enumerate()
        .map(|(i, word)| (word.to_string(), 0.1 * (i + 1) as f64))
        .collect();

    let mut group = c.benchmark_group("compute_load");
    for minutes in [10, 60, 180] {
        let segments = lecture(minutes);
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &segments, |b, segments| {
            b.iter(|| black_box(compute_load(segments, &centrality, &LoadOptions::default())))
        });
    }
    group.finish();
}

fn bench_recover_json(c: &mut Criterion) {
    let clean = r#"{"title": "Intro to X", "summary": "Covers basics."}"#;
    let wrapped = r#"Explanation: {"title": "Intro to X", "summary": "Covers basics."} done"#;
    let triples: String = (0..200)
        .map(|i| format!(r#"{{"subject": "s{}", "predicate": "p", "object": "o{}"}}"#, i, i))
        .collect::<Vec<_>>()
        .join(",");
    let truncated = format!("[{}, {{\"subject\": \"cut", triples);

    c.bench_function("recover_json_clean", |b| b.iter(|| black_box(recover_json(clean))));
    c.bench_function("recover_json_wrapped", |b| b.iter(|| black_box(recover_json(wrapped))));
    c.bench_function("recover_json_truncated_array", |b| {
        b.iter(|| black_box(recover_json(&truncated)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let raw: Vec<TimeBoundary> = (0..40)
        .map(|i| TimeBoundary::new(i as f64 * 45.0, (i + 1) as f64 * 45.0))
        .collect();
    let rules = BoundaryRules::default();

    c.bench_function("validate_40_boundaries", |b| {
        b.iter(|| black_box(validate(&raw, 1800.0, &rules)))
    });
}

criterion_group!(benches, bench_compute_load, bench_recover_json, bench_validate);
criterion_main!(benches);
