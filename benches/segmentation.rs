use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mdspeak::config::SegmenterConfig;
use mdspeak::segment::Segmenter;
use std::hint::black_box;

/// Build a lecture-notes style document with `sections` headed sections.
fn sample_document(sections: usize) -> String {
    let mut doc = String::from("# Lecture Notes\n\n");
    for i in 0..sections {
        doc.push_str(&format!("## Section {}\n\n", i + 1));
        doc.push_str(
            "The **first** paragraph introduces the topic with a [link](https://example.com) \
             and some `inline code`. It keeps going for a while so that the splitter has \
             real work to do. Another sentence follows here! Does a question help? Yes.\n\n",
        );
        doc.push_str("- A bullet about *emphasis*\n- Another bullet\n1. A numbered step\n\n");
        doc.push_str("```rust\nfn skipped() {}\n```\n\n");
        doc.push_str("> A quoted remark that is read aloud.\n\n");
    }
    doc
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");

    for sections in [1usize, 10, 100] {
        let doc = sample_document(sections);
        let segmenter = Segmenter::new(SegmenterConfig::default());
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &doc, |b, doc| {
            b.iter(|| segmenter.segment(black_box(doc)))
        });
    }

    let long_paragraph = "This sentence is long enough to matter. ".repeat(200);
    let tight = Segmenter::new(SegmenterConfig::default()).with_max_chunk_chars(120);
    group.bench_function("split_long_paragraph", |b| {
        b.iter(|| tight.segment(black_box(&long_paragraph)))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
