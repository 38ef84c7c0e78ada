use criterion::{black_box, criterion_group, criterion_main, Criterion};
use yt_transcript_rust::identifier;
use yt_transcript_rust::segments::{self, RawSegment};
use yt_transcript_rust::strategies::direct::parse_timed_text;

fn timed_text_document(lines: usize) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8" ?><transcript>"#);
    for i in 0..lines {
        xml.push_str(&format!(
            r#"<text start="{:.2}" dur="3.1">line {} with &amp;#39;quoted&amp;#39; words &amp;amp; more</text>"#,
            i as f64 * 3.1,
            i
        ));
    }
    xml.push_str("</transcript>");
    xml
}

fn bench_timed_text(c: &mut Criterion) {
    let short = timed_text_document(50);
    let long = timed_text_document(2_000);

    c.bench_function("timed_text_50_lines", |b| {
        b.iter(|| black_box(parse_timed_text(black_box(&short))))
    });

    c.bench_function("timed_text_2000_lines", |b| {
        b.iter(|| black_box(parse_timed_text(black_box(&long))))
    });
}

fn bench_normalize(c: &mut Criterion) {
    // reversed, with blanks, so sorting and filtering both do work
    let raw: Vec<RawSegment> = (0..2_000)
        .rev()
        .map(|i| {
            let text = if i % 10 == 0 { "   ".to_string() } else { format!("it&#39;s   line {}", i) };
            RawSegment::new(i as f64 * 2.5, text)
        })
        .collect();

    c.bench_function("normalize_2000_segments", |b| {
        b.iter(|| black_box(segments::normalize(black_box(raw.clone()))))
    });
}

fn bench_identifier(c: &mut Criterion) {
    c.bench_function("identifier_shapes", |b| {
        b.iter(|| {
            black_box(identifier::normalize("jNQXAC9IVRw").ok());
            black_box(identifier::normalize("https://www.youtube.com/watch?v=jNQXAC9IVRw&t=42s").ok());
            black_box(identifier::normalize("https://youtu.be/jNQXAC9IVRw").ok());
            black_box(identifier::normalize("not a video").ok());
        })
    });
}

criterion_group!(benches, bench_timed_text, bench_normalize, bench_identifier);
criterion_main!(benches);
