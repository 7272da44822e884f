//! Benchmarks for the sanitize and presentation passes.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use stackview::diagram::{DiagramRenderer, HrefPolicy, IconCache, RendererConfig};

/// A diagram shaped like the service's output: one group per node and edge.
fn diagram_markup(nodes: usize) -> String {
    let mut svg = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="2000" height="2000"><style>.node{fill:#fff}</style>"#,
    );
    for i in 0..nodes {
        let x = (i % 20) * 100;
        let y = (i / 20) * 100;
        svg.push_str(&format!(
            r#"<g class="node" id="n{i}" onclick="select({i})"><rect x="{x}" y="{y}" width="80" height="60"/><image xlink:href="http://localhost:5001/icons/aws/s3.png" x="{x}" y="{y}" width="32" height="32"/><text x="{x}" y="{y}">Bucket{i}</text></g>"#
        ));
        if i > 0 {
            svg.push_str(&format!(
                r#"<g class="edge"><path d="M{x},{y} L{x},{}" stroke="black"/><text x="{x}" y="{y}">Ref</text></g>"#,
                y + 50
            ));
        }
    }
    svg.push_str("<script>alert(1)</script></svg>");
    svg
}

fn renderer() -> DiagramRenderer {
    DiagramRenderer::new(
        RendererConfig::default(),
        HrefPolicy::with_origin("http://localhost:5001"),
    )
}

fn bench_sanitize_small(c: &mut Criterion) {
    let markup = diagram_markup(10);
    let renderer = renderer();
    c.bench_function("sanitize_small", |b| {
        b.iter(|| renderer.sanitize(black_box(&markup)).unwrap())
    });
}

fn bench_prepare_large(c: &mut Criterion) {
    let markup = diagram_markup(400);
    let renderer = renderer();
    let icons = IconCache::default();
    icons.insert(
        "http://localhost:5001/icons/aws/s3.png",
        b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec(),
    );
    c.bench_function("prepare_large", |b| {
        b.iter(|| renderer.prepare(black_box(&markup), &icons).unwrap())
    });
}

criterion_group!(benches, bench_sanitize_small, bench_prepare_large);
criterion_main!(benches);
