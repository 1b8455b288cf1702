use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dartcal_core::{
    estimate_homography, estimate_homography_ransac, refine_point, BoardPoint, Correspondence,
    GrayImage, Homography, ImagePoint, RansacParams,
};

fn camera() -> Homography {
    Homography::from_array([
        [2.1, 0.15, 640.0],
        [-0.08, 1.8, 360.0],
        [0.0004, 0.0009, 1.0],
    ])
}

fn targets(h: &Homography) -> Vec<Correspondence> {
    [
        (0.0, -170.0),
        (170.0, 0.0),
        (0.0, 170.0),
        (-170.0, 0.0),
        (0.0, 0.0),
    ]
    .into_iter()
    .filter_map(|(x, y)| {
        let board = BoardPoint::new(x, y);
        h.apply(board.to_point2())
            .map(|q| Correspondence::new(board, ImagePoint::from(q)))
    })
    .collect()
}

fn bench_dlt(c: &mut Criterion) {
    let corr = targets(&camera());
    c.bench_function("dlt_4pt", |b| {
        b.iter(|| estimate_homography(black_box(&corr[..4])))
    });
    c.bench_function("dlt_5pt", |b| b.iter(|| estimate_homography(black_box(&corr))));
}

fn bench_ransac(c: &mut Criterion) {
    let mut corr = targets(&camera());
    corr[4].image.x += 500.0;
    let params = RansacParams::default();
    c.bench_function("ransac_5pt_outlier", |b| {
        b.iter(|| estimate_homography_ransac(black_box(&corr), &params))
    });
}

fn bench_refine(c: &mut Criterion) {
    let img = GrayImage::from_fn(640, 480, |x, y| if (x / 40 + y / 40) % 2 == 0 { 30 } else { 220 });
    let view = img.view();
    c.bench_function("refine_r8", |b| {
        b.iter(|| refine_point(&view, black_box(ImagePoint::new(203.4, 118.9)), 8))
    });
}

criterion_group!(benches, bench_dlt, bench_ransac, bench_refine);
criterion_main!(benches);
