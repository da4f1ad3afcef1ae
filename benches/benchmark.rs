use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fsstats::{read_mgh, summarize_population, write_mgh, write_textures_csv, PopulationStats, TextureMap};
use ndarray::Array4;

use std::fs;
use std::path::Path;

const NUM_SUBJECTS: usize = 200;
const ICO7_VERTICES: usize = 163842;

fn population_summary(fsdir: &Path) -> PopulationStats {
    summarize_population(fsdir, None).unwrap()
}

/// Writes an aseg table and one aparc table with `NUM_SUBJECTS` rows each.
fn write_stats_tables(fsdir: &Path) {
    let stats = fsdir.join("stats");
    fs::create_dir_all(&stats).unwrap();
    let regions: Vec<String> = (0..40).map(|r| format!("region{}", r)).collect();
    for (name, header) in &[("aseg_stats_volume.csv", "Measure:volume"), ("aparc_stats_lh_thickness.csv", "lh.aparc.thickness")] {
        let mut table = format!("{},{}\n", header, regions.join(","));
        for s in 0..NUM_SUBJECTS {
            let row: Vec<String> = (0..regions.len()).map(|r| format!("{:.3}", (s * r) as f64 * 0.5)).collect();
            table.push_str(&format!("subject{},{}\n", s, row.join(",")));
        }
        fs::write(stats.join(name), table).unwrap();
    }
}

fn bench_stats(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    write_stats_tables(dir.path());
    c.bench_function("summarize_population", |b| {
        b.iter(|| population_summary(black_box(dir.path())))
    });

    let mgz = dir.path().join("lh.thickness.mgz");
    write_mgh(&mgz, &Array4::from_elem((ICO7_VERTICES, 1, 1, 1), 2.5f32)).unwrap();
    c.bench_function("read_mgh", |b| {
        b.iter(|| read_mgh(black_box(&mgz)).unwrap())
    });

    let mut textures = TextureMap::new();
    for s in 0..10 {
        textures.insert(format!("subject{}", s), vec![s as f32 * 0.1; ICO7_VERTICES]);
    }
    let csv = dir.path().join("lh.thickness.csv");
    c.bench_function("write_textures_csv", |b| {
        b.iter(|| write_textures_csv(black_box(&csv), &textures).unwrap())
    });
}

criterion_group!(benches, bench_stats);
criterion_main!(benches);
