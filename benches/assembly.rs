use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use piezo_dataset::{station_date_grid, DateRange, GridPointExtractor, WeatherGrid};

fn france_grid() -> WeatherGrid {
    let latitudes: Vec<f64> = (0..41).map(|i| 41.0 + i as f64 * 0.25).collect();
    let longitudes: Vec<f64> = (0..57).map(|i| -5.0 + i as f64 * 0.25).collect();
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let times = (0..24)
        .map(|h| start.and_hms_opt(h, 0, 0).unwrap())
        .collect();
    WeatherGrid::new(latitudes, longitudes, times).unwrap()
}

fn bench_assembly(c: &mut Criterion) {
    let grid = france_grid();
    let extractor = GridPointExtractor::new(&grid);
    c.bench_function("nearest_cell", |b| {
        b.iter(|| extractor.nearest_cell(black_box(48.137), black_box(2.354)))
    });

    let codes: Vec<String> = (0..200).map(|i| format!("BSS{:07}", i)).collect();
    let range = DateRange::from_periods("2000-01-01", "2009-12-31").unwrap();
    c.bench_function("station_date_grid", |b| {
        b.iter(|| station_date_grid(black_box(&codes), range))
    });
}

criterion_group!(benches, bench_assembly);
criterion_main!(benches);
