use crag_etl::models::ExtractedTable;
use crag_etl::processors::{split_grade, Cleaner, Transformer};
use crag_etl::readers::CragReader;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

const GRADES: [&str; 5] = ["HVD 4a", "VS 4b", "E1 5b", "F7a", "Summit"];
const TYPES: [&str; 4] = ["Trad", "Sport", "Bouldering", "Deep Water Solo"];

// Synthetic catalogue: crags × sectors × routes
fn create_test_catalogue(crag_count: usize, sectors: usize, routes: usize) -> ExtractedTable {
    let crags: Vec<Value> = (0..crag_count)
        .map(|c| {
            let sector_list: Vec<Value> = (0..sectors)
                .map(|s| {
                    let route_list: Vec<Value> = (0..routes)
                        .map(|r| {
                            json!({
                                "name": format!("Route {}-{}-{}", c, s, r),
                                "type": TYPES[r % TYPES.len()],
                                "grade": GRADES[r % GRADES.len()],
                                "stars": (r % 4).to_string(),
                            })
                        })
                        .collect();
                    json!({ "sector_name": format!("Sector {}", s), "routes": route_list })
                })
                .collect();

            json!({
                "id": c,
                "name": format!("Crag {}", c),
                "county": "Derbyshire",
                "country": "England",
                "rocktype": if c % 7 == 0 { "Mudstone" } else { "Gritstone" },
                "latitude": 53.0 + (c as f64) * 0.001,
                "longitude": if c % 50 == 0 { 0.0 } else { -1.5 - (c as f64) * 0.001 },
                "routes": { "sectors": sector_list },
            })
        })
        .collect();

    CragReader::new()
        .read_str(&Value::Array(crags).to_string())
        .expect("synthetic catalogue is valid")
}

fn benchmark_transformer(c: &mut Criterion) {
    let extracted = create_test_catalogue(100, 4, 10);

    c.bench_function("transform", |b| {
        b.iter(|| {
            let table = Transformer::new().transform(&extracted).unwrap();
            black_box(table.len())
        })
    });
}

fn benchmark_cleaner(c: &mut Criterion) {
    let extracted = create_test_catalogue(100, 4, 10);
    let transformed = Transformer::new().transform(&extracted).unwrap();

    c.bench_function("clean", |b| {
        b.iter(|| {
            let table = Cleaner::new().clean(&transformed).unwrap();
            black_box(table.len())
        })
    });
}

fn benchmark_grade_split(c: &mut Criterion) {
    c.bench_function("split_grade", |b| {
        b.iter(|| {
            let mut safety = 0;
            for grade in GRADES {
                if split_grade(Some(grade)).1.is_some() {
                    safety += 1;
                }
            }
            black_box(safety)
        })
    });
}

fn benchmark_varying_catalogue_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_and_clean_by_size");

    for &size in &[10, 100, 500, 1000] {
        let extracted = create_test_catalogue(size, 3, 8);
        group.bench_with_input(BenchmarkId::new("crags", size), &extracted, |b, extracted| {
            b.iter(|| {
                let transformed = Transformer::new().transform(extracted).unwrap();
                let cleaned = Cleaner::new().clean(&transformed).unwrap();
                black_box(cleaned.len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_transformer,
    benchmark_cleaner,
    benchmark_grade_split,
    benchmark_varying_catalogue_sizes
);
criterion_main!(benches);
