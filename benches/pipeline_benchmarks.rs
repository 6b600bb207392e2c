use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use serde_json::json;
use sliceview::edit::{Edit, EditAction, MultiEditResolved};
use sliceview::filter::{ColumnFilter, NumberOperator, RowFilter, StringOperator};
use sliceview::*;
use std::sync::Arc;

fn make_view(size: usize) -> ViewWithData {
    let routes: Vec<Route> = ["/cars/brand", "/cars/doors", "/cars/price"]
        .iter()
        .map(|r| Route::from_flat(r).unwrap())
        .collect();
    let selection = ColumnSelection::from_routes(&routes).unwrap();
    let brands = ["VW", "BMW", "Volvo", "Tesla", "Fiat"];
    let rows = (0..size)
        .map(|i| vec![json!(brands[i % brands.len()]), json!(2 + i % 4), json!((i * 37) % 1000)])
        .collect();
    ViewWithData::new(selection, rows).unwrap()
}

fn make_chain(len: usize) -> Arc<MultiEditResolved> {
    let mut head = MultiEditResolved::empty();
    for i in 0..len {
        head = head
            .push(Edit::new(
                format!("edit {i}"),
                RowFilter::and(vec![ColumnFilter::number("doors", NumberOperator::GreaterThan, 2.0)]),
                vec![EditAction::new("price", json!(i))],
            ))
            .unwrap();
    }
    head
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_filter");

    for size in [100, 1000, 10000].iter() {
        let view = make_view(*size);
        let filter = RowFilterProcessor::from_model(&RowFilter::and(vec![
            ColumnFilter::string("brand", StringOperator::StartsWith, "v"),
            ColumnFilter::number("price", NumberOperator::LessThan, 500.0),
        ]));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| filter.apply_to(black_box(&view)).unwrap());
        });
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_sort");

    for size in [100, 1000, 10000].iter() {
        let view = make_view(*size);
        let sort = RowSort::new([("/cars/brand", SortDirection::Asc), ("/cars/price", SortDirection::Desc)]).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| sort.apply_to(black_box(&view)).unwrap());
        });
    }
    group.finish();
}

fn bench_edit_chain_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_chain_cold");
    let master: Arc<dyn View> = Arc::new(make_view(1000));

    for len in [1, 5, 20].iter() {
        let head = make_chain(*len);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                let cache = ViewCache::default();
                ViewEditedMultiple::new(master.clone(), black_box(&head), &cache).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_edit_chain_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_chain_warm");
    let master: Arc<dyn View> = Arc::new(make_view(1000));

    for len in [1, 5, 20].iter() {
        let base = make_chain(*len);
        // Only the newest edit is replayed
        let head = base
            .push(Edit::new(
                "last",
                RowFilter::empty(),
                vec![EditAction::new("doors", json!(5))],
            ))
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter_batched(
                || {
                    let cache = ViewCache::default();
                    ViewEditedMultiple::new(master.clone(), &base, &cache).unwrap();
                    cache
                },
                |cache| ViewEditedMultiple::new(master.clone(), black_box(&head), &cache).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_join_set_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_set_value");
    let route = Route::from_flat("/carCake/baseLayer/baseComp/doors").unwrap();
    let selection = ColumnSelection::from_routes(&[route.clone()]).unwrap();

    for size in [100, 1000].iter() {
        let rows: join::JoinRows = (0..*size)
            .map(|i| (format!("car{i}"), vec![join::JoinColumn::new(route.clone(), json!(i % 5))]))
            .collect();
        let join = Join::new(rows, selection.clone()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut join = join.clone();
                join.set_value(edit::SetValue::new("/carCake/baseLayer/baseComp/doors", json!(3)))
                    .unwrap();
                join.insert().unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_filter,
    bench_sort,
    bench_edit_chain_cold,
    bench_edit_chain_warm,
    bench_join_set_value
);
criterion_main!(benches);
