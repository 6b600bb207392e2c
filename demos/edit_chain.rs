/// Edit Chain Example
///
/// This example demonstrates:
/// - Building a master view from raw rows
/// - Chaining edits and replaying them through a shared cache
/// - Projecting, filtering and sorting the edited result

use serde_json::json;
use sliceview::edit::{Edit, EditAction, MultiEditResolved};
use sliceview::filter::{ColumnFilter, NumberOperator, RowFilter, StringOperator};
use sliceview::{
    ColumnSelection, Route, RowSort, SortDirection, View, ViewCache, ViewEditedMultiple, ViewFiltered, ViewSelected,
    ViewSorted, ViewWithData,
};
use std::sync::Arc;

fn print_view(view: &dyn View) {
    println!("   {}", view.column_selection().aliases().join(" | "));
    for row in view.rows().iter() {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        println!("   {}", cells.join(" | "));
    }
    println!("   hash: {}\n", view.hash());
}

fn main() -> sliceview::Result<()> {
    env_logger::init();
    println!("=== SliceView Edit Chain Example ===\n");

    // 1. Master view
    println!("1. Creating master view...");
    let routes = vec![
        Route::from_flat("/carCake/carGeneralLayer/carGeneral/brand")?,
        Route::from_flat("/carCake/carGeneralLayer/carGeneral/doors")?,
        Route::from_flat("/carCake/carGeneralLayer/carGeneral/price")?,
    ];
    let selection = ColumnSelection::from_routes(&routes)?;
    let master: Arc<dyn View> = Arc::new(ViewWithData::new(
        selection,
        vec![
            vec![json!("VW"), json!(4), json!(25000)],
            vec![json!("BMW"), json!(2), json!(48000)],
            vec![json!("Volvo"), json!(5), json!(39000)],
            vec![json!("Fiat"), json!(3), json!(14000)],
        ],
    )?);
    print_view(master.as_ref());

    // 2. Edit chain
    println!("2. Chaining two edits...");
    let discount = Edit::new(
        "discount expensive cars",
        RowFilter::and(vec![ColumnFilter::number("price", NumberOperator::GreaterThan, 30000.0)]),
        vec![EditAction::new("price", json!(30000))],
    );
    let more_doors = Edit::new(
        "four doors for v-brands",
        RowFilter::and(vec![ColumnFilter::string("brand", StringOperator::StartsWith, "v")]),
        vec![EditAction::new("doors", json!(4))],
    );
    let head = MultiEditResolved::empty().push(discount)?.push(more_doors)?;

    let cache = ViewCache::default();
    let edited = ViewEditedMultiple::new(master.clone(), &head, &cache)?;
    println!("   replayed {} edits", edited.edits_applied());
    print_view(&edited);

    // 3. Replay from cache
    println!("3. Replaying the same chain...");
    let again = ViewEditedMultiple::new(master.clone(), &head, &cache)?;
    println!("   replayed {} edits, {} views cached\n", again.edits_applied(), cache.len());

    // 4. Select, filter, sort
    println!("4. Projecting brand and price, cheapest first...");
    let selected = ViewSelected::new(&edited, ColumnSelection::from_routes(&[routes[0].clone(), routes[2].clone()])?)?;
    let filtered = ViewFiltered::from_model(
        &selected,
        &RowFilter::and(vec![ColumnFilter::string("brand", StringOperator::NotEquals, "fiat")]),
    )?;
    let sorted = ViewSorted::new(&filtered, &RowSort::new([(routes[2].flat(), SortDirection::Asc)])?)?;
    print_view(&sorted);

    println!("=== Example Complete ===");
    Ok(())
}
