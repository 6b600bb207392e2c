/// Join Insert Example
///
/// This example demonstrates:
/// - Building a join of slices across two layers of one cake
/// - Filtering the join and staging a value
/// - Serializing the staged values into insert commands

use serde_json::json;
use sliceview::edit::SetValue;
use sliceview::filter::{ColumnFilter, RowFilter, StringOperator};
use sliceview::join::{JoinColumn, JoinRows};
use sliceview::{ColumnSelection, Join, Route};

fn main() -> sliceview::Result<()> {
    env_logger::init();
    println!("=== SliceView Join Insert Example ===\n");

    // 1. Slice rows
    println!("1. Creating join...");
    let brand = Route::from_flat("/carCake/carGeneralLayer/carGeneral/brand")?;
    let doors = Route::from_flat("/carCake/carGeneralLayer/carGeneral/doors")?;
    let color = Route::from_flat("/carCake/carPaintLayer/carPaint/color")?;
    let selection = ColumnSelection::from_routes(&[brand.clone(), doors.clone(), color.clone()])?;

    let mut rows = JoinRows::new();
    for (slice, b, d, c) in [("car1", "VW", 4, "red"), ("car2", "BMW", 2, "blue"), ("car3", "Volvo", 5, "red")] {
        rows.insert(
            slice.to_string(),
            vec![
                JoinColumn::new(brand.clone(), json!(b)),
                JoinColumn::new(doors.clone(), json!(d)),
                JoinColumn::new(color.clone(), json!(c)),
            ],
        );
    }
    let mut join = Join::new(rows, selection)?;
    println!("   cake: {}", join.cake_route()?);
    for layer in join.layer_routes() {
        println!("   layer: {}", layer);
    }
    println!();

    // 2. Filter and stage
    println!("2. Repainting red cars...");
    join.filter(&RowFilter::and(vec![ColumnFilter::string(color.flat(), StringOperator::Equals, "red")]))?
        .set_value(SetValue::new(color.flat(), json!("green")))?;
    for (slice, row) in join.slice_ids().iter().zip(join.rows()) {
        println!("   {}: {}", slice, serde_json::Value::from(row));
    }
    println!("   {} steps in the process log\n", join.processes().len());

    // 3. Insert commands
    println!("3. Insert commands:");
    for command in join.insert()? {
        println!("{}", serde_json::to_string_pretty(&command)?);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
