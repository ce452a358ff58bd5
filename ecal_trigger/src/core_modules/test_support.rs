use crate::core_modules::module::{Module, ModuleTable, Point, SizeClass};

/// `columns x rows` tiles on a square pitch equal to the tile size, ids row-major from 0.
pub(crate) fn uniform_grid(columns: u32, rows: u32, class: SizeClass) -> ModuleTable {
    let pitch = class.side();
    (0..rows)
        .flat_map(|row| {
            (0..columns).map(move |col| {
                Module::new(
                    row * columns + col,
                    Point::new(col as f64 * pitch, row as f64 * pitch),
                    class,
                )
            })
        })
        .collect()
}
