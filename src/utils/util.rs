use std::fmt::Display;

use comfy_table::Cell;

use crate::container::hash::HashTableStats;

const TABLE_PRESET: &str = "||--+-++|    ++++++";

/// One row per value found under `key`.
pub fn pretty_format_values<K: Display, V: Display>(key: &K, values: &[V]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(TABLE_PRESET);
    table.set_header(vec![Cell::new("key"), Cell::new("value")]);
    for value in values {
        table.add_row(vec![Cell::new(format!("{key}")), Cell::new(format!("{value}"))]);
    }
    table
}

pub fn pretty_format_stats(name: &str, stats: &HashTableStats) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(TABLE_PRESET);
    table.set_header(vec![
        Cell::new("table"),
        Cell::new("capacity"),
        Cell::new("blocks"),
        Cell::new("live"),
        Cell::new("tombstones"),
        Cell::new("load"),
    ]);
    let load = if stats.capacity == 0 {
        0.0
    } else {
        (stats.live + stats.tombstones) as f64 / stats.capacity as f64
    };
    table.add_row(vec![
        Cell::new(name),
        Cell::new(stats.capacity),
        Cell::new(stats.num_blocks),
        Cell::new(stats.live),
        Cell::new(stats.tombstones),
        Cell::new(format!("{:.2}", load)),
    ]);
    table
}
