use crate::{FieldType, Table};
use anyhow::Result;
use std::path::Path;

/// Creates a fresh table under `dir`.
pub fn new_table(dir: &Path, name: &str) -> Result<Table> {
    let table = Table::new(&dir.join(name))?;
    table.create()?;
    Ok(table)
}

/// The single-integer-key table the simple scenarios run on.
pub fn simple_table(dir: &Path) -> Result<Table> {
    let mut table = new_table(dir, "simple")?;
    table.add_field("MY_ONLY_FIELD", FieldType::Integer, true, true, "")?;
    Ok(table)
}

/// Inserts `count` rows with values 1..=count (negated when asked).
pub fn fill_simple(table: &mut Table, count: i64, negative: bool) -> Result<()> {
    for i in 1..=count {
        table.insert_record();
        table
            .field_mut("MY_ONLY_FIELD")?
            .set_integer(if negative { -i } else { i });
        table.post_record()?;
    }
    Ok(())
}

/// Collects MY_ONLY_FIELD over a full forward walk.
pub fn collect_ints(table: &mut Table) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    table.first_record("")?;
    while !table.eof() {
        out.push(table.field("MY_ONLY_FIELD")?.integer_value()?);
        table.next_record("")?;
    }
    Ok(out)
}
