use strum::IntoEnumIterator;

use crate::{
    file::io::read_le_at,
    metadata::tables::{RowRead, TableId, TableInfo},
    Result,
};

pub use crate::metadata::tables::Row;

/// Extra 4 bytes follow the row counts when this heap flag is set.
const HEAP_EXTRA_DATA: u8 = 0x40;

#[derive(Clone, Copy, Default)]
struct TableLayout {
    offset: usize,
    row_size: usize,
    rows: u32,
}

/// The `#~` (or uncompressed `#-`) table stream (ECMA-335 II.24.2.6).
///
/// Parsing only computes where each table starts; rows are decoded on access.
pub struct TablesHeader<'a> {
    data: &'a [u8],
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    info: TableInfo,
    layouts: [TableLayout; 64],
}

impl<'a> TablesHeader<'a> {
    /// Parse the header of a table stream and locate every table.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the stream lists tables this reader doesn't
    /// know, and [`crate::Error::OutOfBounds`] if the tables don't fit into the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        let mut row_counts = Vec::new();
        for bit in 0..64_u8 {
            if valid & (1_u64 << bit) == 0 {
                continue;
            }

            let Some(table) = TableId::from_repr(bit) else {
                return Err(malformed_error!("Unsupported metadata table - {:#x}", bit));
            };

            row_counts.push((table, read_le_at::<u32>(data, &mut offset)?));
        }

        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            offset += 4;
        }

        let info = TableInfo::new(&row_counts, heap_sizes);
        let mut layouts = [TableLayout::default(); 64];
        for table in TableId::iter() {
            let rows = info.rows(table);
            if rows == 0 {
                continue;
            }

            let row_size = info.row_size(table);
            layouts[table as usize] = TableLayout {
                offset,
                row_size,
                rows,
            };

            offset = row_size
                .checked_mul(rows as usize)
                .and_then(|size| size.checked_add(offset))
                .ok_or_else(|| malformed_error!("Table {} overflows the stream", table))?;
        }

        if offset > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(TablesHeader {
            data,
            major_version,
            minor_version,
            valid,
            sorted,
            info,
            layouts,
        })
    }

    /// Index widths and row counts of this stream.
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.layouts[table as usize].rows
    }

    /// Returns `true` if `table` is marked as sorted.
    #[must_use]
    pub fn is_sorted(&self, table: TableId) -> bool {
        self.sorted & (1_u64 << table as u8) != 0
    }

    /// Access row `rid` (1-based) of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `rid` is 0 or exceeds the row count.
    pub fn row(&self, table: TableId, rid: u32) -> Result<Row<'_>> {
        let layout = &self.layouts[table as usize];
        if rid == 0 || rid > layout.rows {
            return Err(out_of_bounds_error!());
        }

        let start = layout.offset + (rid as usize - 1) * layout.row_size;
        Ok(Row::new(
            rid,
            table,
            &self.data[start..start + layout.row_size],
            &self.info,
        ))
    }

    /// Decode row `rid` of the table of `T`.
    ///
    /// # Errors
    /// Same as [`TablesHeader::row`], plus column decoding failures.
    pub fn get<T: RowRead>(&self, rid: u32) -> Result<T> {
        T::read(&self.row(T::TABLE, rid)?)
    }

    /// Iterate over all rows of the table of `T`, in row order.
    pub fn rows<T: RowRead>(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count(T::TABLE)).map(move |rid| self.get::<T>(rid))
    }
}
