use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{columns, CodedIndexType, ColumnKind, TableId};

const HEAP_LARGE_STRINGS: u8 = 0x01;
const HEAP_LARGE_GUID: u8 = 0x02;
const HEAP_LARGE_BLOB: u8 = 0x04;

/// Row counts and index widths of one `#~` stream.
///
/// Every simple index, heap index and coded index is 2 bytes wide unless the referenced
/// table or heap is too large to be addressed that way (ECMA-335 II.24.2.6).
#[derive(Clone, Debug)]
pub struct TableInfo {
    rows: [u32; 64],
    coded_index_sizes: [usize; CodedIndexType::COUNT],
    heap_sizes: u8,
}

impl TableInfo {
    /// Build the info from the row count of every present table and the `HeapSizes` flags.
    #[must_use]
    pub fn new(row_counts: &[(TableId, u32)], heap_sizes: u8) -> TableInfo {
        let mut rows = [0_u32; 64];
        for (table, count) in row_counts {
            rows[*table as usize] = *count;
        }

        let mut info = TableInfo {
            rows,
            coded_index_sizes: [2; CodedIndexType::COUNT],
            heap_sizes,
        };

        for kind in CodedIndexType::iter() {
            let max_rows = kind
                .tables()
                .iter()
                .flatten()
                .map(|table| info.rows(*table))
                .max()
                .unwrap_or(0);

            if u64::from(max_rows) >= 1_u64 << (16 - kind.tag_bits()) {
                info.coded_index_sizes[kind as usize] = 4;
            }
        }

        info
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// Returns `true` if indexes into `table` take 4 bytes.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows(table) > u32::from(u16::MAX)
    }

    /// Returns `true` if `#Strings` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_STRINGS != 0
    }

    /// Returns `true` if `#GUID` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_GUID != 0
    }

    /// Returns `true` if `#Blob` indexes take 4 bytes.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_BLOB != 0
    }

    /// Byte width of a coded index of `kind`.
    #[must_use]
    pub fn coded_index_size(&self, kind: CodedIndexType) -> usize {
        self.coded_index_sizes[kind as usize]
    }

    /// Byte width of a column.
    #[must_use]
    pub fn column_size(&self, column: ColumnKind) -> usize {
        let wide = |large: bool| if large { 4 } else { 2 };
        match column {
            ColumnKind::U8 => 1,
            ColumnKind::U16 => 2,
            ColumnKind::U32 => 4,
            ColumnKind::String => wide(self.is_large_str()),
            ColumnKind::Guid => wide(self.is_large_guid()),
            ColumnKind::Blob => wide(self.is_large_blob()),
            ColumnKind::Index(table) => wide(self.is_large(table)),
            ColumnKind::Coded(kind) => self.coded_index_size(kind),
        }
    }

    /// Byte width of one row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        columns(table)
            .iter()
            .map(|column| self.column_size(*column))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_indexes() {
        let info = TableInfo::new(&[(TableId::TypeDef, 10), (TableId::MethodDef, 20)], 0);

        assert_eq!(info.rows(TableId::TypeDef), 10);
        assert_eq!(info.rows(TableId::Field), 0);
        assert_eq!(info.row_size(TableId::TypeDef), 14);
        assert_eq!(info.row_size(TableId::MethodDef), 14);
        assert_eq!(info.row_size(TableId::CustomAttribute), 6);
        assert_eq!(info.row_size(TableId::Module), 10);
    }

    #[test]
    fn large_heaps() {
        let info = TableInfo::new(&[], HEAP_LARGE_STRINGS | HEAP_LARGE_BLOB | HEAP_LARGE_GUID);

        assert_eq!(info.row_size(TableId::Module), 2 + 4 + 4 * 3);
        assert_eq!(info.row_size(TableId::TypeRef), 2 + 4 + 4);
        assert_eq!(info.row_size(TableId::Field), 2 + 4 + 4);
    }

    #[test]
    fn coded_index_threshold() {
        // TypeDefOrRef has 2 tag bits, leaving 14 bits for the row
        let info = TableInfo::new(&[(TableId::TypeRef, (1 << 14) - 1)], 0);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 2);

        let info = TableInfo::new(&[(TableId::TypeSpec, 1 << 14)], 0);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 4);
        assert_eq!(info.coded_index_size(CodedIndexType::MethodDefOrRef), 2);
        assert_eq!(info.row_size(TableId::TypeDef), 4 + 2 + 2 + 4 + 2 + 2);

        // HasCustomAttribute has 5 tag bits
        let info = TableInfo::new(&[(TableId::Param, 1 << 11)], 0);
        assert_eq!(info.coded_index_size(CodedIndexType::HasCustomAttribute), 4);
        assert_eq!(info.coded_index_size(CodedIndexType::HasFieldMarshal), 2);
    }

    #[test]
    fn large_tables() {
        let info = TableInfo::new(&[(TableId::Field, 0x1_0000)], 0);

        assert!(info.is_large(TableId::Field));
        assert!(!info.is_large(TableId::MethodDef));
        assert_eq!(info.row_size(TableId::TypeDef), 4 + 2 + 2 + 2 + 4 + 2);
    }
}
