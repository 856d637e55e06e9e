//! Stateless helper utilities used by the XLSX writer and reader.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, SpecSheetHorizontalMerge};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Normalize a cell before write: non-finite numbers and blank text become
/// `None`, numeric text in numeric columns becomes a number.
pub fn convert_cell_value(value: &EnumCellValue, if_is_numeric_col: bool) -> EnumCellValue {
    match value {
        EnumCellValue::None => EnumCellValue::None,
        EnumCellValue::Number(n) if !n.is_finite() => EnumCellValue::None,
        EnumCellValue::Number(n) if if_is_numeric_col => EnumCellValue::Number(*n),
        EnumCellValue::Number(n) => EnumCellValue::String(n.to_string()),
        EnumCellValue::String(s) if s.trim().is_empty() => EnumCellValue::None,
        EnumCellValue::String(s) if if_is_numeric_col => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => EnumCellValue::Number(v),
            Ok(_) => EnumCellValue::None,
            Err(_) => EnumCellValue::String(s.clone()),
        },
        EnumCellValue::String(s) => EnumCellValue::String(s.clone()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameLikeUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Reject tables that do not fit on one worksheet.
pub fn validate_table_extent(n_rows_total: usize, n_cols_total: usize) -> Result<(), String> {
    if n_cols_total == 0 {
        return Err("Table has no columns.".to_string());
    }
    if n_rows_total > N_NROWS_EXCEL_MAX {
        return Err(format!(
            "Table too tall: {n_rows_total} rows exceeds Excel limit {N_NROWS_EXCEL_MAX}."
        ));
    }
    if n_cols_total > N_NCOLS_EXCEL_MAX {
        return Err(format!(
            "Table too wide: {n_cols_total} columns exceeds Excel limit {N_NCOLS_EXCEL_MAX}."
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Suffix `__2`, `__3`, ... until `name` is unused (case-insensitive).
pub fn derive_unique_sheet_name(name: &str, set_names_existing: &BTreeSet<String>) -> String {
    let if_taken = |c_candidate: &str| set_names_existing.contains(&c_candidate.to_lowercase());

    if !if_taken(name) {
        return name.to_string();
    }

    let mut n_idx = 2usize;
    loop {
        let c_suffix = format!("__{n_idx}");
        let n_len_base_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
        let c_base: String = name.chars().take(usize::max(1, n_len_base_max)).collect();
        let c_candidate = format!("{c_base}{c_suffix}");
        if !if_taken(&c_candidate) {
            return c_candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderMergeUtils

/// Plan horizontal merges for repeated non-empty header text per row.
pub fn plan_horizontal_merges(
    header_grid: &[Vec<String>],
) -> BTreeMap<usize, Vec<SpecSheetHorizontalMerge>> {
    let mut dict_horizontal_merges = BTreeMap::new();

    for (n_idx_row, l_row) in header_grid.iter().enumerate() {
        let n_cols = l_row.len();
        let mut n_col_idx = 0;

        while n_col_idx < n_cols {
            let c_cell_val = &l_row[n_col_idx];
            if c_cell_val.is_empty() {
                n_col_idx += 1;
                continue;
            }

            let mut n_col_idx_end = n_col_idx + 1;
            while n_col_idx_end < n_cols && l_row[n_col_idx_end] == *c_cell_val {
                n_col_idx_end += 1;
            }

            if n_col_idx_end - n_col_idx > 1 {
                dict_horizontal_merges
                    .entry(n_idx_row)
                    .or_insert_with(Vec::new)
                    .push(SpecSheetHorizontalMerge {
                        row_idx_start: n_idx_row,
                        col_idx_start: n_col_idx,
                        col_idx_end: n_col_idx_end - 1,
                        text: c_cell_val.clone(),
                    });
            }
            n_col_idx = n_col_idx_end;
        }
    }

    dict_horizontal_merges
}

/// Cells covered by a horizontal merge, anchor excluded.
pub fn derive_horizontal_merge_tracker(
    row_horizontal_merge_mapping: &BTreeMap<usize, Vec<SpecSheetHorizontalMerge>>,
) -> BTreeSet<(usize, usize)> {
    let mut set_merged_cells = BTreeSet::new();

    for (row_idx, horizontal_merges) in row_horizontal_merge_mapping {
        for merge in horizontal_merges {
            for col_idx in (merge.col_idx_start + 1)..=merge.col_idx_end {
                set_merged_cells.insert((*row_idx, col_idx));
            }
        }
    }

    set_merged_cells
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_cell_value_blanks_non_finite() {
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::NAN), true),
            EnumCellValue::None
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::String(" 1.5 ".to_string()), true),
            EnumCellValue::Number(1.5)
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::String("pH".to_string()), false),
            EnumCellValue::String("pH".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::String("  ".to_string()), false),
            EnumCellValue::None
        );
    }

    #[test]
    fn test_validate_unique_columns_reports_duplicates() {
        let l_cols = vec!["TANGGAL".to_string(), "5".to_string(), "5".to_string()];
        let err = validate_unique_columns(&l_cols).expect_err("duplicate");
        assert!(err.contains("\"5\" x2"), "{err}");
        assert!(validate_unique_columns(&l_cols[..2]).is_ok());
    }

    #[test]
    fn test_validate_table_extent() {
        assert!(validate_table_extent(5, 33).is_ok());
        assert!(validate_table_extent(5, 0).is_err());
        assert!(validate_table_extent(N_NROWS_EXCEL_MAX + 1, 2).is_err());
        assert!(validate_table_extent(2, N_NCOLS_EXCEL_MAX + 1).is_err());
    }

    #[test]
    fn test_sanitize_and_unique_sheet_names() {
        assert_eq!(sanitize_sheet_name("Drain A / 2024:01", "_"), "Drain A _ 2024_01");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");

        let mut set_existing = BTreeSet::new();
        set_existing.insert("drain a - 2024-01".to_string());
        assert_eq!(
            derive_unique_sheet_name("Drain A - 2024-01", &set_existing),
            "Drain A - 2024-01__2"
        );
        assert_eq!(
            derive_unique_sheet_name("Drain B - 2024-01", &set_existing),
            "Drain B - 2024-01"
        );
    }

    #[test]
    fn test_plan_horizontal_merges_on_repeated_title() {
        let grid = vec![
            vec!["Title".to_string(); 4],
            vec!["TANGGAL".to_string(), "5".to_string(), "6".to_string(), "".to_string()],
        ];
        let dict_merges = plan_horizontal_merges(&grid);

        assert_eq!(dict_merges.len(), 1);
        assert_eq!(
            dict_merges[&0],
            vec![SpecSheetHorizontalMerge {
                row_idx_start: 0,
                col_idx_start: 0,
                col_idx_end: 3,
                text: "Title".to_string(),
            }]
        );

        let set_covered = derive_horizontal_merge_tracker(&dict_merges);
        assert_eq!(
            set_covered.into_iter().collect::<Vec<_>>(),
            vec![(0, 1), (0, 2), (0, 3)]
        );
    }
}
