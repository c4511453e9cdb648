/// Arrow projection of the tracker sheet.
pub mod dar {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt32Array};
    use arrow::compute::cast;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    use crate::row::FlattenedRow;
    use crate::sheet::{SheetError, SheetRow};

    /// Column names, in sheet order.
    pub const COLUMNS: [&str; 12] = [
        "audit_group_number",
        "gstin",
        "trade_name",
        "category",
        "total_amount_detected_overall_rs",
        "total_amount_recovered_overall_rs",
        "audit_para_number",
        "audit_para_heading",
        "revenue_involved_lakhs_rs",
        "revenue_recovered_lakhs_rs",
        "dar_pdf_url",
        "created_at",
    ];

    /// Schema for one tracker-sheet row.
    pub fn sheet_row_schema() -> Schema {
        Schema::new(vec![
            Field::new(COLUMNS[0], DataType::UInt32, true),
            Field::new(COLUMNS[1], DataType::Utf8, true),
            Field::new(COLUMNS[2], DataType::Utf8, true),
            Field::new(COLUMNS[3], DataType::Utf8, true),
            Field::new(COLUMNS[4], DataType::Float64, true),
            Field::new(COLUMNS[5], DataType::Float64, true),
            Field::new(COLUMNS[6], DataType::UInt32, true),
            Field::new(COLUMNS[7], DataType::Utf8, true),
            Field::new(COLUMNS[8], DataType::Float64, true),
            Field::new(COLUMNS[9], DataType::Float64, true),
            Field::new(COLUMNS[10], DataType::Utf8, false),
            Field::new(COLUMNS[11], DataType::Utf8, false),
        ])
    }

    /// Build a RecordBatch from sheet rows.
    pub fn rows_to_batch(rows: &[SheetRow]) -> Result<RecordBatch, SheetError> {
        let u32s = |f: fn(&FlattenedRow) -> Option<u32>| -> ArrayRef {
            Arc::new(rows.iter().map(|r| f(&r.row)).collect::<UInt32Array>())
        };
        let f64s = |f: fn(&FlattenedRow) -> Option<f64>| -> ArrayRef {
            Arc::new(rows.iter().map(|r| f(&r.row)).collect::<Float64Array>())
        };
        let strs = |f: fn(&FlattenedRow) -> Option<&str>| -> ArrayRef {
            Arc::new(rows.iter().map(|r| f(&r.row)).collect::<StringArray>())
        };

        let columns: Vec<ArrayRef> = vec![
            u32s(|r| r.audit_group_number),
            strs(|r| r.gstin.as_deref()),
            strs(|r| r.trade_name.as_deref()),
            strs(|r| r.category.as_deref()),
            f64s(|r| r.total_amount_detected_overall_rs),
            f64s(|r| r.total_amount_recovered_overall_rs),
            u32s(|r| r.audit_para_number),
            strs(|r| r.audit_para_heading.as_deref()),
            f64s(|r| r.revenue_involved_lakhs_rs),
            f64s(|r| r.revenue_recovered_lakhs_rs),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.dar_pdf_url.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.created_at.as_str()),
            )),
        ];

        Ok(RecordBatch::try_new(Arc::new(sheet_row_schema()), columns)?)
    }

    /// Read sheet rows back out of a RecordBatch.
    ///
    /// Columns are looked up by name and cast to the expected types, so
    /// batches from DuckDB (`INTEGER`, `LargeUtf8`, ...) are accepted too.
    pub fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<SheetRow>, SheetError> {
        let column = |i: usize, ty: &DataType| -> Result<ArrayRef, SheetError> {
            let col = batch
                .column_by_name(COLUMNS[i])
                .ok_or(SheetError::MissingColumn(COLUMNS[i]))?;
            Ok(cast(col, ty)?)
        };
        let as_u32 = |a: &ArrayRef| a.as_any().downcast_ref::<UInt32Array>().cloned();
        let as_f64 = |a: &ArrayRef| a.as_any().downcast_ref::<Float64Array>().cloned();
        let as_str = |a: &ArrayRef| a.as_any().downcast_ref::<StringArray>().cloned();

        let schema = sheet_row_schema();
        let mut u32_cols = Vec::new();
        let mut f64_cols = Vec::new();
        let mut str_cols = Vec::new();
        for (i, name) in COLUMNS.into_iter().enumerate() {
            match schema.field(i).data_type() {
                DataType::UInt32 => u32_cols.push(
                    as_u32(&column(i, &DataType::UInt32)?).ok_or(SheetError::MissingColumn(name))?,
                ),
                DataType::Float64 => f64_cols.push(
                    as_f64(&column(i, &DataType::Float64)?)
                        .ok_or(SheetError::MissingColumn(name))?,
                ),
                _ => str_cols.push(
                    as_str(&column(i, &DataType::Utf8)?).ok_or(SheetError::MissingColumn(name))?,
                ),
            }
        }

        // u32: group, para. f64: 4 amounts. str: gstin, name, category, heading, url, created.
        let int = |c: &UInt32Array, i: usize| (!c.is_null(i)).then(|| c.value(i));
        let num = |c: &Float64Array, i: usize| (!c.is_null(i)).then(|| c.value(i));
        let text = |c: &StringArray, i: usize| (!c.is_null(i)).then(|| c.value(i).to_string());

        let rows = (0..batch.num_rows())
            .map(|i| SheetRow {
                row: FlattenedRow {
                    audit_group_number: int(&u32_cols[0], i),
                    gstin: text(&str_cols[0], i),
                    trade_name: text(&str_cols[1], i),
                    category: text(&str_cols[2], i),
                    total_amount_detected_overall_rs: num(&f64_cols[0], i),
                    total_amount_recovered_overall_rs: num(&f64_cols[1], i),
                    audit_para_number: int(&u32_cols[1], i),
                    audit_para_heading: text(&str_cols[3], i),
                    revenue_involved_lakhs_rs: num(&f64_cols[2], i),
                    revenue_recovered_lakhs_rs: num(&f64_cols[3], i),
                },
                dar_pdf_url: text(&str_cols[4], i).unwrap_or_default(),
                created_at: text(&str_cols[5], i).unwrap_or_default(),
            })
            .collect();
        Ok(rows)
    }
}
