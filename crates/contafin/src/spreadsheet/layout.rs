use rust_xlsxwriter::{
    Color, ColNum, Format, FormatAlign, FormatBorder, RowNum, Worksheet, XlsxError,
    utility::row_col_to_cell,
};

pub(super) const HEADER_BLUE: u32 = 0x0066CC;
pub(super) const BAND_BLUE: u32 = 0x4472C4;
pub(super) const INCOME_GREEN: u32 = 0xC6EFCE;
pub(super) const EXPENSE_RED: u32 = 0xFFC7CE;
pub(super) const SUBTOTAL_GRAY: u32 = 0xD9D9D9;
pub(super) const RESULT_YELLOW: u32 = 0xFFFF00;
pub(super) const FORMULA_BLUE: u32 = 0xE6F2FF;

pub(super) const NUMBER: &str = "#,##0.00";
pub(super) const SIGNED_NUMBER: &str = "#,##0.00_);(#,##0.00)";

/// Formats shared by every template.
pub(super) struct Styles {
    pub header: Format,
    pub subtitle: Format,
    pub band: Format,
    pub band_label: Format,
    pub band_fill: Format,
    pub cell: Format,
    pub number: Format,
    pub signed: Format,
    pub formula: Format,
    pub bold: Format,
    pub plain: Format,
}

impl Styles {
    pub fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_BLUE))
                .set_border(FormatBorder::Thin),
            subtitle: Format::new().set_bold().set_align(FormatAlign::Center),
            band: banded().set_align(FormatAlign::Center),
            band_label: banded(),
            band_fill: Format::new()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(BAND_BLUE)),
            cell: Format::new().set_border(FormatBorder::Thin),
            number: Format::new()
                .set_border(FormatBorder::Thin)
                .set_num_format(NUMBER),
            signed: Format::new()
                .set_border(FormatBorder::Thin)
                .set_num_format(SIGNED_NUMBER),
            formula: computed(NUMBER),
            bold: Format::new().set_bold(),
            plain: Format::new(),
        }
    }
}

fn banded() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(BAND_BLUE))
}

/// Light-blue bordered cell used for computed values.
pub(super) fn computed(num_format: &str) -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_num_format(num_format)
        .set_background_color(Color::RGB(FORMULA_BLUE))
}

/// Bold label on a solid background.
pub(super) fn label(background: u32) -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(background))
}

/// Bold bordered total on a solid background.
pub(super) fn total(background: u32) -> Format {
    Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_num_format(NUMBER)
        .set_background_color(Color::RGB(background))
}

pub(super) fn fill(background: u32) -> Format {
    Format::new().set_background_color(Color::RGB(background))
}

/// A1-style reference, e.g. `(4, 1)` is `B5`.
pub(super) fn cell(row: RowNum, col: ColNum) -> String {
    row_col_to_cell(row, col)
}

pub(super) fn span(first_row: RowNum, last_row: RowNum, col: ColNum) -> String {
    format!("{}:{}", cell(first_row, col), cell(last_row, col))
}

pub(super) fn write_title(
    worksheet: &mut Worksheet,
    styles: &Styles,
    last_col: ColNum,
    title: &str,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.merge_range(0, 0, 0, last_col, title, &styles.header)?;
    worksheet.merge_range(1, 0, 1, last_col, subtitle, &styles.subtitle)?;
    Ok(())
}

/// Full-width section band.
pub(super) fn write_band(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    last_col: ColNum,
    text: &str,
) -> Result<(), XlsxError> {
    worksheet.merge_range(row, 0, row, last_col, text, &styles.band)?;
    Ok(())
}

pub(super) fn write_headers(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    headers: &[&str],
) -> Result<(), XlsxError> {
    for (col, header) in (0..).zip(headers) {
        worksheet.write_string_with_format(row, col, *header, &styles.header)?;
    }
    Ok(())
}

/// Writes the `INSTRUCCIONES:` block starting at `row` and returns the row
/// after the last line.
pub(super) fn write_instructions(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    last_col: ColNum,
    lines: &[String],
) -> Result<RowNum, XlsxError> {
    worksheet.merge_range(row, 0, row, last_col, "INSTRUCCIONES:", &styles.bold)?;
    let mut row = row + 1;
    for line in lines {
        worksheet.merge_range(row, 0, row, last_col, line, &styles.plain)?;
        row += 1;
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_one_based_a1() {
        assert_eq!(cell(0, 0), "A1");
        assert_eq!(cell(4, 1), "B5");
        assert_eq!(cell(10, 11), "L11");
        assert_eq!(span(5, 9, 2), "C6:C10");
    }
}
