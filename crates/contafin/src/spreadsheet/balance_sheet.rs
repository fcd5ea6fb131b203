use rust_xlsxwriter::{Format, FormatBorder, RowNum, Worksheet, XlsxError};

use super::layout::{
    EXPENSE_RED, INCOME_GREEN, SUBTOTAL_GRAY, Styles, cell, fill, label, span, total,
    write_band, write_instructions, write_title,
};

const LAST_COL: u16 = 2;

const CURRENT_ASSETS: [&str; 5] = [
    "Efectivo y Equivalentes",
    "Inversiones Temporales",
    "Cuentas por Cobrar",
    "Inventarios",
    "Gastos Pagados por Anticipado",
];
const FIXED_ASSETS: [&str; 5] = [
    "Propiedad, Planta y Equipo",
    "Depreciación Acumulada",
    "Intangibles",
    "Inversiones a Largo Plazo",
    "Otros Activos",
];
const CURRENT_LIABILITIES: [&str; 5] = [
    "Cuentas por Pagar",
    "Obligaciones Financieras CP",
    "Impuestos por Pagar",
    "Obligaciones Laborales",
    "Anticipos de Clientes",
];
const LONG_TERM_LIABILITIES: [&str; 3] = [
    "Obligaciones Financieras LP",
    "Pasivos Estimados",
    "Otros Pasivos LP",
];
const EQUITY: [&str; 4] = [
    "Capital Social",
    "Reservas",
    "Utilidades Retenidas",
    "Utilidad del Ejercicio",
];

/// Balance sheet with the accounting equation check at the bottom.
pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 40)?;
    worksheet.set_column_width(1, 18)?;
    worksheet.set_column_width(2, 18)?;
    write_title(worksheet, styles, LAST_COL, "BALANCE GENERAL", subtitle)?;

    let mut row: RowNum = 3;
    write_band(worksheet, styles, row, LAST_COL, "ACTIVOS")?;
    let current_assets = write_group(
        worksheet,
        styles,
        row + 1,
        "ACTIVOS CORRIENTES",
        "Total Activos Corrientes",
        &CURRENT_ASSETS,
    )?;
    let fixed_assets = write_group(
        worksheet,
        styles,
        current_assets + 2,
        "ACTIVOS NO CORRIENTES",
        "Total Activos No Corrientes",
        &FIXED_ASSETS,
    )?;
    row = fixed_assets + 2;
    let total_assets = row;
    write_grand_total(
        worksheet,
        styles,
        row,
        "TOTAL ACTIVOS",
        &format!("={}+{}", cell(current_assets, 1), cell(fixed_assets, 1)),
        &total(INCOME_GREEN),
    )?;

    row += 2;
    write_band(worksheet, styles, row, LAST_COL, "PASIVOS")?;
    let current_liabilities = write_group(
        worksheet,
        styles,
        row + 1,
        "PASIVOS CORRIENTES",
        "Total Pasivos Corrientes",
        &CURRENT_LIABILITIES,
    )?;
    let long_term_liabilities = write_group(
        worksheet,
        styles,
        current_liabilities + 2,
        "PASIVOS NO CORRIENTES",
        "Total Pasivos No Corrientes",
        &LONG_TERM_LIABILITIES,
    )?;
    row = long_term_liabilities + 2;
    let total_liabilities = row;
    write_grand_total(
        worksheet,
        styles,
        row,
        "TOTAL PASIVOS",
        &format!(
            "={}+{}",
            cell(current_liabilities, 1),
            cell(long_term_liabilities, 1)
        ),
        &total(EXPENSE_RED),
    )?;

    row += 2;
    write_band(worksheet, styles, row, LAST_COL, "PATRIMONIO")?;
    let equity_first = row + 1;
    write_accounts(worksheet, styles, equity_first, &EQUITY)?;
    let equity_total = equity_first + EQUITY.len() as RowNum;
    worksheet.write_string_with_format(equity_total, 0, "TOTAL PATRIMONIO", &styles.bold)?;
    let equity_sum = format!("=SUM({})", span(equity_first, equity_total - 1, 1));
    worksheet.write_formula_with_format(equity_total, 1, equity_sum.as_str(), &styles.formula)?;
    worksheet.write_blank(equity_total, 2, &styles.cell)?;

    row = equity_total + 2;
    let liabilities_and_equity = row;
    write_grand_total(
        worksheet,
        styles,
        row,
        "TOTAL PASIVO + PATRIMONIO",
        &format!(
            "={}+{}",
            cell(total_liabilities, 1),
            cell(equity_total, 1)
        ),
        &total(INCOME_GREEN),
    )?;

    row += 2;
    let check = format!(
        "=IF({}={},\"CORRECTO\",\"ERROR\")",
        cell(total_assets, 1),
        cell(liabilities_and_equity, 1)
    );
    let check_format = Format::new().set_bold().set_border(FormatBorder::Thin);
    worksheet.write_string_with_format(row, 0, "VERIFICACIÓN ECUACIÓN CONTABLE", &styles.bold)?;
    worksheet.write_formula_with_format(row, 1, check.as_str(), &check_format)?;

    let instructions = [
        "1. Complete los valores de cada cuenta en la columna B.".to_string(),
        "2. La columna C puede utilizarse para notas o detalles adicionales.".to_string(),
        "3. Los totales y subtotales se calculan automáticamente.".to_string(),
        "4. Verifique que la ecuación contable (Activo = Pasivo + Patrimonio) esté balanceada."
            .to_string(),
        "5. Actualice la fecha del balance en la celda A2.".to_string(),
        "6. Este balance es una plantilla básica, personalice según las necesidades de su empresa."
            .to_string(),
    ];
    write_instructions(worksheet, styles, row + 3, LAST_COL, &instructions)?;
    Ok(())
}

/// Gray group heading, one input row per account and a subtotal. Returns the
/// subtotal row.
fn write_group(
    worksheet: &mut Worksheet,
    styles: &Styles,
    heading_row: RowNum,
    heading: &str,
    subtotal: &str,
    accounts: &[&str],
) -> Result<RowNum, XlsxError> {
    worksheet.write_string_with_format(heading_row, 0, heading, &label(SUBTOTAL_GRAY))?;
    worksheet.merge_range(heading_row, 1, heading_row, 2, "", &fill(SUBTOTAL_GRAY))?;

    let first = heading_row + 1;
    write_accounts(worksheet, styles, first, accounts)?;
    let subtotal_row = first + accounts.len() as RowNum;

    worksheet.write_string_with_format(subtotal_row, 0, subtotal, &styles.bold)?;
    let sum = format!("=SUM({})", span(first, subtotal_row - 1, 1));
    worksheet.write_formula_with_format(subtotal_row, 1, sum.as_str(), &styles.formula)?;
    worksheet.write_blank(subtotal_row, 2, &styles.cell)?;
    Ok(subtotal_row)
}

fn write_accounts(
    worksheet: &mut Worksheet,
    styles: &Styles,
    first: RowNum,
    accounts: &[&str],
) -> Result<(), XlsxError> {
    for (row, account) in (first..).zip(accounts) {
        // Accumulated depreciation is entered as a negative amount.
        let amount_format = if *account == "Depreciación Acumulada" {
            &styles.signed
        } else {
            &styles.number
        };
        worksheet.write_string_with_format(row, 0, *account, &styles.cell)?;
        worksheet.write_number_with_format(row, 1, 0, amount_format)?;
        worksheet.write_blank(row, 2, &styles.cell)?;
    }
    Ok(())
}

fn write_grand_total(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    text: &str,
    formula: &str,
    format: &Format,
) -> Result<(), XlsxError> {
    worksheet.write_string_with_format(row, 0, text, &styles.band_label)?;
    worksheet.write_formula_with_format(row, 1, formula, format)?;
    Ok(())
}
