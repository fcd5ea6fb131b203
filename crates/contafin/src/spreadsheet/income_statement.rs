use rust_xlsxwriter::{Format, RowNum, Worksheet, XlsxError};

use super::layout::{
    INCOME_GREEN, RESULT_YELLOW, Styles, cell, fill, label, span, total, write_instructions,
    write_title,
};

const LAST_COL: u16 = 2;

const REVENUE: [&str; 3] = [
    "Ventas Brutas",
    "Devoluciones en Ventas",
    "Descuentos Comerciales",
];
const COST_OF_SALES: [&str; 4] = [
    "Inventario Inicial",
    "Compras",
    "Fletes en Compras",
    "Inventario Final",
];
const ADMIN_EXPENSES: [&str; 8] = [
    "Nómina Administrativa",
    "Honorarios",
    "Impuestos",
    "Arrendamientos",
    "Seguros",
    "Servicios",
    "Depreciación",
    "Diversos",
];
const SELLING_EXPENSES: [&str; 5] = [
    "Nómina Ventas",
    "Comisiones",
    "Publicidad",
    "Gastos de Viaje",
    "Diversos",
];
const OTHER_INCOME: [&str; 2] = ["Ingresos Financieros", "Otros Ingresos"];
const OTHER_EXPENSES: [&str; 2] = ["Gastos Financieros", "Otros Gastos"];

const INCOME_TAX_RATE: &str = "0.3";

pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 40)?;
    worksheet.set_column_width(1, 15)?;
    worksheet.set_column_width(2, 15)?;
    write_title(worksheet, styles, LAST_COL, "ESTADO DE RESULTADOS", subtitle)?;

    let mut row: RowNum = 4;
    write_section(worksheet, styles, row, "INGRESOS OPERACIONALES")?;
    let revenue_first = row + 1;
    // Returns and discounts are deductions, shown with a signed format.
    write_lines(worksheet, styles, revenue_first, &REVENUE, "", |index| index > 0)?;
    let net_revenue = revenue_first + REVENUE.len() as RowNum;
    let [gross, returns, discounts] =
        [0, 1, 2].map(|offset| cell(revenue_first + offset, 1));
    write_subtotal(
        worksheet,
        styles,
        net_revenue,
        "TOTAL INGRESOS NETOS",
        &format!("={gross}-{returns}-{discounts}"),
    )?;

    row = net_revenue + 2;
    write_section(worksheet, styles, row, "COSTO DE VENTAS")?;
    let cost_first = row + 1;
    write_lines(worksheet, styles, cost_first, &COST_OF_SALES, "", |index| index == 3)?;
    let cost_total = cost_first + COST_OF_SALES.len() as RowNum;
    let [opening, purchases, freight, closing] =
        [0, 1, 2, 3].map(|offset| cell(cost_first + offset, 1));
    write_subtotal(
        worksheet,
        styles,
        cost_total,
        "TOTAL COSTO DE VENTAS",
        &format!("={opening}+{purchases}+{freight}-{closing}"),
    )?;

    row = cost_total + 2;
    let gross_profit = row;
    write_result(
        worksheet,
        row,
        "UTILIDAD BRUTA",
        &format!("={}-{}", cell(net_revenue, 1), cell(cost_total, 1)),
        INCOME_GREEN,
    )?;

    row += 2;
    write_section(worksheet, styles, row, "GASTOS OPERACIONALES")?;
    let admin_total = write_expense_group(
        worksheet,
        styles,
        row + 1,
        "Gastos de Administración",
        "Total Gastos Administración",
        &ADMIN_EXPENSES,
    )?;
    let selling_total = write_expense_group(
        worksheet,
        styles,
        admin_total + 1,
        "Gastos de Ventas",
        "Total Gastos Ventas",
        &SELLING_EXPENSES,
    )?;
    let operating_expenses = selling_total + 1;
    write_subtotal(
        worksheet,
        styles,
        operating_expenses,
        "TOTAL GASTOS OPERACIONALES",
        &format!("={}+{}", cell(admin_total, 1), cell(selling_total, 1)),
    )?;

    row = operating_expenses + 2;
    let operating_profit = row;
    write_result(
        worksheet,
        row,
        "UTILIDAD OPERACIONAL",
        &format!(
            "={}-{}",
            cell(gross_profit, 1),
            cell(operating_expenses, 1)
        ),
        INCOME_GREEN,
    )?;

    row += 2;
    write_section(worksheet, styles, row, "INGRESOS NO OPERACIONALES")?;
    let other_income = write_summed_lines(
        worksheet,
        styles,
        row + 1,
        &OTHER_INCOME,
        "Total Ingresos No Operacionales",
    )?;
    row = other_income + 1;
    write_section(worksheet, styles, row, "GASTOS NO OPERACIONALES")?;
    let other_expenses = write_summed_lines(
        worksheet,
        styles,
        row + 1,
        &OTHER_EXPENSES,
        "Total Gastos No Operacionales",
    )?;

    row = other_expenses + 2;
    let pre_tax = cell(row, 1);
    write_result(
        worksheet,
        row,
        "UTILIDAD ANTES DE IMPUESTOS",
        &format!(
            "={}+{}-{}",
            cell(operating_profit, 1),
            cell(other_income, 1),
            cell(other_expenses, 1)
        ),
        INCOME_GREEN,
    )?;

    row += 1;
    let provision = cell(row, 1);
    worksheet.write_string_with_format(
        row,
        0,
        "Provisión Impuesto de Renta (30%)",
        &styles.cell,
    )?;
    let tax = format!("=IF({pre_tax}>0,{pre_tax}*{INCOME_TAX_RATE},0)");
    worksheet.write_formula_with_format(row, 1, tax.as_str(), &styles.number)?;
    worksheet.write_blank(row, 2, &styles.cell)?;

    row += 2;
    write_result(
        worksheet,
        row,
        "UTILIDAD NETA DEL EJERCICIO",
        &format!("={pre_tax}-{provision}"),
        RESULT_YELLOW,
    )?;

    let instructions = [
        "1. Complete los valores de cada cuenta en la columna B.",
        "2. La columna C puede utilizarse para notas o análisis vertical (%).",
        "3. Los totales y subtotales se calculan automáticamente.",
        "4. Actualice la fecha del estado de resultados en la celda A2.",
        "5. Ajuste el porcentaje de impuesto de renta según la tasa vigente en su país.",
        "6. Esta plantilla es configurable según las necesidades de su empresa.",
    ]
    .map(String::from);
    write_instructions(worksheet, styles, row + 3, LAST_COL, &instructions)?;
    Ok(())
}

fn write_section(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    text: &str,
) -> Result<(), XlsxError> {
    worksheet.write_string_with_format(row, 0, text, &styles.band_label)?;
    worksheet.merge_range(row, 1, row, 2, "", &styles.band_fill)?;
    Ok(())
}

fn write_lines(
    worksheet: &mut Worksheet,
    styles: &Styles,
    first: RowNum,
    accounts: &[&str],
    indent: &str,
    signed: impl Fn(usize) -> bool,
) -> Result<(), XlsxError> {
    for ((row, account), index) in (first..).zip(accounts).zip(0..) {
        let amount_format = if signed(index) {
            &styles.signed
        } else {
            &styles.number
        };
        worksheet.write_string_with_format(row, 0, format!("{indent}{account}"), &styles.cell)?;
        worksheet.write_number_with_format(row, 1, 0, amount_format)?;
        worksheet.write_blank(row, 2, &styles.cell)?;
    }
    Ok(())
}

fn write_subtotal(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    text: &str,
    formula: &str,
) -> Result<(), XlsxError> {
    worksheet.write_string_with_format(row, 0, text, &styles.bold)?;
    worksheet.write_formula_with_format(row, 1, formula, &styles.formula)?;
    worksheet.write_blank(row, 2, &styles.cell)?;
    Ok(())
}

/// Account lines followed by their SUM. Returns the subtotal row.
fn write_summed_lines(
    worksheet: &mut Worksheet,
    styles: &Styles,
    first: RowNum,
    accounts: &[&str],
    subtotal: &str,
) -> Result<RowNum, XlsxError> {
    write_lines(worksheet, styles, first, accounts, "", |_| false)?;
    let subtotal_row = first + accounts.len() as RowNum;
    let sum = format!("=SUM({})", span(first, subtotal_row - 1, 1));
    write_subtotal(worksheet, styles, subtotal_row, subtotal, &sum)?;
    Ok(subtotal_row)
}

fn write_expense_group(
    worksheet: &mut Worksheet,
    styles: &Styles,
    heading_row: RowNum,
    heading: &str,
    subtotal: &str,
    accounts: &[&str],
) -> Result<RowNum, XlsxError> {
    let heading_format = Format::new().set_bold().set_italic();
    worksheet.write_string_with_format(heading_row, 0, heading, &heading_format)?;
    worksheet.merge_range(heading_row, 1, heading_row, 2, "", &styles.cell)?;

    let first = heading_row + 1;
    write_lines(worksheet, styles, first, accounts, "  ", |_| false)?;
    let subtotal_row = first + accounts.len() as RowNum;
    let sum = format!("=SUM({})", span(first, subtotal_row - 1, 1));
    write_subtotal(worksheet, styles, subtotal_row, subtotal, &sum)?;
    Ok(subtotal_row)
}

fn write_result(
    worksheet: &mut Worksheet,
    row: RowNum,
    text: &str,
    formula: &str,
    background: u32,
) -> Result<(), XlsxError> {
    worksheet.write_string_with_format(row, 0, text, &label(background))?;
    worksheet.write_formula_with_format(row, 1, formula, &total(background))?;
    worksheet.write_blank(row, 2, &fill(background))?;
    Ok(())
}
