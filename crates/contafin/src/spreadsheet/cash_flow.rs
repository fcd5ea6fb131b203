use rust_xlsxwriter::{ColNum, Worksheet, XlsxError};

use super::layout::{
    EXPENSE_RED, INCOME_GREEN, Styles, cell, label, span, write_instructions, write_title,
};

const MONTHS: [&str; 6] = ["Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio"];
const INFLOWS: [&str; 4] = [
    "Ventas de Contado",
    "Cobro a Clientes",
    "Préstamos",
    "Otros Ingresos",
];
const OUTFLOWS: [&str; 7] = [
    "Compras de Mercancía",
    "Pago a Proveedores",
    "Nómina",
    "Impuestos",
    "Servicios",
    "Arrendamiento",
    "Otros Gastos",
];
const LAST_COL: ColNum = MONTHS.len() as ColNum;

/// Six-month cash flow. Each month's opening balance is the previous
/// month's closing balance.
pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 30)?;
    for col in 1..=LAST_COL {
        worksheet.set_column_width(col, 15)?;
    }
    write_title(worksheet, styles, LAST_COL, "PLANTILLA DE FLUJO DE CAJA", subtitle)?;

    worksheet.write_string_with_format(3, 0, "CONCEPTO", &styles.header)?;
    for (col, month) in (1..).zip(MONTHS) {
        worksheet.write_string_with_format(3, col, month, &styles.header)?;
    }

    let opening = 4;
    let inflow_first = opening + 3;
    let inflow_total = inflow_first + INFLOWS.len() as u32;
    let outflow_first = inflow_total + 3;
    let outflow_total = outflow_first + OUTFLOWS.len() as u32;
    let net = outflow_total + 2;
    let closing = net + 1;

    worksheet.write_string_with_format(opening, 0, "Saldo Inicial", &styles.bold)?;
    worksheet.write_number_with_format(opening, 1, 0, &styles.number)?;
    for col in 2..=LAST_COL {
        let previous_close = cell(closing, col - 1);
        worksheet.write_formula_with_format(
            opening,
            col,
            format!("={previous_close}").as_str(),
            &styles.number,
        )?;
    }

    let inflow_label = label(INCOME_GREEN);
    worksheet.write_string_with_format(inflow_first - 1, 0, "INGRESOS", &inflow_label)?;
    write_inputs(worksheet, styles, inflow_first, &INFLOWS)?;
    worksheet.write_string_with_format(inflow_total, 0, "Total Ingresos", &inflow_label)?;

    let outflow_label = label(EXPENSE_RED);
    worksheet.write_string_with_format(outflow_first - 1, 0, "EGRESOS", &outflow_label)?;
    write_inputs(worksheet, styles, outflow_first, &OUTFLOWS)?;
    worksheet.write_string_with_format(outflow_total, 0, "Total Egresos", &outflow_label)?;

    worksheet.write_string_with_format(net, 0, "Flujo Neto del Mes", &styles.bold)?;
    worksheet.write_string_with_format(closing, 0, "Saldo Final", &styles.bold)?;

    for col in 1..=LAST_COL {
        let inflows = span(inflow_first, inflow_total - 1, col);
        let outflows = span(outflow_first, outflow_total - 1, col);
        let formulas = [
            (inflow_total, format!("=SUM({inflows})")),
            (outflow_total, format!("=SUM({outflows})")),
            (
                net,
                format!("={}-{}", cell(inflow_total, col), cell(outflow_total, col)),
            ),
            (
                closing,
                format!("={}+{}", cell(opening, col), cell(net, col)),
            ),
        ];
        for (row, formula) in formulas {
            worksheet.write_formula_with_format(row, col, formula.as_str(), &styles.formula)?;
        }
    }

    let opening_cell = cell(opening, 1);
    let instructions = [
        format!("1. Comience registrando su saldo inicial en la celda {opening_cell}."),
        "2. Ingrese sus ingresos mensuales previstos en cada categoría.".to_string(),
        "3. Registre todos los egresos esperados en cada mes.".to_string(),
        "4. El flujo neto y saldo final se calcularán automáticamente.".to_string(),
        "5. El saldo final de cada mes se traslada como saldo inicial del mes siguiente."
            .to_string(),
        "6. Actualice mensualmente los datos reales para mantener control de su liquidez."
            .to_string(),
    ];
    write_instructions(worksheet, styles, closing + 3, LAST_COL, &instructions)?;
    Ok(())
}

fn write_inputs(
    worksheet: &mut Worksheet,
    styles: &Styles,
    first_row: u32,
    labels: &[&str],
) -> Result<(), XlsxError> {
    for (row, concept) in (first_row..).zip(labels) {
        worksheet.write_string_with_format(row, 0, *concept, &styles.cell)?;
        for col in 1..=LAST_COL {
            worksheet.write_number_with_format(row, col, 0, &styles.number)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::{TemplateKind, TemplateOptions, generate, testing};

    #[test]
    fn totals_and_balances_reference_their_own_rows() {
        let sheet = testing::open(generate(TemplateKind::CashFlow, &TemplateOptions::default()).unwrap());

        assert_eq!(sheet.text(3, 0), Some("CONCEPTO"));
        assert_eq!(sheet.text(3, 6), Some("Junio"));

        let total_in = sheet.row_of("Total Ingresos").unwrap();
        let total_out = sheet.row_of("Total Egresos").unwrap();
        let net = sheet.row_of("Flujo Neto del Mes").unwrap();
        let closing = sheet.row_of("Saldo Final").unwrap();

        assert_eq!(sheet.formula(total_in, 1), Some("SUM(B8:B11)"));
        assert_eq!(sheet.formula(total_in, 3), Some("SUM(D8:D11)"));
        assert_eq!(sheet.formula(total_out, 1), Some("SUM(B15:B21)"));
        assert_eq!(
            sheet.formula(net, 2),
            Some(format!("C{}-C{}", total_in + 1, total_out + 1).as_str())
        );
        assert_eq!(
            sheet.formula(closing, 1),
            Some(format!("B5+B{}", net + 1).as_str())
        );
    }

    #[test]
    fn opening_balance_carries_previous_close() {
        let sheet = testing::open(generate(TemplateKind::CashFlow, &TemplateOptions::default()).unwrap());
        let closing = sheet.row_of("Saldo Final").unwrap();

        assert_eq!(sheet.number(4, 1), Some(0.0));
        assert_eq!(
            sheet.formula(4, 2),
            Some(format!("B{}", closing + 1).as_str())
        );
        assert_eq!(
            sheet.formula(4, 6),
            Some(format!("F{}", closing + 1).as_str())
        );
    }
}
