use rust_xlsxwriter::{ColNum, Worksheet, XlsxError};

use super::layout::{
    RESULT_YELLOW, SUBTOTAL_GRAY, Styles, cell, fill, label, span, total, write_band,
    write_headers, write_instructions, write_title,
};

const HEADERS: [&str; 12] = [
    "Empleado",
    "Cargo",
    "Salario Base",
    "Días Trabajados",
    "Horas Extra",
    "Bonificaciones",
    "Salario Total",
    "Seguridad Social",
    "Retención Renta",
    "Otros Descuentos",
    "Total Descuentos",
    "Salario Neto",
];

const STAFF: [(&str, u32); 5] = [
    ("Gerente", 5_000_000),
    ("Analista", 3_000_000),
    ("Asistente", 2_000_000),
    ("Técnico", 1_800_000),
    ("Operario", 1_200_000),
];

/// Salary above which the simplified 10% withholding applies.
const WITHHOLDING_THRESHOLD: u32 = 2_500_000;
const LAST_COL: ColNum = HEADERS.len() as ColNum - 1;

pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 25)?;
    for col in 1..=LAST_COL {
        worksheet.set_column_width(col, 13)?;
    }
    write_title(
        worksheet,
        styles,
        LAST_COL,
        "PLANTILLA DE CÁLCULO DE NÓMINA",
        subtitle,
    )?;

    let header_row = 4;
    write_headers(worksheet, styles, header_row, &HEADERS)?;

    let first = header_row + 1;
    for ((row, (position, salary)), index) in (first..).zip(STAFF).zip(1..) {
        let r = row + 1;
        worksheet.write_string_with_format(row, 0, format!("Empleado {index}"), &styles.cell)?;
        worksheet.write_string_with_format(row, 1, position, &styles.cell)?;
        worksheet.write_number_with_format(row, 2, salary, &styles.number)?;
        worksheet.write_number_with_format(row, 3, 30, &styles.cell)?;
        worksheet.write_number_with_format(row, 4, 0, &styles.cell)?;
        worksheet.write_number_with_format(row, 5, 0, &styles.number)?;
        worksheet.write_number_with_format(row, 9, 0, &styles.number)?;

        let formulas = [
            (6, format!("=C{r}*(D{r}/30)+((C{r}/240)*1.5*E{r})+F{r}")),
            (7, format!("=C{r}*0.08")),
            (8, format!("=IF(C{r}>{WITHHOLDING_THRESHOLD},G{r}*0.1,0)")),
            (10, format!("=SUM(H{r}:J{r})")),
            (11, format!("=G{r}-K{r}")),
        ];
        for (col, formula) in formulas {
            worksheet.write_formula_with_format(row, col, formula.as_str(), &styles.formula)?;
        }
    }
    let last = first + STAFF.len() as u32 - 1;

    let totals = last + 2;
    let gray_total = total(SUBTOTAL_GRAY);
    worksheet.write_string_with_format(totals, 0, "TOTALES", &label(SUBTOTAL_GRAY))?;
    worksheet.write_blank(totals, 1, &fill(SUBTOTAL_GRAY))?;
    for col in 2..=LAST_COL {
        let formula = format!("=SUM({})", span(first, last, col));
        worksheet.write_formula_with_format(totals, col, formula.as_str(), &gray_total)?;
    }

    let summary = totals + 2;
    write_band(
        worksheet,
        styles,
        summary,
        LAST_COL,
        "RESUMEN DE COSTOS PARA LA EMPRESA",
    )?;

    let gross = cell(totals, 6);
    let net = cell(totals, 11);
    let severance_row = summary + 4;
    let lines = [
        ("Total Salarios Netos:", format!("={net}")),
        ("Aportes Patronales (20%):", format!("={gross}*0.2")),
        ("Prima (1/12 salario anual):", format!("={gross}/12")),
        ("Cesantías (1/12 salario anual):", format!("={gross}/12")),
        (
            "Intereses Cesantías (12% anual):",
            format!("={}*0.12/12", cell(severance_row, 2)),
        ),
        ("Vacaciones (1/24 salario anual):", format!("={gross}/24")),
    ];
    let mut row = summary + 1;
    for (text, formula) in &lines {
        worksheet.merge_range(row, 0, row, 1, text, &styles.bold)?;
        worksheet.write_formula_with_format(row, 2, formula.as_str(), &styles.number)?;
        row += 1;
    }

    let company_cost = format!("=SUM({})", span(summary + 1, row - 1, 2));
    worksheet.merge_range(row, 0, row, 1, "Costo Total Empresa:", &label(RESULT_YELLOW))?;
    worksheet.write_formula_with_format(row, 2, company_cost.as_str(), &total(RESULT_YELLOW))?;

    let instructions = [
        "1. Ingrese el nombre de cada empleado y su cargo en las columnas A y B.",
        "2. Registre el salario base mensual en la columna C.",
        "3. Actualice los días trabajados, horas extra y bonificaciones según corresponda.",
        "4. Los cálculos de salario total, descuentos y neto se realizan automáticamente.",
        "5. El resumen muestra el costo total para la empresa incluyendo provisiones sociales.",
        "6. Ajuste los porcentajes según la legislación vigente en su país.",
    ]
    .map(String::from);
    write_instructions(worksheet, styles, row + 3, LAST_COL, &instructions)?;
    Ok(())
}
