use rust_xlsxwriter::{
    Chart, ChartFormat, ChartLine, ChartType, Color, ColNum, Format, RowNum, Worksheet,
    XlsxError,
};

use super::layout::{
    Styles, cell, computed, write_band, write_headers, write_instructions, write_title,
};

const SHEET: &str = "Punto de Equilibrio";
const LAST_COL: ColNum = 3;
const SCENARIOS: u32 = 9;

const UNIT_PRICE: f64 = 100.0;
const UNIT_VARIABLE_COST: f64 = 60.0;
const MONTHLY_FIXED_COSTS: f64 = 10_000.0;

/// Break-even analysis with a nine-step sales simulation and a line chart of
/// revenue, total cost and profit.
pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 30)?;
    for col in 1..=LAST_COL {
        worksheet.set_column_width(col, 15)?;
    }
    write_title(
        worksheet,
        styles,
        LAST_COL,
        "ANÁLISIS DE PUNTO DE EQUILIBRIO",
        subtitle,
    )?;

    write_band(worksheet, styles, 3, LAST_COL, "DATOS DE ENTRADA")?;
    write_headers(worksheet, styles, 4, &["Concepto", "Valor", "Unidad", "Notas"])?;
    let inputs = [
        ("Precio de Venta Unitario", UNIT_PRICE, "Precio promedio"),
        (
            "Costo Variable Unitario",
            UNIT_VARIABLE_COST,
            "Costos directos por unidad",
        ),
        (
            "Costos Fijos Mensuales",
            MONTHLY_FIXED_COSTS,
            "Total costos fijos",
        ),
    ];
    for (row, (concept, value, note)) in (5..).zip(inputs) {
        worksheet.write_string_with_format(row, 0, concept, &styles.cell)?;
        worksheet.write_number_with_format(row, 1, value, &styles.number)?;
        worksheet.write_string_with_format(row, 2, "$", &styles.cell)?;
        worksheet.write_string_with_format(row, 3, note, &styles.cell)?;
    }
    let price = cell(5, 1);
    let variable_cost = cell(6, 1);
    let fixed_costs = cell(7, 1);

    write_band(worksheet, styles, 9, LAST_COL, "ANÁLISIS DE CONTRIBUCIÓN")?;
    write_headers(worksheet, styles, 10, &["Concepto", "Valor", "Unidad", "Fórmula"])?;
    let margin = cell(11, 1);
    write_derived(
        worksheet,
        styles,
        11,
        "Margen de Contribución Unitario",
        &format!("={price}-{variable_cost}"),
        ("$", "PV - CV"),
        &styles.formula,
    )?;
    write_derived(
        worksheet,
        styles,
        12,
        "Ratio de Margen de Contribución",
        &format!("={margin}/{price}"),
        ("%", "MCU / PV"),
        &computed("0%"),
    )?;

    write_band(
        worksheet,
        styles,
        14,
        LAST_COL,
        "CÁLCULO DEL PUNTO DE EQUILIBRIO",
    )?;
    write_headers(worksheet, styles, 15, &["Concepto", "Valor", "Unidad", "Fórmula"])?;
    let break_even_units = cell(16, 1);
    write_derived(
        worksheet,
        styles,
        16,
        "Punto de Equilibrio en Unidades",
        &format!("={fixed_costs}/{margin}"),
        ("unidades", "CF / MCU"),
        &styles.formula,
    )?;
    write_derived(
        worksheet,
        styles,
        17,
        "Punto de Equilibrio en Ventas ($)",
        &format!("={break_even_units}*{price}"),
        ("$", "PE Unid. * PV"),
        &styles.formula,
    )?;

    write_band(worksheet, styles, 19, LAST_COL, "SIMULACIÓN DE ESCENARIOS")?;
    write_headers(
        worksheet,
        styles,
        20,
        &["Unidades Vendidas", "Ingresos", "Costos Totales", "Utilidad"],
    )?;
    let first: RowNum = 21;
    let last = first + SCENARIOS - 1;
    for (row, step) in (first..=last).zip(1u32..) {
        // 25%, 50%, ... 225% of the break-even volume.
        let factor = 0.25 * f64::from(step);
        let r = row + 1;
        let formulas = [
            (
                0,
                format!("=ROUND({break_even_units}*{factor},0)"),
                &styles.cell,
            ),
            (1, format!("=A{r}*{price}"), &styles.number),
            (
                2,
                format!("={fixed_costs}+(A{r}*{variable_cost})"),
                &styles.number,
            ),
            (3, format!("=B{r}-C{r}"), &styles.formula),
        ];
        for (col, formula, format) in formulas {
            worksheet.write_formula_with_format(row, col, formula.as_str(), format)?;
        }
    }

    let chart = simulation_chart(first, last);
    worksheet.insert_chart(4, 5, &chart)?;

    let instructions = [
        format!(
            "1. Modifique los datos de entrada en las celdas {price}, {variable_cost} y {fixed_costs} según la información de su producto."
        ),
        "2. El punto de equilibrio se calculará automáticamente en unidades y en valor monetario."
            .to_string(),
        "3. La tabla de simulación muestra diferentes escenarios de ventas y su impacto en la utilidad."
            .to_string(),
        "4. El gráfico ilustra la intersección del punto de equilibrio donde ingresos = costos totales."
            .to_string(),
        "5. Para analizar múltiples productos, duplique esta hoja y ajuste los datos para cada uno."
            .to_string(),
        "6. Este análisis es una herramienta de planificación y toma de decisiones operativas."
            .to_string(),
    ];
    write_instructions(worksheet, styles, last + 3, LAST_COL, &instructions)?;
    Ok(())
}

fn write_derived(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    concept: &str,
    formula: &str,
    (unit, note): (&str, &str),
    value_format: &Format,
) -> Result<(), XlsxError> {
    worksheet.write_string_with_format(row, 0, concept, &styles.cell)?;
    worksheet.write_formula_with_format(row, 1, formula, value_format)?;
    worksheet.write_string_with_format(row, 2, unit, &styles.cell)?;
    worksheet.write_string_with_format(row, 3, note, &styles.cell)?;
    Ok(())
}

fn simulation_chart(first: RowNum, last: RowNum) -> Chart {
    let mut chart = Chart::new(ChartType::Line);
    let series: [(&str, ColNum, u32); 3] = [
        ("Ingresos", 1, 0x0000FF),
        ("Costos Totales", 2, 0xFF0000),
        ("Utilidad", 3, 0x008000),
    ];
    for (name, col, color) in series {
        chart
            .add_series()
            .set_name(name)
            .set_categories((SHEET, first, 0 as ColNum, last, 0 as ColNum))
            .set_values((SHEET, first, col, last, col))
            .set_format(
                ChartFormat::new().set_line(
                    ChartLine::new()
                        .set_color(Color::RGB(color))
                        .set_width(2.25),
                ),
            );
    }
    chart.title().set_name("Análisis de Punto de Equilibrio");
    chart.x_axis().set_name("Unidades Vendidas");
    chart.y_axis().set_name("Valor ($)");
    chart.set_style(11);
    // Default 480x288 scaled by 1.5.
    chart.set_width(720).set_height(432);
    chart
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::{TemplateKind, TemplateOptions, generate, testing};

    fn sheet() -> testing::OpenedSheet {
        testing::open(generate(TemplateKind::BreakEven, &TemplateOptions::default()).unwrap())
    }

    #[test]
    fn inputs_hold_sample_values() {
        let sheet = sheet();
        assert_eq!(sheet.text(5, 0), Some("Precio de Venta Unitario"));
        assert_eq!(sheet.number(5, 1), Some(100.0));
        assert_eq!(sheet.number(6, 1), Some(60.0));
        assert_eq!(sheet.number(7, 1), Some(10_000.0));
    }

    #[test]
    fn break_even_formulas_reference_inputs() {
        let sheet = sheet();
        assert_eq!(sheet.formula(11, 1), Some("B6-B7"));
        assert_eq!(sheet.formula(12, 1), Some("B12/B6"));
        assert_eq!(sheet.formula(16, 1), Some("B8/B12"));
        assert_eq!(sheet.formula(17, 1), Some("B17*B6"));
    }

    #[test]
    fn simulation_spans_nine_scenarios() {
        let sheet = sheet();
        assert_eq!(sheet.text(20, 0), Some("Unidades Vendidas"));
        assert_eq!(sheet.formula(21, 0), Some("ROUND(B17*0.25,0)"));
        assert_eq!(sheet.formula(24, 0), Some("ROUND(B17*1,0)"));
        assert_eq!(sheet.formula(29, 0), Some("ROUND(B17*2.25,0)"));
        assert_eq!(sheet.formula(29, 1), Some("A30*B6"));
        assert_eq!(sheet.formula(29, 2), Some("B8+(A30*B7)"));
        assert_eq!(sheet.formula(29, 3), Some("B30-C30"));
        assert!(sheet.formula(30, 0).is_none());
    }

    #[test]
    fn workbook_embeds_chart_part() {
        let bytes =
            generate(TemplateKind::BreakEven, &TemplateOptions::default()).expect("workbook");
        let needle = b"xl/charts/chart1.xml";
        assert!(bytes.windows(needle.len()).any(|window| window == needle));
    }
}
