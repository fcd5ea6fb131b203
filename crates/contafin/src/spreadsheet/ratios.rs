use rust_xlsxwriter::{ColNum, RowNum, Worksheet, XlsxError};

use super::layout::{Styles, computed, write_band, write_headers, write_instructions, write_title};

const LAST_COL: ColNum = 4;
const BALANCE: &str = "Balance General";
const RESULTS: &str = "Estado de Resultados";

/// Sample inputs, in thousands.
const INPUTS: [(&str, &str, f64); 10] = [
    ("Activo Corriente", BALANCE, 500.0),
    ("Inventarios", BALANCE, 150.0),
    ("Pasivo Corriente", BALANCE, 300.0),
    ("Activo Total", BALANCE, 1200.0),
    ("Pasivo Total", BALANCE, 700.0),
    ("Patrimonio", BALANCE, 500.0),
    ("Ventas Netas", RESULTS, 1500.0),
    ("Utilidad Bruta", RESULTS, 600.0),
    ("Utilidad Operativa", RESULTS, 300.0),
    ("Utilidad Neta", RESULTS, 150.0),
];

#[derive(Clone, Copy)]
enum Input {
    CurrentAssets,
    Inventory,
    CurrentLiabilities,
    TotalAssets,
    TotalLiabilities,
    Equity,
    NetSales,
    GrossProfit,
    OperatingProfit,
    NetIncome,
}

/// Column C reference of each input, given the first input row.
struct Inputs {
    first: RowNum,
}

impl Inputs {
    fn get(&self, input: Input) -> String {
        format!("C{}", self.first + input as RowNum + 1)
    }
}

struct Ratio {
    name: &'static str,
    description: &'static str,
    formula: String,
    num_format: &'static str,
    benchmark: &'static str,
    /// Interpretation text as an Excel expression over `{v}`, the ratio cell.
    interpretation: &'static str,
}

pub(super) fn write(
    worksheet: &mut Worksheet,
    styles: &Styles,
    subtitle: &str,
) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, 35)?;
    for col in 1..=LAST_COL {
        worksheet.set_column_width(col, 15)?;
    }
    write_title(
        worksheet,
        styles,
        LAST_COL,
        "ANÁLISIS DE RATIOS FINANCIEROS",
        subtitle,
    )?;
    write_headers(
        worksheet,
        styles,
        4,
        &["Ratio", "Fórmula", "Valor", "Industria", "Interpretación"],
    )?;
    write_band(
        worksheet,
        styles,
        5,
        LAST_COL,
        "DATOS DE ENTRADA (EN MILES DE $)",
    )?;

    let inputs = Inputs { first: 6 };
    for (row, (name, source, value)) in (inputs.first..).zip(INPUTS) {
        worksheet.write_string_with_format(row, 0, name, &styles.cell)?;
        worksheet.write_string_with_format(row, 1, source, &styles.cell)?;
        worksheet.write_number_with_format(row, 2, value, &styles.number)?;
        worksheet.write_blank(row, 3, &styles.cell)?;
        worksheet.write_string_with_format(row, 4, "Ingrese su valor", &styles.cell)?;
    }
    let inputs_last = inputs.first + INPUTS.len() as RowNum - 1;

    let mut row = inputs_last + 2;
    for (title, group) in ratio_groups(&inputs) {
        write_band(worksheet, styles, row, LAST_COL, title)?;
        row += 1;
        for ratio in group {
            write_ratio(worksheet, styles, row, &ratio)?;
            row += 1;
        }
        row += 1;
    }

    let instructions = [
        format!(
            "1. Actualice los datos de entrada de su empresa en las celdas {} a {}.",
            inputs.get(Input::CurrentAssets),
            inputs.get(Input::NetIncome)
        ),
        "2. Los ratios financieros se calcularán automáticamente y serán comparados con valores de referencia.".to_string(),
        "3. La columna \"Industria\" muestra valores de referencia generales, ajústelos según su sector específico.".to_string(),
        "4. La interpretación automática proporciona una guía básica, pero debe ser complementada con análisis específico.".to_string(),
        "5. Compare estos ratios con períodos anteriores para identificar tendencias en el desempeño financiero.".to_string(),
        "6. Esta herramienta es orientativa y debe ser validada por un profesional financiero.".to_string(),
    ];
    write_instructions(worksheet, styles, row + 1, LAST_COL, &instructions)?;
    Ok(())
}

fn write_ratio(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: RowNum,
    ratio: &Ratio,
) -> Result<(), XlsxError> {
    let value_cell = format!("C{}", row + 1);
    let interpretation = format!("={}", ratio.interpretation.replace("{v}", &value_cell));

    worksheet.write_string_with_format(row, 0, ratio.name, &styles.cell)?;
    worksheet.write_string_with_format(row, 1, ratio.description, &styles.cell)?;
    worksheet.write_formula_with_format(
        row,
        2,
        ratio.formula.as_str(),
        &computed(ratio.num_format),
    )?;
    worksheet.write_string_with_format(row, 3, ratio.benchmark, &styles.cell)?;
    worksheet.write_formula_with_format(row, 4, interpretation.as_str(), &styles.cell)?;
    Ok(())
}

fn ratio_groups(inputs: &Inputs) -> [(&'static str, Vec<Ratio>); 3] {
    use Input::*;
    let get = |input| inputs.get(input);

    let liquidity = vec![
        Ratio {
            name: "Ratio Corriente",
            description: "Activo Corriente / Pasivo Corriente",
            formula: format!("={}/{}", get(CurrentAssets), get(CurrentLiabilities)),
            num_format: "0.00",
            benchmark: "> 1.5",
            interpretation: r#"IF({v}>1.5,"Buena liquidez",IF({v}>1,"Liquidez ajustada","Problemas de liquidez"))"#,
        },
        Ratio {
            name: "Prueba Ácida",
            description: "(Activo Corriente - Inventarios) / Pasivo Corriente",
            formula: format!(
                "=({}-{})/{}",
                get(CurrentAssets),
                get(Inventory),
                get(CurrentLiabilities)
            ),
            num_format: "0.00",
            benchmark: "> 1.0",
            interpretation: r#"IF({v}>1,"Buena liquidez inmediata","Posible problema de liquidez inmediata")"#,
        },
        Ratio {
            name: "Capital de Trabajo",
            description: "Activo Corriente - Pasivo Corriente",
            formula: format!("={}-{}", get(CurrentAssets), get(CurrentLiabilities)),
            num_format: "#,##0",
            benchmark: "> 0",
            interpretation: r#"IF({v}>0,"Capital de trabajo positivo","Capital de trabajo negativo - alerta")"#,
        },
    ];

    let solvency = vec![
        Ratio {
            name: "Ratio de Endeudamiento",
            description: "Pasivo Total / Activo Total",
            formula: format!("={}/{}", get(TotalLiabilities), get(TotalAssets)),
            num_format: "0.00%",
            benchmark: "< 60%",
            interpretation: r#"IF({v}<0.6,"Nivel de endeudamiento aceptable","Alto nivel de endeudamiento")"#,
        },
        Ratio {
            name: "Ratio de Autonomía",
            description: "Patrimonio / Activo Total",
            formula: format!("={}/{}", get(Equity), get(TotalAssets)),
            num_format: "0.00%",
            benchmark: "> 40%",
            interpretation: r#"IF({v}>0.4,"Buena autonomía financiera","Baja autonomía financiera")"#,
        },
        Ratio {
            name: "Apalancamiento",
            description: "Activo Total / Patrimonio",
            formula: format!("={}/{}", get(TotalAssets), get(Equity)),
            num_format: "0.00",
            benchmark: "< 2.5",
            interpretation: r#"IF({v}<2.5,"Apalancamiento moderado","Alto apalancamiento - mayor riesgo")"#,
        },
    ];

    let profitability = vec![
        Ratio {
            name: "Margen Bruto",
            description: "Utilidad Bruta / Ventas",
            formula: format!("={}/{}", get(GrossProfit), get(NetSales)),
            num_format: "0.00%",
            benchmark: "> 30%",
            interpretation: r#"IF({v}>0.3,"Buen margen bruto","Margen bruto ajustado")"#,
        },
        Ratio {
            name: "Margen Operativo",
            description: "Utilidad Operativa / Ventas",
            formula: format!("={}/{}", get(OperatingProfit), get(NetSales)),
            num_format: "0.00%",
            benchmark: "> 15%",
            interpretation: r#"IF({v}>0.15,"Buen margen operativo","Margen operativo por mejorar")"#,
        },
        Ratio {
            name: "Margen Neto",
            description: "Utilidad Neta / Ventas",
            formula: format!("={}/{}", get(NetIncome), get(NetSales)),
            num_format: "0.00%",
            benchmark: "> 10%",
            interpretation: r#"IF({v}>0.1,"Buen margen neto","Margen neto por mejorar")"#,
        },
        Ratio {
            name: "ROA (Return on Assets)",
            description: "Utilidad Neta / Activo Total",
            formula: format!("={}/{}", get(NetIncome), get(TotalAssets)),
            num_format: "0.00%",
            benchmark: "> 5%",
            interpretation: r#"IF({v}>0.05,"Buena rentabilidad de activos","Rentabilidad de activos por mejorar")"#,
        },
        Ratio {
            name: "ROE (Return on Equity)",
            description: "Utilidad Neta / Patrimonio",
            formula: format!("={}/{}", get(NetIncome), get(Equity)),
            num_format: "0.00%",
            benchmark: "> 15%",
            interpretation: r#"IF({v}>0.15,"Buena rentabilidad para accionistas","Rentabilidad para accionistas por mejorar")"#,
        },
    ];

    [
        ("1. RATIOS DE LIQUIDEZ", liquidity),
        ("2. RATIOS DE SOLVENCIA", solvency),
        ("3. RATIOS DE RENTABILIDAD", profitability),
    ]
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::{TemplateKind, TemplateOptions, generate, testing};

    fn sheet() -> testing::OpenedSheet {
        testing::open(generate(TemplateKind::FinancialRatios, &TemplateOptions::default()).unwrap())
    }

    #[test]
    fn inputs_are_labelled_with_their_source() {
        let sheet = sheet();
        assert_eq!(sheet.text(6, 0), Some("Activo Corriente"));
        assert_eq!(sheet.text(6, 1), Some("Balance General"));
        assert_eq!(sheet.number(6, 2), Some(500.0));
        assert_eq!(sheet.text(15, 0), Some("Utilidad Neta"));
        assert_eq!(sheet.text(15, 1), Some("Estado de Resultados"));
        assert_eq!(sheet.text(15, 4), Some("Ingrese su valor"));
    }

    #[test]
    fn ratios_reference_input_cells() {
        let sheet = sheet();
        let current = sheet.row_of("Ratio Corriente").unwrap();
        assert_eq!(sheet.formula(current, 2), Some("C7/C9"));
        let r = current + 1;
        assert_eq!(
            sheet.formula(current, 4),
            Some(
                format!(
                    "IF(C{r}>1.5,\"Buena liquidez\",IF(C{r}>1,\"Liquidez ajustada\",\"Problemas de liquidez\"))"
                )
                .as_str()
            )
        );

        let acid = sheet.row_of("Prueba Ácida").unwrap();
        assert_eq!(sheet.formula(acid, 2), Some("(C7-C8)/C9"));

        let roe = sheet.row_of("ROE (Return on Equity)").unwrap();
        assert_eq!(sheet.formula(roe, 2), Some("C16/C12"));
        assert_eq!(sheet.text(roe, 3), Some("> 15%"));
    }

    #[test]
    fn groups_appear_in_order() {
        let sheet = sheet();
        let liquidity = sheet.row_of("1. RATIOS DE LIQUIDEZ").unwrap();
        let solvency = sheet.row_of("2. RATIOS DE SOLVENCIA").unwrap();
        let profitability = sheet.row_of("3. RATIOS DE RENTABILIDAD").unwrap();
        assert!(liquidity < solvency && solvency < profitability);
        assert_eq!(sheet.row_of("Ratio de Endeudamiento"), Some(solvency + 1));
    }
}
