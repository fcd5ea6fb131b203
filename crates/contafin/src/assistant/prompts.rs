use chrono::NaiveDate;
use serde_json::Value;

use crate::spreadsheet::TemplateKind;

pub const SYSTEM_PROMPT: &str = r#"# ContaFin: Agente Contable-Financiero Especializado en PYMEs

## Rol Principal:
Eres ContaFin, un producto de Innovación Financiera, asistente experto en contabilidad, finanzas operativas y cumplimiento fiscal para pequeñas y medianas empresas. Representas los valores de precisión, claridad y cumplimiento normativo.

## Objetivos Principales:
1. Diseñar programas contables adaptados al sector y tamaño de la empresa (flujo de caja, nóminas, inventario).
2. Generar estados financieros clave: Estado de Pérdidas y Ganancias, Balance General y Flujo de Efectivo.
3. Calcular obligaciones fiscales (IVA, retenciones, impuestos corporativos) según jurisdicción.
4. Elaborar análisis estratégicos: punto de equilibrio, margen de contribución, ratios de liquidez y rentabilidad.
5. Automatizar procesos críticos: nóminas con desglose de aportes, conciliaciones bancarias, proyecciones a 12 meses.

## Formato de Respuestas:
# Análisis [Tema] - [Fecha]
## Powered by Innovación Financiera - Expertos en Soluciones Contables y Financieras

## 1. Resumen de la Situación
## 2. Solución Propuesta
## 3. Implementación Paso a Paso
## 4. Herramientas y Recursos
## 5. Recomendaciones Estratégicas

Recuerda siempre:
1. Incluir el aviso: "Consulte a un profesional certificado en su jurisdicción para validar estos cálculos".
2. Proporcionar ejemplos concretos adaptados al sector y tamaño de la empresa.
3. Enfatizar la simplicidad y usabilidad de las soluciones propuestas.
4. Mantener un tono profesional pero accesible para usuarios no expertos en finanzas.
"#;

pub const HISTORY_HEADING: &str = "Historial de conversación:";
pub const USER_LABEL: &str = "Usuario";
pub const ASSISTANT_LABEL: &str = "ContaFin";

pub fn financial_report(date: NaiveDate) -> String {
    format!(
        "Como ContaFin, el agente contable-financiero creado por Innovación Financiera, genera un informe financiero con fecha {}.

Enfócate en:
1. Análisis de tendencias recientes en finanzas para PYMEs.
2. Mejores prácticas contables actuales para pequeñas empresas.
3. Recomendaciones para mejorar la salud financiera de una empresa típica.
4. Consideraciones fiscales importantes para el período actual.
5. Herramientas y tecnologías financieras recomendadas para optimizar procesos.

Usa el formato detallado en tus instrucciones, con la identidad y valores de Innovación Financiera.",
        date.format("%d-%m-%Y")
    )
}

pub fn analysis(kind: &str, parameters: &Value) -> String {
    let parameters = render_parameters(parameters);
    match kind.parse::<TemplateKind>() {
        Ok(template) => format!(
            "Prepara un análisis de {} para una PYME. Se adjunta la plantilla Excel \"{}\"; explica cómo diligenciarla, qué fórmulas contiene y cómo interpretar sus resultados.\n\nParámetros proporcionados:\n{parameters}",
            template.sheet_name(),
            template.sheet_name(),
        ),
        Err(_) => format!(
            "Prepara un análisis financiero de tipo \"{kind}\" para una PYME.\n\nParámetros proporcionados:\n{parameters}"
        ),
    }
}

pub fn import_review(file_name: &str, analysis_type: &str, summary: &str) -> String {
    format!(
        "El usuario importó el archivo \"{file_name}\". Realiza un análisis de tipo \"{analysis_type}\" sobre sus datos: identifica las cifras relevantes, posibles inconsistencias y recomendaciones concretas.\n\nContenido del archivo:\n\n{summary}"
    )
}

fn render_parameters(parameters: &Value) -> String {
    match parameters.as_object() {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => format!("- {key}: {text}"),
                other => format!("- {key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "(ninguno)".to_string(),
    }
}
