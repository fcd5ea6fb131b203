//! Excel workbook generation for the accounting templates, plus workbook
//! import.
//!
//! Every template is a single hand-laid sheet: a title band, a subtitle, the
//! input cells, literal formula strings that reference those inputs, and an
//! `INSTRUCCIONES` block at the bottom.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod balance_sheet;
mod break_even;
mod cash_flow;
pub mod import;
mod income_statement;
mod layout;
mod payroll;
mod ratios;

pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("Tipo de plantilla no válido. Opciones disponibles: {valid}")]
    UnknownTemplate { tag: String, valid: String },
    #[error("failed to build workbook: {0}")]
    Write(#[from] XlsxError),
    #[error("unsupported file format {0:?}, expected one of: xlsx, xls, xlsm, ods")]
    UnsupportedFormat(String),
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::Error),
    #[error("workbook contains no readable sheets")]
    EmptyWorkbook,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("workbook task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    #[serde(rename = "flujo_caja")]
    CashFlow,
    #[serde(rename = "nomina")]
    Payroll,
    #[serde(rename = "balance_general")]
    BalanceSheet,
    #[serde(rename = "estado_resultados")]
    IncomeStatement,
    #[serde(rename = "punto_equilibrio")]
    BreakEven,
    #[serde(rename = "ratios_financieros")]
    FinancialRatios,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 6] = [
        TemplateKind::CashFlow,
        TemplateKind::Payroll,
        TemplateKind::BalanceSheet,
        TemplateKind::IncomeStatement,
        TemplateKind::BreakEven,
        TemplateKind::FinancialRatios,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            TemplateKind::CashFlow => "flujo_caja",
            TemplateKind::Payroll => "nomina",
            TemplateKind::BalanceSheet => "balance_general",
            TemplateKind::IncomeStatement => "estado_resultados",
            TemplateKind::BreakEven => "punto_equilibrio",
            TemplateKind::FinancialRatios => "ratios_financieros",
        }
    }

    pub fn sheet_name(self) -> &'static str {
        match self {
            TemplateKind::CashFlow => "Flujo de Caja",
            TemplateKind::Payroll => "Nómina",
            TemplateKind::BalanceSheet => "Balance General",
            TemplateKind::IncomeStatement => "Estado de Resultados",
            TemplateKind::BreakEven => "Punto de Equilibrio",
            TemplateKind::FinancialRatios => "Ratios Financieros",
        }
    }

    /// Comma separated list of every accepted tag, in declaration order.
    pub fn valid_tags() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.tag())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Download name, `{tag}_{YYYYMMDD}.xlsx`.
    pub fn file_name(self, date: NaiveDate) -> String {
        format!("{}_{}.xlsx", self.tag(), date.format("%Y%m%d"))
    }

    fn subtitle(self, period: Option<&str>) -> String {
        match (self, period) {
            (TemplateKind::CashFlow, Some(period)) => format!("Período: {period}"),
            (TemplateKind::CashFlow, None) => "Período: Enero - Junio 2025".to_string(),
            (TemplateKind::Payroll, Some(period)) => format!("Mes: {period}"),
            (TemplateKind::Payroll, None) => "Mes: Mayo 2025".to_string(),
            (TemplateKind::BalanceSheet, Some(period)) => format!("Al {period}"),
            (TemplateKind::BalanceSheet, None) => "Al 31 de Mayo de 2025".to_string(),
            (TemplateKind::IncomeStatement, Some(period)) => format!("Período: {period}"),
            (TemplateKind::IncomeStatement, None) => "Del 1 al 31 de Mayo de 2025".to_string(),
            (TemplateKind::BreakEven, Some(period)) => {
                format!("Evaluación de Rentabilidad Operativa - {period}")
            }
            (TemplateKind::BreakEven, None) => "Evaluación de Rentabilidad Operativa".to_string(),
            (TemplateKind::FinancialRatios, Some(period)) => {
                format!("Evaluación de Desempeño Financiero - {period}")
            }
            (TemplateKind::FinancialRatios, None) => {
                "Evaluación de Desempeño Financiero".to_string()
            }
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TemplateKind {
    type Err = SpreadsheetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| SpreadsheetError::UnknownTemplate {
                tag: tag.to_string(),
                valid: Self::valid_tags(),
            })
    }
}

/// Caller customisation applied to the subtitle band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    pub company_name: Option<String>,
    pub period: Option<String>,
}

impl TemplateOptions {
    pub fn is_default(&self) -> bool {
        self.company_name.is_none() && self.period.is_none()
    }

    fn subtitle(&self, kind: TemplateKind) -> String {
        let base = kind.subtitle(self.period.as_deref());
        match self.company_name.as_deref() {
            Some(company) => format!("{company} - {base}"),
            None => base,
        }
    }
}

/// Builds the workbook for `kind` and returns the `.xlsx` bytes.
pub fn generate(kind: TemplateKind, options: &TemplateOptions) -> Result<Vec<u8>, SpreadsheetError> {
    let styles = layout::Styles::new();
    let subtitle = options.subtitle(kind);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(kind.sheet_name())?;

    match kind {
        TemplateKind::CashFlow => cash_flow::write(worksheet, &styles, &subtitle)?,
        TemplateKind::Payroll => payroll::write(worksheet, &styles, &subtitle)?,
        TemplateKind::BalanceSheet => balance_sheet::write(worksheet, &styles, &subtitle)?,
        TemplateKind::IncomeStatement => income_statement::write(worksheet, &styles, &subtitle)?,
        TemplateKind::BreakEven => break_even::write(worksheet, &styles, &subtitle)?,
        TemplateKind::FinancialRatios => ratios::write(worksheet, &styles, &subtitle)?,
    }

    Ok(workbook.save_to_buffer()?)
}

/// [`generate`] on the blocking pool.
pub async fn render(kind: TemplateKind, options: TemplateOptions) -> Result<Vec<u8>, SpreadsheetError> {
    tokio::task::spawn_blocking(move || generate(kind, &options)).await?
}
