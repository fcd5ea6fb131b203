use std::{str::FromStr, sync::Arc};

use anyhow::Context;
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use tokio::{
    select,
    sync::mpsc::{self, Sender},
    task::JoinHandle,
    time::sleep,
};
use tracing::{info, warn};

use crate::{spreadsheet::TemplateKind, state::AppContext, storage::Report};

#[derive(Debug)]
pub enum SchedulerCommand {
    GenerateReport,
}

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: Sender<SchedulerCommand>,
    schedule: Arc<ReportSchedule>,
}

impl SchedulerHandle {
    pub async fn request_report(&self) -> anyhow::Result<()> {
        self.tx
            .send(SchedulerCommand::GenerateReport)
            .await
            .map_err(|err| anyhow::anyhow!("scheduler shutdown: {err}"))
    }

    pub fn next_slot(&self) -> Option<DateTime<Local>> {
        self.schedule.next_after(&Local::now())
    }
}

/// Wall-clock slots at which a report is produced.
#[derive(Debug, Clone)]
pub struct ReportSchedule {
    slots: Vec<Schedule>,
}

impl ReportSchedule {
    pub fn parse(expressions: &[String]) -> anyhow::Result<Self> {
        let slots = expressions
            .iter()
            .map(|expr| parse_slot(expr))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { slots })
    }

    /// Earliest slot strictly after `after`, across every expression.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.slots
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }
}

/// Parses a five-field cron expression; the `cron` crate wants a leading
/// seconds field.
pub fn parse_slot(expr: &str) -> anyhow::Result<Schedule> {
    let full = format!("0 {}", expr.trim());
    Schedule::from_str(&full).with_context(|| format!("invalid report slot {expr:?}"))
}

pub struct ReportScheduler {
    ctx: AppContext,
    schedule: Arc<ReportSchedule>,
    cmd_rx: mpsc::Receiver<SchedulerCommand>,
}

impl ReportScheduler {
    pub fn new(
        ctx: AppContext,
        schedule: Arc<ReportSchedule>,
        cmd_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            ctx,
            schedule,
            cmd_rx,
        }
    }

    pub async fn run(mut self) {
        let shutdown = self.ctx.shutdown_notifier();
        let notified = shutdown.notified();
        tokio::pin!(notified);

        let config = self.ctx.config();
        let startup = async {
            if config.reports.generate_on_startup {
                generate_financial_report(&self.ctx).await;
            }
            warm_templates(&self.ctx, &config.templates.warm_up).await;
        };
        select! {
            _ = startup => {}
            _ = &mut notified => {
                info!("report scheduler stopped during startup");
                return;
            }
        }
        drop(config);

        loop {
            let now = Local::now();
            let next = self.schedule.next_after(&now);
            let wait = next
                .map(|at| (at - now).to_std().unwrap_or_default())
                .unwrap_or_default();
            if let Some(at) = next {
                info!(next_slot = %at, "waiting for next report slot");
            }

            select! {
                _ = sleep(wait), if next.is_some() => {
                    info!("report slot reached");
                    generate_financial_report(&self.ctx).await;
                }
                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        SchedulerCommand::GenerateReport => {
                            info!("report requested by subsystem");
                            generate_financial_report(&self.ctx).await;
                        }
                    }
                }
                _ = &mut notified => {
                    info!("report scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// Asks the assistant for today's report and stores it. The store enforces
/// the history cap.
pub async fn generate_financial_report(ctx: &AppContext) -> Report {
    info!("generating financial report");
    let now = Local::now();
    let content = ctx.assistant().financial_report(now.date_naive()).await;
    let report = Report::new(content, now);
    ctx.stores().reports.push(report.clone());
    info!(
        report = %report.id,
        date = %report.date,
        stored = ctx.stores().reports.len(),
        "financial report stored"
    );
    report
}

async fn warm_templates(ctx: &AppContext, kinds: &[TemplateKind]) {
    for &kind in kinds {
        if let Err(err) = ctx.default_template(kind).await {
            warn!(kind = %kind, error = ?err, "failed to pre-generate template");
        }
    }
}

pub fn spawn(ctx: AppContext) -> anyhow::Result<(SchedulerHandle, JoinHandle<()>)> {
    let schedule = Arc::new(ReportSchedule::parse(&ctx.config().reports.schedule)?);
    let (tx, rx) = mpsc::channel(32);
    let scheduler = ReportScheduler::new(ctx, Arc::clone(&schedule), rx);
    let handle = SchedulerHandle {
        tx: tx.clone(),
        schedule,
    };
    let join = tokio::spawn(async move {
        scheduler.run().await;
        drop(tx);
    });
    Ok((handle, join))
}
