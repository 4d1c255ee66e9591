//! reaper
//!
//! 一つのプロジェクトの放置リソースを、同時実行数を抑えながら削除する。
//!
//! # 終了コード
//! - 0: 全削除が成功（dry run は常に 0）
//! - 1: 削除の失敗・キャンセル、または実行を開始できなかった
//! - 2: 引数エラー（clap）

mod cli;
mod logging;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use reaper_core::app::{CancelHandle, ReaperBuilder, ReaperConfig};
use reaper_core::domain::BatchSummary;
use reaper_core::impls::{GcloudCli, HttpLivenessProbe, TokioCommandRunner};
use reaper_core::policies::{
    ClusterPolicy, DiskPolicy, FirewallRulePolicy, HealthCheckPolicy, ImagePolicy,
    TargetPoolPolicy,
};
use reaper_core::ports::{EventSink, NoopEventSink};

use crate::cli::{Cli, Command, OutputFormat};
use crate::output::StdoutEventSink;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "reaper failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<BatchSummary> {
    let mut config = ReaperConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    let project = cli.command.project().to_string();
    let kinds = cli.command.kinds();

    // JSON output keeps stdout for the summary alone.
    let sink: Arc<dyn EventSink> = match cli.output {
        OutputFormat::Text => Arc::new(StdoutEventSink),
        OutputFormat::Json => Arc::new(NoopEventSink),
    };
    let cancel = CancelHandle::new();

    let mut builder = ReaperBuilder::new(Arc::new(GcloudCli::new(TokioCommandRunner, &project)))
        .config(config.clone())
        .sink(sink)
        .cancel_handle(cancel.clone());
    if cli.command.needs_probe() {
        let probe = HttpLivenessProbe::from_gcloud(&TokioCommandRunner, &project)
            .await
            .context("preparing the instance liveness probe")?;
        builder = builder.probe(Arc::new(probe));
    }
    let reaper = register_policies(builder, &cli.command, &config)?
        .expect_kinds(&kinds)
        .build()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, letting running deletions finish");
            cancel.cancel();
        }
    });

    info!(project = %project, ?kinds, dry_run = config.dry_run, "reaping");
    let result = reaper.run_many(&kinds).await.context("reaping")?;
    let summary = result.summary();
    output::print_summary(&summary, cli.output)?;
    Ok(summary)
}

fn register_policies(
    builder: ReaperBuilder,
    command: &Command,
    config: &ReaperConfig,
) -> Result<ReaperBuilder> {
    let builder = match command {
        Command::Disks { .. } => builder.register(DiskPolicy)?,
        Command::TargetPools { .. } => builder.register(TargetPoolPolicy)?,
        Command::HealthChecks { .. } => builder.register(HealthCheckPolicy)?,
        Command::LoadBalancers { .. } => builder
            .register(TargetPoolPolicy)?
            .register(HealthCheckPolicy)?,
        Command::FirewallRules { .. } => builder.register(FirewallRulePolicy)?,
        Command::Images { .. } => builder.register(ImagePolicy::from_config(&config.images)?)?,
        Command::Clusters { .. } => {
            builder.register(ClusterPolicy::from_config(&config.clusters)?)?
        }
    };
    Ok(builder)
}
