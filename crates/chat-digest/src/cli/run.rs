use anyhow::Result;
use async_trait::async_trait;
use digest_core::{AccessToken, FieldNames, Pipeline, RecordSink, RunReport, TableRecord};
use lark_adapter::{BitableWriter, LarkClient};
use tracing::info;

use crate::cli::RunArgs;
use crate::config::{Config, RunSettings};
use crate::llm::DashScopeSummarizer;

/// Stands in for the table during `--dry-run`: prints the request fields.
struct PreviewSink {
    fields: FieldNames,
}

#[async_trait]
impl RecordSink for PreviewSink {
    async fn append(&self, _token: &AccessToken, record: &TableRecord) -> digest_core::Result<String> {
        let fields = serde_json::Value::Object(record.to_fields(&self.fields));
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "fields": fields }))
                .unwrap_or_default()
        );
        Ok("dry-run".to_string())
    }
}

pub async fn run(args: RunArgs, config: &Config) -> Result<()> {
    let settings = config.run_settings()?;
    info!(
        "Digesting chat {} (UTC{:+}, empty day: {:?}, fetch errors: {:?}, summary errors: {:?})",
        settings.pipeline.chat_id,
        settings.pipeline.offset_hours,
        settings.pipeline.empty_day,
        settings.pipeline.collector.on_fetch_error,
        settings.pipeline.on_summary_error,
    );

    let report = if args.dry_run {
        info!("Dry run: the record will be printed, not written");
        let sink = PreviewSink {
            fields: settings.table.fields.clone(),
        };
        execute(settings, |_| sink).await?
    } else {
        let table = settings.table.clone();
        execute(settings, move |client| BitableWriter::new(client, table)).await?
    };

    match &report.record_id {
        Some(id) => info!(
            "Done: {} message(s) on {}, record {}",
            report.message_count, report.date, id
        ),
        None => info!("Done: nothing posted on {}, no record written", report.date),
    }
    Ok(())
}

async fn execute<W, B>(settings: RunSettings, make_sink: B) -> digest_core::Result<RunReport>
where
    W: RecordSink,
    B: FnOnce(LarkClient) -> W,
{
    let client = LarkClient::new(settings.lark)?;
    let summarizer = DashScopeSummarizer::new(settings.completion)?;
    let sink = make_sink(client.clone());

    let pipeline = Pipeline::new(client.clone(), client, summarizer, sink, settings.pipeline);
    pipeline.run().await
}
