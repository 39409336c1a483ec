//! CLI for ragbridge.
//!
//! - `chat` streams one turn and prints canonical events as JSON lines
//! - `watch` polls an existing evaluation job and prints its results
//! - `submit` starts an evaluation and then behaves like `watch`
//! - `health` probes both services
//!
//! Output goes to the supplied writer (stdout in the binary); logs go to
//! stderr so the two never interleave.

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_string, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::io::Write;

use crate::canonical::CanonicalEvent;
use crate::context::BridgeContext;
use crate::jobs::JobUpdate;
use crate::models::{ChatRequest, EvaluationRequest};

/// Run a parsed command against `ctx`, writing results to `out`.
pub async fn run_cli_command<W: Write>(
    command: CliCommand,
    ctx: &BridgeContext,
    out: &mut W,
) -> Result<()> {
    match command {
        CliCommand::Version => {
            writeln!(out, "{}", version_string())?;
            Ok(())
        }
        CliCommand::Help => {
            writeln!(out, "{}", USAGE)?;
            Ok(())
        }
        CliCommand::Invalid(reason) => Err(eyre!("{}\n\n{}", reason, USAGE)),
        CliCommand::Chat {
            message,
            session_id,
        } => {
            let mut request = ChatRequest::new(message);
            request.session_id = session_id;
            run_chat(ctx, &request, out).await
        }
        CliCommand::Watch { job_id } => watch_job(ctx, &job_id, out).await,
        CliCommand::Submit {
            dataset_id,
            method,
            k_values,
        } => {
            let mut request = EvaluationRequest::new(dataset_id).with_method(method);
            if let Some(k_values) = k_values {
                request = request.with_k_values(k_values);
            }
            let job = ctx.submit_and_track(request).await?;
            writeln!(out, "{}", serde_json::to_string(&job)?)?;
            watch_job(ctx, &job.job_id, out).await
        }
        CliCommand::Health => {
            let health = ctx.health_check().await;
            let label = |ok: bool| if ok { "ok" } else { "unreachable" };
            writeln!(out, "agent  {}  {}", ctx.config().agent_url, label(health.agent))?;
            writeln!(out, "tester {}  {}", ctx.config().tester_url, label(health.tester))?;
            if health.all_healthy() {
                Ok(())
            } else {
                Err(eyre!("one or more services are unreachable"))
            }
        }
    }
}

/// Stream one chat turn. Ctrl-C cancels the stream and releases the connection.
async fn run_chat<W: Write>(ctx: &BridgeContext, request: &ChatRequest, out: &mut W) -> Result<()> {
    let mut pipe = ctx.chat(request).await;

    let cancel = pipe.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling stream");
            cancel.cancel();
        }
    });

    let mut failure = None;
    while let Some(event) = pipe.next().await {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
        if let CanonicalEvent::ErrorEvent { message } = &event {
            failure = Some(message.clone());
        }
    }
    interrupt.abort();
    out.flush()?;

    tracing::debug!(
        "Turn {} finished with {} characters",
        pipe.normalizer().message_id(),
        pipe.normalizer().accumulated_text().len()
    );
    match failure {
        Some(message) => Err(eyre!("stream failed: {}", message)),
        None => Ok(()),
    }
}

async fn watch_job<W: Write>(ctx: &BridgeContext, job_id: &str, out: &mut W) -> Result<()> {
    match ctx.track_until_settled(job_id).await {
        Some(JobUpdate::Completed { results, .. }) => {
            writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
            Ok(())
        }
        Some(JobUpdate::Failed { error, .. }) => Err(eyre!(
            "job {} failed: {}",
            job_id,
            error.unwrap_or_else(|| "no error reported".to_string())
        )),
        Some(JobUpdate::ResultsUnavailable { error, .. }) => Err(eyre!(
            "job {} completed but its results could not be fetched: {}",
            job_id,
            error
        )),
        Some(JobUpdate::PollingStopped { reason, .. }) => Err(eyre!(
            "stopped watching job {} (it may still be running): {}",
            job_id,
            reason
        )),
        Some(JobUpdate::Status(_)) | None => Err(eyre!("job updates ended unexpectedly")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockJobSource, MockResponse};
    use crate::config::BridgeConfig;
    use crate::models::JobStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(http: MockHttpClient, source: MockJobSource) -> BridgeContext {
        let config = BridgeConfig::default()
            .with_agent_url("http://agent")
            .with_tester_url("http://tester")
            .with_poll_interval(Duration::from_millis(50));
        BridgeContext::with_job_source(config, Arc::new(http), Arc::new(source))
    }

    #[tokio::test]
    async fn test_version_and_help() {
        let ctx = context(MockHttpClient::new(), MockJobSource::new());
        let mut out = Vec::new();
        run_cli_command(CliCommand::Version, &ctx, &mut out).await.unwrap();
        run_cli_command(CliCommand::Help, &ctx, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("ragbridge "));
        assert!(text.contains("Usage:"));
    }

    #[tokio::test]
    async fn test_invalid_is_error() {
        let ctx = context(MockHttpClient::new(), MockJobSource::new());
        let mut out = Vec::new();
        let result =
            run_cli_command(CliCommand::Invalid("bad".to_string()), &ctx, &mut out).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_chat_prints_json_lines() {
        let http = MockHttpClient::new();
        http.set_response(
            "http://agent/api/v1/chat/stream",
            MockResponse::Stream(vec![
                "data: {\"type\":\"token\",\"content\":\"Hi\"}\n\ndata: {\"type\":\"done\"}\n\n"
                    .into(),
            ]),
        );
        let ctx = context(http, MockJobSource::new());
        let mut out = Vec::new();

        let command = CliCommand::Chat {
            message: "hello".to_string(),
            session_id: None,
        };
        run_cli_command(command, &ctx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"type":"textDelta","text":"Hi"}"#);
        assert!(lines[1].contains("\"type\":\"finish\""));
    }

    #[tokio::test]
    async fn test_chat_error_exits_nonzero() {
        let http = MockHttpClient::new();
        http.set_response(
            "http://agent/api/v1/chat/stream",
            MockResponse::Stream(vec!["data: {\"type\":\"error\",\"error\":\"nope\"}\n".into()]),
        );
        let ctx = context(http, MockJobSource::new());
        let mut out = Vec::new();

        let command = CliCommand::Chat {
            message: "hello".to_string(),
            session_id: None,
        };
        let err = run_cli_command(command, &ctx, &mut out).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(String::from_utf8(out).unwrap().contains("errorEvent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_prints_results() {
        let source = MockJobSource::new();
        source.script_statuses("j1", &[JobStatus::Running, JobStatus::Completed]);
        let ctx = context(MockHttpClient::new(), source);
        let mut out = Vec::new();

        run_cli_command(
            CliCommand::Watch {
                job_id: "j1".to_string(),
            },
            &ctx,
            &mut out,
        )
        .await
        .unwrap();

        let results: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(results["job_id"], "j1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_failed_job() {
        let source = MockJobSource::new();
        source.script_statuses("j1", &[JobStatus::Failed]);
        let ctx = context(MockHttpClient::new(), source);
        let mut out = Vec::new();

        let err = run_cli_command(
            CliCommand::Watch {
                job_id: "j1".to_string(),
            },
            &ctx,
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed"));
    }
}
