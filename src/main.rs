mod api;
mod cli;
mod commands;
mod config;
mod domain;
mod error_severity;
mod media;
mod presentation;

use anyhow::Result;
use api::error::InfraError;
use config::APP_CONFIG;
use config::error::ConfigError;
use domain::cancel::CancelFlag;
use domain::error::DomainError;
use media::error::MediaError;
use std::env;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let machine_output = args.iter().any(|arg| arg == "--machine");

    let cancel = CancelFlag::new();
    watch_ctrl_c(cancel.clone());

    if let Err(e) = run(&args, &cancel).await {
        handle_error(e, machine_output);
    }
}

/// アプリケーションのメイン処理
async fn run(args: &[String], cancel: &CancelFlag) -> Result<()> {
    let parsed = cli::parse_args(args)?;
    let result = cli::dispatch(&parsed, cancel).await?;
    presentation::output::output_result(&result, parsed.machine_output)
}

/// ログはstderrへ（stdoutは --machine のJSON用）
///
/// RUST_LOG が無ければ APP_CONFIG のデフォルトを使う。
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(APP_CONFIG.logging.default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ctrl-C でキャンセルフラグを立てる
///
/// 処理中の各段階は次のI/Oの前にフラグを見て中断し、一時ファイルはドロップで消える。
fn watch_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

/// エラーハンドリングとユーザーへの表示
///
/// anyhow::Error から元のエラー型を downcast して、
/// エラーの種類に応じた exit code とメッセージを決定する。
fn handle_error(error: anyhow::Error, machine_output: bool) -> ! {
    let exit_code = determine_exit_code(&error);
    let hint = get_error_hint(&error);

    presentation::output::output_error(&error, exit_code, hint.as_deref(), machine_output);

    std::process::exit(exit_code);
}

/// エラーチェーンから適切な終了コードを決定
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(domain_err) = cause.downcast_ref::<DomainError>() {
            return domain_err.severity().exit_code();
        }
        if let Some(media_err) = cause.downcast_ref::<MediaError>() {
            return media_err.severity().exit_code();
        }
        if let Some(infra_err) = cause.downcast_ref::<InfraError>() {
            return infra_err.severity().exit_code();
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return config_err.severity().exit_code();
        }
    }

    // 不明なエラー（引数の誤りなど）
    1
}

/// エラーに対するユーザー向けヒントを取得
fn get_error_hint(error: &anyhow::Error) -> Option<String> {
    for cause in error.chain() {
        let hint = if let Some(domain_err) = cause.downcast_ref::<DomainError>() {
            domain_err.hint()
        } else if let Some(media_err) = cause.downcast_ref::<MediaError>() {
            media_err.hint()
        } else if let Some(infra_err) = cause.downcast_ref::<InfraError>() {
            infra_err.hint()
        } else if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            config_err.hint()
        } else {
            None
        };

        if let Some(hint) = hint {
            return Some(hint.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_code_from_wrapped_errors() {
        let err = Err::<(), _>(DomainError::empty_file("a.mp4"))
            .context("File validation failed")
            .unwrap_err();
        assert_eq!(determine_exit_code(&err), 1);

        let err = Err::<(), _>(InfraError::api("/v1beta/models", "denied", Some(403)))
            .context("Status command failed")
            .unwrap_err();
        assert_eq!(determine_exit_code(&err), 2);
        assert!(get_error_hint(&err).unwrap().contains("ridelens login"));

        let err = Err::<(), _>(MediaError::transcode("ffmpeg exited with status 1"))
            .context("Compression failed")
            .unwrap_err();
        assert_eq!(determine_exit_code(&err), 3);
    }

    #[test]
    fn test_unknown_error_defaults_to_one() {
        let err = anyhow::anyhow!("Unknown command: 'list'");
        assert_eq!(determine_exit_code(&err), 1);
        assert!(get_error_hint(&err).is_none());
    }
}
