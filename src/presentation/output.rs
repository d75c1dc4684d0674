/// プレゼンテーション層: コマンド結果の出力
///
/// コマンド実行結果をユーザー向け（人間可読）または
/// 機械向け（JSON）形式で出力する責務を担います。
/// CLI使用方法とエラーの表示もこのモジュールが担当します。
use crate::commands::result::{
    AnalyzeResult, CommandResult, CompressResult, ProbeResult, UploadResult,
};
use crate::domain::formatter::{format_duration, format_megabytes};
use crate::domain::policy::TranscodeDecision;
use anyhow::Result;

/// ヘルプテキスト（単一の情報源）
const HELP_TEXT: &str = "ridelens
Analyze equestrian show-jumping videos from the command line

Usage:
  ridelens [--machine] <command> [args...]

Global Flags:
  --machine        - Output machine-readable JSON to stdout (for scripting)
                     Works for both success and error cases

Available commands:
  login [--stdin]  - Save an API key for the analysis service
                     Without --stdin: Interactive input (default)
                     With --stdin: Read the key from the first line of standard input
  logout           - Remove the saved API key
  status           - Check whether the API key is accepted
  probe <file>     - Show video metadata and whether it would be compressed
  compress <file> [--output <path>] [--progress]
                   - Compress a video when it exceeds the thresholds
                     --output: Output path (default: <name>_compressed.mp4)
  upload <file> [--progress]
                   - Upload a video in chunks and wait until it is ready
  analyze <file> [--no-compress] [--progress]
                   - Probe, compress if needed, upload and analyze a video
                     --no-compress: Upload the original file as-is
  help             - Display this help message

Environment:
  RIDELENS_API_KEY, RIDELENS_API_BASE, RIDELENS_MODEL, RIDELENS_CHUNK_SIZE,
  RIDELENS_HEIGHT_THRESHOLD, RIDELENS_SIZE_THRESHOLD_MB,
  RIDELENS_POLL_INTERVAL_MS, RIDELENS_POLL_MAX_ATTEMPTS,
  RIDELENS_FFMPEG, RIDELENS_FFPROBE override config.toml
  RUST_LOG controls log output (stderr)

Error Output:
  Normal mode:   Human-readable error messages to stderr
  --machine:     JSON error object with exit_code and hint fields

Progress Output:
  analyze --progress             - Show human-readable progress to stderr
  --machine analyze --progress   - Output machine-readable JSON progress to stdout";

/// コマンド結果を適切な形式で出力する
///
/// # Output
/// * `machine_output = false`: 人間向けの詳細メッセージ（stderr）
/// * `machine_output = true`: 機械可読JSON（stdout）
pub fn output_result(result: &CommandResult, machine_output: bool) -> Result<()> {
    if machine_output {
        println!("{}", serde_json::to_string(&machine_readable(result))?);
    } else {
        output_human_readable(result);
    }

    Ok(())
}

/// エラーを出力する
///
/// 機械向けは `{success:false, error, exit_code, hint}` を stdout に出す。
pub fn output_error(error: &anyhow::Error, exit_code: i32, hint: Option<&str>, machine_output: bool) {
    if machine_output {
        let json = serde_json::json!({
            "success": false,
            "error": format!("{:#}", error),
            "exit_code": exit_code,
            "hint": hint,
        });
        println!("{}", json);
        return;
    }

    eprintln!("Error: {}", error);

    let chain: Vec<_> = error.chain().skip(1).collect();
    if !chain.is_empty() {
        eprintln!("\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            eprintln!("  {}: {}", i + 1, cause);
        }
    }

    if let Some(hint) = hint {
        eprintln!("\nHint: {}", hint);
    }
}

/// 人間向けの詳細メッセージを出力（stderr）
///
/// すべての出力はstderrに送られ、stdoutはパイプライン用に予約されます。
fn output_human_readable(result: &CommandResult) {
    match result {
        CommandResult::Login(r) => {
            eprintln!();
            if r.was_logged_in {
                eprintln!("✓ Login credentials updated!");
                eprintln!("The new API key has been saved.");
            } else {
                eprintln!("Login successful.");
                eprintln!("The API key has been saved.");
            }
        }
        CommandResult::Logout(r) => {
            if r.was_logged_in {
                eprintln!("Logged out successfully.");
                eprintln!("The saved API key has been removed.");
            } else {
                eprintln!("Already logged out.");
            }
        }
        CommandResult::Status(r) => {
            eprintln!();
            match (&r.api_key, r.is_authenticated) {
                (Some(key), true) => {
                    eprintln!("Authenticated");
                    eprintln!("API key: {}", key);
                    eprintln!();
                    eprintln!("Your API key is valid and working.");
                }
                (Some(key), false) => {
                    eprintln!("✗ Authentication failed");
                    eprintln!("  API key: {}", key);
                    if let Some(error) = &r.error {
                        eprintln!("  Error: {}", error);
                    }
                    eprintln!();
                    eprintln!("Please run 'ridelens login' to update your API key.");
                }
                (None, _) => {
                    eprintln!("Not logged in");
                    eprintln!("No API key found.");
                    eprintln!("Please run 'ridelens login' to authenticate.");
                }
            }
        }
        CommandResult::Probe(r) => print_probe(r),
        CommandResult::Compress(r) => print_compress(r),
        CommandResult::Upload(r) => print_upload(r),
        CommandResult::Analyze(r) => print_analyze(r),
        CommandResult::Help => {
            eprintln!("{}", HELP_TEXT);
        }
    }
}

fn decision_label(decision: TranscodeDecision) -> &'static str {
    match decision {
        TranscodeDecision::Compress => "compress",
        TranscodeDecision::Skip => "skip",
    }
}

fn print_probe(r: &ProbeResult) {
    eprintln!();
    eprintln!("File:       {}", r.file_path);
    eprintln!("Size:       {}", format_megabytes(r.file_size));
    eprintln!("Resolution: {}", r.metadata.resolution_label());
    eprintln!(
        "Duration:   {} ({:.2}s)",
        format_duration(r.metadata.duration_seconds),
        r.metadata.duration_seconds
    );
    eprintln!("Decision:   {} ({})", decision_label(r.verdict.decision), r.reason);
}

fn print_compress(r: &CompressResult) {
    eprintln!();
    match &r.output_path {
        Some(path) => {
            eprintln!("Compression completed successfully!");
            eprintln!("---");
            eprintln!("Input:  {} ({})", r.file_path, format_megabytes(r.original_size));
            eprintln!("Output: {} ({})", path, format_megabytes(r.output_size));
            eprintln!("Reason: {}", r.reason);
            eprintln!("---");
        }
        None if r.verdict.should_compress() => {
            eprintln!("Compressed output was not smaller than the input; no file was written.");
            eprintln!("Input:  {} ({})", r.file_path, format_megabytes(r.original_size));
        }
        None => {
            eprintln!("Compression not needed ({}).", r.reason);
            eprintln!(
                "{} is {} at {}; no file was written.",
                r.file_path,
                format_megabytes(r.original_size),
                r.metadata.resolution_label()
            );
        }
    }
}

fn print_upload(r: &UploadResult) {
    eprintln!("\nUpload completed successfully!");
    eprintln!("---");
    eprintln!("File:      {} ({})", r.file_path, format_megabytes(r.file_size));
    eprintln!("Remote:    {}", r.remote_file.name);
    eprintln!("URI:       {}", r.remote_file.uri);
    eprintln!("State:     {}", r.remote_file.state);
    if let Some(expires_at) = &r.expires_at {
        eprintln!("Expires:   {}", expires_at);
    }
    eprintln!("---");
}

fn print_analyze(r: &AnalyzeResult) {
    let analysis = &r.analysis;

    eprintln!("\nAnalysis completed successfully!");
    eprintln!("---");
    eprintln!("File:      {}", r.file_path);
    if r.compressed {
        eprintln!(
            "Uploaded:  {} (compressed from {})",
            format_megabytes(r.uploaded_size),
            format_megabytes(r.original_size)
        );
    } else {
        eprintln!("Uploaded:  {}", format_megabytes(r.uploaded_size));
    }
    eprintln!("Movement:  {}", analysis.movement_name);
    eprintln!("Similar:   {}", analysis.similar_pro_rider);
    eprintln!();

    for jump in &analysis.jumps {
        eprintln!(
            "Jump #{}  {} - {}  (overall {:.1})",
            jump.jump_number,
            format_duration(jump.start_time),
            format_duration(jump.end_time),
            jump.overall_score
        );
        for phase in &jump.phases {
            eprintln!(
                "  [{:>5.1}s - {:>5.1}s] {} ({:.0}/10)",
                phase.start_time, phase.end_time, phase.phase_name, phase.score
            );
            eprintln!("    Rider:   {}", phase.rider_analysis);
            eprintln!("    Horse:   {}", phase.horse_analysis);
            eprintln!("    Physics: {}", phase.physics_note);
        }
        eprintln!();
    }

    eprintln!("Summary:");
    eprintln!("  {}", analysis.overall_summary);
    if !analysis.suggested_improvements.is_empty() {
        eprintln!();
        eprintln!("Suggested improvements:");
        for improvement in &analysis.suggested_improvements {
            eprintln!("  - {}", improvement);
        }
    }
    eprintln!("---");
}

/// 機械可読JSONを組み立てる
///
/// コマンド結果に `success: true` を加えた形。
fn machine_readable(result: &CommandResult) -> serde_json::Value {
    let mut json = serde_json::to_value(result).unwrap_or_else(|e| {
        serde_json::json!({
            "command": "unknown",
            "serialization_error": e.to_string(),
        })
    });
    if let Some(object) = json.as_object_mut() {
        object.insert("success".to_string(), serde_json::Value::Bool(true));
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::result::{LoginResult, LogoutResult, StatusResult};

    #[test]
    fn test_machine_readable_login() {
        let json = machine_readable(&CommandResult::Login(LoginResult {
            was_logged_in: false,
        }));

        assert_eq!(json["success"], true);
        assert_eq!(json["command"], "login");
        assert_eq!(json["was_logged_in"], false);
    }

    #[test]
    fn test_machine_readable_status() {
        let json = machine_readable(&CommandResult::Status(StatusResult {
            is_authenticated: true,
            api_key: Some("AIza***cdef".to_string()),
            error: None,
        }));

        assert_eq!(json["command"], "status");
        assert_eq!(json["api_key"], "AIza***cdef");
    }

    #[test]
    fn test_machine_readable_help() {
        let json = machine_readable(&CommandResult::Help);
        assert_eq!(json, serde_json::json!({ "command": "help", "success": true }));
    }

    #[test]
    fn test_output_result_both_modes() {
        let result = CommandResult::Logout(LogoutResult {
            was_logged_in: true,
        });
        assert!(output_result(&result, true).is_ok());
        assert!(output_result(&result, false).is_ok());
    }

    #[test]
    fn test_help_mentions_every_command() {
        for command in ["login", "logout", "status", "probe", "compress", "upload", "analyze"] {
            assert!(HELP_TEXT.contains(command), "{command}");
        }
    }
}
