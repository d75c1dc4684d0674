/// プレゼンテーション層: ユーザー入力処理
///
/// 対話入力やstdinからAPIキーを取得し、
/// アプリケーション層で使用可能な形式に変換します。
use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};

/// 対話的にAPIキーを取得
///
/// 案内はstderrに出す（stdoutは --machine 出力用に空けておく）。
pub fn read_api_key_interactive() -> Result<String> {
    eprintln!("Logging in to the analysis service...");
    eprintln!();
    eprintln!("Please enter your API key.");
    eprintln!("You can create one at: https://aistudio.google.com/app/apikey");
    eprintln!();

    eprint!("API key: ");
    io::stderr().flush()?;

    let stdin = io::stdin();
    read_api_key(&mut stdin.lock())
}

/// stdin からパイプでAPIキーを取得（1行目を使う）
pub fn read_api_key_from_stdin() -> Result<String> {
    let stdin = io::stdin();
    read_api_key(&mut stdin.lock())
        .context("Please ensure the first line of stdin contains a valid API key.")
}

fn read_api_key(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read API key from input")?;
    let api_key = line.trim().to_string();

    if api_key.is_empty() {
        bail!("API key cannot be empty. Please provide a valid API key.");
    }

    Ok(api_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_first_line_trimmed() {
        let mut input = Cursor::new("  AIzaSyExample  \nsecond line\n");
        assert_eq!(read_api_key(&mut input).unwrap(), "AIzaSyExample");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let mut input = Cursor::new("\n");
        assert!(read_api_key(&mut input).is_err());

        let mut input = Cursor::new("");
        assert!(read_api_key(&mut input).is_err());
    }
}
