use crate::commands::{self, CommandResult};
use crate::domain::cancel::CancelFlag;
use crate::domain::progress::Progress;
use crate::presentation::input;
use crate::presentation::progress::ProgressPrinter;
use anyhow::{Context, Result, bail};

/// 解析済みのCLI引数
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArgs {
    /// --machine（グローバル）
    pub machine_output: bool,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login {
        from_stdin: bool,
    },
    Logout,
    Status,
    Probe {
        file_path: String,
    },
    Compress {
        file_path: String,
        output: Option<String>,
        progress: bool,
    },
    Upload {
        file_path: String,
        progress: bool,
    },
    Analyze {
        file_path: String,
        no_compress: bool,
        progress: bool,
    },
    Help,
}

/// CLI引数を解析する
///
/// `args[0]` はプログラム名。コマンドが無い場合は help として扱う。
pub fn parse_args(args: &[String]) -> Result<ParsedArgs> {
    let mut machine_output = false;
    let mut rest: Vec<&str> = Vec::new();
    for arg in args.iter().skip(1) {
        if arg == "--machine" {
            machine_output = true;
        } else {
            rest.push(arg.as_str());
        }
    }

    let Some((&name, options)) = rest.split_first() else {
        return Ok(ParsedArgs {
            machine_output,
            command: Command::Help,
        });
    };

    let mut flags = Flags::parse(options)?;

    let command = match name {
        "login" => Command::Login {
            from_stdin: flags.take("--stdin"),
        },
        "logout" => Command::Logout,
        "status" => Command::Status,
        "probe" => Command::Probe {
            file_path: flags.file_path(name)?,
        },
        "compress" => Command::Compress {
            file_path: flags.file_path(name)?,
            output: flags.take_value("--output")?,
            progress: flags.take("--progress"),
        },
        "upload" => Command::Upload {
            file_path: flags.file_path(name)?,
            progress: flags.take("--progress"),
        },
        "analyze" => Command::Analyze {
            file_path: flags.file_path(name)?,
            no_compress: flags.take("--no-compress"),
            progress: flags.take("--progress"),
        },
        "help" | "--help" | "-h" => Command::Help,
        _ => bail!(
            "Unknown command: '{}'. Use 'help' to see available commands.",
            name
        ),
    };

    flags.finish(name)?;

    Ok(ParsedArgs {
        machine_output,
        command,
    })
}

/// 位置引数とフラグの残り
struct Flags<'a> {
    positional: Vec<&'a str>,
    options: Vec<&'a str>,
}

impl<'a> Flags<'a> {
    /// `--output` だけは値を取るので、直後の引数をフラグ側に寄せる
    fn parse(args: &[&'a str]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut options = Vec::new();
        let mut iter = args.iter();
        while let Some(&arg) = iter.next() {
            if arg == "--output" {
                let value = iter.next().context("--output requires a path argument")?;
                options.push(arg);
                options.push(*value);
            } else if arg.starts_with("--") {
                options.push(arg);
            } else {
                positional.push(arg);
            }
        }
        Ok(Self {
            positional,
            options,
        })
    }

    fn take(&mut self, name: &str) -> bool {
        match self.options.iter().position(|option| *option == name) {
            Some(index) => {
                self.options.remove(index);
                true
            }
            None => false,
        }
    }

    fn take_value(&mut self, name: &str) -> Result<Option<String>> {
        let Some(index) = self.options.iter().position(|option| *option == name) else {
            return Ok(None);
        };
        self.options.remove(index);
        if index >= self.options.len() {
            bail!("{} requires a value", name);
        }
        Ok(Some(self.options.remove(index).to_string()))
    }

    fn file_path(&mut self, command: &str) -> Result<String> {
        if self.positional.is_empty() {
            bail!("Please specify a file path for {} command", command);
        }
        Ok(self.positional.remove(0).to_string())
    }

    fn finish(self, command: &str) -> Result<()> {
        if let Some(option) = self.options.first() {
            bail!("Unknown option for {}: '{}'", command, option);
        }
        if let Some(arg) = self.positional.first() {
            bail!("Unexpected argument for {}: '{}'", command, arg);
        }
        Ok(())
    }
}

/// コマンドを実行する
///
/// 進捗は `--progress` が付いたときだけ表示する。
pub async fn dispatch(args: &ParsedArgs, cancel: &CancelFlag) -> Result<CommandResult> {
    let mut printer = ProgressPrinter::new(args.machine_output);
    let mut show = |progress: Progress| printer.print(&progress);
    let mut silent = |_progress: Progress| {};

    match &args.command {
        Command::Login { from_stdin } => {
            let api_key = if *from_stdin {
                input::read_api_key_from_stdin()?
            } else {
                input::read_api_key_interactive()?
            };
            commands::login::execute(api_key)
                .await
                .context("Login command failed")
        }
        Command::Logout => commands::logout::execute()
            .await
            .context("Logout command failed"),
        Command::Status => commands::status::execute()
            .await
            .context("Status command failed"),
        Command::Probe { file_path } => commands::probe::execute(file_path)
            .await
            .context("Probe command failed"),
        Command::Compress {
            file_path,
            output,
            progress,
        } => {
            let on_progress: &mut dyn FnMut(Progress) =
                if *progress { &mut show } else { &mut silent };
            commands::compress::execute(file_path, output.as_deref(), cancel, on_progress)
                .await
                .context("Compress command failed")
        }
        Command::Upload {
            file_path,
            progress,
        } => {
            let on_progress: &mut dyn FnMut(Progress) =
                if *progress { &mut show } else { &mut silent };
            commands::upload::execute(file_path, cancel, on_progress)
                .await
                .context("Upload command failed")
        }
        Command::Analyze {
            file_path,
            no_compress,
            progress,
        } => {
            let on_progress: &mut dyn FnMut(Progress) =
                if *progress { &mut show } else { &mut silent };
            commands::analyze::execute(file_path, *no_compress, cancel, on_progress)
                .await
                .context("Analyze command failed")
        }
        Command::Help => Ok(CommandResult::Help),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedArgs> {
        let args: Vec<String> = std::iter::once("ridelens")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        parse_args(&args)
    }

    #[test]
    fn test_no_command_is_help() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
        assert!(parse(&["--machine"]).unwrap().machine_output);
    }

    #[test]
    fn test_machine_flag_anywhere() {
        let before = parse(&["--machine", "status"]).unwrap();
        let after = parse(&["status", "--machine"]).unwrap();
        assert_eq!(before, after);
        assert!(before.machine_output);
    }

    #[test]
    fn test_analyze_flags() {
        let parsed = parse(&["analyze", "--progress", "round.mp4", "--no-compress"]).unwrap();
        assert_eq!(
            parsed.command,
            Command::Analyze {
                file_path: "round.mp4".to_string(),
                no_compress: true,
                progress: true,
            }
        );
    }

    #[test]
    fn test_compress_output_value() {
        let parsed = parse(&["compress", "in.mov", "--output", "out.mp4"]).unwrap();
        assert_eq!(
            parsed.command,
            Command::Compress {
                file_path: "in.mov".to_string(),
                output: Some("out.mp4".to_string()),
                progress: false,
            }
        );
        assert!(parse(&["compress", "in.mov", "--output"]).is_err());
    }

    #[test]
    fn test_missing_file_and_unknown_input() {
        assert!(parse(&["upload"]).is_err());
        assert!(parse(&["upload", "a.mp4", "--force"]).is_err());
        assert!(parse(&["upload", "a.mp4", "b.mp4"]).is_err());
        assert!(parse(&["list"]).is_err());
    }

    #[test]
    fn test_login_stdin() {
        assert_eq!(
            parse(&["login", "--stdin"]).unwrap().command,
            Command::Login { from_stdin: true }
        );
    }
}
