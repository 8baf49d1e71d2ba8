use metal_karma::ui::{MessageBlock, OutputMode, PlainRenderer, Renderer};
use metal_karma::{parse_command, print_usage, Command};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output_mode = OutputMode::from_env();
    let cmd = match parse_command(args) {
        Ok(cmd) => cmd,
        Err(err) => {
            let mut renderer = PlainRenderer::stderr(output_mode);
            let _ = renderer.error_block(
                &MessageBlock::new("Invalid command arguments", err.to_string())
                    .with_hint("Run `metal-karma --help` to see supported command forms"),
            );
            print_usage();
            std::process::exit(2);
        }
    };

    match cmd {
        Command::Help => {
            print!("{}", metal_karma::usage_text());
        }
        _ => match metal_karma::runner::run_command(cmd) {
            Ok(output) => {
                if !output.trim().is_empty() {
                    println!("{output}");
                }
            }
            Err(err) => {
                let mut renderer = PlainRenderer::stderr(output_mode);
                let _ = renderer.error_block(&MessageBlock::new("Task failed", err.to_string()));
                std::process::exit(err.exit_code());
            }
        },
    }
}
