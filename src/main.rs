use std::process::ExitCode;

mod app;
mod cli;
mod config;

fn main() -> ExitCode {
    app::main()
}
