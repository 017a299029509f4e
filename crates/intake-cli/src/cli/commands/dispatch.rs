use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Manifest(args) => super::manifest::run(args),
        Command::Check(args) => super::check::run(args),
        Command::Push(args) => super::push::run(args).await,
    }
}
