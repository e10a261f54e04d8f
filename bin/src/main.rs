use anyhow::Result;

mod cli;
mod load;

fn main() -> Result<()> {
    cli::run()
}
