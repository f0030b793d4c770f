use anyhow::Result;

fn main() -> Result<()> {
    sheetmerge_cli::cli::run()
}
