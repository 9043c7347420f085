use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("spinfan version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
