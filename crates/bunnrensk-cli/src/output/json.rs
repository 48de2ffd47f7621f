use bunnrensk_core::error::BunnrenskError;
use bunnrensk_core::pipeline::BatchOutput;

pub fn print(result: &BatchOutput) -> Result<(), BunnrenskError> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}
