//! `finsight schema`: Print the report JSON Schema.

use finsight_analysis::SchemaContract;

pub fn run(partial: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(&SchemaContract::report(), partial)?);
    Ok(())
}

fn render(contract: &SchemaContract, partial: bool) -> serde_json::Result<String> {
    let schema = if partial {
        contract.to_partial_json_schema()
    } else {
        contract.to_json_schema()
    };
    serde_json::to_string_pretty(&schema)
}
