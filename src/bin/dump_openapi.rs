use std::fs;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/catalog-api-openapi.json".to_string());

    let doc = catalog_api::docs::build_openapi(catalog_api::config::DEFAULT_PORT)?;
    fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {path}");
    Ok(())
}
