//! Basic example demonstrating queries against a public GraphQL endpoint.
//!
//! This example shows how to:
//! - Create a client with default headers
//! - Run a query with variables and decode the payload
//! - Switch to multipart encoding
//! - Inspect GraphQL errors returned alongside partial data
//!
//! Run with: `cargo run --example basic_query`

use gqlclient::{Client, Error, MultipartEncoder, Request};
use serde::Deserialize;
use std::time::Duration;

const ENDPOINT: &str = "https://countries.trevorblades.com/graphql";

#[derive(Debug, Deserialize)]
struct Country {
    name: String,
    capital: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CountryData {
    country: Option<Country>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("gqlclient=debug,basic_query=info")
        .init();

    let client = Client::builder(ENDPOINT)
        .default_header("User-Agent", "gqlclient-demo/0.1")?
        .build()?;

    println!("=== Query With Variables ===");
    let request = Request::new("query ($code: ID!) { country(code: $code) { name capital } }")
        .with_var("code", "NL")
        .with_timeout(Duration::from_secs(10));

    let response = client.run::<CountryData>(&request).await?;
    match &response.data.country {
        Some(country) => println!(
            "{} (capital: {})",
            country.name,
            country.capital.as_deref().unwrap_or("none")
        ),
        None => println!("No such country"),
    }
    println!("Request latency: {:?}", response.latency);
    println!();

    println!("=== Multipart Encoding ===");
    let multipart = Client::builder(ENDPOINT)
        .encoder(MultipartEncoder::new())
        .build()?;
    match multipart.run::<CountryData>(&request).await {
        Ok(response) => println!("Multipart accepted: {:?}", response.data.country),
        Err(e) => println!("Endpoint rejected multipart: {}", e),
    }
    println!();

    println!("=== GraphQL Errors ===");
    let broken = Request::new("{ country(code: \"NL\") { name population } }");
    match client.run::<CountryData>(&broken).await {
        Ok(response) => println!("Unexpected success: {:?}", response.data),
        Err(Error::Graphql { errors, .. }) => {
            for error in &errors {
                println!("{}", error);
            }
        }
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
